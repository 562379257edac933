//! Per-generation statistics and the run's statistics log.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

use serde::{Deserialize, Serialize};

use crate::evolution::Individual;

/// Name of the bucket holding run-wide counters in tabular exports.
pub const GLOBAL_BUCKET: &str = "global";

/// Aggregates of one objective over a generation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveStats {
    pub avg: f64,
    pub worst: f64,
    pub best: f64,
}

/// Timing and evaluation counters of a generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalStats {
    /// Wall-clock seconds of the whole generation up to statistics.
    pub gen_total_time: f64,
    /// Sum of individual evaluation times.
    pub ind_total_time: f64,
    /// Longest individual evaluation.
    pub max_time: f64,
    /// Individuals actually evaluated this generation.
    pub n_evals: usize,
    /// Number of objectives.
    pub n_objs: usize,
}

impl GlobalStats {
    /// Ratio of summed evaluation time to wall-clock time: the effective
    /// parallel speedup.
    pub fn time_ratio(&self) -> f64 {
        if self.gen_total_time > 0.0 {
            self.ind_total_time / self.gen_total_time
        } else {
            0.0
        }
    }
}

/// Statistics of one generation. Never modified once pushed to a [`StatsLog`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub generation: usize,
    pub global: GlobalStats,
    pub objectives: BTreeMap<String, ObjectiveStats>,
}

impl GenerationStats {
    /// Aggregate an evaluated population.
    ///
    /// Objectives are taken from the first individual; the population is
    /// expected to share one objective set.
    pub fn from_population<G>(
        generation: usize,
        population: &[Individual<G>],
        gen_total_time: f64,
    ) -> Self {
        let mut objectives: BTreeMap<String, ObjectiveStats> = population
            .first()
            .map(|first| {
                first
                    .fitnesses
                    .iter()
                    .map(|(name, &score)| {
                        (
                            name.clone(),
                            ObjectiveStats {
                                avg: 0.0,
                                worst: score,
                                best: score,
                            },
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut global = GlobalStats {
            gen_total_time,
            n_objs: objectives.len(),
            ..Default::default()
        };
        let count = population.len() as f64;

        for individual in population {
            global.ind_total_time += individual.eval_time;
            global.max_time = global.max_time.max(individual.eval_time);
            if !individual.was_already_evaluated {
                global.n_evals += 1;
            }

            for (name, &score) in &individual.fitnesses {
                if let Some(stats) = objectives.get_mut(name) {
                    stats.avg += score / count;
                    if score > stats.best {
                        stats.best = score;
                    }
                    if score <= stats.worst {
                        stats.worst = score;
                    }
                }
            }
        }

        Self {
            generation,
            global,
            objectives,
        }
    }

    /// Best score on `objective`.
    pub fn best(&self, objective: &str) -> Option<f64> {
        self.objectives.get(objective).map(|s| s.best)
    }
}

impl fmt::Display for GenerationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Generation {} ended in {:.3}s ({} evaluations, {} objs)",
            self.generation, self.global.gen_total_time, self.global.n_evals, self.global.n_objs
        )?;
        writeln!(
            f,
            "  max: {:.3}s, sum: {:.3}s (x{:.2} ratio)",
            self.global.max_time,
            self.global.ind_total_time,
            self.global.time_ratio()
        )?;
        for (name, stats) in &self.objectives {
            writeln!(
                f,
                "  {:>10} > worst: {:>12.6}, avg: {:>12.6}, best: {:>12.6}",
                name, stats.worst, stats.avg, stats.best
            )?;
        }
        Ok(())
    }
}

/// Append-only sequence of generation statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsLog {
    entries: Vec<GenerationStats>,
}

impl StatsLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a generation's statistics.
    pub fn push(&mut self, stats: GenerationStats) {
        self.entries.push(stats);
    }

    pub fn entries(&self) -> &[GenerationStats] {
        &self.entries
    }

    pub fn last(&self) -> Option<&GenerationStats> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Best score on `objective` for every generation, in order.
    pub fn best_series(&self, objective: &str) -> Vec<Option<f64>> {
        self.entries.iter().map(|e| e.best(objective)).collect()
    }

    /// Render the log as CSV: one row per generation, one column per
    /// `<bucket>_<stat>`. Columns come from the first entry.
    pub fn to_csv(&self) -> String {
        let mut csv = String::from("generation");
        let Some(first) = self.entries.first() else {
            csv.push('\n');
            return csv;
        };

        for stat in GLOBAL_COLUMNS {
            let _ = write!(csv, ",{}_{}", GLOBAL_BUCKET, stat);
        }
        let objectives: Vec<&String> = first.objectives.keys().collect();
        for name in &objectives {
            let _ = write!(csv, ",{0}_avg,{0}_worst,{0}_best", name);
        }
        csv.push('\n');

        for entry in &self.entries {
            let g = &entry.global;
            let _ = write!(
                csv,
                "{},{},{},{},{},{}",
                entry.generation,
                g.gen_total_time,
                g.ind_total_time,
                g.max_time,
                g.n_evals,
                g.n_objs
            );
            for name in &objectives {
                match entry.objectives.get(*name) {
                    Some(s) => {
                        let _ = write!(csv, ",{},{},{}", s.avg, s.worst, s.best);
                    }
                    None => csv.push_str(",,,"),
                }
            }
            csv.push('\n');
        }
        csv
    }
}

const GLOBAL_COLUMNS: [&str; 5] = [
    "genTotalTime",
    "indTotalTime",
    "maxTime",
    "nEvals",
    "nObjs",
];

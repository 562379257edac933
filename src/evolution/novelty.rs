//! Novelty search: behavioral distance, k-nearest-neighbour novelty and the
//! archive of novel behaviors.
//!
//! An individual's novelty is its average footprint distance to its K
//! nearest neighbours among the archive as it stood before the current
//! generation plus the whole current generation (itself included). After
//! scoring, only individuals whose novelty exceeds the archive threshold are
//! copied into the archive.

use rayon::prelude::*;

use super::bounded::{BoundedBest, Keep};
use super::individual::{Footprint, Individual};

/// Fitness key under which novelty is recorded.
pub const NOVELTY_OBJECTIVE: &str = "novelty";

/// Novelty computation errors.
#[derive(Debug, thiserror::Error)]
pub enum NoveltyError {
    #[error("Footprint shape mismatch: {left} vs {right} snapshots")]
    SnapshotCount { left: usize, right: usize },
    #[error("Footprint shape mismatch at snapshot {index}: width {left} vs {right}")]
    SnapshotWidth {
        index: usize,
        left: usize,
        right: usize,
    },
}

/// Euclidean distance over the flattened content of two footprints.
pub fn footprint_distance(f0: &Footprint, f1: &Footprint) -> Result<f64, NoveltyError> {
    if f0.len() != f1.len() {
        return Err(NoveltyError::SnapshotCount {
            left: f0.len(),
            right: f1.len(),
        });
    }

    let mut sum = 0.0;
    for (index, (s0, s1)) in f0.iter().zip(f1).enumerate() {
        if s0.len() != s1.len() {
            return Err(NoveltyError::SnapshotWidth {
                index,
                left: s0.len(),
                right: s1.len(),
            });
        }
        sum += s0
            .iter()
            .zip(s1)
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>();
    }
    Ok(sum.sqrt())
}

/// Average distance from `footprint` to its `k` nearest neighbours among
/// `candidates`.
///
/// With fewer than `k` candidates the average covers all of them; with one
/// candidate or none the result is 0.
pub fn knn_average<'a, I>(
    k: usize,
    candidates: I,
    footprint: &Footprint,
) -> Result<f64, NoveltyError>
where
    I: ExactSizeIterator<Item = &'a Footprint>,
{
    if candidates.len() <= 1 {
        return Ok(0.0);
    }

    let mut nearest = BoundedBest::new(Keep::Smallest, k.min(candidates.len()));
    for other in candidates {
        nearest.offer(footprint_distance(footprint, other)?, ());
    }
    Ok(nearest.key_mean())
}

/// Outcome of one novelty pass.
#[derive(Debug, Clone, PartialEq)]
pub struct NoveltyReport {
    /// Archive size before the pass.
    pub previous_size: usize,
    /// Individuals copied into the archive.
    pub added: usize,
    /// Index in the population of the most novel individual.
    pub most_novel: Option<usize>,
    /// Novelty of the most novel individual.
    pub best_novelty: f64,
}

/// Archive of behaviors discovered in previous generations.
#[derive(Debug, Clone)]
pub struct NoveltyArchive<G> {
    entries: Vec<Individual<G>>,
    k_nearest: usize,
    min_novelty: f64,
}

impl<G: Clone + Send + Sync> NoveltyArchive<G> {
    pub fn new(k_nearest: usize, min_novelty: f64) -> Self {
        Self {
            entries: Vec::new(),
            k_nearest,
            min_novelty,
        }
    }

    /// Replace the archive content, e.g. when resuming a run.
    pub fn with_entries(mut self, entries: Vec<Individual<G>>) -> Self {
        self.entries = entries;
        self
    }

    /// Novelty of every member of `population`, scored against the current
    /// archive plus the whole population. Does not modify anything.
    pub fn score(&self, population: &[Individual<G>]) -> Result<Vec<f64>, NoveltyError> {
        let neighbourhood: Vec<&Footprint> = self
            .entries
            .iter()
            .chain(population)
            .map(|ind| &ind.footprint)
            .collect();

        population
            .par_iter()
            .map(|ind| {
                knn_average(
                    self.k_nearest,
                    neighbourhood.iter().copied(),
                    &ind.footprint,
                )
            })
            .collect()
    }

    /// Score the population, record each score under [`NOVELTY_OBJECTIVE`]
    /// and archive the individuals above the threshold.
    pub fn update(
        &mut self,
        population: &mut [Individual<G>],
    ) -> Result<NoveltyReport, NoveltyError> {
        let scores = self.score(population)?;
        let previous_size = self.entries.len();
        let mut most_novel = None;
        let mut best_novelty = 0.0;

        for (i, (individual, novelty)) in population.iter_mut().zip(scores).enumerate() {
            individual.set_fitness(NOVELTY_OBJECTIVE, novelty);
            let added = novelty > self.min_novelty;
            if added {
                self.entries.push(individual.clone());
            }
            if most_novel.is_none() || novelty > best_novelty {
                most_novel = Some(i);
                best_novelty = novelty;
            }
            log::debug!(
                "novelty = {:.6} ({}) {}",
                novelty,
                if added {
                    "added to archive"
                } else {
                    "too low for archive"
                },
                individual.infos
            );
        }

        let report = NoveltyReport {
            previous_size,
            added: self.entries.len() - previous_size,
            most_novel,
            best_novelty,
        };
        log::info!(
            "Added {} new footprints to the archive. New archive size = {} (was {})",
            report.added,
            self.entries.len(),
            previous_size
        );
        Ok(report)
    }

    pub fn entries(&self) -> &[Individual<G>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! Run configuration for an evolutionary search.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration of an evolutionary run.
///
/// Every field has a serde default so that a partial JSON document is enough
/// to describe a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Number of individuals in each generation.
    #[serde(default = "default_population_size")]
    pub population_size: usize,
    /// Number of elites kept per objective.
    #[serde(default = "default_nb_elites")]
    pub nb_elites: usize,
    /// Number of best genomes exported per objective at each generation.
    #[serde(default = "default_nb_saved_elites")]
    pub nb_saved_elites: usize,
    /// Number of competitors in each tournament pool.
    #[serde(default = "default_tournament_size")]
    pub tournament_size: usize,
    /// Generation budget. Generations `0..=nb_generations` are evaluated.
    #[serde(default = "default_nb_generations")]
    pub nb_generations: usize,
    /// Probability of producing a child by crossover.
    #[serde(default = "default_crossover_probability")]
    pub crossover_probability: f64,
    /// Probability of mutating a child.
    #[serde(default = "default_mutation_probability")]
    pub mutation_probability: f64,
    /// Relative objective weights. Advisory only: persisted with the run,
    /// never used by selection.
    #[serde(default)]
    pub objective_weights: BTreeMap<String, f64>,
    /// How the next generation is assembled.
    #[serde(default)]
    pub selection: SelectionMode,
    /// Novelty search settings.
    #[serde(default)]
    pub novelty: NoveltyConfig,
    /// Checkpoint settings.
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    /// Number of local evaluation threads. `None` uses every core.
    #[serde(default)]
    pub threads: Option<usize>,
    /// Random seed for reproducible selection.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            population_size: default_population_size(),
            nb_elites: default_nb_elites(),
            nb_saved_elites: default_nb_saved_elites(),
            tournament_size: default_tournament_size(),
            nb_generations: default_nb_generations(),
            crossover_probability: default_crossover_probability(),
            mutation_probability: default_mutation_probability(),
            objective_weights: BTreeMap::new(),
            selection: SelectionMode::default(),
            novelty: NoveltyConfig::default(),
            checkpoint: CheckpointConfig::default(),
            threads: None,
            random_seed: None,
        }
    }
}

fn default_population_size() -> usize {
    500
}
fn default_nb_elites() -> usize {
    1
}
fn default_nb_saved_elites() -> usize {
    1
}
fn default_tournament_size() -> usize {
    3
}
fn default_nb_generations() -> usize {
    500
}
fn default_crossover_probability() -> f64 {
    0.2
}
fn default_mutation_probability() -> f64 {
    0.5
}

/// Strategy used to build the next generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectionMode {
    /// Elites for every objective, then tournaments over all objectives
    /// combined. Each pool draws its own objective.
    #[default]
    MultiObjective,
    /// The population is shared evenly between objectives and each share is
    /// filled by a single-objective tournament with its own elites.
    SplitPerObjective,
}

/// Novelty search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoveltyConfig {
    /// Whether novelty scoring runs after each evaluation phase.
    #[serde(default)]
    pub enabled: bool,
    /// Individuals strictly above this novelty join the archive.
    #[serde(default = "default_min_novelty")]
    pub min_novelty_for_archive: f64,
    /// Neighbourhood size used for the novelty score.
    #[serde(default = "default_k_nearest")]
    pub k_nearest: usize,
}

impl Default for NoveltyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_novelty_for_archive: default_min_novelty(),
            k_nearest: default_k_nearest(),
        }
    }
}

fn default_min_novelty() -> f64 {
    1.0
}
fn default_k_nearest() -> usize {
    15
}

/// Checkpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Whether anything is written to disk.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Parent directory of the per-run output folder.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Population and archive snapshots are written every `interval`
    /// generations.
    #[serde(default = "default_interval")]
    pub interval: usize,
    /// Write the whole population at each snapshot.
    #[serde(default = "default_true")]
    pub save_population: bool,
    /// Write the novelty archive at each snapshot.
    #[serde(default = "default_true")]
    pub save_archive: bool,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output_dir: default_output_dir(),
            interval: default_interval(),
            save_population: true,
            save_archive: true,
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("evos")
}
fn default_interval() -> usize {
    1
}

impl RunConfig {
    pub fn with_population_size(mut self, size: usize) -> Self {
        self.population_size = size;
        self
    }

    pub fn with_nb_elites(mut self, n: usize) -> Self {
        self.nb_elites = n;
        self
    }

    pub fn with_nb_saved_elites(mut self, n: usize) -> Self {
        self.nb_saved_elites = n;
        self
    }

    pub fn with_tournament_size(mut self, n: usize) -> Self {
        self.tournament_size = n;
        self
    }

    pub fn with_nb_generations(mut self, n: usize) -> Self {
        self.nb_generations = n;
        self
    }

    /// Set the crossover probability, clamped into `[0, 1]`.
    pub fn with_crossover_probability(mut self, p: f64) -> Self {
        self.crossover_probability = clamp_probability(p);
        self
    }

    /// Set the mutation probability, clamped into `[0, 1]`.
    pub fn with_mutation_probability(mut self, p: f64) -> Self {
        self.mutation_probability = clamp_probability(p);
        self
    }

    pub fn with_objective_weight(mut self, objective: impl Into<String>, weight: f64) -> Self {
        self.objective_weights.insert(objective.into(), weight);
        self
    }

    pub fn with_selection(mut self, mode: SelectionMode) -> Self {
        self.selection = mode;
        self
    }

    /// Enable novelty search with the given neighbourhood and archive threshold.
    pub fn with_novelty(mut self, k_nearest: usize, min_novelty_for_archive: f64) -> Self {
        self.novelty = NoveltyConfig {
            enabled: true,
            min_novelty_for_archive,
            k_nearest,
        };
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.checkpoint.output_dir = dir.into();
        self
    }

    pub fn with_checkpoint_interval(mut self, interval: usize) -> Self {
        self.checkpoint.interval = interval;
        self
    }

    /// Disable every checkpoint write.
    pub fn without_checkpoints(mut self) -> Self {
        self.checkpoint.enabled = false;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    /// Validate the configuration.
    ///
    /// Objective-dependent checks (elites against objective count) run at
    /// selection time, once the objective names are known.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size < 2 {
            return Err(ConfigError::PopulationTooSmall(self.population_size));
        }
        if self.nb_elites >= self.population_size {
            return Err(ConfigError::TooManyElites {
                elites: self.nb_elites,
                population: self.population_size,
            });
        }
        if self.tournament_size == 0 {
            return Err(ConfigError::InvalidTournamentSize);
        }

        check_probability(self.crossover_probability, "crossover")?;
        check_probability(self.mutation_probability, "mutation")?;

        if self.novelty.enabled && self.novelty.k_nearest == 0 {
            return Err(ConfigError::InvalidNeighbourhood);
        }
        if self.checkpoint.interval == 0 {
            return Err(ConfigError::InvalidCheckpointInterval);
        }
        if self.threads == Some(0) {
            return Err(ConfigError::InvalidThreadCount);
        }

        Ok(())
    }
}

fn clamp_probability(p: f64) -> f64 {
    if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) }
}

fn check_probability(p: f64, name: &'static str) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(ConfigError::InvalidProbability { name, value: p })
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Population size must be at least 2 (got {0})")]
    PopulationTooSmall(usize),
    #[error("{elites} elites per objective cannot fit in a population of {population}")]
    TooManyElites { elites: usize, population: usize },
    #[error("Tournament size must be at least 1")]
    InvalidTournamentSize,
    #[error("{name} probability must lie in [0, 1] (got {value})")]
    InvalidProbability { name: &'static str, value: f64 },
    #[error("Novelty neighbourhood size must be at least 1")]
    InvalidNeighbourhood,
    #[error("Checkpoint interval must be at least 1")]
    InvalidCheckpointInterval,
    #[error("Thread count must be at least 1")]
    InvalidThreadCount,
    #[error("Configuration cannot change once the run has started")]
    RunInProgress,
}

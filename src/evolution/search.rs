//! The generational run controller.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::checkpoint::{self, CheckpointError, CheckpointWriter};
use crate::distributed::{Coordinator, Link, TransportError};
use crate::schema::{ConfigError, GenerationStats, RunConfig, StatsLog};

use super::evaluation::{EvaluationError, Evaluator, LocalScheduler};
use super::genome::{EvoRng, Genome};
use super::individual::Individual;
use super::novelty::{NoveltyArchive, NoveltyError, NoveltyReport};
use super::selection::{SelectionError, Selector, objectives};

/// Any failure that aborts a run.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Selection failed: {0}")]
    Selection(#[from] SelectionError),
    #[error("Novelty failed: {0}")]
    Novelty(#[from] NoveltyError),
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
    #[error("Distribution failed: {0}")]
    Transport(#[from] TransportError),
    #[error("Checkpoint failed: {0}")]
    Checkpoint(#[from] CheckpointError),
    #[error("Cannot build the evaluation thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Lifecycle of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// No generation processed since the population was (re)initialized.
    Uninitialized,
    /// Generations are being processed; the configuration is frozen.
    Running,
    /// The generation budget is spent or the run was cancelled.
    Finished,
}

/// Reason a run or a step stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The last budgeted generation was processed.
    MaxGenerations,
    /// `step(n)` processed its `n` generations.
    StepsCompleted,
    /// The cancel handle was raised.
    Cancelled,
}

/// What a progress callback sees after each generation.
#[derive(Debug, Clone)]
pub struct GenerationProgress {
    pub generation: usize,
    /// Evaluations actually performed this generation.
    pub evaluations: usize,
    pub stats: GenerationStats,
    /// Novelty pass outcome, when novelty is enabled.
    pub novelty: Option<NoveltyReport>,
    pub archive_size: usize,
}

/// Outcome of [`EvolutionEngine::run`] or [`EvolutionEngine::step`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Generations processed by this call.
    pub generations: usize,
    /// Index of the last processed generation.
    pub last_generation: usize,
    /// Evaluations performed by this call.
    pub total_evaluations: usize,
    pub elapsed_seconds: f64,
    pub stop_reason: StopReason,
    /// Folder holding the checkpoints, if any were written.
    pub run_dir: Option<PathBuf>,
}

/// Generational multi-objective search over genomes `G` scored by `E`.
///
/// Each generation: evaluate (locally or scattered over workers), score
/// novelty, aggregate statistics, write checkpoints, then build the next
/// population by elitism and tournaments. The next population is built
/// lazily at the start of the following generation, so between calls
/// [`population`](Self::population) always holds evaluated individuals.
pub struct EvolutionEngine<G, E> {
    config: RunConfig,
    evaluator: E,
    scheduler: LocalScheduler,
    coordinator: Option<Coordinator<Box<dyn Link>>>,
    selector: Selector,
    archive: NoveltyArchive<G>,
    population: Vec<Individual<G>>,
    generation: usize,
    needs_selection: bool,
    stats: StatsLog,
    writer: Option<CheckpointWriter>,
    total_evaluations: usize,
    cancelled: Arc<AtomicBool>,
    phase: RunPhase,
}

impl<G: Genome, E: Evaluator<G>> EvolutionEngine<G, E> {
    /// Create an engine. Fails on an invalid configuration.
    pub fn new(config: RunConfig, evaluator: E) -> Result<Self, EvolutionError> {
        config.validate()?;
        let scheduler = LocalScheduler::new(config.threads)?;
        let selector = Selector::new(&config, EvoRng::from_optional_seed(config.random_seed));
        let archive = NoveltyArchive::new(
            config.novelty.k_nearest,
            config.novelty.min_novelty_for_archive,
        );

        Ok(Self {
            config,
            evaluator,
            scheduler,
            coordinator: None,
            selector,
            archive,
            population: Vec::new(),
            generation: 0,
            needs_selection: false,
            stats: StatsLog::new(),
            writer: None,
            total_evaluations: 0,
            cancelled: Arc::new(AtomicBool::new(false)),
            phase: RunPhase::Uninitialized,
        })
    }

    /// Scatter every evaluation phase over `links`, one per worker.
    pub fn with_workers(mut self, links: Vec<Box<dyn Link>>) -> Self {
        self.coordinator = Some(Coordinator::new(links));
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Replace the configuration. Refused while a run is in progress.
    pub fn set_config(&mut self, config: RunConfig) -> Result<(), EvolutionError> {
        if self.phase == RunPhase::Running {
            return Err(ConfigError::RunInProgress.into());
        }
        config.validate()?;

        if config.threads != self.config.threads {
            self.scheduler = LocalScheduler::new(config.threads)?;
        }
        self.selector = Selector::new(&config, EvoRng::from_optional_seed(config.random_seed));
        let entries = self.archive.entries().to_vec();
        self.archive = NoveltyArchive::new(
            config.novelty.k_nearest,
            config.novelty.min_novelty_for_archive,
        )
        .with_entries(entries);
        self.config = config;
        Ok(())
    }

    /// Get cancellation handle. Raising it stops the run before the next
    /// generation starts.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Fill the population with random genomes and restart at generation 0.
    pub fn initialize(&mut self) -> Result<(), EvolutionError> {
        let size = self.config.population_size;
        let rng = self.selector.rng();
        let genomes: Vec<G> = (0..size).map(|_| G::random(rng)).collect();
        self.reset_with(genomes, 0)
    }

    /// Fill the population from a generator closure.
    pub fn initialize_with<F>(&mut self, mut generator: F) -> Result<(), EvolutionError>
    where
        F: FnMut(&mut EvoRng) -> G,
    {
        let size = self.config.population_size;
        let rng = self.selector.rng();
        let genomes: Vec<G> = (0..size).map(|_| generator(rng)).collect();
        self.reset_with(genomes, 0)
    }

    /// Resume from a population snapshot. The snapshot's generation is
    /// evaluated again.
    pub fn load_population(&mut self, path: &Path) -> Result<(), EvolutionError> {
        let (population, generation) = checkpoint::load_population::<G>(path)?;
        self.reset_population(population, generation)
    }

    /// Replace the novelty archive with a snapshot.
    pub fn load_archive(&mut self, path: &Path) -> Result<(), EvolutionError> {
        if self.phase == RunPhase::Running {
            return Err(ConfigError::RunInProgress.into());
        }
        let entries = checkpoint::load_archive::<G>(path)?;
        self.archive = NoveltyArchive::new(
            self.config.novelty.k_nearest,
            self.config.novelty.min_novelty_for_archive,
        )
        .with_entries(entries);
        Ok(())
    }

    fn reset_with(&mut self, genomes: Vec<G>, generation: usize) -> Result<(), EvolutionError> {
        let population = genomes.into_iter().map(Individual::new).collect();
        self.reset_population(population, generation)
    }

    fn reset_population(
        &mut self,
        population: Vec<Individual<G>>,
        generation: usize,
    ) -> Result<(), EvolutionError> {
        if self.phase == RunPhase::Running {
            return Err(ConfigError::RunInProgress.into());
        }
        self.population = population;
        self.generation = generation;
        self.needs_selection = false;
        self.phase = RunPhase::Uninitialized;
        Ok(())
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Index of the current (or last processed) generation.
    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn population(&self) -> &[Individual<G>] {
        &self.population
    }

    pub fn archive(&self) -> &NoveltyArchive<G> {
        &self.archive
    }

    pub fn stats(&self) -> &StatsLog {
        &self.stats
    }

    /// Total evaluations performed since the engine was created.
    pub fn total_evaluations(&self) -> usize {
        self.total_evaluations
    }

    pub fn run_dir(&self) -> Option<&Path> {
        self.writer.as_ref().map(CheckpointWriter::run_dir)
    }

    /// Best individual of the current population on `objective`.
    pub fn best(&self, objective: &str) -> Option<&Individual<G>> {
        self.population
            .iter()
            .filter(|i| i.evaluated)
            .filter_map(|i| i.fitness(objective).map(|s| (s, i)))
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, i)| i)
    }

    /// Process exactly `n` more generations, ignoring the generation budget.
    pub fn step(&mut self, n: usize) -> Result<RunSummary, EvolutionError> {
        let start = Instant::now();
        let evaluations_before = self.total_evaluations;
        self.prepare()?;

        let mut processed = 0;
        let mut stop_reason = StopReason::StepsCompleted;
        while processed < n {
            if self.cancelled.load(Ordering::Relaxed) {
                stop_reason = StopReason::Cancelled;
                break;
            }
            self.run_generation()?;
            processed += 1;
        }
        if stop_reason == StopReason::Cancelled {
            self.phase = RunPhase::Finished;
        }

        Ok(self.summary(start, processed, evaluations_before, stop_reason))
    }

    /// Run until the generation budget is spent or the run is cancelled.
    pub fn run(&mut self) -> Result<RunSummary, EvolutionError> {
        self.run_with_callback(|_| {})
    }

    /// Run evolution with progress callback.
    pub fn run_with_callback<F>(&mut self, mut callback: F) -> Result<RunSummary, EvolutionError>
    where
        F: FnMut(&GenerationProgress),
    {
        let start = Instant::now();
        let evaluations_before = self.total_evaluations;
        self.prepare()?;
        log::info!(
            "Starting evolution: {} individuals, {} generations, {} threads, {} workers",
            self.config.population_size,
            self.config.nb_generations,
            self.scheduler.threads(),
            self.coordinator.as_ref().map_or(0, Coordinator::workers)
        );

        let mut processed = 0;
        let stop_reason = loop {
            if self.cancelled.load(Ordering::Relaxed) {
                log::warn!("Evolution cancelled at generation {}", self.generation);
                break StopReason::Cancelled;
            }
            let progress = self.run_generation()?;
            processed += 1;
            callback(&progress);

            if progress.generation >= self.config.nb_generations {
                break StopReason::MaxGenerations;
            }
        };

        self.phase = RunPhase::Finished;
        self.shutdown_workers()?;
        Ok(self.summary(start, processed, evaluations_before, stop_reason))
    }

    /// Release the workers. They exit once they read the message.
    pub fn shutdown_workers(&mut self) -> Result<(), EvolutionError> {
        if let Some(mut coordinator) = self.coordinator.take() {
            coordinator.shutdown()?;
            log::info!("Released {} workers", coordinator.workers());
        }
        Ok(())
    }

    fn prepare(&mut self) -> Result<(), EvolutionError> {
        if self.population.is_empty() {
            self.initialize()?;
        }
        self.phase = RunPhase::Running;
        Ok(())
    }

    fn summary(
        &self,
        start: Instant,
        generations: usize,
        evaluations_before: usize,
        stop_reason: StopReason,
    ) -> RunSummary {
        RunSummary {
            generations,
            last_generation: self.generation,
            total_evaluations: self.total_evaluations - evaluations_before,
            elapsed_seconds: start.elapsed().as_secs_f64(),
            stop_reason,
            run_dir: self.run_dir().map(Path::to_path_buf),
        }
    }

    /// A failed generation ends the run so the engine can be reset.
    fn run_generation(&mut self) -> Result<GenerationProgress, EvolutionError> {
        let result = self.evolve_generation();
        if let Err(e) = &result {
            log::error!("Generation {} failed: {}", self.generation, e);
            self.phase = RunPhase::Finished;
        }
        result
    }

    /// Evaluate, score, record and checkpoint one generation.
    fn evolve_generation(&mut self) -> Result<GenerationProgress, EvolutionError> {
        if self.needs_selection {
            self.population = self
                .selector
                .next_generation(&self.population, self.config.population_size)?;
            self.generation += 1;
            self.needs_selection = false;
        }

        let started = Instant::now();
        let evaluations = match self.coordinator.as_mut() {
            Some(coordinator) => coordinator.evaluate(
                self.generation,
                &mut self.population,
                &self.scheduler,
                &self.evaluator,
            )?,
            None => self
                .scheduler
                .evaluate(&mut self.population, &self.evaluator)?,
        };

        let novelty = if self.config.novelty.enabled {
            Some(self.archive.update(&mut self.population)?)
        } else {
            None
        };

        let objectives = objectives(&self.population)?;
        let stats = GenerationStats::from_population(
            self.generation,
            &self.population,
            started.elapsed().as_secs_f64(),
        );
        log::info!("{}", stats);

        self.stats.push(stats.clone());
        self.save_checkpoints(&objectives)?;

        self.total_evaluations += evaluations;
        self.needs_selection = true;

        Ok(GenerationProgress {
            generation: self.generation,
            evaluations,
            stats,
            novelty,
            archive_size: self.archive.len(),
        })
    }

    fn save_checkpoints(&mut self, objectives: &[String]) -> Result<(), EvolutionError> {
        let settings = &self.config.checkpoint;
        if !settings.enabled {
            return Ok(());
        }
        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => CheckpointWriter::create(&settings.output_dir, self.evaluator.name())?,
        };
        let writer = self.writer.insert(writer);
        let generation = self.generation;

        if generation % settings.interval == 0 {
            if settings.save_population {
                writer.save_population(generation, &self.population)?;
            }
            if self.config.novelty.enabled && settings.save_archive {
                writer.save_archive(generation, self.archive.entries())?;
            }
        }
        writer.save_bests(
            generation,
            &self.population,
            objectives,
            self.config.nb_saved_elites,
        )?;
        if let Some(stats) = self.stats.last() {
            writer.save_generation_stats(stats)?;
        }
        writer.save_stats_csv(&self.stats)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::genome::GenomeError;
    use crate::evolution::novelty::NOVELTY_OBJECTIVE;

    #[derive(Debug, Clone, PartialEq)]
    struct Level(i64);

    impl Genome for Level {
        fn random(rng: &mut EvoRng) -> Self {
            Level(rng.index(100) as i64)
        }
        fn mutate(&mut self, rng: &mut EvoRng) {
            self.0 += rng.index(5) as i64 - 2;
        }
        fn crossover(&self, other: &Self, _rng: &mut EvoRng) -> Self {
            Level((self.0 + other.0) / 2)
        }
        fn to_text(&self) -> Result<String, GenomeError> {
            Ok(self.0.to_string())
        }
        fn from_text(text: &str) -> Result<Self, GenomeError> {
            text.parse()
                .map(Level)
                .map_err(|e| GenomeError::Invalid(format!("{e}")))
        }
    }

    fn level(ind: &mut Individual<Level>) -> Result<(), EvaluationError> {
        let v = ind.genome.0 as f64;
        ind.set_fitness("level", v);
        ind.footprint = vec![vec![v]];
        Ok(())
    }

    type LevelFn = fn(&mut Individual<Level>) -> Result<(), EvaluationError>;

    fn engine(config: RunConfig) -> EvolutionEngine<Level, LevelFn> {
        EvolutionEngine::new(config, level as LevelFn).unwrap()
    }

    fn config() -> RunConfig {
        RunConfig::default()
            .with_population_size(12)
            .with_nb_generations(3)
            .with_random_seed(11)
            .with_threads(2)
            .without_checkpoints()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = EvolutionEngine::<Level, _>::new(
            RunConfig::default().with_population_size(1),
            level as LevelFn,
        );
        assert!(matches!(
            result,
            Err(EvolutionError::Config(ConfigError::PopulationTooSmall(1)))
        ));
    }

    #[test]
    fn test_generations_inclusive_budget() {
        let mut engine = engine(config());
        let summary = engine.run().unwrap();

        assert_eq!(summary.stop_reason, StopReason::MaxGenerations);
        assert_eq!(summary.generations, 4);
        assert_eq!(summary.last_generation, 3);
        assert_eq!(engine.stats().len(), 4);
        assert_eq!(engine.phase(), RunPhase::Finished);
        assert!(engine.population().iter().all(|i| i.evaluated));
        assert_eq!(engine.population().len(), 12);
        assert!(summary.run_dir.is_none());
    }

    #[test]
    fn test_step_ignores_budget() {
        let mut engine = engine(config().with_nb_generations(1));
        let summary = engine.step(5).unwrap();
        assert_eq!(summary.stop_reason, StopReason::StepsCompleted);
        assert_eq!(summary.generations, 5);
        assert_eq!(engine.generation(), 4);
        assert_eq!(engine.phase(), RunPhase::Running);

        engine.step(2).unwrap();
        let generations: Vec<usize> = engine
            .stats()
            .entries()
            .iter()
            .map(|s| s.generation)
            .collect();
        assert_eq!(generations, (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn test_config_frozen_while_running() {
        let mut engine = engine(config());
        engine.set_config(config().with_population_size(20)).unwrap();
        engine.step(1).unwrap();
        assert!(matches!(
            engine.set_config(config()),
            Err(EvolutionError::Config(ConfigError::RunInProgress))
        ));
        assert!(matches!(
            engine.initialize(),
            Err(EvolutionError::Config(ConfigError::RunInProgress))
        ));

        engine.run().unwrap();
        assert!(engine.set_config(config()).is_ok());
    }

    #[test]
    fn test_cancellation() {
        let mut engine = engine(config().with_nb_generations(100));
        let cancel = engine.cancel_handle();
        let summary = engine
            .run_with_callback(|progress| {
                if progress.generation == 2 {
                    cancel.store(true, Ordering::Relaxed);
                }
            })
            .unwrap();

        assert_eq!(summary.stop_reason, StopReason::Cancelled);
        assert_eq!(summary.generations, 3);
        assert_eq!(engine.stats().len(), 3);
    }

    #[test]
    fn test_initialize_with_generator() {
        let mut engine = engine(config().with_nb_generations(0));
        engine.initialize_with(|_| Level(7)).unwrap();
        let summary = engine.run().unwrap();
        assert_eq!(summary.generations, 1);
        assert_eq!(summary.total_evaluations, 12);
        assert!(engine.population().iter().all(|i| i.genome == Level(7)));
        assert_eq!(engine.best("level").map(|i| i.genome.0), Some(7));
    }

    #[test]
    fn test_reused_evaluations_not_counted() {
        let config = config()
            .with_crossover_probability(0.0)
            .with_mutation_probability(0.0);
        let mut engine = engine(config);
        let summary = engine.step(3).unwrap();
        // Without crossover or mutation every child inherits its parent's
        // evaluation.
        assert_eq!(summary.total_evaluations, 12);
        assert_eq!(engine.stats().last().unwrap().global.n_evals, 0);
    }

    #[test]
    fn test_novelty_recorded_as_objective() {
        let mut engine = engine(config().with_novelty(3, 0.5));
        let mut reports = Vec::new();
        engine
            .run_with_callback(|progress| reports.push(progress.novelty.clone()))
            .unwrap();

        assert!(reports.iter().all(Option::is_some));
        assert!(
            engine
                .population()
                .iter()
                .all(|i| i.fitness(NOVELTY_OBJECTIVE).is_some())
        );
        assert!(engine.stats().last().unwrap().best(NOVELTY_OBJECTIVE).is_some());

        let sizes: Vec<usize> = reports
            .iter()
            .flatten()
            .map(|r| r.previous_size + r.added)
            .collect();
        assert!(sizes.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*sizes.last().unwrap(), engine.archive().len());
    }

    #[test]
    fn test_evaluation_error_aborts() {
        let failing = |_: &mut Individual<Level>| -> Result<(), EvaluationError> {
            Err(EvaluationError("crashed".to_string()))
        };
        let mut engine = EvolutionEngine::<Level, _>::new(config(), failing).unwrap();
        assert!(matches!(
            engine.run(),
            Err(EvolutionError::Evaluation(_))
        ));
        assert_eq!(engine.phase(), RunPhase::Finished);
    }

    #[test]
    fn test_empty_tournament_never_reaches_selection() {
        let mut engine = engine(config());
        assert!(matches!(
            engine.set_config(config().with_tournament_size(0)),
            Err(EvolutionError::Config(ConfigError::InvalidTournamentSize))
        ));
        assert_eq!(engine.config().tournament_size, 3);
    }

    #[test]
    fn test_engine_reusable_after_failed_step() {
        let flaky = |ind: &mut Individual<Level>| -> Result<(), EvaluationError> {
            if ind.genome.0 < 0 {
                return Err(EvaluationError("negative level".to_string()));
            }
            level(ind)
        };
        let mut engine = EvolutionEngine::<Level, _>::new(config(), flaky).unwrap();
        engine.initialize_with(|_| Level(-1)).unwrap();
        assert!(engine.step(1).is_err());
        assert_eq!(engine.phase(), RunPhase::Finished);

        engine.set_config(config().with_population_size(10)).unwrap();
        engine.initialize_with(|_| Level(4)).unwrap();
        let summary = engine.step(2).unwrap();
        assert_eq!(summary.generations, 2);
        assert_eq!(engine.population().len(), 10);
    }
}

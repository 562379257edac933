//! Morpho Evo - Multi-objective novelty-driven evolution of simulated controllers.
//!
//! This crate provides a generational evolutionary search engine: a
//! population of genomes is scored by a user supplied evaluator on one or
//! more objectives, optionally rewarded for behavioral novelty, and bred into
//! the next generation by per-objective elitism and tournaments.
//!
//! # Architecture
//!
//! The crate is split into four main modules:
//!
//! - `schema`: Run configuration, serialized individuals and statistics
//! - `evolution`: Genome contract, evaluation, novelty, selection and the
//!   run controller
//! - `distributed`: Scatter/gather evaluation across worker processes
//! - `checkpoint`: Run folders, population snapshots and resume
//!
//! # Example
//!
//! ```rust,no_run
//! use morpho_evo::demo::{DemoEvaluator, Morphology};
//! use morpho_evo::{EvolutionEngine, RunConfig};
//!
//! let config = RunConfig::default()
//!     .with_population_size(100)
//!     .with_nb_generations(50)
//!     .with_novelty(15, 0.5);
//!
//! let evaluator = DemoEvaluator::default();
//! let mut engine = EvolutionEngine::<Morphology, _>::new(config, evaluator).unwrap();
//! let summary = engine.run().unwrap();
//!
//! println!("{} generations, {} evaluations", summary.generations, summary.total_evaluations);
//! if let Some(best) = engine.best("distance") {
//!     println!("Best distance: {:?}", best.fitness("distance"));
//! }
//! ```

pub mod checkpoint;
pub mod demo;
pub mod distributed;
pub mod evolution;
pub mod schema;

// Re-export commonly used types
pub use evolution::{
    EvaluationError, Evaluator, EvoRng, EvolutionEngine, EvolutionError, Genome, GenomeError,
    Individual, RunSummary,
};
pub use schema::{GenerationStats, RunConfig, StatsLog};

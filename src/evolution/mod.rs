//! Generational multi-objective evolutionary search.
//!
//! # Overview
//!
//! - **Genome contract** (`genome`): what the engine needs from a genome, and
//!   the seeded random generator handed to genome operators
//! - **Individuals** (`individual`): genome, scores, footprint and evaluation
//!   bookkeeping
//! - **Evaluation** (`evaluation`): the evaluator contract and the local
//!   thread-pool scheduler
//! - **Novelty** (`novelty`): footprint distance, k-nearest-neighbour novelty
//!   and the archive of novel behaviors
//! - **Selection** (`selection`): per-objective elitism and multi-objective
//!   tournaments
//! - **Search** (`search`): the run controller tying everything together
//!
//! # Example
//!
//! ```rust,no_run
//! use morpho_evo::evolution::{
//!     EvaluationError, EvoRng, EvolutionEngine, Genome, GenomeError, Individual,
//! };
//! use morpho_evo::schema::RunConfig;
//!
//! #[derive(Clone)]
//! struct Height(f64);
//!
//! impl Genome for Height {
//!     fn random(rng: &mut EvoRng) -> Self {
//!         Height(rng.index(100) as f64)
//!     }
//!     fn mutate(&mut self, _rng: &mut EvoRng) {
//!         self.0 += 1.0;
//!     }
//!     fn crossover(&self, other: &Self, _rng: &mut EvoRng) -> Self {
//!         Height((self.0 + other.0) / 2.0)
//!     }
//!     fn to_text(&self) -> Result<String, GenomeError> {
//!         Ok(self.0.to_string())
//!     }
//!     fn from_text(text: &str) -> Result<Self, GenomeError> {
//!         text.parse().map(Height).map_err(|e| GenomeError::Invalid(e.to_string()))
//!     }
//! }
//!
//! let evaluator = |ind: &mut Individual<Height>| -> Result<(), EvaluationError> {
//!     let h = ind.genome.0;
//!     ind.set_fitness("height", h);
//!     ind.footprint = vec![vec![h]];
//!     Ok(())
//! };
//!
//! let config = RunConfig::default().with_population_size(50).with_nb_generations(20);
//! let mut engine = EvolutionEngine::<Height, _>::new(config, evaluator).unwrap();
//! let summary = engine.run_with_callback(|progress| {
//!     println!("Generation {}: best = {:?}",
//!         progress.generation, progress.stats.best("height"));
//! }).unwrap();
//! println!("{} evaluations in {:.1}s", summary.total_evaluations, summary.elapsed_seconds);
//! ```

mod bounded;
mod evaluation;
mod genome;
mod individual;
mod novelty;
mod search;
mod selection;

pub use bounded::{BoundedBest, Keep};
pub use evaluation::{EvaluationError, Evaluator, LocalScheduler, NamedEvaluator};
pub use genome::{EvoRng, Genome, GenomeError, json_from_text, json_to_text};
pub use individual::{Footprint, Individual};
pub use novelty::{
    NOVELTY_OBJECTIVE, NoveltyArchive, NoveltyError, NoveltyReport, footprint_distance,
    knn_average,
};
pub use search::{
    EvolutionEngine, EvolutionError, GenerationProgress, RunPhase, RunSummary, StopReason,
};
pub use selection::{SelectionError, Selector, elite_indices, elites, objectives};

//! Evaluation contract and the local thread-pool scheduler.

use std::time::Instant;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use super::genome::Genome;
use super::individual::Individual;

/// Fatal failure raised by an evaluator. Never retried.
#[derive(Debug, thiserror::Error)]
#[error("Evaluation failed: {0}")]
pub struct EvaluationError(pub String);

/// Runs a simulation for one individual and writes its fitnesses, footprint
/// and diagnostics.
///
/// Called concurrently on distinct individuals. Recoverable simulation
/// problems should end up as a low fitness, not as an error.
pub trait Evaluator<G>: Send + Sync {
    fn evaluate(&self, individual: &mut Individual<G>) -> Result<(), EvaluationError>;

    /// Name recorded in checkpoints and used for the run folder.
    fn name(&self) -> &str {
        "evaluator"
    }
}

impl<G, F> Evaluator<G> for F
where
    F: Fn(&mut Individual<G>) -> Result<(), EvaluationError> + Send + Sync,
{
    fn evaluate(&self, individual: &mut Individual<G>) -> Result<(), EvaluationError> {
        self(individual)
    }
}

/// Evaluator with an explicit name.
pub struct NamedEvaluator<E> {
    name: String,
    inner: E,
}

impl<E> NamedEvaluator<E> {
    pub fn new(name: impl Into<String>, inner: E) -> Self {
        Self {
            name: name.into(),
            inner,
        }
    }
}

impl<G, E: Evaluator<G>> Evaluator<G> for NamedEvaluator<E> {
    fn evaluate(&self, individual: &mut Individual<G>) -> Result<(), EvaluationError> {
        self.inner.evaluate(individual)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Evaluates every pending individual on a fixed-size thread pool.
///
/// Work is handed out in chunks of at most two individuals so that one slow
/// simulation does not hold up a large static share of the population.
pub struct LocalScheduler {
    pool: ThreadPool,
}

const MAX_CHUNK: usize = 2;

impl LocalScheduler {
    /// Create a scheduler. `threads = None` uses one thread per core.
    pub fn new(threads: Option<usize>) -> Result<Self, rayon::ThreadPoolBuildError> {
        let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("evaluator-{i}"));
        if let Some(n) = threads {
            builder = builder.num_threads(n);
        }
        Ok(Self {
            pool: builder.build()?,
        })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Evaluate every individual with `evaluated == false`.
    ///
    /// Individuals that inherited an evaluation are flagged
    /// `was_already_evaluated` and report zero evaluation time. Returns the
    /// number of evaluations performed.
    pub fn evaluate<G, E>(
        &self,
        population: &mut [Individual<G>],
        evaluator: &E,
    ) -> Result<usize, EvaluationError>
    where
        G: Genome,
        E: Evaluator<G> + ?Sized,
    {
        self.pool.install(|| {
            population
                .par_iter_mut()
                .with_max_len(MAX_CHUNK)
                .map(|individual| evaluate_one(individual, evaluator))
                .try_reduce(|| 0, |a, b| Ok(a + b))
        })
    }
}

fn evaluate_one<G, E>(
    individual: &mut Individual<G>,
    evaluator: &E,
) -> Result<usize, EvaluationError>
where
    G: Genome,
    E: Evaluator<G> + ?Sized,
{
    let performed = if individual.evaluated {
        individual.eval_time = 0.0;
        individual.was_already_evaluated = true;
        0
    } else {
        let start = Instant::now();
        individual.genome.reset();
        evaluator.evaluate(individual)?;
        individual.eval_time = start.elapsed().as_secs_f64();
        individual.evaluated = true;
        individual.was_already_evaluated = false;
        1
    };

    log::debug!(
        "{:?} {:.3}s{}",
        individual.fitnesses,
        individual.eval_time,
        if individual.was_already_evaluated {
            " (already evaluated)"
        } else {
            ""
        }
    );
    Ok(performed)
}

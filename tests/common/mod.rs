//! Shared integer genome for integration tests.

#![allow(dead_code)]

use morpho_evo::evolution::{EvaluationError, EvoRng, Genome, GenomeError, Individual};

#[derive(Debug, Clone, PartialEq)]
pub struct Int(pub i64);

impl Genome for Int {
    fn random(rng: &mut EvoRng) -> Self {
        Int(rng.index(1000) as i64)
    }

    fn mutate(&mut self, rng: &mut EvoRng) {
        self.0 += rng.index(21) as i64 - 10;
    }

    /// Average of both parents.
    fn crossover(&self, other: &Self, _rng: &mut EvoRng) -> Self {
        Int((self.0 + other.0) / 2)
    }

    fn to_text(&self) -> Result<String, GenomeError> {
        Ok(self.0.to_string())
    }

    fn from_text(text: &str) -> Result<Self, GenomeError> {
        text.trim()
            .parse()
            .map(Int)
            .map_err(|e| GenomeError::Invalid(format!("{e}")))
    }
}

/// Single objective `score = x`.
pub fn score(ind: &mut Individual<Int>) -> Result<(), EvaluationError> {
    let x = ind.genome.0 as f64;
    ind.set_fitness("score", x);
    ind.footprint = vec![vec![x]];
    Ok(())
}

/// Two opposed objectives `A = x` and `B = -x`.
pub fn opposed(ind: &mut Individual<Int>) -> Result<(), EvaluationError> {
    let x = ind.genome.0 as f64;
    ind.set_fitness("A", x);
    ind.set_fitness("B", -x);
    ind.footprint = vec![vec![x], vec![x * 0.5]];
    ind.infos = format!("x={x}");
    Ok(())
}

pub type IntEvaluator = fn(&mut Individual<Int>) -> Result<(), EvaluationError>;

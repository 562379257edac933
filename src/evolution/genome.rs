//! Genome contract and the random number generator handed to genome operators.

use rand::prelude::*;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Capabilities the engine needs from a genome.
///
/// The engine never looks inside a genome: it only creates, mutates, crosses
/// and serializes them. Operators receive the engine's [`EvoRng`] so that a
/// seeded run reproduces the same genomes.
pub trait Genome: Clone + Send + Sync + Sized {
    /// Generate a random genome. Used only when the population is created.
    fn random(rng: &mut EvoRng) -> Self;

    /// Mutate the genome in place.
    fn mutate(&mut self, rng: &mut EvoRng);

    /// Produce a new genome from `self` and `other`. Neither operand changes.
    fn crossover(&self, other: &Self, rng: &mut EvoRng) -> Self;

    /// Clear transient simulation state before an evaluation.
    fn reset(&mut self) {}

    /// Serialize to text. Must round-trip losslessly through [`Genome::from_text`].
    fn to_text(&self) -> Result<String, GenomeError>;

    /// Rebuild a genome from [`Genome::to_text`] output.
    fn from_text(text: &str) -> Result<Self, GenomeError>;
}

/// Genome serialization errors.
#[derive(Debug, thiserror::Error)]
pub enum GenomeError {
    #[error("Genome JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid genome text: {0}")]
    Invalid(String),
}

/// `to_text` helper for genomes that derive `Serialize`.
pub fn json_to_text<G: Serialize>(genome: &G) -> Result<String, GenomeError> {
    Ok(serde_json::to_string(genome)?)
}

/// `from_text` helper for genomes that derive `Deserialize`.
pub fn json_from_text<G: DeserializeOwned>(text: &str) -> Result<G, GenomeError> {
    Ok(serde_json::from_str(text)?)
}

/// Random number generator used for selection and genome operators.
///
/// Implements [`RngCore`], so every `rand::Rng` method is available on it.
#[derive(Debug, Clone)]
pub struct EvoRng {
    rng: StdRng,
}

impl EvoRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create with random seed.
    pub fn random() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Seeded if a seed is given, from entropy otherwise.
    pub fn from_optional_seed(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::random, Self::new)
    }

    /// Uniform index in `0..len`. `len` must be non-zero.
    pub fn index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    /// True with probability `p`. Draws one uniform value in `[0, 1)` even
    /// when `p` is 0 or 1, so the stream consumption does not depend on `p`.
    pub fn chance(&mut self, p: f64) -> bool {
        self.rng.r#gen::<f64>() < p
    }

    /// Generate next u64 for seeding child RNGs.
    pub fn next_seed(&mut self) -> u64 {
        self.rng.r#gen()
    }
}

impl RngCore for EvoRng {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.rng.try_fill_bytes(dest)
    }
}

//! A small self-contained problem used by the host binary and the examples:
//! a two-legged walker whose gait is described by a real vector.

use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::evolution::{
    EvaluationError, Evaluator, EvoRng, Genome, GenomeError, Individual, json_from_text,
    json_to_text,
};

/// Number of genes: amplitude, frequency and phase for each leg, plus
/// stride length and turning gain.
pub const GENE_COUNT: usize = 8;

/// Gait parameters, each in `[-1, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Morphology {
    pub genes: Vec<f64>,
    /// Standard deviation of the Gaussian mutation.
    #[serde(default = "default_sigma")]
    pub sigma: f64,
}

fn default_sigma() -> f64 {
    0.1
}

impl Morphology {
    pub fn new(genes: Vec<f64>) -> Self {
        Self {
            genes,
            sigma: default_sigma(),
        }
    }

    fn gene(&self, i: usize) -> f64 {
        self.genes.get(i).copied().unwrap_or(0.0)
    }
}

impl Genome for Morphology {
    fn random(rng: &mut EvoRng) -> Self {
        Self::new((0..GENE_COUNT).map(|_| rng.gen_range(-1.0..=1.0)).collect())
    }

    /// Gaussian mutation on one gene, clamped to the gene bounds.
    fn mutate(&mut self, rng: &mut EvoRng) {
        if self.genes.is_empty() {
            return;
        }
        let i = rng.index(self.genes.len());
        let noise: f64 = rng.sample(StandardNormal);
        self.genes[i] = (self.genes[i] + noise * self.sigma).clamp(-1.0, 1.0);
    }

    /// Uniform crossover.
    fn crossover(&self, other: &Self, rng: &mut EvoRng) -> Self {
        let genes = self
            .genes
            .iter()
            .zip(&other.genes)
            .map(|(&a, &b)| if rng.gen_bool(0.5) { a } else { b })
            .collect();
        Self {
            genes,
            sigma: self.sigma,
        }
    }

    fn to_text(&self) -> Result<String, GenomeError> {
        json_to_text(self)
    }

    fn from_text(text: &str) -> Result<Self, GenomeError> {
        let genome: Self = json_from_text(text)?;
        if genome.genes.len() != GENE_COUNT {
            return Err(GenomeError::Invalid(format!(
                "expected {GENE_COUNT} genes, found {}",
                genome.genes.len()
            )));
        }
        Ok(genome)
    }
}

/// Simulates a walker for a fixed number of steps.
///
/// Objectives: `distance` (straight-line displacement) and `efficiency`
/// (negated energy spent). The footprint samples the walker's position at
/// regular intervals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoEvaluator {
    pub steps: usize,
    pub snapshots: usize,
    pub dt: f64,
}

impl Default for DemoEvaluator {
    fn default() -> Self {
        Self {
            steps: 400,
            snapshots: 8,
            dt: 0.05,
        }
    }
}

impl Evaluator<Morphology> for DemoEvaluator {
    fn evaluate(&self, individual: &mut Individual<Morphology>) -> Result<(), EvaluationError> {
        if self.snapshots == 0 || self.steps < self.snapshots {
            return Err(EvaluationError(format!(
                "cannot take {} snapshots over {} steps",
                self.snapshots, self.steps
            )));
        }

        let g = &individual.genome;
        let stride = 0.5 + 0.5 * g.gene(6);
        let turn = g.gene(7);
        let legs = [
            (g.gene(0), 1.0 + 4.0 * g.gene(1).abs(), g.gene(2) * std::f64::consts::PI),
            (g.gene(3), 1.0 + 4.0 * g.gene(4).abs(), g.gene(5) * std::f64::consts::PI),
        ];

        let (mut x, mut y, mut heading, mut energy) = (0.0f64, 0.0f64, 0.0f64, 0.0f64);
        let interval = self.steps / self.snapshots;
        let mut footprint = Vec::with_capacity(self.snapshots);

        for step in 0..self.steps {
            let t = step as f64 * self.dt;
            let mut push = [0.0; 2];
            for (p, &(amplitude, frequency, phase)) in push.iter_mut().zip(&legs) {
                let s = (frequency * t + phase).sin();
                *p = amplitude * s.max(0.0);
                energy += (amplitude * frequency * (frequency * t + phase).cos()).abs() * self.dt;
            }

            heading += turn * (push[0] - push[1]) * self.dt;
            let speed = stride * (push[0] + push[1]);
            x += speed * heading.cos() * self.dt;
            y += speed * heading.sin() * self.dt;

            if (step + 1) % interval == 0 && footprint.len() < self.snapshots {
                footprint.push(vec![x, y]);
            }
        }

        individual.set_fitness("distance", (x * x + y * y).sqrt());
        individual.set_fitness("efficiency", -energy);
        individual.footprint = footprint;
        individual.infos = format!("x={x:.3} y={y:.3} energy={energy:.3}");
        Ok(())
    }

    fn name(&self) -> &str {
        "walker"
    }
}

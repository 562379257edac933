//! A genome together with its evaluation results.

use std::collections::BTreeMap;

use crate::schema::IndividualRecord;

use super::genome::{Genome, GenomeError};

/// Behavioral footprint: an ordered sequence of fixed-width numeric
/// snapshots taken during an evaluation.
pub type Footprint = Vec<Vec<f64>>;

/// A member of the population or of the novelty archive.
#[derive(Debug, Clone)]
pub struct Individual<G> {
    /// The genome.
    pub genome: G,
    /// Objective name to score. Higher is better.
    pub fitnesses: BTreeMap<String, f64>,
    /// Behavioral footprint used for novelty.
    pub footprint: Footprint,
    /// Free-form diagnostics written by the evaluator.
    pub infos: String,
    /// Whether the current fitnesses belong to the current genome.
    pub evaluated: bool,
    /// Set when this generation's instance inherited a previous evaluation.
    pub was_already_evaluated: bool,
    /// Seconds spent in this individual's own evaluation.
    pub eval_time: f64,
}

impl<G> Individual<G> {
    /// Wrap a fresh genome. The individual starts unevaluated.
    pub fn new(genome: G) -> Self {
        Self {
            genome,
            fitnesses: BTreeMap::new(),
            footprint: Vec::new(),
            infos: String::new(),
            evaluated: false,
            was_already_evaluated: false,
            eval_time: 0.0,
        }
    }

    /// Score on `objective`, if the evaluator produced one.
    pub fn fitness(&self, objective: &str) -> Option<f64> {
        self.fitnesses.get(objective).copied()
    }

    /// Record a score.
    pub fn set_fitness(&mut self, objective: impl Into<String>, score: f64) {
        self.fitnesses.insert(objective.into(), score);
    }

    /// Flag the genome as changed so the next evaluation phase runs it.
    pub fn invalidate(&mut self) {
        self.evaluated = false;
    }
}

impl<G: Genome> Individual<G> {
    /// Convert to a record for serialization.
    pub fn to_record(&self) -> Result<IndividualRecord, GenomeError> {
        Ok(IndividualRecord {
            dna: self.genome.to_text()?,
            fitnesses: self.fitnesses.clone(),
            footprint: self.footprint.clone(),
            infos: self.infos.clone(),
            evaluated: self.evaluated,
            already_eval: self.was_already_evaluated,
            eval_time: self.eval_time,
        })
    }

    /// Rebuild an individual from a record, keeping every flag.
    pub fn from_record(record: IndividualRecord) -> Result<Self, GenomeError> {
        Ok(Self {
            genome: G::from_text(&record.dna)?,
            fitnesses: record.fitnesses,
            footprint: record.footprint,
            infos: record.infos,
            evaluated: record.evaluated,
            was_already_evaluated: record.already_eval,
            eval_time: record.eval_time,
        })
    }
}

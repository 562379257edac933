//! Serialized forms of individuals and populations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Serializable snapshot of one individual.
///
/// Field names follow the population file format shared with worker
/// processes and earlier checkpoints. Non-finite scores and footprint values
/// are stored as `"inf"`, `"-inf"` or `"nan"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndividualRecord {
    /// Genome text.
    pub dna: String,
    /// Objective scores.
    #[serde(default, with = "super::float::map")]
    pub fitnesses: BTreeMap<String, f64>,
    /// Behavioral footprint.
    #[serde(default, with = "super::float::nested")]
    pub footprint: Vec<Vec<f64>>,
    /// Evaluator diagnostics.
    #[serde(default)]
    pub infos: String,
    #[serde(default)]
    pub evaluated: bool,
    #[serde(default, rename = "alreadyEval")]
    pub already_eval: bool,
    #[serde(default, rename = "evalTime", with = "super::float::scalar")]
    pub eval_time: f64,
}

/// A population or archive file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationFile {
    /// Name of the evaluator that produced the scores.
    #[serde(default)]
    pub evaluator: String,
    /// Generation the snapshot was taken at. Absent in archive files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<usize>,
    /// The individuals.
    pub population: Vec<IndividualRecord>,
}

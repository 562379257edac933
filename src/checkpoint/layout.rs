//! Folder and file naming.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::CheckpointError;

pub fn generation_dir_name(generation: usize) -> String {
    format!("gen{generation}")
}

pub fn population_file_name(generation: usize) -> String {
    format!("pop{generation}.pop")
}

pub fn archive_file_name(generation: usize) -> String {
    format!("archive{generation}.pop")
}

/// File name of the `rank`-th best genome on `objective`.
pub(crate) fn best_file_name(objective: &str, score: f64, rank: usize) -> String {
    format!("{objective}_{score}_{rank}.dna")
}

/// Create a fresh run folder `<output_dir>/<evaluator>_<n>`, using the
/// smallest `n` not already taken. Creates `output_dir` if needed.
pub fn create_run_dir(output_dir: &Path, evaluator: &str) -> Result<PathBuf, CheckpointError> {
    fs::create_dir_all(output_dir).map_err(|e| CheckpointError::io(output_dir, e))?;

    let mut n = 0usize;
    loop {
        let candidate = output_dir.join(format!("{evaluator}_{n}"));
        match fs::create_dir(&candidate) {
            Ok(()) => {
                log::info!("Writing results in {}", candidate.display());
                return Ok(candidate);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => n += 1,
            Err(e) => return Err(CheckpointError::io(candidate, e)),
        }
    }
}

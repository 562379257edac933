//! Loading snapshots back into a run.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::evolution::{Genome, Individual};
use crate::schema::PopulationFile;

use super::CheckpointError;

/// Parse a population or archive file.
pub fn read_population_file(path: &Path) -> Result<PopulationFile, CheckpointError> {
    let file = File::open(path).map_err(|e| CheckpointError::io(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| CheckpointError::json(path, e))
}

/// Load a population snapshot for resuming.
///
/// Only genomes are kept: every individual comes back unevaluated so the
/// resumed generation is scored again. Returns the individuals and the
/// snapshot's generation (0 when absent).
pub fn load_population<G: Genome>(
    path: &Path,
) -> Result<(Vec<Individual<G>>, usize), CheckpointError> {
    let file = read_population_file(path)?;
    let generation = file.generation.unwrap_or(0);
    let population = file
        .population
        .iter()
        .map(|record| Ok(Individual::new(G::from_text(&record.dna)?)))
        .collect::<Result<Vec<_>, CheckpointError>>()?;

    log::info!(
        "Loaded {} individuals from {} (generation {})",
        population.len(),
        path.display(),
        generation
    );
    Ok((population, generation))
}

/// Load an archive snapshot. Footprints and scores are kept since they are
/// what the archive is for.
pub fn load_archive<G: Genome>(path: &Path) -> Result<Vec<Individual<G>>, CheckpointError> {
    let file = read_population_file(path)?;
    let archive = file
        .population
        .into_iter()
        .map(|record| Individual::from_record(record).map_err(CheckpointError::from))
        .collect::<Result<Vec<_>, _>>()?;
    log::info!("Loaded {} archived footprints from {}", archive.len(), path.display());
    Ok(archive)
}

//! Writes snapshots, best genomes and statistics of a running search.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::evolution::{Genome, Individual, elites};
use crate::schema::{GenerationStats, PopulationFile, StatsLog};

use super::CheckpointError;
use super::layout::{
    archive_file_name, best_file_name, create_run_dir, generation_dir_name, population_file_name,
};

/// Writer bound to one run folder.
#[derive(Debug, Clone)]
pub struct CheckpointWriter {
    run_dir: PathBuf,
    evaluator: String,
}

impl CheckpointWriter {
    /// Create a new numbered run folder under `output_dir`.
    pub fn create(output_dir: &Path, evaluator: &str) -> Result<Self, CheckpointError> {
        Ok(Self {
            run_dir: create_run_dir(output_dir, evaluator)?,
            evaluator: evaluator.to_string(),
        })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Folder of `generation`, created on first use.
    pub fn generation_dir(&self, generation: usize) -> Result<PathBuf, CheckpointError> {
        let dir = self.run_dir.join(generation_dir_name(generation));
        fs::create_dir_all(&dir).map_err(|e| CheckpointError::io(&dir, e))?;
        Ok(dir)
    }

    /// Write `gen<N>/pop<N>.pop`.
    pub fn save_population<G: Genome>(
        &self,
        generation: usize,
        population: &[Individual<G>],
    ) -> Result<PathBuf, CheckpointError> {
        let path = self
            .generation_dir(generation)?
            .join(population_file_name(generation));
        self.write_population(&path, Some(generation), population)?;
        Ok(path)
    }

    /// Write `gen<N>/archive<N>.pop`.
    pub fn save_archive<G: Genome>(
        &self,
        generation: usize,
        archive: &[Individual<G>],
    ) -> Result<PathBuf, CheckpointError> {
        let path = self
            .generation_dir(generation)?
            .join(archive_file_name(generation));
        self.write_population(&path, None, archive)?;
        Ok(path)
    }

    /// Export the genome text of the best `n` individuals of every objective.
    pub fn save_bests<G: Genome>(
        &self,
        generation: usize,
        population: &[Individual<G>],
        objectives: &[String],
        n: usize,
    ) -> Result<Vec<PathBuf>, CheckpointError> {
        let dir = self.generation_dir(generation)?;
        let mut written = Vec::new();

        for (objective, best) in elites(population, objectives, n)? {
            for (rank, individual) in best.into_iter().enumerate() {
                let score = individual.fitness(&objective).unwrap_or(f64::NAN);
                let path = dir.join(best_file_name(&objective, score, rank));
                let text = individual.genome.to_text()?;
                fs::write(&path, text).map_err(|e| CheckpointError::io(&path, e))?;
                written.push(path);
            }
        }
        Ok(written)
    }

    /// Write `gen<N>/stats.json`.
    pub fn save_generation_stats(
        &self,
        stats: &GenerationStats,
    ) -> Result<PathBuf, CheckpointError> {
        let path = self
            .generation_dir(stats.generation)?
            .join("stats.json");
        write_json(&path, stats)?;
        Ok(path)
    }

    /// Rewrite `stats.csv` with the whole log.
    pub fn save_stats_csv(&self, log: &StatsLog) -> Result<PathBuf, CheckpointError> {
        let path = self.run_dir.join("stats.csv");
        fs::write(&path, log.to_csv()).map_err(|e| CheckpointError::io(&path, e))?;
        Ok(path)
    }

    fn write_population<G: Genome>(
        &self,
        path: &Path,
        generation: Option<usize>,
        individuals: &[Individual<G>],
    ) -> Result<(), CheckpointError> {
        let file = PopulationFile {
            evaluator: self.evaluator.clone(),
            generation,
            population: individuals
                .iter()
                .map(Individual::to_record)
                .collect::<Result<_, _>>()?,
        };
        write_json(path, &file)?;
        log::debug!("Saved {} individuals to {}", individuals.len(), path.display());
        Ok(())
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CheckpointError> {
    let file = File::create(path).map_err(|e| CheckpointError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, value).map_err(|e| CheckpointError::json(path, e))?;
    writer.flush().map_err(|e| CheckpointError::io(path, e))
}

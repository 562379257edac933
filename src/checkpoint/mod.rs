//! On-disk persistence of a run.
//!
//! Each run writes into its own numbered folder:
//!
//! ```text
//! <output_dir>/<evaluator>_<n>/
//!     stats.csv                       one row per generation
//!     gen<N>/pop<N>.pop               population snapshot (JSON)
//!     gen<N>/archive<N>.pop           novelty archive snapshot (JSON)
//!     gen<N>/<objective>_<score>_<rank>.dna
//!     gen<N>/stats.json
//! ```
//!
//! Population snapshots can be fed back with [`load_population`] to resume a
//! run; archives with [`load_archive`].

mod layout;
mod reader;
mod writer;

use std::path::PathBuf;

use crate::evolution::{GenomeError, SelectionError};

pub use layout::{archive_file_name, create_run_dir, generation_dir_name, population_file_name};
pub use reader::{load_archive, load_population, read_population_file};
pub use writer::CheckpointWriter;

/// Checkpoint read/write errors.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Genome error: {0}")]
    Genome(#[from] GenomeError),
    #[error("Cannot rank elites: {0}")]
    Selection(#[from] SelectionError),
}

impl CheckpointError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}

//! Scatter/gather evaluation across worker processes.
//!
//! Once per generation the coordinator splits its population into
//! contiguous batches, sends one batch to each worker, evaluates the
//! remaining individuals itself and then waits for every worker to send its
//! batch back. Nothing else happens on workers: novelty, statistics,
//! checkpoints and selection stay on the coordinator.
//!
//! # Wire format
//!
//! ```text
//! Frame:
//!   Length: u64 (little endian)
//!   Payload: JSON-encoded Message
//!
//! Message:
//!   {"type": "Batch", "generation": N, "population": [IndividualRecord...]}
//!   {"type": "Shutdown"}
//! ```

mod coordinator;
mod frame;
mod link;

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::evolution::{EvaluationError, GenomeError};
use crate::schema::IndividualRecord;

pub use coordinator::{Coordinator, Worker};
pub use frame::{MAX_FRAME_SIZE, read_frame, write_frame};
pub use link::{ChannelLink, Link, TcpLink};

/// Message exchanged between coordinator and workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    /// A batch of individuals, to evaluate or evaluated.
    Batch {
        generation: usize,
        population: Vec<IndividualRecord>,
    },
    /// The run is over; the worker should exit.
    Shutdown,
}

impl Message {
    pub fn encode(&self) -> Result<Vec<u8>, TransportError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(payload: &[u8]) -> Result<Self, TransportError> {
        Ok(serde_json::from_slice(payload)?)
    }
}

/// Split `len` individuals between the coordinator and `workers` workers.
///
/// Returns `workers + 1` contiguous ranges covering `0..len`. Each worker
/// gets `len / (workers + 1)` individuals; the first range belongs to the
/// coordinator and also keeps the remainder.
pub fn split_batches(len: usize, workers: usize) -> Vec<Range<usize>> {
    let batch = len / (workers + 1);
    let local = len - batch * workers;

    let mut ranges = Vec::with_capacity(workers + 1);
    ranges.push(0..local);
    let mut start = local;
    for _ in 0..workers {
        ranges.push(start..start + batch);
        start += batch;
    }
    ranges
}

/// Distribution failures. All of them abort the run: a generation with a
/// missing or corrupt batch cannot be reconciled.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Frame of {0} bytes exceeds the frame size limit")]
    FrameTooLarge(u64),
    #[error("Peer disconnected")]
    Disconnected,
    #[error("Unexpected message: {0}")]
    UnexpectedMessage(String),
    #[error("Worker {worker} returned {received} individuals, {sent} were sent")]
    BatchSizeMismatch {
        worker: usize,
        sent: usize,
        received: usize,
    },
    #[error("Worker {worker} answered for generation {received}, expected {expected}")]
    GenerationMismatch {
        worker: usize,
        expected: usize,
        received: usize,
    },
    #[error("Genome error: {0}")]
    Genome(#[from] GenomeError),
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

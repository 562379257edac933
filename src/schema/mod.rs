//! Schema module - Run configuration, serialized individuals and statistics.

mod config;
mod float;
mod individual;
mod stats;

pub use config::*;
pub use individual::*;
pub use stats::*;

//! Fatal replay errors. Per-round data problems are skipped, not raised.

use prediction_replay_core::ConfigError;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReplayError {
    /// Configuration rejected before any round was replayed.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Rounds went backwards in time; replay would not be causal.
    #[error(
        "round {epoch} locks at {lock_timestamp}, before the previous round at {previous_timestamp}"
    )]
    OutOfOrder {
        /// Epoch of the offending round.
        epoch: u64,
        /// Its lock timestamp.
        lock_timestamp: i64,
        /// Lock timestamp of the round seen just before it.
        previous_timestamp: i64,
    },
}

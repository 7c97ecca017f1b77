//! Error types for the processor.

use crate::traits::{SourceError, StorageError};
use shardtail_types::Shard;
use thiserror::Error;

/// Errors surfaced by [`Processor`](crate::Processor).
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// Rejected at construction; the run never starts.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The data source reported no target nonce for a shard it listed.
    #[error("no target nonce recorded for {0}")]
    MissingTargetNonce(Shard),

    /// The state storage reported no last-processed nonce for a shard.
    #[error("no last processed nonce recorded for {0}")]
    MissingLastProcessedNonce(Shard),

    /// A data-source call failed; the run aborts without retrying.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// State storage failed to load or persist.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

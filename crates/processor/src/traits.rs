//! Capability traits the processor consumes, and the delivery callback it
//! exposes.
//!
//! The processor core performs no I/O of its own: blocks come in through
//! [`DataSource`], per-shard progress is loaded and persisted through
//! [`StateStorage`], and filtered transactions leave through the
//! [`OnTransactions`] callback.

use crate::state::ProcessorState;
use async_trait::async_trait;
use shardtail_types::{Nonce, NonceByShard, Shard, Transaction};
use thiserror::Error;

/// Errors produced by a [`DataSource`].
#[derive(Debug, Error)]
pub enum SourceError {
    /// The block for this shard and nonce does not exist yet. The caller is
    /// expected to re-run later; the restart buffer re-walks recent history.
    #[error("block for {shard} at nonce {nonce} is not yet available")]
    BlockNotAvailable { shard: Shard, nonce: Nonce },

    /// Transport or gateway failure.
    #[error("gateway error: {0}")]
    Gateway(String),
}

/// Errors produced by a [`StateStorage`].
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("could not load processor state: {0}")]
    Load(String),

    #[error("could not persist processor state: {0}")]
    Persist(String),
}

/// One fetched block: its hash and the transactions of all its mini-blocks.
#[derive(Debug, Clone)]
pub struct FetchedBlock {
    pub hash: String,
    pub transactions: Vec<Transaction>,
}

/// Source of shard topology, chain tips, and block contents.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// All shards to follow, including the metachain.
    async fn shards(&self) -> Result<Vec<Shard>, SourceError>;

    /// The current tip nonce of one shard.
    async fn current_nonce(&self, shard: Shard) -> Result<Nonce, SourceError>;

    /// The current tip nonce of every listed shard.
    async fn current_nonces(&self, shards: &[Shard]) -> Result<NonceByShard, SourceError> {
        let mut nonces = NonceByShard::with_capacity(shards.len());
        for &shard in shards {
            nonces.insert(shard, self.current_nonce(shard).await?);
        }

        Ok(nonces)
    }

    /// Fetch the block at `nonce` on `shard`, with its transactions.
    ///
    /// Fails with [`SourceError::BlockNotAvailable`] when the block has not
    /// been produced (or is not queryable) yet.
    async fn fetch_block(&self, shard: Shard, nonce: Nonce) -> Result<FetchedBlock, SourceError>;
}

/// Persistence for per-shard progress between runs.
///
/// Reference backends persist the last-processed nonces only; the
/// cross-shard ledger is rebuilt from the restart buffer, so persisting it
/// is best-effort and not part of this contract.
#[async_trait]
pub trait StateStorage: Send + Sync {
    /// Last-processed nonce per shard, from the previous run.
    async fn load(&self, shards: &[Shard]) -> Result<NonceByShard, StorageError>;

    /// Persist the run's final state. Called exactly once per run, on every
    /// termination path.
    async fn persist(&self, shards: &[Shard], state: &ProcessorState)
        -> Result<(), StorageError>;
}

/// Delivery callback for filtered transactions.
///
/// Invoked synchronously, at most once per `(shard, nonce)` pair within a
/// run; the transaction list is empty only when empty-block notification is
/// enabled. The processor blocks on this call.
pub type OnTransactions = Box<dyn FnMut(Shard, Nonce, &[Transaction], &str) + Send>;

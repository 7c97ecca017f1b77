//! Cross-shard finality and progress tracking for a sharded ledger.
//!
//! A sharded ledger splits an operation across shards: the originating
//! transaction lands on shard A while its result messages (SCRs) land
//! asynchronously on shard B. A consumer that polls "latest block per shard"
//! would observe the origin before its results exist, reporting incomplete
//! state. This crate tracks every in-flight cross-shard operation and only
//! releases transactions once all of their result messages have been seen.
//!
//! # Architecture
//!
//! ```text
//! DataSource ──► Processor::run ──► per-shard pass loop
//!                     │
//!                     ▼
//!             filter_block ──► resolve (outgoing / incoming / sweep)
//!                     │              │
//!                     │              ▼
//!                     │       CrossShardLedger (pending operations)
//!                     ▼
//!             delivery callback (shard, nonce, transactions, block hash)
//! ```
//!
//! The core pieces ([`CrossShardLedger`], [`ProcessorState`], the finality
//! passes in [`finality`]) are synchronous and perform no I/O; all fetching
//! and persistence runs through the [`DataSource`] and [`StateStorage`]
//! capability traits, driven by the async [`Processor`] run loop.
//!
//! Delivery is at-least-once: on every fresh run the last few blocks per
//! shard are re-scanned (the restart buffer), so consumers must tolerate
//! duplicate `(shard, nonce)` deliveries across runs.

mod config;
mod error;
pub mod finality;
mod ledger;
mod processor;
mod state;
mod traits;

pub use config::ProcessorConfig;
pub use error::ProcessorError;
pub use finality::{filter_block, resolve, SCR_ACK_DATA};
pub use ledger::{CrossShardLedger, LedgerStats, OperationStatus, PendingOperation};
pub use processor::{Processor, RunSummary};
pub use state::ProcessorState;
pub use traits::{DataSource, FetchedBlock, OnTransactions, SourceError, StateStorage, StorageError};

//! The cross-shard pending-operation ledger.
//!
//! Maps an original transaction's hash to the counter of still-outstanding
//! result messages for it. The counter is opened on the originating shard
//! (outgoing pass), drained on the destination shard (incoming pass), and
//! the entry is removed the moment it reaches zero (sweep pass). A stale
//! entry that never drains is evicted after a time-to-live so the map
//! cannot leak across long runs.

use indexmap::IndexMap;
use shardtail_types::Transaction;
use std::fmt;
use std::time::Duration;
use tracing::warn;

/// Lifecycle state of a pending cross-shard operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    /// Result messages are still outstanding (counter non-zero).
    Open,
    /// All result messages observed (counter zero).
    Resolved,
    /// Evicted by the TTL sweep without ever resolving.
    Expired,
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationStatus::Open => write!(f, "open"),
            OperationStatus::Resolved => write!(f, "resolved"),
            OperationStatus::Expired => write!(f, "expired"),
        }
    }
}

/// One in-flight cross-shard operation.
#[derive(Debug, Clone)]
pub struct PendingOperation {
    original: Transaction,
    /// Outstanding outgoing result messages minus delivered ones. May be
    /// transiently negative when the incoming side of an operation is
    /// observed before its outgoing side within a re-scanned window.
    counter: i64,
    created: Duration,
}

impl PendingOperation {
    /// Wrap an original transaction with a zero counter.
    pub fn new(original: Transaction, now: Duration) -> Self {
        Self {
            original,
            counter: 0,
            created: now,
        }
    }

    pub fn original(&self) -> &Transaction {
        &self.original
    }

    pub fn counter(&self) -> i64 {
        self.counter
    }

    pub fn created(&self) -> Duration {
        self.created
    }

    pub fn increment(&mut self) {
        self.counter += 1;
    }

    pub fn decrement(&mut self) {
        self.counter -= 1;
    }

    /// Status as derived from the counter. [`OperationStatus::Expired`] is
    /// only ever assigned by the TTL sweep, on the way out.
    pub fn status(&self) -> OperationStatus {
        if self.counter == 0 {
            OperationStatus::Resolved
        } else {
            OperationStatus::Open
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.counter == 0
    }
}

/// Running totals over the ledger's lifetime, for operational visibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerStats {
    /// Operations that resolved and were emitted to the consumer.
    pub resolved: u64,
    /// Operations evicted by the TTL sweep without resolving.
    pub expired: u64,
    /// Operations that resolved while their original transaction was not in
    /// the batch being processed, so nothing could be emitted for them.
    pub dropped_unobserved: u64,
}

/// Mapping from original-transaction-hash to its pending operation.
///
/// Insertion-ordered so that the sweep pass emits finalized transactions in
/// a deterministic order. Single-owner: only the finality passes mutate it,
/// strictly in outgoing → incoming → sweep order per batch.
#[derive(Debug, Default)]
pub struct CrossShardLedger {
    entries: IndexMap<String, PendingOperation>,
    stats: LedgerStats,
}

impl CrossShardLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, hash: impl Into<String>, operation: PendingOperation) {
        self.entries.insert(hash.into(), operation);
    }

    pub fn get(&self, hash: &str) -> Option<&PendingOperation> {
        self.entries.get(hash)
    }

    pub fn get_mut(&mut self, hash: &str) -> Option<&mut PendingOperation> {
        self.entries.get_mut(hash)
    }

    pub fn remove(&mut self, hash: &str) -> Option<PendingOperation> {
        self.entries.shift_remove(hash)
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.entries.contains_key(hash)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PendingOperation)> {
        self.entries.iter().map(|(hash, op)| (hash.as_str(), op))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Totals accumulated so far.
    pub fn stats(&self) -> LedgerStats {
        self.stats
    }

    pub(crate) fn note_resolved(&mut self) {
        self.stats.resolved += 1;
    }

    pub(crate) fn note_dropped_unobserved(&mut self) {
        self.stats.dropped_unobserved += 1;
    }

    /// Evict every entry older than `ttl`, unconditionally.
    ///
    /// Eviction ignores the counter: an operation stuck open for the full
    /// TTL is assumed lost (its shard pruned, its results unobservable) and
    /// is dropped so the map cannot grow without bound.
    pub fn prune(&mut self, now: Duration, ttl: Duration) {
        let stats = &mut self.stats;
        self.entries.retain(|hash, op| {
            let elapsed = now.saturating_sub(op.created);
            if elapsed <= ttl {
                return true;
            }

            warn!(
                original_tx_hash = %hash,
                elapsed_secs = elapsed.as_secs(),
                counter = op.counter,
                status = %OperationStatus::Expired,
                "pruning pending cross-shard operation past its ttl"
            );
            stats.expired += 1;

            false
        });
    }
}

//! Per-run processor state.

use crate::ledger::CrossShardLedger;
use shardtail_types::{Nonce, NonceByShard, Shard};

/// Per-shard progress plus ownership of the cross-shard ledger.
///
/// Built once per run from persisted nonces and freshly fetched targets,
/// mutated in place by the driver, and persisted exactly once at run end.
/// Under normal operation `last_processed[shard] <= target[shard]`; a
/// violation beyond the reset threshold is how network resets are detected.
#[derive(Debug, Default)]
pub struct ProcessorState {
    last_processed: NonceByShard,
    targets: NonceByShard,
    ledger: CrossShardLedger,
}

impl ProcessorState {
    pub fn new(last_processed: NonceByShard, targets: NonceByShard) -> Self {
        Self {
            last_processed,
            targets,
            ledger: CrossShardLedger::new(),
        }
    }

    pub fn last_processed(&self, shard: Shard) -> Option<Nonce> {
        self.last_processed.get(&shard).copied()
    }

    pub fn target(&self, shard: Shard) -> Option<Nonce> {
        self.targets.get(&shard).copied()
    }

    pub fn set_last_processed(&mut self, shard: Shard, nonce: Nonce) {
        self.last_processed.insert(shard, nonce);
    }

    /// All last-processed nonces, for persistence.
    pub fn last_processed_nonces(&self) -> &NonceByShard {
        &self.last_processed
    }

    pub fn ledger(&self) -> &CrossShardLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut CrossShardLedger {
        &mut self.ledger
    }

    /// Rewind every shard by `buffer + 1` nonces, floored at zero.
    ///
    /// Re-processing the last `buffer` blocks on a fresh start is the safety
    /// margin against finality updates missed across restarts, and the
    /// reason delivery is at-least-once rather than exactly-once.
    pub fn rewind_for_restart(&mut self, buffer: u64) {
        for nonce in self.last_processed.values_mut() {
            *nonce = nonce.saturating_sub(buffer + 1);
        }
    }

    /// Aggregate count of nonces left to process across all shards.
    ///
    /// Sums heights across shards, so it is a progress estimate only; it is
    /// never used for correctness decisions.
    pub fn remaining(&self) -> u64 {
        let to: u64 = self.targets.values().map(|n| n.0).sum();
        let from: u64 = self.last_processed.values().map(|n| n.0).sum();

        to.saturating_sub(from)
    }
}

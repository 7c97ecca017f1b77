//! Processor configuration.

use crate::ProcessorError;
use std::time::Duration;

/// Nonce distance beyond which an ahead-of-target shard is treated as a
/// network reset rather than a stale target.
pub(crate) const DEFAULT_RESET_THRESHOLD: u64 = 10_000;

/// Blocks re-scanned per shard on a fresh start.
pub(crate) const DEFAULT_PAST_BLOCKS_BUFFER: u64 = 10;

/// Age past which a pending cross-shard operation is evicted.
pub(crate) const DEFAULT_PRUNE_TTL: Duration = Duration::from_secs(600);

/// Configuration for one [`Processor`](crate::Processor).
///
/// Constructed once, validated at [`Processor::new`](crate::Processor::new),
/// and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Hold cross-shard-originated transactions until all of their result
    /// messages have been observed, then deliver them as finalized.
    pub wait_for_finality: bool,

    /// Also deliver transactions that are not destined to the polled shard.
    pub include_cross_shard_started: bool,

    /// Invoke the delivery callback even when a block filters down to
    /// nothing.
    pub notify_empty_blocks: bool,

    /// Number of already-processed blocks to re-scan per shard on a fresh
    /// start. The margin is what makes delivery at-least-once: a crash
    /// mid-run never loses finality tracking, it only repeats recent
    /// deliveries.
    pub past_blocks_buffer: u64,

    /// Reset-detection threshold in nonces.
    pub reset_threshold: u64,

    /// Time-to-live for pending cross-shard operations. Eviction is a
    /// leak-prevention valve, not a correctness guarantee.
    pub prune_ttl: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            wait_for_finality: false,
            include_cross_shard_started: false,
            notify_empty_blocks: true,
            past_blocks_buffer: DEFAULT_PAST_BLOCKS_BUFFER,
            reset_threshold: DEFAULT_RESET_THRESHOLD,
            prune_ttl: DEFAULT_PRUNE_TTL,
        }
    }
}

impl ProcessorConfig {
    /// Validate the configuration.
    ///
    /// A zero reset threshold would classify every shard that is merely
    /// ahead of its run-start target as a network reset, so it is rejected.
    pub fn validate(&self) -> Result<(), ProcessorError> {
        if self.reset_threshold == 0 {
            return Err(ProcessorError::InvalidConfig(
                "reset threshold must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

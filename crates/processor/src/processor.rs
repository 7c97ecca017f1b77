//! The progression driver.
//!
//! One run catches every shard up to the target nonce fetched at run start:
//! passes over all shards repeat until a full pass advances none of them,
//! then the run persists its state and returns. The driver owns the clock,
//! the capability handles, and the delivery callback; each block flows
//! through [`filter_block`](crate::finality::filter_block) before delivery.

use crate::config::ProcessorConfig;
use crate::error::ProcessorError;
use crate::finality::filter_block;
use crate::state::ProcessorState;
use crate::traits::{DataSource, OnTransactions, StateStorage};
use shardtail_types::{Nonce, Shard};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Outcome of one completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Blocks fetched and filtered across all shards.
    pub blocks_processed: u64,
}

/// Drives per-shard nonce progression until the network tip is reached.
pub struct Processor<D, S> {
    data_source: D,
    storage: S,
    config: ProcessorConfig,
    on_transactions: OnTransactions,
    clock: Instant,
}

impl<D: DataSource, S: StateStorage> Processor<D, S> {
    /// Create a processor, validating the configuration up front.
    pub fn new(
        data_source: D,
        storage: S,
        config: ProcessorConfig,
        on_transactions: OnTransactions,
    ) -> Result<Self, ProcessorError> {
        config.validate()?;

        Ok(Self {
            data_source,
            storage,
            config,
            on_transactions,
            clock: Instant::now(),
        })
    }

    fn now(&self) -> Duration {
        self.clock.elapsed()
    }

    /// Execute one run: catch every shard up to its run-start target, then
    /// persist state and return.
    ///
    /// State is persisted on every termination path, including fetch
    /// failures; a shard whose fetch failed simply never advanced, and the
    /// restart buffer re-covers whatever the aborted pass had advanced.
    pub async fn run(&mut self) -> Result<RunSummary, ProcessorError> {
        let shards = self.data_source.shards().await?;
        info!(shards = %format_shards(&shards), "targeted shards");

        let last_processed = self.storage.load(&shards).await?;
        let targets = self.data_source.current_nonces(&shards).await?;

        let mut state = ProcessorState::new(last_processed, targets);
        state.rewind_for_restart(self.config.past_blocks_buffer);
        state.ledger_mut().prune(self.now(), self.config.prune_ttl);

        info!(remaining = state.remaining(), "catching up to network tip");

        let outcome = self.catch_up(&shards, &mut state).await;

        let persisted = self.storage.persist(&shards, &state).await;
        match (outcome, persisted) {
            (Err(run_err), Err(persist_err)) => {
                // The run error is the actionable one; the persist failure
                // must still be visible.
                warn!(error = %persist_err, "state persistence failed after aborted run");
                Err(run_err)
            }
            (Err(run_err), Ok(())) => Err(run_err),
            (Ok(_), Err(persist_err)) => Err(persist_err.into()),
            (Ok(summary), Ok(())) => {
                info!(
                    blocks = summary.blocks_processed,
                    pending_operations = state.ledger().len(),
                    "run complete, at network tip"
                );
                Ok(summary)
            }
        }
    }

    async fn catch_up(
        &mut self,
        shards: &[Shard],
        state: &mut ProcessorState,
    ) -> Result<RunSummary, ProcessorError> {
        let mut summary = RunSummary::default();

        loop {
            let mut progressed = false;

            for &shard in shards {
                let target = state
                    .target(shard)
                    .ok_or(ProcessorError::MissingTargetNonce(shard))?;
                let mut last = state
                    .last_processed(shard)
                    .ok_or(ProcessorError::MissingLastProcessedNonce(shard))?;

                if last == target {
                    trace!(%shard, nonce = %target, "already at target");
                    continue;
                }

                // A shard far ahead of its freshly fetched target has been
                // reset out-of-band (devnet/testnet chain wipes): rebase so
                // the next fetched nonce is the target itself.
                if last.0 > target.0 + self.config.reset_threshold {
                    info!(%shard, %last, %target, "network reset detected, rebasing");
                    last = target.prev();
                    state.set_last_processed(shard, last);
                }

                if last > target {
                    // Ahead of a target that is only fetched once per run:
                    // stall until the next run observes a newer tip.
                    debug!(%shard, %last, %target, "ahead of run-start target, stalling");
                    continue;
                }

                progressed = true;

                let nonce = last.next();
                self.process_block(state, shard, nonce).await?;
                state.set_last_processed(shard, nonce);
                summary.blocks_processed += 1;
            }

            if !progressed {
                return Ok(summary);
            }
        }
    }

    async fn process_block(
        &mut self,
        state: &mut ProcessorState,
        shard: Shard,
        nonce: Nonce,
    ) -> Result<(), ProcessorError> {
        debug!(%shard, %nonce, "processing block");

        let block = self
            .data_source
            .fetch_block(shard, nonce)
            .await
            .map_err(|err| {
                warn!(%shard, %nonce, error = %err, "block fetch failed, aborting run");
                err
            })?;

        let now = self.now();
        let valid = filter_block(
            state.ledger_mut(),
            &self.config,
            shard,
            &block.transactions,
            now,
        );

        if !valid.is_empty() || self.config.notify_empty_blocks {
            debug!(%shard, %nonce, count = valid.len(), "delivering transactions");
            (self.on_transactions)(shard, nonce, &valid, &block.hash);
        }

        Ok(())
    }
}

fn format_shards(shards: &[Shard]) -> String {
    shards
        .iter()
        .map(Shard::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_list_formatting() {
        let shards = vec![Shard(0), Shard(1), Shard::METACHAIN];
        assert_eq!(format_shards(&shards), "Shard 0, Shard 1, Metachain");
    }
}

//! The finality and block-validity engine.
//!
//! [`resolve`] runs three ordered passes over one shard's fetched batch:
//! outgoing result messages open or bump counters, incoming ones drain
//! them, and the final sweep removes every counter that reached zero,
//! emitting the original transactions that just became safe to deliver.
//! The order is load-bearing: an operation that both opens and closes
//! within a single batch must still be detected, so outgoing runs before
//! incoming and the sweep runs last.
//!
//! [`filter_block`] builds the delivery set for one block from the resolve
//! output plus the locally-destined transactions that are not themselves
//! the origin of an unresolved cross-shard operation.

use crate::config::ProcessorConfig;
use crate::ledger::{CrossShardLedger, PendingOperation};
use shardtail_types::{find_by_hash, Shard, Transaction};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Decoded payload of an acknowledgement result message: `@ok` with "ok"
/// hex-encoded. An acknowledgement is not semantically significant and
/// never changes a counter.
pub const SCR_ACK_DATA: &str = "@6f6b";

/// Resolve one shard's batch against the ledger, returning the original
/// transactions whose cross-shard operations just became final.
pub fn resolve(
    ledger: &mut CrossShardLedger,
    shard: Shard,
    batch: &[Transaction],
    now: Duration,
) -> Vec<Transaction> {
    // Pass 1: outgoing result messages open counters on the source shard.
    for tx in batch {
        if !tx.is_pending_and_outgoing_from(shard) {
            continue;
        }
        let Some(original_hash) = tx.original_transaction_hash.as_deref() else {
            continue;
        };

        if !ledger.contains(original_hash) {
            let Some(original) = find_by_hash(batch, original_hash) else {
                // The original may have been fetched in an earlier run; it
                // is not re-derivable from this batch alone.
                debug!(
                    original_tx_hash = %original_hash,
                    scr_hash = %tx.hash,
                    "original transaction not in batch, cannot open a counter"
                );
                continue;
            };

            debug!(original_tx_hash = %original_hash, "opening pending cross-shard operation");
            ledger.insert(original_hash, PendingOperation::new(original.clone(), now));
        }

        if tx.data_equals(SCR_ACK_DATA) {
            trace!(
                original_tx_hash = %original_hash,
                scr_hash = %tx.hash,
                "acknowledgement payload, counter unchanged"
            );
            continue;
        }

        if let Some(op) = ledger.get_mut(original_hash) {
            op.increment();
            trace!(
                original_tx_hash = %original_hash,
                scr_hash = %tx.hash,
                counter = op.counter(),
                "outgoing cross-shard result message"
            );
        }
    }

    // Pass 2: incoming result messages drain counters on the destination
    // shard.
    for tx in batch {
        if !tx.is_pending_and_incoming_to(shard) {
            continue;
        }
        let Some(original_hash) = tx.original_transaction_hash.as_deref() else {
            continue;
        };

        let Some(op) = ledger.get_mut(original_hash) else {
            debug!(
                original_tx_hash = %original_hash,
                scr_hash = %tx.hash,
                "no pending operation to resolve"
            );
            continue;
        };

        if tx.data_equals(SCR_ACK_DATA) {
            trace!(
                original_tx_hash = %original_hash,
                scr_hash = %tx.hash,
                "acknowledgement payload, counter unchanged"
            );
            continue;
        }

        op.decrement();
        trace!(
            original_tx_hash = %original_hash,
            scr_hash = %tx.hash,
            counter = op.counter(),
            "incoming cross-shard result message"
        );
    }

    // Pass 3: sweep every counter that reached zero. The entry is removed
    // whether or not the original transaction is present in this batch; a
    // resolution whose original is absent cannot be emitted and is counted
    // as dropped.
    let resolved_hashes: Vec<String> = ledger
        .iter()
        .filter(|(_, op)| op.is_resolved())
        .map(|(hash, _)| hash.to_string())
        .collect();

    let mut finalized = Vec::new();
    for hash in resolved_hashes {
        ledger.remove(&hash);

        match find_by_hash(batch, &hash) {
            Some(original) => {
                debug!(original_tx_hash = %hash, "cross-shard operation finalized");
                ledger.note_resolved();
                finalized.push(original.clone());
            }
            None => {
                warn!(
                    original_tx_hash = %hash,
                    "cross-shard operation resolved outside its original's batch, nothing to emit"
                );
                ledger.note_dropped_unobserved();
            }
        }
    }

    finalized
}

/// Build the delivery set for one block.
///
/// The set is the union of the freshly finalized originals (when finality
/// waiting is enabled) and every batch transaction that is destined to the
/// polled shard (or explicitly included regardless) and is not itself the
/// origin of a still-open cross-shard operation. The union is keyed by
/// hash, so an original finalized by this very block is delivered once.
pub fn filter_block(
    ledger: &mut CrossShardLedger,
    config: &ProcessorConfig,
    shard: Shard,
    batch: &[Transaction],
    now: Duration,
) -> Vec<Transaction> {
    let mut valid: Vec<Transaction> = Vec::new();

    if config.wait_for_finality {
        valid.extend(resolve(ledger, shard, batch, now));
    }

    for tx in batch {
        if !tx.is_destined_to(shard) && !config.include_cross_shard_started {
            trace!(tx_hash = %tx.hash, "not destined to the polled shard, skipping");
            continue;
        }

        if ledger.contains(&tx.hash) {
            trace!(
                tx_hash = %tx.hash,
                "origin of an unresolved cross-shard operation, holding back"
            );
            continue;
        }

        if valid.iter().any(|v| v.hash == tx.hash) {
            continue;
        }

        valid.push(tx.clone());
    }

    valid
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use shardtail_types::TransactionBuilder;

    const NOW: Duration = Duration::ZERO;

    fn b64(s: &str) -> String {
        base64::engine::general_purpose::STANDARD.encode(s)
    }

    fn original(hash: &str, from: Shard, to: Shard) -> Transaction {
        TransactionBuilder::new()
            .hash(hash)
            .source_shard(from)
            .destination_shard(to)
            .build()
    }

    fn scr(hash: &str, original_hash: &str, from: Shard, to: Shard, data: &str) -> Transaction {
        TransactionBuilder::new()
            .hash(hash)
            .original_transaction_hash(original_hash)
            .source_shard(from)
            .destination_shard(to)
            .data(b64(data))
            .build()
    }

    #[test]
    fn outgoing_opens_a_counter() {
        let mut ledger = CrossShardLedger::new();
        let batch = vec![
            original("T1", Shard(0), Shard(1)),
            scr("S1", "T1", Shard(0), Shard(1), "result"),
        ];

        let finalized = resolve(&mut ledger, Shard(0), &batch, NOW);

        assert!(finalized.is_empty());
        assert_eq!(ledger.get("T1").map(PendingOperation::counter), Some(1));
    }

    #[test]
    fn outgoing_without_original_in_batch_is_skipped() {
        let mut ledger = CrossShardLedger::new();
        let batch = vec![scr("S1", "T1", Shard(0), Shard(1), "result")];

        let finalized = resolve(&mut ledger, Shard(0), &batch, NOW);

        assert!(finalized.is_empty());
        assert!(ledger.is_empty());
    }

    #[test]
    fn two_shard_finality_resolves_on_the_destination() {
        let mut ledger = CrossShardLedger::new();

        // Run 1, shard 0: origin plus an outgoing result message.
        let batch_a = vec![
            original("T1", Shard(0), Shard(1)),
            scr("S1", "T1", Shard(0), Shard(1), "result"),
        ];
        let finalized = resolve(&mut ledger, Shard(0), &batch_a, NOW);
        assert!(finalized.is_empty());
        assert_eq!(ledger.get("T1").map(PendingOperation::counter), Some(1));

        // Run 2, shard 1: matching incoming result plus the original.
        let batch_b = vec![
            original("T1", Shard(0), Shard(1)),
            scr("S1", "T1", Shard(0), Shard(1), "result"),
        ];
        let finalized = resolve(&mut ledger, Shard(1), &batch_b, NOW);

        assert_eq!(finalized.len(), 1);
        assert_eq!(finalized[0].hash, "T1");
        assert!(!ledger.contains("T1"));
        assert_eq!(ledger.stats().resolved, 1);
    }

    #[test]
    fn open_and_close_within_one_batch_is_detected() {
        // A same-batch round trip: outgoing opens the counter, a matching
        // incoming message drains it, the sweep emits the original.
        let mut ledger = CrossShardLedger::new();
        let batch = vec![
            original("T1", Shard(0), Shard(1)),
            scr("S1", "T1", Shard(0), Shard(1), "result"),
            scr("S2", "T1", Shard(1), Shard(0), "done"),
        ];

        let finalized = resolve(&mut ledger, Shard(0), &batch, NOW);

        assert_eq!(finalized.len(), 1);
        assert_eq!(finalized[0].hash, "T1");
        assert!(ledger.is_empty());
    }

    #[test]
    fn acknowledgement_never_changes_the_counter() {
        let mut ledger = CrossShardLedger::new();

        let batch = vec![
            original("T1", Shard(0), Shard(1)),
            scr("S1", "T1", Shard(0), Shard(1), "result"),
            scr("S2", "T1", Shard(0), Shard(1), SCR_ACK_DATA),
        ];
        resolve(&mut ledger, Shard(0), &batch, NOW);
        assert_eq!(ledger.get("T1").map(PendingOperation::counter), Some(1));

        let incoming_ack = vec![scr("S3", "T1", Shard(1), Shard(0), SCR_ACK_DATA)];
        resolve(&mut ledger, Shard(0), &incoming_ack, NOW);
        assert_eq!(ledger.get("T1").map(PendingOperation::counter), Some(1));
    }

    #[test]
    fn incoming_without_entry_is_skipped() {
        let mut ledger = CrossShardLedger::new();
        let batch = vec![scr("S1", "T1", Shard(0), Shard(1), "result")];

        let finalized = resolve(&mut ledger, Shard(1), &batch, NOW);

        assert!(finalized.is_empty());
        assert!(ledger.is_empty());
    }

    #[test]
    fn ledger_never_retains_resolved_entries() {
        let mut ledger = CrossShardLedger::new();
        let batch = vec![
            original("T1", Shard(0), Shard(1)),
            scr("S1", "T1", Shard(0), Shard(1), "a"),
            scr("S2", "T1", Shard(0), Shard(1), "b"),
        ];
        resolve(&mut ledger, Shard(0), &batch, NOW);

        for (_, op) in ledger.iter() {
            assert_ne!(op.counter(), 0);
        }
    }

    #[test]
    fn sweep_is_idempotent_across_empty_batches() {
        let mut ledger = CrossShardLedger::new();
        let batch = vec![
            original("T1", Shard(0), Shard(1)),
            scr("S1", "T1", Shard(0), Shard(1), "result"),
            scr("S2", "T1", Shard(1), Shard(0), "done"),
        ];
        let first = resolve(&mut ledger, Shard(0), &batch, NOW);
        assert_eq!(first.len(), 1);

        let again = resolve(&mut ledger, Shard(0), &[], NOW);
        assert!(again.is_empty());
        assert!(ledger.is_empty());
    }

    #[test]
    fn resolution_without_original_in_batch_is_counted_as_dropped() {
        let mut ledger = CrossShardLedger::new();

        // Entry opened in an earlier batch where the original was present.
        let batch_a = vec![
            original("T1", Shard(0), Shard(1)),
            scr("S1", "T1", Shard(0), Shard(1), "result"),
        ];
        resolve(&mut ledger, Shard(0), &batch_a, NOW);

        // The draining batch does not carry the original.
        let batch_b = vec![scr("S2", "T1", Shard(0), Shard(1), "done")];
        let finalized = resolve(&mut ledger, Shard(1), &batch_b, NOW);

        assert!(finalized.is_empty());
        assert!(!ledger.contains("T1"));
        assert_eq!(ledger.stats().dropped_unobserved, 1);
    }

    #[test]
    fn filter_passes_simple_same_shard_transaction() {
        let mut ledger = CrossShardLedger::new();
        let config = ProcessorConfig {
            wait_for_finality: true,
            ..Default::default()
        };
        let batch = vec![original("T1", Shard(1), Shard(1))];

        let valid = filter_block(&mut ledger, &config, Shard(1), &batch, NOW);

        assert_eq!(valid, batch);
        assert!(ledger.is_empty());
    }

    #[test]
    fn filter_skips_foreign_destination_unless_included() {
        let mut ledger = CrossShardLedger::new();
        let batch = vec![original("T1", Shard(0), Shard(1))];

        let config = ProcessorConfig::default();
        let valid = filter_block(&mut ledger, &config, Shard(0), &batch, NOW);
        assert!(valid.is_empty());

        let config = ProcessorConfig {
            include_cross_shard_started: true,
            ..Default::default()
        };
        let valid = filter_block(&mut ledger, &config, Shard(0), &batch, NOW);
        assert_eq!(valid.len(), 1);
    }

    #[test]
    fn filter_holds_back_origin_of_open_operation() {
        let mut ledger = CrossShardLedger::new();
        let config = ProcessorConfig {
            wait_for_finality: true,
            include_cross_shard_started: true,
            ..Default::default()
        };

        // The origin opens a counter in this very batch; it must not be
        // delivered until the operation resolves.
        let batch = vec![
            original("T1", Shard(0), Shard(1)),
            scr("S1", "T1", Shard(0), Shard(1), "result"),
        ];
        let valid = filter_block(&mut ledger, &config, Shard(0), &batch, NOW);

        assert!(valid.iter().all(|tx| tx.hash != "T1"));
        assert!(ledger.contains("T1"));
    }

    #[test]
    fn filter_delivers_finalized_original_once() {
        let mut ledger = CrossShardLedger::new();
        let config = ProcessorConfig {
            wait_for_finality: true,
            ..Default::default()
        };

        // Open on shard 0.
        let batch_a = vec![
            original("T1", Shard(0), Shard(1)),
            scr("S1", "T1", Shard(0), Shard(1), "result"),
        ];
        filter_block(&mut ledger, &config, Shard(0), &batch_a, NOW);

        // Resolve on shard 1, where the original is also destined: it would
        // qualify both as freshly finalized and as locally destined.
        let batch_b = vec![
            original("T1", Shard(0), Shard(1)),
            scr("S1", "T1", Shard(0), Shard(1), "result"),
        ];
        let valid = filter_block(&mut ledger, &config, Shard(1), &batch_b, NOW);

        let t1_count = valid.iter().filter(|tx| tx.hash == "T1").count();
        assert_eq!(t1_count, 1);
    }
}

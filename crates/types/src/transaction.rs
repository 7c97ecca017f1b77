//! The transaction record and its finality-relevant predicates.

use crate::{Nonce, Shard};
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Failure to decode a transaction's base64 payload.
#[derive(Debug, Error)]
pub enum DataDecodeError {
    /// The payload is not valid base64.
    #[error("payload of transaction {hash} is not valid base64")]
    InvalidBase64 { hash: String },

    /// The decoded payload is not valid UTF-8.
    #[error("payload of transaction {hash} is not valid utf-8")]
    InvalidUtf8 { hash: String },
}

/// One ledger operation as fetched from a shard block.
///
/// A transaction with an `original_transaction_hash` is a cross-shard result
/// message (SCR) produced on behalf of the transaction with that hash; one
/// without is a user-originated transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: String,
    pub sender: String,
    pub receiver: String,
    pub value: String,
    /// Opaque base64-encoded payload.
    pub data: String,
    pub status: String,
    pub source_shard: Shard,
    pub destination_shard: Shard,
    pub nonce: Nonce,
    pub previous_transaction_hash: Option<String>,
    pub original_transaction_hash: Option<String>,
    pub gas_price: u64,
    pub gas_limit: u64,
}

impl Transaction {
    /// Whether this transaction is a cross-shard result message.
    pub fn has_original_transaction_hash(&self) -> bool {
        self.original_transaction_hash.is_some()
    }

    /// Whether this transaction originated on `shard`.
    pub fn is_from(&self, shard: Shard) -> bool {
        self.source_shard == shard
    }

    /// Whether this transaction settles on `shard`.
    pub fn is_destined_to(&self, shard: Shard) -> bool {
        self.destination_shard == shard
    }

    /// A result message leaving `shard` for another shard.
    pub fn is_pending_and_outgoing_from(&self, shard: Shard) -> bool {
        self.has_original_transaction_hash()
            && self.is_from(shard)
            && !self.is_destined_to(shard)
    }

    /// A result message arriving on `shard` from another shard.
    pub fn is_pending_and_incoming_to(&self, shard: Shard) -> bool {
        self.has_original_transaction_hash()
            && !self.is_from(shard)
            && self.is_destined_to(shard)
    }

    /// Decode the base64 payload. An empty payload decodes to "".
    pub fn decoded_data(&self) -> Result<String, DataDecodeError> {
        if self.data.is_empty() {
            return Ok(String::new());
        }

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&self.data)
            .map_err(|_| DataDecodeError::InvalidBase64 {
                hash: self.hash.clone(),
            })?;

        String::from_utf8(bytes).map_err(|_| DataDecodeError::InvalidUtf8 {
            hash: self.hash.clone(),
        })
    }

    /// Whether the decoded payload equals `expected`.
    ///
    /// A malformed payload compares unequal rather than failing the batch:
    /// the payload is opaque to everyone but the emitting contract, so a
    /// decode failure only means "not the value we were looking for".
    pub fn data_equals(&self, expected: &str) -> bool {
        match self.decoded_data() {
            Ok(decoded) => decoded == expected,
            Err(err) => {
                warn!(tx_hash = %self.hash, %err, "could not decode transaction payload");
                false
            }
        }
    }
}

/// Find a transaction by hash within one fetched batch.
pub fn find_by_hash<'a>(transactions: &'a [Transaction], hash: &str) -> Option<&'a Transaction> {
    transactions.iter().find(|tx| tx.hash == hash)
}

/// Fluent builder for [`Transaction`], used by data sources and tests.
#[derive(Debug, Default)]
pub struct TransactionBuilder {
    tx: Transaction,
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hash(mut self, hash: impl Into<String>) -> Self {
        self.tx.hash = hash.into();
        self
    }

    pub fn sender(mut self, sender: impl Into<String>) -> Self {
        self.tx.sender = sender.into();
        self
    }

    pub fn receiver(mut self, receiver: impl Into<String>) -> Self {
        self.tx.receiver = receiver.into();
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.tx.value = value.into();
        self
    }

    pub fn data(mut self, data: impl Into<String>) -> Self {
        self.tx.data = data.into();
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.tx.status = status.into();
        self
    }

    pub fn source_shard(mut self, shard: Shard) -> Self {
        self.tx.source_shard = shard;
        self
    }

    pub fn destination_shard(mut self, shard: Shard) -> Self {
        self.tx.destination_shard = shard;
        self
    }

    pub fn nonce(mut self, nonce: Nonce) -> Self {
        self.tx.nonce = nonce;
        self
    }

    pub fn previous_transaction_hash(mut self, hash: impl Into<String>) -> Self {
        self.tx.previous_transaction_hash = Some(hash.into());
        self
    }

    pub fn original_transaction_hash(mut self, hash: impl Into<String>) -> Self {
        self.tx.original_transaction_hash = Some(hash.into());
        self
    }

    pub fn gas_price(mut self, gas_price: u64) -> Self {
        self.tx.gas_price = gas_price;
        self
    }

    pub fn gas_limit(mut self, gas_limit: u64) -> Self {
        self.tx.gas_limit = gas_limit;
        self
    }

    pub fn build(self) -> Transaction {
        self.tx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    fn b64(s: &str) -> String {
        base64::engine::general_purpose::STANDARD.encode(s)
    }

    #[test]
    fn pending_outgoing_requires_original_hash() {
        let tx = TransactionBuilder::new()
            .hash("a")
            .source_shard(Shard(0))
            .destination_shard(Shard(1))
            .build();
        assert!(!tx.is_pending_and_outgoing_from(Shard(0)));

        let scr = TransactionBuilder::new()
            .hash("b")
            .original_transaction_hash("a")
            .source_shard(Shard(0))
            .destination_shard(Shard(1))
            .build();
        assert!(scr.is_pending_and_outgoing_from(Shard(0)));
        assert!(!scr.is_pending_and_outgoing_from(Shard(1)));
        assert!(scr.is_pending_and_incoming_to(Shard(1)));
        assert!(!scr.is_pending_and_incoming_to(Shard(0)));
    }

    #[test]
    fn same_shard_scr_is_neither_outgoing_nor_incoming() {
        let scr = TransactionBuilder::new()
            .hash("b")
            .original_transaction_hash("a")
            .source_shard(Shard(1))
            .destination_shard(Shard(1))
            .build();
        assert!(!scr.is_pending_and_outgoing_from(Shard(1)));
        assert!(!scr.is_pending_and_incoming_to(Shard(1)));
    }

    #[test]
    fn decoded_data_roundtrip() {
        let tx = TransactionBuilder::new().hash("a").data(b64("@6f6b")).build();
        assert_eq!(tx.decoded_data().unwrap(), "@6f6b");
        assert!(tx.data_equals("@6f6b"));
        assert!(!tx.data_equals("@ok"));
    }

    #[test]
    fn empty_data_decodes_to_empty_string() {
        let tx = TransactionBuilder::new().hash("a").build();
        assert_eq!(tx.decoded_data().unwrap(), "");
    }

    #[test]
    fn malformed_data_compares_unequal() {
        let tx = TransactionBuilder::new().hash("a").data("!!not base64!!").build();
        assert!(tx.decoded_data().is_err());
        assert!(!tx.data_equals("@6f6b"));
    }

    #[test]
    fn find_by_hash_scans_batch() {
        let batch = vec![
            TransactionBuilder::new().hash("t1").build(),
            TransactionBuilder::new().hash("t2").build(),
        ];
        assert_eq!(find_by_hash(&batch, "t2").map(|t| t.hash.as_str()), Some("t2"));
        assert!(find_by_hash(&batch, "t3").is_none());
    }
}

//! Wire types for the gateway's REST responses.

use serde::Deserialize;
use shardtail_types::{Nonce, Shard, Transaction, TransactionBuilder};

pub(crate) const CODE_SUCCESSFUL: &str = "successful";

/// Envelope every gateway endpoint wraps its payload in.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NetworkConfigData {
    pub config: NetworkConfig,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NetworkConfig {
    #[serde(rename = "erd_num_shards_without_meta")]
    pub num_shards_without_meta: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NetworkStatusData {
    pub status: NetworkStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NetworkStatus {
    #[serde(rename = "erd_nonce")]
    pub nonce: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BlockData {
    pub block: BlockResponse,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BlockResponse {
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub mini_blocks: Vec<MiniBlock>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct MiniBlock {
    #[serde(default)]
    pub transactions: Vec<TransactionResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TransactionResponse {
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub receiver: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub source_shard: u32,
    #[serde(default)]
    pub destination_shard: u32,
    #[serde(default)]
    pub nonce: u64,
    #[serde(default)]
    pub previous_transaction_hash: String,
    #[serde(default)]
    pub original_transaction_hash: String,
    #[serde(default)]
    pub gas_price: u64,
    #[serde(default)]
    pub gas_limit: u64,
}

impl TransactionResponse {
    /// Map one wire transaction to the processor's record. Absent hash
    /// back-references arrive as empty strings and map to `None`.
    pub(crate) fn into_transaction(self) -> Transaction {
        let mut builder = TransactionBuilder::new()
            .hash(self.hash)
            .sender(self.sender)
            .receiver(self.receiver)
            .value(self.value)
            .data(self.data)
            .status(self.status)
            .source_shard(Shard(self.source_shard))
            .destination_shard(Shard(self.destination_shard))
            .nonce(Nonce(self.nonce))
            .gas_price(self.gas_price)
            .gas_limit(self.gas_limit);

        if !self.previous_transaction_hash.is_empty() {
            builder = builder.previous_transaction_hash(self.previous_transaction_hash);
        }
        if !self.original_transaction_hash.is_empty() {
            builder = builder.original_transaction_hash(self.original_transaction_hash);
        }

        builder.build()
    }
}

impl BlockResponse {
    /// Flatten all mini-block transactions, in block order.
    pub(crate) fn into_transactions(self) -> Vec<Transaction> {
        self.mini_blocks
            .into_iter()
            .flat_map(|mb| mb.transactions)
            .map(TransactionResponse::into_transaction)
            .collect()
    }
}

//! The gateway HTTP client.

use crate::response::{
    BlockData, Envelope, NetworkConfigData, NetworkStatusData, CODE_SUCCESSFUL,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use shardtail_processor::{DataSource, FetchedBlock, SourceError};
use shardtail_types::{Nonce, Shard};
use tracing::debug;

/// Public mainnet gateway.
pub const MAINNET_GATEWAY_URL: &str = "https://gateway.multiversx.com";

/// Public testnet gateway.
pub const TESTNET_GATEWAY_URL: &str = "https://testnet-gateway.multiversx.com";

/// [`DataSource`] implementation over a gateway's REST API.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    base_url: String,
    http: reqwest::Client,
}

impl GatewayClient {
    /// Client for the gateway at `base_url` (no trailing slash).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, SourceError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(%url, "gateway request");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| SourceError::Gateway(err.to_string()))?;

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|err| SourceError::Gateway(err.to_string()))?;

        if envelope.code != CODE_SUCCESSFUL {
            return Err(SourceError::Gateway(format!(
                "{}: {}",
                envelope.code, envelope.error
            )));
        }

        envelope
            .data
            .ok_or_else(|| SourceError::Gateway("successful response without data".into()))
    }
}

#[async_trait]
impl DataSource for GatewayClient {
    async fn shards(&self) -> Result<Vec<Shard>, SourceError> {
        let data: NetworkConfigData = self.get("network/config").await?;

        let mut shards: Vec<Shard> = (0..data.config.num_shards_without_meta)
            .map(Shard)
            .collect();
        shards.push(Shard::METACHAIN);

        Ok(shards)
    }

    async fn current_nonce(&self, shard: Shard) -> Result<Nonce, SourceError> {
        let data: NetworkStatusData = self.get(&format!("network/status/{}", shard.0)).await?;

        Ok(Nonce(data.status.nonce))
    }

    async fn fetch_block(&self, shard: Shard, nonce: Nonce) -> Result<FetchedBlock, SourceError> {
        let data: BlockData = self
            .get(&format!("block/{}/by-nonce/{}?withTxs=true", shard.0, nonce))
            .await?;

        // The gateway answers "successful" with an empty block for nonces it
        // has not produced or indexed yet.
        if data.block.hash.is_empty() {
            return Err(SourceError::BlockNotAvailable { shard, nonce });
        }

        let hash = data.block.hash.clone();
        let transactions = data.block.into_transactions();

        Ok(FetchedBlock { hash, transactions })
    }
}

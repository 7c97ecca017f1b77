//! HTTP [`DataSource`](shardtail_processor::DataSource) backed by a ledger
//! gateway.
//!
//! Speaks the gateway's REST API: `network/config` for the shard list,
//! `network/status/{shard}` for chain tips, and
//! `block/{shard}/by-nonce/{nonce}?withTxs=true` for block contents. Every
//! endpoint wraps its payload in a `{ data, code, error }` envelope; any
//! code other than `successful` is surfaced as a gateway error.

mod client;
mod response;

pub use client::{GatewayClient, MAINNET_GATEWAY_URL, TESTNET_GATEWAY_URL};

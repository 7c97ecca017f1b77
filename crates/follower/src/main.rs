//! Shard-tail follower.
//!
//! Wires the gateway data source, a JSON state file, and the processor into
//! one catch-up run, logging every delivered batch.
//!
//! # Usage
//!
//! ```bash
//! # Follow the public testnet, keeping progress in state.json
//! shardtail-follower --state-file state.json
//!
//! # Start at the current tips instead of replaying history
//! shardtail-follower --state-file state.json --from-tip
//!
//! # Hold cross-shard transactions until their results are final
//! shardtail-follower --state-file state.json --wait-for-finality
//! ```

use clap::Parser;
use shardtail_gateway::{GatewayClient, TESTNET_GATEWAY_URL};
use shardtail_processor::{DataSource, Processor, ProcessorConfig, ProcessorState, StateStorage};
use shardtail_storage_memory::JsonFileStorage;
use shardtail_types::Transaction;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Follow a sharded ledger gateway and log finalized transactions.
#[derive(Parser, Debug)]
#[command(name = "shardtail-follower")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Gateway base URL
    #[arg(long, default_value = TESTNET_GATEWAY_URL)]
    gateway: String,

    /// Path to the JSON state file
    #[arg(long, default_value = "shardtail-state.json")]
    state_file: PathBuf,

    /// Seed the state file at the current chain tips before running
    #[arg(long)]
    from_tip: bool,

    /// Hold cross-shard transactions until all their results are observed
    #[arg(long)]
    wait_for_finality: bool,

    /// Also deliver transactions not destined to the polled shard
    #[arg(long)]
    include_cross_shard_started: bool,

    /// Skip the delivery callback for blocks that filter down to nothing
    #[arg(long)]
    quiet_empty_blocks: bool,

    /// Blocks to re-scan per shard on startup
    #[arg(long, default_value_t = 10)]
    buffer: u64,

    /// Log level filter (overrides RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(err) = run(cli).await {
        error!(%err, "follower run failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let gateway = GatewayClient::new(cli.gateway.clone());
    let storage = JsonFileStorage::new(&cli.state_file);

    if cli.from_tip {
        seed_at_tip(&gateway, &storage).await?;
    }

    let config = ProcessorConfig {
        wait_for_finality: cli.wait_for_finality,
        include_cross_shard_started: cli.include_cross_shard_started,
        notify_empty_blocks: !cli.quiet_empty_blocks,
        past_blocks_buffer: cli.buffer,
        ..Default::default()
    };

    let on_transactions: shardtail_processor::OnTransactions = Box::new(
        |shard: shardtail_types::Shard,
         nonce: shardtail_types::Nonce,
         transactions: &[Transaction],
         block_hash: &str| {
            if transactions.is_empty() {
                info!(%shard, %nonce, block_hash, "empty block");
                return;
            }

            for tx in transactions {
                info!(
                    %shard,
                    %nonce,
                    tx_hash = %tx.hash,
                    sender = %tx.sender,
                    receiver = %tx.receiver,
                    value = %tx.value,
                    status = %tx.status,
                    "transaction"
                );
            }
        },
    );

    let mut processor = Processor::new(gateway, storage, config, on_transactions)?;
    let summary = processor.run().await?;

    info!(blocks = summary.blocks_processed, "caught up");

    Ok(())
}

/// Persist the current chain tips as the starting state, so the follower
/// tails new blocks instead of replaying history.
async fn seed_at_tip(
    gateway: &GatewayClient,
    storage: &JsonFileStorage,
) -> Result<(), Box<dyn std::error::Error>> {
    let shards = gateway.shards().await?;
    let tips = gateway.current_nonces(&shards).await?;

    info!(shards = shards.len(), "seeding state at current chain tips");
    let state = ProcessorState::new(tips.clone(), tips);
    storage.persist(&shards, &state).await?;

    Ok(())
}

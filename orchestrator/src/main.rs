//! Claw Arena orchestrator service.
//!
//! Usage:
//!   claw-orchestrator --operator-key <HEX> [--chain-id 10143] [--network testnet]
//!
//! The operator key may come from `--operator-key`, `--operator-key-file`,
//! or the `OPERATOR_PRIVATE_KEY` / `OPERATOR_PRIVATE_KEY_FILE` environment
//! variables. The dev build runs against the in-memory store and the null
//! chain adapter; production deployments inject their own.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use claw_orchestrator::chain::NullChain;
use claw_orchestrator::signer::{LocalOperatorSigner, SigningService};
use claw_orchestrator::store::MemStore;
use claw_orchestrator::{AgentSettings, ArenaService, HostAgent, ServiceConfig, SystemClock};
use claw_types::arena::Network;
use claw_types::{parse_address, Address};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Claw Arena tournament orchestrator")]
struct Args {
    /// Operator private key hex (or OPERATOR_PRIVATE_KEY env).
    #[arg(long)]
    operator_key: Option<String>,

    /// Path to a file holding the operator private key hex.
    #[arg(long)]
    operator_key_file: Option<String>,

    /// EIP-712 chain id the finalize authorizations bind to.
    #[arg(long, default_value = "10143")]
    chain_id: u64,

    /// Network label stamped onto created arenas (testnet|mainnet).
    #[arg(long, default_value = "testnet")]
    network: String,

    /// Protocol treasury address.
    #[arg(long, default_value = "0x0000000000000000000000000000000000000000")]
    treasury: String,

    /// Minutes between host-agent cycles.
    #[arg(long, default_value = "30")]
    agent_interval_mins: u64,

    /// Seed for the host agent's sampling; 0 derives one from the clock.
    #[arg(long, default_value = "0")]
    agent_seed: u64,
}

fn read_secret_file(path: &str) -> Result<String> {
    let contents = std::fs::read_to_string(path).context("Failed to read secret file")?;
    let trimmed = contents.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Secret file is empty: {path}"));
    }
    Ok(trimmed.to_string())
}

fn resolve_operator_key(args: &Args) -> Result<String> {
    if let Some(key) = &args.operator_key {
        return Ok(key.clone());
    }
    if let Some(path) = &args.operator_key_file {
        return read_secret_file(path);
    }
    if let Ok(key) = std::env::var("OPERATOR_PRIVATE_KEY") {
        return Ok(key);
    }
    if let Ok(path) = std::env::var("OPERATOR_PRIVATE_KEY_FILE") {
        return read_secret_file(&path);
    }
    Err(anyhow!(
        "Missing operator key (flag, file, OPERATOR_PRIVATE_KEY or OPERATOR_PRIVATE_KEY_FILE)"
    ))
}

fn parse_network(value: &str) -> Result<Network> {
    match value {
        "testnet" => Ok(Network::Testnet),
        "mainnet" => Ok(Network::Mainnet),
        other => Err(anyhow!("Unknown network: {other}")),
    }
}

fn parse_treasury(value: &str) -> Result<Address> {
    parse_address(value).ok_or_else(|| anyhow!("Invalid treasury address: {value}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let network = parse_network(&args.network)?;
    let treasury = parse_treasury(&args.treasury)?;
    let operator_key = resolve_operator_key(&args)?;

    let signer = Arc::new(
        LocalOperatorSigner::from_hex_key(&operator_key)
            .map_err(|_| anyhow!("Invalid operator private key"))?,
    );
    let clock = Arc::new(SystemClock::new());
    let store = Arc::new(MemStore::new());
    let chain = Arc::new(NullChain::new());

    let agent_seed = if args.agent_seed == 0 {
        use claw_orchestrator::Clock;
        clock.now_ms()
    } else {
        args.agent_seed
    };
    let agent = HostAgent::new(
        AgentSettings {
            network,
            treasury,
            interval_ms: args.agent_interval_mins * 60_000,
            ..AgentSettings::default()
        },
        agent_seed,
    );

    let config = ServiceConfig {
        chain_id: args.chain_id,
        ..ServiceConfig::default()
    };

    info!(
        chain_id = args.chain_id,
        network = %args.network,
        operator = ?signer.operator(),
        agent_interval_mins = args.agent_interval_mins,
        "claw arena orchestrator starting"
    );

    let service = ArenaService::start(clock, store, chain, signer, agent, config)
        .map_err(|err| anyhow!("service start failed: {err}"))?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("shutdown signal received");
    service.shutdown().await;

    Ok(())
}

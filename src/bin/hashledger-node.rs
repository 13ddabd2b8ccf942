#![forbid(unsafe_code)]
//! Hashledger node: serves the ledger API and mines on request

use clap::Parser;
use hashledger::api::{run_api_server, Node};
use hashledger::blockchain::Blockchain;
use hashledger::config::{load_config, DEFAULT_CONFIG_PATH};
use hashledger::crypto::node_identifier;
use hashledger::miner::ProofOfWork;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, value_name = "FILE", default_value_t = String::from(DEFAULT_CONFIG_PATH))]
    config: String,

    /// API port, overriding `network.api_port`
    #[arg(short, long)]
    port: Option<u16>,

    /// Trailing zero hex characters required of a proof
    #[arg(short, long)]
    difficulty: Option<usize>,

    /// Worker threads used by the proof search
    #[arg(short, long)]
    threads: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = load_config(&args.config)?;
    if let Some(port) = args.port {
        config.network.api_port = port;
    }
    if let Some(difficulty) = args.difficulty {
        config.miner.difficulty = difficulty;
    }
    if let Some(threads) = args.threads {
        config.miner.threads = threads;
    }
    config.validate()?;

    let node_id = node_identifier();
    info!(
        node_id = %node_id,
        difficulty = config.miner.difficulty,
        threads = config.miner.threads,
        "Starting {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let pow = ProofOfWork::new(config.miner.difficulty).with_threads(config.miner.threads)?;
    let blockchain = Blockchain::with_proof_of_work(pow, config.miner.reward);
    let node = Arc::new(Node::new(blockchain, node_id));

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    run_api_server(node, listener, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await?;

    info!("Node stopped");
    Ok(())
}

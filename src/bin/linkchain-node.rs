#![forbid(unsafe_code)]
//! LinkChain node: ledger, peer network and HTTP interface in one process.

use clap::Parser;
use colored::*;
use linkchain::config::{load_config, load_config_from};
use linkchain::node::{init_logging, Node};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a config.toml (defaults to ./config.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Port for the HTTP interface
    #[arg(long)]
    http_port: Option<u16>,
    /// Port for peer connections
    #[arg(long)]
    p2p_port: Option<u16>,
    /// Peer to connect to at startup (host:port), repeatable
    #[arg(long = "peer")]
    peers: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    if let Some(port) = cli.http_port {
        config.network.http_port = port;
    }
    if let Some(port) = cli.p2p_port {
        config.network.p2p_port = port;
    }
    config.network.bootstrap_peers.extend(cli.peers);
    config.validate()?;

    init_logging(&config.logging.level);

    println!("{}", "🔗 LinkChain node".bright_cyan().bold());
    println!(
        "   HTTP {}  P2P {}  peers {}",
        config.network.http_port.to_string().bright_white(),
        config.network.p2p_port.to_string().bright_white(),
        config.network.bootstrap_peers.len().to_string().bright_white()
    );

    let node = Arc::new(Node::init(config));
    node.start().await
}

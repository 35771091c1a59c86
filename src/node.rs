//! Node orchestration
//!
//! Wires one [`Ledger`] to the peer network and, with the `api` feature, the
//! HTTP interface, then logs a heartbeat until the process exits.

use crate::config::Config;
use crate::ledger::Ledger;
use crate::network::NetworkNode;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Installs the global fmt subscriber. `RUST_LOG` wins over `default_level`.
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // A subscriber may already be installed (tests, embedding binaries).
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub struct Node {
    pub config: Config,
    pub ledger: Ledger,
    pub network: Arc<NetworkNode>,
}

impl Node {
    pub fn init(config: Config) -> Self {
        let ledger = Ledger::with_rules(config.ledger.validation_rules());
        let network = Arc::new(NetworkNode::new(ledger.clone()));
        info!(
            http_port = config.network.http_port,
            p2p_port = config.network.p2p_port,
            strict_timestamps = config.ledger.strict_timestamps,
            "node.init"
        );
        Self {
            config,
            ledger,
            network,
        }
    }

    pub async fn start(self: Arc<Self>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let bind_address = self.config.network.bind_address.clone();

        // 1) Bind the P2P port first so a port clash fails startup immediately.
        let p2p_listener = TcpListener::bind((bind_address.as_str(), self.config.network.p2p_port))
            .await
            .map_err(|e| format!("P2P port {} unavailable: {}", self.config.network.p2p_port, e))?;

        let _broadcaster = self.network.clone().spawn_tail_broadcaster();

        let net = self.network.clone();
        let _p2p_task = tokio::spawn(async move {
            if let Err(e) = net.serve(p2p_listener).await {
                error!("P2P server failed: {}", e);
            }
        });

        // 2) Dial configured peers
        for peer in &self.config.network.bootstrap_peers {
            let net = self.network.clone();
            let peer = peer.clone();
            tokio::spawn(async move {
                if let Err(e) = net.connect_peer(&peer).await {
                    warn!(peer = %peer, error = %e, "p2p.bootstrap_failed");
                }
            });
        }

        // 3) Request interface
        self.clone().start_api().await;

        // Node main loop - health logging
        loop {
            info!(
                height = self.ledger.len(),
                peers = self.network.peer_count().await,
                "node.heartbeat"
            );
            tokio::time::sleep(HEARTBEAT_INTERVAL).await;
        }
    }

    #[cfg(feature = "api")]
    async fn start_api(self: Arc<Self>) {
        let api_node = Arc::new(crate::api::ApiNode::new(self.network.clone()));
        let bind_address = self.config.network.bind_address.clone();
        let port = self.config.network.http_port;
        tokio::spawn(async move {
            if let Err(e) = crate::api::run_api_server(api_node, &bind_address, port).await {
                error!("API server failed: {}", e);
            }
        });
    }

    #[cfg(not(feature = "api"))]
    async fn start_api(self: Arc<Self>) {
        warn!("API feature not enabled in this build; running P2P only");
    }
}

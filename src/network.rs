//! Peer-to-peer chain exchange for LinkChain
//!
//! Nodes talk over WebSockets using three JSON messages:
//! - `QUERY_LATEST`: ask for the peer's tail block
//! - `QUERY_ALL`: ask for the peer's full chain
//! - `RESPONSE_BLOCKCHAIN`: one or more blocks, answered to either query and
//!   pushed to every peer whenever the local tail changes
//!
//! Received blocks are fed to the ledger: a block that extends our tail is
//! appended, a single block further ahead triggers a `QUERY_ALL`, and a longer
//! chain goes through `replace_chain`.

use crate::blockchain::{parse_chain, Block};
use crate::error::Result;
use crate::ledger::Ledger;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{accept_async, connect_async, WebSocketStream};
use tracing::{debug, info, warn};

/// Wire message exchanged between peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    QueryLatest,
    QueryAll,
    /// Blocks are kept as raw JSON until they pass the structural check.
    ResponseBlockchain(Vec<Value>),
}

impl Message {
    pub fn from_blocks(blocks: &[Block]) -> Result<Self> {
        let raw = blocks
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Message::ResponseBlockchain(raw))
    }
}

/// What a `RESPONSE_BLOCKCHAIN` did to the local chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Empty, or not ahead of the local tail.
    Ignored,
    Appended,
    /// A lone block we cannot link; the full chain was requested from peers.
    RequestedFullChain,
    Replaced,
}

/// Outbound messages queued per peer; further messages are dropped until it drains.
pub const PEER_QUEUE_CAPACITY: usize = 64;

struct Peer {
    addr: String,
    tx: mpsc::Sender<Message>,
}

pub struct NetworkNode {
    ledger: Ledger,
    peers: RwLock<HashMap<u64, Peer>>,
    next_peer_id: AtomicU64,
}

impl NetworkNode {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            ledger,
            peers: RwLock::new(HashMap::new()),
            next_peer_id: AtomicU64::new(0),
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Addresses of all connected peers.
    pub async fn peers(&self) -> Vec<String> {
        let mut addrs: Vec<String> = self.peers.read().await.values().map(|p| p.addr.clone()).collect();
        addrs.sort();
        addrs
    }

    pub async fn peer_count(&self) -> usize {
        self.peers.read().await.len()
    }

    /// Queues `message` for every connected peer.
    pub async fn broadcast(&self, message: Message) {
        let peers = self.peers.read().await;
        for peer in peers.values() {
            if peer.tx.try_send(message.clone()).is_err() {
                debug!(peer = %peer.addr, "p2p.broadcast_dropped");
            }
        }
    }

    /// Pushes every new ledger tail to all peers.
    pub fn spawn_tail_broadcaster(self: Arc<Self>) -> JoinHandle<()> {
        let mut tails = self.ledger.subscribe();
        tokio::spawn(async move {
            loop {
                match tails.recv().await {
                    Ok(tail) => match Message::from_blocks(std::slice::from_ref(&tail)) {
                        Ok(message) => self.broadcast(message).await,
                        Err(e) => warn!(error = %e, "p2p.encode_failed"),
                    },
                    // Only the newest tail matters; skipped ones are superseded.
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "p2p.tail_broadcaster_lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Accepts inbound peers on `listener` until it fails.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        info!(addr = %listener.local_addr()?, "p2p.listening");
        loop {
            let (stream, peer_addr) = listener.accept().await?;
            let node = Arc::clone(&self);
            tokio::spawn(async move {
                match accept_async(stream).await {
                    Ok(ws) => node.run_connection(peer_addr.to_string(), ws).await,
                    Err(e) => warn!(peer = %peer_addr, error = %e, "p2p.handshake_failed"),
                }
            });
        }
    }

    /// Dials `addr` (`host:port` or a `ws://` URL) and starts exchanging chains with it.
    pub async fn connect_peer(self: Arc<Self>, addr: &str) -> Result<()> {
        let url = if addr.starts_with("ws://") || addr.starts_with("wss://") {
            addr.to_string()
        } else {
            format!("ws://{}", addr)
        };
        let (ws, _) = connect_async(url.as_str()).await?;
        info!(peer = %addr, "p2p.connected");

        let addr = addr.to_string();
        tokio::spawn(async move { self.run_connection(addr, ws).await });
        Ok(())
    }

    async fn run_connection<S>(self: Arc<Self>, addr: String, ws: WebSocketStream<S>)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut sink, mut stream) = ws.split();
        let (tx, mut rx) = mpsc::channel::<Message>(PEER_QUEUE_CAPACITY);
        let id = self.register(addr.clone(), tx.clone()).await;

        let writer = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "p2p.encode_failed");
                        continue;
                    }
                };
                if sink.send(WsMessage::Text(text)).await.is_err() {
                    break;
                }
            }
        });

        let _ = tx.try_send(Message::QueryLatest);

        while let Some(frame) = stream.next().await {
            match frame {
                Ok(WsMessage::Text(text)) => self.handle_text(&addr, &text, &tx).await,
                Ok(WsMessage::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!(peer = %addr, error = %e, "p2p.connection_error");
                    break;
                }
            }
        }

        self.unregister(id).await;
        writer.abort();
        info!(peer = %addr, "p2p.disconnected");
    }

    async fn register(&self, addr: String, tx: mpsc::Sender<Message>) -> u64 {
        let id = self.next_peer_id.fetch_add(1, Ordering::Relaxed);
        self.peers.write().await.insert(id, Peer { addr, tx });
        id
    }

    async fn unregister(&self, id: u64) {
        self.peers.write().await.remove(&id);
    }

    async fn handle_text(&self, addr: &str, text: &str, reply: &mpsc::Sender<Message>) {
        let message = match serde_json::from_str::<Message>(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(peer = %addr, error = %e, "p2p.undecodable_message");
                return;
            }
        };

        match self.handle_message(message).await {
            Ok(Some(response)) => {
                if reply.try_send(response).is_err() {
                    debug!(peer = %addr, "p2p.reply_dropped");
                }
            }
            Ok(None) => {}
            Err(e) if e.is_rejection() => warn!(peer = %addr, reason = %e, "p2p.rejected"),
            Err(e) => warn!(peer = %addr, error = %e, "p2p.handling_failed"),
        }
    }

    /// Handles one message from a peer and returns the reply for that peer, if any.
    pub async fn handle_message(&self, message: Message) -> Result<Option<Message>> {
        match message {
            Message::QueryLatest => Ok(Some(Message::from_blocks(&[self.ledger.latest()])?)),
            Message::QueryAll => Ok(Some(Message::from_blocks(&self.ledger.chain())?)),
            Message::ResponseBlockchain(raw) => {
                let outcome = self.handle_blockchain_response(&raw)?;
                if outcome == SyncOutcome::RequestedFullChain {
                    self.broadcast(Message::QueryAll).await;
                }
                Ok(None)
            }
        }
    }

    /// Applies blocks received from a peer to the ledger.
    pub fn handle_blockchain_response(&self, raw: &[Value]) -> Result<SyncOutcome> {
        let received = parse_chain(raw)?;
        let Some(latest_received) = received.last() else {
            return Ok(SyncOutcome::Ignored);
        };

        let latest_held = self.ledger.latest();
        if latest_received.index <= latest_held.index {
            debug!(
                received = latest_received.index,
                held = latest_held.index,
                "p2p.not_ahead"
            );
            return Ok(SyncOutcome::Ignored);
        }

        if latest_received.previous_hash.as_deref() == Some(latest_held.hash.as_str()) {
            self.ledger.append(latest_received.clone())?;
            Ok(SyncOutcome::Appended)
        } else if received.len() == 1 {
            debug!(received = latest_received.index, "p2p.query_all");
            Ok(SyncOutcome::RequestedFullChain)
        } else {
            self.ledger.replace_chain(received)?;
            Ok(SyncOutcome::Replaced)
        }
    }
}

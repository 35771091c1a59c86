//! REST API for LinkChain
//!
//! Lets an operator inspect the ledger, append data, submit raw blocks and
//! manage peer connections over HTTP/JSON.

use axum::{
    extract::{Path, Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::blockchain::{parse_block, Block};
use crate::error::ChainError;
use crate::ledger::Ledger;
use crate::network::NetworkNode;

/// State shared by every handler.
pub struct ApiNode {
    pub ledger: Ledger,
    pub network: Arc<NetworkNode>,
    api_stats: RwLock<ApiStats>,
}

#[derive(Debug, Default)]
struct ApiStats {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    blocks_mined: u64,
    blocks_submitted: u64,
    start_time: Option<Instant>,
}

impl ApiStats {
    fn new() -> Self {
        ApiStats {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    fn record_request(&mut self, success: bool) {
        self.total_requests += 1;
        if success {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }
    }
}

impl ApiNode {
    pub fn new(network: Arc<NetworkNode>) -> Self {
        Self {
            ledger: network.ledger().clone(),
            network,
            api_stats: RwLock::new(ApiStats::new()),
        }
    }

    pub async fn get_stats(&self) -> ApiStatsResponse {
        let stats = self.api_stats.read().await;
        ApiStatsResponse {
            total_requests: stats.total_requests,
            successful_requests: stats.successful_requests,
            failed_requests: stats.failed_requests,
            blocks_mined: stats.blocks_mined,
            blocks_submitted: stats.blocks_submitted,
            uptime_seconds: stats.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0),
        }
    }
}

// ============================================================================
// Request / Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct MineBlockRequest {
    pub data: String,
}

#[derive(Debug, Deserialize)]
pub struct AddPeerRequest {
    pub peer: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct PeersResponse {
    count: usize,
    peers: Vec<String>,
}

#[derive(Serialize)]
pub struct ApiStatsResponse {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub blocks_mined: u64,
    pub blocks_submitted: u64,
    pub uptime_seconds: u64,
}

#[derive(Debug)]
pub enum ApiError {
    /// The ledger refused the block or chain.
    Rejected(ChainError),
    InvalidInput(String),
    NotFound(String),
    PeerUnreachable(String),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Rejected(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::PeerUnreachable(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        if err.is_rejection() {
            ApiError::Rejected(err)
        } else {
            ApiError::InternalError(err.to_string())
        }
    }
}

// ============================================================================
// Middleware
// ============================================================================

async fn stats_middleware(State(node): State<Arc<ApiNode>>, req: Request, next: Next) -> Response {
    let response = next.run(req).await;

    let success = response.status().is_success();
    node.api_stats.write().await.record_request(success);

    response
}

/// Logs method, path, status, duration and chain height for every request.
async fn logging_middleware(State(node): State<Arc<ApiNode>>, req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        height = node.ledger.len(),
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

pub fn build_api_router(node: Arc<ApiNode>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![http::Method::GET, http::Method::POST, http::Method::OPTIONS])
        .allow_headers(vec![http::header::CONTENT_TYPE]);

    Router::new()
        // Ledger endpoints
        .route("/blocks", get(get_blocks).post(submit_block))
        .route("/blocks/latest", get(get_latest_block))
        .route("/blocks/:index", get(get_block_by_index))
        .route("/mineBlock", post(mine_block))
        // Network endpoints
        .route("/peers", get(get_peers))
        .route("/addPeer", post(add_peer))
        // System endpoints
        .route("/health", get(health_check))
        .route("/stats", get(get_api_stats))
        // logging before stats so we always record timing
        .layer(middleware::from_fn_with_state(node.clone(), logging_middleware))
        .layer(middleware::from_fn_with_state(node.clone(), stats_middleware))
        .with_state(node)
        .layer(cors)
}

pub async fn run_api_server(
    node: Arc<ApiNode>,
    bind_address: &str,
    port: u16,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = tokio::net::TcpListener::bind((bind_address, port)).await?;
    tracing::info!(addr = %listener.local_addr()?, "api.listening");

    axum::serve(listener, build_api_router(node)).await?;
    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn health_check(State(node): State<Arc<ApiNode>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "height": node.ledger.len(),
        "peers": node.network.peer_count().await,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn get_blocks(State(node): State<Arc<ApiNode>>) -> Json<Vec<Block>> {
    Json(node.ledger.chain())
}

async fn get_latest_block(State(node): State<Arc<ApiNode>>) -> Json<Block> {
    Json(node.ledger.latest())
}

async fn get_block_by_index(
    State(node): State<Arc<ApiNode>>,
    Path(index): Path<u64>,
) -> Result<Json<Block>, ApiError> {
    node.ledger
        .get(index)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Block at index {} not found", index)))
}

async fn mine_block(
    State(node): State<Arc<ApiNode>>,
    Json(req): Json<MineBlockRequest>,
) -> Result<Json<Block>, ApiError> {
    let block = node.ledger.append_data(&req.data)?;
    node.api_stats.write().await.blocks_mined += 1;
    Ok(Json(block))
}

/// Accepts a block built elsewhere, e.g. by a client holding its own copy of the tail.
async fn submit_block(
    State(node): State<Arc<ApiNode>>,
    Json(raw): Json<Value>,
) -> Result<Json<Block>, ApiError> {
    let block = parse_block(&raw)?;
    node.ledger.append(block.clone())?;
    node.api_stats.write().await.blocks_submitted += 1;
    Ok(Json(block))
}

async fn get_peers(State(node): State<Arc<ApiNode>>) -> impl IntoResponse {
    let peers = node.network.peers().await;
    Json(PeersResponse {
        count: peers.len(),
        peers,
    })
}

async fn add_peer(
    State(node): State<Arc<ApiNode>>,
    Json(req): Json<AddPeerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.peer.trim().is_empty() {
        return Err(ApiError::InvalidInput("peer address cannot be empty".to_string()));
    }
    node.network
        .clone()
        .connect_peer(req.peer.trim())
        .await
        .map_err(|e| ApiError::PeerUnreachable(e.to_string()))?;
    Ok(Json(serde_json::json!({ "connected": req.peer.trim() })))
}

async fn get_api_stats(State(node): State<Arc<ApiNode>>) -> impl IntoResponse {
    Json(node.get_stats().await)
}

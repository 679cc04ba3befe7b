//! HTTP surfaces of a node
//!
//! The public router serves wallets and users. The private router is what
//! other nodes call; it must only be reachable from the peer network.

use axum::{
    extract::{Path, Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::blockchain::{AccountId, BlockData};
use crate::error::ChainError;
use crate::genesis::Genesis;
use crate::peer::{Peer, PeerStatus};
use crate::state::{State as ChainState, QUERY_LATEST};
use crate::transaction::{BlockTx, SignedTx};

type AppState = Arc<ChainState>;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    Chain(ChainError),
    InvalidInput(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Chain(ChainError::NotFound(msg)) => (StatusCode::NOT_FOUND, msg),
            ApiError::Chain(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        ApiError::Chain(err)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, serde::Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    fn new(status: &str) -> Json<Self> {
        Json(StatusResponse {
            status: status.to_string(),
        })
    }
}

#[derive(Debug, Serialize, serde::Deserialize)]
pub struct AccountEntry {
    pub account: AccountId,
    pub balance: u64,
    pub nonce: u64,
}

#[derive(Debug, Serialize, serde::Deserialize)]
pub struct AccountsResponse {
    pub latest_block: String,
    pub uncommitted: usize,
    pub accounts: Vec<AccountEntry>,
}

/// A pending transaction as shown to users.
#[derive(Debug, Serialize, serde::Deserialize)]
pub struct MempoolEntry {
    pub from: AccountId,
    pub to: AccountId,
    pub chain_id: u16,
    pub nonce: u64,
    pub value: u64,
    pub tip: u64,
    #[serde(with = "hex::serde")]
    pub data: Vec<u8>,
    pub timestamp: u64,
    pub gas_price: u64,
    pub gas_units: u64,
    pub sig: String,
}

impl From<&BlockTx> for MempoolEntry {
    fn from(tx: &BlockTx) -> Self {
        MempoolEntry {
            from: tx.from_id.clone(),
            to: tx.to_id.clone(),
            chain_id: tx.chain_id,
            nonce: tx.nonce,
            value: tx.value,
            tip: tx.tip,
            data: tx.data.clone(),
            timestamp: tx.timestamp,
            gas_price: tx.gas_price,
            gas_units: tx.gas_units,
            sig: tx.signature_string(),
        }
    }
}

// ============================================================================
// Routers
// ============================================================================

/// Request logging middleware.
async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        "api.request"
    );

    response
}

pub fn public_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![
            http::Method::GET,
            http::Method::POST,
            http::Method::OPTIONS,
        ])
        .allow_headers(vec![http::header::CONTENT_TYPE]);

    Router::new()
        .route("/v1/genesis/list", get(genesis))
        .route("/v1/accounts/list", get(accounts))
        .route("/v1/accounts/list/:account", get(account))
        .route("/v1/tx/uncommitted/list", get(mempool))
        .route("/v1/tx/uncommitted/list/:account", get(mempool_for_account))
        .route("/v1/tx/submit", post(submit_wallet_transaction))
        .route("/v1/mining/cancel", get(cancel_mining))
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
        .layer(cors)
}

pub fn private_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/node/status", get(status))
        .route("/v1/node/tx/list", get(node_mempool))
        .route("/v1/node/tx/submit", post(submit_node_transaction))
        .route("/v1/node/peers", post(submit_peer))
        .route("/v1/node/block/list/:from/:to", get(blocks_by_number))
        .route("/v1/node/block/propose", post(propose_block))
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
}

/// Serves `router` on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ChainError> {
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ChainError::from)
}

// ============================================================================
// Public Handlers
// ============================================================================

async fn genesis(State(state): State<AppState>) -> Json<Genesis> {
    Json(state.genesis().clone())
}

fn accounts_response(state: &ChainState, mut accounts: Vec<AccountEntry>) -> AccountsResponse {
    accounts.sort_by(|a, b| a.account.cmp(&b.account));
    AccountsResponse {
        latest_block: state.latest_block().hash_str(),
        uncommitted: state.mempool_length(),
        accounts,
    }
}

async fn accounts(State(state): State<AppState>) -> Json<AccountsResponse> {
    let entries = state
        .accounts()
        .into_values()
        .map(|a| AccountEntry {
            account: a.account_id,
            balance: a.balance,
            nonce: a.nonce,
        })
        .collect();
    Json(accounts_response(&state, entries))
}

async fn account(
    State(state): State<AppState>,
    Path(account): Path<String>,
) -> Result<Json<AccountsResponse>, ApiError> {
    let account_id = AccountId::parse(&account)?;
    let info = state.query_account(&account_id)?;
    let entry = AccountEntry {
        account: info.account_id,
        balance: info.balance,
        nonce: info.nonce,
    };
    Ok(Json(accounts_response(&state, vec![entry])))
}

async fn mempool(State(state): State<AppState>) -> Json<Vec<MempoolEntry>> {
    Json(state.mempool().iter().map(MempoolEntry::from).collect())
}

async fn mempool_for_account(
    State(state): State<AppState>,
    Path(account): Path<String>,
) -> Result<Json<Vec<MempoolEntry>>, ApiError> {
    let account_id = AccountId::parse(&account)?;
    let entries = state
        .mempool()
        .iter()
        .filter(|tx| tx.from_id == account_id || tx.to_id == account_id)
        .map(MempoolEntry::from)
        .collect();
    Ok(Json(entries))
}

async fn submit_wallet_transaction(
    State(state): State<AppState>,
    Json(signed): Json<SignedTx>,
) -> Result<Json<StatusResponse>, ApiError> {
    tracing::info!(
        from = %signed.from_id,
        to = %signed.to_id,
        nonce = signed.nonce,
        value = signed.value,
        tip = signed.tip,
        "add tran"
    );
    state.upsert_wallet_transaction(signed)?;
    Ok(StatusResponse::new("transactions added to mempool"))
}

async fn cancel_mining(State(state): State<AppState>) -> Json<StatusResponse> {
    state.signal_cancel_mining();
    StatusResponse::new("cancelled")
}

// ============================================================================
// Private Handlers
// ============================================================================

async fn status(State(state): State<AppState>) -> Json<PeerStatus> {
    Json(state.status())
}

async fn node_mempool(State(state): State<AppState>) -> Json<Vec<BlockTx>> {
    Json(state.mempool())
}

async fn submit_node_transaction(
    State(state): State<AppState>,
    Json(tx): Json<BlockTx>,
) -> Result<Json<StatusResponse>, ApiError> {
    state.upsert_node_transaction(tx)?;
    Ok(StatusResponse::new("transactions added to mempool"))
}

async fn submit_peer(
    State(state): State<AppState>,
    Json(peer): Json<Peer>,
) -> Json<StatusResponse> {
    if peer.matches(state.host()) {
        return StatusResponse::new("self");
    }
    if state.add_known_peer(peer.clone()) {
        tracing::info!(host = %peer.host, "adding peer");
        return StatusResponse::new("added");
    }
    StatusResponse::new("known")
}

fn parse_block_number(raw: &str) -> Result<u64, ApiError> {
    if raw == "latest" {
        return Ok(QUERY_LATEST);
    }
    raw.parse::<u64>()
        .map_err(|e| ApiError::InvalidInput(format!("invalid block number {}: {}", raw, e)))
}

async fn blocks_by_number(
    State(state): State<AppState>,
    Path((from, to)): Path<(String, String)>,
) -> Result<Json<Vec<BlockData>>, ApiError> {
    let from = parse_block_number(&from)?;
    let to = parse_block_number(&to)?;
    if from > to {
        return Err(ApiError::InvalidInput(
            "from must be less than or equal to to".to_string(),
        ));
    }

    Ok(Json(state.query_blocks_by_number(from, to)?))
}

async fn propose_block(
    State(state): State<AppState>,
    Json(block): Json<BlockData>,
) -> Result<Json<StatusResponse>, ApiError> {
    state.process_proposed_block(block)?;
    Ok(StatusResponse::new("accepted"))
}

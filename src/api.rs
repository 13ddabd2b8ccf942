//! HTTP API for a Hashledger node
//!
//! Exposes mining, transaction submission and chain inspection over JSON.
//! Handlers are thin: they lock the shared [`Blockchain`], call into the
//! core and render the result.

use axum::{
    body::Bytes,
    extract::{Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::blockchain::{Block, Blockchain};
use crate::error::ChainError;
use crate::transaction::Transaction;

/// Fields a transaction submission must carry.
const REQUIRED_TRANSACTION_FIELDS: [&str; 3] = ["sender", "recipient", "amount"];

/// Shared node state handed to every handler.
#[derive(Clone)]
pub struct Node {
    pub blockchain: Arc<RwLock<Blockchain>>,
    node_id: String,
    stop: Arc<AtomicBool>,
    blocks_mined: Arc<AtomicU64>,
}

impl Node {
    /// Create a node owning `blockchain` and rewarding `node_id` for mined blocks.
    pub fn new(blockchain: Blockchain, node_id: impl Into<String>) -> Self {
        Self {
            blockchain: Arc::new(RwLock::new(blockchain)),
            node_id: node_id.into(),
            stop: Arc::new(AtomicBool::new(false)),
            blocks_mined: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn blocks_mined(&self) -> u64 {
        self.blocks_mined.load(Ordering::Relaxed)
    }

    /// Cancels in-flight and future proof searches.
    pub fn shutdown(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Mines the next block.
    ///
    /// The proof search runs on a blocking worker without holding the chain
    /// lock. The reward credit, pool drain and append then happen under one
    /// write lock. If another mine moved the tip in the meantime the search
    /// starts over against the new last block.
    pub async fn mine(&self) -> Result<Block, ApiError> {
        let started = Instant::now();
        loop {
            let (tip_index, last_proof, pow) = {
                let blockchain = self.blockchain.read().await;
                let last_block = blockchain.last_block()?;
                (
                    last_block.index,
                    last_block.proof,
                    blockchain.proof_of_work().clone(),
                )
            };

            let stop = self.stop.clone();
            let proof = tokio::task::spawn_blocking(move || pow.find_until(last_proof, &stop))
                .await
                .map_err(|e| ApiError::InternalError(format!("Proof search failed: {}", e)))?
                .ok_or(ChainError::MiningCancelled)?;

            let mut blockchain = self.blockchain.write().await;
            let current_tip = blockchain.last_block()?.index;
            if current_tip != tip_index {
                warn!(
                    expected = tip_index,
                    actual = current_tip,
                    "Chain tip moved during proof search; retrying"
                );
                continue;
            }

            let block = blockchain.forge_block(proof, &self.node_id)?;
            self.blocks_mined.fetch_add(1, Ordering::SeqCst);

            info!(
                index = block.index,
                proof = block.proof,
                elapsed = %humantime::format_duration(started.elapsed()),
                "New block forged"
            );
            return Ok(block);
        }
    }

    pub async fn submit_transaction(&self, tx: Transaction) -> Result<u64, ApiError> {
        let mut blockchain = self.blockchain.write().await;
        Ok(blockchain.add_transaction(tx)?)
    }

    pub async fn get_chain(&self) -> (Vec<Block>, usize) {
        self.blockchain.read().await.get_chain()
    }
}

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    MissingField,
    BlockchainError(ChainError),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::MissingField => (StatusCode::BAD_REQUEST, "Missing value".to_string()),
            ApiError::BlockchainError(ChainError::MiningCancelled) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ChainError::MiningCancelled.to_string(),
            ),
            ApiError::BlockchainError(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ApiError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        ApiError::BlockchainError(err)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct MineResponse {
    pub message: String,
    pub index: u64,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: String,
}

impl From<Block> for MineResponse {
    fn from(block: Block) -> Self {
        MineResponse {
            message: "New Block Forged".to_string(),
            index: block.index,
            transactions: block.transactions,
            proof: block.proof,
            previous_hash: block.previous_hash,
        }
    }
}

#[derive(Serialize)]
pub struct ChainResponse {
    pub chain: Vec<Block>,
    pub length: usize,
}

#[derive(Serialize)]
pub struct ValidationResponse {
    pub valid: bool,
    pub length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

/// Parses a submission body. Any body that is not a JSON object carrying
/// all required fields is reported as a missing value; the field values
/// themselves are taken as given, whatever their JSON type.
fn parse_transaction(body: &[u8]) -> Result<Transaction, ApiError> {
    let value: Value = serde_json::from_slice(body).map_err(|_| ApiError::MissingField)?;
    let mut fields = match value {
        Value::Object(fields) => fields,
        _ => return Err(ApiError::MissingField),
    };

    let [sender, recipient, amount] =
        REQUIRED_TRANSACTION_FIELDS.map(|field| fields.remove(field));
    match (sender, recipient, amount) {
        (Some(sender), Some(recipient), Some(amount)) => {
            Ok(Transaction::new(sender, recipient, amount))
        }
        _ => Err(ApiError::MissingField),
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Logs method, path, status and duration of every request.
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

// ============================================================================
// API Server
// ============================================================================

/// Build the API router with all endpoints
pub fn build_api_router(node: Arc<Node>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![
            http::Method::GET,
            http::Method::POST,
            http::Method::OPTIONS,
        ])
        .allow_headers(vec![http::header::CONTENT_TYPE]);

    Router::new()
        .route("/mine", get(mine))
        .route("/transactions/new", post(new_transaction))
        .route("/chain", get(get_chain))
        .route("/chain/validate", get(validate_chain))
        .route("/mempool", get(get_mempool))
        .route("/health", get(health_check))
        .layer(middleware::from_fn(logging_middleware))
        .with_state(node)
        .layer(cors)
}

/// Serves the API on `listener` until `shutdown` resolves, then cancels any
/// running proof search.
pub async fn run_api_server(
    node: Arc<Node>,
    listener: TcpListener,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ChainError> {
    let app = build_api_router(node.clone());

    info!("API server listening on http://{}", listener.local_addr()?);

    let stopping = node.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Shutdown requested; stopping proof search");
            stopping.shutdown();
        })
        .await?;

    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn mine(State(node): State<Arc<Node>>) -> Result<Json<MineResponse>, ApiError> {
    let block = node.mine().await?;
    Ok(Json(block.into()))
}

async fn new_transaction(
    State(node): State<Arc<Node>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let tx = parse_transaction(&body)?;
    let index = node.submit_transaction(tx).await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: format!("Transaction will be added to Block {}", index),
        }),
    ))
}

async fn get_chain(State(node): State<Arc<Node>>) -> Json<ChainResponse> {
    let (chain, length) = node.get_chain().await;
    Json(ChainResponse { chain, length })
}

async fn validate_chain(State(node): State<Arc<Node>>) -> Json<ValidationResponse> {
    let blockchain = node.blockchain.read().await;
    let error = blockchain.validate().err().map(|e| e.to_string());
    Json(ValidationResponse {
        valid: error.is_none(),
        length: blockchain.len(),
        error,
    })
}

async fn get_mempool(State(node): State<Arc<Node>>) -> impl IntoResponse {
    let blockchain = node.blockchain.read().await;
    let transactions = blockchain.mempool().get_all_transactions();
    Json(serde_json::json!({
        "count": transactions.len(),
        "transactions": transactions
    }))
}

async fn health_check(State(node): State<Arc<Node>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "node_id": node.node_id(),
        "blocks_mined": node.blocks_mined(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transaction_requires_all_fields() {
        assert!(parse_transaction(br#"{"sender":"a","recipient":"b","amount":5}"#).is_ok());
        assert!(matches!(
            parse_transaction(br#"{"sender":"a","recipient":"b"}"#),
            Err(ApiError::MissingField)
        ));
        assert!(matches!(
            parse_transaction(b"not json"),
            Err(ApiError::MissingField)
        ));
        assert!(matches!(
            parse_transaction(br#"[1, 2, 3]"#),
            Err(ApiError::MissingField)
        ));
    }

    #[test]
    fn test_parse_transaction_accepts_any_field_type() {
        let tx = parse_transaction(br#"{"sender":"A","recipient":"B","amount":"5"}"#).unwrap();
        assert_eq!(tx.amount, "5");

        let tx = parse_transaction(br#"{"sender":null,"recipient":"B","amount":5}"#).unwrap();
        assert!(tx.sender.is_null());

        let tx = parse_transaction(br#"{"sender":7,"recipient":"B","amount":5}"#).unwrap();
        assert_eq!(tx.sender, 7);
        assert!(!tx.is_reward());

        // a null field is present, not missing
        assert!(parse_transaction(br#"{"sender":"A","recipient":null,"amount":null}"#).is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_node_does_not_mine() {
        let node = Node::new(Blockchain::new(), "node");
        node.shutdown();
        assert!(matches!(
            node.mine().await,
            Err(ApiError::BlockchainError(ChainError::MiningCancelled))
        ));
        assert_eq!(node.get_chain().await.1, 1);
    }

    #[tokio::test]
    async fn test_concurrent_mines_keep_chain_valid() {
        let node = Node::new(
            Blockchain::with_proof_of_work(crate::miner::ProofOfWork::new(2), 1),
            "node",
        );
        let (a, b) = tokio::join!(node.mine(), node.mine());
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_ne!(a.index, b.index);

        let blockchain = node.blockchain.read().await;
        assert_eq!(blockchain.len(), 3);
        assert!(blockchain.validate().is_ok());
        assert_eq!(node.blocks_mined(), 2);
    }
}

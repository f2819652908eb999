//! Signing Service
//!
//! HTTP facade over the signing core. Single-mode wallets (`/wallets/*`)
//! route to the Ed25519 signer; threshold wallets (`/mpc/wallets/*`) route
//! to the TSS coordinator. Mutating routes require the configured API key.

use anyhow::Result;
use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use clap::Parser;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use tss_core::{store::MemoryShareStore, store::ShareStore, Coordinator, Ed25519Signer};

use share_store_client::StoreClient;

/// Signing service CLI arguments
#[derive(Parser, Debug)]
#[command(name = "signer-svc")]
#[command(about = "Signing service for single-key and threshold wallets")]
#[command(version)]
struct Args {
    /// Listen address
    #[arg(short, long, env = "LISTEN_ADDR", default_value = "0.0.0.0:3000")]
    listen: String,

    /// Number of share-holding parties
    #[arg(long, env = "MPC_NODES", default_value = "3")]
    mpc_nodes: usize,

    /// Signing threshold (t-of-n)
    #[arg(long, env = "MPC_THRESHOLD", default_value = "2")]
    mpc_threshold: usize,

    /// API key required on mutating routes; admission is disabled when unset
    #[arg(long, env = "API_KEY")]
    api_key: Option<String>,

    /// External secret store base URL; an in-memory store is used when unset
    #[arg(long, env = "SHARE_STORE_URL")]
    store_url: Option<String>,

    /// Bearer token for the external secret store
    #[arg(long, env = "SHARE_STORE_TOKEN")]
    store_token: Option<String>,

    /// Secret store request timeout in seconds
    #[arg(long, env = "SHARE_STORE_TIMEOUT_SECS", default_value = "5")]
    store_timeout: u64,
}

/// Application state
struct AppState {
    ed25519: Ed25519Signer,
    tss: Coordinator,
    nodes: usize,
    threshold: usize,
    api_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    if args.mpc_threshold < 2 || args.mpc_threshold > args.mpc_nodes {
        anyhow::bail!(
            "invalid MPC parameters: require 2 <= threshold <= nodes, got threshold={} nodes={}",
            args.mpc_threshold,
            args.mpc_nodes
        );
    }
    if args.api_key.is_none() {
        warn!("API_KEY is not set; mutating routes are unauthenticated");
    }

    let store: Arc<dyn ShareStore> = match &args.store_url {
        Some(url) => {
            info!(url, "using external secret store");
            let mut client =
                StoreClient::new(url).with_timeout(Duration::from_secs(args.store_timeout));
            if let Some(token) = &args.store_token {
                client = client.with_token(token);
            }
            Arc::new(client)
        }
        None => {
            warn!("SHARE_STORE_URL is not set; secrets are kept in process memory");
            Arc::new(MemoryShareStore::new())
        }
    };

    info!(
        listen = %args.listen,
        nodes = args.mpc_nodes,
        threshold = args.mpc_threshold,
        "Starting signing service"
    );

    let state = Arc::new(AppState {
        ed25519: Ed25519Signer::new(store.clone()),
        tss: Coordinator::new(store),
        nodes: args.mpc_nodes,
        threshold: args.mpc_threshold,
        api_key: args.api_key.clone(),
    });

    let mutating = Router::new()
        .route("/wallets/generate", post(generate_wallet))
        .route("/wallets/sign-order", post(sign_order))
        .route("/wallets/sign", post(sign_message))
        .route("/mpc/wallets/generate", post(mpc_generate_wallet))
        .route("/mpc/wallets/sign-order", post(mpc_sign_order))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    let open = Router::new()
        .route("/health", get(health))
        .route("/wallets/:wallet_id/public-key", get(wallet_public_key))
        .route("/mpc/status", get(mpc_status))
        .route(
            "/mpc/wallets/:wallet_id/public-key",
            get(mpc_wallet_public_key),
        );

    let app = Router::new()
        .merge(mutating)
        .merge(open)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    info!(address = %args.listen, "Listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// API-key admission for mutating routes
async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(expected) = &state.api_key {
        let presented = request
            .headers()
            .get("x-api-key")
            .and_then(|value| value.to_str().ok());
        if presented != Some(expected.as_str()) {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "success": false, "error": "invalid or missing API key" })),
            )
                .into_response();
        }
    }
    next.run(request).await
}

/// Error wrapper mapping the core taxonomy onto HTTP statuses
struct ApiError(tss_core::Error);

impl From<tss_core::Error> for ApiError {
    fn from(e: tss_core::Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use tss_core::Error;
        let status = match &self.0 {
            Error::InvalidInput(_) | Error::ThresholdNotMet { .. } | Error::Serialization(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Crypto(_) | Error::Io(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (
            status,
            Json(json!({ "success": false, "error": self.0.to_string() })),
        )
            .into_response()
    }
}

fn require_wallet_id(wallet_id: &str) -> Result<(), ApiError> {
    if wallet_id.trim().is_empty() {
        return Err(ApiError(tss_core::Error::InvalidInput(
            "walletId is required".into(),
        )));
    }
    Ok(())
}

fn hex_0x(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Request to generate a wallet
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    wallet_id: String,
    metadata: Option<Value>,
}

/// Request to sign an order payload
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignOrderRequest {
    wallet_id: String,
    order_payload: Value,
}

/// Request to sign a raw message
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignMessageRequest {
    wallet_id: String,
    message: String,
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "signer-svc",
        "mpcEnabled": true,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Generate a single-mode Ed25519 wallet
async fn generate_wallet(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<Value>, ApiError> {
    require_wallet_id(&request.wallet_id)?;

    let public_key = state.ed25519.generate(&request.wallet_id).await?;

    Ok(Json(json!({
        "success": true,
        "wallet": {
            "walletId": request.wallet_id,
            "publicKey": hex_0x(&public_key),
            "createdAt": Utc::now().to_rfc3339(),
            "metadata": request.metadata,
        },
    })))
}

/// Sign an order payload with a single-mode wallet
async fn sign_order(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignOrderRequest>,
) -> Result<Json<Value>, ApiError> {
    require_wallet_id(&request.wallet_id)?;

    let signature = state
        .ed25519
        .sign_payload(&request.wallet_id, &request.order_payload)
        .await?;
    let public_key = state.ed25519.public_key(&request.wallet_id).await?;

    Ok(Json(json!({
        "success": true,
        "signature": hex_0x(&signature),
        "publicKey": hex_0x(&public_key),
        "walletId": request.wallet_id,
    })))
}

/// Sign a raw UTF-8 message with a single-mode wallet
async fn sign_message(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignMessageRequest>,
) -> Result<Json<Value>, ApiError> {
    require_wallet_id(&request.wallet_id)?;

    let signature = state
        .ed25519
        .sign(&request.wallet_id, request.message.as_bytes())
        .await?;
    let public_key = state.ed25519.public_key(&request.wallet_id).await?;

    Ok(Json(json!({
        "success": true,
        "signature": hex_0x(&signature),
        "publicKey": hex_0x(&public_key),
        "walletId": request.wallet_id,
    })))
}

/// Public key of a single-mode wallet
async fn wallet_public_key(
    State(state): State<Arc<AppState>>,
    Path(wallet_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let public_key = state.ed25519.public_key(&wallet_id).await?;

    Ok(Json(json!({
        "success": true,
        "walletId": wallet_id,
        "publicKey": hex_0x(&public_key),
    })))
}

/// Threshold subsystem status
async fn mpc_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "mpcEnabled": true,
        "nodes": state.nodes,
        "threshold": state.threshold,
        "service": "signer-svc",
        "version": tss_core::VERSION,
    }))
}

/// Generate a threshold wallet via DKG
async fn mpc_generate_wallet(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<Value>, ApiError> {
    require_wallet_id(&request.wallet_id)?;

    let outcome = state
        .tss
        .perform_dkg(&request.wallet_id, state.threshold, state.nodes)
        .await?;

    Ok(Json(json!({
        "success": true,
        "wallet": {
            "walletId": request.wallet_id,
            "publicKey": outcome.public_key_hex(),
            "shareIds": outcome.share_ids,
            "threshold": outcome.threshold,
            "nodes": state.nodes,
            "createdAt": Utc::now().to_rfc3339(),
            "metadata": request.metadata,
        },
    })))
}

/// Sign an order payload with a threshold wallet.
///
/// The first sign after key generation loads and re-verifies every share
/// from the store before the session starts.
async fn mpc_sign_order(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignOrderRequest>,
) -> Result<Json<Value>, ApiError> {
    require_wallet_id(&request.wallet_id)?;

    if !state.tss.parties_ready(&request.wallet_id)? {
        state
            .tss
            .initialize_parties(&request.wallet_id, state.nodes)
            .await?;
    }

    let payload_bytes =
        serde_json::to_vec(&request.order_payload).map_err(tss_core::Error::from)?;
    let signers = state.tss.share_ids(&request.wallet_id)?;
    let signature = state
        .tss
        .sign(&request.wallet_id, &payload_bytes, &signers)?;

    Ok(Json(json!({
        "success": true,
        "signature": signature.to_hex(),
        "method": "tss",
        "ecdsaVerified": signature.ecdsa_valid,
        "walletId": request.wallet_id,
    })))
}

/// Master public key of a threshold wallet
async fn mpc_wallet_public_key(
    State(state): State<Arc<AppState>>,
    Path(wallet_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let public_key = state.tss.master_public_key(&wallet_id)?;

    Ok(Json(json!({
        "success": true,
        "walletId": wallet_id,
        "publicKey": hex_0x(&public_key),
    })))
}

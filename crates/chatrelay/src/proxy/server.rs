//! HTTP relay server
//!
//! Routes:
//! - `GET /health` - liveness check
//! - `POST /api/chat` - validate the conversation, call the provider with
//!   `stream: true`, and stream the transcoded frames back

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::State,
    http::{Response, StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{Config, LimitsConfig};
use crate::error::{RelayError, Result};
use crate::transcode::TranscodeStream;

use super::error::ProxyError;
use super::request::parse_chat_request;
use super::upstream::UpstreamClient;

/// Protocol-version header understood by data stream consumers
pub const DATA_STREAM_HEADER: &str = "x-vercel-ai-data-stream";

/// Shared application state for all handlers
#[derive(Debug, Clone)]
pub struct AppState {
    /// Request validation limits
    pub limits: LimitsConfig,
    /// Client for the upstream provider
    pub upstream: UpstreamClient,
}

/// The relay server
pub struct ProxyServer {
    config: Config,
}

impl ProxyServer {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Start the server and listen for requests until shutdown
    pub async fn serve(&self) -> Result<()> {
        let api_key = self.config.upstream.api_key()?;
        let upstream = UpstreamClient::new(self.config.upstream.clone(), api_key)?;

        tracing::info!("Upstream endpoint: {}", upstream.endpoint());
        tracing::info!("Upstream model: {}", self.config.upstream.resolved_model());

        let app_state = Arc::new(AppState {
            limits: self.config.limits.clone(),
            upstream,
        });

        let app = create_router(app_state);

        let addr: SocketAddr = self
            .config
            .server
            .listen_addr
            .parse()
            .map_err(|e| RelayError::Config(format!("Invalid listen address: {e}")))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| RelayError::Proxy(format!("Failed to bind to {addr}: {e}")))?;

        tracing::info!("Relay listening on {addr}");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| RelayError::Proxy(format!("Server error: {e}")))?;

        tracing::info!("Relay shut down gracefully");
        Ok(())
    }
}

/// Create the router with all routes configured
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/chat", post(chat_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint - returns JSON status
async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

async fn chat_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response<Body> {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("chat", %request_id);

    async move {
        match relay_chat(&state, &body).await {
            Ok(response) => response,
            Err(e) => {
                e.log();
                e.into_response()
            }
        }
    }
    .instrument(span)
    .await
}

async fn relay_chat(
    state: &AppState,
    body: &[u8],
) -> std::result::Result<Response<Body>, ProxyError> {
    let messages = parse_chat_request(body, &state.limits)?;

    tracing::info!("Sending request upstream with {} messages", messages.len());
    let upstream = state.upstream.stream_chat(&messages).await?;
    tracing::info!("Upstream response OK, starting stream");

    let frames = TranscodeStream::new(Box::pin(upstream.bytes_stream()));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(header::CACHE_CONTROL, "no-cache, no-transform")
        .header(DATA_STREAM_HEADER, "v1")
        .body(Body::from_stream(frames))
        .map_err(|e| ProxyError::Internal(format!("Failed to build response: {e}")))
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}

//! HTTP server: shared state, routing and startup.

pub mod error;
mod handlers;
mod middleware;

use crate::analysis::ContractAnalyzer;
use crate::config::Config;
use crate::security::{ApiKeyStore, RateLimiter};
use crate::store::AnalysisStore;
use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tracing::info;

/// Multipart framing allowance on top of the upload size limit.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub analyzer: Arc<ContractAnalyzer>,
    pub store: Arc<AnalysisStore>,
    pub keys: Arc<ApiKeyStore>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: Config, analyzer: ContractAnalyzer, keys: ApiKeyStore) -> Self {
        let store = AnalysisStore::new(config.limits.max_stored_analyses);
        Self {
            config: Arc::new(config),
            analyzer: Arc::new(analyzer),
            store: Arc::new(store),
            keys: Arc::new(keys),
            limiter: Arc::new(RateLimiter::new()),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.limits.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    let api = Router::new()
        .route("/v1/contracts/analyze", post(handlers::analyze_handler))
        .route(
            "/v1/contracts/analyze/quick",
            post(handlers::quick_score_handler),
        )
        .route(
            "/v1/contracts/upload",
            post(handlers::upload_handler).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/v1/contracts/:id", get(handlers::get_analysis_handler))
        .route("/v1/contracts/:id/score", get(handlers::get_scores_handler))
        .route("/v1/contracts/:id/flags", get(handlers::get_flags_handler))
        .route("/v1/contracts/:id/report", get(handlers::get_report_handler))
        .route_layer(from_fn_with_state(state.clone(), middleware::auth_middleware));

    Router::new()
        .route("/", get(handlers::landing_handler))
        .route("/health", get(handlers::health_handler))
        .merge(api)
        .layer(DefaultBodyLimit::max(state.config.limits.max_body_bytes))
        .layer(from_fn_with_state(state.clone(), middleware::cors_middleware))
        .layer(from_fn(middleware::request_tracing_middleware))
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(state: AppState) -> Result<()> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(
        "{} listening on http://{}",
        state.config.general.app_name,
        listener.local_addr().context("Failed to read local address")?
    );

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections");
}

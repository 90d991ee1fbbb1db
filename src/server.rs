//! HTTP server exposing the live dashboard.
//!
//! This module provides a read-only HTTP surface over the running monitor:
//! - `GET /health` for liveness checks
//! - `GET /dashboard` for the latest [`DashboardSnapshot`]
//! - `GET /stats` for run statistics
//!
//! # Architecture
//!
//! ```text
//! Runner ──write──→ SharedDashboard ──read──→ GET /dashboard ──→ web dashboard
//!                                  (RwLock)
//! ```

use crate::dashboard::{DashboardSnapshot, SharedDashboard};
use crate::telemetry::{MonitorStatsSnapshot, SharedMonitorStats};
use axum::{extract::State, http::HeaderValue, routing::get, Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
}

impl ServerConfig {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

/// Shared server state
pub struct ServerState {
    dashboard: SharedDashboard,
    stats: SharedMonitorStats,
}

impl ServerState {
    pub fn new(dashboard: SharedDashboard, stats: SharedMonitorStats) -> Self {
        Self { dashboard, stats }
    }
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /dashboard
async fn dashboard(State(state): State<Arc<ServerState>>) -> Json<DashboardSnapshot> {
    Json(state.dashboard.read().await.clone())
}

/// GET /stats
async fn stats(State(state): State<Arc<ServerState>>) -> Json<MonitorStatsSnapshot> {
    Json(state.stats.stats())
}

/// Build the router without binding a socket.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/dashboard", get(dashboard))
        .route("/stats", get(stats))
        .layer(
            CorsLayer::new()
                .allow_origin([
                    HeaderValue::from_static("http://localhost"),
                    HeaderValue::from_static("http://127.0.0.1"),
                ])
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
    dashboard: SharedDashboard,
    stats: SharedMonitorStats,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let app = router(Arc::new(ServerState::new(dashboard, stats)));

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Dashboard server listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}

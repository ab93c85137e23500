//! Keyrack HTTP server
//!
//! JSON API over the key service using axum

pub mod handlers;
pub mod routes;

use axum::{extract::Extension, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::service::KeyService;
use crate::sync::SyncService;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP server bind address
    pub http_addr: String,
    /// HTTP port
    pub http_port: u16,
    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0".to_string(),
            http_port: 5050,
            enable_cors: true,
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub keys: Arc<KeyService>,
    /// Absent when no vehicle source is configured
    pub sync: Option<Arc<SyncService>>,
    pub config: ServerConfig,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("sync", &self.sync.is_some())
            .finish()
    }
}

/// Build the router with all routes and layers
pub fn router(state: AppState) -> Router {
    let enable_cors = state.config.enable_cors;

    let app = Router::new()
        .merge(routes::api_routes())
        .merge(routes::health_routes())
        .layer(Extension(Arc::new(state)))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new());

    if enable_cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Start the keyrack server
pub async fn start_server(
    config: ServerConfig,
    keys: Arc<KeyService>,
    sync: Option<Arc<SyncService>>,
) -> anyhow::Result<()> {
    info!(
        addr = %config.http_addr,
        port = config.http_port,
        sync = sync.is_some(),
        "Starting keyrack HTTP server"
    );

    crate::metrics::init_metrics();

    let addr = format!("{}:{}", config.http_addr, config.http_port);
    let app = router(AppState { keys, sync, config });

    let listener = TcpListener::bind(&addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Metrics: http://{}/_metrics", addr);
    info!("Health: http://{}/health", addr);

    axum::serve(listener, app).await.map_err(|e| {
        error!(error = %e, "Server error");
        anyhow::anyhow!("Server failed: {}", e)
    })
}

//! HTTP routes definition

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;

/// Key rack API
///
/// - GET  /api/status          - Rack and sync summary
/// - POST /api/sync            - Run an inventory sync now
/// - GET  /api/sync/status     - Result of the last sync
/// - GET  /api/slots           - Occupied slots in order
/// - GET  /api/slots/:index    - One slot
/// - GET  /api/sold            - Keys waiting for handover
/// - GET  /api/search/:plate   - Find a vehicle by plate
/// - POST /api/vehicle         - Add a vehicle by hand
/// - POST /api/sell            - Mark a vehicle sold
/// - POST /api/handover        - Complete a key handover
pub fn api_routes() -> Router {
    Router::new()
        .route("/api/status", get(handlers::status))
        .route("/api/sync", post(handlers::trigger_sync))
        .route("/api/sync/status", get(handlers::sync_status))
        .route("/api/slots", get(handlers::list_slots))
        .route("/api/slots/:index", get(handlers::slot_status))
        .route("/api/sold", get(handlers::list_sold))
        .route("/api/search/:plate", get(handlers::search))
        .route("/api/vehicle", post(handlers::add_vehicle))
        .route("/api/sell", post(handlers::sell))
        .route("/api/handover", post(handlers::handover))
}

/// Health check routes
pub fn health_routes() -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/_metrics", get(handlers::metrics))
}

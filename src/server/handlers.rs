//! HTTP route handlers

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Extension, Json, Path,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::error::Error;
use crate::server::AppState;
use crate::service::VehicleDetails;
use crate::slots::{Assignment, PoolLabel, SoldRecord};
use crate::source::{coerce_optional_price, coerce_price};

/// HTTP status for a key service error
fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::DuplicatePlate(_) | Error::TableFull | Error::PoolFull => StatusCode::CONFLICT,
        Error::NotFound(_) | Error::InvalidIndex { .. } => StatusCode::NOT_FOUND,
        Error::InvalidArgument(_) | Error::Config(_) => StatusCode::BAD_REQUEST,
        Error::Source(_) => StatusCode::BAD_GATEWAY,
        Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({
            "success": false,
            "error": message.into(),
        })),
    )
        .into_response()
}

fn error_response(err: &Error) -> Response {
    failure(status_for(err), err.to_string())
}

/// Extracted value, or a JSON 400 in place of axum's plain-text rejection
fn extracted<T, R: std::fmt::Display>(result: Result<T, R>) -> Result<T, Response> {
    result.map_err(|rejection| {
        warn!(error = %rejection, "Rejected malformed request");
        failure(StatusCode::BAD_REQUEST, rejection.to_string())
    })
}

/// Occupied slot with descriptive metadata pulled to the top level
#[derive(Debug, Serialize)]
pub struct SlotView {
    pub slot_index: usize,
    pub vehicle_id: String,
    pub license_plate: String,
    pub purchase_price: f64,
    pub assigned_at: DateTime<Utc>,
    pub brand: String,
    pub model: String,
    pub color: String,
}

impl From<&Assignment> for SlotView {
    fn from(a: &Assignment) -> Self {
        Self {
            slot_index: a.slot_index,
            vehicle_id: a.vehicle_id.clone(),
            license_plate: a.license_plate.clone(),
            purchase_price: a.purchase_price,
            assigned_at: a.assigned_at,
            brand: a.metadata_str("brand").to_string(),
            model: a.metadata_str("model").to_string(),
            color: a.metadata_str("color").to_string(),
        }
    }
}

/// Pending handover with descriptive metadata pulled to the top level
#[derive(Debug, Serialize)]
pub struct SoldView {
    pub pool_label: PoolLabel,
    pub vehicle_id: String,
    pub license_plate: String,
    pub purchase_price: f64,
    pub original_slot_index: usize,
    pub sold_at: DateTime<Utc>,
    pub sold_price: Option<f64>,
    pub buyer_name: Option<String>,
    pub brand: String,
    pub model: String,
    pub color: String,
}

impl From<&SoldRecord> for SoldView {
    fn from(r: &SoldRecord) -> Self {
        Self {
            pool_label: r.pool_label,
            vehicle_id: r.vehicle_id.clone(),
            license_plate: r.license_plate.clone(),
            purchase_price: r.purchase_price,
            original_slot_index: r.original_slot_index,
            sold_at: r.sold_at,
            sold_price: r.sold_price,
            buyer_name: r
                .buyer_info
                .as_ref()
                .and_then(|b| b.get("name"))
                .and_then(Value::as_str)
                .map(str::to_string),
            brand: r.metadata_str("brand").to_string(),
            model: r.metadata_str("model").to_string(),
            color: r.metadata_str("color").to_string(),
        }
    }
}

/// Manual vehicle entry
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AddVehicleRequest {
    pub license_plate: Option<String>,
    pub purchase_price: Option<Value>,
    pub vehicle_id: Option<String>,
    pub preferred_slot: Option<usize>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub color: Option<String>,
}

/// Sale of a vehicle in stock
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SellRequest {
    pub license_plate: Option<String>,
    pub sold_price: Option<Value>,
    pub buyer_name: Option<String>,
}

/// Key handed to the buyer
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HandoverRequest {
    pub license_plate: Option<String>,
}

/// Trimmed, uppercased plate or a 400 response
fn required_plate(plate: Option<&str>) -> Result<String, Response> {
    plate
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_uppercase)
        .ok_or_else(|| failure(StatusCode::BAD_REQUEST, "license_plate is required"))
}

/// Rack and sync summary
#[instrument(skip(state))]
pub async fn status(Extension(state): Extension<Arc<AppState>>) -> Response {
    let stats = state.keys.system_status();
    let last_sync = state
        .sync
        .as_ref()
        .and_then(|sync| sync.last_sync().finished_at);

    Json(json!({
        "success": true,
        "stats": stats,
        "tiers": state.keys.allocator().tiers(),
        "sync_configured": state.sync.is_some(),
        "last_sync": last_sync,
    }))
    .into_response()
}

/// Run an inventory sync now
#[instrument(skip(state))]
pub async fn trigger_sync(Extension(state): Extension<Arc<AppState>>) -> Response {
    let Some(sync) = state.sync.as_ref() else {
        return failure(
            StatusCode::SERVICE_UNAVAILABLE,
            "No vehicle source configured",
        );
    };

    info!("Manual sync requested");
    match sync.sync_once().await {
        Ok(report) => Json(json!({
            "success": true,
            "report": report,
        }))
        .into_response(),
        Err(e) => {
            error!(error = %e, "Manual sync failed");
            error_response(&e)
        }
    }
}

/// Result of the last sync
#[instrument(skip(state))]
pub async fn sync_status(Extension(state): Extension<Arc<AppState>>) -> Response {
    match state.sync.as_ref() {
        Some(sync) => Json(json!({
            "success": true,
            "source": sync.source_name(),
            "last": sync.last_sync(),
        }))
        .into_response(),
        None => failure(
            StatusCode::SERVICE_UNAVAILABLE,
            "No vehicle source configured",
        ),
    }
}

/// Occupied slots in slot order
#[instrument(skip(state))]
pub async fn list_slots(Extension(state): Extension<Arc<AppState>>) -> Response {
    let mut slots: Vec<SlotView> = state.keys.assignments().iter().map(SlotView::from).collect();
    slots.sort_by_key(|s| s.slot_index);

    Json(json!({
        "success": true,
        "count": slots.len(),
        "slots": slots,
        "stats": state.keys.system_status(),
    }))
    .into_response()
}

/// One slot by index
#[instrument(skip(state))]
pub async fn slot_status(
    Extension(state): Extension<Arc<AppState>>,
    index: Result<Path<usize>, PathRejection>,
) -> Response {
    let Path(index) = match extracted(index) {
        Ok(index) => index,
        Err(response) => return response,
    };
    match state.keys.slot_status(index) {
        Ok(slot) => Json(json!({
            "success": true,
            "slot": slot,
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}

/// Keys waiting for handover
#[instrument(skip(state))]
pub async fn list_sold(Extension(state): Extension<Arc<AppState>>) -> Response {
    let pending: Vec<SoldView> = state.keys.list_pending().iter().map(SoldView::from).collect();

    Json(json!({
        "success": true,
        "count": pending.len(),
        "free": state.keys.allocator().free_pool_count(),
        "pending": pending,
    }))
    .into_response()
}

/// Find a vehicle in the rack or the handover pool
#[instrument(skip(state))]
pub async fn search(
    Extension(state): Extension<Arc<AppState>>,
    Path(plate): Path<String>,
) -> Response {
    let Some(location) = state.keys.find_vehicle(&plate) else {
        return Json(json!({ "found": false })).into_response();
    };

    let mut body = match serde_json::to_value(&location) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            error!(plate = %plate, "Failed to serialize vehicle location");
            return failure(StatusCode::INTERNAL_SERVER_ERROR, "Failed to serialize vehicle");
        }
    };
    body.insert("found".to_string(), Value::Bool(true));
    Json(Value::Object(body)).into_response()
}

/// Add a vehicle by hand
#[instrument(skip(state, payload))]
pub async fn add_vehicle(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<AddVehicleRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match extracted(payload) {
        Ok(payload) => payload,
        Err(response) => return response,
    };
    let plate = match required_plate(payload.license_plate.as_deref()) {
        Ok(plate) => plate,
        Err(response) => return response,
    };
    let price = coerce_price(payload.purchase_price.as_ref());
    let details = VehicleDetails {
        brand: payload.brand,
        model: payload.model,
        color: payload.color,
    };

    match state.keys.add_vehicle_manually(
        &plate,
        price,
        payload.vehicle_id,
        payload.preferred_slot,
        details,
    ) {
        Ok(slot) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "license_plate": plate,
                "slot_index": slot,
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

/// Mark a vehicle sold and move its key to the handover pool
#[instrument(skip(state, payload))]
pub async fn sell(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<SellRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match extracted(payload) {
        Ok(payload) => payload,
        Err(response) => return response,
    };
    let plate = match required_plate(payload.license_plate.as_deref()) {
        Ok(plate) => plate,
        Err(response) => return response,
    };
    let sold_price = coerce_optional_price(payload.sold_price.as_ref());

    match state
        .keys
        .sell_vehicle(&plate, sold_price, payload.buyer_name.as_deref())
    {
        Ok(label) => {
            info!(plate = %plate, pool_label = %label, "Vehicle sold");
            Json(json!({
                "success": true,
                "license_plate": plate,
                "pool_label": label,
            }))
            .into_response()
        }
        Err(e) => {
            warn!(plate = %plate, error = %e, "Sale rejected");
            error_response(&e)
        }
    }
}

/// Complete a key handover
#[instrument(skip(state, payload))]
pub async fn handover(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<HandoverRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match extracted(payload) {
        Ok(payload) => payload,
        Err(response) => return response,
    };
    let plate = match required_plate(payload.license_plate.as_deref()) {
        Ok(plate) => plate,
        Err(response) => return response,
    };

    if state.keys.complete_handover(&plate) {
        Json(json!({
            "success": true,
            "license_plate": plate,
        }))
        .into_response()
    } else {
        error_response(&Error::NotFound(plate))
    }
}

/// Liveness with rack summary
pub async fn health(Extension(state): Extension<Arc<AppState>>) -> Response {
    Json(json!({
        "status": "healthy",
        "version": crate::VERSION,
        "stats": state.keys.system_status(),
    }))
    .into_response()
}

/// Prometheus metrics endpoint
pub async fn metrics() -> String {
    crate::metrics::export_metrics()
}

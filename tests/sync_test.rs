//! Inventory sync against a local fake dealer API

use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use keyrack::config::SourceSettings;
use keyrack::source::{HttpVehicleSource, VehicleSource};
use keyrack::{KeyService, KeySlotAllocator, PriceTiers, SyncService};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;

const TOKEN: &str = "test-token";

/// Two pages of inventory; page 3 would fail if ever requested
async fn vehicles(headers: HeaderMap, Query(params): Query<HashMap<String, String>>) -> Response {
    if headers.get("token").and_then(|v| v.to_str().ok()) != Some(TOKEN) {
        return (StatusCode::UNAUTHORIZED, "bad token").into_response();
    }
    if !params.get("fields").is_some_and(|f| f.contains("license_plate")) {
        return (StatusCode::BAD_REQUEST, "fields missing").into_response();
    }

    match params.get("page").map(String::as_str) {
        Some("1") => Json(json!({
            "data": [
                {"vehicle_id": 101, "license_plate": "HX-101-A", "purchase_price": "3500", "brand": "Volvo", "is_sold": 0},
                {"vehicle_id": 102, "license_plate": "HX-102-B", "purchase_price": 1800, "is_sold": "0"},
                {"vehicle_id": 103, "license_plate": "", "purchase_price": 900}
            ],
            "nextpage": 1
        }))
        .into_response(),
        Some("2") => Json(json!({
            "data": [
                {"vehicle_id": "104", "license_plate": "HX-104-C", "purchase_price": null},
                {"vehicle_id": "105", "license_plate": "HX-105-D", "purchase_price": 700, "is_sold": 1}
            ],
            "nextpage": false
        }))
        .into_response(),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "no such page").into_response(),
    }
}

async fn spawn_fake_api() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route("/vehicle", get(vehicles));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/", addr)
}

fn settings(base_url: String, token: Option<&str>) -> SourceSettings {
    SourceSettings {
        base_url: Some(base_url),
        token: token.map(str::to_string),
        ..SourceSettings::default()
    }
}

#[tokio::test]
async fn test_http_source_walks_pages() {
    let base_url = spawn_fake_api().await;
    let source = HttpVehicleSource::new(&settings(base_url, Some(TOKEN))).unwrap();

    let records = source.fetch_all().await.unwrap();
    assert_eq!(records.len(), 5);
    assert_eq!(records[0].vehicle_id.as_deref(), Some("101"));
    assert_eq!(records[0].purchase_price, 3500.0);
    assert!(records[2].license_plate.is_none());
    assert_eq!(records[3].purchase_price, 0.0);
    assert!(records[4].is_sold);
}

#[tokio::test]
async fn test_http_source_rejected_token() {
    let base_url = spawn_fake_api().await;
    let source = HttpVehicleSource::new(&settings(base_url, Some("wrong"))).unwrap();

    let err = source.fetch_all().await.unwrap_err();
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn test_sync_from_http_source() {
    let base_url = spawn_fake_api().await;
    let source = HttpVehicleSource::new(&settings(base_url, Some(TOKEN))).unwrap();

    let keys = Arc::new(KeyService::new(KeySlotAllocator::new(
        200,
        Some(PriceTiers::default()),
    )));
    let sync = SyncService::new(keys.clone(), Arc::new(source));

    let report = sync.sync_once().await.unwrap();
    assert_eq!(report.total, 5);
    assert_eq!(report.added, 3);
    // Sold and never stocked
    assert_eq!(report.skipped, 1);

    let high = keys.allocator().lookup_by_license_plate("HX101A").unwrap();
    assert_eq!(high.slot_index, 0);
    assert_eq!(high.metadata_str("brand"), "Volvo");
    assert_eq!(
        keys.allocator().lookup_by_license_plate("HX-102-B").unwrap().slot_index,
        50
    );
    assert_eq!(
        keys.allocator().lookup_by_license_plate("HX-104-C").unwrap().slot_index,
        100
    );
    assert!(keys.find_vehicle("HX-105-D").is_none());

    let again = sync.sync_once().await.unwrap();
    assert_eq!(again.added, 0);
    assert_eq!(keys.system_status().occupied_slots, 3);
}

#[tokio::test]
async fn test_unreachable_source_fails_sync() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let source = HttpVehicleSource::new(&settings(base_url, Some(TOKEN))).unwrap();
    let keys = Arc::new(KeyService::new(KeySlotAllocator::default()));
    let sync = SyncService::new(keys, Arc::new(source));

    assert!(sync.sync_once().await.is_err());
    assert!(sync.last_sync().error.is_some());
}

//! Inventory sync
//!
//! Pulls the inventory from a [`VehicleSource`] and reconciles the rack:
//! new vehicles get a slot, vehicles reported sold move to the handover pool.
//! Runs are single-flight; the background timer and a manual trigger never
//! overlap.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::metrics;
use crate::service::KeyService;
use crate::slots::PoolLabel;
use crate::source::{coerce_optional_price, VehicleRecord, VehicleSource};

/// What a sync run did with one vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Added,
    AddFailed,
    SoldDetected,
    SoldFailed,
}

/// Per-vehicle result of a sync run
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub vehicle_id: String,
    pub license_plate: String,
    pub action: SyncAction,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_label: Option<PoolLabel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary of one sync run
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub added: usize,
    pub sold_detected: usize,
    pub skipped: usize,
    pub results: Vec<SyncOutcome>,
}

/// Last run, as shown by the status endpoint
#[derive(Debug, Clone, Default, Serialize)]
pub struct LastSync {
    pub finished_at: Option<DateTime<Utc>>,
    pub report: Option<SyncReport>,
    pub error: Option<String>,
}

/// Reconciles the rack against a vehicle source
pub struct SyncService {
    keys: Arc<KeyService>,
    source: Arc<dyn VehicleSource>,
    run_lock: Mutex<()>,
    last: RwLock<LastSync>,
}

impl std::fmt::Debug for SyncService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncService")
            .field("source", &self.source.name())
            .finish()
    }
}

impl SyncService {
    pub fn new(keys: Arc<KeyService>, source: Arc<dyn VehicleSource>) -> Self {
        Self {
            keys,
            source,
            run_lock: Mutex::new(()),
            last: RwLock::new(LastSync::default()),
        }
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Result of the most recent run
    pub fn last_sync(&self) -> LastSync {
        self.last.read().clone()
    }

    /// Fetch the inventory and reconcile the rack once
    #[instrument(skip(self), fields(source = %self.source.name()))]
    pub async fn sync_once(&self) -> Result<SyncReport> {
        let _running = self.run_lock.lock().await;
        let started = Instant::now();
        let started_at = Utc::now();

        let records = match self.source.fetch_all().await {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "Inventory sync failed");
                metrics::record_sync("failed", started.elapsed().as_secs_f64());
                *self.last.write() = LastSync {
                    finished_at: Some(Utc::now()),
                    report: None,
                    error: Some(e.to_string()),
                };
                return Err(e);
            }
        };

        let report = self.apply(started_at, &records);
        metrics::record_sync("succeeded", started.elapsed().as_secs_f64());
        info!(
            run_id = %report.run_id,
            total = report.total,
            added = report.added,
            sold_detected = report.sold_detected,
            skipped = report.skipped,
            "Inventory sync finished"
        );

        *self.last.write() = LastSync {
            finished_at: Some(Utc::now()),
            report: Some(report.clone()),
            error: None,
        };
        Ok(report)
    }

    /// Reconcile the rack against already-fetched records
    pub fn apply(&self, started_at: DateTime<Utc>, records: &[VehicleRecord]) -> SyncReport {
        let mut report = SyncReport {
            run_id: Uuid::new_v4(),
            started_at,
            total: records.len(),
            added: 0,
            sold_detected: 0,
            skipped: 0,
            results: Vec::new(),
        };

        for record in records {
            let (Some(vehicle_id), Some(license_plate)) =
                (record.vehicle_id.as_deref(), record.license_plate.as_deref())
            else {
                continue;
            };

            let in_stock = self
                .keys
                .allocator()
                .lookup_by_license_plate(license_plate)
                .is_some();

            if record.is_sold {
                if !in_stock {
                    report.skipped += 1;
                    continue;
                }

                let sold_price = coerce_optional_price(record.raw.get("sell_price"));
                let outcome = match self.keys.sell_vehicle(license_plate, sold_price, None) {
                    Ok(label) => {
                        report.sold_detected += 1;
                        SyncOutcome {
                            vehicle_id: vehicle_id.to_string(),
                            license_plate: license_plate.to_string(),
                            action: SyncAction::SoldDetected,
                            success: true,
                            slot: None,
                            pool_label: Some(label),
                            error: None,
                        }
                    }
                    Err(e) => SyncOutcome {
                        vehicle_id: vehicle_id.to_string(),
                        license_plate: license_plate.to_string(),
                        action: SyncAction::SoldFailed,
                        success: false,
                        slot: None,
                        pool_label: None,
                        error: Some(e.to_string()),
                    },
                };
                report.results.push(outcome);
                continue;
            }

            if in_stock {
                report.skipped += 1;
                continue;
            }

            let outcome = match self.keys.process_new_vehicle(
                vehicle_id,
                license_plate,
                record.purchase_price,
                Some(record.raw.clone()),
            ) {
                Ok(slot) => {
                    report.added += 1;
                    SyncOutcome {
                        vehicle_id: vehicle_id.to_string(),
                        license_plate: license_plate.to_string(),
                        action: SyncAction::Added,
                        success: true,
                        slot: Some(slot),
                        pool_label: None,
                        error: None,
                    }
                }
                Err(e) => {
                    warn!(plate = %license_plate, error = %e, "Failed to assign vehicle");
                    SyncOutcome {
                        vehicle_id: vehicle_id.to_string(),
                        license_plate: license_plate.to_string(),
                        action: SyncAction::AddFailed,
                        success: false,
                        slot: None,
                        pool_label: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            report.results.push(outcome);
        }

        report
    }

    /// Run [`SyncService::sync_once`] now and then every `interval`
    pub fn spawn_auto_sync(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let service = Arc::clone(self);
        info!(interval_secs = interval.as_secs(), "Auto-sync started");

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = service.sync_once().await {
                    warn!(error = %e, "Auto-sync run failed, will retry next interval");
                }
            }
        })
    }
}

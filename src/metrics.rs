//! Prometheus metrics for the key rack
//!
//! Features:
//! - Rack occupancy (occupied slots, pending handovers)
//! - Assignments by placement and rejections by reason
//! - Sync runs by outcome and their duration

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use tracing::{error, info};

lazy_static::lazy_static! {
    /// Global metrics registry
    pub static ref METRICS_REGISTRY: Registry = Registry::new();

    // Rack metrics
    pub static ref SLOTS_OCCUPIED: IntGauge = IntGauge::new(
        "keyrack_slots_occupied",
        "Number of occupied key slots"
    ).unwrap();

    pub static ref HANDOVERS_PENDING: IntGauge = IntGauge::new(
        "keyrack_handovers_pending",
        "Sold vehicles waiting for key handover"
    ).unwrap();

    pub static ref ASSIGNMENTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("keyrack_assignments_total", "Vehicles assigned to a slot"),
        &["placement"]
    ).unwrap();

    pub static ref REJECTIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("keyrack_rejections_total", "Rejected rack operations"),
        &["reason"]
    ).unwrap();

    pub static ref HANDOVERS_COMPLETED: IntCounter = IntCounter::new(
        "keyrack_handovers_completed_total",
        "Keys handed over to buyers"
    ).unwrap();

    // Sync metrics
    pub static ref SYNC_RUNS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("keyrack_sync_runs_total", "Inventory sync runs"),
        &["outcome"]
    ).unwrap();

    pub static ref SYNC_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "keyrack_sync_duration_seconds",
            "Inventory sync duration in seconds"
        ).buckets(vec![0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0])
    ).unwrap();
}

/// Initialize metrics registry
pub fn init_metrics() {
    info!("Initializing Prometheus metrics");

    METRICS_REGISTRY.register(Box::new(SLOTS_OCCUPIED.clone())).ok();
    METRICS_REGISTRY.register(Box::new(HANDOVERS_PENDING.clone())).ok();
    METRICS_REGISTRY.register(Box::new(ASSIGNMENTS_TOTAL.clone())).ok();
    METRICS_REGISTRY.register(Box::new(REJECTIONS_TOTAL.clone())).ok();
    METRICS_REGISTRY.register(Box::new(HANDOVERS_COMPLETED.clone())).ok();

    METRICS_REGISTRY.register(Box::new(SYNC_RUNS_TOTAL.clone())).ok();
    METRICS_REGISTRY.register(Box::new(SYNC_DURATION.clone())).ok();
}

/// Export metrics in Prometheus text format
pub fn export_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return String::new();
    }

    String::from_utf8(buffer).unwrap_or_default()
}

pub fn record_assignment(placement: &str) {
    ASSIGNMENTS_TOTAL.with_label_values(&[placement]).inc();
}

pub fn record_rejection(reason: &str) {
    REJECTIONS_TOTAL.with_label_values(&[reason]).inc();
}

pub fn record_sync(outcome: &str, seconds: f64) {
    SYNC_RUNS_TOTAL.with_label_values(&[outcome]).inc();
    SYNC_DURATION.observe(seconds);
}

/// Update occupancy gauges
pub fn observe_rack(occupied: usize, pending: usize) {
    SLOTS_OCCUPIED.set(occupied as i64);
    HANDOVERS_PENDING.set(pending as i64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_contains_registered_metrics() {
        init_metrics();
        record_assignment("tier");
        record_rejection("duplicate_plate");

        let text = export_metrics();
        assert!(text.contains("keyrack_assignments_total"));
        assert!(text.contains("keyrack_rejections_total"));
    }

    #[test]
    fn test_init_is_idempotent() {
        init_metrics();
        init_metrics();
        assert!(!METRICS_REGISTRY.gather().is_empty());
    }
}

//! Key service
//!
//! Front door for everything that changes the rack: the sync job, HTTP
//! handlers and the CLI all go through here.

use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::slots::{
    Assignment, KeySlotAllocator, PoolLabel, RackStats, SoldRecord, VehicleMetadata,
};

/// Where a vehicle's key is right now
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VehicleLocation {
    InStock(Assignment),
    Sold(SoldRecord),
}

/// State of a single slot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotStatus {
    pub slot_index: usize,
    pub occupied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment: Option<Assignment>,
}

/// Assignments grouped by rack band for printing
#[derive(Debug, Clone, Serialize)]
pub struct SlotBand {
    pub label: String,
    pub assignments: Vec<Assignment>,
}

/// Full picture of the rack
#[derive(Debug, Clone, Serialize)]
pub struct RackOverview {
    pub bands: Vec<SlotBand>,
    pub pending: Vec<SoldRecord>,
    pub stats: RackStats,
}

/// Optional descriptive attributes for manual entry
#[derive(Debug, Clone, Default)]
pub struct VehicleDetails {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub color: Option<String>,
}

impl VehicleDetails {
    /// Metadata map holding only the non-empty attributes
    fn into_metadata(self) -> Option<VehicleMetadata> {
        let mut metadata = VehicleMetadata::new();
        for (key, value) in [("brand", self.brand), ("model", self.model), ("color", self.color)] {
            if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
                metadata.insert(key.to_string(), value.into());
            }
        }
        (!metadata.is_empty()).then_some(metadata)
    }
}

/// Key management operations over one allocator
#[derive(Debug)]
pub struct KeyService {
    allocator: KeySlotAllocator,
}

impl KeyService {
    pub fn new(allocator: KeySlotAllocator) -> Self {
        Self { allocator }
    }

    pub fn allocator(&self) -> &KeySlotAllocator {
        &self.allocator
    }

    /// Assign a vehicle reported by the inventory
    ///
    /// A plate already in the slot table keeps its slot.
    pub fn process_new_vehicle(
        &self,
        vehicle_id: &str,
        license_plate: &str,
        purchase_price: f64,
        metadata: Option<VehicleMetadata>,
    ) -> Result<usize> {
        if let Some(existing) = self.allocator.lookup_by_license_plate(license_plate) {
            return Ok(existing.slot_index);
        }

        self.allocator
            .assign(vehicle_id, license_plate, purchase_price, metadata)
    }

    /// Add a vehicle by hand, optionally into a chosen slot
    pub fn add_vehicle_manually(
        &self,
        license_plate: &str,
        purchase_price: f64,
        vehicle_id: Option<String>,
        preferred_slot: Option<usize>,
        details: VehicleDetails,
    ) -> Result<usize> {
        let metadata = details.into_metadata();

        let result = match preferred_slot {
            Some(index) => self.allocator.assign_with_preferred_slot(
                index,
                vehicle_id,
                license_plate,
                purchase_price,
                metadata,
            ),
            None => {
                let vehicle_id =
                    vehicle_id.unwrap_or_else(|| format!("MANUAL-{}", license_plate));
                self.allocator
                    .assign(vehicle_id, license_plate, purchase_price, metadata)
            }
        };

        match &result {
            Ok(slot) => info!(plate = %license_plate, slot, "Vehicle added manually"),
            Err(e) => warn!(plate = %license_plate, error = %e, "Manual add failed"),
        }
        result
    }

    /// Move a sold vehicle's key to the handover pool
    pub fn sell_vehicle(
        &self,
        license_plate: &str,
        sold_price: Option<f64>,
        buyer_name: Option<&str>,
    ) -> Result<PoolLabel> {
        let buyer_info = buyer_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| {
                let mut info = VehicleMetadata::new();
                info.insert("name".into(), name.into());
                info
            });

        self.allocator
            .mark_sold(license_plate, sold_price, buyer_info)
    }

    pub fn complete_handover(&self, license_plate: &str) -> bool {
        self.allocator.complete_handover(license_plate)
    }

    pub fn list_pending(&self) -> Vec<SoldRecord> {
        self.allocator.list_pending()
    }

    pub fn assignments(&self) -> Vec<Assignment> {
        self.allocator.assignments()
    }

    /// Find a vehicle in the slot table or the handover pool
    pub fn find_vehicle(&self, license_plate: &str) -> Option<VehicleLocation> {
        if let Some(assignment) = self.allocator.lookup_by_license_plate(license_plate) {
            return Some(VehicleLocation::InStock(assignment));
        }
        self.allocator
            .lookup_sold(license_plate)
            .map(VehicleLocation::Sold)
    }

    pub fn slot_status(&self, index: usize) -> Result<SlotStatus> {
        let assignment = self.allocator.slot(index)?;
        Ok(SlotStatus {
            slot_index: index,
            occupied: assignment.is_some(),
            assignment,
        })
    }

    pub fn system_status(&self) -> RackStats {
        self.allocator.stats()
    }

    /// Assignments grouped by tier band plus pending handovers
    ///
    /// Bands split where the medium and low ranges start; without tiers
    /// everything is one band.
    pub fn overview(&self) -> RackOverview {
        let stats = self.allocator.stats();
        let assignments = self.allocator.assignments();
        let last = stats.total_slots.saturating_sub(1);

        let edges = match self.allocator.tiers() {
            Some(tiers) => vec![
                (tiers.medium_range.min, "premium"),
                (tiers.low_range.min, "middle"),
                (usize::MAX, "budget"),
            ],
            None => vec![(usize::MAX, "all")],
        };

        let mut bands = Vec::with_capacity(edges.len());
        let mut start = 0;
        for (end, name) in edges {
            let upper = end.min(stats.total_slots);
            let band: Vec<Assignment> = assignments
                .iter()
                .filter(|a| a.slot_index >= start && a.slot_index < upper)
                .cloned()
                .collect();
            let label = if upper > start {
                format!("{} (slots {}-{})", name, start, (upper - 1).min(last))
            } else {
                format!("{} (no slots)", name)
            };
            bands.push(SlotBand {
                label,
                assignments: band,
            });
            start = upper.max(start);
        }

        RackOverview {
            bands,
            pending: self.allocator.list_pending(),
            stats,
        }
    }
}

//! Key slot allocator
//!
//! Owns the slot table, the handover pool and the plate index behind one
//! mutex. Every public operation takes the lock once and finishes its
//! read-then-write inside it, so two callers can never both see a plate as
//! new or a slot as free.

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::index::{Location, PlateIndex};
use super::pool::{HandoverPool, HANDOVER_POOL_SIZE};
use super::slot::{normalize_plate, Assignment, PoolLabel, SoldRecord, VehicleMetadata};
use super::table::SlotTable;
use super::tier::PriceTiers;
use crate::error::{Error, Result};
use crate::metrics;

/// Default number of slots in the key rack
pub const DEFAULT_TOTAL_SLOTS: usize = 200;

/// How an assignment found its slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Caller-chosen slot
    Preferred,
    /// First free slot of the price tier
    Tier,
    /// Highest free slot after the tier was full
    Overflow,
    /// First free slot from 0, used when no tiers are configured
    FirstFit,
}

impl Placement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Placement::Preferred => "preferred",
            Placement::Tier => "tier",
            Placement::Overflow => "overflow",
            Placement::FirstFit => "first_fit",
        }
    }
}

/// Point-in-time counts for the rack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RackStats {
    pub total_slots: usize,
    pub available_slots: usize,
    pub occupied_slots: usize,
    pub pending_handovers: usize,
    pub free_pool_slots: usize,
}

#[derive(Debug)]
struct RackState {
    table: SlotTable,
    pool: HandoverPool,
    plates: PlateIndex,
}

impl RackState {
    fn stats(&self) -> RackStats {
        let total_slots = self.table.total_slots();
        let available_slots = self.table.available_count();
        let pending_handovers = self.pool.pending_count();
        RackStats {
            total_slots,
            available_slots,
            occupied_slots: total_slots - available_slots,
            pending_handovers,
            free_pool_slots: HANDOVER_POOL_SIZE - pending_handovers,
        }
    }

    fn place(
        &mut self,
        slot_index: usize,
        key: String,
        vehicle_id: String,
        license_plate: &str,
        purchase_price: f64,
        metadata: Option<VehicleMetadata>,
    ) {
        self.table.place(Assignment {
            slot_index,
            vehicle_id,
            license_plate: license_plate.to_string(),
            purchase_price,
            assigned_at: chrono::Utc::now(),
            metadata,
        });
        self.plates.insert(key, Location::InTable(slot_index));
    }

    fn release(&mut self, index: usize) -> Option<Assignment> {
        let assignment = self.table.take(index)?;
        self.plates.remove(&normalize_plate(&assignment.license_plate));
        Some(assignment)
    }

    /// Choose a slot by tier, overflow or first-fit
    fn choose_slot(&self, tiers: Option<&PriceTiers>, price: f64) -> Result<(usize, Placement)> {
        let Some(tiers) = tiers else {
            return self
                .table
                .find_first_available()
                .map(|slot| (slot, Placement::FirstFit))
                .ok_or(Error::TableFull);
        };

        let range = tiers.range_for(price);
        if let Some(slot) = self.table.find_available_in_range(range.min, range.max) {
            return Ok((slot, Placement::Tier));
        }

        debug!(price, range = %range, "Tier range full, overflowing to highest free slot");
        self.table
            .find_highest_available()
            .map(|slot| (slot, Placement::Overflow))
            .ok_or(Error::TableFull)
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        let mut expected = 0;
        for assignment in self.table.iter() {
            let key = normalize_plate(&assignment.license_plate);
            assert_eq!(
                self.plates.get(&key),
                Some(Location::InTable(assignment.slot_index)),
                "table entry {} missing from plate index",
                assignment.license_plate
            );
            expected += 1;
        }
        for record in self.pool.iter() {
            let key = normalize_plate(&record.license_plate);
            assert_eq!(
                self.plates.get(&key),
                Some(Location::InPool(record.pool_label)),
                "pool entry {} missing from plate index",
                record.license_plate
            );
            expected += 1;
        }
        assert_eq!(self.plates.len(), expected, "plate index has stale entries");
        for (key, location) in self.plates.iter() {
            let plate = match location {
                Location::InTable(index) => self.table.get(index).map(|a| &a.license_plate),
                Location::InPool(label) => self.pool.get(label).map(|r| &r.license_plate),
            };
            assert_eq!(
                plate.map(|p| normalize_plate(p)).as_deref(),
                Some(key),
                "plate index entry {} points at {:?}",
                key,
                location
            );
        }
    }
}

/// Allocates key slots to vehicles and tracks sold keys awaiting handover
pub struct KeySlotAllocator {
    /// Price tiers; `None` assigns first-fit from slot 0
    tiers: Option<PriceTiers>,
    state: Mutex<RackState>,
}

impl std::fmt::Debug for KeySlotAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySlotAllocator")
            .field("tiers", &self.tiers)
            .field("stats", &self.stats())
            .finish()
    }
}

impl Default for KeySlotAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_TOTAL_SLOTS, Some(PriceTiers::default()))
    }
}

impl KeySlotAllocator {
    /// Create an allocator with `total_slots` empty slots
    ///
    /// # Arguments
    /// * `total_slots` - Size of the slot table
    /// * `tiers` - Price tiers, or `None` for first-fit placement
    pub fn new(total_slots: usize, tiers: Option<PriceTiers>) -> Self {
        info!(
            total_slots,
            tiered = tiers.is_some(),
            pool_size = HANDOVER_POOL_SIZE,
            "Initializing key slot allocator"
        );

        Self {
            tiers,
            state: Mutex::new(RackState {
                table: SlotTable::new(total_slots),
                pool: HandoverPool::new(),
                plates: PlateIndex::new(),
            }),
        }
    }

    pub fn total_slots(&self) -> usize {
        self.state.lock().table.total_slots()
    }

    pub fn tiers(&self) -> Option<&PriceTiers> {
        self.tiers.as_ref()
    }

    /// Check if a slot exists and is empty
    pub fn is_available(&self, index: usize) -> bool {
        self.state.lock().table.is_available(index)
    }

    /// First free slot in `[min, max]`, lowest index first
    pub fn find_available_in_range(&self, min: usize, max: usize) -> Option<usize> {
        self.state.lock().table.find_available_in_range(min, max)
    }

    /// Highest free slot in the table
    pub fn find_highest_available(&self) -> Option<usize> {
        self.state.lock().table.find_highest_available()
    }

    /// Check the plate against both the slot table and the handover pool
    pub fn is_duplicate(&self, license_plate: &str) -> bool {
        self.state.lock().plates.contains(&normalize_plate(license_plate))
    }

    /// Place a vehicle by price tier, overflowing to the highest free slot
    ///
    /// Returns the slot index now holding the vehicle. A rejected call leaves
    /// the rack unchanged.
    pub fn assign(
        &self,
        vehicle_id: impl Into<String>,
        license_plate: &str,
        purchase_price: f64,
        metadata: Option<VehicleMetadata>,
    ) -> Result<usize> {
        let vehicle_id = vehicle_id.into();
        let key = normalize_plate(license_plate);
        let mut state = self.state.lock();

        let result = self.assign_locked(
            &mut state,
            key,
            vehicle_id,
            license_plate,
            purchase_price,
            metadata,
        );
        self.observe(&state);
        result
    }

    /// Place a vehicle in a chosen slot, falling back to [`assign`] rules
    ///
    /// An occupied or out-of-range `index` is logged and the vehicle is
    /// placed automatically instead. A missing `vehicle_id` becomes
    /// `MANUAL-<plate>`.
    ///
    /// [`assign`]: KeySlotAllocator::assign
    pub fn assign_with_preferred_slot(
        &self,
        index: usize,
        vehicle_id: Option<String>,
        license_plate: &str,
        purchase_price: f64,
        metadata: Option<VehicleMetadata>,
    ) -> Result<usize> {
        let vehicle_id = vehicle_id.unwrap_or_else(|| format!("MANUAL-{}", license_plate));
        let key = normalize_plate(license_plate);
        let mut state = self.state.lock();

        let result = if !state.plates.contains(&key) && state.table.is_available(index) {
            state.place(
                index,
                key,
                vehicle_id,
                license_plate,
                purchase_price,
                metadata,
            );
            metrics::record_assignment(Placement::Preferred.as_str());
            info!(
                plate = %license_plate,
                slot = index,
                placement = Placement::Preferred.as_str(),
                "Vehicle assigned"
            );
            Ok(index)
        } else {
            if !state.plates.contains(&key) {
                warn!(
                    plate = %license_plate,
                    slot = index,
                    "Preferred slot unavailable, assigning automatically"
                );
            }
            self.assign_locked(
                &mut state,
                key,
                vehicle_id,
                license_plate,
                purchase_price,
                metadata,
            )
        };

        self.observe(&state);
        result
    }

    fn assign_locked(
        &self,
        state: &mut RackState,
        key: String,
        vehicle_id: String,
        license_plate: &str,
        purchase_price: f64,
        metadata: Option<VehicleMetadata>,
    ) -> Result<usize> {
        if state.plates.contains(&key) {
            warn!(plate = %license_plate, "Rejected duplicate license plate");
            let err = Error::DuplicatePlate(license_plate.to_string());
            metrics::record_rejection(err.reason());
            return Err(err);
        }

        let (slot, placement) = match state.choose_slot(self.tiers.as_ref(), purchase_price) {
            Ok(choice) => choice,
            Err(err) => {
                warn!(plate = %license_plate, price = purchase_price, "No free key slot");
                metrics::record_rejection(err.reason());
                return Err(err);
            }
        };

        state.place(
            slot,
            key,
            vehicle_id,
            license_plate,
            purchase_price,
            metadata,
        );
        metrics::record_assignment(placement.as_str());
        info!(
            plate = %license_plate,
            slot,
            price = purchase_price,
            placement = placement.as_str(),
            "Vehicle assigned"
        );
        Ok(slot)
    }

    /// Clear an occupied slot
    ///
    /// Returns false if the index is out of range or already empty.
    pub fn release(&self, index: usize) -> bool {
        let mut state = self.state.lock();
        let released = state.release(index);
        if let Some(assignment) = &released {
            info!(plate = %assignment.license_plate, slot = index, "Slot released");
        }
        self.observe(&state);
        released.is_some()
    }

    /// Clear the slot holding a plate
    pub fn release_by_license_plate(&self, license_plate: &str) -> bool {
        let mut state = self.state.lock();
        let Some(Location::InTable(index)) = state.plates.get(&normalize_plate(license_plate))
        else {
            debug!(plate = %license_plate, "No slot to release");
            return false;
        };

        let released = state.release(index).is_some();
        if released {
            info!(plate = %license_plate, slot = index, "Slot released");
        }
        self.observe(&state);
        released
    }

    /// Assignment for a plate in the slot table (the pool is not searched)
    pub fn lookup_by_license_plate(&self, license_plate: &str) -> Option<Assignment> {
        let state = self.state.lock();
        match state.plates.get(&normalize_plate(license_plate))? {
            Location::InTable(index) => state.table.get(index).cloned(),
            Location::InPool(_) => None,
        }
    }

    /// Assignment held at a slot
    pub fn slot(&self, index: usize) -> Result<Option<Assignment>> {
        let state = self.state.lock();
        let total = state.table.total_slots();
        if index >= total {
            return Err(Error::InvalidIndex { index, total });
        }
        Ok(state.table.get(index).cloned())
    }

    pub fn available_count(&self) -> usize {
        self.state.lock().table.available_count()
    }

    pub fn occupied_count(&self) -> usize {
        let state = self.state.lock();
        state.table.total_slots() - state.table.available_count()
    }

    /// Snapshot of all current assignments in slot order
    pub fn assignments(&self) -> Vec<Assignment> {
        self.state.lock().table.iter().cloned().collect()
    }

    /// Move a sold vehicle's key from its slot into the handover pool
    ///
    /// The pool entry appears and the slot empties under the same lock.
    /// Fails with `NotFound` when the plate is not in the slot table and
    /// with `PoolFull` when all pool positions are taken.
    pub fn mark_sold(
        &self,
        license_plate: &str,
        sold_price: Option<f64>,
        buyer_info: Option<VehicleMetadata>,
    ) -> Result<PoolLabel> {
        let key = normalize_plate(license_plate);
        let mut state = self.state.lock();

        let result = Self::mark_sold_locked(&mut state, key, license_plate, sold_price, buyer_info);
        if let Err(err) = &result {
            warn!(plate = %license_plate, error = %err, "Could not mark vehicle as sold");
            metrics::record_rejection(err.reason());
        }
        self.observe(&state);
        result
    }

    fn mark_sold_locked(
        state: &mut RackState,
        key: String,
        license_plate: &str,
        sold_price: Option<f64>,
        buyer_info: Option<VehicleMetadata>,
    ) -> Result<PoolLabel> {
        let Some(Location::InTable(slot)) = state.plates.get(&key) else {
            return Err(Error::NotFound(license_plate.to_string()));
        };
        let label = state.pool.first_free().ok_or(Error::PoolFull)?;
        let assignment = state.table.take(slot).ok_or_else(|| {
            Error::Internal(format!("plate index points at empty slot {}", slot))
        })?;

        let record = SoldRecord::from_assignment(assignment, label, sold_price, buyer_info);
        state.pool.insert(record);
        state.plates.insert(key, Location::InPool(label));

        info!(
            plate = %license_plate,
            from_slot = slot,
            pool_label = %label,
            "Vehicle marked as sold"
        );
        Ok(label)
    }

    /// Remove a sold vehicle after its key was handed over
    pub fn complete_handover(&self, license_plate: &str) -> bool {
        let key = normalize_plate(license_plate);
        let mut state = self.state.lock();

        let Some(Location::InPool(label)) = state.plates.get(&key) else {
            debug!(plate = %license_plate, "No pending handover");
            return false;
        };

        let completed = state.pool.take(label).is_some();
        if completed {
            state.plates.remove(&key);
            metrics::HANDOVERS_COMPLETED.inc();
            info!(plate = %license_plate, pool_label = %label, "Handover completed");
        }
        self.observe(&state);
        completed
    }

    /// Pending handovers in pool order (`v1` first)
    pub fn list_pending(&self) -> Vec<SoldRecord> {
        self.state.lock().pool.iter().cloned().collect()
    }

    /// Pending handover record for a plate
    pub fn lookup_sold(&self, license_plate: &str) -> Option<SoldRecord> {
        let state = self.state.lock();
        match state.plates.get(&normalize_plate(license_plate))? {
            Location::InPool(label) => state.pool.get(label).cloned(),
            Location::InTable(_) => None,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().pool.pending_count()
    }

    pub fn free_pool_count(&self) -> usize {
        self.state.lock().pool.free_count()
    }

    /// Consistent counts taken under one lock
    pub fn stats(&self) -> RackStats {
        self.state.lock().stats()
    }

    fn observe(&self, state: &RackState) {
        let stats = state.stats();
        metrics::observe_rack(stats.occupied_slots, stats.pending_handovers);
    }

    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        self.state.lock().assert_consistent();
    }
}

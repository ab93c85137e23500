//! Handover pool for sold vehicles

use super::slot::{PoolLabel, SoldRecord};

/// Number of keys that can wait for handover at once
pub const HANDOVER_POOL_SIZE: usize = 10;

/// Small fixed pool of sold vehicles whose keys are not yet with the buyer
#[derive(Debug)]
pub struct HandoverPool {
    entries: [Option<SoldRecord>; HANDOVER_POOL_SIZE],
}

impl Default for HandoverPool {
    fn default() -> Self {
        Self::new()
    }
}

impl HandoverPool {
    pub fn new() -> Self {
        Self {
            entries: std::array::from_fn(|_| None),
        }
    }

    /// Lowest free position, if the pool has room
    pub fn first_free(&self) -> Option<PoolLabel> {
        self.entries
            .iter()
            .position(Option::is_none)
            .map(PoolLabel::from_index)
    }

    /// Store a record at its label
    ///
    /// The caller has taken the label from [`HandoverPool::first_free`].
    pub fn insert(&mut self, record: SoldRecord) {
        let index = record.pool_label.index();
        debug_assert!(self.entries[index].is_none(), "pool entry {} is taken", index);
        self.entries[index] = Some(record);
    }

    pub fn get(&self, label: PoolLabel) -> Option<&SoldRecord> {
        self.entries.get(label.index()).and_then(Option::as_ref)
    }

    /// Remove and return the record at `label`
    pub fn take(&mut self, label: PoolLabel) -> Option<SoldRecord> {
        self.entries.get_mut(label.index()).and_then(Option::take)
    }

    /// Pending records in label order (`v1` first)
    pub fn iter(&self) -> impl Iterator<Item = &SoldRecord> {
        self.entries.iter().flatten()
    }

    pub fn pending_count(&self) -> usize {
        self.iter().count()
    }

    pub fn free_count(&self) -> usize {
        HANDOVER_POOL_SIZE - self.pending_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(label: PoolLabel, plate: &str) -> SoldRecord {
        SoldRecord {
            pool_label: label,
            vehicle_id: format!("ID-{}", plate),
            license_plate: plate.to_string(),
            purchase_price: 1200.0,
            original_slot_index: 7,
            sold_at: Utc::now(),
            sold_price: None,
            buyer_info: None,
            metadata: None,
        }
    }

    #[test]
    fn test_fill_and_drain() {
        let mut pool = HandoverPool::new();
        assert_eq!(pool.free_count(), HANDOVER_POOL_SIZE);

        for i in 0..HANDOVER_POOL_SIZE {
            let label = pool.first_free().expect("pool should have room");
            assert_eq!(label.index(), i);
            pool.insert(record(label, &format!("P{}", i)));
        }

        assert!(pool.first_free().is_none());
        assert_eq!(pool.pending_count(), HANDOVER_POOL_SIZE);
        assert_eq!(pool.free_count(), 0);
    }

    #[test]
    fn test_freed_label_is_reused_first() {
        let mut pool = HandoverPool::new();
        for i in 0..3 {
            let label = pool.first_free().unwrap();
            pool.insert(record(label, &format!("P{}", i)));
        }

        let taken = pool.take(PoolLabel::from_index(1)).unwrap();
        assert_eq!(taken.license_plate, "P1");
        assert_eq!(pool.first_free(), Some(PoolLabel::from_index(1)));
        assert!(pool.take(PoolLabel::from_index(1)).is_none());
    }

    #[test]
    fn test_iter_in_label_order() {
        let mut pool = HandoverPool::new();
        pool.insert(record(PoolLabel::from_index(4), "E"));
        pool.insert(record(PoolLabel::from_index(0), "A"));
        pool.insert(record(PoolLabel::from_index(2), "C"));

        let labels: Vec<String> = pool.iter().map(|r| r.pool_label.to_string()).collect();
        assert_eq!(labels, vec!["v1", "v3", "v5"]);
        assert_eq!(
            pool.get(PoolLabel::from_index(2)).map(|r| r.license_plate.as_str()),
            Some("C")
        );
    }
}

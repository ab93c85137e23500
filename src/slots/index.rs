//! Normalized plate index
//!
//! Maps every plate known to the rack to where its key currently hangs,
//! covering both the slot table and the handover pool. The index is updated
//! in the same step as the table or pool it describes, so a duplicate check
//! is a single lookup instead of two scans.
//!
//! ```text
//! "AB123C" → InTable(0)
//! "CD456E" → InTable(1)
//! "GH012I" → InPool(v1)
//! ```

use std::collections::HashMap;

use super::slot::PoolLabel;

/// Where a plate's key is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    InTable(usize),
    InPool(PoolLabel),
}

/// Normalized plate → location
#[derive(Debug, Default)]
pub struct PlateIndex {
    entries: HashMap<String, Location>,
}

impl PlateIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Location of a normalized plate
    pub fn get(&self, plate: &str) -> Option<Location> {
        self.entries.get(plate).copied()
    }

    pub fn contains(&self, plate: &str) -> bool {
        self.entries.contains_key(plate)
    }

    /// Record or move a plate
    pub fn insert(&mut self, plate: String, location: Location) {
        self.entries.insert(plate, location);
    }

    pub fn remove(&mut self, plate: &str) -> Option<Location> {
        self.entries.remove(plate)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Location)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_move_remove() {
        let mut index = PlateIndex::new();
        assert!(index.is_empty());

        index.insert("AB123C".into(), Location::InTable(4));
        assert_eq!(index.get("AB123C"), Some(Location::InTable(4)));
        assert!(index.contains("AB123C"));

        // Moving to the pool replaces the table location
        index.insert("AB123C".into(), Location::InPool(PoolLabel::from_index(0)));
        assert_eq!(
            index.get("AB123C"),
            Some(Location::InPool(PoolLabel::from_index(0)))
        );
        assert_eq!(index.len(), 1);

        assert!(index.remove("AB123C").is_some());
        assert!(index.get("AB123C").is_none());
        assert!(index.remove("AB123C").is_none());
    }

    #[test]
    fn test_iter_lists_every_plate() {
        let mut index = PlateIndex::new();
        index.insert("AB1".into(), Location::InTable(0));
        index.insert("CD2".into(), Location::InPool(PoolLabel::from_index(3)));

        let mut entries: Vec<(&str, Location)> = index.iter().collect();
        entries.sort_by_key(|(plate, _)| *plate);
        assert_eq!(
            entries,
            vec![
                ("AB1", Location::InTable(0)),
                ("CD2", Location::InPool(PoolLabel::from_index(3))),
            ]
        );
    }
}

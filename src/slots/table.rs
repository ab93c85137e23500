//! Fixed-size slot table

use super::slot::Assignment;

/// The main key rack: one optional assignment per slot index
#[derive(Debug)]
pub struct SlotTable {
    slots: Vec<Option<Assignment>>,
}

impl SlotTable {
    /// Create an empty table with `total_slots` slots
    pub fn new(total_slots: usize) -> Self {
        Self {
            slots: vec![None; total_slots],
        }
    }

    /// Number of slots in the table
    pub fn total_slots(&self) -> usize {
        self.slots.len()
    }

    /// Check if a slot exists and is empty
    pub fn is_available(&self, index: usize) -> bool {
        matches!(self.slots.get(index), Some(None))
    }

    /// Assignment held at `index`, if any
    pub fn get(&self, index: usize) -> Option<&Assignment> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// First free index in `[min, max]`, scanning upwards
    ///
    /// `max` is clamped to the last slot; lower indices fill first.
    pub fn find_available_in_range(&self, min: usize, max: usize) -> Option<usize> {
        let last = self.slots.len().checked_sub(1)?;
        let max = max.min(last);
        if min > max {
            return None;
        }
        (min..=max).find(|&index| self.slots[index].is_none())
    }

    /// Highest free index in the table
    pub fn find_highest_available(&self) -> Option<usize> {
        self.slots.iter().rposition(Option::is_none)
    }

    /// Lowest free index in the table
    pub fn find_first_available(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }

    /// Store an assignment in its slot
    ///
    /// The caller has checked the slot is free; `assignment.slot_index`
    /// names the slot.
    pub fn place(&mut self, assignment: Assignment) {
        let index = assignment.slot_index;
        debug_assert!(self.is_available(index), "slot {} is not free", index);
        self.slots[index] = Some(assignment);
    }

    /// Clear a slot, returning what it held
    pub fn take(&mut self, index: usize) -> Option<Assignment> {
        self.slots.get_mut(index).and_then(Option::take)
    }

    /// Number of empty slots
    pub fn available_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_none()).count()
    }

    /// Occupied slots in ascending index order
    pub fn iter(&self) -> impl Iterator<Item = &Assignment> {
        self.slots.iter().flatten()
    }
}

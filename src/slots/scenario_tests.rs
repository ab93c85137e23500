//! End-to-end scenarios for the key slot engine
//!
//! These run against a full-size rack with the default tiers.

#[cfg(test)]
mod scenarios {
    use crate::error::{Error, Result};
    use crate::slots::{KeySlotAllocator, PriceTiers, HANDOVER_POOL_SIZE};

    fn default_rack() -> KeySlotAllocator {
        KeySlotAllocator::new(200, Some(PriceTiers::default()))
    }

    #[test]
    fn test_rack_walkthrough() -> Result<()> {
        let rack = default_rack();

        assert_eq!(rack.assign("V1", "AB-123-C", 3500.0, None)?, 0);
        assert_eq!(rack.assign("V2", "CD-456-E", 3500.0, None)?, 1);

        // Fill the rest of the high tier, indices 2..=50
        for i in 2..=50 {
            let slot = rack.assign(format!("V{}", i + 1), &format!("HI-{:03}", i), 4000.0, None)?;
            assert_eq!(slot, i);
        }

        // High tier is full, so the next one overflows to the top
        assert_eq!(rack.assign("V52", "EF-789-G", 3600.0, None)?, 199);

        let label = rack.mark_sold("AB-123-C", None, None)?;
        assert_eq!(label.to_string(), "v1");
        assert!(rack.is_available(0));

        assert_eq!(rack.assign("V53", "GH-012-I", 3700.0, None)?, 0);
        rack.assert_consistent();
        Ok(())
    }

    #[test]
    fn test_tier_placement_on_empty_rack() -> Result<()> {
        let rack = default_rack();

        let high = rack.assign("H", "HIGH", 3000.0, None)?;
        let medium = rack.assign("M", "MEDIUM", 1500.0, None)?;
        let low = rack.assign("L", "LOW", 1499.0, None)?;

        assert!(high <= 50, "high landed at {}", high);
        assert!((50..=100).contains(&medium), "medium landed at {}", medium);
        assert!((100..=199).contains(&low), "low landed at {}", low);
        assert_eq!((high, medium, low), (0, 50, 100));
        Ok(())
    }

    #[test]
    fn test_shared_boundary_slot() -> Result<()> {
        let rack = default_rack();

        // Medium tier claims 50 first, so the high tier later overflows
        // past it only once 0..=49 are full.
        assert_eq!(rack.assign("M", "MEDIUM", 2000.0, None)?, 50);
        for i in 0..50 {
            assert_eq!(rack.assign(format!("H{}", i), &format!("H{}", i), 5000.0, None)?, i);
        }
        assert_eq!(rack.assign("H50", "H50", 5000.0, None)?, 199);
        Ok(())
    }

    #[test]
    fn test_low_tier_overflow_goes_to_highest_free() -> Result<()> {
        let rack = default_rack();

        for i in 100..200 {
            assert_eq!(rack.assign(format!("L{}", i), &format!("L{}", i), 10.0, None)?, i);
        }
        // [100,199] is full; 99 is the highest free slot
        assert_eq!(rack.assign("L-extra", "L-EXTRA", 10.0, None)?, 99);
        Ok(())
    }

    #[test]
    fn test_table_full_iff_no_free_slot() -> Result<()> {
        let rack = KeySlotAllocator::new(20, Some(PriceTiers::default()));

        for i in 0..20 {
            let price = [5000.0, 2000.0, 100.0][i % 3];
            let slot = rack.assign(format!("V{}", i), &format!("P{}", i), price, None)?;
            assert!(slot < 20);
            assert_eq!(
                rack.slot(slot)?.map(|a| a.license_plate),
                Some(format!("P{}", i))
            );
        }

        assert!(matches!(
            rack.assign("V20", "P20", 100.0, None),
            Err(Error::TableFull)
        ));

        assert!(rack.release(13));
        assert_eq!(rack.assign("V21", "P21", 5000.0, None)?, 13);
        rack.assert_consistent();
        Ok(())
    }

    #[test]
    fn test_handover_pool_capacity() -> Result<()> {
        let rack = default_rack();

        for i in 0..=HANDOVER_POOL_SIZE {
            rack.assign(format!("V{}", i), &format!("SOLD-{}", i), 2000.0, None)?;
        }

        for i in 0..HANDOVER_POOL_SIZE {
            let label = rack.mark_sold(&format!("SOLD-{}", i), None, None)?;
            assert_eq!(label.index(), i);
        }

        let occupied_before = rack.occupied_count();
        let err = rack
            .mark_sold(&format!("SOLD-{}", HANDOVER_POOL_SIZE), None, None)
            .unwrap_err();
        assert!(matches!(err, Error::PoolFull));
        // The rejected sale left the vehicle in its slot
        assert_eq!(rack.occupied_count(), occupied_before);
        assert!(rack
            .lookup_by_license_plate(&format!("SOLD-{}", HANDOVER_POOL_SIZE))
            .is_some());

        // Completing a handover frees its label for the next sale
        assert!(rack.complete_handover("SOLD-3"));
        let label = rack.mark_sold(&format!("SOLD-{}", HANDOVER_POOL_SIZE), None, None)?;
        assert_eq!(label.to_string(), "v4");
        rack.assert_consistent();
        Ok(())
    }

    #[test]
    fn test_original_slot_survives_reuse() -> Result<()> {
        let rack = default_rack();
        let slot = rack.assign("V1", "AB-1", 5000.0, None)?;
        rack.mark_sold("AB-1", None, None)?;

        let reused = rack.assign("V2", "AB-2", 5000.0, None)?;
        assert_eq!(reused, slot);

        let pending = rack.list_pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].license_plate, "AB-1");
        assert_eq!(pending[0].original_slot_index, slot);
        Ok(())
    }

    #[test]
    fn test_sold_plate_cannot_be_reassigned_until_handover() -> Result<()> {
        let rack = default_rack();
        rack.assign("V1", "AB-1", 5000.0, None)?;
        rack.mark_sold("AB-1", None, None)?;

        assert!(matches!(
            rack.assign("V1-again", "AB 1", 5000.0, None),
            Err(Error::DuplicatePlate(_))
        ));

        assert!(rack.complete_handover("AB-1"));
        assert_eq!(rack.assign("V1-again", "AB 1", 5000.0, None)?, 0);
        rack.assert_consistent();
        Ok(())
    }
}

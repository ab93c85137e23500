//! Key Slot Engine
//!
//! Hangs vehicle keys in a fixed rack of numbered slots. The purchase price
//! picks a preferred range; when that range is full the key goes to the
//! highest free slot so overflow collects at the top of the rack.
//!
//! # Architecture
//!
//! ```text
//! KeySlotAllocator (one mutex)
//!   ├─→ PriceTiers       ≥3000 → [0,50]   ≥1500 → [50,100]   else → [100,199]
//!   ├─→ SlotTable        [0: AB123C] [1: CD456E] [2: -] ... [199: EF789G]
//!   ├─→ HandoverPool     [v1: GH012I] [v2: -] ... [v10: -]
//!   └─→ PlateIndex       AB123C → InTable(0), GH012I → InPool(v1)
//! ```
//!
//! Lifecycle of a key: `InStock` (slot table) → `Sold` (handover pool) →
//! handed over (removed). A plate appears at most once across table and pool.

pub mod allocator;
pub mod index;
pub mod pool;
pub mod scenario_tests;
pub mod slot;
pub mod table;
pub mod tier;

pub use allocator::{KeySlotAllocator, Placement, RackStats, DEFAULT_TOTAL_SLOTS};
pub use index::{Location, PlateIndex};
pub use pool::{HandoverPool, HANDOVER_POOL_SIZE};
pub use slot::{normalize_plate, Assignment, PoolLabel, SoldRecord, VehicleMetadata};
pub use table::SlotTable;
pub use tier::{PriceTiers, SlotRange};

//! Price tiers: which part of the slot table a vehicle prefers

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Inclusive range of slot indices
///
/// Serialized as a two-element array, `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(usize, usize)", into = "(usize, usize)")]
pub struct SlotRange {
    pub min: usize,
    pub max: usize,
}

impl SlotRange {
    pub const fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    /// Check if an index falls inside this range
    pub fn contains(&self, index: usize) -> bool {
        self.min <= index && index <= self.max
    }
}

impl From<(usize, usize)> for SlotRange {
    fn from((min, max): (usize, usize)) -> Self {
        Self { min, max }
    }
}

impl From<SlotRange> for (usize, usize) {
    fn from(range: SlotRange) -> Self {
        (range.min, range.max)
    }
}

impl fmt::Display for SlotRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// Three price tiers mapped onto slot ranges
///
/// Thresholds are lower bounds: a price equal to a threshold belongs to the
/// higher tier. The default ranges share indices 50 and 100; first-fit search
/// starts from each range's low end, so whichever tier reaches a shared index
/// first claims it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceTiers {
    /// Minimum price for the high tier
    pub high_threshold: f64,
    /// Minimum price for the medium tier
    pub medium_threshold: f64,
    pub high_range: SlotRange,
    pub medium_range: SlotRange,
    pub low_range: SlotRange,
}

impl Default for PriceTiers {
    fn default() -> Self {
        Self {
            high_threshold: 3000.0,
            medium_threshold: 1500.0,
            high_range: SlotRange::new(0, 50),
            medium_range: SlotRange::new(50, 100),
            low_range: SlotRange::new(100, 199),
        }
    }
}

impl PriceTiers {
    /// Preferred slot range for a purchase price
    ///
    /// Never fails; prices that compare false against both thresholds
    /// (including NaN) land in the low tier.
    pub fn range_for(&self, price: f64) -> SlotRange {
        if price >= self.high_threshold {
            return self.high_range;
        }

        if price >= self.medium_threshold {
            return self.medium_range;
        }

        self.low_range
    }

    /// Reject inverted ranges and thresholds
    pub fn validate(&self) -> Result<()> {
        for (name, range) in [
            ("high_range", self.high_range),
            ("medium_range", self.medium_range),
            ("low_range", self.low_range),
        ] {
            if range.min > range.max {
                return Err(Error::Config(format!(
                    "{} {} has min greater than max",
                    name, range
                )));
            }
        }

        if !(self.high_threshold >= self.medium_threshold) {
            return Err(Error::Config(format!(
                "high_threshold {} is below medium_threshold {}",
                self.high_threshold, self.medium_threshold
            )));
        }

        Ok(())
    }
}

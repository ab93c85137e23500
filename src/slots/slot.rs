//! Records held by the slot table and the handover pool

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Opaque vehicle attributes carried alongside an assignment
pub type VehicleMetadata = serde_json::Map<String, serde_json::Value>;

/// Normalize a license plate for comparison
///
/// Uppercases and strips spaces and hyphens, so `"ab-123 c"` and `"AB123C"`
/// name the same vehicle.
pub fn normalize_plate(plate: &str) -> String {
    plate
        .chars()
        .filter(|c| *c != ' ' && *c != '-')
        .flat_map(char::to_uppercase)
        .collect()
}

/// Position in the handover pool, shown to people as `v1..vN`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PoolLabel(usize);

impl PoolLabel {
    /// Label for a zero-based pool index
    pub fn from_index(index: usize) -> Self {
        Self(index)
    }

    /// Zero-based pool index
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for PoolLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&format!("v{}", self.0 + 1))
    }
}

impl FromStr for PoolLabel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let number = s
            .strip_prefix('v')
            .or_else(|| s.strip_prefix('V'))
            .and_then(|n| n.parse::<usize>().ok())
            .filter(|n| *n >= 1)
            .ok_or_else(|| Error::InvalidArgument(format!("Invalid pool label: {}", s)))?;
        Ok(Self(number - 1))
    }
}

impl From<PoolLabel> for String {
    fn from(label: PoolLabel) -> Self {
        label.to_string()
    }
}

impl TryFrom<String> for PoolLabel {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// A vehicle's key placed in a slot of the main table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    /// Index of the slot holding this key; always equals its table position
    pub slot_index: usize,
    pub vehicle_id: String,
    pub license_plate: String,
    pub purchase_price: f64,
    pub assigned_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<VehicleMetadata>,
}

impl Assignment {
    /// String attribute from the metadata, empty when absent
    pub fn metadata_str(&self, key: &str) -> &str {
        metadata_str(self.metadata.as_ref(), key)
    }
}

/// A sold vehicle whose key is waiting to be handed to the buyer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoldRecord {
    pub pool_label: PoolLabel,
    pub vehicle_id: String,
    pub license_plate: String,
    pub purchase_price: f64,
    /// Slot the key occupied before the sale; kept after that slot is reused
    pub original_slot_index: usize,
    pub sold_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sold_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer_info: Option<VehicleMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<VehicleMetadata>,
}

impl SoldRecord {
    /// Build the pool record for an assignment leaving the main table
    pub fn from_assignment(
        assignment: Assignment,
        pool_label: PoolLabel,
        sold_price: Option<f64>,
        buyer_info: Option<VehicleMetadata>,
    ) -> Self {
        Self {
            pool_label,
            vehicle_id: assignment.vehicle_id,
            license_plate: assignment.license_plate,
            purchase_price: assignment.purchase_price,
            original_slot_index: assignment.slot_index,
            sold_at: Utc::now(),
            sold_price,
            buyer_info,
            metadata: assignment.metadata,
        }
    }

    /// String attribute from the metadata, empty when absent
    pub fn metadata_str(&self, key: &str) -> &str {
        metadata_str(self.metadata.as_ref(), key)
    }
}

fn metadata_str<'a>(metadata: Option<&'a VehicleMetadata>, key: &str) -> &'a str {
    metadata
        .and_then(|m| m.get(key))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_plate() {
        assert_eq!(normalize_plate("ab-123-c"), "AB123C");
        assert_eq!(normalize_plate(" AB 123 C "), "AB123C");
        assert_eq!(normalize_plate("AB123C"), "AB123C");
        // Only spaces and hyphens are stripped
        assert_eq!(normalize_plate("ab.12"), "AB.12");
        assert_eq!(normalize_plate("--"), "");
    }

    #[test]
    fn test_pool_label_display_and_parse() {
        let label = PoolLabel::from_index(0);
        assert_eq!(label.to_string(), "v1");
        assert_eq!(PoolLabel::from_index(9).to_string(), "v10");

        assert_eq!("v3".parse::<PoolLabel>().unwrap().index(), 2);
        assert_eq!("V10".parse::<PoolLabel>().unwrap().index(), 9);
        assert!("v0".parse::<PoolLabel>().is_err());
        assert!("x1".parse::<PoolLabel>().is_err());
    }

    #[test]
    fn test_pool_label_respects_width() {
        assert_eq!(format!("[{:>3}]", PoolLabel::from_index(0)), "[ v1]");
        assert_eq!(format!("[{:<4}]", PoolLabel::from_index(9)), "[v10 ]");
    }

    #[test]
    fn test_pool_label_serializes_as_string() {
        let json = serde_json::to_string(&PoolLabel::from_index(4)).unwrap();
        assert_eq!(json, "\"v5\"");
        let back: PoolLabel = serde_json::from_str(&json).unwrap();
        assert_eq!(back.index(), 4);
    }

    #[test]
    fn test_sold_record_keeps_original_slot() {
        let mut metadata = VehicleMetadata::new();
        metadata.insert("brand".into(), "Volvo".into());

        let assignment = Assignment {
            slot_index: 42,
            vehicle_id: "V1".into(),
            license_plate: "AB-123-C".into(),
            purchase_price: 2500.0,
            assigned_at: Utc::now(),
            metadata: Some(metadata),
        };

        let record =
            SoldRecord::from_assignment(assignment, PoolLabel::from_index(1), Some(3100.0), None);
        assert_eq!(record.original_slot_index, 42);
        assert_eq!(record.pool_label.to_string(), "v2");
        assert_eq!(record.sold_price, Some(3100.0));
        assert_eq!(record.metadata_str("brand"), "Volvo");
        assert_eq!(record.metadata_str("model"), "");
    }
}

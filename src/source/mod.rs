//! Vehicle data sources
//!
//! A source hands out the dealer inventory one page at a time. Records are
//! read loosely: prices may arrive as numbers or strings, the sold flag as
//! `1`, `"1"` or `true`, and every other field is kept as opaque metadata.

pub mod http;
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;
use crate::slots::{normalize_plate, VehicleMetadata};

pub use http::HttpVehicleSource;
pub use mock::MockVehicleSource;

/// Page walk stops here even if the source reports more pages
pub const DEFAULT_MAX_PAGES: u32 = 100;

/// One vehicle as reported by the inventory source
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "VehicleMetadata")]
pub struct VehicleRecord {
    pub vehicle_id: Option<String>,
    pub license_plate: Option<String>,
    /// Coerced purchase price; missing or unreadable values become 0
    pub purchase_price: f64,
    pub is_sold: bool,
    /// The record as received
    pub raw: VehicleMetadata,
}

impl VehicleRecord {
    /// Record with the three required fields
    pub fn new(vehicle_id: &str, license_plate: &str, purchase_price: f64) -> Self {
        let mut raw = VehicleMetadata::new();
        raw.insert("vehicle_id".into(), vehicle_id.into());
        raw.insert("license_plate".into(), license_plate.into());
        raw.insert("purchase_price".into(), purchase_price.into());
        raw.insert("is_sold".into(), 0.into());
        Self::from(raw)
    }

    /// Mark the record as sold
    pub fn sold(mut self) -> Self {
        self.raw.insert("is_sold".into(), 1.into());
        self.is_sold = true;
        self
    }

    /// Add an extra attribute such as `brand`
    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.raw.insert(key.to_string(), value.into());
        self
    }
}

impl From<VehicleMetadata> for VehicleRecord {
    fn from(raw: VehicleMetadata) -> Self {
        Self {
            vehicle_id: coerce_id(raw.get("vehicle_id")),
            license_plate: coerce_id(raw.get("license_plate"))
                .filter(|plate| !normalize_plate(plate).is_empty()),
            purchase_price: coerce_price(raw.get("purchase_price")),
            is_sold: coerce_sold(raw.get("is_sold")),
            raw,
        }
    }
}

/// Read a price from a number or numeric string, defaulting to 0
pub fn coerce_price(value: Option<&Value>) -> f64 {
    let price = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(Value::Bool(b)) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    price.filter(|p| p.is_finite()).unwrap_or(0.0)
}

/// Read an optional price; `null`, `0`, `""` and unreadable values are absent
pub fn coerce_optional_price(value: Option<&Value>) -> Option<f64> {
    match value {
        None | Some(Value::Null) => None,
        Some(v) if !truthy_value(v) => None,
        Some(v @ Value::Number(_)) => v.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().filter(|p| p.is_finite()),
        _ => None,
    }
}

/// Sold flag: integer 1 (or its string form) or `true`
pub fn coerce_sold(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(f64::trunc) == Some(1.0),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok() == Some(1),
        _ => false,
    }
}

/// Identifier from a non-empty string or a non-zero number
fn coerce_id(value: Option<&Value>) -> Option<String> {
    match value.filter(|v| truthy_value(v))? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn truthy_value(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn truthy<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(truthy_value(&Value::deserialize(deserializer)?))
}

/// One page of inventory
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VehiclePage {
    #[serde(default, rename = "data")]
    pub records: Vec<VehicleRecord>,
    #[serde(default, rename = "nextpage", deserialize_with = "truthy")]
    pub has_next: bool,
}

/// Paginated inventory reader
#[async_trait]
pub trait VehicleSource: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Fetch one page; pages are numbered from 1
    async fn fetch_page(&self, page: u32) -> Result<VehiclePage>;

    /// Upper bound on pages read by [`VehicleSource::fetch_all`]
    fn max_pages(&self) -> u32 {
        DEFAULT_MAX_PAGES
    }

    /// Walk all pages
    ///
    /// A failure on the first page is returned. A failure on a later page
    /// ends the walk with the records read so far.
    async fn fetch_all(&self) -> Result<Vec<VehicleRecord>> {
        let max_pages = self.max_pages();
        let mut records = Vec::new();
        let mut page = 1;

        loop {
            match self.fetch_page(page).await {
                Ok(batch) => {
                    debug!(
                        source = self.name(),
                        page,
                        count = batch.records.len(),
                        "Fetched vehicle page"
                    );
                    records.extend(batch.records);
                    if !batch.has_next {
                        break;
                    }
                }
                Err(e) if page == 1 => return Err(e),
                Err(e) => {
                    warn!(
                        source = self.name(),
                        page,
                        error = %e,
                        "Vehicle page failed, keeping earlier pages"
                    );
                    break;
                }
            }

            if page >= max_pages {
                warn!(source = self.name(), max_pages, "Reached vehicle page limit");
                break;
            }
            page += 1;
        }

        Ok(records)
    }
}

//! Configuration
//!
//! Settings come from an optional TOML file, then `KEYRACK_*` environment
//! variables with `__` between section and key:
//!
//! ```text
//! KEYRACK_SLOTS__TOTAL_SLOTS=240
//! KEYRACK_SERVER__HTTP_PORT=8080
//! KEYRACK_SOURCE__BASE_URL=https://dms.example/v2
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::server::ServerConfig;
use crate::slots::{KeySlotAllocator, PriceTiers, DEFAULT_TOTAL_SLOTS};
use crate::source::DEFAULT_MAX_PAGES;

/// Top-level settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub slots: SlotSettings,
    pub server: ServerConfig,
    pub sync: SyncSettings,
    pub source: SourceSettings,
}

/// Key rack layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotSettings {
    pub total_slots: usize,
    /// Place by price tier; when false, first free slot from 0
    pub tiered: bool,
    pub tiers: PriceTiers,
}

impl Default for SlotSettings {
    fn default() -> Self {
        Self {
            total_slots: DEFAULT_TOTAL_SLOTS,
            tiered: true,
            tiers: PriceTiers::default(),
        }
    }
}

impl SlotSettings {
    /// Allocator with this layout
    pub fn build_allocator(&self) -> KeySlotAllocator {
        let tiers = self.tiered.then(|| self.tiers.clone());
        KeySlotAllocator::new(self.total_slots, tiers)
    }
}

/// Background inventory sync
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 300,
        }
    }
}

impl SyncSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Remote inventory API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Base URL; sync is unavailable when unset
    pub base_url: Option<String>,
    /// Pre-issued access token, never written back out
    #[serde(skip_serializing)]
    pub token: Option<String>,
    pub fields: Vec<String>,
    pub timeout_secs: u64,
    pub max_pages: u32,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            token: None,
            fields: [
                "vehicle_id",
                "license_plate",
                "purchase_price",
                "brand",
                "model",
                "color",
                "purchase_date",
                "sell_price",
                "is_sold",
            ]
            .iter()
            .map(|f| f.to_string())
            .collect(),
            timeout_secs: 15,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

impl Settings {
    /// Load settings from an optional file plus the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings: Settings = builder
            .add_source(
                config::Environment::with_prefix("KEYRACK")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| Error::Config(e.to_string()))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let settings: Settings =
            toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Render the effective settings as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.slots.total_slots == 0 {
            return Err(Error::Config("slots.total_slots must be at least 1".into()));
        }
        if self.slots.tiered {
            self.slots.tiers.validate()?;
        }
        if self.sync.interval_secs == 0 {
            return Err(Error::Config("sync.interval_secs must be at least 1".into()));
        }
        Ok(())
    }
}

// Keyrack - Key Slot Allocation
// Assigns vehicle keys to rack slots by purchase price

#![warn(rust_2018_idioms)]

pub mod config;
pub mod metrics;
pub mod server;
pub mod service;
pub mod slots;
pub mod source;
pub mod sync;

// Re-exports for convenience
pub use config::Settings;
pub use service::KeyService;
pub use slots::{KeySlotAllocator, PriceTiers};
pub use sync::SyncService;

/// Keyrack error types
pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum Error {
        #[error("License plate already present: {0}")]
        DuplicatePlate(String),

        #[error("No free key slot available")]
        TableFull,

        #[error("Handover pool is full; complete a pending handover first")]
        PoolFull,

        #[error("Vehicle not found: {0}")]
        NotFound(String),

        #[error("Slot index {index} out of range (0..{total})")]
        InvalidIndex { index: usize, total: usize },

        #[error("Invalid argument: {0}")]
        InvalidArgument(String),

        #[error("Vehicle source error: {0}")]
        Source(String),

        #[error("Configuration error: {0}")]
        Config(String),

        #[error("Internal error: {0}")]
        Internal(String),
    }

    impl Error {
        /// Short label for metrics and logs
        pub fn reason(&self) -> &'static str {
            match self {
                Error::DuplicatePlate(_) => "duplicate_plate",
                Error::TableFull => "table_full",
                Error::PoolFull => "pool_full",
                Error::NotFound(_) => "not_found",
                Error::InvalidIndex { .. } => "invalid_index",
                Error::InvalidArgument(_) => "invalid_argument",
                Error::Source(_) => "source",
                Error::Config(_) => "config",
                Error::Internal(_) => "internal",
            }
        }
    }

    pub type Result<T> = std::result::Result<T, Error>;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_reasons() {
        assert_eq!(error::Error::TableFull.reason(), "table_full");
        assert_eq!(
            error::Error::InvalidIndex { index: 5, total: 3 }.to_string(),
            "Slot index 5 out of range (0..3)"
        );
    }
}

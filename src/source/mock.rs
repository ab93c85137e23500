//! In-memory inventory source
//!
//! Serves fixed pages of records. Useful for tests and for running the
//! service without a remote inventory.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use super::{VehiclePage, VehicleRecord, VehicleSource};
use crate::error::{Error, Result};

/// In-memory vehicle source
#[derive(Debug, Default)]
pub struct MockVehicleSource {
    pages: Mutex<Vec<Vec<VehicleRecord>>>,
    fail_page: Mutex<Option<u32>>,
    delay: Mutex<Option<Duration>>,
    requests: AtomicU32,
}

impl MockVehicleSource {
    /// Create a source serving the given pages in order
    pub fn new(pages: Vec<Vec<VehicleRecord>>) -> Self {
        Self {
            pages: Mutex::new(pages),
            ..Self::default()
        }
    }

    /// Create a source with all records on one page
    pub fn single_page(records: Vec<VehicleRecord>) -> Self {
        Self::new(vec![records])
    }

    /// Replace the inventory served from now on
    pub fn set_pages(&self, pages: Vec<Vec<VehicleRecord>>) {
        *self.pages.lock() = pages;
    }

    /// Make requests for `page` fail, or clear with `None`
    pub fn fail_on_page(&self, page: Option<u32>) {
        *self.fail_page.lock() = page;
    }

    /// Wait this long before answering each page
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    /// Number of page requests served so far
    pub fn request_count(&self) -> u32 {
        self.requests.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl VehicleSource for MockVehicleSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_page(&self, page: u32) -> Result<VehiclePage> {
        self.requests.fetch_add(1, Ordering::Relaxed);

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if *self.fail_page.lock() == Some(page) {
            return Err(Error::Source(format!("page {} unavailable", page)));
        }

        let pages = self.pages.lock();
        let index = (page as usize).saturating_sub(1);
        Ok(VehiclePage {
            records: pages.get(index).cloned().unwrap_or_default(),
            has_next: (page as usize) < pages.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(prefix: &str, count: usize) -> Vec<VehicleRecord> {
        (0..count)
            .map(|i| VehicleRecord::new(&format!("{}{}", prefix, i), &format!("{}-{}", prefix, i), 1000.0))
            .collect()
    }

    #[tokio::test]
    async fn test_fetch_all_walks_pages() -> Result<()> {
        let source = MockVehicleSource::new(vec![page("A", 2), page("B", 3), page("C", 1)]);

        let records = source.fetch_all().await?;
        assert_eq!(records.len(), 6);
        assert_eq!(source.request_count(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_first_page_failure_is_an_error() {
        let source = MockVehicleSource::new(vec![page("A", 2)]);
        source.fail_on_page(Some(1));

        assert!(matches!(source.fetch_all().await, Err(Error::Source(_))));
    }

    #[tokio::test]
    async fn test_later_page_failure_keeps_earlier_pages() -> Result<()> {
        let source = MockVehicleSource::new(vec![page("A", 2), page("B", 2), page("C", 2)]);
        source.fail_on_page(Some(2));

        let records = source.fetch_all().await?;
        assert_eq!(records.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_page_limit() -> Result<()> {
        let pages = (0..150).map(|i| page(&format!("P{}-", i), 1)).collect();
        let source = MockVehicleSource::new(pages);

        let records = source.fetch_all().await?;
        assert_eq!(records.len(), crate::source::DEFAULT_MAX_PAGES as usize);
        assert_eq!(source.request_count(), crate::source::DEFAULT_MAX_PAGES);
        Ok(())
    }

    #[tokio::test]
    async fn test_delay_slows_each_page() -> Result<()> {
        let source = MockVehicleSource::new(vec![page("A", 1), page("B", 1)]);
        source.set_delay(Some(Duration::from_millis(20)));

        let started = std::time::Instant::now();
        assert_eq!(source.fetch_all().await?.len(), 2);
        assert!(started.elapsed() >= Duration::from_millis(40));
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_source() -> Result<()> {
        let source = MockVehicleSource::default();
        assert!(source.fetch_all().await?.is_empty());
        Ok(())
    }
}

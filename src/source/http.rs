//! HTTP inventory source
//!
//! Reads `GET {base_url}/vehicle?fields=...&page=N` with a pre-issued token
//! in the `token` header. Responses look like `{"data": [...], "nextpage": true}`.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

use super::{VehiclePage, VehicleSource};
use crate::config::SourceSettings;
use crate::error::{Error, Result};

/// Inventory source backed by the dealer management API
#[derive(Debug, Clone)]
pub struct HttpVehicleSource {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    fields: String,
    max_pages: u32,
}

impl HttpVehicleSource {
    /// Build a client from the `[source]` settings
    pub fn new(settings: &SourceSettings) -> Result<Self> {
        let base_url = settings
            .base_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| Error::Config("source.base_url is not set".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| Error::Source(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: settings.token.clone(),
            fields: settings.fields.join(","),
            max_pages: settings.max_pages,
        })
    }
}

#[async_trait]
impl VehicleSource for HttpVehicleSource {
    fn name(&self) -> &str {
        &self.base_url
    }

    #[instrument(skip(self))]
    async fn fetch_page(&self, page: u32) -> Result<VehiclePage> {
        let url = format!("{}/vehicle", self.base_url);

        let mut request = self
            .client
            .get(&url)
            .query(&[("fields", self.fields.clone()), ("page", page.to_string())]);
        if let Some(token) = &self.token {
            request = request.header("token", token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Source(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(200)
                .collect();
            return Err(Error::Source(format!(
                "GET {} returned {}: {}",
                url, status, body
            )));
        }

        let page_data = response
            .json::<VehiclePage>()
            .await
            .map_err(|e| Error::Source(format!("Invalid vehicle page from {}: {}", url, e)))?;

        debug!(
            page,
            count = page_data.records.len(),
            has_next = page_data.has_next,
            "Vehicle page received"
        );
        Ok(page_data)
    }

    fn max_pages(&self) -> u32 {
        self.max_pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_base_url() {
        let settings = SourceSettings::default();
        assert!(matches!(
            HttpVehicleSource::new(&settings),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_trims_trailing_slash() -> Result<()> {
        let settings = SourceSettings {
            base_url: Some("http://inventory.local/api/".to_string()),
            ..SourceSettings::default()
        };
        let source = HttpVehicleSource::new(&settings)?;
        assert_eq!(source.name(), "http://inventory.local/api");
        assert_eq!(source.max_pages(), settings.max_pages);
        Ok(())
    }
}

//! Remote CSV/JSON fetcher.

use std::time::Duration;

use reqwest::Client;
use tracing::{info, warn};
use url::Url;

use super::parse_text;
use crate::config::ImportConfig;
use crate::error::{GeopinError, Result};
use crate::models::Record;

/// Fetches tabular data over HTTP. Failures are reported, never retried.
pub struct RemoteImporter {
    client: Client,
}

impl RemoteImporter {
    pub fn new(config: &ImportConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GeopinError::network("<client>", e))?;
        Ok(Self { client })
    }

    /// Download `url` and parse the body as JSON or delimited text
    pub async fn fetch(&self, url: &str) -> Result<Vec<Record>> {
        let parsed = Url::parse(url).map_err(|e| GeopinError::network(url, e))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(GeopinError::network(
                url,
                format!("unsupported scheme '{}'", parsed.scheme()),
            ));
        }

        info!("Fetching {}", parsed);

        let response = self.client.get(parsed).send().await.map_err(|e| {
            warn!("Request to {} failed: {}", url, e);
            GeopinError::network(url, e)
        })?;

        if !response.status().is_success() {
            warn!("Fetch of {} returned status {}", url, response.status());
            return Err(GeopinError::network(
                url,
                format!("server responded with status {}", response.status()),
            ));
        }

        let text = response
            .text()
            .await
            .map_err(|e| GeopinError::network(url, e))?;

        parse_text(&text)
    }
}

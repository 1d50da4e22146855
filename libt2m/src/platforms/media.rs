//! Media download over HTTP
//!
//! `file://` URLs are read from the local filesystem, which keeps local
//! mirrors and tests off the network.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{PlatformError, Result};
use crate::platforms::{MediaFetcher, MediaFile};

/// Downloads media with a shared reqwest client
#[derive(Debug, Clone)]
pub struct HttpMediaFetcher {
    client: reqwest::Client,
}

impl HttpMediaFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(concat!("t2m/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PlatformError::Network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn fetch(&self, url: &str) -> Result<MediaFile> {
        if let Some(path) = url.strip_prefix("file://") {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| PlatformError::Media(format!("Failed to read {}: {}", url, e)))?;
            return Ok(MediaFile::new(url, bytes));
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PlatformError::Media(format!("Failed to download {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PlatformError::Media(format!(
                "Failed to download {}: HTTP {}",
                url,
                status.as_u16()
            ))
            .into());
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PlatformError::Media(format!("Failed to download {}: {}", url, e)))?;

        Ok(MediaFile::new(url, bytes.to_vec()))
    }
}

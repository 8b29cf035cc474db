//! HTTP asset fetcher.
//!
//! Downloads legacy-origin and CDN assets with a short per-request timeout and
//! a fixed number of attempts. Nothing is retried indefinitely.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

use super::Fetcher;

/// Fetcher backed by a shared `reqwest` client
pub struct HttpFetcher {
    client: reqwest::Client,
    attempts: u32,
}

impl HttpFetcher {
    /// Create a fetcher with a per-request timeout and attempt count (at least 1)
    pub fn new(timeout: Duration, attempts: u32) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("lureforge/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            attempts: attempts.max(1),
        })
    }

    async fn fetch_once(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("{} returned HTTP {}", url, status);
        }

        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read body of {}", url))?;

        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let mut last_error = None;

        for attempt in 1..=self.attempts {
            match self.fetch_once(url).await {
                Ok(bytes) => {
                    debug!(url, attempt, bytes = bytes.len(), "Fetched asset");
                    return Ok(bytes);
                }
                Err(e) => {
                    warn!(url, attempt, error = %e, "Fetch attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow::anyhow!("No fetch attempt made"))
            .context(format!("Giving up on {} after {} attempts", url, self.attempts)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempts_never_zero() {
        let fetcher = HttpFetcher::new(Duration::from_secs(1), 0).unwrap();
        assert_eq!(fetcher.attempts, 1);
    }

    // HTTP behavior is covered with wiremock in tests/http_adapters.rs
}

use std::time::Duration;

use futures::stream::{self, StreamExt};
use reqwest::Client;

use crate::config::Source;
use crate::error::Result;

pub struct FeedFetcher {
    client: Client,
    concurrency: usize,
}

impl FeedFetcher {
    pub fn new(timeout_secs: u64, concurrency: usize) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("nhk-tracker/0.1")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn fetch(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Failed to fetch feed: HTTP {}", response.status()).into());
        }

        let content = response.text().await?;
        Ok(content)
    }

    /// Fetches all sources concurrently with bounded parallelism. Every
    /// source comes back with its own result; a failed fetch never hides the
    /// others.
    pub async fn fetch_batch(&self, sources: Vec<Source>) -> Vec<(Source, Result<String>)> {
        stream::iter(sources)
            .map(|source| async move {
                let result = self.fetch(&source.url).await;
                match &result {
                    Ok(content) => {
                        tracing::debug!(source = %source.name, bytes = content.len(), "fetched feed");
                    }
                    Err(e) => {
                        tracing::warn!(source = %source.name, url = %source.url, error = %e, "fetch failed");
                    }
                }
                (source, result)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await
    }
}

impl Default for FeedFetcher {
    fn default() -> Self {
        Self::new(30, 5)
    }
}

//! Where layer bytes come from.

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

/// Fetches the raw bytes behind a layer URL.
#[async_trait]
pub trait LayerSource: Send + Sync {
    async fn fetch(&self, url: &str) -> StoreResult<Bytes>;
}

/// HTTP(S) source backed by a shared reqwest client.
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new(config: &StoreConfig) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(config.fetch_timeout())
            .connect_timeout(Duration::from_secs(10))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| StoreError::InvalidConfig(format!("HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl LayerSource for HttpSource {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> StoreResult<Bytes> {
        debug!(url = %url, "Fetching layer");

        let fetch_err = |e: reqwest::Error| StoreError::Fetch {
            url: url.to_string(),
            message: e.to_string(),
        };
        let response = self.client.get(url).send().await.map_err(fetch_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(fetch_err)?;
        info!(url = %url, size = bytes.len(), "Fetched layer");
        Ok(bytes)
    }
}

/// In-memory source keyed by URL. Counts fetches per URL.
#[derive(Default)]
pub struct MemorySource {
    entries: RwLock<HashMap<String, Bytes>>,
    fetches: RwLock<HashMap<String, usize>>,
    total: AtomicUsize,
    delay: Option<Duration>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every fetch, to simulate a slow network.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn insert(&self, url: impl Into<String>, bytes: impl Into<Bytes>) {
        self.entries.write().await.insert(url.into(), bytes.into());
    }

    /// Number of fetches issued for `url`, including failed ones.
    pub async fn fetch_count(&self, url: &str) -> usize {
        self.fetches.read().await.get(url).copied().unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl LayerSource for MemorySource {
    async fn fetch(&self, url: &str) -> StoreResult<Bytes> {
        *self.fetches.write().await.entry(url.to_string()).or_default() += 1;
        self.total.fetch_add(1, Ordering::Relaxed);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.entries
            .read()
            .await
            .get(url)
            .cloned()
            .ok_or_else(|| StoreError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

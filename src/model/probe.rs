//! Connectivity checks gating the remote tier

use std::time::Duration;

use async_trait::async_trait;
use mini_moka::sync::Cache;

/// Default URL probed for connectivity
pub const DEFAULT_PROBE_URL: &str = "https://www.google.com";

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Answers whether the remote tier is reachable right now
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Probe with a fixed answer
#[derive(Debug, Clone, Copy)]
pub struct StaticProbe(pub bool);

#[async_trait]
impl ConnectivityProbe for StaticProbe {
    async fn is_online(&self) -> bool {
        self.0
    }
}

/// GET a well-known URL, caching the answer for a short TTL
///
/// Any response, whatever its status, counts as online. Only transport
/// failures and timeouts count as offline.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
    cache: Cache<String, bool>,
}

impl HttpProbe {
    /// Create a probe for `url` whose result is reused for `ttl`
    #[must_use]
    pub fn new(url: &str, ttl: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_string(),
            cache: Cache::builder().max_capacity(16).time_to_live(ttl).build(),
        }
    }
}

#[async_trait]
impl ConnectivityProbe for HttpProbe {
    async fn is_online(&self) -> bool {
        if let Some(online) = self.cache.get(&self.url) {
            return online;
        }

        let online = match self.client.get(&self.url).timeout(PROBE_TIMEOUT).send().await {
            Ok(_) => true,
            Err(e) => {
                tracing::info!(url = %self.url, error = %e, "connectivity probe failed");
                false
            }
        };
        self.cache.insert(self.url.clone(), online);
        online
    }
}

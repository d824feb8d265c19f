//! One shared [`reqwest::Client`] (and therefore one connection pool) per
//! provider base URL, as required by the HTTP client core contract.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, instrument};

use conduit_error::{ProviderError, ProviderErrorKind};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Cheaply cloneable cache of `reqwest::Client`s keyed by base URL.
#[derive(Clone)]
pub struct HttpClientPool {
    clients: Arc<Mutex<HashMap<String, reqwest::Client>>>,
    timeout: Duration,
}

impl Default for HttpClientPool {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl HttpClientPool {
    /// Builds a pool whose clients all share the given per-call timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            clients: Arc::new(Mutex::new(HashMap::new())),
            timeout,
        }
    }

    /// Returns the shared client for `base_url`, constructing and caching
    /// one on first use.
    #[instrument(skip(self))]
    pub async fn client_for(&self, base_url: &str) -> Result<reqwest::Client, ProviderError> {
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get(base_url) {
            return Ok(client.clone());
        }
        debug!(base_url, "building new pooled http client");
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ProviderError::new(ProviderErrorKind::Permanent(e.to_string())))?;
        clients.insert(base_url.to_string(), client.clone());
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reuses_client_for_same_base_url() {
        let pool = HttpClientPool::default();
        let a = pool.client_for("https://api.example.com").await.unwrap();
        let b = pool.client_for("https://api.example.com").await.unwrap();
        // Same underlying Arc-backed client.
        assert_eq!(format!("{:?}", a), format!("{:?}", b));
    }
}

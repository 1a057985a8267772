use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::cache::{CacheLookup, LocalConfigCache};
use super::storage::StorageError;
use crate::widget::{ConfigPayload, WidgetConfiguration};

/// Default upper bound on the configuration fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(3);

/// Why a configuration could not be obtained from cache or network.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("config fetch timed out after {0:?}")]
    Timeout(Duration),
    #[error("config endpoint returned status {0}")]
    Status(u16),
    #[error("config transport error: {0}")]
    Transport(String),
    #[error("malformed config payload: {0}")]
    Malformed(String),
    #[error("config storage error: {0}")]
    Storage(#[from] StorageError),
}

// ============================================================================
// Config Source
// ============================================================================

/// Where configuration comes from when the cache misses.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn fetch(&self) -> Result<ConfigPayload, ResolveError>;
}

/// Reads `GET /whatsapp/config` from the origin.
pub struct HttpConfigSource {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpConfigSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self::with_client(reqwest::Client::new(), url, timeout)
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
        }
    }

    async fn fetch_inner(&self) -> Result<ConfigPayload, ResolveError> {
        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ResolveError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ResolveError::Transport(e.to_string()))?;
        serde_json::from_slice(&body).map_err(|e| ResolveError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl ConfigSource for HttpConfigSource {
    /// Dropping the inner future on timeout abandons the in-flight request
    /// and releases its connection.
    async fn fetch(&self) -> Result<ConfigPayload, ResolveError> {
        match tokio::time::timeout(self.timeout, self.fetch_inner()).await {
            Ok(result) => result,
            Err(_) => Err(ResolveError::Timeout(self.timeout)),
        }
    }
}

// ============================================================================
// Resolver
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    Cache,
    Network,
    Fallback,
}

/// A resolved configuration plus how it was obtained. `failure` holds the
/// reason the fallback was used.
#[derive(Debug)]
pub struct Resolution {
    pub config: WidgetConfiguration,
    pub source: ResolutionSource,
    pub failure: Option<ResolveError>,
}

/// Cache first, then network, then the compiled-in default.
///
/// Concurrent resolves may each miss the cache and fetch; there is no
/// single-flight.
#[derive(Clone)]
pub struct ConfigResolver {
    cache: LocalConfigCache,
    source: Arc<dyn ConfigSource>,
}

impl ConfigResolver {
    pub fn new(cache: LocalConfigCache, source: Arc<dyn ConfigSource>) -> Self {
        Self { cache, source }
    }

    /// Always returns a usable configuration.
    pub async fn resolve(&self) -> WidgetConfiguration {
        self.resolve_detailed().await.config
    }

    pub async fn resolve_detailed(&self) -> Resolution {
        match self.try_resolve().await {
            Ok((payload, source)) => Resolution {
                config: WidgetConfiguration::from(&payload),
                source,
                failure: None,
            },
            Err(e) => {
                warn!("widget config unavailable, using default: {e}");
                // The default is never cached, so the next resolve retries.
                Resolution {
                    config: WidgetConfiguration::fallback(),
                    source: ResolutionSource::Fallback,
                    failure: Some(e),
                }
            }
        }
    }

    async fn try_resolve(&self) -> Result<(ConfigPayload, ResolutionSource), ResolveError> {
        match self.cache.lookup() {
            Ok(CacheLookup::Fresh(payload)) => {
                debug!(config_id = %payload.id, "widget config served from cache");
                return Ok((payload, ResolutionSource::Cache));
            }
            Ok(lookup) => debug!(?lookup, "widget config cache miss"),
            Err(e) => debug!("widget config cache unreadable: {e}"),
        }

        let payload = self.source.fetch().await?;
        info!(config_id = %payload.id, agents = payload.agents.len(), "widget config fetched");

        // A payload that cannot be cached is not used.
        self.cache.write(&payload)?;

        Ok((payload, ResolutionSource::Network))
    }
}

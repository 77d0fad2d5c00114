//! Offline cache worker.
//!
//! Runs apart from the rest of the crate: it owns a versioned content cache,
//! decides which fetches it intercepts, and turns push messages into
//! notifications.

pub mod cache;
pub mod push;

use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::Url;

pub use cache::{CacheStorage, CachedResponse, DiskCacheStorage, MemoryCacheStorage};
pub use push::{
    ClickOutcome, ClientWindow, ClientWindows, NotificationRequest, NotificationSurface,
    PushPayload, on_notification_click, on_push, parse_push_payload,
};

use crate::config::WorkerConfig;
use crate::error::{Error, Result};
use crate::transport::{Method, ReqwestTransport};

/// How a request was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// A top-level page load.
    Navigate,
    Other,
}

/// A fetch seen by the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub method: Method,
    pub url: String,
    pub mode: RequestMode,
}

impl FetchRequest {
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            mode: RequestMode::Other,
        }
    }

    #[must_use]
    pub fn navigate(url: impl Into<String>) -> Self {
        Self {
            mode: RequestMode::Navigate,
            ..Self::get(url)
        }
    }
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    Network,
    Cache,
}

/// Result of [`CacheWorker::handle_fetch`].
#[derive(Debug)]
pub enum FetchOutcome {
    /// The request passes through untouched.
    NotIntercepted,
    Served {
        response: CachedResponse,
        from: ServedFrom,
    },
    /// Intercepted, but neither network nor cache could answer.
    Failed(Error),
}

/// Raw network access for the worker. Any HTTP status is `Ok`.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<CachedResponse>;
}

#[async_trait]
impl Network for ReqwestTransport {
    async fn fetch(&self, url: &str) -> Result<CachedResponse> {
        let response = self
            .client()
            .get(url)
            .send()
            .await
            .map_err(|e| Error::NetworkUnavailable(e.to_string()))?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::NetworkUnavailable(e.to_string()))?;
        Ok(CachedResponse {
            url: url.to_string(),
            status,
            content_type,
            body,
        })
    }
}

/// Install, activate and fetch handling over one cache generation.
pub struct CacheWorker<S: CacheStorage, N: Network> {
    config: WorkerConfig,
    origin: Url,
    storage: S,
    network: N,
}

impl<S: CacheStorage, N: Network> CacheWorker<S, N> {
    /// Creates a worker serving the app at `origin`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `origin` is not an absolute URL.
    pub fn new(config: WorkerConfig, origin: &str, storage: S, network: N) -> Result<Self> {
        let origin = Url::parse(origin)
            .map_err(|e| Error::InvalidInput(format!("worker origin {origin:?}: {e}")))?;
        Ok(Self {
            config,
            origin,
            storage,
            network,
        })
    }

    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    #[must_use]
    pub fn cache_name(&self) -> &str {
        &self.config.cache_name
    }

    fn asset_url(&self, path: &str) -> Result<String> {
        self.origin
            .join(path)
            .map(String::from)
            .map_err(|e| Error::InvalidInput(format!("shell asset {path:?}: {e}")))
    }

    /// Pre-caches every shell asset, then activates.
    ///
    /// Nothing is stored unless every asset answered 2xx. Returns the purged
    /// generations.
    ///
    /// # Errors
    ///
    /// Returns the first asset failure or a storage error.
    pub async fn install(&self) -> Result<Vec<String>> {
        let urls = self
            .config
            .shell_assets
            .iter()
            .map(|path| self.asset_url(path))
            .collect::<Result<Vec<_>>>()?;

        let responses = try_join_all(urls.iter().map(|url| async move {
            let response = self.network.fetch(url).await?;
            if !response.is_success() {
                return Err(Error::UpstreamRejected {
                    endpoint: url.clone(),
                    status: response.status,
                });
            }
            Ok(response)
        }))
        .await?;

        for response in responses {
            self.storage.put(&self.config.cache_name, response).await?;
        }
        log::info!(
            "Installed {} shell assets into {}",
            urls.len(),
            self.config.cache_name
        );

        self.activate().await
    }

    /// Deletes every generation except the current one.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be listed or a generation removed.
    pub async fn activate(&self) -> Result<Vec<String>> {
        let mut purged = Vec::new();
        for name in self.storage.cache_names().await? {
            if name != self.config.cache_name && self.storage.delete_cache(&name).await? {
                log::info!("Purged cache generation {name}");
                purged.push(name);
            }
        }
        Ok(purged)
    }

    /// Applies the fetch policy to `request`.
    pub async fn handle_fetch(&self, request: &FetchRequest) -> FetchOutcome {
        if request.method != Method::Get {
            return FetchOutcome::NotIntercepted;
        }
        let Ok(url) = Url::parse(&request.url) else {
            return FetchOutcome::NotIntercepted;
        };

        if url.path().ends_with(&self.config.daily_endpoint_suffix) {
            return self.network_first(url.as_str()).await;
        }
        if request.mode == RequestMode::Navigate {
            return self.navigate(url.as_str()).await;
        }
        FetchOutcome::NotIntercepted
    }

    async fn network_first(&self, url: &str) -> FetchOutcome {
        match self.network.fetch(url).await {
            Ok(response) => {
                if response.is_success() {
                    if let Err(e) = self
                        .storage
                        .put(&self.config.cache_name, response.clone())
                        .await
                    {
                        log::warn!("Failed to cache {url}: {e}");
                    }
                }
                FetchOutcome::Served {
                    response,
                    from: ServedFrom::Network,
                }
            }
            Err(e) => {
                log::warn!("Network failed for {url}, trying cache: {e}");
                match self.storage.get(&self.config.cache_name, url).await {
                    Ok(Some(response)) => FetchOutcome::Served {
                        response,
                        from: ServedFrom::Cache,
                    },
                    Ok(None) => FetchOutcome::Failed(Error::NoCachedCopy(url.to_string())),
                    Err(e) => {
                        log::warn!("Cache lookup failed for {url}: {e}");
                        FetchOutcome::Failed(Error::NoCachedCopy(url.to_string()))
                    }
                }
            }
        }
    }

    async fn navigate(&self, url: &str) -> FetchOutcome {
        let network_error = match self.network.fetch(url).await {
            Ok(response) => {
                return FetchOutcome::Served {
                    response,
                    from: ServedFrom::Network,
                };
            }
            Err(e) => e,
        };
        log::warn!("Navigation to {url} failed, serving app shell: {network_error}");

        let shell = match self.asset_url(&self.config.shell_entry) {
            Ok(shell) => shell,
            Err(e) => return FetchOutcome::Failed(e),
        };
        match self.storage.get(&self.config.cache_name, &shell).await {
            Ok(Some(response)) => FetchOutcome::Served {
                response,
                from: ServedFrom::Cache,
            },
            Ok(None) => FetchOutcome::Failed(network_error),
            Err(e) => FetchOutcome::Failed(e),
        }
    }
}

//! Process-wide handles shared by every component.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::Result;
use crate::store::{FileStore, KeyValueStore};
use crate::transport::{HttpTransport, ReqwestTransport};

/// Store, transport and configuration, built once and handed to each component.
#[derive(Clone)]
pub struct Context {
    config: Arc<AppConfig>,
    store: Arc<dyn KeyValueStore>,
    transport: Arc<dyn HttpTransport>,
}

impl Context {
    /// Creates a context from explicit parts.
    #[must_use]
    pub fn new(
        config: AppConfig,
        store: Arc<dyn KeyValueStore>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            transport,
        }
    }

    /// Opens the file store under `paths.data_dir` and a `reqwest` transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be created or the HTTP
    /// client cannot be built.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let store = FileStore::open(&config.paths.data_dir)?;
        let transport = ReqwestTransport::new(&config.api)?;
        log::debug!(
            "Context ready: api={}, data={}",
            config.api.base_url,
            store.dir().display()
        );
        Ok(Self::new(config, Arc::new(store), Arc::new(transport)))
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    #[must_use]
    pub fn transport(&self) -> &Arc<dyn HttpTransport> {
        &self.transport
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("base_url", &self.config.api.base_url)
            .finish_non_exhaustive()
    }
}

//! Configuration for the poetry client, its stores and the cache worker.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Production API used when nothing else is configured.
pub const DEFAULT_API_BASE_URL: &str = "https://dailypoetry-api.onrender.com";

/// Remote service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the poetry API, without trailing slash.
    pub base_url: String,
    /// Statically configured bearer token, used when none is stored.
    pub auth_token: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            auth_token: None,
            timeout_secs: 8,
        }
    }
}

impl ApiConfig {
    /// Returns the request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Path configuration for the key-value store and the content cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Directory holding the key-value store files.
    pub data_dir: PathBuf,
    /// Directory holding the worker's versioned content caches.
    pub cache_dir: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        let cache_dir = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."));

        Self {
            data_dir: data_dir.join("daily-poetry"),
            cache_dir: cache_dir.join("daily-poetry"),
        }
    }
}

/// Push notification settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// URL-safe base64 VAPID public key; empty disables enabling notifications.
    pub vapid_public_key: String,
}

/// Cache worker settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Versioned name of the current cache generation.
    pub cache_name: String,
    /// Shell assets pre-cached on install.
    pub shell_assets: Vec<String>,
    /// Cached asset served when a navigation fails.
    pub shell_entry: String,
    /// Path suffix that selects the network-first policy.
    pub daily_endpoint_suffix: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            cache_name: "daily-poetry-v1".to_string(),
            shell_assets: vec!["/".to_string(), "/index.html".to_string()],
            shell_entry: "/index.html".to_string(),
            daily_endpoint_suffix: "/v1/daily".to_string(),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub paths: PathConfig,
    pub notifications: NotificationConfig,
    pub worker: WorkerConfig,
}

impl AppConfig {
    /// Creates a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default location of the config file.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("daily-poetry")
            .join("config.toml")
    }

    /// Sets the API base URL, trimming any trailing slash.
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.api.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Sets the static bearer token.
    #[must_use]
    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.api.auth_token = token;
        self
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.paths.data_dir = dir.into();
        self
    }

    /// Sets the VAPID public key.
    #[must_use]
    pub fn with_vapid_public_key(mut self, key: &str) -> Self {
        self.notifications.vapid_public_key = key.to_string();
        self
    }

    /// Loads the config at `path`, writing a default template if it is missing,
    /// then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or created, or if
    /// the result fails validation.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?
        } else {
            let config = Self::default();
            config.save(path)?;
            log::info!("Wrote default config to {}", path.display());
            config
        };
        let config = config.with_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Writes the config as TOML, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    /// Applies `DAILY_POETRY_*` overrides read through `lookup`.
    #[must_use]
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("DAILY_POETRY_API_BASE_URL") {
            self = self.with_base_url(&url);
        }
        if let Some(token) = non_empty("DAILY_POETRY_AUTH_TOKEN") {
            self.api.auth_token = Some(token);
        }
        if let Some(key) = non_empty("DAILY_POETRY_VAPID_PUBLIC_KEY") {
            self.notifications.vapid_public_key = key;
        }
        self
    }

    /// Checks the invariants the rest of the crate relies on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first violated setting.
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(Error::Config("api.base_url must not be empty".to_string()));
        }
        if self.api.timeout_secs == 0 {
            return Err(Error::Config("api.timeout_secs must be positive".to_string()));
        }
        if self.worker.cache_name.trim().is_empty() {
            return Err(Error::Config("worker.cache_name must not be empty".to_string()));
        }
        Ok(())
    }
}

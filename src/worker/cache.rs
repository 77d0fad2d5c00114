//! Versioned content cache generations.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::PathConfig;
use crate::error::{Error, Result};

/// A response as held by the content cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl CachedResponse {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Named cache generations, each mapping a request URL to a response.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Stores `response` under its URL in `cache`, creating the generation if needed.
    async fn put(&self, cache: &str, response: CachedResponse) -> Result<()>;

    async fn get(&self, cache: &str, url: &str) -> Result<Option<CachedResponse>>;

    /// Names of every generation currently present.
    async fn cache_names(&self) -> Result<Vec<String>>;

    /// Drops a whole generation. Returns false if it did not exist.
    async fn delete_cache(&self, cache: &str) -> Result<bool>;
}

/// In-memory cache, used by tests and short-lived sessions.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    caches: Mutex<HashMap<String, HashMap<String, CachedResponse>>>,
}

impl MemoryCacheStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn caches(&self) -> std::sync::MutexGuard<'_, HashMap<String, HashMap<String, CachedResponse>>> {
        self.caches
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn put(&self, cache: &str, response: CachedResponse) -> Result<()> {
        self.caches()
            .entry(cache.to_string())
            .or_default()
            .insert(response.url.clone(), response);
        Ok(())
    }

    async fn get(&self, cache: &str, url: &str) -> Result<Option<CachedResponse>> {
        Ok(self
            .caches()
            .get(cache)
            .and_then(|entries| entries.get(url))
            .cloned())
    }

    async fn cache_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.caches().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn delete_cache(&self, cache: &str) -> Result<bool> {
        Ok(self.caches().remove(cache).is_some())
    }
}

#[derive(Serialize, Deserialize)]
struct DiskEntry {
    url: String,
    status: u16,
    #[serde(default)]
    content_type: Option<String>,
    body: String,
}

/// On-disk cache: `root/<generation>/<sha256(url)>.json`.
#[derive(Debug, Clone)]
pub struct DiskCacheStorage {
    root: PathBuf,
}

impl DiskCacheStorage {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Cache rooted at the configured `paths.cache_dir`.
    #[must_use]
    pub fn from_paths(paths: &PathConfig) -> Self {
        Self::new(&paths.cache_dir)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn generation_dir(&self, cache: &str) -> Result<PathBuf> {
        let valid = !cache.is_empty()
            && cache != "."
            && cache != ".."
            && !cache.contains(['/', '\\']);
        if !valid {
            return Err(Error::InvalidInput(format!("invalid cache name: {cache:?}")));
        }
        Ok(self.root.join(cache))
    }

    fn entry_path(&self, cache: &str, url: &str) -> Result<PathBuf> {
        let digest = Sha256::digest(url.as_bytes());
        Ok(self.generation_dir(cache)?.join(format!("{digest:x}.json")))
    }
}

#[async_trait]
impl CacheStorage for DiskCacheStorage {
    async fn put(&self, cache: &str, response: CachedResponse) -> Result<()> {
        let path = self.entry_path(cache, &response.url)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let entry = DiskEntry {
            url: response.url,
            status: response.status,
            content_type: response.content_type,
            body: STANDARD.encode(&response.body),
        };
        let json = serde_json::to_vec(&entry).map_err(|e| Error::Store(e.to_string()))?;

        let temp = path.with_extension("json.tmp");
        tokio::fs::write(&temp, json).await?;
        tokio::fs::rename(&temp, &path).await?;
        Ok(())
    }

    async fn get(&self, cache: &str, url: &str) -> Result<Option<CachedResponse>> {
        let path = self.entry_path(cache, url)?;
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let decoded = serde_json::from_slice::<DiskEntry>(&raw)
            .ok()
            .filter(|entry| entry.url == url)
            .and_then(|entry| {
                let body = STANDARD.decode(&entry.body).ok()?;
                Some(CachedResponse {
                    url: entry.url,
                    status: entry.status,
                    content_type: entry.content_type,
                    body: Bytes::from(body),
                })
            });
        if decoded.is_none() {
            log::warn!("Ignoring unreadable cache entry {}", path.display());
        }
        Ok(decoded)
    }

    async fn cache_names(&self) -> Result<Vec<String>> {
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete_cache(&self, cache: &str) -> Result<bool> {
        match tokio::fs::remove_dir_all(self.generation_dir(cache)?).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

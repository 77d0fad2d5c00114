//! Durable key-value storage abstraction for testability.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::model::Theme;

/// Logical keys owned by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    CachedDaily,
    Favourites,
    AuthToken,
    Theme,
}

impl StorageKey {
    /// Returns the string key under which the value is persisted.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CachedDaily => "daily-poetry.cached-daily",
            Self::Favourites => "daily-poetry.favourites",
            Self::AuthToken => "daily-poetry.auth-token",
            Self::Theme => "daily-poetry.theme",
        }
    }
}

/// Synchronous, string-keyed persistence.
///
/// Each call is exclusive; implementations serialize their own reads and writes.
pub trait KeyValueStore: Send + Sync {
    /// Returns the raw value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removes the value stored under `key`. Missing keys are not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Reads and decodes a JSON value.
///
/// Missing keys, unreadable storage and undecodable bytes all yield `None`;
/// the callers treat the store as a best-effort cache.
pub fn read_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: StorageKey) -> Option<T> {
    let raw = match store.get(key.as_str()) {
        Ok(Some(raw)) if !raw.is_empty() => raw,
        Ok(_) => return None,
        Err(e) => {
            log::warn!("Failed to read {}: {e}", key.as_str());
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("Discarding unreadable {}: {e}", key.as_str());
            None
        }
    }
}

/// Encodes `value` as JSON and stores it.
///
/// # Errors
///
/// Returns an error if the value cannot be encoded or the store rejects the write.
pub fn write_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: StorageKey,
    value: &T,
) -> Result<()> {
    let raw = serde_json::to_string(value).map_err(|e| Error::Store(e.to_string()))?;
    store.set(key.as_str(), &raw)
}

/// Returns the saved theme, or [`Theme::System`] when none is saved.
#[must_use]
pub fn load_theme(store: &dyn KeyValueStore) -> Theme {
    read_json(store, StorageKey::Theme).unwrap_or_default()
}

/// Persists the theme choice.
///
/// # Errors
///
/// Returns an error if the store rejects the write.
pub fn save_theme(store: &dyn KeyValueStore, theme: Theme) -> Result<()> {
    write_json(store, StorageKey::Theme, &theme)
}

/// In-memory store, used by tests and as a fallback when no data directory exists.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.values
            .lock()
            .map_err(|_| Error::Store("memory store lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// File-backed store: one file per key inside a directory.
///
/// Writes go to a temporary file that is renamed into place, so a reader
/// never observes a half-written value.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    // Serializes access within the process; renames make it safe across processes.
    guard: Mutex<()>,
}

impl FileStore {
    /// Opens (creating if needed) a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            guard: Mutex::new(()),
        })
    }

    /// Returns the directory backing this store.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty()
            || !key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        {
            return Err(Error::Store(format!("invalid key: {key:?}")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    fn exclusive(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.guard
            .lock()
            .map_err(|_| Error::Store("file store lock poisoned".to_string()))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        let _guard = self.exclusive()?;
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp_path = path.with_extension("json.tmp");
        let _guard = self.exclusive()?;

        std::fs::write(&tmp_path, value)?;

        // The store holds the bearer token
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&tmp_path, perms)?;
        }

        std::fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let _guard = self.exclusive()?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

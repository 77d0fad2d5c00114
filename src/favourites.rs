//! Favourites list: remote-authoritative, mirrored to the local store.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{Map, Value};
use tokio::sync::Mutex as AsyncMutex;

use crate::api::PoetryApi;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::model::{DailyPoem, FavouriteEntry, FavouritesSource};
use crate::store::{KeyValueStore, StorageKey, read_json, write_json};

/// Result of [`FavouritesSync::load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    pub entries: Vec<FavouriteEntry>,
    pub source: FavouritesSource,
    /// Why the remote list could not be used, when `source` is local.
    pub notice: Option<String>,
}

/// What a successful toggle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Added,
    Removed,
}

#[derive(Debug)]
struct Snapshot {
    entries: Vec<FavouriteEntry>,
    source: FavouritesSource,
}

/// Keeps the favourites list in step with the service.
///
/// Local state changes only after the service confirmed the change. Toggles
/// of the same poem run one at a time; toggles of different poems run freely.
pub struct FavouritesSync {
    api: PoetryApi,
    store: Arc<dyn KeyValueStore>,
    snapshot: Mutex<Snapshot>,
    in_flight: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl FavouritesSync {
    /// Creates the synchronizer, seeded from the local cache.
    #[must_use]
    pub fn new(ctx: &Context, api: PoetryApi) -> Self {
        let store = Arc::clone(ctx.store());
        let entries = read_local(store.as_ref());
        Self {
            api,
            store,
            snapshot: Mutex::new(Snapshot {
                entries,
                source: FavouritesSource::Local,
            }),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    fn snapshot(&self) -> MutexGuard<'_, Snapshot> {
        // The snapshot is replaced wholesale, so a poisoned value is still consistent.
        self.snapshot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Returns the current list, most recently added first.
    #[must_use]
    pub fn entries(&self) -> Vec<FavouriteEntry> {
        self.snapshot().entries.clone()
    }

    /// Returns where the current list came from.
    #[must_use]
    pub fn source(&self) -> FavouritesSource {
        self.snapshot().source
    }

    /// Returns true if `poem_id` is in the current list.
    #[must_use]
    pub fn is_favourite(&self, poem_id: &str) -> bool {
        self.snapshot().entries.iter().any(|e| e.poem_id == poem_id)
    }

    /// Refreshes the list from the service, falling back to the local cache.
    pub async fn load(&self) -> LoadOutcome {
        match self.api.list_favourites().await {
            Ok(entries) => {
                let mut snapshot = self.snapshot();
                self.persist(&entries);
                snapshot.entries.clone_from(&entries);
                snapshot.source = FavouritesSource::Remote;
                log::info!("Loaded {} favourites from remote", entries.len());
                LoadOutcome {
                    entries,
                    source: FavouritesSource::Remote,
                    notice: None,
                }
            }
            Err(e) => {
                let notice = match e {
                    Error::AuthUnavailable(_) | Error::NotConfigured(_) => {
                        "Auth token not configured; using local favourites.".to_string()
                    }
                    _ if e.is_offline() => {
                        "Offline; using local favourites.".to_string()
                    }
                    other => other.to_string(),
                };
                log::warn!("Favourites unavailable from remote: {notice}");
                let entries = read_local(self.store.as_ref());
                let mut snapshot = self.snapshot();
                snapshot.entries.clone_from(&entries);
                snapshot.source = FavouritesSource::Local;
                LoadOutcome {
                    entries,
                    source: FavouritesSource::Local,
                    notice: Some(notice),
                }
            }
        }
    }

    /// Adds `daily` to the favourites if absent, removes it if present.
    ///
    /// # Errors
    ///
    /// Returns the service error when the remote call fails; the list is then
    /// left exactly as it was.
    pub async fn toggle(&self, daily: &DailyPoem) -> Result<ToggleOutcome> {
        let favourite = daily.to_favourite();
        let flight = self.flight(&favourite.poem_id);
        let result = {
            let _serial = flight.lock().await;
            self.toggle_exclusive(favourite.clone()).await
        };
        self.land(&favourite.poem_id, &flight);
        result
    }

    async fn toggle_exclusive(&self, favourite: FavouriteEntry) -> Result<ToggleOutcome> {
        let poem_id = favourite.poem_id.clone();
        let outcome = if self.is_favourite(&poem_id) {
            self.api.remove_favourite(&poem_id).await?;
            ToggleOutcome::Removed
        } else {
            self.api.add_favourite(&poem_id).await?;
            ToggleOutcome::Added
        };

        let mut snapshot = self.snapshot();
        let mut next: Vec<FavouriteEntry> = snapshot
            .entries
            .iter()
            .filter(|e| e.poem_id != poem_id)
            .cloned()
            .collect();
        if outcome == ToggleOutcome::Added {
            next.insert(0, favourite);
        }
        self.persist(&next);
        snapshot.entries = next;
        log::info!("Favourite {poem_id} {outcome:?}");
        Ok(outcome)
    }

    fn persist(&self, entries: &[FavouriteEntry]) {
        if let Err(e) = write_json(self.store.as_ref(), StorageKey::Favourites, entries) {
            log::error!("Failed to persist favourites: {e}");
        }
    }

    /// Returns the serialization lock for `poem_id`, registering it if needed.
    fn flight(&self, poem_id: &str) -> Arc<AsyncMutex<()>> {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Arc::clone(in_flight.entry(poem_id.to_string()).or_default())
    }

    /// Drops the lock for `poem_id` once no other toggle is waiting on it.
    fn land(&self, poem_id: &str, flight: &Arc<AsyncMutex<()>>) {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        // One reference is the map's, one is ours.
        if Arc::strong_count(flight) <= 2 {
            in_flight.remove(poem_id);
        }
    }
}

fn read_local(store: &dyn KeyValueStore) -> Vec<FavouriteEntry> {
    let entries: Vec<FavouriteEntry> = read_json(store, StorageKey::Favourites).unwrap_or_default();
    dedupe(entries)
}

fn dedupe(entries: Vec<FavouriteEntry>) -> Vec<FavouriteEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|e| seen.insert(e.poem_id.clone()))
        .collect()
}

/// Normalizes a favourites response.
///
/// Accepts a bare array or an object with a `favourites` array; any other
/// shape is an empty list. Items without an id are dropped, and only the
/// first entry of a repeated id is kept.
#[must_use]
pub fn normalize_favourites(payload: &Value) -> Vec<FavouriteEntry> {
    let items: &[Value] = match payload {
        Value::Array(items) => items,
        Value::Object(map) => map
            .get("favourites")
            .and_then(Value::as_array)
            .map_or(&[][..], Vec::as_slice),
        _ => &[],
    };
    dedupe(items.iter().filter_map(normalize_favourite).collect())
}

/// Normalizes one favourite, accepting snake_case and camelCase field names.
///
/// Returns `None` when the item is not an object or has no usable id.
#[must_use]
pub fn normalize_favourite(item: &Value) -> Option<FavouriteEntry> {
    let fields = item.as_object()?;
    let poem_id = text_field(fields, &["poem_id", "poemId"]).filter(|id| !id.trim().is_empty())?;

    Some(FavouriteEntry {
        poem_id,
        title: text_field(fields, &["title"]).unwrap_or_else(|| "Untitled".to_string()),
        author: text_field(fields, &["author"]).unwrap_or_else(|| "Unknown Author".to_string()),
        date_featured: text_field(fields, &["date_featured", "dateFeatured"]).unwrap_or_default(),
        poem_text: text_field(fields, &["poem_text", "poemText"]),
    })
}

fn text_field(fields: &Map<String, Value>, names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| fields.get(*name).and_then(Value::as_str))
        .map(str::to_string)
}

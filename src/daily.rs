//! Today's poem with a network → cache → built-in fallback chain.

use std::sync::Arc;

use crate::api::PoetryApi;
use crate::context::Context;
use crate::model::{DailyPoem, sample_daily_poem};
use crate::store::{KeyValueStore, StorageKey, read_json, write_json};

/// Result of [`PoemGateway::get_today`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyFetch {
    pub poem: DailyPoem,
    /// False only when the poem came straight from the network.
    pub from_cache: bool,
}

/// Fetches today's poem and never fails.
#[derive(Clone)]
pub struct PoemGateway {
    api: PoetryApi,
    store: Arc<dyn KeyValueStore>,
}

impl PoemGateway {
    #[must_use]
    pub fn new(ctx: &Context, api: PoetryApi) -> Self {
        Self {
            api,
            store: Arc::clone(ctx.store()),
        }
    }

    /// Returns today's poem.
    ///
    /// One network attempt; on any failure the last cached poem is returned,
    /// and when nothing is cached the built-in sample is persisted and returned.
    pub async fn get_today(&self) -> DailyFetch {
        match self.api.fetch_daily().await {
            Ok(poem) => {
                if let Err(e) = write_json(self.store.as_ref(), StorageKey::CachedDaily, &poem) {
                    log::warn!("Failed to cache daily poem: {e}");
                }
                DailyFetch {
                    poem,
                    from_cache: false,
                }
            }
            Err(e) => {
                log::warn!("Daily poem unavailable from network: {e}");
                self.fallback()
            }
        }
    }

    /// Returns the cached poem without touching the network.
    #[must_use]
    pub fn cached(&self) -> Option<DailyPoem> {
        read_json(self.store.as_ref(), StorageKey::CachedDaily)
    }

    fn fallback(&self) -> DailyFetch {
        if let Some(poem) = self.cached() {
            log::info!("Serving cached poem for {}", poem.date);
            return DailyFetch {
                poem,
                from_cache: true,
            };
        }

        log::info!("No cached poem, serving built-in sample");
        let poem = sample_daily_poem();
        if let Err(e) = write_json(self.store.as_ref(), StorageKey::CachedDaily, &poem) {
            log::warn!("Failed to cache sample poem: {e}");
        }
        DailyFetch {
            poem,
            from_cache: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::model::{Author, Poem};
    use crate::store::MemoryStore;
    use crate::transport::testing::ScriptedTransport;
    use serde_json::{Value, json};

    const DAILY: &str = "GET /v1/daily";

    fn gateway(transport: &Arc<ScriptedTransport>) -> (PoemGateway, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let ctx = Context::new(AppConfig::new(), store.clone(), transport.clone());
        (PoemGateway::new(&ctx, PoetryApi::new(&ctx)), store)
    }

    fn poem_for(date: &str) -> DailyPoem {
        DailyPoem {
            date: date.to_string(),
            poem: Poem {
                id: format!("poem-{date}"),
                title: "Title".to_string(),
                text: "line".to_string(),
                line_count: 1,
            },
            author: Author {
                id: "a".to_string(),
                name: "Author".to_string(),
                short_bio: String::new(),
                image_url: None,
            },
        }
    }

    #[tokio::test]
    async fn network_success_is_cached() {
        let transport = Arc::new(ScriptedTransport::new());
        let today = poem_for("2026-10-16");
        transport.reply(DAILY, 200, &serde_json::to_string(&today).unwrap());
        let (gateway, _) = gateway(&transport);

        let fetch = gateway.get_today().await;
        assert_eq!(fetch.poem, today);
        assert!(!fetch.from_cache);
        assert_eq!(gateway.cached(), Some(today));
    }

    #[tokio::test]
    async fn server_error_without_cache_returns_sample() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply(DAILY, 500, "boom");
        let (gateway, _) = gateway(&transport);

        let fetch = gateway.get_today().await;
        assert_eq!(fetch.poem, sample_daily_poem());
        assert!(fetch.from_cache);
        assert_eq!(gateway.cached(), Some(sample_daily_poem()));
    }

    #[tokio::test]
    async fn offline_serves_last_cached_poem() {
        let transport = Arc::new(ScriptedTransport::new());
        let yesterday = poem_for("2026-10-15");
        let (gateway, store) = gateway(&transport);
        write_json(store.as_ref(), StorageKey::CachedDaily, &yesterday).unwrap();
        transport.offline(DAILY);

        let fetch = gateway.get_today().await;
        assert_eq!(fetch.poem, yesterday);
        assert!(fetch.from_cache);
    }

    #[tokio::test]
    async fn malformed_body_falls_back() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply(DAILY, 200, r#"{"date":"2026-10-16"}"#);
        let (gateway, _) = gateway(&transport);

        let fetch = gateway.get_today().await;
        assert!(fetch.from_cache);
        assert_eq!(fetch.poem, sample_daily_poem());
    }

    #[tokio::test]
    async fn corrupt_cache_is_replaced_by_sample() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.offline(DAILY);
        let (gateway, store) = gateway(&transport);
        store
            .set(StorageKey::CachedDaily.as_str(), "{truncated")
            .unwrap();

        let fetch = gateway.get_today().await;
        assert_eq!(fetch.poem, sample_daily_poem());
        assert_eq!(gateway.cached(), Some(sample_daily_poem()));
    }

    #[tokio::test]
    async fn near_valid_payloads() {
        let today = poem_for("2026-10-16");
        let valid = serde_json::to_value(&today).unwrap();

        let mut missing_author = valid.clone();
        missing_author.as_object_mut().unwrap().remove("author");
        let mut string_linecount = valid.clone();
        string_linecount["poem"]["linecount"] = json!("1");
        let mut no_image = valid.clone();
        no_image["author"].as_object_mut().unwrap().remove("image_url");

        for (body, fresh) in [(missing_author, false), (string_linecount, false), (no_image, true)] {
            let transport = Arc::new(ScriptedTransport::new());
            transport.reply(DAILY, 200, &body.to_string());
            let (gateway, _) = gateway(&transport);

            let fetch = gateway.get_today().await;
            if fresh {
                assert_eq!(fetch, DailyFetch { poem: today.clone(), from_cache: false });
            } else {
                assert_eq!(fetch, DailyFetch { poem: sample_daily_poem(), from_cache: true });
            }
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        const FIELDS: &[&str] = &[
            "/date",
            "/poem",
            "/author",
            "/poem/id",
            "/poem/title",
            "/poem/text",
            "/poem/linecount",
            "/author/id",
            "/author/name",
            "/author/bio_short",
            "/author/image_url",
        ];

        /// Drops or retypes the field at `pointer`.
        fn mutate(value: &mut Value, pointer: &str, kind: usize) {
            let (parent, key) = pointer.rsplit_once('/').unwrap();
            let Some(object) = value.pointer_mut(parent).and_then(Value::as_object_mut) else {
                return;
            };
            match kind {
                0 => {
                    object.remove(key);
                }
                1 => {
                    object.insert(key.to_string(), json!(7));
                }
                2 => {
                    object.insert(key.to_string(), json!("7"));
                }
                3 => {
                    object.insert(key.to_string(), Value::Null);
                }
                4 => {
                    let original = object.remove(key).unwrap_or(Value::Null);
                    object.insert(key.to_string(), json!({ "value": original }));
                }
                _ => {
                    object.insert(key.to_string(), json!(""));
                }
            }
        }

        proptest! {
            #[test]
            fn mutated_payload_is_parsed_or_replaced(field in 0..FIELDS.len(), kind in 0usize..6) {
                let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
                let mut body = serde_json::to_value(poem_for("2026-10-16")).unwrap();
                mutate(&mut body, FIELDS[field], kind);
                let parsed = serde_json::from_value::<DailyPoem>(body.clone()).ok();

                let transport = Arc::new(ScriptedTransport::new());
                transport.reply(DAILY, 200, &body.to_string());
                let (gateway, _) = gateway(&transport);
                let fetch = runtime.block_on(gateway.get_today());

                match parsed {
                    Some(poem) => prop_assert_eq!(fetch, DailyFetch { poem, from_cache: false }),
                    None => prop_assert_eq!(
                        fetch,
                        DailyFetch { poem: sample_daily_poem(), from_cache: true }
                    ),
                }
            }

            #[test]
            fn any_body_yields_a_poem(status in 100u16..600, body in ".*") {
                let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
                let transport = Arc::new(ScriptedTransport::new());
                transport.reply(DAILY, status, &body);
                let (gateway, _) = gateway(&transport);

                let fetch = runtime.block_on(gateway.get_today());
                prop_assert!(!fetch.poem.date.is_empty());
                if fetch.from_cache {
                    prop_assert_eq!(fetch.poem, sample_daily_poem());
                }
            }
        }
    }
}

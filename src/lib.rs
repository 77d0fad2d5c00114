//! daily-poetry - client core for the Daily Poetry service.
//!
//! Fetches the poem of the day with offline fallbacks, keeps a favourites list
//! in sync with the service, manages daily reminder subscriptions, and provides
//! the offline cache worker. Independent of any UI.
//!
//! # Example
//!
//! ```no_run
//! use daily_poetry::{AppConfig, Context, PoemGateway, PoetryApi};
//!
//! # async fn example() -> daily_poetry::Result<()> {
//! let config = AppConfig::load_or_create(&AppConfig::default_path())?;
//! let ctx = Context::from_config(config)?;
//! let gateway = PoemGateway::new(&ctx, PoetryApi::new(&ctx));
//!
//! let today = gateway.get_today().await;
//! println!("{} by {}", today.poem.poem.title, today.poem.author.name);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod credential;
pub mod daily;
pub mod error;
pub mod favourites;
pub mod format;
pub mod model;
pub mod notifications;
pub mod store;
pub mod transport;
pub mod worker;

// Re-export main types for convenience
pub use api::PoetryApi;
pub use auth::TokenProvider;
pub use config::AppConfig;
pub use context::Context;
pub use daily::{DailyFetch, PoemGateway};
pub use error::{Error, Result};
pub use favourites::{FavouritesSync, LoadOutcome, ToggleOutcome};
pub use model::{
    Author, DailyPoem, FavouriteEntry, FavouritesSource, NotificationPreference, Poem,
    PushSubscriptionRecord, Theme,
};
pub use notifications::{NotificationManager, NotificationState, PushPlatform};
pub use store::{FileStore, KeyValueStore, MemoryStore, StorageKey};
pub use transport::{HttpTransport, ReqwestTransport};
pub use worker::CacheWorker;

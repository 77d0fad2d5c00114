//! Bearer token provisioning.
//!
//! The token is read from the store, then from static configuration. When
//! neither exists an anonymous token is issued by the service and persisted.
//! Issuance is single-flight: concurrent callers wait for the first issuance
//! and then reuse its token.

use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::Mutex;

use crate::context::Context;
use crate::credential;
use crate::error::{Error, Result};
use crate::store::{KeyValueStore, StorageKey};
use crate::transport::{ApiRequest, HttpTransport};

pub(crate) const ANONYMOUS_ENDPOINT: &str = "/v1/auth/anonymous";

#[derive(Debug, Deserialize)]
struct AnonymousAuth {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    token: Option<String>,
}

/// Lazily obtains and persists the bearer token.
pub struct TokenProvider {
    store: Arc<dyn KeyValueStore>,
    transport: Arc<dyn HttpTransport>,
    static_token: Option<String>,
    issuing: Mutex<()>,
}

impl TokenProvider {
    #[must_use]
    pub fn new(ctx: &Context) -> Self {
        Self {
            store: Arc::clone(ctx.store()),
            transport: Arc::clone(ctx.transport()),
            static_token: ctx
                .config()
                .api
                .auth_token
                .clone()
                .filter(|t| !t.trim().is_empty()),
            issuing: Mutex::new(()),
        }
    }

    fn stored_token(&self) -> Option<String> {
        match self.store.get(StorageKey::AuthToken.as_str()) {
            Ok(Some(raw)) => credential::open(&raw),
            Ok(None) => None,
            Err(e) => {
                log::warn!("Failed to read stored auth token: {e}");
                None
            }
        }
    }

    /// Returns the token that would be used right now, without issuing one.
    #[must_use]
    pub fn current(&self) -> Option<String> {
        self.stored_token().or_else(|| self.static_token.clone())
    }

    /// Returns a usable token, issuing an anonymous one if none is known.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthUnavailable`] when no token is stored or
    /// configured and anonymous issuance fails.
    pub async fn ensure_token(&self) -> Result<String> {
        if let Some(token) = self.current() {
            return Ok(token);
        }

        let _issuing = self.issuing.lock().await;
        // Another caller may have issued while we waited.
        if let Some(token) = self.current() {
            return Ok(token);
        }
        self.issue().await
    }

    /// Discards `rejected` and issues a replacement.
    ///
    /// If the stored token already differs from `rejected`, a concurrent
    /// caller has reissued and that token is returned instead.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthUnavailable`] when issuance fails.
    pub async fn reissue(&self, rejected: &str) -> Result<String> {
        let _issuing = self.issuing.lock().await;
        if let Some(token) = self.stored_token().filter(|t| t != rejected) {
            return Ok(token);
        }
        if let Err(e) = self.store.remove(StorageKey::AuthToken.as_str()) {
            log::warn!("Failed to discard rejected auth token: {e}");
        }
        self.issue().await
    }

    async fn issue(&self) -> Result<String> {
        log::info!("Requesting anonymous auth token");
        let response = self
            .transport
            .send(ApiRequest::post(ANONYMOUS_ENDPOINT))
            .await
            .map_err(|e| Error::AuthUnavailable(e.to_string()))?
            .ensure_success(ANONYMOUS_ENDPOINT)
            .map_err(|e| Error::AuthUnavailable(e.to_string()))?;

        let issued: AnonymousAuth = response
            .json()
            .map_err(|e| Error::AuthUnavailable(e.to_string()))?;
        let token = issued
            .token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::AuthUnavailable("response did not include a token".to_string()))?;

        // Last write wins if two processes race here.
        if let Err(e) = self
            .store
            .set(StorageKey::AuthToken.as_str(), &credential::seal(&token))
        {
            log::warn!("Issued auth token could not be persisted: {e}");
        }
        log::info!(
            "Anonymous auth token issued for user {}",
            issued.user_id.as_deref().unwrap_or("unknown")
        );
        Ok(token)
    }
}

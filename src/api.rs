//! Typed client for the poetry API endpoints.

use std::sync::Arc;

use serde_json::json;

use crate::auth::TokenProvider;
use crate::context::Context;
use crate::error::Result;
use crate::favourites::normalize_favourites;
use crate::model::{DailyPoem, FavouriteEntry, NotificationPreference, PushSubscriptionRecord};
use crate::transport::{ApiRequest, ApiResponse, HttpTransport};

pub const DAILY_ENDPOINT: &str = "/v1/daily";
pub const FAVOURITES_ENDPOINT: &str = "/v1/me/favourites";
pub const PREFERENCES_ENDPOINT: &str = "/v1/me/notifications/preferences";
pub const SUBSCRIPTIONS_ENDPOINT: &str = "/v1/me/notifications/subscriptions";

/// One call per endpoint; authenticated calls carry the bearer token.
#[derive(Clone)]
pub struct PoetryApi {
    transport: Arc<dyn HttpTransport>,
    auth: Arc<TokenProvider>,
}

impl PoetryApi {
    #[must_use]
    pub fn new(ctx: &Context) -> Self {
        Self::with_auth(ctx, Arc::new(TokenProvider::new(ctx)))
    }

    /// Shares an existing token provider.
    #[must_use]
    pub fn with_auth(ctx: &Context, auth: Arc<TokenProvider>) -> Self {
        Self {
            transport: Arc::clone(ctx.transport()),
            auth,
        }
    }

    #[must_use]
    pub const fn auth(&self) -> &Arc<TokenProvider> {
        &self.auth
    }

    /// Sends an authenticated request, reissuing the token once on 401.
    async fn send_authorized(
        &self,
        endpoint: &str,
        build: impl Fn() -> ApiRequest + Send + Sync,
    ) -> Result<ApiResponse> {
        let token = self.auth.ensure_token().await?;
        let response = self.transport.send(build().with_bearer(&token)).await?;
        if response.status != 401 {
            return response.ensure_success(endpoint);
        }

        log::warn!("{endpoint} rejected the bearer token, reissuing");
        let token = self.auth.reissue(&token).await?;
        self.transport
            .send(build().with_bearer(&token))
            .await?
            .ensure_success(endpoint)
    }

    /// Fetches today's poem. No fallback here; see [`crate::daily::PoemGateway`].
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, a non-2xx status or an unparsable body.
    pub async fn fetch_daily(&self) -> Result<DailyPoem> {
        self.transport
            .send(ApiRequest::get(DAILY_ENDPOINT))
            .await?
            .ensure_success(DAILY_ENDPOINT)?
            .json()
    }

    /// Lists the user's favourites, accepting either response shape.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is available, the call fails or the body is not JSON.
    pub async fn list_favourites(&self) -> Result<Vec<FavouriteEntry>> {
        let response = self
            .send_authorized(FAVOURITES_ENDPOINT, || ApiRequest::get(FAVOURITES_ENDPOINT))
            .await?;
        let payload: serde_json::Value = response.json()?;
        Ok(normalize_favourites(&payload))
    }

    /// Adds a favourite.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is available or the service rejects the call.
    pub async fn add_favourite(&self, poem_id: &str) -> Result<()> {
        self.send_authorized(FAVOURITES_ENDPOINT, || {
            ApiRequest::post(FAVOURITES_ENDPOINT).with_json(json!({ "poem_id": poem_id }))
        })
        .await
        .map(drop)
    }

    /// Removes a favourite.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is available or the service rejects the call.
    pub async fn remove_favourite(&self, poem_id: &str) -> Result<()> {
        let path = favourite_path(poem_id);
        self.send_authorized(FAVOURITES_ENDPOINT, || ApiRequest::delete(path.clone()))
            .await
            .map(drop)
    }

    /// Reads the reminder preference.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the body is not a preference.
    pub async fn notification_preference(&self) -> Result<NotificationPreference> {
        self.send_authorized(PREFERENCES_ENDPOINT, || ApiRequest::get(PREFERENCES_ENDPOINT))
            .await?
            .json()
    }

    /// Writes the reminder preference and returns the stored version.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the body is not a preference.
    pub async fn update_notification_preference(
        &self,
        preference: &NotificationPreference,
    ) -> Result<NotificationPreference> {
        let body = serde_json::to_value(preference)?;
        self.send_authorized(PREFERENCES_ENDPOINT, || {
            ApiRequest::put(PREFERENCES_ENDPOINT).with_json(body.clone())
        })
        .await?
        .json()
    }

    /// Registers a push endpoint with the service.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn register_subscription(&self, subscription: &PushSubscriptionRecord) -> Result<()> {
        let body = serde_json::to_value(subscription)?;
        self.send_authorized(SUBSCRIPTIONS_ENDPOINT, || {
            ApiRequest::post(SUBSCRIPTIONS_ENDPOINT).with_json(body.clone())
        })
        .await
        .map(drop)
    }

    /// Unregisters a push endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn unregister_subscription(&self, endpoint: &str) -> Result<()> {
        self.send_authorized(SUBSCRIPTIONS_ENDPOINT, || {
            ApiRequest::delete(SUBSCRIPTIONS_ENDPOINT).with_json(json!({ "endpoint": endpoint }))
        })
        .await
        .map(drop)
    }
}

/// Path of one favourite, with the id percent-encoded as a single segment.
fn favourite_path(poem_id: &str) -> String {
    format!("{FAVOURITES_ENDPOINT}/{}", urlencoding::encode(poem_id))
}

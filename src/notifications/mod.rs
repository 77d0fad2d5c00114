//! Daily reminder subscription state machine.
//!
//! Enabling walks permission → platform subscription → server registration →
//! preference update. Every failure is surfaced; nothing is rolled back, so a
//! device that subscribed but could not register stays visibly in `Error`.

mod platform;

use std::sync::{Mutex, MutexGuard};

pub use platform::{
    Capabilities, Permission, PushPlatform, UnsupportedPlatform, decode_application_server_key,
};

use crate::api::PoetryApi;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::model::NotificationPreference;

/// Where the reminder subscription stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationState {
    /// The platform cannot deliver push notifications; permanent.
    Unsupported,
    Disabled,
    Enabling,
    Enabled,
    Disabling,
    Error(String),
}

impl NotificationState {
    /// True while an enable or disable flow is running.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        matches!(self, Self::Enabling | Self::Disabling)
    }
}

#[derive(Debug)]
struct Inner {
    state: NotificationState,
    preference: NotificationPreference,
    last_error: Option<String>,
}

/// Coordinates platform permission, push subscription and the server preference.
pub struct NotificationManager<P: PushPlatform> {
    api: PoetryApi,
    platform: P,
    vapid_public_key: String,
    inner: Mutex<Inner>,
}

impl<P: PushPlatform> NotificationManager<P> {
    /// Creates the manager; capability detection happens here.
    #[must_use]
    pub fn new(ctx: &Context, api: PoetryApi, platform: P) -> Self {
        let supported = platform.capabilities().is_supported();
        let preference = NotificationPreference::disabled_in(platform.time_zone());
        if !supported {
            log::info!("Push notifications unsupported on this platform");
        }
        Self {
            api,
            platform,
            vapid_public_key: ctx.config().notifications.vapid_public_key.trim().to_string(),
            inner: Mutex::new(Inner {
                state: if supported {
                    NotificationState::Disabled
                } else {
                    NotificationState::Unsupported
                },
                preference,
                last_error: None,
            }),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    #[must_use]
    pub fn state(&self) -> NotificationState {
        self.inner().state.clone()
    }

    /// The last preference loaded from or accepted by the server.
    #[must_use]
    pub fn preference(&self) -> NotificationPreference {
        self.inner().preference.clone()
    }

    /// Message of the most recent failure, cleared when a flow starts.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.inner().last_error.clone()
    }

    fn is_unsupported(&self) -> bool {
        self.inner().state == NotificationState::Unsupported
    }

    /// Loads the server preference and derives the state from it.
    ///
    /// On unsupported platforms the preference is still read, but the state
    /// stays `Unsupported`.
    pub async fn load(&self) -> NotificationState {
        let unsupported = self.is_unsupported();
        match self.api.notification_preference().await {
            Ok(preference) => {
                let mut inner = self.inner();
                if !unsupported {
                    inner.state = if preference.enabled {
                        NotificationState::Enabled
                    } else {
                        NotificationState::Disabled
                    };
                }
                inner.preference = preference;
                inner.last_error = None;
                inner.state.clone()
            }
            Err(e) => {
                log::warn!("Failed to load notification preferences: {e}");
                let mut inner = self.inner();
                if !unsupported {
                    inner.state = NotificationState::Error(e.to_string());
                }
                inner.last_error = Some(e.to_string());
                inner.state.clone()
            }
        }
    }

    /// Enables reminders if the last-loaded preference is off, otherwise disables them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PlatformUnsupported`] on unsupported platforms, or the
    /// error of the failing step.
    pub async fn toggle(&self) -> Result<NotificationPreference> {
        if self.is_unsupported() {
            return Err(Error::PlatformUnsupported);
        }
        if self.preference().enabled {
            self.disable().await
        } else {
            self.enable().await
        }
    }

    /// Runs the enable flow. Failures leave the state in `Error`.
    ///
    /// # Errors
    ///
    /// Returns the error of the failing step.
    pub async fn enable(&self) -> Result<NotificationPreference> {
        if self.is_unsupported() {
            return Err(Error::PlatformUnsupported);
        }
        self.begin(NotificationState::Enabling);

        match self.run_enable().await {
            Ok(preference) => {
                log::info!(
                    "Daily reminders enabled at {:02}:00 {}",
                    preference.local_hour,
                    preference.time_zone
                );
                let mut inner = self.inner();
                inner.state = NotificationState::Enabled;
                inner.preference = preference.clone();
                Ok(preference)
            }
            Err(e) => {
                log::error!("Enabling notifications failed: {e}");
                let mut inner = self.inner();
                inner.state = NotificationState::Error(e.to_string());
                inner.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn run_enable(&self) -> Result<NotificationPreference> {
        if self.vapid_public_key.is_empty() {
            return Err(Error::NotConfigured(
                "Notifications are not configured for this environment.".to_string(),
            ));
        }

        if self.platform.request_permission().await != Permission::Granted {
            return Err(Error::PermissionDenied);
        }

        let subscription = match self.platform.current_subscription().await? {
            Some(existing) => existing,
            None => {
                let key = decode_application_server_key(&self.vapid_public_key)?;
                self.platform.subscribe(&key).await?
            }
        };

        self.api.register_subscription(&subscription).await?;

        let current = self.preference();
        let requested = NotificationPreference {
            enabled: true,
            time_zone: self
                .platform
                .time_zone()
                .filter(|z| !z.trim().is_empty())
                .unwrap_or(current.time_zone),
            local_hour: current.local_hour,
        };
        self.api.update_notification_preference(&requested).await
    }

    /// Runs the disable flow. Failures restore the previous state.
    ///
    /// # Errors
    ///
    /// Returns the error of the failing step.
    pub async fn disable(&self) -> Result<NotificationPreference> {
        if self.is_unsupported() {
            return Err(Error::PlatformUnsupported);
        }
        let previous = self.begin(NotificationState::Disabling);

        match self.run_disable().await {
            Ok(preference) => {
                log::info!("Daily reminders disabled");
                let mut inner = self.inner();
                inner.state = NotificationState::Disabled;
                inner.preference = preference.clone();
                Ok(preference)
            }
            Err(e) => {
                log::error!("Disabling notifications failed: {e}");
                let mut inner = self.inner();
                inner.state = previous;
                inner.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn run_disable(&self) -> Result<NotificationPreference> {
        if let Some(subscription) = self.platform.current_subscription().await? {
            self.api
                .unregister_subscription(&subscription.endpoint)
                .await?;
            self.platform.unsubscribe(&subscription).await?;
        }

        let current = self.preference();
        let requested = NotificationPreference {
            enabled: false,
            ..current
        };
        self.api.update_notification_preference(&requested).await
    }

    /// Moves the reminder to `hour` (0–23), keeping the enabled flag and zone.
    ///
    /// This only touches the server preference, so it works on unsupported
    /// platforms too. Call [`Self::load`] first to keep the server's other fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for hours past 23, or the service error.
    pub async fn set_reminder_hour(&self, hour: u8) -> Result<NotificationPreference> {
        if hour > 23 {
            return Err(Error::InvalidInput(format!("hour {hour} is not in 0-23")));
        }
        let requested = NotificationPreference {
            local_hour: hour,
            ..self.preference()
        };
        let accepted = self.api.update_notification_preference(&requested).await?;
        self.inner().preference = accepted.clone();
        Ok(accepted)
    }

    /// Enters a transitional state and returns the one it replaced.
    fn begin(&self, next: NotificationState) -> NotificationState {
        let mut inner = self.inner();
        inner.last_error = None;
        std::mem::replace(&mut inner.state, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::config::AppConfig;
    use crate::model::{PushSubscriptionRecord, SubscriptionKeys};
    use crate::store::MemoryStore;
    use crate::transport::ApiResponse;
    use crate::transport::testing::ScriptedTransport;

    const PREFS_GET: &str = "GET /v1/me/notifications/preferences";
    const PREFS_PUT: &str = "PUT /v1/me/notifications/preferences";
    const SUB_POST: &str = "POST /v1/me/notifications/subscriptions";
    const SUB_DELETE: &str = "DELETE /v1/me/notifications/subscriptions";
    const VAPID: &str = "BEl62iUYgUivxIkv69yViEuiBIa-Ib9-SkvMeAtA3LFgDzkrxZJjSgSnfckjBJuBkr3qBUYIHBQFLXYp5Nksh8U";

    struct FakePlatform {
        supported: bool,
        permission: Permission,
        existing: Mutex<Option<PushSubscriptionRecord>>,
        fail_subscribe: bool,
        subscribes: AtomicUsize,
        unsubscribes: AtomicUsize,
    }

    impl FakePlatform {
        fn granting() -> Self {
            Self {
                supported: true,
                permission: Permission::Granted,
                existing: Mutex::new(None),
                fail_subscribe: false,
                subscribes: AtomicUsize::new(0),
                unsubscribes: AtomicUsize::new(0),
            }
        }
    }

    fn record() -> PushSubscriptionRecord {
        PushSubscriptionRecord {
            endpoint: "https://push.example/sub/1".to_string(),
            keys: SubscriptionKeys {
                p256dh: "cDI1NmRo".to_string(),
                auth: "YXV0aA==".to_string(),
            },
        }
    }

    #[async_trait]
    impl PushPlatform for FakePlatform {
        fn capabilities(&self) -> Capabilities {
            Capabilities {
                notifications: self.supported,
                push_manager: self.supported,
                background_worker: self.supported,
            }
        }

        fn time_zone(&self) -> Option<String> {
            Some("Europe/Dublin".to_string())
        }

        async fn request_permission(&self) -> Permission {
            self.permission
        }

        async fn current_subscription(&self) -> Result<Option<PushSubscriptionRecord>> {
            Ok(self.existing.lock().unwrap().clone())
        }

        async fn subscribe(&self, key: &[u8]) -> Result<PushSubscriptionRecord> {
            assert_eq!(key.len(), 65);
            self.subscribes.fetch_add(1, Ordering::SeqCst);
            if self.fail_subscribe {
                return Err(Error::InvalidInput("push service refused".to_string()));
            }
            *self.existing.lock().unwrap() = Some(record());
            Ok(record())
        }

        async fn unsubscribe(&self, _subscription: &PushSubscriptionRecord) -> Result<()> {
            self.unsubscribes.fetch_add(1, Ordering::SeqCst);
            *self.existing.lock().unwrap() = None;
            Ok(())
        }
    }

    fn manager(
        transport: &Arc<ScriptedTransport>,
        platform: FakePlatform,
        vapid: &str,
    ) -> NotificationManager<FakePlatform> {
        let ctx = Context::new(
            AppConfig::new()
                .with_auth_token(Some("tok".to_string()))
                .with_vapid_public_key(vapid),
            Arc::new(MemoryStore::new()),
            transport.clone(),
        );
        NotificationManager::new(&ctx, PoetryApi::new(&ctx), platform)
    }

    fn echo_preference(transport: &ScriptedTransport) {
        transport.on(PREFS_PUT, |request| {
            Ok(ApiResponse::new(
                200,
                serde_json::to_vec(request.body.as_ref().unwrap()).unwrap(),
            ))
        });
    }

    #[tokio::test]
    async fn unsupported_platform_is_pinned() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply(PREFS_GET, 500, "");
        let platform = FakePlatform {
            supported: false,
            ..FakePlatform::granting()
        };
        let manager = manager(&transport, platform, VAPID);

        assert_eq!(manager.state(), NotificationState::Unsupported);
        assert_eq!(manager.load().await, NotificationState::Unsupported);
        assert!(manager.last_error().is_some());
        assert!(matches!(
            manager.toggle().await,
            Err(Error::PlatformUnsupported)
        ));
        assert!(matches!(
            manager.enable().await,
            Err(Error::PlatformUnsupported)
        ));
        assert_eq!(manager.state(), NotificationState::Unsupported);
        assert_eq!(manager.platform.subscribes.load(Ordering::SeqCst), 0);
        assert_eq!(transport.count(SUB_POST), 0);
    }

    #[tokio::test]
    async fn unsupported_platform_reads_preference_and_moves_hour() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply(
            PREFS_GET,
            200,
            r#"{"enabled":true,"time_zone":"Asia/Tokyo","local_hour":7}"#,
        );
        echo_preference(&transport);
        let platform = FakePlatform {
            supported: false,
            ..FakePlatform::granting()
        };
        let manager = manager(&transport, platform, VAPID);

        assert_eq!(manager.load().await, NotificationState::Unsupported);
        assert_eq!(
            manager.preference(),
            NotificationPreference {
                enabled: true,
                time_zone: "Asia/Tokyo".to_string(),
                local_hour: 7,
            }
        );

        let moved = manager.set_reminder_hour(8).await.unwrap();
        assert!(moved.enabled);
        assert_eq!(moved.time_zone, "Asia/Tokyo");
        assert_eq!(moved.local_hour, 8);
        assert_eq!(manager.state(), NotificationState::Unsupported);
    }

    #[tokio::test]
    async fn load_derives_state_from_preference() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply(
            PREFS_GET,
            200,
            r#"{"enabled":true,"time_zone":"Asia/Tokyo","local_hour":7}"#,
        );
        let manager = manager(&transport, FakePlatform::granting(), VAPID);

        assert_eq!(manager.load().await, NotificationState::Enabled);
        assert_eq!(manager.preference().local_hour, 7);
    }

    #[tokio::test]
    async fn load_failure_is_error_state() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply(PREFS_GET, 500, "");
        let manager = manager(&transport, FakePlatform::granting(), VAPID);

        assert!(matches!(manager.load().await, NotificationState::Error(_)));
        assert!(!manager.preference().enabled);
    }

    #[tokio::test]
    async fn enable_happy_path() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply(SUB_POST, 201, r#"{"subscription_id":"s1"}"#);
        echo_preference(&transport);
        let manager = manager(&transport, FakePlatform::granting(), VAPID);

        let preference = manager.toggle().await.unwrap();
        assert!(preference.enabled);
        assert_eq!(preference.time_zone, "Europe/Dublin");
        assert_eq!(preference.local_hour, 9);
        assert_eq!(manager.state(), NotificationState::Enabled);

        let requests = transport.requests.lock().unwrap();
        let registered = requests
            .iter()
            .find(|r| r.path == "/v1/me/notifications/subscriptions")
            .unwrap();
        assert_eq!(
            registered.body.as_ref().unwrap()["endpoint"],
            "https://push.example/sub/1"
        );
        assert_eq!(registered.body.as_ref().unwrap()["keys"]["auth"], "YXV0aA==");
    }

    #[tokio::test]
    async fn permission_denied_has_no_side_effects() {
        let transport = Arc::new(ScriptedTransport::new());
        let platform = FakePlatform {
            permission: Permission::Default,
            ..FakePlatform::granting()
        };
        let manager = manager(&transport, platform, VAPID);

        assert!(matches!(manager.enable().await, Err(Error::PermissionDenied)));
        assert_eq!(
            manager.state(),
            NotificationState::Error("Notification permission was not granted.".to_string())
        );
        assert_eq!(manager.platform.subscribes.load(Ordering::SeqCst), 0);
        assert!(transport.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_vapid_key_is_not_configured() {
        let transport = Arc::new(ScriptedTransport::new());
        let manager = manager(&transport, FakePlatform::granting(), "");

        assert!(matches!(manager.enable().await, Err(Error::NotConfigured(_))));
        assert!(matches!(manager.state(), NotificationState::Error(_)));
    }

    #[tokio::test]
    async fn registration_failure_keeps_preference_disabled() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply(SUB_POST, 500, "");
        let manager = manager(&transport, FakePlatform::granting(), VAPID);

        let err = manager.toggle().await.unwrap_err();
        assert!(matches!(err, Error::UpstreamRejected { status: 500, .. }));
        assert!(matches!(manager.state(), NotificationState::Error(_)));
        assert!(!manager.preference().enabled);
        // The platform subscription is not rolled back.
        assert!(manager.platform.existing.lock().unwrap().is_some());
        assert_eq!(transport.count(PREFS_PUT), 0);
        assert!(manager.last_error().is_some());
    }

    #[tokio::test]
    async fn subscribe_failure_is_error_state() {
        let transport = Arc::new(ScriptedTransport::new());
        let platform = FakePlatform {
            fail_subscribe: true,
            ..FakePlatform::granting()
        };
        let manager = manager(&transport, platform, VAPID);

        assert!(manager.enable().await.is_err());
        assert!(matches!(manager.state(), NotificationState::Error(_)));
        assert_eq!(transport.count(SUB_POST), 0);
    }

    #[tokio::test]
    async fn existing_subscription_is_reused() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply(SUB_POST, 201, "{}");
        echo_preference(&transport);
        let platform = FakePlatform::granting();
        *platform.existing.lock().unwrap() = Some(record());
        let manager = manager(&transport, platform, VAPID);

        manager.enable().await.unwrap();
        assert_eq!(manager.platform.subscribes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn error_state_can_retry_enable() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply(SUB_POST, 500, "").reply(SUB_POST, 201, "{}");
        echo_preference(&transport);
        let manager = manager(&transport, FakePlatform::granting(), VAPID);

        assert!(manager.toggle().await.is_err());
        assert!(manager.toggle().await.unwrap().enabled);
        assert_eq!(manager.state(), NotificationState::Enabled);
        assert!(manager.last_error().is_none());
    }

    #[tokio::test]
    async fn disable_unregisters_then_updates_preference() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply(SUB_POST, 201, "{}");
        transport.reply(SUB_DELETE, 204, "");
        echo_preference(&transport);
        let manager = manager(&transport, FakePlatform::granting(), VAPID);
        manager.enable().await.unwrap();

        let preference = manager.toggle().await.unwrap();
        assert!(!preference.enabled);
        assert_eq!(manager.state(), NotificationState::Disabled);
        assert_eq!(manager.platform.unsubscribes.load(Ordering::SeqCst), 1);
        assert_eq!(transport.count(SUB_DELETE), 1);
    }

    #[tokio::test]
    async fn disable_failure_leaves_state_enabled() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply(SUB_POST, 201, "{}");
        transport.reply(SUB_DELETE, 502, "");
        echo_preference(&transport);
        let manager = manager(&transport, FakePlatform::granting(), VAPID);
        manager.enable().await.unwrap();

        assert!(manager.disable().await.is_err());
        assert_eq!(manager.state(), NotificationState::Enabled);
        assert!(manager.preference().enabled);
        assert_eq!(manager.platform.unsubscribes.load(Ordering::SeqCst), 0);
        assert_eq!(
            manager.last_error().as_deref(),
            Some("/v1/me/notifications/subscriptions returned 502")
        );
    }

    #[tokio::test]
    async fn reminder_hour_is_validated_and_saved() {
        let transport = Arc::new(ScriptedTransport::new());
        echo_preference(&transport);
        let manager = manager(&transport, FakePlatform::granting(), VAPID);

        assert!(matches!(
            manager.set_reminder_hour(24).await,
            Err(Error::InvalidInput(_))
        ));
        let preference = manager.set_reminder_hour(21).await.unwrap();
        assert_eq!(preference.local_hour, 21);
        assert!(!preference.enabled);
        assert_eq!(manager.preference().local_hour, 21);
    }

    #[test]
    fn busy_states() {
        assert!(NotificationState::Enabling.is_busy());
        assert!(NotificationState::Disabling.is_busy());
        assert!(!NotificationState::Enabled.is_busy());
        assert!(!NotificationState::Error("x".to_string()).is_busy());
    }
}

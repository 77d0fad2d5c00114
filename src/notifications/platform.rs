//! Platform push and notification capabilities.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::error::{Error, Result};
use crate::model::PushSubscriptionRecord;

/// Answer to a notification permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    /// The user dismissed the prompt without choosing.
    Default,
}

/// Features the platform exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub notifications: bool,
    pub push_manager: bool,
    pub background_worker: bool,
}

impl Capabilities {
    /// All three are needed to deliver reminders.
    #[must_use]
    pub const fn is_supported(self) -> bool {
        self.notifications && self.push_manager && self.background_worker
    }
}

/// Permission prompts and push registration provided by the host platform.
#[async_trait]
pub trait PushPlatform: Send + Sync {
    fn capabilities(&self) -> Capabilities;

    /// IANA zone of the device, if known.
    fn time_zone(&self) -> Option<String>;

    async fn request_permission(&self) -> Permission;

    /// Returns the device's existing subscription, if any.
    async fn current_subscription(&self) -> Result<Option<PushSubscriptionRecord>>;

    /// Creates a subscription bound to `application_server_key`.
    async fn subscribe(&self, application_server_key: &[u8]) -> Result<PushSubscriptionRecord>;

    async fn unsubscribe(&self, subscription: &PushSubscriptionRecord) -> Result<()>;
}

/// Platform without push support, such as a terminal session.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedPlatform;

#[async_trait]
impl PushPlatform for UnsupportedPlatform {
    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    fn time_zone(&self) -> Option<String> {
        std::env::var("TZ").ok().filter(|z| !z.trim().is_empty())
    }

    async fn request_permission(&self) -> Permission {
        Permission::Denied
    }

    async fn current_subscription(&self) -> Result<Option<PushSubscriptionRecord>> {
        Ok(None)
    }

    async fn subscribe(&self, _application_server_key: &[u8]) -> Result<PushSubscriptionRecord> {
        Err(Error::PlatformUnsupported)
    }

    async fn unsubscribe(&self, _subscription: &PushSubscriptionRecord) -> Result<()> {
        Err(Error::PlatformUnsupported)
    }
}

/// Decodes a VAPID public key given as URL-safe base64, padded or not.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the key is empty or not base64.
pub fn decode_application_server_key(key: &str) -> Result<Vec<u8>> {
    let trimmed = key.trim().trim_end_matches('=');
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("empty VAPID public key".to_string()));
    }
    // Standard-alphabet keys are accepted too.
    let normalized: String = trimmed
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    URL_SAFE_NO_PAD
        .decode(normalized)
        .map_err(|e| Error::InvalidInput(format!("VAPID public key: {e}")))
}

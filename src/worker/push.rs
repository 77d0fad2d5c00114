//! Push payloads and notification clicks.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

pub const DEFAULT_TITLE: &str = "Daily Poetry";
pub const DEFAULT_BODY: &str = "Your poem for today is ready.";
pub const DEFAULT_URL: &str = "/";
/// Replaces any earlier reminder still on screen.
pub const NOTIFICATION_TAG: &str = "daily-poetry";

/// Fields read from a push message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    pub url: String,
}

impl Default for PushPayload {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            body: DEFAULT_BODY.to_string(),
            url: DEFAULT_URL.to_string(),
        }
    }
}

/// Parses a push message. Absent, non-JSON or non-object data yields the defaults,
/// as do missing or blank fields.
#[must_use]
pub fn parse_push_payload(data: Option<&[u8]>) -> PushPayload {
    let object = data
        .and_then(|raw| serde_json::from_slice::<Value>(raw).ok())
        .and_then(|value| match value {
            Value::Object(map) => Some(map),
            _ => None,
        });
    let Some(object) = object else {
        return PushPayload::default();
    };

    let field = |name: &str, default: &str| {
        object
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(default)
            .to_string()
    };
    PushPayload {
        title: field("title", DEFAULT_TITLE),
        body: field("body", DEFAULT_BODY),
        url: field("url", DEFAULT_URL),
    }
}

/// A notification to display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    pub title: String,
    pub body: String,
    pub tag: String,
    /// Opened when the notification is clicked.
    pub url: String,
}

impl From<PushPayload> for NotificationRequest {
    fn from(payload: PushPayload) -> Self {
        Self {
            title: payload.title,
            body: payload.body,
            tag: NOTIFICATION_TAG.to_string(),
            url: payload.url,
        }
    }
}

/// Where notifications are displayed.
#[async_trait]
pub trait NotificationSurface: Send + Sync {
    async fn show(&self, notification: &NotificationRequest) -> Result<()>;

    async fn close(&self, tag: &str) -> Result<()>;
}

/// An open application window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientWindow {
    pub id: String,
    pub url: String,
    pub focused: bool,
}

/// Open application windows.
#[async_trait]
pub trait ClientWindows: Send + Sync {
    async fn list(&self) -> Result<Vec<ClientWindow>>;

    async fn focus_and_navigate(&self, id: &str, url: &str) -> Result<()>;

    async fn open(&self, url: &str) -> Result<()>;
}

/// What a notification click did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    Focused(String),
    Opened,
}

/// Handles a push message by showing a notification.
///
/// # Errors
///
/// Returns an error if the surface cannot display it.
pub async fn on_push(
    surface: &dyn NotificationSurface,
    data: Option<&[u8]>,
) -> Result<NotificationRequest> {
    let notification = NotificationRequest::from(parse_push_payload(data));
    surface.show(&notification).await?;
    log::info!("Shown notification {:?}", notification.title);
    Ok(notification)
}

/// Handles a click: closes the notification, then focuses a window
/// (the focused one first) and navigates it, or opens a new one.
///
/// # Errors
///
/// Returns an error if the window cannot be focused or opened.
pub async fn on_notification_click(
    surface: &dyn NotificationSurface,
    windows: &dyn ClientWindows,
    notification: &NotificationRequest,
) -> Result<ClickOutcome> {
    if let Err(e) = surface.close(&notification.tag).await {
        log::warn!("Failed to close notification: {e}");
    }

    let clients = windows.list().await?;
    let target = clients
        .iter()
        .find(|w| w.focused)
        .or_else(|| clients.first());

    if let Some(window) = target {
        windows
            .focus_and_navigate(&window.id, &notification.url)
            .await?;
        return Ok(ClickOutcome::Focused(window.id.clone()));
    }

    windows.open(&notification.url).await?;
    Ok(ClickOutcome::Opened)
}

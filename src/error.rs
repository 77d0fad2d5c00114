//! Error types for the daily-poetry library.

use thiserror::Error;

/// Errors that can occur while talking to the poetry service or the local stores.
#[derive(Error, Debug)]
pub enum Error {
    /// The request never produced an HTTP response (DNS, connect, timeout).
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    /// The service answered with a non-2xx status.
    #[error("{endpoint} returned {status}")]
    UpstreamRejected {
        /// Path of the endpoint that rejected the call.
        endpoint: String,
        /// HTTP status code.
        status: u16,
    },

    /// A response body could not be parsed into the expected shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The platform refused notification permission.
    #[error("Notification permission was not granted.")]
    PermissionDenied,

    /// The platform lacks notification or push capabilities.
    #[error("Notifications are not supported on this platform.")]
    PlatformUnsupported,

    /// No stored token and anonymous issuance failed.
    #[error("Auth token unavailable: {0}")]
    AuthUnavailable(String),

    /// A required setting is missing from the configuration.
    #[error("Not configured: {0}")]
    NotConfigured(String),

    /// A caller-supplied value is out of range.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Network failed and the content cache holds no copy of the request.
    #[error("No network and no cached copy of {0}")]
    NoCachedCopy(String),

    /// The key-value store failed to read or write.
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration file could not be parsed or written.
    #[error("Config error: {0}")]
    Config(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true when the error came from a 401 response.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::UpstreamRejected { status: 401, .. })
    }

    /// Returns true for failures that mean the service could not be reached.
    #[must_use]
    pub const fn is_offline(&self) -> bool {
        matches!(self, Self::NetworkUnavailable(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::MalformedResponse(e.to_string())
    }
}

/// A specialized `Result` type for daily-poetry operations.
pub type Result<T> = std::result::Result<T, Error>;

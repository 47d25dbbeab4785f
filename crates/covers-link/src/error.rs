//! # Link Error Types
//!
//! Error types for everything that talks to the platform.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Link Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Platform API  │  │     Realtime            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Conflict (409) │  │  WebSocket              │ │
//! │  │  InvalidUrl     │  │  Transport      │  │  ConnectionFailed       │ │
//! │  │  ConfigLoad     │  │  NullResponse   │  │  Timeout                │ │
//! │  │  MissingHandler │  │  Serialization  │  │  ChannelError           │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────────────────────────────────┐  │
//! │  │     Domain      │  │     Settlement                              │  │
//! │  │                 │  │                                             │  │
//! │  │  CoreError from │  │  UnsupportedSettlement: bistro mode saw a   │  │
//! │  │  POS callbacks  │  │  remainder after requesting payment         │  │
//! │  └─────────────────┘  └─────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Conflict vs Transport
//! A 409 means another writer got there first with a newer version token.
//! The POS may re-fetch and try again. Every other API failure, including
//! network errors with no status at all, is a [`LinkError::Transport`].

use std::fmt;

use covers_core::{CoreError, Money};
use thiserror::Error;

use crate::protocol::EventKind;

/// Result type alias for link operations.
pub type LinkResult<T> = Result<T, LinkError>;

// =============================================================================
// API Error
// =============================================================================

/// Classified outcome of a failed platform request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    /// 409, optimistic-concurrency loss.
    Conflict,
    /// 456, the platform's "upstream rejected".
    UpstreamRejected,
    Server,
    /// No HTTP status at all (refused, reset, timed out).
    Network,
    Other,
}

impl ApiErrorKind {
    /// Maps an HTTP status to its kind.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => ApiErrorKind::BadRequest,
            401 => ApiErrorKind::Unauthorized,
            403 => ApiErrorKind::Forbidden,
            404 => ApiErrorKind::NotFound,
            409 => ApiErrorKind::Conflict,
            456 => ApiErrorKind::UpstreamRejected,
            500..=599 => ApiErrorKind::Server,
            _ => ApiErrorKind::Other,
        }
    }
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApiErrorKind::BadRequest => "bad request",
            ApiErrorKind::Unauthorized => "unauthorized",
            ApiErrorKind::Forbidden => "forbidden",
            ApiErrorKind::NotFound => "not found",
            ApiErrorKind::Conflict => "conflict",
            ApiErrorKind::UpstreamRejected => "upstream rejected",
            ApiErrorKind::Server => "server error",
            ApiErrorKind::Network => "network failure",
            ApiErrorKind::Other => "unexpected status",
        };
        f.write_str(name)
    }
}

/// A failed platform request.
///
/// `status` is `None` when the request never produced an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} ({}): {message}", status_label(.status))]
pub struct ApiError {
    pub status: Option<u16>,
    pub kind: ApiErrorKind,
    pub message: String,
}

fn status_label(status: &Option<u16>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "no status".to_string(),
    }
}

impl ApiError {
    /// Builds an error from an HTTP status and response body.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        ApiError {
            status: Some(status),
            kind: ApiErrorKind::from_status(status),
            message: message.into(),
        }
    }

    /// Builds an error for a request that never got a response.
    pub fn network(message: impl Into<String>) -> Self {
        ApiError {
            status: None,
            kind: ApiErrorKind::Network,
            message: message.into(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.kind == ApiErrorKind::Conflict
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ApiErrorKind::NotFound
    }
}

// =============================================================================
// Link Error
// =============================================================================

/// Everything a public link operation can fail with.
#[derive(Debug, Error)]
pub enum LinkError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid link configuration.
    #[error("Invalid link configuration: {0}")]
    InvalidConfig(String),

    /// Invalid platform or socket URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// An event kind had no subscriber when the channel was started.
    #[error("No handler registered for event '{0}'")]
    MissingHandler(EventKind),

    // =========================================================================
    // Platform API Errors
    // =========================================================================
    /// HTTP 409: the entity was modified by someone else.
    #[error("Version conflict: {0}")]
    Conflict(ApiError),

    /// Any other platform failure, including network errors.
    #[error("Platform request failed: {0}")]
    Transport(ApiError),

    /// A call that must return data returned an empty body.
    #[error("Platform returned no data for {0}")]
    NullResponse(String),

    /// Failed to encode or decode a payload.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    // =========================================================================
    // Domain Errors
    // =========================================================================
    /// A POS callback failed.
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// Bistro mode only supports single full settlement.
    #[error("Order {order_id} left a remainder of {remainder} in bistro mode")]
    UnsupportedSettlement { order_id: String, remainder: Money },

    // =========================================================================
    // Realtime Errors
    // =========================================================================
    /// Failed to establish the socket connection.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// WebSocket protocol error.
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Connection timeout.
    #[error("Connection timeout after {0} seconds")]
    Timeout(u64),

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// Agent is shutting down.
    #[error("Link agent is shutting down")]
    ShuttingDown,
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<ApiError> for LinkError {
    fn from(err: ApiError) -> Self {
        if err.is_conflict() {
            LinkError::Conflict(err)
        } else {
            LinkError::Transport(err)
        }
    }
}

impl From<covers_core::ValidationError> for LinkError {
    fn from(err: covers_core::ValidationError) -> Self {
        LinkError::Domain(CoreError::Validation(err))
    }
}

impl From<serde_json::Error> for LinkError {
    fn from(err: serde_json::Error) -> Self {
        LinkError::SerializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for LinkError {
    fn from(err: url::ParseError) -> Self {
        LinkError::InvalidUrl(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for LinkError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::Io(io) => LinkError::ConnectionFailed(io.to_string()),
            other => LinkError::WebSocketError(other.to_string()),
        }
    }
}

impl From<std::io::Error> for LinkError {
    fn from(err: std::io::Error) -> Self {
        LinkError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for LinkError {
    fn from(err: toml::de::Error) -> Self {
        LinkError::ConfigLoadFailed(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for LinkError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        LinkError::InvalidConfig(format!("cannot sign platform token: {err}"))
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl LinkError {
    /// True for HTTP 409 only.
    pub fn is_conflict(&self) -> bool {
        matches!(self, LinkError::Conflict(_))
    }

    /// True for HTTP 404 from the platform.
    pub fn is_not_found(&self) -> bool {
        matches!(self, LinkError::Transport(e) if e.is_not_found())
    }

    /// Returns the HTTP status behind an API failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            LinkError::Conflict(e) | LinkError::Transport(e) => e.status,
            _ => None,
        }
    }

    /// Returns true if the caller may re-fetch and try again.
    ///
    /// ## Retryable Errors
    /// - Version conflicts (after re-reading the entity)
    /// - Network failures and 5xx
    /// - Socket connection problems
    ///
    /// ## Non-Retryable Errors
    /// - Configuration errors
    /// - 4xx other than 409
    /// - Bistro settlement with a remainder
    pub fn is_retryable(&self) -> bool {
        match self {
            LinkError::Conflict(_) => true,
            LinkError::Transport(e) => {
                matches!(e.kind, ApiErrorKind::Network | ApiErrorKind::Server)
            }
            LinkError::ConnectionFailed(_)
            | LinkError::WebSocketError(_)
            | LinkError::Timeout(_) => true,
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            LinkError::InvalidConfig(_)
                | LinkError::InvalidUrl(_)
                | LinkError::ConfigLoadFailed(_)
                | LinkError::MissingHandler(_)
        )
    }
}

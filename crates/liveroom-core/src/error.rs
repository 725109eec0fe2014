// ── Core error types ──
//
// User-facing errors from liveroom-core. Consumers never see HTTP status
// codes or JSON parse failures directly: the `From<liveroom_api::Error>`
// impl translates transport-layer errors into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to recorder at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Request to recorder timed out")]
    Timeout,

    #[error("Push channel unavailable: {reason}")]
    PushUnavailable { reason: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Room not found: {id}")]
    RoomNotFound { id: String },

    #[error("Room is not expanded: {id}")]
    RoomNotExpanded { id: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Force refresh rejected: {message}")]
    ForceRefreshRejected { message: String },

    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Sync engine has stopped")]
    EngineStopped,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Network or server failures, as opposed to caller mistakes.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. }
                | Self::Timeout
                | Self::PushUnavailable { .. }
                | Self::Api { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<liveroom_api::Error> for CoreError {
    fn from(err: liveroom_api::Error) -> Self {
        match err {
            liveroom_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e.url().map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            liveroom_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            liveroom_api::Error::InvalidBaseUrl(url) => CoreError::Config {
                message: format!("Invalid server URL: {url}"),
            },
            liveroom_api::Error::Api { status: 404, message } => {
                CoreError::RoomNotFound { id: message }
            }
            liveroom_api::Error::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            liveroom_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            liveroom_api::Error::SseConnect(reason) => CoreError::PushUnavailable { reason },
            liveroom_api::Error::SseClosed => CoreError::PushUnavailable {
                reason: "push channel is closed".into(),
            },
        }
    }
}

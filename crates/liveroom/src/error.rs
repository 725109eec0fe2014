//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use liveroom_config::ConfigError;
use liveroom_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const REJECTED: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to recorder at {url}")]
    #[diagnostic(
        code(liveroom::connection_failed),
        help(
            "Check that the recorder is running and reachable.\n\
             Reason: {reason}\n\
             Try: liveroom --server http://HOST:PORT lives"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Push channel unavailable: {reason}")]
    #[diagnostic(
        code(liveroom::push_unavailable),
        help("Use --no-push to follow the recorder by polling only.")
    )]
    PushUnavailable { reason: String },

    #[error("{operation} timed out")]
    #[diagnostic(
        code(liveroom::timeout),
        help("Increase timeout with --timeout or check recorder responsiveness.")
    )]
    Timeout { operation: String },

    // ── Rooms ────────────────────────────────────────────────────────
    #[error("Room '{identifier}' not found")]
    #[diagnostic(
        code(liveroom::not_found),
        help("Run: liveroom lives to see monitored rooms")
    )]
    NotFound { identifier: String },

    #[error("Refresh rejected by recorder: {message}")]
    #[diagnostic(
        code(liveroom::refresh_rejected),
        help("The recorder may be rate limited. Check with: liveroom show ROOM")
    )]
    RefreshRejected { message: String },

    #[error("Recorder accepted none of: {urls}")]
    #[diagnostic(
        code(liveroom::add_rejected),
        help("Check the URLs point at a supported live platform.")
    )]
    AddRejected { urls: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error: {message}")]
    #[diagnostic(code(liveroom::api_error))]
    Api { status: Option<u16>, message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(liveroom::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(liveroom::config),
        help("Inspect the file with: liveroom config show")
    )]
    Config(#[from] ConfigError),

    // ── Internal ─────────────────────────────────────────────────────
    #[error("{0}")]
    #[diagnostic(code(liveroom::internal))]
    Internal(String),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON rendering failed: {0}")]
    #[diagnostic(code(liveroom::json))]
    Json(#[from] serde_json::Error),

    #[error("YAML rendering failed: {0}")]
    #[diagnostic(code(liveroom::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::PushUnavailable { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::NotFound { .. }
            | Self::Api {
                status: Some(404), ..
            } => exit_code::NOT_FOUND,
            Self::RefreshRejected { .. } | Self::AddRejected { .. } => exit_code::REJECTED,
            Self::Validation { .. } | Self::Config(_) => exit_code::USAGE,
            Self::Api { .. }
            | Self::Internal(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Yaml(_) => exit_code::GENERAL,
        }
    }
}

// ── CoreError conversion ─────────────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => Self::ConnectionFailed { url, reason },
            CoreError::Timeout => Self::Timeout {
                operation: "Request to recorder".into(),
            },
            CoreError::PushUnavailable { reason } => Self::PushUnavailable { reason },
            CoreError::RoomNotFound { id } | CoreError::RoomNotExpanded { id } => {
                Self::NotFound { identifier: id }
            }
            CoreError::ForceRefreshRejected { message } => Self::RefreshRejected { message },
            CoreError::Api { message, status } => Self::Api { status, message },
            CoreError::Config { message } => Self::Validation {
                field: "server".into(),
                reason: message,
            },
            CoreError::EngineStopped => Self::Internal("sync engine stopped unexpectedly".into()),
            CoreError::Internal(message) => Self::Internal(message),
        }
    }
}

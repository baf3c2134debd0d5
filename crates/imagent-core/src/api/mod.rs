//! HTTP API layer for the imagent backend service.
//!
//! `auth` covers the account endpoints, `agent` the streaming image-edit
//! endpoint, `stream` + `events` the record framing and event types of the
//! streamed response body.

use std::fmt;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod agent;
pub mod auth;
pub mod events;
pub mod stream;

pub use agent::AgentClient;
pub use auth::AuthClient;
pub use events::AgentEvent;
pub use stream::EventReader;

/// Standard User-Agent header for imagent API requests.
pub const USER_AGENT: &str = concat!("imagent/", env!("CARGO_PKG_VERSION"));

/// Base URL used when neither env nor config provides one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Resolves the backend base URL with precedence: env > config > default.
///
/// # Errors
/// Returns an error if the resolved URL is not well-formed.
pub fn resolve_base_url(config_base_url: Option<&str>) -> Result<String> {
    // Try env var first
    if let Ok(env_url) = std::env::var("IMAGENT_BASE_URL") {
        let trimmed = env_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed)?;
            return Ok(trimmed.trim_end_matches('/').to_string());
        }
    }

    // Try config value
    if let Some(config_url) = config_base_url {
        let trimmed = config_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed)?;
            return Ok(trimmed.trim_end_matches('/').to_string());
        }
    }

    Ok(DEFAULT_BASE_URL.to_string())
}

fn validate_url(url: &str) -> Result<()> {
    url::Url::parse(url).with_context(|| format!("Invalid backend base URL: {url}"))?;
    Ok(())
}

/// Categories of API errors for consistent handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    /// Connect failure, timeout, non-2xx status, broken stream
    Transport,
    /// A record or response body could not be parsed; local to one record
    /// when it comes from the event stream
    Parse,
    /// The backend refused the credentials or the verification code
    Auth,
    /// Rejected client-side before any network call
    Validation,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiErrorKind::Transport => write!(f, "transport"),
            ApiErrorKind::Parse => write!(f, "parse"),
            ApiErrorKind::Auth => write!(f, "auth"),
            ApiErrorKind::Validation => write!(f, "validation"),
        }
    }
}

/// Structured error from the API layer with kind and details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error category
    pub kind: ApiErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// Optional additional details (e.g., raw error body)
    pub details: Option<String>,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Creates a local parse error (malformed record or response body).
    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Parse, message)
    }

    /// Creates a validation error (rejected before any network call).
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Validation, message)
    }

    /// Creates an auth error with a form-level message.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Auth, message)
    }

    /// Creates a transport error from a non-success status and its body.
    ///
    /// The backend reports failures as JSON with a `detail` (FastAPI) or
    /// `message` field; when present it becomes part of the summary.
    pub fn http_status(status: u16, body: &str) -> Self {
        match extract_body_message(body) {
            Some(msg) => Self {
                kind: ApiErrorKind::Transport,
                message: format!("HTTP {status}: {msg}"),
                details: Some(body.to_string()),
            },
            None => Self {
                kind: ApiErrorKind::Transport,
                message: format!("HTTP {status}"),
                details: (!body.is_empty()).then(|| body.to_string()),
            },
        }
    }
}

/// Pulls a human-readable message out of an error response body.
pub(crate) fn extract_body_message(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;
    json.get("detail")
        .or_else(|| json.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

/// Result type for API operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

pub(crate) fn classify_reqwest_error(e: &reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::new(ApiErrorKind::Transport, format!("Request timed out: {e}"))
    } else if e.is_connect() {
        ApiError::new(ApiErrorKind::Transport, format!("Connection failed: {e}"))
    } else {
        ApiError::new(ApiErrorKind::Transport, format!("Network error: {e}"))
    }
}

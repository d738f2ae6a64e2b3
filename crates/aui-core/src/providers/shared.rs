//! Types shared by assistant service backends.

use std::fmt;
use std::pin::Pin;

use anyhow::{Context, Result};
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::events::AssistantEvent;

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("aui/", env!("CARGO_PKG_VERSION"));

/// Categories of provider errors for consistent error handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// HTTP status error (4xx, 5xx)
    HttpStatus,
    /// Connection timeout or request timeout
    Timeout,
    /// Failed to parse response (JSON parse error, invalid SSE, etc.)
    Parse,
    /// Error reported by the service itself (failed run, `error` event)
    ApiError,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderErrorKind::HttpStatus => write!(f, "http_status"),
            ProviderErrorKind::Timeout => write!(f, "timeout"),
            ProviderErrorKind::Parse => write!(f, "parse"),
            ProviderErrorKind::ApiError => write!(f, "api_error"),
        }
    }
}

/// Structured error from the assistant service with kind and details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// Optional additional details (e.g., raw error body)
    pub details: Option<String>,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Creates an HTTP status error, lifting `error.message` out of a JSON body.
    pub fn http_status(status: u16, body: &str) -> Self {
        if body.is_empty() {
            return Self::new(ProviderErrorKind::HttpStatus, format!("HTTP {status}"));
        }

        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|json| {
                json.get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(Value::as_str)
                    .map(|msg| format!("HTTP {status}: {msg}"))
            })
            .unwrap_or_else(|| format!("HTTP {status}"));

        Self {
            kind: ProviderErrorKind::HttpStatus,
            message,
            details: Some(body.to_string()),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Timeout, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Parse, message)
    }

    /// Creates an API error (failed run or mid-stream error event).
    pub fn api_error(code: &str, message: &str) -> Self {
        Self::new(ProviderErrorKind::ApiError, format!("{code}: {message}"))
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ProviderError {}

/// Result type for provider operations.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Stream of relay events for one run.
pub type EventStream = Pin<Box<dyn Stream<Item = ProviderResult<AssistantEvent>> + Send>>;

/// Validates that a base URL is well-formed.
///
/// # Errors
/// Returns an error naming the backend when the URL does not parse.
pub fn validate_url(url: &str, backend: &str) -> Result<()> {
    url::Url::parse(url).with_context(|| format!("Invalid {backend} base URL: {url}"))?;
    Ok(())
}

//! Error types for the request gateway

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Failure taxonomy surfaced by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Transport unreachable (DNS, connection refused, timeout)
    Network,
    /// 4xx other than 401: bad input, not found, forbidden
    Client,
    /// 5xx, or a success status with a body that is not JSON
    Server,
    /// 401: the session is no longer valid
    Auth,
}

impl ErrorKind {
    /// Stable lowercase name, used as a metrics label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Client => "client",
            Self::Server => "server",
            Self::Auth => "auth",
        }
    }

    /// Classify a non-success HTTP status
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Auth,
            400..=499 => Self::Client,
            _ => Self::Server,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized error returned for every failed request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} error: {message}")]
pub struct GatewayError {
    /// Failure category
    pub kind: ErrorKind,
    /// HTTP status, absent for network failures
    pub status: Option<u16>,
    /// Human-readable message, from the server when it supplied one
    pub message: String,
    /// Machine-readable code supplied by the server, if any
    pub code: Option<String>,
}

impl GatewayError {
    /// Transport-level failure, no response was received
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Network,
            status: None,
            message: message.into(),
            code: None,
        }
    }

    /// Build the error for a non-success response
    ///
    /// The message is taken from the body's `message` or `error` field, the
    /// code from `code`; both may also sit under an `error` object.
    #[must_use]
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let parsed: Option<Value> = serde_json::from_slice(body).ok();
        let nested = parsed.as_ref().and_then(|v| v.get("error")).filter(|e| e.is_object());

        let message = parsed
            .as_ref()
            .and_then(|v| text_field(v, "message").or_else(|| text_field(v, "error")))
            .or_else(|| nested.and_then(|e| text_field(e, "message")))
            .unwrap_or_else(|| format!("Request failed with status code {status}"));

        let code = parsed
            .as_ref()
            .and_then(|v| text_field(v, "code"))
            .or_else(|| nested.and_then(|e| text_field(e, "code")));

        Self {
            kind: ErrorKind::from_status(status),
            status: Some(status),
            message,
            code,
        }
    }

    /// A success status whose body could not be decoded
    #[must_use]
    pub fn malformed(status: u16, reason: &str) -> Self {
        Self {
            kind: ErrorKind::Server,
            status: Some(status),
            message: format!("Malformed response body: {reason}"),
            code: None,
        }
    }

    /// Whether this failure invalidated the session
    #[must_use]
    pub fn is_auth(&self) -> bool {
        self.kind == ErrorKind::Auth
    }
}

fn text_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Failure of the underlying transport (no HTTP response)
#[derive(Debug, Error)]
#[error("transport failure: {0}")]
pub struct TransportError(pub String);

/// Errors from the persisted session snapshot
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem failure
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// In-memory store lock was poisoned
    #[error("snapshot store lock poisoned")]
    Poisoned,

    /// Stored identity is not valid JSON
    #[error("stored identity is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}

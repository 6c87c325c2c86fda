//! Error types surfaced by the entity store

use backstage_gateway::{ErrorKind, GatewayError, StorageError};
use backstage_runtime::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;
use crate::resolver::ResolveError;

/// Failure category carried in slice state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Transport unreachable
    Network,
    /// 4xx: validation, not found, forbidden
    Client,
    /// 5xx or undecodable response
    Server,
    /// 401: session rejected by the server
    Auth,
    /// Login succeeded on the wire but the account is deactivated
    AccountDeactivated,
    /// The entity has no endpoint for the requested operation
    Unsupported,
    /// The caller's role cannot be scoped for this query
    Scope,
}

impl From<ErrorKind> for FailureKind {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Network => Self::Network,
            ErrorKind::Client => Self::Client,
            ErrorKind::Server => Self::Server,
            ErrorKind::Auth => Self::Auth,
        }
    }
}

/// Error stored on a slice after a failed operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct ErrorInfo {
    /// Failure category
    pub kind: FailureKind,
    /// Human-readable message
    pub message: String,
    /// Server-supplied machine code
    pub code: Option<String>,
}

impl ErrorInfo {
    /// Error without a code
    #[must_use]
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
        }
    }

    /// The entity has no endpoint for `operation`
    #[must_use]
    pub fn unsupported(entity: &str, operation: &str) -> Self {
        Self::new(
            FailureKind::Unsupported,
            format!("{entity} does not support {operation}"),
        )
    }

    /// The account is administratively deactivated
    #[must_use]
    pub fn deactivated() -> Self {
        Self::new(
            FailureKind::AccountDeactivated,
            "Account is deactivated. Please contact the administrator.",
        )
    }

    /// A response that decoded but did not have the expected shape
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Server, message)
    }

    /// Whether this error invalidated the session
    #[must_use]
    pub fn is_auth(&self) -> bool {
        self.kind == FailureKind::Auth
    }
}

impl From<GatewayError> for ErrorInfo {
    fn from(error: GatewayError) -> Self {
        Self {
            kind: error.kind.into(),
            message: error.message,
            code: error.code,
        }
    }
}

impl From<ResolveError> for ErrorInfo {
    fn from(error: ResolveError) -> Self {
        Self::new(FailureKind::Scope, error.to_string())
    }
}

/// Errors returned by the [`Backstage`](crate::Backstage) facade
#[derive(Debug, Error)]
pub enum BackstageError {
    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Store runtime failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Query could not be scoped to the caller
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Snapshot storage failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// HTTP client could not be built
    #[error("transport setup failed: {0}")]
    Transport(String),

    /// An operation settled with an error
    #[error("{0}")]
    Operation(ErrorInfo),
}

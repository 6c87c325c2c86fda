//! # Backstage Gateway
//!
//! Request gateway between the entity store and the REST backend.
//!
//! - Attaches the persisted bearer token to every request not marked
//!   [`anonymous`](Request::anonymous)
//! - Decodes JSON responses (an empty body decodes to `null`)
//! - Normalizes every failure into a [`GatewayError`] with an [`ErrorKind`]
//! - On a 401 to a session request, clears the persisted session and fires
//!   the [`LoginRedirect`] hook, whether or not the caller looks at the error
//! - Never retries
//!
//! ## Example
//!
//! ```no_run
//! use backstage_gateway::{Gateway, HttpTransport, MemorySnapshotStore, Request};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = HttpTransport::new("http://localhost:8080", Duration::from_secs(30))?;
//! let gateway = Gateway::new(transport, Arc::new(MemorySnapshotStore::new()));
//!
//! let concerts = gateway.send(Request::get("/api/concert").query("page", 1)).await?;
//! println!("{concerts}");
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod request;
pub mod snapshot;
pub mod transport;

pub use error::{ErrorKind, GatewayError, StorageError, TransportError};
pub use request::{Body, Field, FileAttachment, Method, Payload, Request};
pub use snapshot::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore, TOKEN_KEY, USER_KEY};
pub use transport::{HttpTransport, PreparedRequest, RawResponse, Transport};

use serde_json::Value;
use std::sync::Arc;

/// Gateway requests, labelled by `method`
pub const REQUESTS_TOTAL: &str = "gateway.requests.total";
/// Gateway failures, labelled by `kind`
pub const FAILURES_TOTAL: &str = "gateway.failures.total";

/// Path of the login boundary
pub const LOGIN_PATH: &str = "/login";

/// Navigation hook fired when the session is rejected by the server
pub trait LoginRedirect: Send + Sync {
    /// Move the user to the login boundary
    fn redirect_to_login(&self);
}

/// Redirect hook for headless use: only records the event in the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogRedirect;

impl LoginRedirect for LogRedirect {
    fn redirect_to_login(&self) {
        tracing::info!(login_path = LOGIN_PATH, "Session rejected, redirecting to login");
    }
}

/// The request gateway
pub struct Gateway<T> {
    transport: T,
    snapshots: Arc<dyn SnapshotStore>,
    redirect: Arc<dyn LoginRedirect>,
}

impl<T: Transport> Gateway<T> {
    /// Create a gateway; the redirect hook defaults to [`LogRedirect`]
    #[must_use]
    pub fn new(transport: T, snapshots: Arc<dyn SnapshotStore>) -> Self {
        Self {
            transport,
            snapshots,
            redirect: Arc::new(LogRedirect),
        }
    }

    /// Replace the redirect hook
    #[must_use]
    pub fn with_redirect(mut self, redirect: Arc<dyn LoginRedirect>) -> Self {
        self.redirect = redirect;
        self
    }

    /// The underlying transport
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Send a request and decode the JSON response
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::Network`]: no response received
    /// - [`ErrorKind::Auth`]: 401; unless the request is anonymous, the
    ///   session snapshot has been cleared and the redirect hook fired before
    ///   this returns
    /// - [`ErrorKind::Client`]: any other 4xx
    /// - [`ErrorKind::Server`]: 5xx, or a 2xx body that is not JSON
    #[tracing::instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn send(&self, request: Request) -> Result<Value, GatewayError> {
        metrics::counter!(REQUESTS_TOTAL, "method" => request.method.as_str()).increment(1);

        let anonymous = request.anonymous;
        let bearer = if anonymous { None } else { self.stored_token() };
        let prepared = PreparedRequest { request, bearer };

        let outcome = match self.transport.execute(prepared).await {
            Ok(raw) => self.interpret(raw, anonymous),
            Err(e) => Err(GatewayError::network(e.0)),
        };

        if let Err(error) = &outcome {
            metrics::counter!(FAILURES_TOTAL, "kind" => error.kind.as_str()).increment(1);
            tracing::debug!(kind = %error.kind, status = ?error.status, message = %error.message, "Request failed");
        }

        outcome
    }

    fn interpret(&self, raw: RawResponse, anonymous: bool) -> Result<Value, GatewayError> {
        if raw.is_success() {
            if raw.body.iter().all(u8::is_ascii_whitespace) {
                return Ok(Value::Null);
            }
            return serde_json::from_slice(&raw.body)
                .map_err(|e| GatewayError::malformed(raw.status, &e.to_string()));
        }

        let error = GatewayError::from_response(raw.status, &raw.body);
        if error.is_auth() && !anonymous {
            tracing::warn!("Server rejected the session token");
            if let Err(e) = self.clear_session() {
                tracing::warn!(error = %e, "Failed to clear session snapshot");
            }
            self.redirect.redirect_to_login();
        }
        Err(error)
    }

    /// Token from the persisted snapshot, if any
    #[must_use]
    pub fn stored_token(&self) -> Option<String> {
        match self.snapshots.get(TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read token snapshot");
                None
            },
        }
    }

    /// Identity from the persisted snapshot, if any
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the snapshot cannot be read or holds invalid JSON.
    pub fn stored_identity(&self) -> Result<Option<Value>, StorageError> {
        self.snapshots
            .get(USER_KEY)?
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(StorageError::from)
    }

    /// Persist token and identity after a successful login
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the snapshot cannot be written.
    pub fn persist_session(&self, token: &str, identity: &Value) -> Result<(), StorageError> {
        self.snapshots.set(TOKEN_KEY, token)?;
        self.snapshots.set(USER_KEY, &identity.to_string())
    }

    /// Remove token and identity from the snapshot
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the snapshot cannot be written.
    pub fn clear_session(&self) -> Result<(), StorageError> {
        self.snapshots.remove(TOKEN_KEY)?;
        self.snapshots.remove(USER_KEY)
    }
}

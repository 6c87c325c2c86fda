//! Session slice
//!
//! Owns the authenticated identity and the token lifecycle:
//! `anonymous → authenticating → authenticated`, and back to `anonymous` on
//! logout, failed restore, or any auth failure. Tearing the session down also
//! resets every entity slice; that cascade lives in the app reducer.
//!
//! The persisted snapshot is written and cleared inside the reduction that
//! changes the session, never from an effect, so the snapshot always follows
//! the order in which session changes were applied.

use backstage_core::{async_effect, effect::Effect, reducer::Reducer, smallvec, SmallVec};
use backstage_gateway::{Gateway, Payload, Request, Transport};
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::environment::StoreEnvironment;
use crate::error::ErrorInfo;
use crate::resolver::{Identity, Role};
use crate::slice::Ticket;

const LOGIN_PATH: &str = "/api/organizer/login";
const REGISTER_PATH: &str = "/api/organizer/register";
const LOGOUT_PATH: &str = "/api/auth/logout";
const VERIFY_PATH: &str = "/api/auth/verify";

/// Keys the identity object may be nested under in auth responses
const IDENTITY_KEYS: &[&str] = &["organizer", "user", "admin"];

/// Where the session is in its lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    /// No session
    #[default]
    Anonymous,
    /// Login, registration, or restore in flight
    Authenticating,
    /// Token and identity held
    Authenticated,
}

/// Session state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    /// Lifecycle phase
    pub phase: SessionPhase,
    /// Authenticated caller
    pub identity: Option<Identity>,
    /// Bearer token
    pub token: Option<String>,
    /// Auth request in flight
    pub loading: bool,
    /// Error of the last failed auth request
    pub error: Option<ErrorInfo>,
}

impl SessionState {
    /// Whether a session is established
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.phase == SessionPhase::Authenticated
    }

    /// Role of the authenticated caller
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.identity.as_ref().map(|i| i.role)
    }
}

/// Login form
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account email
    pub email: String,
    /// Password
    pub password: String,
}

impl Credentials {
    /// Create credentials
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Organizer self-registration form
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Registration {
    /// Organizer name
    pub name: String,
    /// Account email
    pub email: String,
    /// Password
    pub password: String,
    /// Phone number
    pub phone: String,
    /// Postal address
    pub address: String,
    /// Optional description
    pub description: Option<String>,
    /// Optional website
    pub website: Option<String>,
}

impl Registration {
    /// Request body; the phone is sent under both names the backend reads
    #[must_use]
    pub fn to_payload(&self) -> Payload {
        let mut payload = Payload::new()
            .field("name", self.name.as_str())
            .field("email", self.email.as_str())
            .field("password", self.password.as_str())
            .field("phone", self.phone.as_str())
            .field("phone_number", self.phone.as_str())
            .field("address", self.address.as_str());
        if let Some(description) = &self.description {
            payload = payload.field("description", description.as_str());
        }
        if let Some(website) = &self.website {
            payload = payload.field("website", website.as_str());
        }
        payload
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish_non_exhaustive()
    }
}

/// Actions of the session slice
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Sign in
    Login {
        /// Correlation token
        ticket: Ticket,
        /// Email and password
        credentials: Credentials,
    },
    /// Register a new organizer and sign in
    Register {
        /// Correlation token
        ticket: Ticket,
        /// Registration form
        registration: Registration,
    },
    /// Login or registration succeeded
    LoginSucceeded {
        /// Ticket of the login or registration
        ticket: Ticket,
        /// Normalized identity
        identity: Identity,
        /// Bearer token
        token: String,
    },
    /// Login or registration failed
    LoginFailed {
        /// Ticket of the login or registration
        ticket: Ticket,
        /// What went wrong
        error: ErrorInfo,
    },
    /// Sign out; resets every slice
    Logout,
    /// Re-establish the session from the persisted snapshot
    Restore {
        /// Correlation token
        ticket: Ticket,
    },
    /// The persisted token was accepted
    RestoreVerified {
        /// Ticket of the restore
        ticket: Ticket,
        /// Identity from the verify response, or the stored one
        identity: Identity,
        /// Token to keep using; the verify response may rotate it
        token: String,
    },
    /// No snapshot, or the server rejected it
    RestoreFailed {
        /// Ticket of the restore
        ticket: Ticket,
        /// `None` when there was nothing to restore
        error: Option<ErrorInfo>,
    },
    /// Drop the stored error
    ClearError,
    /// Return to the initial state
    Reset,
}

fn text_at(body: &Value, key: &str) -> Option<String> {
    body.get(key)
        .or_else(|| body.get("data").and_then(|d| d.get(key)))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn identity_object(body: &Value) -> Option<&Value> {
    let data = body.get("data");
    IDENTITY_KEYS
        .iter()
        .flat_map(|key| [body.get(*key), data.and_then(|d| d.get(*key))])
        .flatten()
        .find(|v| v.is_object())
}

/// Whether an identity object is flagged as administratively deactivated
fn is_deactivated(identity: &Value) -> bool {
    let off = |value: &Value| match value {
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_i64() == Some(0),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "inactive" | "deactivated" | "disabled" | "0" | "false"
        ),
        _ => false,
    };

    ["status", "is_active", "active"]
        .iter()
        .filter_map(|key| identity.get(*key))
        .any(off)
}

fn accept_identity(raw: &Value) -> Result<Identity, ErrorInfo> {
    if is_deactivated(raw) {
        return Err(ErrorInfo::deactivated());
    }
    Identity::from_json(raw).ok_or_else(|| ErrorInfo::malformed("Identity is not an object"))
}

/// Decode a login or registration response into identity and token
///
/// # Errors
///
/// [`AccountDeactivated`](crate::FailureKind::AccountDeactivated) if the
/// account is flagged inactive, a server-kind error if the token or identity
/// is missing.
pub fn parse_login(body: &Value) -> Result<(Identity, String), ErrorInfo> {
    let raw = identity_object(body).ok_or_else(|| ErrorInfo::malformed("Login response carried no identity"))?;
    let identity = accept_identity(raw)?;
    let token = text_at(body, "token").ok_or_else(|| ErrorInfo::malformed("Login response carried no token"))?;
    Ok((identity, token))
}

fn sign_in_effect<T: Transport>(gateway: Arc<Gateway<T>>, ticket: Ticket, request: Request) -> Effect<SessionAction> {
    async_effect! {
        let outcome = match gateway.send(request.anonymous()).await {
            Ok(body) => parse_login(&body),
            Err(error) => Err(error.into()),
        };

        Some(match outcome {
            Ok((identity, token)) => SessionAction::LoginSucceeded { ticket, identity, token },
            Err(error) => SessionAction::LoginFailed { ticket, error },
        })
    }
}

fn restore_effect<T: Transport>(gateway: Arc<Gateway<T>>, ticket: Ticket) -> Effect<SessionAction> {
    async_effect! {
        let Some(stored_token) = gateway.stored_token() else {
            return Some(SessionAction::RestoreFailed { ticket, error: None });
        };
        let stored_identity = gateway.stored_identity().unwrap_or_else(|error| {
            tracing::warn!(%error, "Ignoring unreadable identity snapshot");
            None
        });

        let outcome = match gateway.send(Request::get(VERIFY_PATH)).await {
            Ok(body) => identity_object(&body)
                .or(stored_identity.as_ref())
                .ok_or_else(|| ErrorInfo::malformed("Verify response carried no identity"))
                .and_then(accept_identity)
                .map(|identity| (identity, text_at(&body, "token").unwrap_or(stored_token))),
            Err(error) => Err(error.into()),
        };

        Some(match outcome {
            Ok((identity, token)) => SessionAction::RestoreVerified { ticket, identity, token },
            Err(error) => SessionAction::RestoreFailed { ticket, error: Some(error) },
        })
    }
}

/// Best-effort server logout, sent after the local session is gone
fn logout_effect<T: Transport>(gateway: Arc<Gateway<T>>) -> Effect<SessionAction> {
    async_effect! {
        if let Err(error) = gateway.send(Request::post(LOGOUT_PATH).anonymous()).await {
            tracing::debug!(%error, "Server logout failed");
        }
        None
    }
}

fn persist<T: Transport>(gateway: &Gateway<T>, token: &str, identity: &Identity) {
    if let Err(error) = gateway.persist_session(token, &identity.to_json()) {
        tracing::warn!(%error, "Failed to persist session snapshot");
    }
}

fn forget<T: Transport>(gateway: &Gateway<T>) {
    if let Err(error) = gateway.clear_session() {
        tracing::warn!(%error, "Failed to clear session snapshot");
    }
}

/// Reducer of the session slice
pub struct SessionReducer<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> SessionReducer<T> {
    /// Create the reducer
    #[must_use]
    pub const fn new() -> Self {
        Self { _marker: PhantomData }
    }
}

impl<T> Default for SessionReducer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> Reducer for SessionReducer<T> {
    type State = SessionState;
    type Action = SessionAction;
    type Environment = StoreEnvironment<T>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            SessionAction::Login { ticket, credentials } => {
                tracing::info!(email = %credentials.email, %ticket, "Login requested");
                state.phase = SessionPhase::Authenticating;
                state.loading = true;
                state.error = None;
                let request = Request::post(LOGIN_PATH).json(serde_json::json!({
                    "email": credentials.email,
                    "password": credentials.password,
                }));
                smallvec![sign_in_effect(Arc::clone(&env.gateway), ticket, request)]
            },

            SessionAction::Register { ticket, registration } => {
                tracing::info!(email = %registration.email, %ticket, "Registration requested");
                state.phase = SessionPhase::Authenticating;
                state.loading = true;
                state.error = None;
                let request = Request::post(REGISTER_PATH).payload(registration.to_payload());
                smallvec![sign_in_effect(Arc::clone(&env.gateway), ticket, request)]
            },

            SessionAction::LoginSucceeded { identity, token, .. }
            | SessionAction::RestoreVerified { identity, token, .. } => {
                tracing::info!(id = ?identity.id, role = ?identity.role, "Session established");
                persist(&env.gateway, &token, &identity);
                state.phase = SessionPhase::Authenticated;
                state.identity = Some(identity);
                state.token = Some(token);
                state.loading = false;
                state.error = None;
                smallvec![Effect::None]
            },

            SessionAction::LoginFailed { error, .. } => {
                tracing::warn!(kind = ?error.kind, message = %error.message, "Login failed");
                *state = SessionState {
                    error: Some(error),
                    ..SessionState::default()
                };
                smallvec![Effect::None]
            },

            SessionAction::Logout => {
                tracing::info!("Logging out");
                let had_session = state.token.is_some() || env.gateway.stored_token().is_some();
                forget(&env.gateway);
                *state = SessionState::default();
                if had_session {
                    smallvec![logout_effect(Arc::clone(&env.gateway))]
                } else {
                    smallvec![Effect::None]
                }
            },

            SessionAction::Restore { ticket } => {
                tracing::debug!(%ticket, "Restore requested");
                state.phase = SessionPhase::Authenticating;
                state.loading = true;
                state.error = None;
                smallvec![restore_effect(Arc::clone(&env.gateway), ticket)]
            },

            SessionAction::RestoreFailed { error, .. } => {
                match &error {
                    Some(error) => {
                        tracing::info!(message = %error.message, "Stored session rejected");
                        forget(&env.gateway);
                    },
                    None => tracing::debug!("No stored session"),
                }
                *state = SessionState {
                    error,
                    ..SessionState::default()
                };
                smallvec![Effect::None]
            },

            SessionAction::ClearError => {
                state.error = None;
                smallvec![Effect::None]
            },

            SessionAction::Reset => {
                *state = SessionState::default();
                smallvec![Effect::None]
            },
        }
    }
}

//! Application-facing entry point
//!
//! [`Backstage`] owns the store runtime and turns each operation into an
//! awaited dispatch. It is built once at startup and shared by reference or
//! clone; there is no global instance.

use backstage_gateway::{
    FileSnapshotStore, Gateway, HttpTransport, MemorySnapshotStore, Payload, SnapshotStore, Transport,
};
use backstage_runtime::{EffectHandle, Store};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::app::{AppAction, AppReducer, AppSlice, AppState};
use crate::config::BackstageConfig;
use crate::environment::StoreEnvironment;
use crate::error::{BackstageError, ErrorInfo};
use crate::record::Record;
use crate::resolver::{resolve_list_query, Identity, ListQuery, QueryParams, Role};
use crate::session::{Credentials, Registration, SessionAction};
use crate::slice::{EntityAction, Operation, Ticket};
use crate::views::{revenue_by_concert, DashboardSummary, GroupTotal};

/// Store runtime specialised to the application state
pub type AppStore<T> = Store<AppState, AppAction, StoreEnvironment<T>, AppReducer<T>>;

/// Headroom on top of the request timeout when waiting for a result action
const SETTLE_MARGIN: Duration = Duration::from_secs(5);

/// The entity store
///
/// Each call issues a fresh [`Ticket`] and waits for the response carrying
/// it, so concurrent calls on clones of one store each get their own outcome.
pub struct Backstage<T: Transport = HttpTransport> {
    store: AppStore<T>,
    tickets: Arc<AtomicU64>,
    page_size: u32,
    wait_timeout: Duration,
}

impl<T: Transport> Clone for Backstage<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            tickets: Arc::clone(&self.tickets),
            page_size: self.page_size,
            wait_timeout: self.wait_timeout,
        }
    }
}

impl Backstage<HttpTransport> {
    /// Build the HTTP-backed store described by `config`
    ///
    /// # Errors
    ///
    /// [`BackstageError::Config`] for an invalid configuration,
    /// [`BackstageError::Transport`] if the HTTP client cannot be built.
    pub fn from_config(config: &BackstageConfig) -> Result<Self, BackstageError> {
        config.validate()?;

        let transport = HttpTransport::new(config.api_base_url.as_str(), config.request_timeout)
            .map_err(|e| BackstageError::Transport(e.0))?;
        let snapshots: Arc<dyn SnapshotStore> = match &config.snapshot_dir {
            Some(dir) => Arc::new(FileSnapshotStore::new(dir.clone())),
            None => Arc::new(MemorySnapshotStore::new()),
        };

        tracing::info!(base_url = %config.api_base_url, persistent = config.snapshot_dir.is_some(), "Building entity store");
        Ok(Self::new(Gateway::new(transport, snapshots), config))
    }
}

impl<T: Transport> Backstage<T> {
    /// Build the store over an existing gateway
    #[must_use]
    pub fn new(gateway: Gateway<T>, config: &BackstageConfig) -> Self {
        Self::with_environment(StoreEnvironment::new(gateway), config)
    }

    /// Build the store over a prepared environment
    #[must_use]
    pub fn with_environment(environment: StoreEnvironment<T>, config: &BackstageConfig) -> Self {
        let reducer = AppReducer::new(config.discard_stale_lists);
        Self {
            store: Store::new(AppState::default(), reducer, environment),
            tickets: Arc::new(AtomicU64::new(0)),
            page_size: config.page_size,
            wait_timeout: config.request_timeout + SETTLE_MARGIN,
        }
    }

    /// Underlying store runtime
    #[must_use]
    pub const fn store(&self) -> &AppStore<T> {
        &self.store
    }

    /// Read the current state through a projection
    pub async fn state<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&AppState) -> R,
    {
        self.store.state(f).await
    }

    /// Dispatch a raw action without waiting for its effects
    ///
    /// # Errors
    ///
    /// [`BackstageError::Store`] if the store is shutting down.
    pub async fn send(&self, action: AppAction) -> Result<EffectHandle, BackstageError> {
        Ok(self.store.send(action).await?)
    }

    fn issue(&self) -> Ticket {
        Ticket(self.tickets.fetch_add(1, Ordering::Relaxed) + 1)
    }

    // Session

    /// Re-establish a persisted session
    ///
    /// Returns whether a session is now active. A missing or rejected
    /// snapshot is not an error; the session simply stays anonymous.
    ///
    /// # Errors
    ///
    /// [`BackstageError::Store`] on runtime failure or timeout.
    pub async fn restore(&self) -> Result<bool, BackstageError> {
        let ticket = self.issue();
        let outcome = self
            .store
            .send_and_wait_for(
                AppAction::Session(SessionAction::Restore { ticket }),
                move |a| {
                    matches!(
                        a,
                        AppAction::Session(
                            SessionAction::RestoreVerified { ticket: t, .. }
                                | SessionAction::RestoreFailed { ticket: t, .. }
                        ) if *t == ticket
                    )
                },
                self.wait_timeout,
            )
            .await?;

        Ok(matches!(outcome, AppAction::Session(SessionAction::RestoreVerified { .. })))
    }

    /// Sign in
    ///
    /// # Errors
    ///
    /// [`BackstageError::Operation`] with the login failure (including a
    /// deactivated account), or [`BackstageError::Store`] on runtime failure.
    pub async fn login(&self, credentials: Credentials) -> Result<Identity, BackstageError> {
        self.sign_in(|ticket| SessionAction::Login { ticket, credentials }).await
    }

    /// Register an organizer account and sign in
    ///
    /// # Errors
    ///
    /// Same as [`login`](Self::login).
    pub async fn register(&self, registration: Registration) -> Result<Identity, BackstageError> {
        self.sign_in(|ticket| SessionAction::Register { ticket, registration }).await
    }

    async fn sign_in(&self, action: impl FnOnce(Ticket) -> SessionAction) -> Result<Identity, BackstageError> {
        let ticket = self.issue();
        let outcome = self
            .store
            .send_and_wait_for(
                AppAction::Session(action(ticket)),
                move |a| {
                    matches!(
                        a,
                        AppAction::Session(
                            SessionAction::LoginSucceeded { ticket: t, .. }
                                | SessionAction::LoginFailed { ticket: t, .. }
                        ) if *t == ticket
                    )
                },
                self.wait_timeout,
            )
            .await?;

        match outcome {
            AppAction::Session(SessionAction::LoginSucceeded { identity, .. }) => Ok(identity),
            AppAction::Session(SessionAction::LoginFailed { error, .. }) => Err(BackstageError::Operation(error)),
            other => Err(BackstageError::Operation(ErrorInfo::malformed(format!(
                "unexpected sign-in outcome: {other:?}"
            )))),
        }
    }

    /// Sign out and reset every slice
    ///
    /// The local session and its snapshot are gone as soon as the logout is
    /// reduced; this also waits for the best-effort server logout to finish.
    ///
    /// # Errors
    ///
    /// [`BackstageError::Store`] if the store is shutting down.
    pub async fn logout(&self) -> Result<(), BackstageError> {
        Ok(self.store.send_and_settle(AppAction::Session(SessionAction::Logout)).await?)
    }

    // Entities

    /// List `K` records visible to the signed-in caller
    ///
    /// Administrators get every record; organizers only their own. A query
    /// that cannot be scoped fails without contacting the server, and the
    /// failure is also stored on the slice.
    ///
    /// # Errors
    ///
    /// [`BackstageError::Resolve`] if the query cannot be scoped,
    /// [`BackstageError::Operation`] if the request failed.
    pub async fn list<K: AppSlice>(&self, params: QueryParams) -> Result<(), BackstageError> {
        let (role, identity) = self
            .store
            .state(|s| (s.session.role(), s.session.identity.clone()))
            .await;

        let params = QueryParams {
            page: params.page.or(Some(1)),
            limit: params.limit.or(Some(self.page_size)),
            ..params
        };

        // Without a session there is no privilege to claim
        let role = role.unwrap_or(Role::Organizer);
        match resolve_list_query::<K>(role, identity.as_ref(), params) {
            Ok(query) => self.list_query::<K>(query).await,
            Err(error) => {
                tracing::warn!(entity = K::NAME, %error, "List query rejected");
                let failed = EntityAction::Failed {
                    ticket: self.issue(),
                    op: Operation::List,
                    seq: None,
                    error: ErrorInfo::from(error.clone()),
                };
                self.store.send(K::wrap(failed)).await?;
                Err(error.into())
            },
        }
    }

    /// List `K` records with an explicit, already-resolved query
    ///
    /// # Errors
    ///
    /// [`BackstageError::Operation`] if the request failed.
    pub async fn list_query<K: AppSlice>(&self, query: ListQuery) -> Result<(), BackstageError> {
        self.run::<K>(|ticket| EntityAction::List { ticket, query }).await
    }

    /// Fetch one record into the slice's `current`
    ///
    /// # Errors
    ///
    /// [`BackstageError::Operation`] if the request failed.
    pub async fn get<K: AppSlice>(&self, id: impl Into<String>) -> Result<Option<Record<K::Status>>, BackstageError> {
        let id = id.into();
        self.run::<K>(|ticket| EntityAction::GetOne { ticket, id }).await?;
        Ok(self.store.state(|s| K::slice(s).current.clone()).await)
    }

    /// Create a record
    ///
    /// # Errors
    ///
    /// [`BackstageError::Operation`] if the request failed.
    pub async fn create<K: AppSlice>(&self, payload: Payload) -> Result<(), BackstageError> {
        self.run::<K>(|ticket| EntityAction::Create { ticket, payload }).await
    }

    /// Update a record
    ///
    /// # Errors
    ///
    /// [`BackstageError::Operation`] if the request failed.
    pub async fn update<K: AppSlice>(&self, id: impl Into<String>, payload: Payload) -> Result<(), BackstageError> {
        let id = id.into();
        self.run::<K>(|ticket| EntityAction::Update { ticket, id, payload }).await
    }

    /// Delete a record
    ///
    /// # Errors
    ///
    /// [`BackstageError::Operation`] if the request failed.
    pub async fn remove<K: AppSlice>(&self, id: impl Into<String>) -> Result<(), BackstageError> {
        let id = id.into();
        self.run::<K>(|ticket| EntityAction::Remove { ticket, id }).await
    }

    /// Change the status of a record
    ///
    /// # Errors
    ///
    /// [`BackstageError::Operation`] if the request failed.
    pub async fn set_status<K: AppSlice>(&self, id: impl Into<String>, status: K::Status) -> Result<(), BackstageError> {
        let id = id.into();
        self.run::<K>(|ticket| EntityAction::SetStatus { ticket, id, status }).await
    }

    /// Dispatch a slice request and wait for the response carrying its ticket
    ///
    /// By the time the response is observed it has been reduced, along with
    /// any session teardown it caused.
    async fn run<K: AppSlice>(&self, request: impl FnOnce(Ticket) -> EntityAction<K>) -> Result<(), BackstageError> {
        let ticket = self.issue();
        let outcome = self
            .store
            .send_and_wait_for(
                K::wrap(request(ticket)),
                move |a| K::unwrap(a).and_then(EntityAction::response_ticket) == Some(ticket),
                self.wait_timeout,
            )
            .await?;

        match K::unwrap(&outcome) {
            Some(EntityAction::Failed { error, .. }) => Err(BackstageError::Operation(error.clone())),
            _ => Ok(()),
        }
    }

    // Views

    /// Dashboard headline figures over the cached items
    pub async fn dashboard(&self) -> DashboardSummary {
        self.store.state(DashboardSummary::from_state).await
    }

    /// Approved transaction revenue per concert, over the cached items
    pub async fn revenue_by_concert(&self) -> Vec<GroupTotal> {
        self.store.state(|s| revenue_by_concert(&s.transactions.items)).await
    }

    /// Stop accepting actions and wait for running effects
    ///
    /// # Errors
    ///
    /// [`BackstageError::Store`] if effects are still running at the timeout.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), BackstageError> {
        Ok(self.store.shutdown(timeout).await?)
    }
}

//! Generic entity cache slice
//!
//! One instance per entity kind. Every remote operation is three actions:
//! the request (sets `loading`, clears `error`, starts a gateway effect), and
//! one of the success or [`EntityAction::Failed`] responses the effect feeds
//! back. The response echoes the request's [`Ticket`], so a caller waiting on
//! one operation never picks up another's outcome. Overlapping operations
//! share `loading`/`error`; whichever settles last decides their final value.

use backstage_core::{async_effect, effect::Effect, reducer::Reducer, smallvec, DateTime, SmallVec, Utc};
use backstage_gateway::{Payload, Request, Transport};
use serde_json::{Map, Value};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::envelope::{extract_page, extract_single, ingest_collection, PageInfo};
use crate::environment::StoreEnvironment;
use crate::error::ErrorInfo;
use crate::kind::EntityKind;
use crate::record::Record;
use crate::resolver::ListQuery;

/// Correlates a request action with the response its effect feeds back
///
/// Issued by the caller; the reducer only echoes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Ticket(pub u64);

impl std::fmt::Display for Ticket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Remote operations of a slice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Fetch the primary collection
    List,
    /// Fetch one record into `current`
    GetOne,
    /// Create a record
    Create,
    /// Update a record
    Update,
    /// Delete a record
    Remove,
    /// Change only the status of a record
    SetStatus,
}

impl Operation {
    /// Lowercase name for logs and messages
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::GetOne => "get",
            Self::Create => "create",
            Self::Update => "update",
            Self::Remove => "delete",
            Self::SetStatus => "status change",
        }
    }
}

/// Cached state of one entity kind
#[derive(Debug, Clone, PartialEq)]
pub struct EntityState<K: EntityKind> {
    /// Primary collection, unique by id
    pub items: Vec<Record<K::Status>>,
    /// Detail record; not necessarily present in `items`
    pub current: Option<Record<K::Status>>,
    /// Shared in-flight flag
    pub loading: bool,
    /// Error of the last failed operation
    pub error: Option<ErrorInfo>,
    /// Pagination of `items`; stale after single-record mutations
    pub page: PageInfo,
    /// When `items` was last replaced by a list response
    pub fetched_at: Option<DateTime<Utc>>,
    list_seq: u64,
}

impl<K: EntityKind> Default for EntityState<K> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            current: None,
            loading: false,
            error: None,
            page: PageInfo::default(),
            fetched_at: None,
            list_seq: 0,
        }
    }
}

impl<K: EntityKind> EntityState<K> {
    /// Find a cached record by id
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&Record<K::Status>> {
        self.items.iter().find(|r| r.id == id)
    }

    /// Sequence token of the most recently issued list request
    #[must_use]
    pub const fn list_seq(&self) -> u64 {
        self.list_seq
    }

    /// Whether the cache holds nothing: no items, no current record, no error
    #[must_use]
    pub fn is_empty_cache(&self) -> bool {
        self.items.is_empty()
            && self.current.is_none()
            && self.error.is_none()
            && self.page == PageInfo::default()
    }

    /// Return to the initial state
    ///
    /// The list sequence keeps counting so completions of lists issued before
    /// the reset are recognisable as stale.
    fn reset(&mut self) {
        let seq = self.list_seq + 1;
        *self = Self::default();
        self.list_seq = seq;
    }
}

/// Actions of an entity slice
#[derive(Debug, Clone, PartialEq)]
pub enum EntityAction<K: EntityKind> {
    // Requests
    /// Fetch the collection
    List {
        /// Correlation token
        ticket: Ticket,
        /// Resolved endpoint variant and parameters
        query: ListQuery,
    },
    /// Fetch one record
    GetOne {
        /// Correlation token
        ticket: Ticket,
        /// Record id
        id: String,
    },
    /// Create a record
    Create {
        /// Correlation token
        ticket: Ticket,
        /// Fields, possibly with file attachments
        payload: Payload,
    },
    /// Update a record
    Update {
        /// Correlation token
        ticket: Ticket,
        /// Record id
        id: String,
        /// Written fields
        payload: Payload,
    },
    /// Delete a record
    Remove {
        /// Correlation token
        ticket: Ticket,
        /// Record id
        id: String,
    },
    /// Change the status of a record
    SetStatus {
        /// Correlation token
        ticket: Ticket,
        /// Record id
        id: String,
        /// New status
        status: K::Status,
    },

    // Responses, each echoing the request's ticket
    /// List response arrived
    Listed {
        /// Ticket of the originating request
        ticket: Ticket,
        /// Sequence token of the originating request
        seq: u64,
        /// Raw response body
        body: Value,
    },
    /// Get response arrived
    Fetched {
        /// Ticket of the originating request
        ticket: Ticket,
        /// Raw response body
        body: Value,
    },
    /// Create response arrived
    Created {
        /// Ticket of the originating request
        ticket: Ticket,
        /// Raw response body
        body: Value,
    },
    /// Update response arrived
    Updated {
        /// Ticket of the originating request
        ticket: Ticket,
        /// Record id
        id: String,
        /// Raw response body
        body: Value,
        /// Fields that were written, applied when the body echoes no record
        patch: Map<String, Value>,
    },
    /// Delete acknowledged
    Removed {
        /// Ticket of the originating request
        ticket: Ticket,
        /// Record id
        id: String,
    },
    /// Status change acknowledged
    StatusSet {
        /// Ticket of the originating request
        ticket: Ticket,
        /// Record id
        id: String,
        /// Status that was requested
        status: K::Status,
    },
    /// An operation failed
    Failed {
        /// Ticket of the originating request
        ticket: Ticket,
        /// Which operation
        op: Operation,
        /// Sequence token, for list failures
        seq: Option<u64>,
        /// What went wrong
        error: ErrorInfo,
    },

    // Local
    /// Drop the stored error
    ClearError,
    /// Point `current` at a record (or nothing)
    SetCurrent {
        /// New current record
        record: Option<Record<K::Status>>,
    },
    /// Empty the cache
    Clear,
    /// Return to the initial state (session teardown)
    Reset,
}

impl<K: EntityKind> EntityAction<K> {
    /// Whether this is a failure that invalidated the session
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Failed { error, .. } if error.is_auth())
    }

    /// Ticket of a response action; `None` for requests and local actions
    #[must_use]
    pub const fn response_ticket(&self) -> Option<Ticket> {
        match self {
            Self::Listed { ticket, .. }
            | Self::Fetched { ticket, .. }
            | Self::Created { ticket, .. }
            | Self::Updated { ticket, .. }
            | Self::Removed { ticket, .. }
            | Self::StatusSet { ticket, .. }
            | Self::Failed { ticket, .. } => Some(*ticket),
            _ => None,
        }
    }
}

/// Reducer of one entity slice
pub struct EntityReducer<K, T> {
    discard_stale_lists: bool,
    _marker: PhantomData<fn() -> (K, T)>,
}

impl<K, T> Default for EntityReducer<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> EntityReducer<K, T> {
    /// Reducer applying every completion, stale or not
    #[must_use]
    pub const fn new() -> Self {
        Self {
            discard_stale_lists: false,
            _marker: PhantomData,
        }
    }

    /// Discard list completions older than the latest issued list request
    #[must_use]
    pub const fn discarding_stale_lists(mut self, discard: bool) -> Self {
        self.discard_stale_lists = discard;
        self
    }
}

fn gateway_effect<K, T, F>(
    env: &StoreEnvironment<T>,
    request: Request,
    ticket: Ticket,
    op: Operation,
    seq: Option<u64>,
    on_success: F,
) -> Effect<EntityAction<K>>
where
    K: EntityKind,
    T: Transport,
    F: FnOnce(Value) -> EntityAction<K> + Send + 'static,
{
    let gateway = Arc::clone(&env.gateway);
    async_effect! {
        match gateway.send(request).await {
            Ok(body) => Some(on_success(body)),
            Err(error) => Some(EntityAction::Failed { ticket, op, seq, error: error.into() }),
        }
    }
}

/// Report a failure detected before any request went out
///
/// Delivered as a response like any other, so the caller holding the ticket
/// sees it.
fn refuse<K: EntityKind>(ticket: Ticket, op: Operation, error: ErrorInfo) -> Effect<EntityAction<K>> {
    async_effect! {
        Some(EntityAction::Failed { ticket, op, seq: None, error })
    }
}

impl<K: EntityKind, T: Transport> EntityReducer<K, T> {
    fn fail(state: &mut EntityState<K>, op: Operation, error: ErrorInfo) -> SmallVec<[Effect<EntityAction<K>>; 4]> {
        tracing::warn!(entity = K::NAME, op = op.as_str(), kind = ?error.kind, message = %error.message, "Operation failed");
        state.loading = false;
        state.error = Some(error);
        smallvec![Effect::None]
    }

    fn start(
        state: &mut EntityState<K>,
        env: &StoreEnvironment<T>,
        ticket: Ticket,
        op: Operation,
        request: Option<Request>,
        on_success: impl FnOnce(Value) -> EntityAction<K> + Send + 'static,
    ) -> SmallVec<[Effect<EntityAction<K>>; 4]> {
        let Some(request) = request else {
            return smallvec![refuse(ticket, op, ErrorInfo::unsupported(K::NAME, op.as_str()))];
        };
        tracing::debug!(entity = K::NAME, op = op.as_str(), %ticket, path = %request.path, "Operation requested");
        state.loading = true;
        state.error = None;
        smallvec![gateway_effect(env, request, ticket, op, None, on_success)]
    }

    fn is_stale(&self, state: &EntityState<K>, op: Operation, seq: Option<u64>) -> bool {
        self.discard_stale_lists
            && op == Operation::List
            && seq.is_some_and(|seq| seq != state.list_seq)
    }
}

impl<K: EntityKind, T: Transport> Reducer for EntityReducer<K, T> {
    type State = EntityState<K>;
    type Action = EntityAction<K>;
    type Environment = StoreEnvironment<T>;

    #[allow(clippy::too_many_lines)] // one arm per action
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            EntityAction::List { ticket, query } => {
                let Some(request) = K::list_request(&query.variant) else {
                    let error = ErrorInfo::unsupported(K::NAME, "this list variant");
                    return smallvec![refuse(ticket, Operation::List, error)];
                };
                state.list_seq += 1;
                let seq = state.list_seq;
                state.loading = true;
                state.error = None;
                tracing::debug!(entity = K::NAME, %ticket, seq, variant = ?query.variant, "List requested");

                let request = query.params.apply(request);
                smallvec![gateway_effect(env, request, ticket, Operation::List, Some(seq), move |body| {
                    EntityAction::Listed { ticket, seq, body }
                })]
            },

            EntityAction::GetOne { ticket, id } => {
                Self::start(state, env, ticket, Operation::GetOne, K::get_request(&id), move |body| {
                    if extract_single::<K>(&body).is_some() {
                        EntityAction::Fetched { ticket, body }
                    } else {
                        let message = format!("Response did not contain a {} record", K::NAME);
                        EntityAction::Failed {
                            ticket,
                            op: Operation::GetOne,
                            seq: None,
                            error: ErrorInfo::malformed(message),
                        }
                    }
                })
            },

            EntityAction::Create { ticket, payload } => {
                Self::start(state, env, ticket, Operation::Create, K::create_request(payload), move |body| {
                    EntityAction::Created { ticket, body }
                })
            },

            EntityAction::Update { ticket, id, payload } => {
                let patch = payload.to_json();
                let request = K::update_request(&id, payload);
                Self::start(state, env, ticket, Operation::Update, request, move |body| {
                    EntityAction::Updated { ticket, id, body, patch }
                })
            },

            EntityAction::Remove { ticket, id } => {
                let request = K::delete_request(&id);
                Self::start(state, env, ticket, Operation::Remove, request, move |_| {
                    EntityAction::Removed { ticket, id }
                })
            },

            EntityAction::SetStatus { ticket, id, status } => {
                let request = K::status_request(&id, &status);
                // The acknowledgement body is ignored: the new status is known locally
                Self::start(state, env, ticket, Operation::SetStatus, request, move |_| {
                    EntityAction::StatusSet { ticket, id, status }
                })
            },

            EntityAction::Listed { seq, body, .. } => {
                if self.is_stale(state, Operation::List, Some(seq)) {
                    tracing::debug!(entity = K::NAME, seq, latest = state.list_seq, "Discarding stale list response");
                    return smallvec![Effect::None];
                }
                state.items = ingest_collection::<K>(&body);
                state.page = extract_page(&body, K::TOTAL_KEYS);
                state.fetched_at = Some(env.clock.now());
                state.loading = false;
                tracing::debug!(entity = K::NAME, seq, count = state.items.len(), "List loaded");
                smallvec![Effect::None]
            },

            EntityAction::Fetched { body, .. } => {
                match extract_single::<K>(&body) {
                    Some(record) => {
                        tracing::debug!(entity = K::NAME, id = %record.id, "Record loaded");
                        state.loading = false;
                        state.current = Some(record);
                    },
                    None => {
                        let message = format!("Response did not contain a {} record", K::NAME);
                        return Self::fail(state, Operation::GetOne, ErrorInfo::malformed(message));
                    },
                }
                smallvec![Effect::None]
            },

            EntityAction::Created { body, .. } => {
                state.loading = false;
                match extract_single::<K>(&body) {
                    Some(record) => {
                        tracing::debug!(entity = K::NAME, id = %record.id, "Record created");
                        state.items.retain(|r| r.id != record.id);
                        state.items.insert(0, record);
                    },
                    None => {
                        tracing::warn!(entity = K::NAME, "Create response carried no record; list not updated");
                    },
                }
                smallvec![Effect::None]
            },

            EntityAction::Updated { id, body, patch, .. } => {
                state.loading = false;
                let echoed = extract_single::<K>(&body).filter(|r| r.id == id);

                if let Some(record) = echoed {
                    if let Some(slot) = state.items.iter_mut().find(|r| r.id == id) {
                        *slot = record.clone();
                    }
                    if state.current.as_ref().is_some_and(|c| c.id == id) {
                        state.current = Some(record);
                    }
                } else {
                    for record in state.items.iter_mut().filter(|r| r.id == id) {
                        record.merge::<K>(&patch);
                    }
                    if let Some(current) = state.current.as_mut().filter(|c| c.id == id) {
                        current.merge::<K>(&patch);
                    }
                }
                tracing::debug!(entity = K::NAME, %id, cached = state.find(&id).is_some(), "Record updated");
                smallvec![Effect::None]
            },

            EntityAction::Removed { id, .. } => {
                state.loading = false;
                state.items.retain(|r| r.id != id);
                if state.current.as_ref().is_some_and(|c| c.id == id) {
                    state.current = None;
                }
                tracing::debug!(entity = K::NAME, %id, "Record removed");
                smallvec![Effect::None]
            },

            EntityAction::StatusSet { id, status, .. } => {
                state.loading = false;
                let targets = state
                    .items
                    .iter_mut()
                    .chain(state.current.as_mut())
                    .filter(|r| r.id == id);
                for record in targets {
                    record.status = Some(status.clone());
                    record.attributes.remove(K::STATUS_FIELD);
                }
                tracing::debug!(entity = K::NAME, %id, ?status, "Status changed");
                smallvec![Effect::None]
            },

            EntityAction::Failed { op, seq, error, .. } => {
                if self.is_stale(state, op, seq) {
                    tracing::debug!(entity = K::NAME, ?seq, "Discarding stale list failure");
                    return smallvec![Effect::None];
                }
                Self::fail(state, op, error)
            },

            EntityAction::ClearError => {
                state.error = None;
                smallvec![Effect::None]
            },

            EntityAction::SetCurrent { record } => {
                state.current = record;
                smallvec![Effect::None]
            },

            EntityAction::Clear | EntityAction::Reset => {
                state.reset();
                smallvec![Effect::None]
            },
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::entities::{Concert, ConcertStatus, Order};
    use crate::error::FailureKind;
    use crate::resolver::QueryParams;
    use crate::test_support::env;
    use backstage_testing::{assertions, ReducerTest, ScriptedTransport};
    use serde_json::json;

    type ConcertReducer = EntityReducer<Concert, ScriptedTransport>;

    fn record(id: &str, title: &str) -> Record<ConcertStatus> {
        Record::from_json::<Concert>(&json!({"id": id, "title": title, "status": 1})).unwrap()
    }

    fn listed(seq: u64, body: Value) -> EntityAction<Concert> {
        EntityAction::Listed { ticket: Ticket(seq), seq, body }
    }

    fn state_with(items: Vec<Record<ConcertStatus>>) -> EntityState<Concert> {
        EntityState {
            items,
            ..EntityState::default()
        }
    }

    #[test]
    fn list_request_sets_loading_and_issues_effect() {
        ReducerTest::new(ConcertReducer::new())
            .with_env(env())
            .given_state(state_with(vec![]))
            .when_action(EntityAction::List {
                ticket: Ticket(1),
                query: ListQuery::all(QueryParams::default()),
            })
            .then_state(|s| {
                assert!(s.loading);
                assert!(s.error.is_none());
                assert_eq!(s.list_seq(), 1);
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn failed_list_keeps_items() {
        let error = ErrorInfo::new(FailureKind::Network, "offline");
        ReducerTest::new(ConcertReducer::new())
            .with_env(env())
            .given_state(EntityState {
                loading: true,
                ..state_with(vec![record("a", "A"), record("b", "B")])
            })
            .when_action(EntityAction::Failed {
                ticket: Ticket(1),
                op: Operation::List,
                seq: Some(1),
                error: error.clone(),
            })
            .then_state(move |s| {
                assert_eq!(s.items.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), ["a", "b"]);
                assert!(!s.loading);
                assert_eq!(s.error, Some(error));
            })
            .run();
    }

    #[test]
    fn create_prepends() {
        ReducerTest::new(ConcertReducer::new())
            .with_env(env())
            .given_state(state_with(vec![record("a", "A")]))
            .when_action(EntityAction::Created {
                ticket: Ticket(1),
                body: json!({"data": {"id_concert": "n", "title": "New"}}),
            })
            .then_state(|s| {
                assert_eq!(s.items[0].id, "n");
                assert_eq!(s.items.len(), 2);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn update_miss_is_tolerated() {
        ReducerTest::new(ConcertReducer::new())
            .with_env(env())
            .given_state(state_with(vec![record("a", "A")]))
            .when_action(EntityAction::Updated {
                ticket: Ticket(1),
                id: "zzz".into(),
                body: json!({"message": "updated"}),
                patch: Map::new(),
            })
            .then_state(|s| {
                assert_eq!(s.items.len(), 1);
                assert_eq!(s.items[0], record("a", "A"));
            })
            .run();
    }

    #[test]
    fn update_without_echo_merges_payload() {
        let patch = json!({"title": "Renamed"}).as_object().cloned().unwrap();
        ReducerTest::new(ConcertReducer::new())
            .with_env(env())
            .given_state(EntityState {
                current: Some(record("a", "A")),
                ..state_with(vec![record("a", "A")])
            })
            .when_action(EntityAction::Updated {
                ticket: Ticket(1),
                id: "a".into(),
                body: json!({"message": "ok"}),
                patch,
            })
            .then_state(|s| {
                assert_eq!(s.items[0].get("title"), Some(&json!("Renamed")));
                assert_eq!(s.current.as_ref().unwrap().get("title"), Some(&json!("Renamed")));
            })
            .run();
    }

    #[test]
    fn remove_clears_matching_current() {
        ReducerTest::new(ConcertReducer::new())
            .with_env(env())
            .given_state(EntityState {
                current: Some(record("b", "B")),
                ..state_with(vec![record("a", "A"), record("b", "B")])
            })
            .when_action(EntityAction::Removed { ticket: Ticket(1), id: "b".into() })
            .then_state(|s| {
                assert_eq!(s.items.len(), 1);
                assert!(s.current.is_none());
            })
            .run();
    }

    #[test]
    fn status_patch_leaves_other_fields_untouched() {
        let before = record("a", "A");
        let expected_attributes = before.attributes.clone();
        ReducerTest::new(ConcertReducer::new())
            .with_env(env())
            .given_state(EntityState {
                current: Some(before.clone()),
                ..state_with(vec![before, record("b", "B")])
            })
            .when_action(EntityAction::StatusSet {
                ticket: Ticket(1),
                id: "a".into(),
                status: ConcertStatus::Inactive,
            })
            .then_state(move |s| {
                assert_eq!(s.items[0].status, Some(ConcertStatus::Inactive));
                assert_eq!(s.items[0].attributes, expected_attributes);
                assert_eq!(s.current.as_ref().unwrap().status, Some(ConcertStatus::Inactive));
                assert_eq!(s.items[1].status, Some(ConcertStatus::Active));
            })
            .run();
    }

    #[tokio::test]
    async fn unsupported_operation_answers_without_a_request() {
        let reducer = EntityReducer::<Order, ScriptedTransport>::new();
        let env = env();
        let mut state = EntityState::default();

        let effects = reducer.reduce(&mut state, EntityAction::Remove { ticket: Ticket(4), id: "1".into() }, &env);
        assert!(!state.loading);

        let fed_back = backstage_testing::run_effects(effects).await;
        let [EntityAction::Failed { ticket, op, error, .. }] = fed_back.as_slice() else {
            panic!("expected one failure, got {fed_back:?}");
        };
        assert_eq!(*ticket, Ticket(4));
        assert_eq!(*op, Operation::Remove);
        assert_eq!(error.kind, FailureKind::Unsupported);
        assert_eq!(env.gateway.transport().request_count(), 0);
    }

    #[test]
    fn stale_list_completion_is_discarded_when_enabled() {
        let reducer = ConcertReducer::new().discarding_stale_lists(true);
        let env = env();
        let mut state = EntityState::default();
        let query = ListQuery::all(QueryParams::default());

        let _ = reducer.reduce(&mut state, EntityAction::List { ticket: Ticket(1), query: query.clone() }, &env);
        let _ = reducer.reduce(&mut state, EntityAction::List { ticket: Ticket(2), query }, &env);
        let _ = reducer.reduce(&mut state, listed(2, json!([{"id": "new"}])), &env);
        let _ = reducer.reduce(&mut state, listed(1, json!([{"id": "old"}])), &env);

        assert_eq!(state.items.len(), 1);
        assert_eq!(state.items[0].id, "new");
    }

    #[test]
    fn stale_list_completion_applies_by_default() {
        let reducer = ConcertReducer::new();
        let env = env();
        let mut state = EntityState::default();

        let _ = reducer.reduce(&mut state, listed(2, json!([{"id": "new"}])), &env);
        let _ = reducer.reduce(&mut state, listed(1, json!([{"id": "old"}])), &env);

        assert_eq!(state.items[0].id, "old");
    }

    #[test]
    fn clear_resets_page_and_cache() {
        let reducer = ConcertReducer::new();
        let env = env();
        let mut state = EntityState::default();
        let _ = reducer.reduce(
            &mut state,
            listed(0, json!({"data": [{"id": 1}], "totalPages": 3})),
            &env,
        );
        assert_eq!(state.page.total_pages, 3);

        let _ = reducer.reduce(&mut state, EntityAction::Clear, &env);
        assert!(state.is_empty_cache());
    }
}

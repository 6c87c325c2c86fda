//! Root reducer
//!
//! Combines the session slice and one entity slice per kind. Session teardown
//! (logout, or an auth failure anywhere) is a single [`AppAction::ResetAll`]
//! that every slice handles in the same reduction, so no slice is ever seen
//! holding data after the session is gone.

use backstage_core::composition::{combine_reducers, scope_reducer, BoxedReducer, CombinedReducer};
use backstage_core::{effect::Effect, reducer::Reducer, SmallVec};
use backstage_gateway::Transport;

use crate::entities::{Concert, Order, Organizer, Transaction, User};
use crate::environment::StoreEnvironment;
use crate::kind::EntityKind;
use crate::session::{SessionAction, SessionReducer, SessionState};
use crate::slice::{EntityAction, EntityReducer, EntityState};

/// Session teardowns (logout or auth failure), labelled by `cause`
pub const SESSION_TEARDOWNS: &str = "backstage.session.teardowns";

/// State of the whole store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    /// Session slice
    pub session: SessionState,
    /// Concert cache
    pub concerts: EntityState<Concert>,
    /// Order cache
    pub orders: EntityState<Order>,
    /// Organizer cache
    pub organizers: EntityState<Organizer>,
    /// User cache
    pub users: EntityState<User>,
    /// Transaction cache
    pub transactions: EntityState<Transaction>,
}

impl AppState {
    /// Whether every entity slice is back to its initial contents
    #[must_use]
    pub fn caches_empty(&self) -> bool {
        self.concerts.is_empty_cache()
            && self.orders.is_empty_cache()
            && self.organizers.is_empty_cache()
            && self.users.is_empty_cache()
            && self.transactions.is_empty_cache()
    }
}

/// Actions of the whole store
#[derive(Debug, Clone, PartialEq)]
pub enum AppAction {
    /// Session slice action
    Session(SessionAction),
    /// Concert slice action
    Concerts(EntityAction<Concert>),
    /// Order slice action
    Orders(EntityAction<Order>),
    /// Organizer slice action
    Organizers(EntityAction<Organizer>),
    /// User slice action
    Users(EntityAction<User>),
    /// Transaction slice action
    Transactions(EntityAction<Transaction>),
    /// Return every slice to its initial state
    ResetAll,
}

impl AppAction {
    /// Whether reducing this action ends the session
    ///
    /// Logout, or an auth failure on any entity slice. Failed logins and
    /// restores are not teardowns: there was no session to end.
    #[must_use]
    pub fn ends_session(&self) -> bool {
        match self {
            Self::Session(SessionAction::Logout) => true,
            Self::Session(_) | Self::ResetAll => false,
            Self::Concerts(a) => a.is_auth_failure(),
            Self::Orders(a) => a.is_auth_failure(),
            Self::Organizers(a) => a.is_auth_failure(),
            Self::Users(a) => a.is_auth_failure(),
            Self::Transactions(a) => a.is_auth_failure(),
        }
    }
}

/// An entity kind with a slice in [`AppState`]
pub trait AppSlice: EntityKind {
    /// Lift a slice action into the root action
    fn wrap(action: EntityAction<Self>) -> AppAction;

    /// The slice action inside `action`, if it targets this slice
    fn unwrap(action: &AppAction) -> Option<&EntityAction<Self>>;

    /// This kind's slice
    fn slice(state: &AppState) -> &EntityState<Self>;
}

macro_rules! app_slice {
    ($kind:ty, $field:ident, $variant:ident) => {
        impl AppSlice for $kind {
            fn wrap(action: EntityAction<Self>) -> AppAction {
                AppAction::$variant(action)
            }

            fn unwrap(action: &AppAction) -> Option<&EntityAction<Self>> {
                match action {
                    AppAction::$variant(a) => Some(a),
                    _ => None,
                }
            }

            fn slice(state: &AppState) -> &EntityState<Self> {
                &state.$field
            }
        }
    };
}

app_slice!(Concert, concerts, Concerts);
app_slice!(Order, orders, Orders);
app_slice!(Organizer, organizers, Organizers);
app_slice!(User, users, Users);
app_slice!(Transaction, transactions, Transactions);

type AppEffects = SmallVec<[Effect<AppAction>; 4]>;

macro_rules! entity_slice {
    ($kind:ty, $field:ident, $variant:ident, $discard:expr) => {
        Box::new(scope_reducer(
            EntityReducer::<$kind, T>::new().discarding_stale_lists($discard),
            |s: &mut AppState| &mut s.$field,
            |a| match a {
                AppAction::$variant(a) => Some(a),
                AppAction::ResetAll => Some(EntityAction::Reset),
                _ => None,
            },
            AppAction::$variant,
        ))
    };
}

/// Root reducer of the store
pub struct AppReducer<T: Transport> {
    slices: CombinedReducer<AppState, AppAction, StoreEnvironment<T>>,
}

impl<T: Transport> AppReducer<T> {
    /// Build the root reducer
    ///
    /// With `discard_stale_lists`, every entity slice ignores list
    /// completions older than its most recently issued list request.
    #[must_use]
    pub fn new(discard_stale_lists: bool) -> Self {
        let session: BoxedReducer<AppState, AppAction, StoreEnvironment<T>> = Box::new(scope_reducer(
            SessionReducer::<T>::new(),
            |s: &mut AppState| &mut s.session,
            |a| match a {
                AppAction::Session(a) => Some(a),
                AppAction::ResetAll => Some(SessionAction::Reset),
                _ => None,
            },
            AppAction::Session,
        ));

        let slices = combine_reducers(vec![
            session,
            entity_slice!(Concert, concerts, Concerts, discard_stale_lists),
            entity_slice!(Order, orders, Orders, discard_stale_lists),
            entity_slice!(Organizer, organizers, Organizers, discard_stale_lists),
            entity_slice!(User, users, Users, discard_stale_lists),
            entity_slice!(Transaction, transactions, Transactions, discard_stale_lists),
        ]);

        Self { slices }
    }
}

impl<T: Transport> Default for AppReducer<T> {
    fn default() -> Self {
        Self::new(false)
    }
}

impl<T: Transport> Reducer for AppReducer<T> {
    type State = AppState;
    type Action = AppAction;
    type Environment = StoreEnvironment<T>;

    fn reduce(&self, state: &mut AppState, action: AppAction, env: &Self::Environment) -> AppEffects {
        let teardown = action.ends_session();
        let logout = matches!(action, AppAction::Session(SessionAction::Logout));
        let mut effects = self.slices.reduce(state, action, env);

        if teardown {
            let cause = if logout { "logout" } else { "auth_failure" };
            tracing::info!(cause, "Session ended; resetting every slice");
            metrics::counter!(SESSION_TEARDOWNS, "cause" => cause).increment(1);
            effects.extend(self.slices.reduce(state, AppAction::ResetAll, env));
        }

        effects
    }
}

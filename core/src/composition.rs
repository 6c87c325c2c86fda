//! Reducer composition utilities
//!
//! - **`combine_reducers`**: Run several reducers over the same state/action, in order
//! - **`scope_reducer`**: Embed a child reducer (its own state *and* action type)
//!   inside a parent
//!
//! The entity store builds its root reducer from these: one scoped reducer per
//! slice, combined so a single broadcast action reaches every slice.

use crate::effect::Effect;
use crate::reducer::Reducer;
use smallvec::SmallVec;

/// Boxed reducer with fixed state, action and environment types
pub type BoxedReducer<S, A, E> = Box<dyn Reducer<State = S, Action = A, Environment = E> + Send + Sync>;

/// Combines multiple reducers that operate on the same state and action types.
///
/// Each reducer receives a clone of the action, in registration order, and
/// all effects are concatenated.
///
/// # Examples
///
/// ```
/// use backstage_core::{smallvec, Effect, Reducer, SmallVec};
/// use backstage_core::composition::combine_reducers;
///
/// #[derive(Default)]
/// struct Totals { seen: u32, flagged: bool }
///
/// #[derive(Clone)]
/// enum Event { Seen, Flag }
///
/// struct Counter;
/// struct Flagger;
///
/// impl Reducer for Counter {
///     type State = Totals;
///     type Action = Event;
///     type Environment = ();
///     fn reduce(&self, s: &mut Totals, a: Event, _: &()) -> SmallVec<[Effect<Event>; 4]> {
///         if matches!(a, Event::Seen) { s.seen += 1; }
///         smallvec![Effect::None]
///     }
/// }
///
/// impl Reducer for Flagger {
///     type State = Totals;
///     type Action = Event;
///     type Environment = ();
///     fn reduce(&self, s: &mut Totals, a: Event, _: &()) -> SmallVec<[Effect<Event>; 4]> {
///         if matches!(a, Event::Flag) { s.flagged = true; }
///         smallvec![Effect::None]
///     }
/// }
///
/// let combined = combine_reducers(vec![Box::new(Counter), Box::new(Flagger)]);
/// let mut state = Totals::default();
/// let _ = combined.reduce(&mut state, Event::Seen, &());
/// assert_eq!(state.seen, 1);
/// ```
#[must_use]
pub fn combine_reducers<S, A, E>(reducers: Vec<BoxedReducer<S, A, E>>) -> CombinedReducer<S, A, E>
where
    A: Clone,
{
    CombinedReducer { reducers }
}

/// A combined reducer that runs multiple reducers in sequence.
///
/// Created by [`combine_reducers`].
pub struct CombinedReducer<S, A, E> {
    reducers: Vec<BoxedReducer<S, A, E>>,
}

impl<S, A, E> CombinedReducer<S, A, E> {
    /// Number of reducers combined
    #[must_use]
    pub fn len(&self) -> usize {
        self.reducers.len()
    }

    /// Whether no reducer was combined
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reducers.is_empty()
    }
}

impl<S, A, E> Reducer for CombinedReducer<S, A, E>
where
    A: Clone,
{
    type State = S;
    type Action = A;
    type Environment = E;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let mut all_effects = SmallVec::new();

        for reducer in &self.reducers {
            let effects = reducer.reduce(state, action.clone(), env);
            all_effects.extend(effects.into_iter().filter(|e| !e.is_none()));
        }

        all_effects
    }
}

/// Scopes a child reducer into a parent state and parent action.
///
/// - `state`: focuses the parent state onto the child's state
/// - `extract`: picks the child action out of a parent action (`None` = not for this child)
/// - `embed`: wraps child actions produced by effects back into the parent type
///
/// # Examples
///
/// ```
/// use backstage_core::{smallvec, Effect, Reducer, SmallVec};
/// use backstage_core::composition::scope_reducer;
///
/// #[derive(Default)]
/// struct Tally { value: i32 }
///
/// #[derive(Clone)]
/// enum TallyAction { Add(i32) }
///
/// struct TallyReducer;
///
/// impl Reducer for TallyReducer {
///     type State = Tally;
///     type Action = TallyAction;
///     type Environment = ();
///     fn reduce(&self, s: &mut Tally, a: TallyAction, _: &()) -> SmallVec<[Effect<TallyAction>; 4]> {
///         let TallyAction::Add(n) = a;
///         s.value += n;
///         smallvec![Effect::None]
///     }
/// }
///
/// #[derive(Default)]
/// struct Dashboard { tally: Tally, title: String }
///
/// #[derive(Clone)]
/// enum DashboardAction { Tally(TallyAction), Rename(String) }
///
/// let scoped = scope_reducer(
///     TallyReducer,
///     |d: &mut Dashboard| &mut d.tally,
///     |a| match a { DashboardAction::Tally(t) => Some(t), DashboardAction::Rename(_) => None },
///     DashboardAction::Tally,
/// );
///
/// let mut state = Dashboard::default();
/// let _ = scoped.reduce(&mut state, DashboardAction::Tally(TallyAction::Add(3)), &());
/// assert_eq!(state.tally.value, 3);
/// ```
pub const fn scope_reducer<S, SubS, A, SubA, E, R>(
    reducer: R,
    state: fn(&mut S) -> &mut SubS,
    extract: fn(A) -> Option<SubA>,
    embed: fn(SubA) -> A,
) -> ScopedReducer<S, SubS, A, SubA, E, R>
where
    R: Reducer<State = SubS, Action = SubA, Environment = E>,
{
    ScopedReducer {
        reducer,
        state,
        extract,
        embed,
    }
}

/// A reducer focused on a subset of state and actions.
///
/// Created by [`scope_reducer`].
pub struct ScopedReducer<S, SubS, A, SubA, E, R>
where
    R: Reducer<State = SubS, Action = SubA, Environment = E>,
{
    reducer: R,
    state: fn(&mut S) -> &mut SubS,
    extract: fn(A) -> Option<SubA>,
    embed: fn(SubA) -> A,
}

impl<S, SubS, A, SubA, E, R> Reducer for ScopedReducer<S, SubS, A, SubA, E, R>
where
    R: Reducer<State = SubS, Action = SubA, Environment = E>,
    A: 'static,
    SubA: 'static,
{
    type State = S;
    type Action = A;
    type Environment = E;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let Some(child_action) = (self.extract)(action) else {
            return SmallVec::new();
        };

        let child_state = (self.state)(state);
        let embed = self.embed;

        self.reducer
            .reduce(child_state, child_action, env)
            .into_iter()
            .map(|effect| effect.map(embed))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smallvec;

    #[derive(Default)]
    struct ListState {
        items: Vec<u32>,
    }

    #[derive(Clone, Debug)]
    enum ListAction {
        Push(u32),
        Reset,
    }

    struct ListReducer;

    impl Reducer for ListReducer {
        type State = ListState;
        type Action = ListAction;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]> {
            match action {
                ListAction::Push(n) => state.items.push(n),
                ListAction::Reset => state.items.clear(),
            }
            smallvec![Effect::None]
        }
    }

    #[derive(Default)]
    struct Root {
        left: ListState,
        right: ListState,
    }

    #[derive(Clone, Debug)]
    enum RootAction {
        Left(ListAction),
        Right(ListAction),
        ResetAll,
    }

    fn root() -> CombinedReducer<Root, RootAction, ()> {
        combine_reducers(vec![
            Box::new(scope_reducer(
                ListReducer,
                |r: &mut Root| &mut r.left,
                |a| match a {
                    RootAction::Left(a) => Some(a),
                    RootAction::ResetAll => Some(ListAction::Reset),
                    RootAction::Right(_) => None,
                },
                RootAction::Left,
            )),
            Box::new(scope_reducer(
                ListReducer,
                |r: &mut Root| &mut r.right,
                |a| match a {
                    RootAction::Right(a) => Some(a),
                    RootAction::ResetAll => Some(ListAction::Reset),
                    RootAction::Left(_) => None,
                },
                RootAction::Right,
            )),
        ])
    }

    #[test]
    fn scoped_actions_only_reach_their_slice() {
        let reducer = root();
        let mut state = Root::default();

        let _ = reducer.reduce(&mut state, RootAction::Left(ListAction::Push(1)), &());
        let _ = reducer.reduce(&mut state, RootAction::Right(ListAction::Push(2)), &());

        assert_eq!(state.left.items, vec![1]);
        assert_eq!(state.right.items, vec![2]);
    }

    #[test]
    fn broadcast_action_reaches_every_slice() {
        let reducer = root();
        let mut state = Root::default();
        let _ = reducer.reduce(&mut state, RootAction::Left(ListAction::Push(1)), &());
        let _ = reducer.reduce(&mut state, RootAction::Right(ListAction::Push(2)), &());

        let effects = reducer.reduce(&mut state, RootAction::ResetAll, &());

        assert!(state.left.items.is_empty());
        assert!(state.right.items.is_empty());
        assert!(effects.is_empty());
    }
}

//! Integration tests for Store action broadcasting
//!
//! Observers see every action dispatched into the store, including the
//! responses fed back by effects, in dispatch order.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use backstage_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
use backstage_runtime::{Store, StoreConfig, StoreError};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
enum FetchAction {
    /// Request a page of items
    Fetch { page: u32 },
    /// Page arrived
    Fetched { page: u32, items: Vec<u32> },
    /// Request failed
    Failed { page: u32 },
}

#[derive(Debug, Clone, Default)]
struct FetchState {
    loading: bool,
    items: Vec<u32>,
    failures: u32,
}

struct FetchReducer;

impl Reducer for FetchReducer {
    type State = FetchState;
    type Action = FetchAction;
    type Environment = Duration;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        latency: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            FetchAction::Fetch { page } => {
                state.loading = true;
                let latency = *latency;
                smallvec![Effect::Future(Box::pin(async move {
                    tokio::time::sleep(latency).await;
                    if page == 0 {
                        Some(FetchAction::Failed { page })
                    } else {
                        Some(FetchAction::Fetched {
                            page,
                            items: vec![page * 10, page * 10 + 1],
                        })
                    }
                }))]
            },
            FetchAction::Fetched { items, .. } => {
                state.loading = false;
                state.items = items;
                smallvec![Effect::None]
            },
            FetchAction::Failed { .. } => {
                state.loading = false;
                state.failures += 1;
                smallvec![Effect::None]
            },
        }
    }
}

fn store(latency_ms: u64) -> Store<FetchState, FetchAction, Duration, FetchReducer> {
    Store::new(
        FetchState::default(),
        FetchReducer,
        Duration::from_millis(latency_ms),
    )
}

#[tokio::test]
async fn observers_see_request_then_response() {
    let store = store(5);
    let mut rx = store.subscribe_actions();

    store.send_and_settle(FetchAction::Fetch { page: 2 }).await.unwrap();

    assert_eq!(rx.recv().await.unwrap(), FetchAction::Fetch { page: 2 });
    assert_eq!(
        rx.recv().await.unwrap(),
        FetchAction::Fetched {
            page: 2,
            items: vec![20, 21]
        }
    );
}

#[tokio::test]
async fn loading_is_visible_while_the_effect_runs() {
    let store = store(50);

    let mut handle = store.send(FetchAction::Fetch { page: 1 }).await.unwrap();
    assert!(store.state(|s| s.loading).await);
    assert_eq!(handle.pending(), 1);

    handle.wait().await;
    assert!(!store.state(|s| s.loading).await);
    assert_eq!(store.state(|s| s.items.clone()).await, vec![10, 11]);
}

#[tokio::test]
async fn send_and_wait_for_matches_failure_outcome() {
    let store = store(1);

    let outcome = store
        .send_and_wait_for(
            FetchAction::Fetch { page: 0 },
            |a| matches!(a, FetchAction::Fetched { .. } | FetchAction::Failed { .. }),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

    assert_eq!(outcome, FetchAction::Failed { page: 0 });
}

#[tokio::test]
async fn send_and_wait_for_times_out() {
    let store = store(200);

    let result = store
        .send_and_wait_for(
            FetchAction::Fetch { page: 1 },
            |a| matches!(a, FetchAction::Fetched { .. }),
            Duration::from_millis(20),
        )
        .await;

    assert!(matches!(result, Err(StoreError::Timeout)));
}

#[tokio::test]
async fn last_settled_response_wins() {
    let store = store(0);

    // Two concurrent fetches: whichever completes last determines the items
    let (a, b) = tokio::join!(
        store.send_and_settle(FetchAction::Fetch { page: 1 }),
        store.send_and_settle(FetchAction::Fetch { page: 3 }),
    );
    a.unwrap();
    b.unwrap();

    let items = store.state(|s| s.items.clone()).await;
    assert!(items == vec![10, 11] || items == vec![30, 31]);
}

#[tokio::test]
async fn shutdown_waits_for_running_effects() {
    let store = Store::with_config(
        FetchState::default(),
        FetchReducer,
        Duration::from_millis(30),
        StoreConfig::default().with_broadcast_capacity(8),
    );

    store.send(FetchAction::Fetch { page: 1 }).await.unwrap();
    store.shutdown(Duration::from_secs(1)).await.unwrap();

    assert_eq!(store.pending_effects(), 0);
}

//! # Backstage Testing
//!
//! Testing utilities for the Backstage entity store.
//!
//! This crate provides:
//! - [`ReducerTest`]: Given/When/Then harness for reducers, plus effect assertions
//! - [`run_effects`]: drives effects to completion without a store
//! - [`ScriptedTransport`] and [`RecordingRedirect`]: in-memory gateway collaborators
//! - [`FixedClock`]: deterministic time
//! - [`fixtures`]: server response bodies in the shapes the backend uses
//!
//! ## Example
//!
//! ```ignore
//! use backstage_testing::{fixtures, ScriptedTransport};
//! use backstage_gateway::Method;
//!
//! #[tokio::test]
//! async fn concerts_load() {
//!     let transport = ScriptedTransport::new()
//!         .on(Method::Get, "/api/concert", 200, fixtures::wrapped_in_data(fixtures::concerts()));
//!     let store = store_over(transport.clone());
//!
//!     store.list::<Concert>(QueryParams::default()).await.unwrap();
//!
//!     assert_eq!(store.state(|s| s.concerts.items.len()).await, 2);
//!     assert_eq!(transport.request_count(), 1);
//! }
//! ```

use backstage_core::environment::Clock;
use chrono::{DateTime, Utc};

pub mod transport_mocks;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use backstage_testing::mocks::FixedClock;
    /// use backstage_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Driving effects outside a store
pub mod effects {
    use backstage_core::effect::Effect;

    /// Run `effects` to completion and collect the actions they produce
    ///
    /// Futures are awaited one at a time, in order, so the result is
    /// deterministic. Produced actions are not reduced.
    pub async fn run_effects<A: Send + 'static>(effects: impl IntoIterator<Item = Effect<A>>) -> Vec<A> {
        let mut produced = Vec::new();
        for effect in effects {
            if let Effect::Future(fut) = effect {
                produced.extend(fut.await);
            }
        }
        produced
    }
}

/// Server response bodies in the shapes the backend produces
pub mod fixtures {
    use serde_json::{json, Value};

    /// Two concerts with backend field names and numeric status flags
    #[must_use]
    pub fn concerts() -> Value {
        json!([
            {"id_concert": 1, "title": "Java Jazz", "status": 1, "id_organizer": 7, "price": "750000"},
            {"id_concert": 2, "title": "Soundrenaline", "status": 0, "id_organizer": 7, "price": 500000},
        ])
    }

    /// Orders in mixed statuses, amounts as strings and numbers
    #[must_use]
    pub fn orders() -> Value {
        json!([
            {"id_order": 10, "status": "completed", "total_price": "1000"},
            {"id_order": 11, "status": "pending", "total_price": 500},
            {"id_order": 12, "status": "completed", "total_price": 2000},
        ])
    }

    /// Login response for an organizer
    #[must_use]
    pub fn organizer_login(id: u64, status: &str) -> Value {
        json!({
            "message": "Login successful",
            "token": "organizer-token",
            "organizer": {
                "id_organizer": id,
                "name": "Organizer",
                "email": "organizer@example.com",
                "status": status,
            }
        })
    }

    /// Login response for an administrator
    #[must_use]
    pub fn admin_login() -> Value {
        json!({
            "token": "admin-token",
            "data": {"user": {"id": 1, "name": "Admin", "email": "admin@example.com", "role": "admin"}}
        })
    }

    /// `{data: [...]}`
    #[must_use]
    pub fn wrapped_in_data(items: Value) -> Value {
        json!({ "data": items })
    }

    /// `{<key>: [...]}`
    #[must_use]
    pub fn wrapped_in(key: &str, items: Value) -> Value {
        let mut object = serde_json::Map::new();
        object.insert(key.to_string(), items);
        Value::Object(object)
    }

    /// The backend's 401 body
    #[must_use]
    pub fn unauthorized() -> Value {
        json!({"message": "Unauthorized"})
    }
}

/// Property-based testing strategies
pub mod properties {
    use proptest::prelude::*;

    /// Canonical ids from a small pool, so generated operations collide often
    ///
    /// Drawn from the same pool as [`wire_id`].
    pub fn colliding_id() -> impl Strategy<Value = String> {
        (0u32..6).prop_map(|n| n.to_string())
    }

    /// Ids as the backend sends them: numbers or numeric strings
    pub fn wire_id() -> impl Strategy<Value = serde_json::Value> {
        prop_oneof![
            (0u32..6).prop_map(serde_json::Value::from),
            (0u32..6).prop_map(|n| serde_json::Value::from(n.to_string())),
        ]
    }
}

// Re-export commonly used items
pub use effects::run_effects;
pub use mocks::{test_clock, FixedClock};
pub use reducer_test::{assertions, ReducerTest};
pub use transport_mocks::{RecordingRedirect, ScriptedTransport};

#[cfg(test)]
mod tests {
    use super::*;
    use backstage_core::effect::Effect;
    use backstage_core::async_effect;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[tokio::test]
    async fn run_effects_collects_in_order() {
        let effects: Vec<Effect<u8>> = vec![
            async_effect! { Some(1) },
            Effect::None,
            async_effect! { Some(2) },
            async_effect! { None::<u8> },
            async_effect! { Some(3) },
        ];

        assert_eq!(run_effects(effects).await, vec![1, 2, 3]);
    }
}

//! Metric names and descriptions for the store runtime.
//!
//! The runtime only records through the `metrics` facade; installing a
//! recorder (Prometheus, statsd, ...) is left to the embedding application.
//! Call [`register_metrics`] once after installing one so the descriptions
//! show up alongside the values.

use metrics::{describe_counter, describe_gauge, describe_histogram};

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

/// Actions dispatched into a store (initial and effect feedback)
pub const ACTIONS_TOTAL: &str = "store.actions.total";
/// Actions rejected because the store was shutting down
pub const ACTIONS_REJECTED: &str = "store.actions.rejected";
/// Reducer execution time
pub const REDUCER_DURATION: &str = "store.reducer.duration_seconds";
/// Effects executed, labelled by `type`
pub const EFFECTS_EXECUTED: &str = "store.effects.executed";
/// Effects currently running
pub const EFFECTS_PENDING: &str = "store.effects.pending";

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(ACTIONS_TOTAL, "Total number of actions dispatched into a store");
    describe_counter!(
        ACTIONS_REJECTED,
        "Actions rejected because the store was shutting down"
    );
    describe_histogram!(REDUCER_DURATION, "Time taken to run the reducer for one action");
    describe_counter!(EFFECTS_EXECUTED, "Total number of effects executed, by type");
    describe_gauge!(EFFECTS_PENDING, "Number of effects currently in flight");
}

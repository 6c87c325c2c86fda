//! Derived views
//!
//! Pure functions over a slice's cached `items`. Nothing here is memoized;
//! every call recomputes from the records it is given.

use serde_json::Value;

use crate::app::AppState;
use crate::entities::{ConcertStatus, OrderStatus, TransactionStatus};
use crate::kind::EntityStatus;
use crate::record::Record;

/// Record counts per status, in order of first appearance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusHistogram<S> {
    counts: Vec<(S, usize)>,
    unknown: usize,
}

impl<S: EntityStatus> StatusHistogram<S> {
    /// Count `items` by status
    #[must_use]
    pub fn from_records(items: &[Record<S>]) -> Self {
        let mut counts: Vec<(S, usize)> = Vec::new();
        let mut unknown = 0;

        for record in items {
            let Some(status) = &record.status else {
                unknown += 1;
                continue;
            };
            match counts.iter_mut().find(|(s, _)| s == status) {
                Some((_, count)) => *count += 1,
                None => counts.push((status.clone(), 1)),
            }
        }

        Self { counts, unknown }
    }

    /// Records with `status`
    #[must_use]
    pub fn get(&self, status: &S) -> usize {
        self.counts
            .iter()
            .find(|(s, _)| s == status)
            .map_or(0, |(_, count)| *count)
    }

    /// Records whose status is missing or unrecognised
    #[must_use]
    pub const fn unknown(&self) -> usize {
        self.unknown
    }

    /// All counted records
    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.iter().map(|(_, c)| c).sum::<usize>() + self.unknown
    }

    /// `(status, count)` pairs in order of first appearance
    pub fn iter(&self) -> impl Iterator<Item = (&S, usize)> {
        self.counts.iter().map(|(s, c)| (s, *c))
    }
}

/// Read an amount that may be a JSON number or a numeric string
///
/// Anything else, including strings that do not parse and non-finite
/// values, counts as zero.
#[must_use]
pub fn coerce_amount(value: Option<&Value>) -> f64 {
    let amount = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    amount.filter(|a| a.is_finite()).unwrap_or(0.0)
}

/// Sum `field` over the records in `status`
#[must_use]
pub fn amount_rollup<S: EntityStatus>(items: &[Record<S>], status: &S, field: &str) -> f64 {
    items
        .iter()
        .filter(|r| r.status.as_ref() == Some(status))
        .map(|r| coerce_amount(r.get(field)))
        .sum()
}

/// Accumulated amount of one group
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct GroupTotal {
    /// Value of the grouping field; empty when the record had none
    pub key: String,
    /// Sum of the amount field
    pub total: f64,
    /// Records in the group
    pub count: usize,
}

fn group_key(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Sum `amount_field` per distinct value of `group_field`
///
/// Only records in `status` are counted when one is given. Groups are
/// returned in order of first appearance.
#[must_use]
pub fn grouped_rollup<S: EntityStatus>(
    items: &[Record<S>],
    status: Option<&S>,
    group_field: &str,
    amount_field: &str,
) -> Vec<GroupTotal> {
    let mut groups: Vec<GroupTotal> = Vec::new();

    let selected = items
        .iter()
        .filter(|r| status.is_none() || r.status.as_ref() == status);

    for record in selected {
        let key = group_key(record.get(group_field));
        let amount = coerce_amount(record.get(amount_field));
        match groups.iter_mut().find(|g| g.key == key) {
            Some(group) => {
                group.total += amount;
                group.count += 1;
            },
            None => groups.push(GroupTotal { key, total: amount, count: 1 }),
        }
    }

    groups
}

/// Field holding a transaction's or order's price
pub const PRICE_FIELD: &str = "total_price";

/// Approved transaction revenue per concert title
#[must_use]
pub fn revenue_by_concert(transactions: &[Record<TransactionStatus>]) -> Vec<GroupTotal> {
    grouped_rollup(transactions, Some(&TransactionStatus::Approved), "concert_title", PRICE_FIELD)
}

/// Headline figures of the admin dashboard, over the cached items
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DashboardSummary {
    /// Cached concerts
    pub total_concerts: usize,
    /// Cached concerts that are active
    pub active_concerts: usize,
    /// Cached orders
    pub total_orders: usize,
    /// Completed order value
    pub order_revenue: f64,
    /// Cached users
    pub total_users: usize,
    /// Cached organizers
    pub total_organizers: usize,
    /// Transactions awaiting a decision
    pub pending_transactions: usize,
    /// Approved transaction value
    pub total_revenue: f64,
}

impl DashboardSummary {
    /// Compute the summary from the current store state
    #[must_use]
    pub fn from_state(state: &AppState) -> Self {
        let concerts = StatusHistogram::from_records(&state.concerts.items);
        let transactions = StatusHistogram::from_records(&state.transactions.items);

        Self {
            total_concerts: state.concerts.items.len(),
            active_concerts: concerts.get(&ConcertStatus::Active),
            total_orders: state.orders.items.len(),
            order_revenue: amount_rollup(&state.orders.items, &OrderStatus::Completed, PRICE_FIELD),
            total_users: state.users.items.len(),
            total_organizers: state.organizers.items.len(),
            pending_transactions: transactions.get(&TransactionStatus::Pending)
                + transactions.get(&TransactionStatus::WaitingApprove),
            total_revenue: amount_rollup(&state.transactions.items, &TransactionStatus::Approved, PRICE_FIELD),
        }
    }
}

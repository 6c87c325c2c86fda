//! The backend's entity kinds and their status enumerations

use backstage_gateway::{Payload, Request};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::kind::{EntityKind, EntityStatus};
use crate::resolver::ListVariant;

macro_rules! string_status {
    ($name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl EntityStatus for $name {
            fn label(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Concert
// ---------------------------------------------------------------------------

/// Concert status, `1`/`0` on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum ConcertStatus {
    /// Published (`1`)
    Active,
    /// Hidden (`0`)
    Inactive,
}

impl TryFrom<Value> for ConcertStatus {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match &value {
            Value::Number(n) if n.as_i64() == Some(1) => Ok(Self::Active),
            Value::Number(n) if n.as_i64() == Some(0) => Ok(Self::Inactive),
            Value::Bool(true) => Ok(Self::Active),
            Value::Bool(false) => Ok(Self::Inactive),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "1" | "active" => Ok(Self::Active),
                "0" | "inactive" => Ok(Self::Inactive),
                _ => Err(format!("unknown concert status {s:?}")),
            },
            other => Err(format!("unknown concert status {other}")),
        }
    }
}

impl From<ConcertStatus> for Value {
    fn from(status: ConcertStatus) -> Self {
        match status {
            ConcertStatus::Active => Self::from(1),
            ConcertStatus::Inactive => Self::from(0),
        }
    }
}

string_status!(ConcertStatus { Active => "active", Inactive => "inactive" });

/// Concerts, owned by an organizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Concert;

impl EntityKind for Concert {
    type Status = ConcertStatus;

    const NAME: &'static str = "concert";
    const ID_FIELDS: &'static [&'static str] = &["id", "id_concert", "concert_id"];
    const LIST_KEYS: &'static [&'static str] = &["concerts", "listConcert", "listConcerts"];
    const RECORD_KEYS: &'static [&'static str] = &["concert"];
    const TOTAL_KEYS: &'static [&'static str] = &["totalConcerts", "totalConcert", "total"];
    const OWNER_SCOPED: bool = true;

    fn list_request(variant: &ListVariant) -> Option<Request> {
        match variant {
            ListVariant::All => Some(Request::get("/api/concert")),
            ListVariant::ByOwner(owner) => Some(Request::get(format!("/api/concert/organizer/{owner}"))),
            ListVariant::Detailed => None,
        }
    }

    fn get_request(id: &str) -> Option<Request> {
        Some(Request::get(format!("/api/concert/{id}")))
    }

    fn create_request(payload: Payload) -> Option<Request> {
        Some(Request::post("/api/concert/create").payload(payload))
    }

    fn update_request(id: &str, payload: Payload) -> Option<Request> {
        Some(Request::put(format!("/api/concert/{id}")).payload(payload))
    }

    fn delete_request(id: &str) -> Option<Request> {
        Some(Request::delete(format!("/api/concert/{id}")))
    }

    fn status_request(id: &str, status: &ConcertStatus) -> Option<Request> {
        // The status endpoint takes the label, not the numeric flag
        Some(Request::patch(format!("/api/concert/status/{id}")).json(json!({ "status": status.label() })))
    }
}

// ---------------------------------------------------------------------------
// Order
// ---------------------------------------------------------------------------

/// Order lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created, not paid
    Pending,
    /// Payment proof uploaded, awaiting review
    #[serde(alias = "waiting_approve")]
    WaitingConfirmation,
    /// Paid
    #[serde(alias = "paid")]
    Completed,
    /// Cancelled by the buyer or an admin
    Cancelled,
    /// Payment failed
    Failed,
}

string_status!(OrderStatus {
    Pending => "pending",
    WaitingConfirmation => "waiting_confirmation",
    Completed => "completed",
    Cancelled => "cancelled",
    Failed => "failed",
});

/// Ticket orders (read-only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Order;

impl EntityKind for Order {
    type Status = OrderStatus;

    const NAME: &'static str = "order";
    const ID_FIELDS: &'static [&'static str] = &["id", "id_order", "order_id"];
    const LIST_KEYS: &'static [&'static str] = &["orders", "listOrder", "listOrders"];
    const RECORD_KEYS: &'static [&'static str] = &["order"];
    const TOTAL_KEYS: &'static [&'static str] = &["totalOrders", "totalOrder", "total"];

    fn list_request(variant: &ListVariant) -> Option<Request> {
        match variant {
            ListVariant::All => Some(Request::get("/api/order")),
            ListVariant::Detailed => Some(Request::get("/api/order/list")),
            ListVariant::ByOwner(_) => None,
        }
    }

    fn get_request(id: &str) -> Option<Request> {
        Some(Request::get(format!("/api/order/{id}")))
    }

    fn create_request(_payload: Payload) -> Option<Request> {
        None
    }

    fn update_request(_id: &str, _payload: Payload) -> Option<Request> {
        None
    }

    fn delete_request(_id: &str) -> Option<Request> {
        None
    }

    fn status_request(_id: &str, _status: &OrderStatus) -> Option<Request> {
        None
    }
}

// ---------------------------------------------------------------------------
// Organizer
// ---------------------------------------------------------------------------

/// Organizer account state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizerStatus {
    /// Can sign in and publish
    Active,
    /// Deactivated by an admin
    Inactive,
    /// Registered, awaiting approval
    Pending,
}

string_status!(OrganizerStatus { Active => "active", Inactive => "inactive", Pending => "pending" });

/// Concert organizers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Organizer;

impl EntityKind for Organizer {
    type Status = OrganizerStatus;

    const NAME: &'static str = "organizer";
    const ID_FIELDS: &'static [&'static str] = &["id", "id_organizer", "organizer_id"];
    const LIST_KEYS: &'static [&'static str] = &["organizers", "listOrganizer", "listOrganizers"];
    const RECORD_KEYS: &'static [&'static str] = &["organizer"];
    const TOTAL_KEYS: &'static [&'static str] = &["totalOrganizers", "totalOrganizer", "total"];

    fn list_request(variant: &ListVariant) -> Option<Request> {
        matches!(variant, ListVariant::All).then(|| Request::get("/api/organizers"))
    }

    fn get_request(id: &str) -> Option<Request> {
        Some(Request::get(format!("/api/organizers/{id}")))
    }

    fn create_request(payload: Payload) -> Option<Request> {
        Some(Request::post("/api/organizers").payload(payload))
    }

    fn update_request(id: &str, payload: Payload) -> Option<Request> {
        Some(Request::put(format!("/api/organizers/{id}")).payload(payload))
    }

    fn delete_request(id: &str) -> Option<Request> {
        Some(Request::delete(format!("/api/organizers/{id}")))
    }

    fn status_request(id: &str, status: &OrganizerStatus) -> Option<Request> {
        Some(Request::patch(format!("/api/organizers/status/{id}")).json(json!({ "status": status.label() })))
    }
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// User account state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    /// Enabled
    Active,
    /// Disabled
    Inactive,
}

string_status!(UserStatus { Active => "active", Inactive => "inactive" });

/// Ticket buyers and staff accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct User;

impl EntityKind for User {
    type Status = UserStatus;

    const NAME: &'static str = "user";
    const ID_FIELDS: &'static [&'static str] = &["id", "id_user", "user_id"];
    const LIST_KEYS: &'static [&'static str] = &["users", "listUsers", "listUser"];
    const RECORD_KEYS: &'static [&'static str] = &["user"];
    const TOTAL_KEYS: &'static [&'static str] = &["totalUsers", "totalUser", "total"];

    fn list_request(variant: &ListVariant) -> Option<Request> {
        matches!(variant, ListVariant::All).then(|| Request::get("/api/user/users"))
    }

    fn get_request(id: &str) -> Option<Request> {
        Some(Request::get(format!("/api/users/{id}")))
    }

    fn create_request(payload: Payload) -> Option<Request> {
        Some(Request::post("/api/users").payload(payload))
    }

    fn update_request(id: &str, payload: Payload) -> Option<Request> {
        Some(Request::put(format!("/api/users/{id}")).payload(payload))
    }

    fn delete_request(id: &str) -> Option<Request> {
        Some(Request::delete(format!("/api/users/{id}")))
    }

    fn status_request(id: &str, status: &UserStatus) -> Option<Request> {
        Some(Request::patch(format!("/api/users/{id}/status")).json(json!({ "status": status.label() })))
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// Payment review state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// No proof uploaded yet
    Pending,
    /// Proof uploaded, awaiting review
    WaitingApprove,
    /// Payment accepted; counts toward revenue
    Approved,
    /// Payment refused
    Rejected,
}

string_status!(TransactionStatus {
    Pending => "pending",
    WaitingApprove => "waiting_approve",
    Approved => "approved",
    Rejected => "rejected",
});

/// Payments awaiting or past review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Transaction;

impl EntityKind for Transaction {
    type Status = TransactionStatus;

    const NAME: &'static str = "transaction";
    const ID_FIELDS: &'static [&'static str] = &["id", "id_transaction", "transaction_id"];
    const STATUS_FIELD: &'static str = "transaction_status";
    const LIST_KEYS: &'static [&'static str] = &["transactions", "listTransaction", "listTransactions"];
    const RECORD_KEYS: &'static [&'static str] = &["transaction"];
    const TOTAL_KEYS: &'static [&'static str] = &["totalTransactions", "totalTransaction", "total"];

    fn list_request(variant: &ListVariant) -> Option<Request> {
        matches!(variant, ListVariant::All).then(|| Request::get("/api/transaction"))
    }

    fn get_request(_id: &str) -> Option<Request> {
        None
    }

    fn create_request(_payload: Payload) -> Option<Request> {
        None
    }

    fn update_request(_id: &str, _payload: Payload) -> Option<Request> {
        None
    }

    fn delete_request(_id: &str) -> Option<Request> {
        None
    }

    fn status_request(id: &str, status: &TransactionStatus) -> Option<Request> {
        Some(Request::post("/api/transaction/confirm").json(json!({
            "id_transaction": id,
            "transaction_status": status.label(),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backstage_gateway::{Body, Method};

    #[test]
    fn concert_status_accepts_flags_and_labels() {
        for raw in [json!(1), json!("1"), json!("active"), json!(true)] {
            assert_eq!(serde_json::from_value::<ConcertStatus>(raw).ok(), Some(ConcertStatus::Active));
        }
        for raw in [json!(0), json!("0"), json!("Inactive"), json!(false)] {
            assert_eq!(serde_json::from_value::<ConcertStatus>(raw).ok(), Some(ConcertStatus::Inactive));
        }
        assert!(serde_json::from_value::<ConcertStatus>(json!(2)).is_err());
    }

    #[test]
    fn concert_status_serializes_as_flag() {
        assert_eq!(serde_json::to_value(ConcertStatus::Active).ok(), Some(json!(1)));
    }

    #[test]
    fn order_status_aliases() {
        assert_eq!(
            serde_json::from_value::<OrderStatus>(json!("waiting_approve")).ok(),
            Some(OrderStatus::WaitingConfirmation)
        );
        assert_eq!(serde_json::from_value::<OrderStatus>(json!("paid")).ok(), Some(OrderStatus::Completed));
    }

    #[test]
    fn owner_variant_uses_organizer_path() {
        let request = Concert::list_request(&ListVariant::ByOwner("42".into()));
        assert_eq!(request.map(|r| r.path), Some("/api/concert/organizer/42".to_string()));
        assert!(User::list_request(&ListVariant::ByOwner("42".into())).is_none());
    }

    #[test]
    fn orders_have_no_write_endpoints() {
        assert!(Order::create_request(Payload::new()).is_none());
        assert!(Order::update_request("1", Payload::new()).is_none());
        assert!(Order::delete_request("1").is_none());
        assert!(Order::status_request("1", &OrderStatus::Completed).is_none());
    }

    #[test]
    fn transaction_confirm_body() {
        let request = Transaction::status_request("12", &TransactionStatus::Approved);
        let request = request.unwrap_or_else(|| Request::get("/"));

        assert_eq!(request.method, Method::Post);
        assert_eq!(request.path, "/api/transaction/confirm");
        assert_eq!(
            request.body,
            Body::Json(json!({"id_transaction": "12", "transaction_status": "approved"}))
        );
    }
}

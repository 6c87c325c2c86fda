//! Entity kinds
//!
//! An [`EntityKind`] is a zero-sized marker describing one record type: how
//! its id and status are spelled on the wire, which envelope keys its
//! collections arrive under, and which endpoints back each operation. The
//! generic slice, ingestion and resolver code is written once against this
//! trait.

use backstage_gateway::{Payload, Request};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::hash::Hash;

use crate::resolver::ListVariant;

/// Status enumeration of an entity kind
pub trait EntityStatus:
    Clone + Debug + PartialEq + Eq + Hash + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Display label
    fn label(&self) -> &'static str;
}

/// Describes one entity type of the backend
pub trait EntityKind: Clone + Debug + PartialEq + Default + Send + Sync + 'static {
    /// Status enumeration
    type Status: EntityStatus;

    /// Singular lowercase name, used in logs and messages
    const NAME: &'static str;

    /// Id field names in precedence order; the first present wins
    const ID_FIELDS: &'static [&'static str];

    /// Field carrying the status
    const STATUS_FIELD: &'static str = "status";

    /// Envelope keys a collection may be nested under (besides `data`)
    const LIST_KEYS: &'static [&'static str];

    /// Keys a single record may be nested under (besides `data`)
    const RECORD_KEYS: &'static [&'static str];

    /// Keys carrying the total record count
    const TOTAL_KEYS: &'static [&'static str] = &["total"];

    /// Whether the backend can list records of one owner
    const OWNER_SCOPED: bool = false;

    /// Request listing records for `variant`; `None` if there is no such endpoint
    fn list_request(variant: &ListVariant) -> Option<Request>;

    /// Request fetching one record
    fn get_request(id: &str) -> Option<Request>;

    /// Request creating a record
    fn create_request(payload: Payload) -> Option<Request>;

    /// Request updating a record
    fn update_request(id: &str, payload: Payload) -> Option<Request>;

    /// Request deleting a record
    fn delete_request(id: &str) -> Option<Request>;

    /// Request changing only the status of a record
    fn status_request(id: &str, status: &Self::Status) -> Option<Request>;
}

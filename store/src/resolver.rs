//! Role-scoped query resolution
//!
//! Decides which list endpoint a caller may use. Administrators see every
//! record; organizers see only their own, and when the ownership filter
//! cannot be applied the query fails instead of widening to "all".

use backstage_gateway::Request;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::kind::EntityKind;
use crate::record::id_value;

/// Caller role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Platform administrator: unscoped access
    #[serde(alias = "admin", alias = "superadmin")]
    SuperAdmin,
    /// Concert organizer: access scoped to owned records
    Organizer,
}

impl Role {
    /// Parse a role name, case-insensitively
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "super_admin" | "superadmin" | "admin" => Some(Self::SuperAdmin),
            "organizer" => Some(Self::Organizer),
            _ => None,
        }
    }

    /// Whether the role sees every owner's records
    #[must_use]
    pub const fn is_privileged(self) -> bool {
        matches!(self, Self::SuperAdmin)
    }
}

const IDENTITY_ID_FIELDS: &[&str] = &["id", "id_organizer", "organizer_id", "id_user", "user_id"];

/// The authenticated caller
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    /// Canonical identifier, when the server supplied one
    pub id: Option<String>,
    /// Email address
    pub email: Option<String>,
    /// Display name
    pub name: Option<String>,
    /// Role; logins without an explicit role are organizers
    pub role: Role,
    /// Every other field of the identity object
    pub attributes: Map<String, Value>,
}

impl Identity {
    /// Normalize a server identity object
    ///
    /// Returns `None` if `value` is not an object.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        let mut attributes = value.as_object()?.clone();

        let id = IDENTITY_ID_FIELDS
            .iter()
            .find_map(|field| attributes.get(*field).and_then(id_value));
        for field in IDENTITY_ID_FIELDS {
            attributes.remove(*field);
        }

        let text = |attributes: &mut Map<String, Value>, key: &str| match attributes.remove(key) {
            Some(Value::String(s)) => Some(s),
            Some(other) => {
                attributes.insert(key.to_string(), other);
                None
            },
            None => None,
        };

        let email = text(&mut attributes, "email");
        let name = text(&mut attributes, "name");
        let role = attributes
            .get("role")
            .and_then(Value::as_str)
            .and_then(Role::parse)
            .unwrap_or(Role::Organizer);
        attributes.remove("role");

        Some(Self {
            id,
            email,
            name,
            role,
            attributes,
        })
    }

    /// JSON form stored in the session snapshot
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut object = self.attributes.clone();
        if let Some(id) = &self.id {
            object.insert("id".into(), Value::String(id.clone()));
        }
        if let Some(email) = &self.email {
            object.insert("email".into(), Value::String(email.clone()));
        }
        if let Some(name) = &self.name {
            object.insert("name".into(), Value::String(name.clone()));
        }
        let role = match self.role {
            Role::SuperAdmin => "super_admin",
            Role::Organizer => "organizer",
        };
        object.insert("role".into(), Value::String(role.into()));
        Value::Object(object)
    }
}

/// Which list endpoint to call
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ListVariant {
    /// Every record
    All,
    /// Records owned by the given identifier
    ByOwner(String),
    /// Every record, with joined detail fields (orders)
    Detailed,
}

/// Query string parameters of a list request
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct QueryParams {
    /// 1-based page
    pub page: Option<u32>,
    /// Page size
    pub limit: Option<u32>,
    /// Free-text search
    pub search: Option<String>,
    /// Status filter
    pub status: Option<String>,
}

impl QueryParams {
    /// Page `page` of size `limit`
    #[must_use]
    pub const fn page(page: u32, limit: u32) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
            search: None,
            status: None,
        }
    }

    /// Set the search term
    #[must_use]
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Set the status filter
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Append the set parameters to `request`
    #[must_use]
    pub fn apply(&self, mut request: Request) -> Request {
        if let Some(page) = self.page {
            request = request.query("page", page);
        }
        if let Some(limit) = self.limit {
            request = request.query("limit", limit);
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            request = request.query("search", search);
        }
        if let Some(status) = self.status.as_deref().filter(|s| !s.is_empty()) {
            request = request.query("status", status);
        }
        request
    }
}

/// A resolved list query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListQuery {
    /// Endpoint variant
    pub variant: ListVariant,
    /// Query string
    pub params: QueryParams,
}

impl ListQuery {
    /// Unscoped query
    #[must_use]
    pub const fn all(params: QueryParams) -> Self {
        Self {
            variant: ListVariant::All,
            params,
        }
    }

    /// Detailed unscoped query
    #[must_use]
    pub const fn detailed(params: QueryParams) -> Self {
        Self {
            variant: ListVariant::Detailed,
            params,
        }
    }

    /// Query for the records of one owner
    #[must_use]
    pub fn by_owner(owner: impl Into<String>, params: QueryParams) -> Self {
        Self {
            variant: ListVariant::ByOwner(owner.into()),
            params,
        }
    }
}

/// Why a list query could not be scoped
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// Scoped role without an identifier to scope by
    #[error("cannot list {entity} records: caller identity is missing")]
    MissingIdentity {
        /// Entity name
        entity: &'static str,
    },

    /// Scoped role on an entity with no per-owner endpoint
    #[error("{entity} records cannot be scoped to an organizer")]
    ScopeUnavailable {
        /// Entity name
        entity: &'static str,
    },
}

/// Pick the list variant for `role` and `identity`
///
/// # Errors
///
/// For a scoped role, returns [`ResolveError::MissingIdentity`] when no
/// identifier is known and [`ResolveError::ScopeUnavailable`] when the entity
/// cannot be listed per owner. Never falls back to the unscoped variant.
pub fn resolve_list_query<K: EntityKind>(
    role: Role,
    identity: Option<&Identity>,
    params: QueryParams,
) -> Result<ListQuery, ResolveError> {
    if role.is_privileged() {
        return Ok(ListQuery::all(params));
    }

    let owner = identity
        .and_then(|i| i.id.as_deref())
        .ok_or(ResolveError::MissingIdentity { entity: K::NAME })?;

    if !K::OWNER_SCOPED {
        return Err(ResolveError::ScopeUnavailable { entity: K::NAME });
    }

    tracing::debug!(entity = K::NAME, owner, "Scoping list query to owner");
    Ok(ListQuery::by_owner(owner, params))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::entities::{Concert, Transaction};
    use serde_json::json;

    fn organizer(id: Option<&str>) -> Identity {
        Identity {
            id: id.map(str::to_string),
            email: None,
            name: None,
            role: Role::Organizer,
            attributes: Map::new(),
        }
    }

    #[test]
    fn identity_id_aliases_collapse_into_one_id() {
        let identity = Identity::from_json(&json!({
            "id_organizer": 12,
            "organizer_id": 12,
            "user_id": "12",
            "phone": "0812"
        }))
        .unwrap();

        assert_eq!(identity.id.as_deref(), Some("12"));
        assert_eq!(identity.attributes.len(), 1);
        assert!(IDENTITY_ID_FIELDS.iter().all(|f| !identity.attributes.contains_key(*f)));

        let stored = Identity::from_json(&identity.to_json()).unwrap();
        assert_eq!(stored, identity);
    }

    #[test]
    fn admin_gets_unscoped_variant() {
        let query = resolve_list_query::<Concert>(Role::SuperAdmin, None, QueryParams::default()).unwrap();
        assert_eq!(query.variant, ListVariant::All);
    }

    #[test]
    fn organizer_gets_own_records() {
        let me = organizer(Some("17"));
        let query = resolve_list_query::<Concert>(Role::Organizer, Some(&me), QueryParams::page(2, 10)).unwrap();
        assert_eq!(query.variant, ListVariant::ByOwner("17".into()));
        assert_eq!(query.params.page, Some(2));
    }

    #[test]
    fn organizer_without_identity_fails_fast() {
        let result = resolve_list_query::<Concert>(Role::Organizer, None, QueryParams::default());
        assert_eq!(result, Err(ResolveError::MissingIdentity { entity: "concert" }));

        let anonymous = organizer(None);
        let result = resolve_list_query::<Concert>(Role::Organizer, Some(&anonymous), QueryParams::default());
        assert!(matches!(result, Err(ResolveError::MissingIdentity { .. })));
    }

    #[test]
    fn organizer_cannot_list_unscopable_kinds() {
        let me = organizer(Some("17"));
        let result = resolve_list_query::<Transaction>(Role::Organizer, Some(&me), QueryParams::default());
        assert_eq!(result, Err(ResolveError::ScopeUnavailable { entity: "transaction" }));
    }

    #[test]
    fn identity_normalizes_prefixed_id_and_defaults_role() {
        let identity = Identity::from_json(&json!({
            "id_organizer": 5,
            "email": "org@example.com",
            "name": "Org",
            "phone_number": "0812"
        }))
        .unwrap();

        assert_eq!(identity.id.as_deref(), Some("5"));
        assert_eq!(identity.role, Role::Organizer);
        assert_eq!(identity.attributes.get("phone_number"), Some(&json!("0812")));
    }

    #[test]
    fn identity_snapshot_round_trips() {
        let identity = Identity::from_json(&json!({"id": "1", "role": "admin", "email": "a@b.c"})).unwrap();
        assert_eq!(identity.role, Role::SuperAdmin);
        assert_eq!(Identity::from_json(&identity.to_json()), Some(identity));
    }

    #[test]
    fn params_skip_empty_filters() {
        let request = QueryParams::page(1, 10)
            .with_search("")
            .with_status("active")
            .apply(Request::get("/api/organizers"));

        assert_eq!(
            request.query,
            vec![
                ("page".to_string(), "1".to_string()),
                ("limit".to_string(), "10".to_string()),
                ("status".to_string(), "active".to_string()),
            ]
        );
    }
}

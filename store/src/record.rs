//! Canonical entity record

use serde_json::{Map, Value};

use crate::kind::{EntityKind, EntityStatus};

/// One cached record: canonical id, parsed status, and every other field as-is
#[derive(Debug, Clone, PartialEq)]
pub struct Record<S> {
    /// Canonical id, unique within a slice's collection
    pub id: String,
    /// Parsed status; `None` if absent or not a known value
    pub status: Option<S>,
    /// Remaining fields, opaque to the cache
    pub attributes: Map<String, Value>,
}

/// Read an id-like value: non-empty strings as-is, numbers stringified
pub(crate) fn id_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl<S: EntityStatus> Record<S> {
    /// Build a record from raw fields
    #[must_use]
    pub fn new(id: impl Into<String>, status: Option<S>, attributes: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            status,
            attributes,
        }
    }

    /// Ingest a server object for kind `K`
    ///
    /// The id is taken from the first of `K::ID_FIELDS` that holds a usable
    /// value and every id alias is removed from the attributes. A status that
    /// does not parse stays in the attributes untouched. Returns `None` for
    /// non-objects and objects without any id.
    #[must_use]
    pub fn from_json<K>(value: &Value) -> Option<Self>
    where
        K: EntityKind<Status = S>,
    {
        let mut attributes = value.as_object()?.clone();

        let id = K::ID_FIELDS
            .iter()
            .find_map(|field| attributes.get(*field).and_then(id_value))?;
        for field in K::ID_FIELDS {
            attributes.remove(*field);
        }

        let status = match attributes.get(K::STATUS_FIELD).cloned() {
            Some(raw) => match serde_json::from_value::<S>(raw.clone()) {
                Ok(status) => {
                    attributes.remove(K::STATUS_FIELD);
                    Some(status)
                },
                Err(_) => {
                    tracing::debug!(entity = K::NAME, %id, status = %raw, "Unrecognised status value");
                    None
                },
            },
            None => None,
        };

        Some(Self {
            id,
            status,
            attributes,
        })
    }

    /// Attribute lookup (the id and a parsed status are not attributes)
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }

    /// Canonical JSON form: `id`, `status_field` when known, then the attributes
    #[must_use]
    pub fn to_json(&self, status_field: &str) -> Value {
        let mut object = Map::with_capacity(self.attributes.len() + 2);
        object.insert("id".to_string(), Value::String(self.id.clone()));
        if let Some(status) = &self.status {
            object.insert(
                status_field.to_string(),
                serde_json::to_value(status).unwrap_or(Value::Null),
            );
        }
        for (key, value) in &self.attributes {
            object.entry(key.clone()).or_insert_with(|| value.clone());
        }
        Value::Object(object)
    }

    /// Merge written fields into the record (update without an echoed record)
    ///
    /// Id aliases are ignored; the status field replaces the status when it parses.
    pub fn merge<K>(&mut self, patch: &Map<String, Value>)
    where
        K: EntityKind<Status = S>,
    {
        for (key, value) in patch {
            if K::ID_FIELDS.contains(&key.as_str()) {
                continue;
            }
            if key == K::STATUS_FIELD {
                if let Ok(status) = serde_json::from_value::<S>(value.clone()) {
                    self.status = Some(status);
                    self.attributes.remove(key);
                    continue;
                }
            }
            self.attributes.insert(key.clone(), value.clone());
        }
    }
}

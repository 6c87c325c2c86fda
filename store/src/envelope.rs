//! Response envelope normalization
//!
//! The backend wraps collections differently per endpoint: `{data: [...]}`,
//! `{listOrder: [...]}` (at the top or inside `data`), or a bare array.
//! Detection follows one fixed precedence:
//!
//! 1. an array under `data`
//! 2. an array under one of the entity's named keys, top level first, then inside `data`
//! 3. the body itself, if it is an array
//! 4. otherwise, empty

use serde_json::Value;
use std::collections::HashSet;

use crate::kind::EntityKind;
use crate::record::Record;

/// Locate the collection array inside a response body
#[must_use]
pub fn collection<'a>(body: &'a Value, named_keys: &[&str]) -> &'a [Value] {
    if let Some(items) = body.get("data").and_then(Value::as_array) {
        return items;
    }

    let data = body.get("data").filter(|d| d.is_object());
    for key in named_keys {
        if let Some(items) = body.get(*key).and_then(Value::as_array) {
            return items;
        }
    }
    if let Some(data) = data {
        for key in named_keys {
            if let Some(items) = data.get(*key).and_then(Value::as_array) {
                return items;
            }
        }
    }

    body.as_array().map_or(&[], Vec::as_slice)
}

/// Ingest a list response into canonical records
///
/// Entries without an id are dropped; when two entries share an id the
/// first one is kept. The result therefore never holds duplicate ids.
#[must_use]
pub fn ingest_collection<K: EntityKind>(body: &Value) -> Vec<Record<K::Status>> {
    let raw = collection(body, K::LIST_KEYS);
    let mut seen = HashSet::with_capacity(raw.len());
    let mut records = Vec::with_capacity(raw.len());

    for entry in raw {
        let Some(record) = Record::from_json::<K>(entry) else {
            tracing::warn!(entity = K::NAME, "Dropping record without an id");
            continue;
        };
        if !seen.insert(record.id.clone()) {
            tracing::warn!(entity = K::NAME, id = %record.id, "Dropping duplicate record");
            continue;
        }
        records.push(record);
    }

    records
}

/// Extract the single record of a get/create/update response
///
/// Looks at `data.<record key>`, `<record key>`, `data`, then the body
/// itself; the first object with a usable id wins.
#[must_use]
pub fn extract_single<K: EntityKind>(body: &Value) -> Option<Record<K::Status>> {
    let data = body.get("data");

    let nested = K::RECORD_KEYS.iter().flat_map(|key| {
        [
            data.and_then(|d| d.get(*key)),
            body.get(*key),
        ]
    });

    nested
        .chain([data, Some(body)])
        .flatten()
        .filter(|candidate| candidate.is_object())
        .find_map(Record::from_json::<K>)
}

/// Pagination metadata of the primary collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PageInfo {
    /// 1-based current page
    pub current_page: u32,
    /// Number of pages
    pub total_pages: u32,
    /// Total record count, when the server reports one
    pub total_count: Option<u64>,
}

impl Default for PageInfo {
    fn default() -> Self {
        Self {
            current_page: 1,
            total_pages: 1,
            total_count: None,
        }
    }
}

fn number(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lookup(body: &Value, keys: &[&str]) -> Option<u64> {
    let data = body.get("data").filter(|d| d.is_object());
    keys.iter().find_map(|key| {
        body.get(*key)
            .and_then(number)
            .or_else(|| data.and_then(|d| d.get(*key)).and_then(number))
    })
}

/// Read pagination fields from the top level or from `data`
#[must_use]
pub fn extract_page(body: &Value, total_keys: &[&str]) -> PageInfo {
    let defaults = PageInfo::default();
    let clamp = |n: u64| u32::try_from(n).unwrap_or(u32::MAX).max(1);

    PageInfo {
        current_page: lookup(body, &["currentPage", "current_page", "page"])
            .map_or(defaults.current_page, clamp),
        total_pages: lookup(body, &["totalPages", "total_pages"]).map_or(defaults.total_pages, clamp),
        total_count: lookup(body, total_keys),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Concert, Order};
    use serde_json::json;

    #[test]
    fn data_array_wins_over_named_key() {
        let body = json!({"data": [{"id": 1}], "concerts": [{"id": 2}, {"id": 3}]});
        assert_eq!(collection(&body, Concert::LIST_KEYS).len(), 1);
    }

    #[test]
    fn named_key_inside_data_object() {
        let body = json!({"data": {"listOrder": [{"id_order": 1}, {"id_order": 2}], "totalOrder": 2}});
        let records = ingest_collection::<Order>(&body);
        assert_eq!(records.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), ["1", "2"]);
        assert_eq!(extract_page(&body, Order::TOTAL_KEYS).total_count, Some(2));
    }

    #[test]
    fn unknown_envelope_is_empty() {
        assert!(collection(&json!({"rows": [{"id": 1}]}), Concert::LIST_KEYS).is_empty());
        assert!(collection(&json!(null), Concert::LIST_KEYS).is_empty());
        assert!(collection(&json!({"data": null}), Concert::LIST_KEYS).is_empty());
    }

    #[test]
    fn duplicates_and_idless_entries_are_dropped() {
        let body = json!([{"id": 1, "title": "first"}, {"title": "no id"}, {"id": "1", "title": "second"}]);
        let records = ingest_collection::<Concert>(&body);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("title"), Some(&json!("first")));
    }

    #[test]
    fn single_record_shapes() {
        for body in [
            json!({"data": {"concert": {"id": 9}}}),
            json!({"concert": {"id": 9}}),
            json!({"data": {"id": 9}}),
            json!({"id": 9}),
        ] {
            let record = extract_single::<Concert>(&body);
            assert_eq!(record.map(|r| r.id), Some("9".to_string()), "body: {body}");
        }
        assert!(extract_single::<Concert>(&json!({"message": "ok"})).is_none());
    }

    #[test]
    fn page_defaults_and_strings() {
        assert_eq!(extract_page(&json!([]), Concert::TOTAL_KEYS), PageInfo::default());

        let page = extract_page(&json!({"currentPage": "3", "totalPages": 7, "total": 64}), Concert::TOTAL_KEYS);
        assert_eq!(page, PageInfo { current_page: 3, total_pages: 7, total_count: Some(64) });
    }
}

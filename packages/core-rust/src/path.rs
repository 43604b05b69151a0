//! Resource paths and dotted field paths.
//!
//! Resource paths alternate collection and document segments:
//! `users` (collection), `users/42` (document), `users/42/posts` (collection).
//! Field paths address nested map entries with `.` separators: `address.city`.

use std::collections::BTreeMap;

use crate::error::StoreError;
use crate::types::Value;

/// Splits a resource path into segments, rejecting empty segments.
///
/// # Errors
///
/// Returns [`StoreError::InvalidArgument`] for an empty path, a leading or
/// trailing `/`, or `//`.
pub fn segments(path: &str) -> Result<Vec<&str>, StoreError> {
    if path.is_empty() {
        return Err(StoreError::invalid_argument("path must not be empty"));
    }
    let parts: Vec<&str> = path.split('/').collect();
    if parts.iter().any(|s| s.is_empty()) {
        return Err(StoreError::invalid_argument(format!(
            "path '{path}' contains an empty segment"
        )));
    }
    Ok(parts)
}

/// Validates a document path (even number of segments).
///
/// # Errors
///
/// Returns [`StoreError::InvalidArgument`] if the path is malformed or
/// addresses a collection.
pub fn validate_document_path(path: &str) -> Result<(), StoreError> {
    let parts = segments(path)?;
    if parts.len() % 2 != 0 {
        return Err(StoreError::invalid_argument(format!(
            "'{path}' is a collection path, expected a document path"
        )));
    }
    Ok(())
}

/// Validates a collection path (odd number of segments).
///
/// # Errors
///
/// Returns [`StoreError::InvalidArgument`] if the path is malformed or
/// addresses a document.
pub fn validate_collection_path(path: &str) -> Result<(), StoreError> {
    let parts = segments(path)?;
    if parts.len() % 2 == 0 {
        return Err(StoreError::invalid_argument(format!(
            "'{path}' is a document path, expected a collection path"
        )));
    }
    Ok(())
}

/// Last segment of a path (the document or collection id).
#[must_use]
pub fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Everything before the last segment, or `None` for a single-segment path.
#[must_use]
pub fn parent(path: &str) -> Option<&str> {
    path.rfind('/').map(|idx| &path[..idx])
}

/// Joins a parent path and a child segment.
#[must_use]
pub fn join(parent: &str, child: &str) -> String {
    format!("{parent}/{child}")
}

/// Splits a dotted field path into its components.
#[must_use]
pub fn field_segments(field_path: &str) -> Vec<&str> {
    field_path.split('.').collect()
}

/// Reads the value at a dotted field path, descending through nested maps.
#[must_use]
pub fn get_field<'a>(data: &'a BTreeMap<String, Value>, field_path: &str) -> Option<&'a Value> {
    let mut parts = field_path.split('.');
    let first = parts.next()?;
    let mut current = data.get(first)?;
    for part in parts {
        current = current.as_map()?.get(part)?;
    }
    Some(current)
}

/// Writes `value` at a dotted field path, creating (or replacing non-map)
/// intermediate entries with empty maps.
pub fn set_field(data: &mut BTreeMap<String, Value>, field_path: &str, value: Value) {
    let parts = field_segments(field_path);
    let Some((last, intermediate)) = parts.split_last() else {
        return;
    };
    let mut current = data;
    for part in intermediate {
        let entry = current
            .entry((*part).to_string())
            .or_insert_with(|| Value::Map(BTreeMap::new()));
        if !matches!(entry, Value::Map(_)) {
            *entry = Value::Map(BTreeMap::new());
        }
        let Value::Map(next) = entry else {
            unreachable!("entry was just normalized to a map");
        };
        current = next;
    }
    current.insert((*last).to_string(), value);
}

/// Removes the value at a dotted field path. A missing intermediate segment
/// (or a non-map intermediate) makes this a no-op. Returns the removed value.
pub fn remove_field(data: &mut BTreeMap<String, Value>, field_path: &str) -> Option<Value> {
    let parts = field_segments(field_path);
    let (last, intermediate) = parts.split_last()?;
    let mut current = data;
    for part in intermediate {
        match current.get_mut(*part) {
            Some(Value::Map(next)) => current = next,
            _ => return None,
        }
    }
    current.remove(*last)
}

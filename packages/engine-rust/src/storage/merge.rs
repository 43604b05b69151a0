//! Sentinel resolution and deep merge.
//!
//! [`FieldValueProcessor`] turns incoming [`WriteData`] into stored
//! [`DocumentData`] in two passes:
//!
//! 1. **Resolve**: every sentinel is replaced by a concrete value computed
//!    from the existing stored value at the same field path (or by a delete
//!    marker). The result is a [`Resolved`] tree that contains no sentinels.
//! 2. **Apply**: the resolved tree is written into the target according to
//!    the write kind (overwrite, deep merge, merge of named fields, or dotted
//!    update).

use std::collections::BTreeMap;

use fauxstore_core::ordering::values_equal;
use fauxstore_core::path::{get_field, remove_field, set_field};
use fauxstore_core::{ClockSource, DocumentData, FieldValue, Number, StoreError, Value, WriteData};

/// A write value after sentinel resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// Replace the addressed field with this value.
    Set(Value),
    /// Nested map; merges key-by-key in a deep merge.
    Nested(BTreeMap<String, Resolved>),
    /// Remove the addressed field.
    Delete,
}

/// Resolves field-value sentinels and merges writes into documents.
pub struct FieldValueProcessor<'a> {
    clock: &'a dyn ClockSource,
}

impl<'a> FieldValueProcessor<'a> {
    /// Creates a processor that stamps `server_timestamp()` from `clock`.
    #[must_use]
    pub fn new(clock: &'a dyn ClockSource) -> Self {
        Self { clock }
    }

    // --- Resolution ---

    /// Resolves every entry of `incoming` against `existing`, treating keys
    /// as literal field names.
    #[must_use]
    pub fn resolve_map(
        &self,
        incoming: WriteData,
        existing: Option<&BTreeMap<String, Value>>,
    ) -> BTreeMap<String, Resolved> {
        incoming
            .into_iter()
            .map(|(key, value)| {
                let current = existing.and_then(|e| e.get(&key));
                let resolved = self.resolve_value(value, current);
                (key, resolved)
            })
            .collect()
    }

    /// Resolves a single value against the stored value at the same path.
    #[must_use]
    pub fn resolve_value(&self, incoming: FieldValue, existing: Option<&Value>) -> Resolved {
        match incoming {
            FieldValue::Value(Value::Map(map)) => {
                self.resolve_value(FieldValue::from(Value::Map(map)), existing)
            }
            FieldValue::Value(value) => Resolved::Set(value),
            FieldValue::Map(entries) => {
                Resolved::Nested(self.resolve_map(entries, existing.and_then(Value::as_map)))
            }
            FieldValue::Increment(delta) => {
                let base = existing
                    .and_then(Value::as_number)
                    .unwrap_or(Number::Int(0));
                Resolved::Set(base.add(delta).into())
            }
            FieldValue::ServerTimestamp => Resolved::Set(Value::Timestamp(self.clock.now())),
            FieldValue::Delete => Resolved::Delete,
            FieldValue::ArrayUnion(items) => {
                let mut result = existing_array(existing);
                for item in items {
                    if !result.iter().any(|present| values_equal(present, &item)) {
                        result.push(item);
                    }
                }
                Resolved::Set(Value::Array(result))
            }
            FieldValue::ArrayRemove(items) => {
                let mut result = existing_array(existing);
                result.retain(|present| !items.iter().any(|item| values_equal(present, item)));
                Resolved::Set(Value::Array(result))
            }
        }
    }

    // --- Application ---

    /// Plain `set`: the result holds exactly the incoming fields.
    #[must_use]
    pub fn overwrite(&self, existing: Option<&DocumentData>, incoming: WriteData) -> DocumentData {
        materialize(self.resolve_map(incoming, existing))
    }

    /// `set` with merge: nested maps merge key-by-key, everything else
    /// replaces wholesale. Merging into a missing document is a plain set.
    #[must_use]
    pub fn merge(&self, existing: Option<&DocumentData>, incoming: WriteData) -> DocumentData {
        let patch = self.resolve_map(incoming, existing);
        let mut target = existing.cloned().unwrap_or_default();
        deep_merge(&mut target, patch);
        target
    }

    /// `set` with `merge_fields`: only the named (dotted) field paths are
    /// taken from `incoming`; everything else in the stored document stays.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] if a named field is not
    /// present in `incoming`.
    pub fn merge_fields(
        &self,
        existing: Option<&DocumentData>,
        incoming: WriteData,
        fields: &[String],
    ) -> Result<DocumentData, StoreError> {
        let patch = self.resolve_map(incoming, existing);
        let mut target = existing.cloned().unwrap_or_default();
        for field in fields {
            let Some(resolved) = lookup(&patch, field) else {
                return Err(StoreError::invalid_argument(format!(
                    "field '{field}' is listed in merge_fields but missing from the data"
                )));
            };
            apply_at_path(&mut target, field, resolved.clone());
        }
        Ok(target)
    }

    /// `update`: keys are dotted field paths; each addressed field is
    /// replaced (or removed) without touching its siblings.
    #[must_use]
    pub fn update(&self, existing: &DocumentData, incoming: WriteData) -> DocumentData {
        let mut target = existing.clone();
        for (field, value) in incoming {
            let resolved = self.resolve_value(value, get_field(existing, &field));
            apply_at_path(&mut target, &field, resolved);
        }
        target
    }
}

fn existing_array(existing: Option<&Value>) -> Vec<Value> {
    existing
        .and_then(Value::as_array)
        .map(<[Value]>::to_vec)
        .unwrap_or_default()
}

/// Converts a resolved tree into plain data, dropping delete markers.
fn materialize(patch: BTreeMap<String, Resolved>) -> BTreeMap<String, Value> {
    patch
        .into_iter()
        .filter_map(|(key, resolved)| match resolved {
            Resolved::Set(value) => Some((key, value)),
            Resolved::Nested(nested) => Some((key, Value::Map(materialize(nested)))),
            Resolved::Delete => None,
        })
        .collect()
}

/// Recursively merges `patch` into `target`.
fn deep_merge(target: &mut BTreeMap<String, Value>, patch: BTreeMap<String, Resolved>) {
    for (key, resolved) in patch {
        match resolved {
            Resolved::Set(value) => {
                target.insert(key, value);
            }
            Resolved::Delete => {
                target.remove(&key);
            }
            Resolved::Nested(nested) => match target.get_mut(&key) {
                Some(Value::Map(existing)) => deep_merge(existing, nested),
                _ => {
                    target.insert(key, Value::Map(materialize(nested)));
                }
            },
        }
    }
}

/// Finds the resolved value at a dotted path inside a resolved tree.
fn lookup<'p>(patch: &'p BTreeMap<String, Resolved>, field_path: &str) -> Option<&'p Resolved> {
    let mut parts = field_path.split('.');
    let mut current = patch.get(parts.next()?)?;
    for part in parts {
        match current {
            Resolved::Nested(nested) => current = nested.get(part)?,
            _ => return None,
        }
    }
    Some(current)
}

/// Replaces (or removes) the value at a dotted path.
fn apply_at_path(target: &mut BTreeMap<String, Value>, field_path: &str, resolved: Resolved) {
    match resolved {
        Resolved::Set(value) => set_field(target, field_path, value),
        Resolved::Nested(nested) => set_field(target, field_path, Value::Map(materialize(nested))),
        Resolved::Delete => {
            remove_field(target, field_path);
        }
    }
}

//! Write-side values, including field-value sentinels.
//!
//! A [`FieldValue`] is what callers hand to `set`/`update`. It is either a
//! plain [`Value`], a nested map of further `FieldValue`s, or a sentinel that
//! is resolved against the stored document at write time. Arrays are always
//! plain `Value`s, so sentinels can never hide inside array elements.

use std::collections::BTreeMap;

use crate::types::{Number, Value};

/// Fields of an incoming write, keyed by field name (or dotted field path
/// for `update`).
pub type WriteData = BTreeMap<String, FieldValue>;

/// A value supplied to a write operation.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// A literal value, stored as-is. Never a `Value::Map`; maps are lifted
    /// into [`FieldValue::Map`] by the `From` conversions.
    Value(Value),
    /// A nested map whose entries may themselves be sentinels.
    Map(WriteData),
    /// Adds to the stored number (or 0 if absent/non-numeric).
    Increment(Number),
    /// Replaced by the store clock's current time.
    ServerTimestamp,
    /// Removes the addressed field.
    Delete,
    /// Appends each element not already present in the stored array.
    ArrayUnion(Vec<Value>),
    /// Removes every element equal to one of these from the stored array.
    ArrayRemove(Vec<Value>),
}

impl FieldValue {
    /// `increment(n)` sentinel.
    pub fn increment(n: impl Into<Number>) -> Self {
        FieldValue::Increment(n.into())
    }

    /// `serverTimestamp()` sentinel.
    #[must_use]
    pub fn server_timestamp() -> Self {
        FieldValue::ServerTimestamp
    }

    /// `delete()` sentinel.
    #[must_use]
    pub fn delete() -> Self {
        FieldValue::Delete
    }

    /// `arrayUnion(...)` sentinel.
    pub fn array_union<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Self {
        FieldValue::ArrayUnion(items.into_iter().map(Into::into).collect())
    }

    /// `arrayRemove(...)` sentinel.
    pub fn array_remove<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Self {
        FieldValue::ArrayRemove(items.into_iter().map(Into::into).collect())
    }

    /// Builds a `FieldValue::Map` from `(key, value)` pairs.
    ///
    /// ```
    /// use fauxstore_core::FieldValue;
    ///
    /// let data = FieldValue::map([
    ///     ("count", FieldValue::increment(1)),
    ///     ("name", "ada".into()),
    /// ]);
    /// assert!(matches!(data, FieldValue::Map(_)));
    /// ```
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        FieldValue::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Consumes a `FieldValue::Map` into its entries.
    #[must_use]
    pub fn into_write_data(self) -> Option<WriteData> {
        match self {
            FieldValue::Map(entries) => Some(entries),
            _ => None,
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Map(map) => FieldValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, FieldValue::from(v)))
                    .collect(),
            ),
            other => FieldValue::Value(other),
        }
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(json: serde_json::Value) -> Self {
        FieldValue::from(Value::from(json))
    }
}

impl From<WriteData> for FieldValue {
    fn from(entries: WriteData) -> Self {
        FieldValue::Map(entries)
    }
}

impl From<BTreeMap<String, Value>> for FieldValue {
    fn from(map: BTreeMap<String, Value>) -> Self {
        FieldValue::from(Value::Map(map))
    }
}

macro_rules! field_value_from_scalar {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(v: $ty) -> Self {
                    FieldValue::Value(Value::from(v))
                }
            }
        )*
    };
}

field_value_from_scalar!(bool, i32, i64, u32, f64, &str, String);

impl<T: Into<Value>> From<Vec<T>> for FieldValue {
    fn from(items: Vec<T>) -> Self {
        FieldValue::Value(Value::from(items))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn json_objects_lift_into_nested_maps() {
        let fv = FieldValue::from(json!({"a": {"b": 1}, "tags": [1, 2]}));
        let entries = fv.into_write_data().expect("map");
        assert!(matches!(entries["a"], FieldValue::Map(_)));
        assert_eq!(
            entries["tags"],
            FieldValue::Value(Value::Array(vec![Value::Int(1), Value::Int(2)]))
        );
    }
}

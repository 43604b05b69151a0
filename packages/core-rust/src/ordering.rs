//! Value equality and ordering used by query filters and sorting.
//!
//! Numbers compare numerically across `Int` and `Float`. Values of different
//! types sort by a fixed type rank:
//! null < bool < number < timestamp < string < bytes < array < map.

use std::cmp::Ordering;

use crate::types::Value;

/// Position of a value's type in the cross-type sort order.
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) | Value::Float(_) => 2,
        Value::Timestamp(_) => 3,
        Value::String(_) => 4,
        Value::Bytes(_) => 5,
        Value::Array(_) => 6,
        Value::Map(_) => 7,
    }
}

/// Whether two values have the same type class (ints and floats share one).
#[must_use]
pub fn same_type_class(a: &Value, b: &Value) -> bool {
    type_rank(a) == type_rank(b)
}

/// Compares two numbers. `NaN` sorts before every other number and equals
/// itself.
#[allow(clippy::cast_precision_loss)]
fn compare_numbers(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        _ => {
            let x = number_as_f64(a);
            let y = number_as_f64(b);
            match (x.is_nan(), y.is_nan()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            }
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn number_as_f64(value: &Value) -> f64 {
    match value {
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        _ => f64::NAN,
    }
}

/// Total order over all values.
#[must_use]
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Timestamp(x), Value::Timestamp(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bytes(x), Value::Bytes(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                let ord = compare_values(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Map(x), Value::Map(y)) => {
            for ((lk, lv), (rk, rv)) in x.iter().zip(y.iter()) {
                let ord = lk.cmp(rk).then_with(|| compare_values(lv, rv));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => compare_numbers(a, b),
    }
}

/// Equality as used by `==`, `in`, `array-contains` and friends.
///
/// Differs from `PartialEq` only for numbers: `Int(1)` equals `Float(1.0)`.
#[must_use]
pub fn values_equal(a: &Value, b: &Value) -> bool {
    compare_values(a, b) == Ordering::Equal
}

/// Compares optional values; a missing value sorts before every present one.
#[must_use]
pub fn compare_optional(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => compare_values(x, y),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::clock::Timestamp;

    #[test]
    fn numbers_compare_across_int_and_float() {
        assert!(values_equal(&Value::Int(1), &Value::Float(1.0)));
        assert_eq!(
            compare_values(&Value::Int(2), &Value::Float(1.5)),
            Ordering::Greater
        );
    }

    #[test]
    fn type_rank_orders_mixed_types() {
        let ordered = [
            Value::Null,
            Value::Bool(true),
            Value::Int(100),
            Value::Timestamp(Timestamp { seconds: 0, nanos: 0 }),
            Value::String("a".to_string()),
            Value::Bytes(vec![0]),
            Value::Array(vec![]),
            Value::from(json!({})),
        ];
        for pair in ordered.windows(2) {
            assert_eq!(compare_values(&pair[0], &pair[1]), Ordering::Less);
        }
    }

    #[test]
    fn nan_sorts_first_among_numbers() {
        assert_eq!(
            compare_values(&Value::Float(f64::NAN), &Value::Int(i64::MIN)),
            Ordering::Less
        );
        assert!(values_equal(&Value::Float(f64::NAN), &Value::Float(f64::NAN)));
    }

    #[test]
    fn arrays_compare_elementwise_then_by_length() {
        let short = Value::from(json!([1, 2]));
        let long = Value::from(json!([1, 2, 0]));
        let bigger = Value::from(json!([1, 3]));
        assert_eq!(compare_values(&short, &long), Ordering::Less);
        assert_eq!(compare_values(&long, &bigger), Ordering::Less);
    }

    #[test]
    fn missing_sorts_before_null() {
        assert_eq!(compare_optional(None, Some(&Value::Null)), Ordering::Less);
    }

    fn scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            (-1.0e6f64..1.0e6).prop_map(Value::Float),
            "[a-z]{0,4}".prop_map(Value::String),
        ]
    }

    proptest! {
        #[test]
        fn compare_is_antisymmetric(a in scalar(), b in scalar()) {
            prop_assert_eq!(compare_values(&a, &b), compare_values(&b, &a).reverse());
        }

        #[test]
        fn compare_is_transitive(a in scalar(), b in scalar(), c in scalar()) {
            let mut sorted = [a, b, c];
            sorted.sort_by(compare_values);
            prop_assert_ne!(compare_values(&sorted[0], &sorted[2]), Ordering::Greater);
        }
    }
}

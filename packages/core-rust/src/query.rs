//! Query configuration types: scope, filters, orderings and cursors.
//!
//! A [`QuerySpec`] is the frozen description of a query. The engine's query
//! builder produces a new spec on every call and never mutates one that has
//! been handed out, so a spec can be stored by a watcher and re-evaluated
//! later.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::ordering::{compare_values, same_type_class, values_equal};
use crate::path;
use crate::types::{DocumentData, Value};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Filter operators.
///
/// Serialized (and parsed) as the operator strings callers write, e.g.
/// `"=="` or `"array-contains"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "<=")]
    LessThanOrEqual,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = ">=")]
    GreaterThanOrEqual,
    #[serde(rename = "array-contains")]
    ArrayContains,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not-in")]
    NotIn,
    #[serde(rename = "array-contains-any")]
    ArrayContainsAny,
}

impl FilterOp {
    /// The operator's string form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FilterOp::Equal => "==",
            FilterOp::NotEqual => "!=",
            FilterOp::LessThan => "<",
            FilterOp::LessThanOrEqual => "<=",
            FilterOp::GreaterThan => ">",
            FilterOp::GreaterThanOrEqual => ">=",
            FilterOp::ArrayContains => "array-contains",
            FilterOp::In => "in",
            FilterOp::NotIn => "not-in",
            FilterOp::ArrayContainsAny => "array-contains-any",
        }
    }

    /// Whether the operand must be an array.
    #[must_use]
    pub fn takes_array_operand(self) -> bool {
        matches!(
            self,
            FilterOp::In | FilterOp::NotIn | FilterOp::ArrayContainsAny
        )
    }
}

impl FromStr for FilterOp {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "==" => FilterOp::Equal,
            "!=" => FilterOp::NotEqual,
            "<" => FilterOp::LessThan,
            "<=" => FilterOp::LessThanOrEqual,
            ">" => FilterOp::GreaterThan,
            ">=" => FilterOp::GreaterThanOrEqual,
            "array-contains" => FilterOp::ArrayContains,
            "in" => FilterOp::In,
            "not-in" => FilterOp::NotIn,
            "array-contains-any" => FilterOp::ArrayContainsAny,
            other => {
                return Err(StoreError::UnsupportedOperator {
                    op: other.to_string(),
                })
            }
        })
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort direction for query ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// Which documents a query considers before any filter runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryScope {
    /// Direct children of a collection path.
    Collection(String),
    /// Any document whose immediate parent segment equals this id,
    /// regardless of the rest of its ancestry.
    CollectionGroup(String),
}

impl QueryScope {
    /// Checks that the scope names a collection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] for a collection scope that is
    /// not a collection path, or a group id that is empty or contains `/`.
    pub fn validate(&self) -> Result<(), StoreError> {
        match self {
            QueryScope::Collection(collection) => path::validate_collection_path(collection),
            QueryScope::CollectionGroup(id) if id.is_empty() || id.contains('/') => {
                Err(StoreError::invalid_argument(format!(
                    "collection group id '{id}' must be a single non-empty segment"
                )))
            }
            QueryScope::CollectionGroup(_) => Ok(()),
        }
    }

    /// Whether the document at `doc_path` falls inside this scope.
    #[must_use]
    pub fn contains(&self, doc_path: &str) -> bool {
        let Some(parent) = path::parent(doc_path) else {
            return false;
        };
        match self {
            QueryScope::Collection(collection) => parent == collection,
            QueryScope::CollectionGroup(id) => path::last_segment(parent) == id,
        }
    }
}

// ---------------------------------------------------------------------------
// Structs
// ---------------------------------------------------------------------------

/// A single `field op value` predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Dotted field path.
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    /// Checks that the operand shape fits the operator.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] when `in`, `not-in` or
    /// `array-contains-any` is given a non-array operand.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.op.takes_array_operand() && self.value.as_array().is_none() {
            return Err(StoreError::invalid_argument(format!(
                "'{}' filter on '{}' requires an array operand",
                self.op, self.field
            )));
        }
        Ok(())
    }

    /// Evaluates the predicate against a document. A document lacking the
    /// field never matches.
    #[must_use]
    pub fn matches(&self, data: &DocumentData) -> bool {
        let Some(actual) = path::get_field(data, &self.field) else {
            return false;
        };
        let operand = &self.value;
        match self.op {
            FilterOp::Equal => values_equal(actual, operand),
            FilterOp::NotEqual => !values_equal(actual, operand),
            FilterOp::LessThan => {
                same_type_class(actual, operand) && compare_values(actual, operand).is_lt()
            }
            FilterOp::LessThanOrEqual => {
                same_type_class(actual, operand) && compare_values(actual, operand).is_le()
            }
            FilterOp::GreaterThan => {
                same_type_class(actual, operand) && compare_values(actual, operand).is_gt()
            }
            FilterOp::GreaterThanOrEqual => {
                same_type_class(actual, operand) && compare_values(actual, operand).is_ge()
            }
            FilterOp::ArrayContains => actual
                .as_array()
                .is_some_and(|items| items.iter().any(|item| values_equal(item, operand))),
            FilterOp::In => operand
                .as_array()
                .is_some_and(|options| options.iter().any(|o| values_equal(actual, o))),
            FilterOp::NotIn => operand
                .as_array()
                .is_some_and(|options| !options.iter().any(|o| values_equal(actual, o))),
            FilterOp::ArrayContainsAny => match (actual.as_array(), operand.as_array()) {
                (Some(items), Some(options)) => items
                    .iter()
                    .any(|item| options.iter().any(|o| values_equal(item, o))),
                _ => false,
            },
        }
    }
}

/// One `order_by` clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    /// Dotted field path.
    pub field: String,
    pub direction: Direction,
}

/// Start-after pagination anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Cursor {
    /// Resume after the document with this path.
    Document(String),
    /// Resume after the last document whose ordered fields equal these
    /// values (one per `order_by` clause, in order).
    Values(Vec<Value>),
}

/// Frozen query configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySpec {
    pub scope: QueryScope,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub orderings: Vec<OrderBy>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub start_after: Option<Cursor>,
    /// Projected field paths. `None` returns whole documents.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub select: Option<Vec<String>>,
}

impl QuerySpec {
    /// An unfiltered query over `scope`.
    #[must_use]
    pub fn new(scope: QueryScope) -> Self {
        Self {
            scope,
            filters: Vec::new(),
            orderings: Vec::new(),
            limit: None,
            offset: 0,
            start_after: None,
            select: None,
        }
    }

    /// Validates the scope, filters and the cursor against the orderings.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] for a malformed scope, a
    /// filter with the wrong operand shape or a value cursor with more
    /// values than orderings.
    pub fn validate(&self) -> Result<(), StoreError> {
        self.scope.validate()?;
        for filter in &self.filters {
            filter.validate()?;
        }
        if let Some(Cursor::Values(values)) = &self.start_after {
            if values.len() > self.orderings.len() {
                return Err(StoreError::invalid_argument(format!(
                    "start_after was given {} values but the query has {} orderings",
                    values.len(),
                    self.orderings.len()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::document_data_from_json;

    fn filter(field: &str, op: &str, value: serde_json::Value) -> Filter {
        Filter {
            field: field.to_string(),
            op: op.parse().expect("supported operator"),
            value: Value::from(value),
        }
    }

    fn doc(json: serde_json::Value) -> DocumentData {
        document_data_from_json(json).expect("object")
    }

    #[test]
    fn operator_strings_parse_and_display() {
        for op in [
            "==", "!=", "<", "<=", ">", ">=", "array-contains", "in", "not-in",
            "array-contains-any",
        ] {
            let parsed: FilterOp = op.parse().unwrap();
            assert_eq!(parsed.to_string(), op);
        }
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let err = "like".parse::<FilterOp>().unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedOperator { op } if op == "like"));
    }

    #[test]
    fn operator_serializes_as_symbol() {
        assert_eq!(
            serde_json::to_string(&FilterOp::ArrayContainsAny).unwrap(),
            "\"array-contains-any\""
        );
    }

    #[test]
    fn comparison_operators() {
        let data = doc(json!({"age": 30, "name": "ada"}));
        assert!(filter("age", "==", json!(30)).matches(&data));
        assert!(filter("age", "==", json!(30.0)).matches(&data));
        assert!(filter("age", "!=", json!(31)).matches(&data));
        assert!(filter("age", "<", json!(31)).matches(&data));
        assert!(filter("age", "<=", json!(30)).matches(&data));
        assert!(!filter("age", ">", json!(30)).matches(&data));
        assert!(filter("age", ">=", json!(30)).matches(&data));
        assert!(!filter("name", ">", json!(1)).matches(&data));
    }

    #[test]
    fn missing_field_never_matches() {
        let data = doc(json!({"a": 1}));
        assert!(!filter("b", "!=", json!(1)).matches(&data));
        assert!(!filter("b", "not-in", json!([1])).matches(&data));
    }

    #[test]
    fn array_operators() {
        let data = doc(json!({"tags": ["x", "y"], "color": "red"}));
        assert!(filter("tags", "array-contains", json!("x")).matches(&data));
        assert!(!filter("tags", "array-contains", json!("z")).matches(&data));
        assert!(filter("tags", "array-contains-any", json!(["z", "y"])).matches(&data));
        assert!(!filter("tags", "array-contains-any", json!(["z"])).matches(&data));
        assert!(filter("color", "in", json!(["red", "blue"])).matches(&data));
        assert!(!filter("color", "not-in", json!(["red"])).matches(&data));
        assert!(filter("color", "not-in", json!(["blue"])).matches(&data));
    }

    #[test]
    fn nested_field_paths() {
        let data = doc(json!({"address": {"city": "Oslo"}}));
        assert!(filter("address.city", "==", json!("Oslo")).matches(&data));
    }

    #[test]
    fn array_operand_required_for_membership_ops() {
        assert!(filter("a", "in", json!(1)).validate().is_err());
        assert!(filter("a", "in", json!([1])).validate().is_ok());
    }

    #[test]
    fn collection_scope_matches_direct_children_only() {
        let scope = QueryScope::Collection("users".to_string());
        assert!(scope.contains("users/1"));
        assert!(!scope.contains("users/1/posts/2"));
        assert!(!scope.contains("accounts/1"));
    }

    #[test]
    fn collection_group_matches_by_parent_segment() {
        let scope = QueryScope::CollectionGroup("posts".to_string());
        assert!(scope.contains("posts/1"));
        assert!(scope.contains("users/1/posts/2"));
        assert!(scope.contains("a/b/c/d/posts/3"));
        assert!(!scope.contains("users/posts"));
    }

    #[test]
    fn malformed_scopes_are_rejected() {
        assert!(QuerySpec::new(QueryScope::Collection("users/1".to_string()))
            .validate()
            .is_err());
        assert!(QuerySpec::new(QueryScope::CollectionGroup("a/b".to_string()))
            .validate()
            .is_err());
        assert!(QuerySpec::new(QueryScope::CollectionGroup("posts".to_string()))
            .validate()
            .is_ok());
    }

    #[test]
    fn value_cursor_longer_than_orderings_is_invalid() {
        let mut spec = QuerySpec::new(QueryScope::Collection("c".to_string()));
        spec.start_after = Some(Cursor::Values(vec![Value::Int(1)]));
        assert!(spec.validate().is_err());
        spec.orderings.push(OrderBy {
            field: "n".to_string(),
            direction: Direction::Asc,
        });
        assert!(spec.validate().is_ok());
    }
}

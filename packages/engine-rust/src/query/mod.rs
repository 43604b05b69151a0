//! Query builder.
//!
//! A [`Query`] pairs a store handle with a frozen [`QuerySpec`]. Every
//! builder method returns a new query and leaves the receiver untouched, so
//! a query can be shared, extended in several directions, and watched.
//!
//! Builders never fail. Problems such as an unknown operator string or a
//! non-array `in` operand surface when the query is run.

pub mod engine;

use fauxstore_core::{
    Cursor, Direction, Filter, FilterOp, OrderBy, QuerySpec, StoreError, StoreResult, Value,
};

use crate::listener::ListenerRegistration;
use crate::reference::DocumentReference;
use crate::snapshot::{DocumentSnapshot, QuerySnapshot};
use crate::store::DocumentStore;

/// An immutable query over a collection or collection group.
#[derive(Debug, Clone)]
pub struct Query {
    store: DocumentStore,
    spec: QuerySpec,
    /// First operator string that failed to parse.
    unsupported_op: Option<String>,
}

impl Query {
    pub(crate) fn new(store: DocumentStore, spec: QuerySpec) -> Self {
        Self {
            store,
            spec,
            unsupported_op: None,
        }
    }

    /// The accumulated configuration.
    #[must_use]
    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    fn derive(&self, edit: impl FnOnce(&mut QuerySpec)) -> Self {
        let mut next = self.clone();
        edit(&mut next.spec);
        next
    }

    // --- Builders ---

    /// Adds a `field op value` filter. `op` is one of `==`, `!=`, `<`, `<=`,
    /// `>`, `>=`, `array-contains`, `in`, `not-in`, `array-contains-any`.
    #[must_use]
    pub fn where_field(&self, field: &str, op: &str, value: impl Into<Value>) -> Self {
        match op.parse::<FilterOp>() {
            Ok(op) => self.filter(Filter {
                field: field.to_string(),
                op,
                value: value.into(),
            }),
            Err(_) => {
                let mut next = self.clone();
                next.unsupported_op.get_or_insert_with(|| op.to_string());
                next
            }
        }
    }

    /// Adds a typed filter.
    #[must_use]
    pub fn filter(&self, filter: Filter) -> Self {
        self.derive(|spec| spec.filters.push(filter))
    }

    #[must_use]
    pub fn order_by(&self, field: &str, direction: Direction) -> Self {
        self.derive(|spec| {
            spec.orderings.push(OrderBy {
                field: field.to_string(),
                direction,
            });
        })
    }

    #[must_use]
    pub fn limit(&self, limit: usize) -> Self {
        self.derive(|spec| spec.limit = Some(limit))
    }

    #[must_use]
    pub fn offset(&self, offset: usize) -> Self {
        self.derive(|spec| spec.offset = offset)
    }

    /// Resumes after the given document (a snapshot or a reference).
    #[must_use]
    pub fn start_after(&self, anchor: impl Into<Cursor>) -> Self {
        let cursor = anchor.into();
        self.derive(|spec| spec.start_after = Some(cursor))
    }

    /// Resumes after the last document whose ordered fields equal `values`.
    #[must_use]
    pub fn start_after_values<V: Into<Value>>(&self, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.derive(|spec| spec.start_after = Some(Cursor::Values(values)))
    }

    /// Returns only these dotted field paths from each document.
    #[must_use]
    pub fn select<S: Into<String>>(&self, fields: impl IntoIterator<Item = S>) -> Self {
        let fields = fields.into_iter().map(Into::into).collect();
        self.derive(|spec| spec.select = Some(fields))
    }

    // --- Execution ---

    fn checked_spec(&self) -> StoreResult<&QuerySpec> {
        match &self.unsupported_op {
            Some(op) => Err(StoreError::UnsupportedOperator { op: op.clone() }),
            None => Ok(&self.spec),
        }
    }

    /// Evaluates the query.
    ///
    /// # Errors
    ///
    /// - [`StoreError::UnsupportedOperator`] for an unknown operator string
    /// - [`StoreError::InvalidArgument`] for a malformed scope, a non-array
    ///   operand to `in`/`not-in`/`array-contains-any`, or a value cursor
    ///   with more values than orderings
    pub async fn get(&self) -> StoreResult<QuerySnapshot> {
        self.store.run_query(self.checked_spec()?)
    }

    /// Number of documents [`get`](Self::get) would return, without copying
    /// them.
    ///
    /// # Errors
    ///
    /// As [`get`](Self::get).
    pub async fn count(&self) -> StoreResult<usize> {
        self.store.count_query(self.checked_spec()?)
    }

    /// Watches the query. `on_next` receives the full result shortly after
    /// subscribing and again after every committed change anywhere in the
    /// store; evaluation errors go to `on_error`.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnsupportedOperator`] for an unknown operator
    /// string.
    pub fn on_snapshot<N, E>(&self, on_next: N, on_error: E) -> StoreResult<ListenerRegistration>
    where
        N: FnMut(QuerySnapshot) + Send + 'static,
        E: FnMut(StoreError) + Send + 'static,
    {
        let spec = self.checked_spec()?.clone();
        Ok(self.store.watch_query(spec, on_next, on_error))
    }
}

impl From<&DocumentSnapshot> for Cursor {
    fn from(snapshot: &DocumentSnapshot) -> Self {
        Cursor::Document(snapshot.path().to_string())
    }
}

impl From<&DocumentReference> for Cursor {
    fn from(reference: &DocumentReference) -> Self {
        Cursor::Document(reference.path().to_string())
    }
}

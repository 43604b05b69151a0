//! Query evaluation.
//!
//! Evaluation is a linear scan of the document map through a fixed
//! pipeline: scope, filters, stable sort, start-after cursor, offset, limit.
//! Projection is applied last and only when documents are materialized.

use std::cmp::Ordering;

use fauxstore_core::ordering::{compare_optional, values_equal};
use fauxstore_core::path::{get_field, set_field};
use fauxstore_core::{Cursor, Direction, DocumentData, OrderBy, QuerySpec, StoreResult, Value};

use crate::snapshot::{DocumentSnapshot, QuerySnapshot};
use crate::storage::{StoreState, StoredDocument};

type Row<'a> = (&'a str, &'a StoredDocument);

/// Runs the pipeline and returns the matching rows without copying any data.
///
/// # Errors
///
/// Returns [`fauxstore_core::StoreError::InvalidArgument`] if the query fails
/// validation (bad scope, wrong filter operand, oversized value cursor).
pub fn select_rows<'a>(spec: &QuerySpec, state: &'a StoreState) -> StoreResult<Vec<Row<'a>>> {
    spec.validate()?;

    let mut rows: Vec<Row<'a>> = state
        .iter()
        .filter(|(path, _)| spec.scope.contains(path))
        .filter(|(_, doc)| spec.filters.iter().all(|f| f.matches(&doc.data)))
        .map(|(path, doc)| (path.as_str(), doc))
        .collect();

    if !spec.orderings.is_empty() {
        rows.sort_by(|a, b| compare_rows(&spec.orderings, &a.1.data, &b.1.data));
    }

    let start = match &spec.start_after {
        Some(cursor) => cursor_position(cursor, &spec.orderings, &rows).map_or(0, |idx| idx + 1),
        None => 0,
    };
    let start = start.saturating_add(spec.offset).min(rows.len());
    let end = match spec.limit {
        Some(limit) => start.saturating_add(limit).min(rows.len()),
        None => rows.len(),
    };
    rows.truncate(end);
    rows.drain(..start);
    Ok(rows)
}

/// Evaluates `spec` into a snapshot, applying projection.
///
/// # Errors
///
/// See [`select_rows`].
pub fn evaluate(spec: &QuerySpec, state: &StoreState) -> StoreResult<QuerySnapshot> {
    let rows = select_rows(spec, state)?;
    let docs = rows
        .into_iter()
        .map(|(path, doc)| {
            let snapshot = DocumentSnapshot::from_stored(path, Some(doc));
            match &spec.select {
                Some(fields) => snapshot.with_data(project(&doc.data, fields)),
                None => snapshot,
            }
        })
        .collect();
    Ok(QuerySnapshot::new(docs))
}

/// Number of documents `spec` would return.
///
/// # Errors
///
/// See [`select_rows`].
pub fn count(spec: &QuerySpec, state: &StoreState) -> StoreResult<usize> {
    select_rows(spec, state).map(|rows| rows.len())
}

fn compare_rows(orderings: &[OrderBy], a: &DocumentData, b: &DocumentData) -> Ordering {
    for order in orderings {
        let ord = compare_optional(get_field(a, &order.field), get_field(b, &order.field));
        let ord = match order.direction {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Index of the cursor's anchor row, if present.
fn cursor_position(cursor: &Cursor, orderings: &[OrderBy], rows: &[Row<'_>]) -> Option<usize> {
    match cursor {
        Cursor::Document(path) => rows.iter().position(|(p, _)| *p == path.as_str()),
        Cursor::Values(values) => rows.iter().rposition(|(_, doc)| {
            orderings.iter().zip(values).all(|(order, expected)| {
                get_field(&doc.data, &order.field).is_some_and(|actual| values_equal(actual, expected))
            })
        }),
    }
}

/// Keeps only the named field paths, preserving their nesting.
fn project(data: &DocumentData, fields: &[String]) -> DocumentData {
    let mut projected = DocumentData::new();
    for field in fields {
        if let Some(value) = get_field(data, field) {
            set_field(&mut projected, field, Value::clone(value));
        }
    }
    projected
}

//! Document and collection references.
//!
//! References are cheap handles pairing a store with a path. Building one
//! never fails; the path is checked when an operation runs.

use fauxstore_core::path::{self, validate_collection_path};
use fauxstore_core::{
    Direction, FieldValue, QueryScope, QuerySpec, StoreError, StoreResult, Value, WriteData,
};

use crate::listener::ListenerRegistration;
use crate::query::Query;
use crate::snapshot::{DocumentSnapshot, QuerySnapshot};
use crate::storage::{SetOptions, WriteOp};
use crate::store::DocumentStore;

/// Converts caller data into write fields.
///
/// # Errors
///
/// Returns [`StoreError::InvalidArgument`] unless `data` is a map.
pub(crate) fn write_data(path: &str, data: impl Into<FieldValue>) -> StoreResult<WriteData> {
    data.into().into_write_data().ok_or_else(|| {
        StoreError::invalid_argument(format!("data written to '{path}' must be a map"))
    })
}

// ---------------------------------------------------------------------------
// DocumentReference
// ---------------------------------------------------------------------------

/// Handle to one document path.
#[derive(Debug, Clone)]
pub struct DocumentReference {
    store: DocumentStore,
    path: String,
}

impl DocumentReference {
    pub(crate) fn new(store: DocumentStore, path: String) -> Self {
        Self { store, path }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Document id (last path segment).
    #[must_use]
    pub fn id(&self) -> &str {
        path::last_segment(&self.path)
    }

    /// The collection containing this document.
    #[must_use]
    pub fn parent(&self) -> CollectionReference {
        let parent = path::parent(&self.path).unwrap_or_default();
        CollectionReference::new(self.store.clone(), parent.to_string())
    }

    /// A subcollection of this document.
    #[must_use]
    pub fn collection(&self, collection_id: &str) -> CollectionReference {
        CollectionReference::new(self.store.clone(), path::join(&self.path, collection_id))
    }

    /// Reads the document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] for a malformed path.
    pub async fn get(&self) -> StoreResult<DocumentSnapshot> {
        self.store.read_document(&self.path)
    }

    /// Replaces the document with `data`, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] for a malformed path or
    /// non-map data, or [`StoreError::Handler`] if a trigger fails.
    pub async fn set(&self, data: impl Into<FieldValue>) -> StoreResult<()> {
        self.set_with(data, SetOptions::Overwrite).await
    }

    /// `set` with explicit merge behavior.
    ///
    /// # Errors
    ///
    /// As [`set`](Self::set), plus [`StoreError::InvalidArgument`] when a
    /// `merge_fields` entry is missing from `data`.
    pub async fn set_with(&self, data: impl Into<FieldValue>, options: SetOptions) -> StoreResult<()> {
        let data = write_data(&self.path, data)?;
        self.store
            .write(WriteOp::Set {
                path: self.path.clone(),
                data,
                options,
            })
            .await
    }

    /// Creates the document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] if the document exists.
    pub async fn create(&self, data: impl Into<FieldValue>) -> StoreResult<()> {
        let data = write_data(&self.path, data)?;
        self.store
            .write(WriteOp::Create {
                path: self.path.clone(),
                data,
            })
            .await
    }

    /// Updates fields of an existing document. Keys are dotted field paths.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the document does not exist.
    pub async fn update(&self, data: impl Into<FieldValue>) -> StoreResult<()> {
        let data = write_data(&self.path, data)?;
        self.store
            .write(WriteOp::Update {
                path: self.path.clone(),
                data,
            })
            .await
    }

    /// Deletes the document. Deleting a missing document does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] for a malformed path, or
    /// [`StoreError::Handler`] if a trigger fails.
    pub async fn delete(&self) -> StoreResult<()> {
        self.store
            .write(WriteOp::Delete {
                path: self.path.clone(),
            })
            .await
    }

    /// Watches the document. `on_next` receives the current state shortly
    /// after subscribing and again after every committed change.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] for a malformed path.
    pub fn on_snapshot<N, E>(&self, on_next: N, on_error: E) -> StoreResult<ListenerRegistration>
    where
        N: FnMut(DocumentSnapshot) + Send + 'static,
        E: FnMut(StoreError) + Send + 'static,
    {
        self.store.watch_document(&self.path, on_next, on_error)
    }
}

impl PartialEq for DocumentReference {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

// ---------------------------------------------------------------------------
// CollectionReference
// ---------------------------------------------------------------------------

/// Handle to one collection path. Also usable as an unfiltered query.
#[derive(Debug, Clone)]
pub struct CollectionReference {
    store: DocumentStore,
    path: String,
}

impl CollectionReference {
    pub(crate) fn new(store: DocumentStore, path: String) -> Self {
        Self { store, path }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Collection id (last path segment).
    #[must_use]
    pub fn id(&self) -> &str {
        path::last_segment(&self.path)
    }

    /// The document owning this subcollection, `None` at the root.
    #[must_use]
    pub fn parent(&self) -> Option<DocumentReference> {
        path::parent(&self.path).map(|p| DocumentReference::new(self.store.clone(), p.to_string()))
    }

    /// Reference to the document `id` in this collection.
    #[must_use]
    pub fn doc(&self, id: &str) -> DocumentReference {
        DocumentReference::new(self.store.clone(), path::join(&self.path, id))
    }

    /// Creates a document with a generated id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] for a malformed collection
    /// path or non-map data, or [`StoreError::Handler`] if a trigger fails.
    pub async fn add(&self, data: impl Into<FieldValue>) -> StoreResult<DocumentReference> {
        validate_collection_path(&self.path)?;
        let reference = self.doc(&self.store.auto_id());
        reference.create(data).await?;
        Ok(reference)
    }

    /// Unfiltered query over this collection.
    #[must_use]
    pub fn query(&self) -> Query {
        Query::new(
            self.store.clone(),
            QuerySpec::new(QueryScope::Collection(self.path.clone())),
        )
    }

    // --- Query delegation ---

    #[must_use]
    pub fn where_field(&self, field: &str, op: &str, value: impl Into<Value>) -> Query {
        self.query().where_field(field, op, value)
    }

    #[must_use]
    pub fn order_by(&self, field: &str, direction: Direction) -> Query {
        self.query().order_by(field, direction)
    }

    #[must_use]
    pub fn limit(&self, limit: usize) -> Query {
        self.query().limit(limit)
    }

    #[must_use]
    pub fn offset(&self, offset: usize) -> Query {
        self.query().offset(offset)
    }

    #[must_use]
    pub fn select<S: Into<String>>(&self, fields: impl IntoIterator<Item = S>) -> Query {
        self.query().select(fields)
    }

    /// Every document in the collection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] for a malformed collection path.
    pub async fn get(&self) -> StoreResult<QuerySnapshot> {
        self.query().get().await
    }

    /// Number of documents in the collection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] for a malformed collection path.
    pub async fn count(&self) -> StoreResult<usize> {
        self.query().count().await
    }

    /// Watches the whole collection; see [`Query::on_snapshot`].
    ///
    /// # Errors
    ///
    /// See [`Query::on_snapshot`].
    pub fn on_snapshot<N, E>(&self, on_next: N, on_error: E) -> StoreResult<ListenerRegistration>
    where
        N: FnMut(QuerySnapshot) + Send + 'static,
        E: FnMut(StoreError) + Send + 'static,
    {
        self.query().on_snapshot(on_next, on_error)
    }
}

impl PartialEq for CollectionReference {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

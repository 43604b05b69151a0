//! Point-in-time views handed to callers.
//!
//! Snapshots own deep copies of stored data; mutating one never touches the
//! store.

use fauxstore_core::path::{get_field, last_segment};
use fauxstore_core::{DocumentData, Timestamp, Value};

use crate::storage::StoredDocument;

/// State of one document at read time.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    path: String,
    data: Option<DocumentData>,
    create_time: Option<Timestamp>,
    update_time: Option<Timestamp>,
    version: u64,
}

impl DocumentSnapshot {
    /// Snapshot of `stored` (or of a missing document) at `path`.
    #[must_use]
    pub fn from_stored(path: impl Into<String>, stored: Option<&StoredDocument>) -> Self {
        let path = path.into();
        match stored {
            Some(doc) => Self {
                path,
                data: Some(doc.data.clone()),
                create_time: Some(doc.metadata.create_time),
                update_time: Some(doc.metadata.update_time),
                version: doc.metadata.version,
            },
            None => Self::missing(path),
        }
    }

    /// Snapshot of a document that does not exist.
    #[must_use]
    pub fn missing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            data: None,
            create_time: None,
            update_time: None,
            version: 0,
        }
    }

    pub(crate) fn with_data(mut self, data: DocumentData) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Document id (last path segment).
    #[must_use]
    pub fn id(&self) -> &str {
        last_segment(&self.path)
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    /// The document's fields, `None` if it does not exist.
    #[must_use]
    pub fn data(&self) -> Option<&DocumentData> {
        self.data.as_ref()
    }

    /// Consumes the snapshot, returning its fields.
    #[must_use]
    pub fn into_data(self) -> Option<DocumentData> {
        self.data
    }

    /// Value at a dotted field path.
    #[must_use]
    pub fn get(&self, field_path: &str) -> Option<&Value> {
        self.data.as_ref().and_then(|d| get_field(d, field_path))
    }

    #[must_use]
    pub fn create_time(&self) -> Option<Timestamp> {
        self.create_time
    }

    #[must_use]
    pub fn update_time(&self) -> Option<Timestamp> {
        self.update_time
    }

    /// Write count of the document, 0 when it does not exist.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }
}

/// Result of a query: matching documents in pipeline order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuerySnapshot {
    docs: Vec<DocumentSnapshot>,
}

impl QuerySnapshot {
    #[must_use]
    pub fn new(docs: Vec<DocumentSnapshot>) -> Self {
        Self { docs }
    }

    #[must_use]
    pub fn docs(&self) -> &[DocumentSnapshot] {
        &self.docs
    }

    #[must_use]
    pub fn into_docs(self) -> Vec<DocumentSnapshot> {
        self.docs
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.docs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Last document, usable as a `start_after` anchor for the next page.
    #[must_use]
    pub fn last(&self) -> Option<&DocumentSnapshot> {
        self.docs.last()
    }

    /// Paths of the documents, in order.
    #[must_use]
    pub fn paths(&self) -> Vec<&str> {
        self.docs.iter().map(DocumentSnapshot::path).collect()
    }
}

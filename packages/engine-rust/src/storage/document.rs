//! Stored document types.
//!
//! Defines [`StoredDocument`], the unit held in the store's path map, and
//! [`DocumentMetadata`], which tracks versions and create/update times.

use fauxstore_core::{DocumentData, Timestamp};

/// Metadata tracked for every stored document.
///
/// Store-internal bookkeeping surfaced read-only through snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMetadata {
    /// Document version, starting at 1 and incremented on every write.
    pub version: u64,
    /// Time the document was created (or re-created after a delete).
    pub create_time: Timestamp,
    /// Time of the last write.
    pub update_time: Timestamp,
}

impl DocumentMetadata {
    /// Creates metadata for a freshly created document.
    #[must_use]
    pub fn new(now: Timestamp) -> Self {
        Self {
            version: 1,
            create_time: now,
            update_time: now,
        }
    }

    /// Records a write: increments `version` and updates `update_time`.
    pub fn on_update(&mut self, now: Timestamp) {
        self.version = self.version.saturating_add(1);
        self.update_time = now;
    }
}

/// A document as held by the store.
///
/// Presence in the store's map means the document exists; deleted documents
/// are removed outright, no tombstones are kept.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    /// The document's fields.
    pub data: DocumentData,
    /// Store-internal metadata.
    pub metadata: DocumentMetadata,
}

impl StoredDocument {
    /// Wraps `data` as a brand new document.
    #[must_use]
    pub fn create(data: DocumentData, now: Timestamp) -> Self {
        Self {
            data,
            metadata: DocumentMetadata::new(now),
        }
    }

    /// Builds the successor of `previous` holding `data`.
    ///
    /// Without a previous document this is a create.
    #[must_use]
    pub fn successor(previous: Option<&StoredDocument>, data: DocumentData, now: Timestamp) -> Self {
        match previous {
            Some(prev) => {
                let mut metadata = prev.metadata.clone();
                metadata.on_update(now);
                Self { data, metadata }
            }
            None => Self::create(data, now),
        }
    }
}

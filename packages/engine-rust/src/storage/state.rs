//! The document map and its frame stack.

use std::collections::BTreeMap;

use fauxstore_core::path::validate_document_path;
use fauxstore_core::{ClockSource, DocumentData, StoreError, StoreResult};
use tracing::debug;

use super::document::StoredDocument;
use super::frame::{ChangeRecord, FrameStack, PendingFlush};
use super::merge::FieldValueProcessor;
use super::write::{SetOptions, WriteOp};

/// All mutable state of one store.
///
/// Documents are kept in a `BTreeMap`, so scans visit paths in ascending
/// order. Every write is recorded in the innermost open frame.
#[derive(Debug, Default)]
pub struct StoreState {
    documents: BTreeMap<String, StoredDocument>,
    frames: FrameStack,
}

impl StoreState {
    /// Creates an empty state with no open frames.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- Reads ---

    /// The document stored at `path`, if any.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&StoredDocument> {
        self.documents.get(path)
    }

    /// Every stored document in ascending path order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &StoredDocument)> {
        self.documents.iter()
    }

    /// Number of stored documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether no documents are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    // --- Fixtures ---

    /// Stores `data` at `path` directly, bypassing frames.
    pub fn seed(&mut self, path: String, data: DocumentData, clock: &dyn ClockSource) {
        let previous = self.documents.get(&path);
        let stored = StoredDocument::successor(previous, data, clock.now());
        self.documents.insert(path, stored);
    }

    /// Removes every document. Open frames are left alone.
    pub fn clear(&mut self) {
        self.documents.clear();
    }

    // --- Frames ---

    /// Opens a frame nested inside any already open.
    pub fn begin_frame(&mut self) {
        self.frames.push();
    }

    /// Commits the innermost frame; see [`FrameStack::pop_commit`].
    pub fn commit_frame(&mut self) -> Option<PendingFlush> {
        self.frames.pop_commit()
    }

    /// Aborts the innermost frame and restores every path it touched.
    pub fn abort_frame(&mut self) {
        let undo = self.frames.pop_abort();
        let restored = undo.len();
        for (path, previous) in undo {
            match previous {
                Some(doc) => {
                    self.documents.insert(path, doc);
                }
                None => {
                    self.documents.remove(&path);
                }
            }
        }
        debug!(restored, "atomic frame aborted");
    }

    /// Number of open frames.
    #[must_use]
    pub fn frame_depth(&self) -> usize {
        self.frames.depth()
    }

    // --- Writes ---

    /// Applies one write.
    ///
    /// Returns the resulting change, or `None` when the write changed
    /// nothing (deleting an absent document).
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidArgument`] for a malformed document path or a
    ///   `merge_fields` entry missing from the data
    /// - [`StoreError::AlreadyExists`] for a create over an existing document
    /// - [`StoreError::NotFound`] for an update of a missing document
    pub fn apply_write(
        &mut self,
        op: WriteOp,
        clock: &dyn ClockSource,
    ) -> StoreResult<Option<ChangeRecord>> {
        validate_document_path(op.path())?;
        debug!(kind = op.kind(), path = op.path(), "applying write");
        let processor = FieldValueProcessor::new(clock);

        let (path, data) = match op {
            WriteOp::Set {
                path,
                data,
                options,
            } => {
                let existing = self.documents.get(&path).map(|d| &d.data);
                let merged = match options {
                    SetOptions::Overwrite => processor.overwrite(existing, data),
                    SetOptions::Merge => processor.merge(existing, data),
                    SetOptions::MergeFields(fields) => {
                        processor.merge_fields(existing, data, &fields)?
                    }
                };
                (path, Some(merged))
            }
            WriteOp::Create { path, data } => {
                if self.documents.contains_key(&path) {
                    return Err(StoreError::AlreadyExists { path });
                }
                let created = processor.overwrite(None, data);
                (path, Some(created))
            }
            WriteOp::Update { path, data } => {
                let Some(existing) = self.documents.get(&path) else {
                    return Err(StoreError::NotFound { path });
                };
                let updated = processor.update(&existing.data, data);
                (path, Some(updated))
            }
            WriteOp::Delete { path } => {
                if !self.documents.contains_key(&path) {
                    return Ok(None);
                }
                (path, None)
            }
        };

        let change = self.replace(path, data, clock);
        Ok(Some(change))
    }

    fn replace(
        &mut self,
        path: String,
        data: Option<DocumentData>,
        clock: &dyn ClockSource,
    ) -> ChangeRecord {
        let before = match data {
            Some(data) => {
                let previous = self.documents.get(&path);
                let stored = StoredDocument::successor(previous, data, clock.now());
                self.documents.insert(path.clone(), stored)
            }
            None => self.documents.remove(&path),
        };
        let change = ChangeRecord {
            after: self.documents.get(&path).cloned(),
            before,
            path,
        };
        if let Some(frame) = self.frames.current_mut() {
            frame.record(change.clone());
        }
        change
    }
}

//! Write batches.

use fauxstore_core::{FieldValue, StoreResult};
use tracing::{info_span, Instrument};

use crate::reference::{write_data, DocumentReference};
use crate::storage::{SetOptions, WriteOp};
use crate::store::DocumentStore;

/// Writes queued locally and applied together by [`commit`](Self::commit).
///
/// Operations run in call order inside one atomic frame. The first failing
/// operation rolls back every earlier one and nothing is flushed.
#[derive(Debug)]
pub struct WriteBatch {
    store: DocumentStore,
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub(crate) fn new(store: DocumentStore) -> Self {
        Self {
            store,
            ops: Vec::new(),
        }
    }

    /// Number of queued operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Queues an overwriting set.
    ///
    /// # Errors
    ///
    /// Returns [`fauxstore_core::StoreError::InvalidArgument`] for non-map
    /// data.
    pub fn set(&mut self, reference: &DocumentReference, data: impl Into<FieldValue>) -> StoreResult<&mut Self> {
        self.set_with(reference, data, SetOptions::Overwrite)
    }

    /// Queues a set with explicit merge behavior.
    ///
    /// # Errors
    ///
    /// As [`set`](Self::set).
    pub fn set_with(
        &mut self,
        reference: &DocumentReference,
        data: impl Into<FieldValue>,
        options: SetOptions,
    ) -> StoreResult<&mut Self> {
        let data = write_data(reference.path(), data)?;
        self.ops.push(WriteOp::Set {
            path: reference.path().to_string(),
            data,
            options,
        });
        Ok(self)
    }

    /// Queues a create.
    ///
    /// # Errors
    ///
    /// As [`set`](Self::set).
    pub fn create(&mut self, reference: &DocumentReference, data: impl Into<FieldValue>) -> StoreResult<&mut Self> {
        let data = write_data(reference.path(), data)?;
        self.ops.push(WriteOp::Create {
            path: reference.path().to_string(),
            data,
        });
        Ok(self)
    }

    /// Queues a dotted-path update.
    ///
    /// # Errors
    ///
    /// As [`set`](Self::set).
    pub fn update(&mut self, reference: &DocumentReference, data: impl Into<FieldValue>) -> StoreResult<&mut Self> {
        let data = write_data(reference.path(), data)?;
        self.ops.push(WriteOp::Update {
            path: reference.path().to_string(),
            data,
        });
        Ok(self)
    }

    /// Queues a delete.
    pub fn delete(&mut self, reference: &DocumentReference) -> &mut Self {
        self.ops.push(WriteOp::Delete {
            path: reference.path().to_string(),
        });
        self
    }

    /// Applies every queued operation atomically, then runs triggers and
    /// listener deliveries.
    ///
    /// # Errors
    ///
    /// Returns the first operation error (nothing applied), or
    /// [`fauxstore_core::StoreError::Handler`] if a trigger fails after the
    /// writes were applied.
    pub async fn commit(self) -> StoreResult<()> {
        let span = info_span!("batch", ops = self.ops.len());
        let Self { store, ops } = self;
        store.commit_atomic(ops, |_| Ok(())).instrument(span).await
    }
}

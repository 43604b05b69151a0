//! Optimistic transactions.
//!
//! A [`Transaction`] records the state of every document it reads (the
//! first read of each path fixes the baseline) and queues its writes. The
//! store validates the baselines and applies the writes atomically when the
//! transaction body returns `Ok`; see [`DocumentStore::run_transaction`].
//!
//! [`DocumentStore::run_transaction`]: crate::DocumentStore::run_transaction

use std::collections::BTreeMap;
use std::sync::Arc;

use fauxstore_core::{DocumentData, FieldValue, StoreError, StoreResult};
use parking_lot::Mutex;

use crate::query::Query;
use crate::reference::{write_data, DocumentReference};
use crate::snapshot::{DocumentSnapshot, QuerySnapshot};
use crate::storage::{SetOptions, WriteOp};
use crate::store::DocumentStore;

/// What a transaction can read.
#[derive(Debug, Clone)]
pub enum ReadRequest {
    Document(DocumentReference),
    Query(Query),
}

impl From<DocumentReference> for ReadRequest {
    fn from(reference: DocumentReference) -> Self {
        ReadRequest::Document(reference)
    }
}

impl From<&DocumentReference> for ReadRequest {
    fn from(reference: &DocumentReference) -> Self {
        ReadRequest::Document(reference.clone())
    }
}

impl From<Query> for ReadRequest {
    fn from(query: Query) -> Self {
        ReadRequest::Query(query)
    }
}

impl From<&Query> for ReadRequest {
    fn from(query: &Query) -> Self {
        ReadRequest::Query(query.clone())
    }
}

/// Result of a transactional read.
#[derive(Debug, Clone)]
pub enum ReadResult {
    Document(DocumentSnapshot),
    Query(QuerySnapshot),
}

#[derive(Debug, Default)]
struct TransactionState {
    /// Baseline data per read path; `None` means the document was absent.
    reads: BTreeMap<String, Option<DocumentData>>,
    writes: Vec<WriteOp>,
    finished: bool,
}

/// Handle passed to a transaction body. Clones share the same transaction.
#[derive(Debug, Clone)]
pub struct Transaction {
    store: DocumentStore,
    state: Arc<Mutex<TransactionState>>,
}

impl Transaction {
    pub(crate) fn new(store: DocumentStore) -> Self {
        Self {
            store,
            state: Arc::default(),
        }
    }

    fn ensure_open(state: &TransactionState) -> StoreResult<()> {
        if state.finished {
            return Err(StoreError::invalid_argument(
                "transaction has already completed",
            ));
        }
        Ok(())
    }

    /// Marks the transaction finished and hands back its reads and writes.
    pub(crate) fn finish(&self) -> (BTreeMap<String, Option<DocumentData>>, Vec<WriteOp>) {
        let mut state = self.state.lock();
        state.finished = true;
        (
            std::mem::take(&mut state.reads),
            std::mem::take(&mut state.writes),
        )
    }

    // --- Reads ---

    /// Reads a document or runs a query against the current state.
    ///
    /// Document reads record a baseline for commit-time validation; query
    /// reads do not.
    ///
    /// # Errors
    ///
    /// Returns the read's own error, or [`StoreError::InvalidArgument`] if
    /// the transaction has completed.
    pub async fn get(&self, request: impl Into<ReadRequest>) -> StoreResult<ReadResult> {
        match request.into() {
            ReadRequest::Document(reference) => {
                self.get_doc(&reference).await.map(ReadResult::Document)
            }
            ReadRequest::Query(query) => self.get_query(&query).await.map(ReadResult::Query),
        }
    }

    /// [`get`](Self::get) for a document.
    ///
    /// # Errors
    ///
    /// As [`get`](Self::get).
    pub async fn get_doc(&self, reference: &DocumentReference) -> StoreResult<DocumentSnapshot> {
        Self::ensure_open(&self.state.lock())?;
        let snapshot = self.store.read_document(reference.path())?;
        self.state
            .lock()
            .reads
            .entry(snapshot.path().to_string())
            .or_insert_with(|| snapshot.data().cloned());
        Ok(snapshot)
    }

    /// [`get`](Self::get) for a query.
    ///
    /// # Errors
    ///
    /// As [`get`](Self::get).
    pub async fn get_query(&self, query: &Query) -> StoreResult<QuerySnapshot> {
        Self::ensure_open(&self.state.lock())?;
        query.get().await
    }

    // --- Writes ---

    fn queue(&self, op: WriteOp) -> StoreResult<&Self> {
        let mut state = self.state.lock();
        Self::ensure_open(&state)?;
        state.writes.push(op);
        Ok(self)
    }

    /// Queues an overwriting set.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] for non-map data or a
    /// completed transaction.
    pub fn set(&self, reference: &DocumentReference, data: impl Into<FieldValue>) -> StoreResult<&Self> {
        self.set_with(reference, data, SetOptions::Overwrite)
    }

    /// Queues a set with explicit merge behavior.
    ///
    /// # Errors
    ///
    /// As [`set`](Self::set).
    pub fn set_with(
        &self,
        reference: &DocumentReference,
        data: impl Into<FieldValue>,
        options: SetOptions,
    ) -> StoreResult<&Self> {
        let data = write_data(reference.path(), data)?;
        self.queue(WriteOp::Set {
            path: reference.path().to_string(),
            data,
            options,
        })
    }

    /// Queues a create; it fails at commit if the document exists then.
    ///
    /// # Errors
    ///
    /// As [`set`](Self::set).
    pub fn create(&self, reference: &DocumentReference, data: impl Into<FieldValue>) -> StoreResult<&Self> {
        let data = write_data(reference.path(), data)?;
        self.queue(WriteOp::Create {
            path: reference.path().to_string(),
            data,
        })
    }

    /// Queues a dotted-path update; it fails at commit if the document is
    /// missing then.
    ///
    /// # Errors
    ///
    /// As [`set`](Self::set).
    pub fn update(&self, reference: &DocumentReference, data: impl Into<FieldValue>) -> StoreResult<&Self> {
        let data = write_data(reference.path(), data)?;
        self.queue(WriteOp::Update {
            path: reference.path().to_string(),
            data,
        })
    }

    /// Queues a delete.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] for a completed transaction.
    pub fn delete(&self, reference: &DocumentReference) -> StoreResult<&Self> {
        self.queue(WriteOp::Delete {
            path: reference.path().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use fauxstore_core::{FieldValue, Value};
    use serde_json::json;

    use super::*;
    use crate::trigger::TriggerHandlers;

    #[tokio::test]
    async fn read_modify_write_commits() {
        let store = DocumentStore::new();
        let counter = store.doc("counters/c");
        counter.set(json!({"n": 1})).await.unwrap();

        let result = store
            .run_transaction(|tx| {
                let counter = counter.clone();
                async move {
                    let snapshot = tx.get_doc(&counter).await?;
                    let n = snapshot.get("n").and_then(Value::as_number).map_or(0.0, |n| n.as_f64());
                    tx.set(&counter, json!({"n": n + 1.0}))?;
                    Ok(n)
                }
            })
            .await
            .unwrap();

        assert!((result - 1.0).abs() < f64::EPSILON);
        assert_eq!(counter.get().await.unwrap().get("n"), Some(&Value::Float(2.0)));
    }

    #[tokio::test]
    async fn external_change_after_read_is_a_conflict() {
        let store = DocumentStore::new();
        let doc = store.doc("accounts/a");
        doc.set(json!({"balance": 10})).await.unwrap();

        let outer = store.clone();
        let err = store
            .run_transaction(|tx| {
                let doc = doc.clone();
                async move {
                    tx.get_doc(&doc).await?;
                    outer.doc("accounts/a").set(json!({"balance": 99})).await?;
                    tx.update(&doc, json!({"balance": 0}))?;
                    Ok(())
                }
            })
            .await
            .unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(doc.get().await.unwrap().get("balance"), Some(&Value::Int(99)));
    }

    #[tokio::test]
    async fn baseline_is_taken_on_first_read_only() {
        let store = DocumentStore::new();
        let doc = store.doc("c/x");
        let outer = store.clone();
        let err = store
            .run_transaction(|tx| {
                let doc = doc.clone();
                async move {
                    assert!(!tx.get_doc(&doc).await?.exists());
                    outer.doc("c/x").set(json!({"v": 1})).await?;
                    assert!(tx.get_doc(&doc).await?.exists());
                    Ok(())
                }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { path } if path == "c/x"));
    }

    #[tokio::test]
    async fn unchanged_nan_field_does_not_conflict() {
        let store = DocumentStore::new();
        let mut data = DocumentData::new();
        data.insert("x".to_string(), Value::Float(f64::NAN));
        store.seed("c/a", Value::Map(data)).unwrap();
        let doc = store.doc("c/a");

        store
            .run_transaction(|tx| {
                let doc = doc.clone();
                async move {
                    tx.get_doc(&doc).await?;
                    tx.update(&doc, json!({"y": 1}))?;
                    Ok(())
                }
            })
            .await
            .unwrap();
        assert_eq!(doc.get().await.unwrap().get("y"), Some(&Value::Int(1)));
    }

    #[tokio::test]
    async fn int_to_float_change_is_a_conflict() {
        let store = DocumentStore::new();
        store.seed("c/a", json!({"n": 1})).unwrap();
        let doc = store.doc("c/a");
        let outer = store.clone();

        let err = store
            .run_transaction(|tx| {
                let doc = doc.clone();
                async move {
                    tx.get_doc(&doc).await?;
                    outer.doc("c/a").set(json!({"n": 1.0})).await?;
                    tx.update(&doc, json!({"m": 2}))?;
                    Ok(())
                }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { path } if path == "c/a"));
    }

    #[tokio::test]
    async fn write_failure_rolls_back_everything() {
        let store = DocumentStore::new();
        let created = Arc::new(AtomicUsize::new(0));
        let seen = created.clone();
        store
            .register_trigger(
                "items/{id}",
                TriggerHandlers::new().on_create(move |_| {
                    let seen = seen.clone();
                    async move {
                        seen.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                }),
            )
            .unwrap();

        let err = store
            .run_transaction(|tx| {
                let store = store.clone();
                async move {
                    tx.set(&store.doc("items/1"), json!({"a": 1}))?;
                    tx.update(&store.doc("items/missing"), json!({"a": 1}))?;
                    Ok(())
                }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::NotFound { .. }));
        assert!(!store.doc("items/1").get().await.unwrap().exists());
        assert_eq!(created.load(Ordering::SeqCst), 0);
        assert_eq!(store.stats().aborts, 1);
    }

    #[tokio::test]
    async fn body_error_applies_nothing() {
        let store = DocumentStore::new();
        let err = store
            .run_transaction(|tx| {
                let store = store.clone();
                async move {
                    tx.set(&store.doc("c/a"), json!({"a": 1}))?;
                    Err::<(), _>(StoreError::Handler(anyhow::anyhow!("nope")))
                }
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "nope");
        assert!(store.get_all_documents().is_empty());
    }

    #[tokio::test]
    async fn aborted_transaction_delivers_nothing_to_watchers() {
        let store = DocumentStore::new();
        let doc = store.doc("c/a");
        doc.set(json!({"v": 1})).await.unwrap();

        let (tx_events, mut rx) = tokio::sync::mpsc::unbounded_channel();
        doc.on_snapshot(
            move |snapshot| {
                let _ = tx_events.send(snapshot.get("v").cloned());
            },
            |_| {},
        )
        .unwrap();
        let initial = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert_eq!(initial.unwrap(), Some(Some(Value::Int(1))));

        let outer = store.clone();
        let result = store
            .run_transaction(|tx| {
                let doc = doc.clone();
                async move {
                    tx.get_doc(&doc).await?;
                    tx.set(&doc, json!({"v": 2}))?;
                    outer.doc("c/other").set(json!({})).await?;
                    tx.update(&outer.doc("c/missing"), json!({"v": 3}))?;
                    Ok(())
                }
            })
            .await;
        assert!(result.is_err());

        let nothing = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(nothing.is_err(), "aborted transaction must not notify");
        assert_eq!(doc.get().await.unwrap().get("v"), Some(&Value::Int(1)));
    }

    #[tokio::test]
    async fn sentinels_resolve_at_commit() {
        let store = DocumentStore::new();
        let doc = store.doc("c/a");
        doc.set(json!({"n": 5})).await.unwrap();
        store
            .run_transaction(|tx| {
                let doc = doc.clone();
                async move {
                    tx.update(&doc, FieldValue::map([("n", FieldValue::increment(3))]))?;
                    Ok(())
                }
            })
            .await
            .unwrap();
        assert_eq!(doc.get().await.unwrap().get("n"), Some(&Value::Int(8)));
    }

    #[tokio::test]
    async fn handle_is_unusable_after_completion() {
        let store = DocumentStore::new();
        let leaked = store
            .run_transaction(|tx| async move { Ok(tx) })
            .await
            .unwrap();
        assert!(leaked.set(&store.doc("c/a"), json!({})).is_err());
        assert!(leaked.get(store.doc("c/a")).await.is_err());
    }

    #[tokio::test]
    async fn query_reads_see_current_state() {
        let store = DocumentStore::new();
        store.seed("c/a", json!({"n": 1})).unwrap();
        let size = store
            .run_transaction(|tx| {
                let query = store.collection("c").query();
                async move { Ok(tx.get_query(&query).await?.size()) }
            })
            .await
            .unwrap();
        assert_eq!(size, 1);
    }
}

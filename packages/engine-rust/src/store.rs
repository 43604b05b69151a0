//! The document store handle.
//!
//! [`DocumentStore`] is a cheap, cloneable handle around shared state. All
//! document mutations funnel through [`DocumentStore::commit_atomic`], which
//! runs the open-frame / validate / apply / close-frame sequence under the
//! state lock and then flushes triggers and listeners with the lock
//! released.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use fauxstore_core::path::validate_document_path;
use fauxstore_core::{
    data_identical, ClockSource, DocumentData, QueryScope, QuerySpec, StoreError, StoreResult,
    SystemClock, Value,
};
use parking_lot::Mutex;
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info_span, warn, Instrument};

use crate::batch::WriteBatch;
use crate::config::StoreConfig;
use crate::listener::{ListenerHub, ListenerRegistration};
use crate::query::{engine, Query};
use crate::reference::{CollectionReference, DocumentReference};
use crate::snapshot::{DocumentSnapshot, QuerySnapshot};
use crate::storage::{PendingFlush, StoreState, WriteOp};
use crate::transaction::Transaction;
use crate::trigger::{TriggerHandle, TriggerHandlers, TriggerRegistry};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Counters exposed by [`DocumentStore::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    /// Documents currently stored.
    pub documents: usize,
    /// Document reads (direct and transactional).
    pub reads: u64,
    /// Applied set/create/update writes.
    pub writes: u64,
    /// Applied deletes of existing documents.
    pub deletes: u64,
    /// Query evaluations and counts requested by callers.
    pub queries: u64,
    /// Atomic sections committed.
    pub commits: u64,
    /// Atomic sections rolled back.
    pub aborts: u64,
    /// Trigger handlers that ran.
    pub triggers_invoked: u64,
    /// Listener deliveries queued, including initial snapshots.
    pub deliveries_queued: u64,
    /// Active document watchers.
    pub document_watchers: usize,
    /// Active query watchers.
    pub query_watchers: usize,
}

#[derive(Debug, Default)]
struct StatsCounters {
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
    queries: AtomicU64,
    commits: AtomicU64,
    aborts: AtomicU64,
    triggers_invoked: AtomicU64,
}

impl StatsCounters {
    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    fn reset(&self) {
        for counter in [
            &self.reads,
            &self.writes,
            &self.deletes,
            &self.queries,
            &self.commits,
            &self.aborts,
            &self.triggers_invoked,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

// ---------------------------------------------------------------------------
// DocumentStore
// ---------------------------------------------------------------------------

struct StoreInner {
    config: StoreConfig,
    clock: Arc<dyn ClockSource>,
    state: Mutex<StoreState>,
    triggers: Arc<TriggerRegistry>,
    listeners: Arc<ListenerHub>,
    counters: StatsCounters,
}

/// An in-memory document store.
///
/// Clones share the same documents, triggers and listeners. Independent
/// stores share nothing.
#[derive(Clone)]
pub struct DocumentStore {
    inner: Arc<StoreInner>,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("project_id", &self.inner.config.project_id)
            .finish_non_exhaustive()
    }
}

impl DocumentStore {
    /// Creates an empty store with default configuration and the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    #[must_use]
    pub fn with_config(config: StoreConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a store that takes every timestamp from `clock`.
    #[must_use]
    pub fn with_clock(config: StoreConfig, clock: Arc<dyn ClockSource>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                config,
                clock,
                state: Mutex::new(StoreState::new()),
                triggers: Arc::new(TriggerRegistry::new()),
                listeners: Arc::new(ListenerHub::new()),
                counters: StatsCounters::default(),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    // --- Entry points ---

    /// Reference to the collection at `path`.
    #[must_use]
    pub fn collection(&self, path: impl Into<String>) -> CollectionReference {
        CollectionReference::new(self.clone(), path.into())
    }

    /// Reference to the document at `path`.
    #[must_use]
    pub fn doc(&self, path: impl Into<String>) -> DocumentReference {
        DocumentReference::new(self.clone(), path.into())
    }

    /// Query over every collection named `collection_id`, at any depth.
    #[must_use]
    pub fn collection_group(&self, collection_id: impl Into<String>) -> Query {
        Query::new(
            self.clone(),
            QuerySpec::new(QueryScope::CollectionGroup(collection_id.into())),
        )
    }

    /// Starts an empty write batch.
    #[must_use]
    pub fn batch(&self) -> WriteBatch {
        WriteBatch::new(self.clone())
    }

    /// Runs `body` as an optimistic transaction.
    ///
    /// Reads made through the transaction are validated against the store
    /// at commit; queued writes are applied atomically only if every read
    /// document is unchanged. There is no automatic retry.
    ///
    /// # Errors
    ///
    /// - any error returned by `body` (nothing is applied)
    /// - [`StoreError::Conflict`] if a read document changed before commit
    /// - write errors such as [`StoreError::NotFound`] from an update; the
    ///   whole transaction is rolled back
    /// - [`StoreError::Handler`] if a trigger fails after the commit; the
    ///   writes stay applied
    pub async fn run_transaction<F, Fut, T>(&self, body: F) -> StoreResult<T>
    where
        F: FnOnce(Transaction) -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let span = info_span!(
            "transaction",
            project = %self.inner.config.project_id,
            writes = tracing::field::Empty,
        );
        async move {
            let transaction = Transaction::new(self.clone());
            let result = body(transaction.clone()).await;
            let (reads, writes) = transaction.finish();
            let value = match result {
                Ok(value) => value,
                Err(err) => {
                    warn!(error = %err, "transaction body failed, nothing applied");
                    return Err(err);
                }
            };
            tracing::Span::current().record("writes", writes.len());
            self.commit_atomic(writes, |state| {
                for (path, baseline) in &reads {
                    let unchanged = match (state.get(path), baseline) {
                        (Some(doc), Some(data)) => data_identical(&doc.data, data),
                        (None, None) => true,
                        _ => false,
                    };
                    if !unchanged {
                        return Err(StoreError::Conflict { path: path.clone() });
                    }
                }
                Ok(())
            })
            .await?;
            Ok(value)
        }
        .instrument(span)
        .await
    }

    /// Registers handlers for documents matching `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidPattern`] for a malformed pattern.
    pub fn register_trigger(
        &self,
        pattern: &str,
        handlers: TriggerHandlers,
    ) -> StoreResult<TriggerHandle> {
        self.inner.triggers.register(pattern, handlers)
    }

    // --- Test fixtures ---

    /// Stores `data` at `path` directly: no sentinels, no merge, no
    /// triggers, no listener deliveries.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] if `data` is not a map, or the
    /// path is malformed and [`StoreConfig::validate_seed_paths`] is set.
    pub fn seed(&self, path: impl Into<String>, data: impl Into<Value>) -> StoreResult<()> {
        let path = path.into();
        if self.inner.config.validate_seed_paths {
            validate_document_path(&path)?;
        }
        let Value::Map(data) = data.into() else {
            return Err(StoreError::invalid_argument(format!(
                "seed data for '{path}' must be a map"
            )));
        };
        self.inner
            .state
            .lock()
            .seed(path, data, self.inner.clock.as_ref());
        Ok(())
    }

    /// Removes every document and resets the counters. Triggers and
    /// listeners stay registered.
    pub fn clear(&self) {
        self.inner.state.lock().clear();
        self.inner.counters.reset();
        self.inner.listeners.reset_delivery_count();
        debug!("store cleared");
    }

    /// Copy of every stored document, keyed by path.
    #[must_use]
    pub fn get_all_documents(&self) -> BTreeMap<String, DocumentData> {
        self.inner
            .state
            .lock()
            .iter()
            .map(|(path, doc)| (path.clone(), doc.data.clone()))
            .collect()
    }

    #[must_use]
    pub fn stats(&self) -> StoreStats {
        let counters = &self.inner.counters;
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StoreStats {
            documents: self.inner.state.lock().len(),
            reads: load(&counters.reads),
            writes: load(&counters.writes),
            deletes: load(&counters.deletes),
            queries: load(&counters.queries),
            commits: load(&counters.commits),
            aborts: load(&counters.aborts),
            triggers_invoked: load(&counters.triggers_invoked),
            deliveries_queued: self.inner.listeners.deliveries_queued(),
            document_watchers: self.inner.listeners.document_watcher_count(),
            query_watchers: self.inner.listeners.query_watcher_count(),
        }
    }

    // --- Crate-internal operations ---

    /// Auto-generated document id.
    pub(crate) fn auto_id(&self) -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(self.inner.config.auto_id_length)
            .map(char::from)
            .collect()
    }

    pub(crate) fn read_document(&self, path: &str) -> StoreResult<DocumentSnapshot> {
        validate_document_path(path)?;
        StatsCounters::bump(&self.inner.counters.reads, 1);
        let state = self.inner.state.lock();
        Ok(DocumentSnapshot::from_stored(path, state.get(path)))
    }

    pub(crate) fn run_query(&self, spec: &QuerySpec) -> StoreResult<QuerySnapshot> {
        StatsCounters::bump(&self.inner.counters.queries, 1);
        let state = self.inner.state.lock();
        engine::evaluate(spec, &state)
    }

    pub(crate) fn count_query(&self, spec: &QuerySpec) -> StoreResult<usize> {
        StatsCounters::bump(&self.inner.counters.queries, 1);
        let state = self.inner.state.lock();
        engine::count(spec, &state)
    }

    pub(crate) fn watch_document<N, E>(
        &self,
        path: &str,
        on_next: N,
        on_error: E,
    ) -> StoreResult<ListenerRegistration>
    where
        N: FnMut(DocumentSnapshot) + Send + 'static,
        E: FnMut(StoreError) + Send + 'static,
    {
        validate_document_path(path)?;
        // Held across registration so no commit slips between the initial
        // snapshot and the watcher becoming visible.
        let state = self.inner.state.lock();
        let initial = DocumentSnapshot::from_stored(path, state.get(path));
        Ok(self
            .inner
            .listeners
            .watch_document(path, initial, on_next, on_error))
    }

    pub(crate) fn watch_query<N, E>(&self, spec: QuerySpec, on_next: N, on_error: E) -> ListenerRegistration
    where
        N: FnMut(QuerySnapshot) + Send + 'static,
        E: FnMut(StoreError) + Send + 'static,
    {
        let state = self.inner.state.lock();
        let initial = engine::evaluate(&spec, &state);
        self.inner
            .listeners
            .watch_query(spec, initial, on_next, on_error)
    }

    /// Applies a single write in its own atomic section.
    pub(crate) async fn write(&self, op: WriteOp) -> StoreResult<()> {
        self.commit_atomic(vec![op], |_| Ok(())).await
    }

    /// Runs `validate` and then `ops` inside one atomic frame.
    ///
    /// On any error the frame is rolled back and nothing is flushed. On
    /// success the outermost frame's effects are flushed: triggers first,
    /// then listener deliveries.
    pub(crate) async fn commit_atomic<V>(&self, ops: Vec<WriteOp>, validate: V) -> StoreResult<()>
    where
        V: FnOnce(&StoreState) -> StoreResult<()>,
    {
        let pending = {
            let mut state = self.inner.state.lock();
            let clock = self.inner.clock.as_ref();
            state.begin_frame();
            let mut outcome = validate(&*state);
            let (mut writes, mut deletes) = (0u64, 0u64);
            if outcome.is_ok() {
                for op in ops {
                    match state.apply_write(op, clock) {
                        Ok(Some(change)) if change.after.is_none() => deletes += 1,
                        Ok(Some(_)) => writes += 1,
                        Ok(None) => {}
                        Err(err) => {
                            outcome = Err(err);
                            break;
                        }
                    }
                }
            }
            if let Err(err) = outcome {
                state.abort_frame();
                StatsCounters::bump(&self.inner.counters.aborts, 1);
                warn!(error = %err, "atomic write aborted");
                return Err(err);
            }
            let counters = &self.inner.counters;
            StatsCounters::bump(&counters.writes, writes);
            StatsCounters::bump(&counters.deletes, deletes);
            StatsCounters::bump(&counters.commits, 1);
            state.commit_frame()
        };

        match pending {
            Some(flush) if !flush.is_empty() => self.flush(flush).await,
            _ => Ok(()),
        }
    }

    /// Dispatches triggers in write order, then queues listener deliveries.
    ///
    /// Listeners are notified even when a trigger fails; the first trigger
    /// error is returned afterwards.
    async fn flush(&self, flush: PendingFlush) -> StoreResult<()> {
        let mut trigger_error = None;
        for change in &flush.events {
            match self.inner.triggers.dispatch(change).await {
                Ok(invoked) => {
                    StatsCounters::bump(&self.inner.counters.triggers_invoked, invoked as u64);
                }
                Err(err) => {
                    warn!(path = %change.path, error = %err, "trigger failed");
                    trigger_error = Some(err);
                    break;
                }
            }
        }

        {
            let state = self.inner.state.lock();
            self.inner.listeners.notify(&flush, &state);
        }

        match trigger_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use fauxstore_core::{
        document_data_from_json, Direction, FieldValue, ManualClock, Timestamp,
    };
    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;
    use crate::storage::SetOptions;
    use crate::trigger::ChangeType;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn manual_store() -> DocumentStore {
        DocumentStore::with_clock(StoreConfig::default(), Arc::new(ManualClock::new(1_000, 1)))
    }

    fn data(json: serde_json::Value) -> DocumentData {
        document_data_from_json(json).expect("object")
    }

    #[tokio::test]
    async fn merge_set_combines_nested_maps_and_replaces_arrays() {
        let store = DocumentStore::new();
        let doc = store.doc("c/a");
        doc.set(json!({"a": {"x": 1}, "tags": [1, 2]})).await.unwrap();
        doc.set_with(json!({"a": {"y": 2}, "tags": [3]}), SetOptions::Merge)
            .await
            .unwrap();
        assert_eq!(
            doc.get().await.unwrap().into_data(),
            Some(data(json!({"a": {"x": 1, "y": 2}, "tags": [3]})))
        );
    }

    #[tokio::test]
    async fn merge_fields_leaves_unlisted_fields() {
        let store = DocumentStore::new();
        let doc = store.doc("c/a");
        doc.set(json!({"a": 1, "b": 1})).await.unwrap();
        doc.set_with(json!({"a": 2, "b": 2}), SetOptions::merge_fields(["a"]))
            .await
            .unwrap();
        assert_eq!(doc.get().await.unwrap().into_data(), Some(data(json!({"a": 2, "b": 1}))));
    }

    #[tokio::test]
    async fn increment_and_dotted_delete() {
        let store = DocumentStore::new();
        let doc = store.doc("c/a");
        doc.set(json!({"count": 5, "a": {"b": 1, "c": 2}})).await.unwrap();
        doc.update(FieldValue::map([
            ("count", FieldValue::increment(3)),
            ("fresh", FieldValue::increment(1)),
            ("a.b", FieldValue::delete()),
        ]))
        .await
        .unwrap();
        assert_eq!(
            doc.get().await.unwrap().into_data(),
            Some(data(json!({"count": 8, "fresh": 1, "a": {"c": 2}})))
        );
    }

    #[tokio::test]
    async fn server_timestamps_and_metadata_come_from_the_clock() {
        let store = manual_store();
        let doc = store.doc("c/a");
        doc.set(FieldValue::map([("at", FieldValue::server_timestamp())]))
            .await
            .unwrap();
        let snapshot = doc.get().await.unwrap();
        let Some(Value::Timestamp(at)) = snapshot.get("at").cloned() else {
            panic!("expected a timestamp");
        };
        assert!(at >= Timestamp::from_millis(1_000));
        assert!(snapshot.update_time().unwrap() > at);
        assert_eq!(snapshot.version(), 1);
    }

    #[tokio::test]
    async fn trigger_sees_create_update_delete_in_order() {
        init_tracing();
        let store = DocumentStore::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (c, u, d) = (tx.clone(), tx.clone(), tx);
        store
            .register_trigger(
                "users/{id}",
                TriggerHandlers::new()
                    .on_create(move |e| {
                        let _ = c.send((e.change_type, e.params));
                        async { Ok(()) }
                    })
                    .on_update(move |e| {
                        let _ = u.send((e.change_type, e.params));
                        async { Ok(()) }
                    })
                    .on_delete(move |e| {
                        let _ = d.send((e.change_type, e.params));
                        async { Ok(()) }
                    }),
            )
            .unwrap();

        let user = store.doc("users/42");
        user.set(json!({"n": 1})).await.unwrap();
        user.update(json!({"n": 2})).await.unwrap();
        user.delete().await.unwrap();
        user.delete().await.unwrap();
        store.doc("users/42/posts/1").set(json!({})).await.unwrap();

        let mut seen = Vec::new();
        while let Ok((kind, params)) = rx.try_recv() {
            assert_eq!(params.get("id").map(String::as_str), Some("42"));
            seen.push(kind);
        }
        assert_eq!(seen, [ChangeType::Create, ChangeType::Update, ChangeType::Delete]);
        assert_eq!(store.stats().triggers_invoked, 3);
    }

    #[tokio::test]
    async fn trigger_error_reaches_caller_but_write_and_listeners_stand() {
        let store = DocumentStore::new();
        store
            .register_trigger(
                "c/{id}",
                TriggerHandlers::new().on_create(|_| async { Err(anyhow::anyhow!("handler broke")) }),
            )
            .unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        store
            .doc("c/a")
            .on_snapshot(
                move |s: DocumentSnapshot| {
                    let _ = tx.send(s.exists());
                },
                |_| {},
            )
            .unwrap();

        let err = store.doc("c/a").set(json!({})).await.unwrap_err();
        assert!(matches!(err, StoreError::Handler(_)));
        assert!(store.doc("c/a").get().await.unwrap().exists());

        let wait = Duration::from_millis(200);
        assert_eq!(tokio::time::timeout(wait, rx.recv()).await.unwrap(), Some(false));
        assert_eq!(tokio::time::timeout(wait, rx.recv()).await.unwrap(), Some(true));
    }

    #[tokio::test]
    async fn handlers_may_write_back_to_the_store() {
        let store = DocumentStore::new();
        let writer = store.clone();
        store
            .register_trigger(
                "orders/{id}",
                TriggerHandlers::new().on_create(move |event| {
                    let writer = writer.clone();
                    async move {
                        let id = event.params["id"].clone();
                        writer.doc(format!("audit/{id}")).set(json!({"seen": true})).await?;
                        Ok(())
                    }
                }),
            )
            .unwrap();
        store.doc("orders/7").set(json!({})).await.unwrap();
        assert!(store.doc("audit/7").get().await.unwrap().exists());
    }

    #[tokio::test]
    async fn query_watcher_redelivers_after_each_commit() {
        let store = DocumentStore::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let registration = store
            .collection("c")
            .where_field("v", ">", 1)
            .on_snapshot(
                move |s: QuerySnapshot| {
                    let _ = tx.send(s.size());
                },
                |_| {},
            )
            .unwrap();

        let wait = Duration::from_millis(200);
        assert_eq!(tokio::time::timeout(wait, rx.recv()).await.unwrap(), Some(0));
        store.doc("c/a").set(json!({"v": 2})).await.unwrap();
        assert_eq!(tokio::time::timeout(wait, rx.recv()).await.unwrap(), Some(1));
        store.doc("elsewhere/x").set(json!({"v": 5})).await.unwrap();
        assert_eq!(tokio::time::timeout(wait, rx.recv()).await.unwrap(), Some(1));

        registration.unsubscribe();
        store.doc("c/b").set(json!({"v": 3})).await.unwrap();
        assert!(tokio::time::timeout(wait, rx.recv()).await.map_or(true, |v| v.is_none()));
        let stats = store.stats();
        assert_eq!(stats.query_watchers, 0);
        assert_eq!(stats.deliveries_queued, 3);
    }

    #[tokio::test]
    async fn callback_runs_after_the_write_returns() {
        let store = DocumentStore::new();
        let doc = store.doc("c/a");
        let fired = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let flag = fired.clone();
        doc.on_snapshot(
            move |s: DocumentSnapshot| {
                flag.store(true, Ordering::SeqCst);
                let _ = tx.send(s.exists());
            },
            |_| {},
        )
        .unwrap();
        let wait = Duration::from_millis(200);
        assert_eq!(tokio::time::timeout(wait, rx.recv()).await.unwrap(), Some(false));

        fired.store(false, Ordering::SeqCst);
        doc.set(json!({"v": 1})).await.unwrap();
        assert!(!fired.load(Ordering::SeqCst));
        assert_eq!(tokio::time::timeout(wait, rx.recv()).await.unwrap(), Some(true));
        assert_eq!(store.stats().deliveries_queued, 2);

        store.clear();
        assert_eq!(store.stats().deliveries_queued, 0);
    }

    #[tokio::test]
    async fn fixtures_seed_clear_and_stats() {
        let store = DocumentStore::new();
        store.seed("c/a", json!({"v": 1})).unwrap();
        store.seed("c/b", data(json!({"v": 2}))).unwrap();
        assert!(matches!(store.seed("c", json!({})), Err(StoreError::InvalidArgument(_))));
        assert!(matches!(store.seed("c/x", json!(1)), Err(StoreError::InvalidArgument(_))));

        store.doc("c/a").get().await.unwrap();
        store.collection("c").count().await.unwrap();
        let stats = store.stats();
        assert_eq!(stats.documents, 2);
        assert_eq!(stats.reads, 1);
        assert_eq!(stats.queries, 1);
        assert_eq!(stats.writes, 0);

        let all = store.get_all_documents();
        assert_eq!(all.keys().collect::<Vec<_>>(), ["c/a", "c/b"]);

        store.clear();
        assert!(store.get_all_documents().is_empty());
        assert_eq!(store.stats(), StoreStats::default());
    }

    #[tokio::test]
    async fn unvalidated_seed_accepts_any_path() {
        let config = StoreConfig {
            validate_seed_paths: false,
            ..StoreConfig::default()
        };
        let store = DocumentStore::with_config(config);
        store.seed("loose", json!({"v": 1})).unwrap();
        assert!(store.get_all_documents().contains_key("loose"));
    }

    #[tokio::test]
    async fn stores_are_independent() {
        let first = DocumentStore::new();
        let second = DocumentStore::new();
        first.doc("c/a").set(json!({})).await.unwrap();
        assert!(!second.doc("c/a").get().await.unwrap().exists());
        assert!(first.clone().doc("c/a").get().await.unwrap().exists());
    }

    #[tokio::test]
    async fn paging_with_start_after_covers_result_once() {
        let store = DocumentStore::new();
        for i in 0..10 {
            store.seed(format!("n/{i:02}"), json!({"v": (i * 7) % 4})).unwrap();
        }
        let ordered = store.collection("n").order_by("v", Direction::Asc);
        let full = ordered.get().await.unwrap().paths().into_iter().map(String::from).collect::<Vec<_>>();

        let mut collected = Vec::new();
        let mut page = ordered.limit(3).get().await.unwrap();
        while !page.is_empty() {
            collected.extend(page.paths().into_iter().map(String::from));
            let last = page.last().cloned().expect("non-empty page");
            page = ordered.limit(3).start_after(&last).get().await.unwrap();
        }
        assert_eq!(collected, full);
    }
}

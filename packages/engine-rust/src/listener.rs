//! Snapshot listeners.
//!
//! The [`ListenerHub`] keeps two tables: document watchers keyed by exact
//! path, and query watchers each holding a frozen [`QuerySpec`]. Every
//! watcher owns a spawned Tokio task fed by an unbounded channel, so
//! callbacks never run inline with the write that caused them.
//!
//! On a current-thread runtime a callback never runs before the write that
//! triggered it has returned to its caller. A multi-thread runtime only
//! guarantees that the callback runs on a different task, so it may overlap
//! with the tail of that write's `.await`.
//!
//! A watcher is active from subscribe until [`ListenerRegistration::unsubscribe`]
//! is called. Unsubscribing clears the watcher's active flag before removing
//! it, so deliveries already queued on its channel are dropped.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use fauxstore_core::{QuerySpec, StoreError, StoreResult};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::query::engine;
use crate::snapshot::{DocumentSnapshot, QuerySnapshot};
use crate::storage::{PendingFlush, StoreState};

// ---------------------------------------------------------------------------
// Delivery task
// ---------------------------------------------------------------------------

enum Delivery<T> {
    Next(T),
    Error(StoreError),
}

type DeliverySender<T> = mpsc::UnboundedSender<Delivery<T>>;

/// Spawns the task that runs a watcher's callbacks.
fn spawn_delivery<T, N, E>(active: Arc<AtomicBool>, mut on_next: N, mut on_error: E) -> DeliverySender<T>
where
    T: Send + 'static,
    N: FnMut(T) + Send + 'static,
    E: FnMut(StoreError) + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<Delivery<T>>();
    tokio::spawn(async move {
        while let Some(delivery) = rx.recv().await {
            // Let the writer resume before its callback runs.
            tokio::task::yield_now().await;
            if !active.load(Ordering::Acquire) {
                break;
            }
            match delivery {
                Delivery::Next(value) => on_next(value),
                Delivery::Error(err) => on_error(err),
            }
        }
    });
    tx
}

struct DocumentWatcher {
    id: u64,
    active: Arc<AtomicBool>,
    tx: DeliverySender<DocumentSnapshot>,
}

struct QueryWatcher {
    spec: QuerySpec,
    active: Arc<AtomicBool>,
    tx: DeliverySender<QuerySnapshot>,
}

fn send<T>(tx: &DeliverySender<T>, active: &AtomicBool, delivery: Delivery<T>) -> bool {
    if !active.load(Ordering::Acquire) {
        return false;
    }
    if tx.send(delivery).is_err() {
        warn!("listener delivery task has stopped, dropping delivery");
        return false;
    }
    true
}

// ---------------------------------------------------------------------------
// ListenerHub
// ---------------------------------------------------------------------------

/// Registry of document and query watchers.
#[derive(Default)]
pub struct ListenerHub {
    next_id: AtomicU64,
    documents: DashMap<String, Vec<DocumentWatcher>>,
    queries: DashMap<u64, QueryWatcher>,
    deliveries: AtomicU64,
}

impl ListenerHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a document watcher and queues `initial` as its first delivery.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn watch_document<N, E>(
        self: &Arc<Self>,
        path: &str,
        initial: DocumentSnapshot,
        on_next: N,
        on_error: E,
    ) -> ListenerRegistration
    where
        N: FnMut(DocumentSnapshot) + Send + 'static,
        E: FnMut(StoreError) + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));
        let tx = spawn_delivery(active.clone(), on_next, on_error);
        if send(&tx, &active, Delivery::Next(initial)) {
            self.deliveries.fetch_add(1, Ordering::Relaxed);
        }
        self.documents
            .entry(path.to_string())
            .or_default()
            .push(DocumentWatcher {
                id,
                active: active.clone(),
                tx,
            });
        debug!(id, path, "document watcher added");
        ListenerRegistration {
            id,
            target: WatchTarget::Document(path.to_string()),
            active,
            hub: Arc::downgrade(self),
        }
    }

    /// Adds a query watcher and queues the result of `initial` as its first
    /// delivery.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn watch_query<N, E>(
        self: &Arc<Self>,
        spec: QuerySpec,
        initial: StoreResult<QuerySnapshot>,
        on_next: N,
        on_error: E,
    ) -> ListenerRegistration
    where
        N: FnMut(QuerySnapshot) + Send + 'static,
        E: FnMut(StoreError) + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));
        let tx = spawn_delivery(active.clone(), on_next, on_error);
        let delivery = match initial {
            Ok(snapshot) => Delivery::Next(snapshot),
            Err(err) => Delivery::Error(err),
        };
        if send(&tx, &active, delivery) {
            self.deliveries.fetch_add(1, Ordering::Relaxed);
        }
        self.queries.insert(
            id,
            QueryWatcher {
                spec,
                active: active.clone(),
                tx,
            },
        );
        debug!(id, "query watcher added");
        ListenerRegistration {
            id,
            target: WatchTarget::Query,
            active,
            hub: Arc::downgrade(self),
        }
    }

    /// Queues deliveries for a committed flush against the current state.
    ///
    /// Each dirtied path with watchers gets one snapshot; every query watcher
    /// is re-evaluated once if any document changed.
    pub fn notify(&self, flush: &PendingFlush, state: &StoreState) {
        let mut sent = 0u64;
        for path in &flush.dirty_paths {
            let Some(watchers) = self.documents.get(path) else {
                continue;
            };
            let snapshot = DocumentSnapshot::from_stored(path.as_str(), state.get(path));
            for watcher in watchers.iter() {
                if send(&watcher.tx, &watcher.active, Delivery::Next(snapshot.clone())) {
                    sent += 1;
                }
            }
        }

        if flush.queries_dirty {
            for entry in &self.queries {
                let watcher = entry.value();
                let delivery = match engine::evaluate(&watcher.spec, state) {
                    Ok(snapshot) => Delivery::Next(snapshot),
                    Err(err) => Delivery::Error(err),
                };
                if send(&watcher.tx, &watcher.active, delivery) {
                    sent += 1;
                }
            }
        }

        if sent > 0 {
            debug!(sent, "listener deliveries queued");
            self.deliveries.fetch_add(sent, Ordering::Relaxed);
        }
    }

    fn remove(&self, id: u64, target: &WatchTarget) {
        match target {
            WatchTarget::Document(path) => {
                let now_empty = self.documents.get_mut(path).is_some_and(|mut watchers| {
                    watchers.retain(|w| w.id != id);
                    watchers.is_empty()
                });
                if now_empty {
                    self.documents.remove_if(path, |_, watchers| watchers.is_empty());
                }
            }
            WatchTarget::Query => {
                self.queries.remove(&id);
            }
        }
    }

    /// Number of active document watchers.
    #[must_use]
    pub fn document_watcher_count(&self) -> usize {
        self.documents.iter().map(|entry| entry.value().len()).sum()
    }

    /// Number of active query watchers.
    #[must_use]
    pub fn query_watcher_count(&self) -> usize {
        self.queries.len()
    }

    /// Total deliveries queued since creation or the last reset.
    #[must_use]
    pub fn deliveries_queued(&self) -> u64 {
        self.deliveries.load(Ordering::Relaxed)
    }

    /// Zeroes the delivery counter. Watchers are left in place.
    pub fn reset_delivery_count(&self) {
        self.deliveries.store(0, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// ListenerRegistration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum WatchTarget {
    Document(String),
    Query,
}

/// Handle to a watcher.
///
/// Dropping the handle does not unsubscribe; only [`unsubscribe`] does.
///
/// [`unsubscribe`]: ListenerRegistration::unsubscribe
#[derive(Debug, Clone)]
pub struct ListenerRegistration {
    id: u64,
    target: WatchTarget,
    active: Arc<AtomicBool>,
    hub: Weak<ListenerHub>,
}

impl ListenerRegistration {
    /// Stops deliveries, including any already queued. Idempotent, and safe
    /// to call from inside the watcher's own callback.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(hub) = self.hub.upgrade() {
            hub.remove(self.id, &self.target);
        }
        debug!(id = self.id, "watcher unsubscribed");
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use fauxstore_core::{document_data_from_json, ManualClock, QueryScope};
    use serde_json::json;
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;

    fn collector<T: Send + 'static>() -> (impl FnMut(T) + Send + 'static, UnboundedReceiver<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = move |value: T| {
            let _ = tx.send(value);
        };
        (sink, rx)
    }

    fn flush_for(path: &str) -> PendingFlush {
        PendingFlush {
            events: Vec::new(),
            dirty_paths: vec![path.to_string()],
            queries_dirty: true,
        }
    }

    async fn next<T>(rx: &mut UnboundedReceiver<T>) -> Option<T> {
        tokio::time::timeout(Duration::from_millis(200), rx.recv())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test]
    async fn document_watcher_gets_initial_and_change_snapshots() {
        let hub = Arc::new(ListenerHub::new());
        let clock = ManualClock::new(0, 1);
        let mut state = StoreState::new();
        let (on_next, mut rx) = collector();

        hub.watch_document("c/a", DocumentSnapshot::missing("c/a"), on_next, |_| {});
        assert!(!next(&mut rx).await.expect("initial").exists());

        state.seed("c/a".to_string(), document_data_from_json(json!({"v": 1})).unwrap(), &clock);
        hub.notify(&flush_for("c/a"), &state);
        let snapshot = next(&mut rx).await.expect("change");
        assert_eq!(snapshot.get("v"), Some(&fauxstore_core::Value::Int(1)));

        hub.notify(&flush_for("c/other"), &state);
        assert!(next(&mut rx).await.is_none());
        assert_eq!(hub.deliveries_queued(), 2);

        hub.reset_delivery_count();
        assert_eq!(hub.deliveries_queued(), 0);
        assert_eq!(hub.document_watcher_count(), 1);
    }

    #[tokio::test]
    async fn query_watcher_reevaluates_and_reports_errors() {
        let hub = Arc::new(ListenerHub::new());
        let clock = ManualClock::new(0, 1);
        let mut state = StoreState::new();
        let (on_next, mut rx) = collector();
        let (on_error, mut errors) = collector();

        let spec = QuerySpec::new(QueryScope::Collection("c".to_string()));
        let initial = engine::evaluate(&spec, &state);
        hub.watch_query(spec, initial, on_next, |_| {});
        assert_eq!(next(&mut rx).await.expect("initial").size(), 0);

        state.seed("c/a".to_string(), document_data_from_json(json!({})).unwrap(), &clock);
        hub.notify(&flush_for("c/a"), &state);
        assert_eq!(next(&mut rx).await.expect("re-evaluated").size(), 1);

        let bad = QuerySpec::new(QueryScope::Collection("c/a".to_string()));
        let initial = engine::evaluate(&bad, &state);
        let (ignored, _unused) = collector::<QuerySnapshot>();
        hub.watch_query(bad, initial, ignored, on_error);
        assert!(matches!(
            next(&mut errors).await,
            Some(StoreError::InvalidArgument(_))
        ));
        assert_eq!(hub.query_watcher_count(), 2);
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent_and_drops_queued_deliveries() {
        let hub = Arc::new(ListenerHub::new());
        let state = StoreState::new();
        let (on_next, mut rx) = collector();

        let registration =
            hub.watch_document("c/a", DocumentSnapshot::missing("c/a"), on_next, |_| {});
        hub.notify(&flush_for("c/a"), &state);
        registration.unsubscribe();
        registration.unsubscribe();

        assert!(!registration.is_active());
        assert_eq!(hub.document_watcher_count(), 0);
        assert!(next(&mut rx).await.is_none());
    }

    #[tokio::test]
    async fn unsubscribe_from_inside_callback() {
        let hub = Arc::new(ListenerHub::new());
        let state = StoreState::new();
        let slot: Arc<parking_lot::Mutex<Option<ListenerRegistration>>> = Arc::default();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let inner = slot.clone();
        let registration = hub.watch_document(
            "c/a",
            DocumentSnapshot::missing("c/a"),
            move |snapshot: DocumentSnapshot| {
                let _ = tx.send(snapshot.path().to_string());
                if let Some(reg) = inner.lock().as_ref() {
                    reg.unsubscribe();
                }
            },
            |_| {},
        );
        *slot.lock() = Some(registration);

        assert_eq!(next(&mut rx).await.as_deref(), Some("c/a"));
        hub.notify(&flush_for("c/a"), &state);
        assert!(next(&mut rx).await.is_none());
        assert_eq!(hub.document_watcher_count(), 0);
    }
}

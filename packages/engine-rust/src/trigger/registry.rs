//! Trigger registration and dispatch.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use fauxstore_core::{StoreError, StoreResult};
use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use tracing::debug;

use super::pattern::PathPattern;
use crate::snapshot::DocumentSnapshot;
use crate::storage::ChangeRecord;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Kind of change delivered to a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeType {
    Create,
    Update,
    Delete,
}

impl ChangeType {
    /// Classifies a write by whether the document existed before and after.
    /// Returns `None` when it existed at neither point.
    #[must_use]
    pub fn classify(existed_before: bool, exists_after: bool) -> Option<Self> {
        match (existed_before, exists_after) {
            (false, true) => Some(ChangeType::Create),
            (true, false) => Some(ChangeType::Delete),
            (true, true) => Some(ChangeType::Update),
            (false, false) => None,
        }
    }
}

/// What a trigger handler receives.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    /// Full path of the changed document.
    pub path: String,
    /// Values captured by the pattern's `{name}` segments.
    pub params: BTreeMap<String, String>,
    /// State before the write (missing for a create).
    pub before: DocumentSnapshot,
    /// State after the write (missing for a delete).
    pub after: DocumentSnapshot,
    pub change_type: ChangeType,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Boxed future returned by trigger handlers.
pub type TriggerFuture = BoxFuture<'static, anyhow::Result<()>>;

/// Type-erased trigger handler.
pub type TriggerFn = Arc<dyn Fn(ChangeEvent) -> TriggerFuture + Send + Sync>;

/// Per-change-type handlers for one registration.
///
/// ```
/// use fauxstore_engine::TriggerHandlers;
///
/// let handlers = TriggerHandlers::new()
///     .on_create(|event| async move {
///         println!("created {}", event.path);
///         Ok(())
///     });
/// ```
#[derive(Clone, Default)]
pub struct TriggerHandlers {
    on_create: Option<TriggerFn>,
    on_update: Option<TriggerFn>,
    on_delete: Option<TriggerFn>,
}

fn erase<F, Fut>(handler: F) -> TriggerFn
where
    F: Fn(ChangeEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |event| -> TriggerFuture { Box::pin(handler(event)) })
}

impl TriggerHandlers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_create<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(ChangeEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_create = Some(erase(handler));
        self
    }

    #[must_use]
    pub fn on_update<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(ChangeEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_update = Some(erase(handler));
        self
    }

    #[must_use]
    pub fn on_delete<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(ChangeEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_delete = Some(erase(handler));
        self
    }

    fn handler_for(&self, change_type: ChangeType) -> Option<&TriggerFn> {
        match change_type {
            ChangeType::Create => self.on_create.as_ref(),
            ChangeType::Update => self.on_update.as_ref(),
            ChangeType::Delete => self.on_delete.as_ref(),
        }
    }
}

impl fmt::Debug for TriggerHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerHandlers")
            .field("on_create", &self.on_create.is_some())
            .field("on_update", &self.on_update.is_some())
            .field("on_delete", &self.on_delete.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Registration {
    id: u64,
    pattern: PathPattern,
    handlers: TriggerHandlers,
}

/// Ordered list of trigger registrations.
///
/// Registration order is dispatch order. The list is snapshotted before any
/// handler runs, so handlers may register or unregister triggers freely.
#[derive(Debug, Default)]
pub struct TriggerRegistry {
    registrations: RwLock<Vec<Arc<Registration>>>,
    next_id: AtomicU64,
}

impl TriggerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles `pattern` and appends a registration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidPattern`] if the pattern is malformed.
    pub fn register(
        self: &Arc<Self>,
        pattern: &str,
        handlers: TriggerHandlers,
    ) -> StoreResult<TriggerHandle> {
        let pattern = PathPattern::parse(pattern)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(id, pattern = pattern.as_str(), "trigger registered");
        self.registrations.write().push(Arc::new(Registration {
            id,
            pattern: pattern.clone(),
            handlers,
        }));
        Ok(TriggerHandle {
            id,
            pattern: pattern.as_str().to_string(),
            registry: Arc::downgrade(self),
        })
    }

    /// Removes the registration with `id`. Returns whether it was present.
    pub fn unregister(&self, id: u64) -> bool {
        let mut registrations = self.registrations.write();
        let before = registrations.len();
        registrations.retain(|r| r.id != id);
        registrations.len() != before
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.registrations.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registrations.read().is_empty()
    }

    /// Dispatches one change to every matching registration, in
    /// registration order, awaiting each selected handler in turn.
    ///
    /// Returns how many handlers ran.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Handler`] with the first handler error; later
    /// registrations are not invoked.
    pub async fn dispatch(&self, change: &ChangeRecord) -> StoreResult<usize> {
        let Some(change_type) = ChangeType::classify(change.before.is_some(), change.after.is_some())
        else {
            return Ok(0);
        };
        let snapshot: Vec<Arc<Registration>> = self.registrations.read().clone();

        let mut invoked = 0;
        for registration in snapshot {
            let Some(handler) = registration.handlers.handler_for(change_type) else {
                continue;
            };
            let Some(params) = registration.pattern.match_path(&change.path) else {
                continue;
            };
            let event = ChangeEvent {
                path: change.path.clone(),
                params,
                before: DocumentSnapshot::from_stored(&change.path, change.before.as_ref()),
                after: DocumentSnapshot::from_stored(&change.path, change.after.as_ref()),
                change_type,
            };
            debug!(
                id = registration.id,
                path = %change.path,
                change = ?change_type,
                "dispatching trigger"
            );
            handler(event).await.map_err(StoreError::Handler)?;
            invoked += 1;
        }
        Ok(invoked)
    }
}

/// Handle returned by trigger registration.
#[derive(Debug, Clone)]
pub struct TriggerHandle {
    id: u64,
    pattern: String,
    registry: Weak<TriggerRegistry>,
}

impl TriggerHandle {
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Removes the registration. Calling this more than once, or after the
    /// store is gone, does nothing.
    pub fn unregister(&self) {
        if let Some(registry) = self.registry.upgrade() {
            if registry.unregister(self.id) {
                debug!(id = self.id, "trigger unregistered");
            }
        }
    }
}

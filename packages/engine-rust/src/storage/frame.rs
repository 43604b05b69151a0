//! Atomic frames.
//!
//! Every mutation runs inside an [`AtomicFrame`]. A frame buffers the change
//! records that triggers will see, the document paths whose watchers need a
//! delivery, whether query watchers need re-evaluation, and an undo log of
//! the prior state of every touched path.
//!
//! Frames nest. Committing an inner frame folds it into its parent; only
//! committing the outermost frame yields a [`PendingFlush`] for the store to
//! dispatch. Aborting any frame hands back its undo log so the caller can
//! restore the document map.

use super::document::StoredDocument;

/// Before/after states of one document write.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    pub path: String,
    pub before: Option<StoredDocument>,
    pub after: Option<StoredDocument>,
}

/// Prior state of a path, restored on abort.
pub type UndoEntry = (String, Option<StoredDocument>);

/// Buffered effects of an in-progress atomic section.
#[derive(Debug, Default)]
pub struct AtomicFrame {
    events: Vec<ChangeRecord>,
    dirty_paths: Vec<String>,
    queries_dirty: bool,
    undo: Vec<UndoEntry>,
}

impl AtomicFrame {
    /// Records a committed-to-memory change along with how to undo it.
    pub fn record(&mut self, change: ChangeRecord) {
        self.undo.push((change.path.clone(), change.before.clone()));
        self.mark_dirty(&change.path);
        self.events.push(change);
    }

    fn mark_dirty(&mut self, path: &str) {
        if !self.dirty_paths.iter().any(|p| p == path) {
            self.dirty_paths.push(path.to_string());
        }
        self.queries_dirty = true;
    }

    /// Folds a committed child frame into this one.
    fn absorb(&mut self, child: AtomicFrame) {
        for path in &child.dirty_paths {
            self.mark_dirty(path);
        }
        self.queries_dirty |= child.queries_dirty;
        self.events.extend(child.events);
        self.undo.extend(child.undo);
    }

    /// Number of buffered change records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no change has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Effects of a committed outermost frame, ready for dispatch.
#[derive(Debug, Default)]
pub struct PendingFlush {
    /// Change records in write order, for trigger dispatch.
    pub events: Vec<ChangeRecord>,
    /// Distinct dirtied document paths in first-touch order.
    pub dirty_paths: Vec<String>,
    /// Whether any query watcher needs re-evaluation.
    pub queries_dirty: bool,
}

impl PendingFlush {
    /// Whether there is nothing to dispatch.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.dirty_paths.is_empty() && !self.queries_dirty
    }
}

/// Strictly nested stack of open frames.
#[derive(Debug, Default)]
pub struct FrameStack {
    frames: Vec<AtomicFrame>,
}

impl FrameStack {
    /// Creates a stack with no open frames.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new innermost frame.
    pub fn push(&mut self) {
        self.frames.push(AtomicFrame::default());
    }

    /// Number of open frames.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Whether no frame is open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The innermost open frame.
    pub fn current_mut(&mut self) -> Option<&mut AtomicFrame> {
        self.frames.last_mut()
    }

    /// Commits the innermost frame.
    ///
    /// Returns the flush for an outermost frame, `None` when the frame was
    /// merged into its parent or no frame was open.
    pub fn pop_commit(&mut self) -> Option<PendingFlush> {
        let frame = self.frames.pop()?;
        match self.frames.last_mut() {
            Some(parent) => {
                parent.absorb(frame);
                None
            }
            None => Some(PendingFlush {
                events: frame.events,
                dirty_paths: frame.dirty_paths,
                queries_dirty: frame.queries_dirty,
            }),
        }
    }

    /// Discards the innermost frame, returning its undo log in the order the
    /// entries must be replayed (most recent first).
    pub fn pop_abort(&mut self) -> Vec<UndoEntry> {
        let Some(frame) = self.frames.pop() else {
            return Vec::new();
        };
        let mut undo = frame.undo;
        undo.reverse();
        undo
    }
}

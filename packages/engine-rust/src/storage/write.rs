//! Write operations queued by direct writes, batches and transactions.

use fauxstore_core::WriteData;

/// How `set` combines incoming data with an existing document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SetOptions {
    /// Replace the whole document.
    #[default]
    Overwrite,
    /// Deep-merge nested maps; arrays and scalars replace.
    Merge,
    /// Take only these dotted field paths from the incoming data.
    MergeFields(Vec<String>),
}

impl SetOptions {
    /// `merge_fields` over any list of field paths.
    pub fn merge_fields<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        SetOptions::MergeFields(fields.into_iter().map(Into::into).collect())
    }
}

/// A single document write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Set {
        path: String,
        data: WriteData,
        options: SetOptions,
    },
    /// Like an overwriting set, but fails if the document exists.
    Create { path: String, data: WriteData },
    /// Dotted-path update of an existing document.
    Update { path: String, data: WriteData },
    Delete { path: String },
}

impl WriteOp {
    /// Document path this write targets.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            WriteOp::Set { path, .. }
            | WriteOp::Create { path, .. }
            | WriteOp::Update { path, .. }
            | WriteOp::Delete { path } => path,
        }
    }

    /// Short name used in log output.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            WriteOp::Set { .. } => "set",
            WriteOp::Create { .. } => "create",
            WriteOp::Update { .. } => "update",
            WriteOp::Delete { .. } => "delete",
        }
    }
}

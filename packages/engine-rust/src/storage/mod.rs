//! In-memory document storage for the store.
//!
//! - [`document`]: the stored record and its metadata
//! - [`merge`]: sentinel resolution and deep merge ([`FieldValueProcessor`])
//! - [`write`]: the queued write operations shared by direct writes,
//!   batches and transactions
//! - [`frame`]: atomic frames and the frame stack
//! - [`state`]: the path-to-document map plus the frame stack, the only
//!   shared mutable state in a store

pub mod document;
pub mod frame;
pub mod merge;
pub mod state;
pub mod write;

pub use document::{DocumentMetadata, StoredDocument};
pub use frame::{AtomicFrame, ChangeRecord, FrameStack, PendingFlush};
pub use merge::FieldValueProcessor;
pub use state::StoreState;
pub use write::{SetOptions, WriteOp};

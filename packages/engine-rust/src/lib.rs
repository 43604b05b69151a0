//! fauxstore engine: an in-memory, path-addressed document store with
//! queries, optimistic transactions, write batches, change triggers and
//! snapshot listeners.
//!
//! ```no_run
//! use fauxstore_engine::{DocumentStore, FieldValue};
//! use serde_json::json;
//!
//! # async fn demo() -> fauxstore_engine::StoreResult<()> {
//! let store = DocumentStore::new();
//! let user = store.collection("users").doc("42");
//! user.set(json!({"name": "ada", "visits": 0})).await?;
//! user.update(FieldValue::map([("visits", FieldValue::increment(1))])).await?;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod listener;
pub mod query;
pub mod reference;
pub mod snapshot;
pub mod storage;
pub mod store;
pub mod transaction;
pub mod trigger;

pub use batch::WriteBatch;
pub use config::StoreConfig;
pub use listener::{ListenerHub, ListenerRegistration};
pub use query::Query;
pub use reference::{CollectionReference, DocumentReference};
pub use snapshot::{DocumentSnapshot, QuerySnapshot};
pub use storage::SetOptions;
pub use store::{DocumentStore, StoreStats};
pub use transaction::{ReadRequest, ReadResult, Transaction};
pub use trigger::{ChangeEvent, ChangeType, TriggerHandle, TriggerHandlers};

pub use fauxstore_core::{
    ClockSource, Cursor, Direction, DocumentData, FieldValue, FilterOp, ManualClock, StoreError,
    StoreResult, SystemClock, Timestamp, Value,
};

//! fauxstore core: document values, resource paths, field-value sentinels,
//! value ordering and query configuration types.

pub mod clock;
pub mod error;
pub mod field_value;
pub mod ordering;
pub mod path;
pub mod query;
pub mod types;

pub use clock::{ClockSource, ManualClock, SystemClock, Timestamp};
pub use error::{StoreError, StoreResult};
pub use field_value::{FieldValue, WriteData};
pub use query::{Cursor, Direction, Filter, FilterOp, OrderBy, QueryScope, QuerySpec};
pub use types::{data_identical, document_data_from_json, DocumentData, Number, Value};

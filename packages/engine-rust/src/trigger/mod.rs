//! Change triggers keyed by wildcard path patterns.

pub mod pattern;
pub mod registry;

pub use pattern::PathPattern;
pub use registry::{
    ChangeEvent, ChangeType, TriggerFn, TriggerFuture, TriggerHandle, TriggerHandlers,
    TriggerRegistry,
};

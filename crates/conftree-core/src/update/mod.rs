//! Update batch protocol: wire types, validation and in-process apply

pub mod address;
pub mod apply;
pub mod batch;
pub mod validate;

pub use address::EventAddress;
pub use apply::{apply_batch, apply_event, ApplyOutcome, DEFAULT_OWNER};
pub use batch::{EventType, EventValue, UpdateBatch, UpdateEvent, UpdateHeader};
pub use validate::{validate_batch, ValidatedBatch};

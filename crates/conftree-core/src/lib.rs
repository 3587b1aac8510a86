//! conftree core - hierarchical, versioned configuration trees
//!
//! This crate provides:
//! - The node model (`ConfigTree` arena, `NodeKind`, lifecycle and versions)
//! - The dot-path query language with wildcards and `#`/`@`/`$` markers
//! - Scoped property resolution (closest scope wins)
//! - The `Configuration` aggregate and `TreeBuilder` for parsers
//! - Update batch validation and in-process application
//! - The error and logging facilities shared by the other conftree crates

pub mod errors;
pub mod logging_facility;
pub mod model;
pub mod path;
pub mod properties;
pub mod update;

// Re-export commonly used types
pub use errors::{ConfigError, ExError, ExErrorKind, Result};
pub use model::{
    ConfigNode, ConfigTree, Configuration, ConfigurationHeader, KeyValueKind, KeyValues,
    ListKind, ModifiedBy, NodeAliases, NodeId, NodeKind, NodeState, SyncMode, TreeBuilder,
    Version,
};
pub use path::{ConfigPath, SearchResult, SearchResultNode, SyntheticValue};
pub use properties::resolved_properties;
pub use update::{
    apply_batch, validate_batch, ApplyOutcome, EventType, EventValue, UpdateBatch, UpdateEvent,
    UpdateHeader,
};

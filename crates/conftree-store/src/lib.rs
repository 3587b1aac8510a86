//! conftree store - persistence for configuration trees
//!
//! Provides:
//! - SQLite schema with an embedded migrations framework
//! - The `NodeStore` compare-and-swap seam, with SQLite and in-memory backends
//! - Publishing a configuration and hydrating it back into a tree
//! - Applying update batches directly against stored rows

pub mod apply;
pub mod db;
pub mod errors;
pub mod hydration;
pub mod memory;
pub mod migrations;
pub mod node_store;
pub mod path;
pub mod publish;
pub mod sqlite;

// Re-export key types
pub use apply::{apply_batch, ApplyOptions, DeletePolicy, StoreApplyOutcome};
pub use errors::Result;
pub use hydration::load_configuration;
pub use memory::MemoryNodeStore;
pub use node_store::{transactional, NodeStore, StoredKind, StoredNode};
pub use path::StorePath;
pub use publish::{publish, StoredHeader};
pub use sqlite::SqliteNodeStore;

pub mod builder;
pub mod configuration;
pub mod key_values;
pub mod node;
pub mod tree;
pub mod version;

pub use builder::TreeBuilder;
pub use configuration::{Configuration, ConfigurationHeader, ModifiedBy, SyncMode};
pub use key_values::KeyValues;
pub use node::{
    validate_name, ConfigNode, KeyValueKind, ListKind, NodeId, NodeKind, NodeState, PathChildren,
};
pub use tree::{ConfigTree, NodeAliases};
pub use version::Version;

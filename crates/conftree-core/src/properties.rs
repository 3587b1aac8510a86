//! Scoped property resolution
//!
//! A node sees the properties declared on its nearest enclosing path node and
//! on every path node above it. When two scopes declare the same key the
//! closest one wins.

use crate::model::{ConfigTree, KeyValueKind, KeyValues, NodeId};

/// Merge properties from `node`'s scope up to the root
///
/// Returns a fresh map; the tree is never modified, so repeated calls give
/// identical results.
pub fn resolved_properties(tree: &ConfigTree, node: NodeId) -> KeyValues {
    let mut resolved = KeyValues::new();
    let mut scope = tree.enclosing_path_node(node);

    while let Some(current) = scope {
        if let Some(entries) = tree
            .reserved(current, KeyValueKind::Properties)
            .and_then(|id| tree.node(id))
            .and_then(|n| n.entries())
        {
            for (key, value) in entries.iter() {
                resolved.insert_if_absent(key, value);
            }
        }
        scope = tree
            .node(current)
            .and_then(|n| n.parent())
            .and_then(|parent| tree.enclosing_path_node(parent));
    }

    resolved
}

/// Single scoped property lookup
pub fn resolved_property(tree: &ConfigTree, node: NodeId, key: &str) -> Option<String> {
    resolved_properties(tree, node).get(key).map(str::to_string)
}

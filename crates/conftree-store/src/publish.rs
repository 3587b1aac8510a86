//! Persist a whole configuration tree
//!
//! The root path node becomes the header row; every other node becomes one
//! row below it. Values lists are stored inline, one row per list.

#![allow(clippy::result_large_err)]

use conftree_core::errors::ConfigError;
use conftree_core::{
    ConfigTree, Configuration, ConfigurationHeader, KeyValues, ListKind, NodeId, NodeKind,
    NodeState,
};
use serde::{Deserialize, Serialize};

use crate::errors::{corrupt_payload, domain, Result};
use crate::node_store::{transactional, NodeStore, StoredKind, StoredNode};
use crate::path::StorePath;

/// Payload of a header row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredHeader {
    /// Name of the root path node
    pub root: String,
    pub configuration: ConfigurationHeader,
}

impl StoredHeader {
    /// # Errors
    ///
    /// `Serialization` if the row does not hold a header document.
    pub fn decode(node: &StoredNode) -> Result<Self> {
        serde_json::from_value(node.value.clone()).map_err(|e| corrupt_payload(&node.key, e))
    }

    /// # Errors
    ///
    /// `Serialization` if encoding fails.
    pub fn encode(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| domain("encode_header", e.into()))
    }
}

/// Write `config` into `store` under its `StorePath`
///
/// Runs in one store transaction. Returns the number of rows written.
///
/// # Errors
///
/// `Configuration` if the configuration is incomplete, `AlreadyExists` if
/// the configuration's major line is already published, and any store
/// failure.
pub fn publish<S: NodeStore + ?Sized>(store: &mut S, config: &Configuration) -> Result<usize> {
    config.validate().map_err(|e| domain("publish", e))?;
    let root = config
        .root()
        .ok_or_else(|| domain("publish", ConfigError::missing_field("root")))?;
    let path = StorePath::for_configuration(config)?;
    let version = config
        .version
        .ok_or_else(|| domain("publish", ConfigError::missing_field("version")))?
        .to_string();
    let tree = config.tree();

    let header = StoredHeader {
        root: tree.get(root).map_err(|e| domain("publish", e))?.name().to_string(),
        configuration: config.header(),
    };
    let mut header_row = StoredNode::new(
        path.header_key(),
        StoredKind::Header,
        header.encode()?,
        version.clone(),
    );
    header_row.owner = config.updated_by.as_ref().map(|m| m.user.clone());
    header_row.description = Some(config.description.clone());

    let rows = rows_below(tree, root, &path, &version)?;
    let count = rows.len() + 1;

    transactional(store, |store| {
        store.create(header_row)?;
        for row in rows {
            store.create(row)?;
        }
        Ok(())
    })?;

    tracing::debug!(key = path.header_key(), rows = count, "configuration published");
    Ok(count)
}

/// Rows for every live node below `root`, parents before children
fn rows_below(
    tree: &ConfigTree,
    root: NodeId,
    path: &StorePath,
    version: &str,
) -> Result<Vec<StoredNode>> {
    let mut rows = Vec::new();
    let mut stack: Vec<(NodeId, Vec<String>)> = vec![(root, Vec::new())];

    while let Some((id, names)) = stack.pop() {
        let owned = owned_children(tree, id);
        for (seq, child) in owned.into_iter().enumerate() {
            let node = tree.get(child).map_err(|e| domain("publish", e))?;
            if node.state() == NodeState::Deleted {
                continue;
            }
            let mut child_names = names.clone();
            child_names.push(node.name().to_string());

            let (kind, value, descend) = match node.kind() {
                NodeKind::Path(_) => (StoredKind::Path, serde_json::Value::Null, true),
                NodeKind::Value(v) => (StoredKind::Value, serde_json::Value::from(v.as_str()), false),
                NodeKind::List {
                    kind: ListKind::Values,
                    ..
                } => (
                    StoredKind::Values,
                    serde_json::Value::from(tree.list_values(child)),
                    false,
                ),
                NodeKind::List {
                    kind: ListKind::Elements,
                    ..
                } => (StoredKind::Elements, serde_json::Value::Null, true),
                NodeKind::KeyValue { kind, entries } => {
                    (StoredKind::KeyValue(*kind), entries_value(entries)?, false)
                }
            };

            let mut row = StoredNode::new(path.node_key(&child_names), kind, value, version);
            row.description = node.description().map(str::to_string);
            row.updated_at = node.updated_at();
            row.seq = i64::try_from(seq).unwrap_or(i64::MAX);
            rows.push(row);

            if descend {
                stack.push((child, child_names));
            }
        }
    }
    Ok(rows)
}

/// Named children (or list items) followed by reserved children
fn owned_children(tree: &ConfigTree, id: NodeId) -> Vec<NodeId> {
    let mut owned = tree.children(id);
    owned.extend(
        conftree_core::KeyValueKind::ALL
            .into_iter()
            .filter_map(|kind| tree.reserved(id, kind)),
    );
    owned
}

pub(crate) fn entries_value(entries: &KeyValues) -> Result<serde_json::Value> {
    serde_json::to_value(entries).map_err(|e| domain("encode_entries", e.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryNodeStore;
    use conftree_core::{ModifiedBy, TreeBuilder, Version};

    fn config() -> Configuration {
        let mut b = TreeBuilder::new("cfg").unwrap();
        let root = b.root();
        let db = b.path(root, "db").unwrap();
        b.value(db, "host", "h1").unwrap();
        b.values(db, "ports", ["1", "2"]).unwrap();
        b.property(db, "timeout", "30").unwrap();
        let header = ConfigurationHeader {
            id: "1".to_string(),
            application_group: "G".to_string(),
            application: "A".to_string(),
            name: "cfg".to_string(),
            description: "d".to_string(),
            version: Some(Version::new(1, 0)),
            created_by: Some(ModifiedBy::now("u")),
            updated_by: Some(ModifiedBy::now("u")),
            ..Default::default()
        };
        let mut config = b.header(header).build();
        config.loaded().unwrap();
        config
    }

    #[test]
    fn test_publish_writes_one_row_per_node() {
        let mut store = MemoryNodeStore::new();
        let rows = publish(&mut store, &config()).unwrap();

        // header, db, host, ports, db/properties
        assert_eq!(rows, 5);
        let host = store.read("G/A/cfg/1/db/host").unwrap().unwrap();
        assert_eq!(host.scalar(), Some("h1"));
        assert_eq!(host.version, "1.0");

        let ports = store.read("G/A/cfg/1/db/ports").unwrap().unwrap();
        assert_eq!(ports.value, serde_json::json!(["1", "2"]));

        let props = store.read("G/A/cfg/1/db/properties").unwrap().unwrap();
        assert_eq!(props.value, serde_json::json!({"timeout": "30"}));

        let header = StoredHeader::decode(&store.read("G/A/cfg/1").unwrap().unwrap()).unwrap();
        assert_eq!(header.root, "cfg");
        assert_eq!(header.configuration.version, Some(Version::new(1, 0)));
    }

    #[test]
    fn test_publish_twice_is_rejected_and_rolled_back() {
        let mut store = MemoryNodeStore::new();
        publish(&mut store, &config()).unwrap();
        let before = store.len();

        let err = publish(&mut store, &config()).unwrap_err();
        assert_eq!(err.kind(), conftree_core::ExErrorKind::AlreadyExists);
        assert_eq!(store.len(), before);
    }
}

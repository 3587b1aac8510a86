//! Rebuild a `Configuration` from stored rows

#![allow(clippy::result_large_err)]

use conftree_core::errors::ConfigError;
use conftree_core::{Configuration, KeyValues, NodeAliases, NodeId, TreeBuilder};

use crate::errors::{corrupt_payload, domain, not_found, Result};
use crate::node_store::{NodeStore, StoredKind, StoredNode};
use crate::path::StorePath;
use crate::publish::StoredHeader;

const OP: &str = "load_configuration";

/// Load the configuration stored under `path`
///
/// Tombstoned rows are skipped. The result is fully loaded (`Synced`).
///
/// # Errors
///
/// `NotFound` if no live header row exists, `Serialization` for unreadable
/// payloads, and any structural error raised while rebuilding the tree.
pub fn load_configuration<S: NodeStore + ?Sized>(
    store: &S,
    path: &StorePath,
    aliases: NodeAliases,
) -> Result<Configuration> {
    let header_row = store
        .read(path.header_key())?
        .filter(StoredNode::is_live)
        .ok_or_else(|| not_found(OP, path.header_key()))?;
    if header_row.kind != StoredKind::Header {
        return Err(domain(OP, unexpected(&header_row, "header")));
    }
    let stored = StoredHeader::decode(&header_row)?;

    let mut builder =
        TreeBuilder::with_aliases(&stored.root, aliases).map_err(|e| domain(OP, e))?;
    let mut pending: Vec<(String, NodeId, bool)> =
        vec![(path.header_key().to_string(), builder.root(), false)];
    let mut loaded = 0usize;

    while let Some((key, parent, in_elements)) = pending.pop() {
        for row in store.children(&key)? {
            if let Some(id) = attach(&mut builder, parent, in_elements, &row)? {
                if let Some(description) = &row.description {
                    builder
                        .describe(id, description.clone())
                        .map_err(|e| domain(OP, e))?;
                }
                if row.kind.is_container() {
                    pending.push((row.key.clone(), id, row.kind == StoredKind::Elements));
                }
            }
            loaded += 1;
        }
    }

    let mut config = builder.header(stored.configuration).build();
    config.loaded().map_err(|e| domain(OP, e))?;
    tracing::debug!(key = path.header_key(), rows = loaded, "configuration hydrated");
    Ok(config)
}

/// Add one row below `parent`; key-value rows merge into the parent and
/// return `None`
fn attach(
    builder: &mut TreeBuilder,
    parent: NodeId,
    in_elements: bool,
    row: &StoredNode,
) -> Result<Option<NodeId>> {
    let lift = |e: ConfigError| domain(OP, e).with_node_path(&row.key);
    let id = match row.kind {
        StoredKind::Path if in_elements => builder.element(parent, &row.name).map_err(lift)?,
        StoredKind::Path => builder.path(parent, &row.name).map_err(lift)?,
        StoredKind::Elements => builder.elements(parent, &row.name).map_err(lift)?,
        StoredKind::Value => {
            let value = row
                .scalar()
                .ok_or_else(|| lift(unexpected(row, "scalar payload")))?;
            builder.value(parent, &row.name, value).map_err(lift)?
        }
        StoredKind::Values => {
            let values: Vec<String> = serde_json::from_value(row.value.clone())
                .map_err(|e| corrupt_payload(&row.key, e))?;
            builder.values(parent, &row.name, values).map_err(lift)?
        }
        StoredKind::KeyValue(kind) => {
            let entries: KeyValues = serde_json::from_value(row.value.clone())
                .map_err(|e| corrupt_payload(&row.key, e))?;
            let tree = builder.tree_mut();
            let kv = tree.ensure_reserved(parent, kind).map_err(lift)?;
            for (key, value) in entries.iter() {
                tree.add_key_value(kv, key, value).map_err(lift)?;
            }
            return Ok(None);
        }
        StoredKind::Header => return Err(lift(unexpected(row, "node row"))),
    };
    Ok(Some(id))
}

fn unexpected(row: &StoredNode, expected: &str) -> ConfigError {
    ConfigError::InvalidNodeKind {
        path: row.key.clone(),
        expected: expected.to_string(),
        actual: row.kind.as_str().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryNodeStore;
    use crate::publish::publish;
    use conftree_core::{ConfigurationHeader, ExErrorKind, ModifiedBy, NodeState, Version};

    fn published() -> MemoryNodeStore {
        let mut b = TreeBuilder::new("cfg").unwrap();
        let root = b.root();
        let db = b.path(root, "db").unwrap();
        b.value(db, "host", "h1").unwrap();
        b.describe(db, "database").unwrap();
        b.parameter(db, "pool", "4").unwrap();
        let servers = b.elements(root, "servers").unwrap();
        let a = b.element(servers, "a").unwrap();
        b.value(a, "port", "80").unwrap();
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
        let mut store = MemoryNodeStore::new();
        publish(&mut store, &config).unwrap();
        store
    }

    #[test]
    fn test_load_restores_tree_and_header() {
        let store = published();
        let path = StorePath::new("G", "A", "cfg", 1).unwrap();

        let config = load_configuration(&store, &path, NodeAliases::default()).unwrap();

        assert_eq!(config.state(), NodeState::Synced);
        assert_eq!(config.version, Some(Version::new(1, 0)));
        assert_eq!(config.find_value("cfg.db.host").unwrap().as_deref(), Some("h1"));
        assert_eq!(config.find_value("cfg.db#pool").unwrap().as_deref(), Some("4"));
        assert_eq!(
            config.find_value("cfg.servers.a.port").unwrap().as_deref(),
            Some("80")
        );
        let db = config.find("cfg.db").unwrap().unwrap().as_node().unwrap();
        assert_eq!(config.tree().get(db).unwrap().description(), Some("database"));
    }

    #[test]
    fn test_load_missing_configuration() {
        let store = MemoryNodeStore::new();
        let path = StorePath::new("G", "A", "cfg", 1).unwrap();
        let err = load_configuration(&store, &path, NodeAliases::default()).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::NotFound);
    }
}

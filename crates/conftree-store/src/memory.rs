//! In-memory node store
//!
//! Same contract as the SQLite store; used in tests and for embedding the
//! apply protocol without a database.

#![allow(clippy::result_large_err)]

use chrono::Utc;
use conftree_core::errors::ConfigError;
use std::collections::BTreeMap;

use crate::errors::{domain, Result};
use crate::node_store::{cas_failure, NodeStore, StoredNode};
use crate::path::is_within;

#[derive(Debug, Default, Clone)]
pub struct MemoryNodeStore {
    nodes: BTreeMap<String, StoredNode>,
    snapshot: Option<BTreeMap<String, StoredNode>>,
}

impl MemoryNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn check(&self, op: &str, key: &str, expected_version: &str) -> Result<()> {
        match self.nodes.get(key) {
            Some(node) if node.is_live() && node.version == expected_version => Ok(()),
            other => Err(cas_failure(op, key, expected_version, other)),
        }
    }

    fn subtree_keys(&self, key: &str) -> Vec<String> {
        self.nodes
            .range(key.to_string()..)
            .map(|(k, _)| k)
            .take_while(|k| k.starts_with(key))
            .filter(|k| is_within(k, key))
            .cloned()
            .collect()
    }
}

impl NodeStore for MemoryNodeStore {
    fn read(&self, key: &str) -> Result<Option<StoredNode>> {
        Ok(self.nodes.get(key).cloned())
    }

    fn create(&mut self, node: StoredNode) -> Result<()> {
        if self.nodes.get(&node.key).is_some_and(StoredNode::is_live) {
            return Err(domain(
                "store_create",
                ConfigError::AlreadyExists { path: node.key },
            ));
        }
        let mut node = node;
        node.deleted = false;
        self.nodes.insert(node.key.clone(), node);
        Ok(())
    }

    fn compare_and_set(&mut self, expected_version: &str, node: StoredNode) -> Result<()> {
        self.check("store_compare_and_set", &node.key, expected_version)?;
        if let Some(stored) = self.nodes.get_mut(&node.key) {
            stored.value = node.value;
            stored.version = node.version;
            stored.transaction_id = node.transaction_id;
            stored.owner = node.owner;
            stored.description = node.description;
            stored.updated_at = node.updated_at;
        }
        Ok(())
    }

    fn tombstone(
        &mut self,
        key: &str,
        expected_version: &str,
        version: &str,
        transaction_id: Option<&str>,
    ) -> Result<usize> {
        self.check("store_tombstone", key, expected_version)?;
        let now = Utc::now();
        let mut changed = 0;
        for k in self.subtree_keys(key) {
            if let Some(node) = self.nodes.get_mut(&k).filter(|n| n.is_live()) {
                node.deleted = true;
                node.version = version.to_string();
                node.transaction_id = transaction_id.map(str::to_string);
                node.updated_at = now;
                changed += 1;
            }
        }
        Ok(changed)
    }

    fn remove_subtree(&mut self, key: &str, expected_version: &str) -> Result<usize> {
        self.check("store_remove_subtree", key, expected_version)?;
        let keys = self.subtree_keys(key);
        for k in &keys {
            self.nodes.remove(k);
        }
        Ok(keys.len())
    }

    fn children(&self, parent_key: &str) -> Result<Vec<StoredNode>> {
        let mut children: Vec<StoredNode> = self
            .nodes
            .values()
            .filter(|n| n.is_live() && n.parent_key.as_deref() == Some(parent_key))
            .cloned()
            .collect();
        children.sort_by(|a, b| a.seq.cmp(&b.seq).then_with(|| a.key.cmp(&b.key)));
        Ok(children)
    }

    fn begin(&mut self) -> Result<()> {
        self.snapshot = Some(self.nodes.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.snapshot = None;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if let Some(snapshot) = self.snapshot.take() {
            self.nodes = snapshot;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_store::StoredKind;
    use conftree_core::ExErrorKind;

    fn node(key: &str, version: &str) -> StoredNode {
        StoredNode::new(key, StoredKind::Value, "v".into(), version)
    }

    #[test]
    fn test_cas_semantics_match_sqlite_store() {
        let mut store = MemoryNodeStore::new();
        store.create(node("k/a", "4")).unwrap();

        let stale = store.compare_and_set("3", node("k/a", "5")).unwrap_err();
        assert_eq!(stale.kind(), ExErrorKind::StaleVersion);

        let missing = store.compare_and_set("1", node("k/b", "2")).unwrap_err();
        assert_eq!(missing.kind(), ExErrorKind::NotFound);

        store.compare_and_set("4", node("k/a", "5")).unwrap();
        assert_eq!(store.read("k/a").unwrap().unwrap().version, "5");
    }

    #[test]
    fn test_remove_subtree_spares_prefix_siblings() {
        let mut store = MemoryNodeStore::new();
        store.create(node("k/a", "1")).unwrap();
        store.create(node("k/a/b", "1")).unwrap();
        store.create(node("k/ab", "1")).unwrap();

        assert_eq!(store.remove_subtree("k/a", "1").unwrap(), 2);
        assert!(store.read("k/ab").unwrap().is_some());
    }

    #[test]
    fn test_tombstoned_key_can_be_recreated() {
        let mut store = MemoryNodeStore::new();
        store.create(node("k/a", "1")).unwrap();
        store.tombstone("k/a", "1", "2", None).unwrap();
        store.create(node("k/a", "3")).unwrap();
        assert!(store.read("k/a").unwrap().unwrap().is_live());
    }
}

//! Storage seam for persisted configuration nodes
//!
//! A `NodeStore` is anything offering compare-and-swap on a hierarchical key
//! space. Writes to an existing node name the version the caller read; if
//! the stored version moved on, the write fails with `StaleVersion` and
//! nothing changes.

#![allow(clippy::result_large_err)]

use chrono::{DateTime, Utc};
use conftree_core::errors::{ConfigError, ExError};
use conftree_core::KeyValueKind;
use serde::{Deserialize, Serialize};

use crate::errors::{domain, not_found, stale_version, Result};
use crate::path::parent_key;

/// What a stored row holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoredKind {
    /// Configuration header; stands in for the root path node
    Header,
    Path,
    Value,
    /// Values list, items stored inline as a JSON array
    Values,
    Elements,
    KeyValue(KeyValueKind),
}

impl StoredKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoredKind::Header => "header",
            StoredKind::Path => "path",
            StoredKind::Value => "value",
            StoredKind::Values => "values",
            StoredKind::Elements => "elements",
            StoredKind::KeyValue(KeyValueKind::Parameters) => "parameters",
            StoredKind::KeyValue(KeyValueKind::Properties) => "properties",
            StoredKind::KeyValue(KeyValueKind::Attributes) => "attributes",
        }
    }

    /// # Errors
    ///
    /// `ValueParse` for an unknown kind label.
    pub fn parse(label: &str) -> Result<Self> {
        Ok(match label {
            "header" => StoredKind::Header,
            "path" => StoredKind::Path,
            "value" => StoredKind::Value,
            "values" => StoredKind::Values,
            "elements" => StoredKind::Elements,
            "parameters" => StoredKind::KeyValue(KeyValueKind::Parameters),
            "properties" => StoredKind::KeyValue(KeyValueKind::Properties),
            "attributes" => StoredKind::KeyValue(KeyValueKind::Attributes),
            other => {
                return Err(domain(
                    "decode_node",
                    ConfigError::ValueParse {
                        value: other.to_string(),
                        reason: "unknown stored node kind".to_string(),
                    },
                ))
            }
        })
    }

    /// Kinds that can own named children
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            StoredKind::Header | StoredKind::Path | StoredKind::Elements
        )
    }
}

/// One persisted node
#[derive(Debug, Clone, PartialEq)]
pub struct StoredNode {
    pub key: String,
    pub parent_key: Option<String>,
    pub name: String,
    pub kind: StoredKind,
    /// Scalar, list, map or header document depending on `kind`
    pub value: serde_json::Value,
    /// Optimistic concurrency marker
    pub version: String,
    pub transaction_id: Option<String>,
    pub owner: Option<String>,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub deleted: bool,
    /// Position among siblings
    pub seq: i64,
}

impl StoredNode {
    pub fn new(
        key: impl Into<String>,
        kind: StoredKind,
        value: serde_json::Value,
        version: impl Into<String>,
    ) -> Self {
        let key = key.into();
        let parent_key = parent_key(&key).map(str::to_string);
        let name = key.rsplit('/').next().unwrap_or_default().to_string();
        Self {
            key,
            parent_key,
            name,
            kind,
            value,
            version: version.into(),
            transaction_id: None,
            owner: None,
            description: None,
            updated_at: Utc::now(),
            deleted: false,
            seq: 0,
        }
    }

    pub fn is_live(&self) -> bool {
        !self.deleted
    }

    /// Scalar payload of a value row
    pub fn scalar(&self) -> Option<&str> {
        self.value.as_str()
    }
}

/// Compare-and-swap over persisted configuration nodes
pub trait NodeStore {
    /// Row at `key`, tombstoned rows included
    fn read(&self, key: &str) -> Result<Option<StoredNode>>;

    /// Insert a new row; a tombstoned row at the same key is replaced
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if a live row holds the key.
    fn create(&mut self, node: StoredNode) -> Result<()>;

    /// Overwrite a live row if its version is still `expected_version`
    ///
    /// # Errors
    ///
    /// `NotFound` for a missing or tombstoned row, `StaleVersion` when the
    /// stored version differs.
    fn compare_and_set(&mut self, expected_version: &str, node: StoredNode) -> Result<()>;

    /// Mark a row and everything below it deleted, keeping the rows as an
    /// audit trail
    ///
    /// # Errors
    ///
    /// As for `compare_and_set`.
    fn tombstone(
        &mut self,
        key: &str,
        expected_version: &str,
        version: &str,
        transaction_id: Option<&str>,
    ) -> Result<usize>;

    /// Physically remove a row and everything below it
    ///
    /// # Errors
    ///
    /// As for `compare_and_set`.
    fn remove_subtree(&mut self, key: &str, expected_version: &str) -> Result<usize>;

    /// Live children of `parent_key`, in sibling order
    fn children(&self, parent_key: &str) -> Result<Vec<StoredNode>>;

    /// Start grouping writes; nested calls are not supported
    fn begin(&mut self) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    /// Undo every write since `begin`
    fn rollback(&mut self) -> Result<()>;
}

/// Run `work` between `begin` and `commit`, rolling back if it fails
///
/// The error from `work` is returned even when the rollback also fails.
pub fn transactional<S, T, F>(store: &mut S, work: F) -> Result<T>
where
    S: NodeStore + ?Sized,
    F: FnOnce(&mut S) -> Result<T>,
{
    store.begin()?;
    match work(store) {
        Ok(value) => {
            store.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback) = store.rollback() {
                tracing::warn!(error = %rollback, "rollback failed");
            }
            Err(err)
        }
    }
}

/// Shared CAS check: `NotFound` or `StaleVersion` for a row that refused a
/// conditional write
pub(crate) fn cas_failure(
    op: &str,
    key: &str,
    expected: &str,
    current: Option<&StoredNode>,
) -> ExError {
    match current {
        Some(node) if node.is_live() => stale_version(op, key, expected, &node.version),
        _ => not_found(op, key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels_round_trip() {
        for kind in [
            StoredKind::Header,
            StoredKind::Path,
            StoredKind::Value,
            StoredKind::Values,
            StoredKind::Elements,
            StoredKind::KeyValue(KeyValueKind::Parameters),
            StoredKind::KeyValue(KeyValueKind::Properties),
            StoredKind::KeyValue(KeyValueKind::Attributes),
        ] {
            assert_eq!(StoredKind::parse(kind.as_str()).unwrap(), kind);
        }
        assert!(StoredKind::parse("blob").is_err());
    }

    #[test]
    fn test_new_node_derives_parent_and_name() {
        let node = StoredNode::new("G/A/cfg/1/db/host", StoredKind::Value, "h1".into(), "1.0");
        assert_eq!(node.parent_key.as_deref(), Some("G/A/cfg/1/db"));
        assert_eq!(node.name, "host");
        assert_eq!(node.scalar(), Some("h1"));
        assert!(node.is_live());
    }
}

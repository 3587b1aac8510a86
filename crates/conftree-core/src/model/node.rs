use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::key_values::KeyValues;
use crate::errors::{ConfigError, Result};

/// Opaque handle to a node stored in a `ConfigTree`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Lifecycle state shared by nodes and configurations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    /// Constructed during tree assembly
    Loading,
    /// Whole tree finished loading
    Synced,
    /// Mutated after sync
    Updated,
    /// Removed from the tree
    Deleted,
}

/// Which reserved key-value child a node is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyValueKind {
    Parameters,
    Properties,
    Attributes,
}

impl KeyValueKind {
    pub const ALL: [KeyValueKind; 3] = [
        KeyValueKind::Parameters,
        KeyValueKind::Properties,
        KeyValueKind::Attributes,
    ];
}

/// Element type of a list node; a list never mixes the two
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    /// Scalar value nodes, named by their index
    Values,
    /// Path nodes (sub-trees)
    Elements,
}

/// Named children of a path node plus its reserved key-value children
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathChildren {
    pub(crate) order: Vec<NodeId>,
    pub(crate) index: HashMap<String, NodeId>,
    pub(crate) parameters: Option<NodeId>,
    pub(crate) properties: Option<NodeId>,
    pub(crate) attributes: Option<NodeId>,
}

impl PathChildren {
    pub(crate) fn reserved(&self, kind: KeyValueKind) -> Option<NodeId> {
        match kind {
            KeyValueKind::Parameters => self.parameters,
            KeyValueKind::Properties => self.properties,
            KeyValueKind::Attributes => self.attributes,
        }
    }

    pub(crate) fn reserved_slot(&mut self, kind: KeyValueKind) -> &mut Option<NodeId> {
        match kind {
            KeyValueKind::Parameters => &mut self.parameters,
            KeyValueKind::Properties => &mut self.properties,
            KeyValueKind::Attributes => &mut self.attributes,
        }
    }

    pub(crate) fn reserved_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        [self.parameters, self.properties, self.attributes]
            .into_iter()
            .flatten()
    }
}

/// Closed set of node kinds
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Path(PathChildren),
    KeyValue {
        kind: KeyValueKind,
        entries: KeyValues,
    },
    List {
        kind: ListKind,
        items: Vec<NodeId>,
    },
    Value(String),
}

impl NodeKind {
    /// Short label used in error messages
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Path(_) => "path",
            NodeKind::KeyValue { .. } => "key-value",
            NodeKind::List { .. } => "list",
            NodeKind::Value(_) => "value",
        }
    }
}

/// A single node of a configuration tree
///
/// Nodes live in the arena of a `ConfigTree`; `parent` is a back-reference
/// only, ownership runs from the arena down.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigNode {
    pub(crate) name: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) state: NodeState,
    pub(crate) error: Option<String>,
    pub(crate) node_version: u64,
    pub(crate) description: Option<String>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    pub(crate) kind: NodeKind,
}

impl ConfigNode {
    pub(crate) fn new(name: String, kind: NodeKind) -> Self {
        let now = Utc::now();
        Self {
            name,
            parent: None,
            state: NodeState::Loading,
            error: None,
            node_version: 0,
            description: None,
            created_at: now,
            updated_at: now,
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn node_version(&self) -> u64 {
        self.node_version
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_path(&self) -> bool {
        matches!(self.kind, NodeKind::Path(_))
    }

    /// Scalar value, for value nodes only
    pub fn value(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Entries, for key-value nodes only
    pub fn entries(&self) -> Option<&KeyValues> {
        match &self.kind {
            NodeKind::KeyValue { entries, .. } => Some(entries),
            _ => None,
        }
    }

    /// Record a post-sync mutation
    ///
    /// Loading nodes are still being assembled and deleted nodes are gone,
    /// so neither changes state or version here.
    pub(crate) fn touch(&mut self) {
        if matches!(self.state, NodeState::Synced | NodeState::Updated) {
            self.state = NodeState::Updated;
            self.node_version += 1;
            self.updated_at = Utc::now();
        }
    }

    /// Move to `Deleted`; the version only moves if the node was `Synced`
    pub(crate) fn mark_deleted(&mut self) {
        if self.state == NodeState::Synced {
            self.node_version += 1;
            self.updated_at = Utc::now();
        }
        self.state = NodeState::Deleted;
    }
}

/// Check a node name against the characters reserved by the path grammar
///
/// # Errors
///
/// Returns `InvalidName` for empty names and names containing `.`, `/`,
/// `*` or a marker character.
pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ConfigError::InvalidName {
            name: name.to_string(),
            reason: "name cannot be empty".to_string(),
        });
    }
    if let Some(c) = name.chars().find(|c| matches!(c, '.' | '/')) {
        return Err(ConfigError::InvalidName {
            name: name.to_string(),
            reason: format!("'{}' is reserved by the path grammar", c),
        });
    }
    if name == "*" || name.contains(['#', '@', '$']) {
        return Err(ConfigError::InvalidName {
            name: name.to_string(),
            reason: "wildcard and marker characters cannot appear in names".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name_rejects_path_characters() {
        assert!(validate_name("db").is_ok());
        assert!(validate_name("db-primary_1").is_ok());

        for bad in ["", "  ", "a.b", "a/b", "*", "db$host", "p#1", "x@y"] {
            assert!(
                matches!(validate_name(bad), Err(ConfigError::InvalidName { .. })),
                "expected InvalidName for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_touch_only_after_sync() {
        let mut node = ConfigNode::new("n".to_string(), NodeKind::Value("v".to_string()));
        node.touch();
        assert_eq!(node.state(), NodeState::Loading);
        assert_eq!(node.node_version(), 0);

        node.state = NodeState::Synced;
        node.touch();
        node.touch();
        assert_eq!(node.state(), NodeState::Updated);
        assert_eq!(node.node_version(), 2);
    }

    #[test]
    fn test_mark_deleted_versioning() {
        let mut synced = ConfigNode::new("a".to_string(), NodeKind::Value(String::new()));
        synced.state = NodeState::Synced;
        synced.mark_deleted();
        assert_eq!(synced.state(), NodeState::Deleted);
        assert_eq!(synced.node_version(), 1);

        let mut updated = ConfigNode::new("b".to_string(), NodeKind::Value(String::new()));
        updated.state = NodeState::Updated;
        updated.node_version = 5;
        updated.mark_deleted();
        assert_eq!(updated.state(), NodeState::Deleted);
        assert_eq!(updated.node_version(), 5);
    }
}

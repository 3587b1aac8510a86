use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::key_values::KeyValues;
use super::node::{
    validate_name, ConfigNode, KeyValueKind, ListKind, NodeId, NodeKind, NodeState, PathChildren,
};
use crate::errors::{ConfigError, Result};

/// Names under which the reserved key-value children are addressed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeAliases {
    pub parameters: String,
    pub properties: String,
    pub attributes: String,
}

impl Default for NodeAliases {
    fn default() -> Self {
        Self {
            parameters: "parameters".to_string(),
            properties: "properties".to_string(),
            attributes: "attributes".to_string(),
        }
    }
}

impl NodeAliases {
    pub fn alias_for(&self, kind: KeyValueKind) -> &str {
        match kind {
            KeyValueKind::Parameters => &self.parameters,
            KeyValueKind::Properties => &self.properties,
            KeyValueKind::Attributes => &self.attributes,
        }
    }

    pub fn kind_for(&self, name: &str) -> Option<KeyValueKind> {
        KeyValueKind::ALL
            .into_iter()
            .find(|kind| self.alias_for(*kind) == name)
    }

    /// Each alias must be a valid, distinct node name
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` for an alias the path grammar cannot address,
    /// or `Configuration` when two aliases collide.
    pub fn validate(&self) -> Result<()> {
        for kind in KeyValueKind::ALL {
            validate_name(self.alias_for(kind))?;
        }
        if self.parameters == self.properties
            || self.parameters == self.attributes
            || self.properties == self.attributes
        {
            return Err(ConfigError::Configuration {
                message: "node aliases must be distinct".to_string(),
            });
        }
        Ok(())
    }
}

/// Arena holding every node of one configuration tree
///
/// Nodes are addressed by `NodeId`. Removed nodes stay in the arena,
/// detached and `Deleted`, so ids handed out earlier never dangle.
///
/// Not internally synchronized: callers serialize mutation.
#[derive(Debug, Clone, Default)]
pub struct ConfigTree {
    nodes: Vec<ConfigNode>,
    root: Option<NodeId>,
    aliases: NodeAliases,
}

impl ConfigTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_aliases(aliases: NodeAliases) -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            aliases,
        }
    }

    pub fn aliases(&self) -> &NodeAliases {
        &self.aliases
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Install a detached path node as the root
    ///
    /// # Errors
    ///
    /// `InvalidNodeKind` unless `id` is a path node, `NodeState` if it is
    /// attached to a parent.
    pub fn set_root(&mut self, id: NodeId) -> Result<()> {
        let node = self.get(id)?;
        if !node.is_path() {
            return Err(self.kind_error(id, "path"));
        }
        if node.parent.is_some() {
            return Err(ConfigError::NodeState {
                path: self.absolute_path(id),
                reason: "root cannot have a parent".to_string(),
            });
        }
        self.root = Some(id);
        Ok(())
    }

    /// Look up a node by id
    ///
    /// # Errors
    ///
    /// `NotFound` for an id from another tree.
    pub fn get(&self, id: NodeId) -> Result<&ConfigNode> {
        self.nodes.get(id.0).ok_or_else(|| ConfigError::NotFound {
            path: format!("#{}", id.0),
        })
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut ConfigNode> {
        self.nodes.get_mut(id.0).ok_or_else(|| ConfigError::NotFound {
            path: format!("#{}", id.0),
        })
    }

    pub fn node(&self, id: NodeId) -> Option<&ConfigNode> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ===== Construction =====

    fn insert(&mut self, node: ConfigNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Create a detached path node in `Loading` state
    ///
    /// # Errors
    ///
    /// `InvalidName` if `name` uses characters reserved by the path grammar.
    pub fn new_path_node(&mut self, name: &str) -> Result<NodeId> {
        validate_name(name)?;
        Ok(self.insert(ConfigNode::new(
            name.to_string(),
            NodeKind::Path(PathChildren::default()),
        )))
    }

    /// Create a detached value node
    ///
    /// # Errors
    ///
    /// `InvalidName` for a reserved name.
    pub fn new_value_node(&mut self, name: &str, value: impl Into<String>) -> Result<NodeId> {
        validate_name(name)?;
        Ok(self.insert(ConfigNode::new(
            name.to_string(),
            NodeKind::Value(value.into()),
        )))
    }

    /// Create a detached, empty list node
    ///
    /// # Errors
    ///
    /// `InvalidName` for a reserved name.
    pub fn new_list_node(&mut self, name: &str, kind: ListKind) -> Result<NodeId> {
        validate_name(name)?;
        Ok(self.insert(ConfigNode::new(
            name.to_string(),
            NodeKind::List {
                kind,
                items: Vec::new(),
            },
        )))
    }

    /// Create a detached key-value node; its name is the configured alias
    pub fn new_key_value_node(&mut self, kind: KeyValueKind) -> NodeId {
        let name = self.aliases.alias_for(kind).to_string();
        self.insert(ConfigNode::new(
            name,
            NodeKind::KeyValue {
                kind,
                entries: KeyValues::new(),
            },
        ))
    }

    // ===== Path node operations =====

    /// Attach `child` under the path node `parent`
    ///
    /// Key-value nodes go into the matching reserved slot; everything else
    /// joins the named children. A child that already has a parent is
    /// detached from it first. The parent is marked `Updated`.
    ///
    /// # Errors
    ///
    /// - `InvalidNodeKind` if `parent` is not a path node
    /// - `AlreadyExists` if the name (or reserved slot) is taken
    /// - `InvalidName` if the child's name shadows a reserved alias
    /// - `NodeState` if the parent holds an error, or the move would make a
    ///   node its own ancestor
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.ensure_writable(parent)?;
        if !self.get(parent)?.is_path() {
            return Err(self.kind_error(parent, "path"));
        }
        if child == parent || self.is_ancestor(child, parent) {
            return Err(ConfigError::NodeState {
                path: self.absolute_path(child),
                reason: "a node cannot be attached below itself".to_string(),
            });
        }

        let (child_name, reserved_kind) = {
            let node = self.get(child)?;
            let kind = match &node.kind {
                NodeKind::KeyValue { kind, .. } => Some(*kind),
                _ => None,
            };
            (node.name.clone(), kind)
        };

        if reserved_kind.is_none() && self.aliases.kind_for(&child_name).is_some() {
            return Err(ConfigError::InvalidName {
                name: child_name,
                reason: "name is reserved for a key-value child".to_string(),
            });
        }

        let taken = match self.path_children(parent)? {
            children if reserved_kind.is_some() => reserved_kind
                .and_then(|k| children.reserved(k))
                .is_some(),
            children => children.index.contains_key(&child_name),
        };
        if taken {
            return Err(ConfigError::AlreadyExists {
                path: format!("{}/{}", self.absolute_path(parent), child_name),
            });
        }

        self.detach(child)?;

        let children = self.path_children_mut(parent)?;
        match reserved_kind {
            Some(kind) => *children.reserved_slot(kind) = Some(child),
            None => {
                children.order.push(child);
                children.index.insert(child_name, child);
            }
        }
        self.get_mut(child)?.parent = Some(parent);
        self.get_mut(parent)?.touch();
        tracing::debug!(parent = parent.0, child = child.0, "child attached");
        Ok(())
    }

    /// Detach the child called `name` (a reserved alias works too)
    ///
    /// The removed sub-tree stays in the arena marked `Deleted`; the parent
    /// is marked `Updated`.
    ///
    /// # Errors
    ///
    /// `NotFound` if there is no such child, `InvalidNodeKind` if `parent`
    /// is not a path node.
    pub fn remove_child(&mut self, parent: NodeId, name: &str) -> Result<NodeId> {
        self.ensure_writable(parent)?;
        let child = self
            .child(parent, name)
            .ok_or_else(|| ConfigError::NotFound {
                path: format!("{}/{}", self.absolute_path(parent), name),
            })?;
        if !self.get(parent)?.is_path() {
            return Err(self.kind_error(parent, "path"));
        }
        self.detach(child)?;
        self.delete_subtree(child);
        Ok(child)
    }

    /// Named child or reserved child (by alias) of a path or list node
    pub fn child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        match &self.node(parent)?.kind {
            NodeKind::Path(children) => children.index.get(name).copied().or_else(|| {
                self.aliases
                    .kind_for(name)
                    .and_then(|kind| children.reserved(kind))
            }),
            NodeKind::List { items, .. } => items
                .iter()
                .copied()
                .find(|id| self.node(*id).map(|n| n.name.as_str()) == Some(name)),
            NodeKind::KeyValue { .. } | NodeKind::Value(_) => None,
        }
    }

    /// Children in iteration order (named children of a path node, items of
    /// a list); reserved key-value children are not included
    pub fn children(&self, parent: NodeId) -> Vec<NodeId> {
        match self.node(parent).map(|n| &n.kind) {
            Some(NodeKind::Path(children)) => children.order.clone(),
            Some(NodeKind::List { items, .. }) => items.clone(),
            _ => Vec::new(),
        }
    }

    /// Reserved key-value child of a path node
    pub fn reserved(&self, parent: NodeId, kind: KeyValueKind) -> Option<NodeId> {
        match &self.node(parent)?.kind {
            NodeKind::Path(children) => children.reserved(kind),
            _ => None,
        }
    }

    /// Reserved key-value child, created on first use
    ///
    /// # Errors
    ///
    /// `InvalidNodeKind` if `parent` is not a path node.
    pub fn ensure_reserved(&mut self, parent: NodeId, kind: KeyValueKind) -> Result<NodeId> {
        if let Some(existing) = self.reserved(parent, kind) {
            return Ok(existing);
        }
        if !self.get(parent)?.is_path() {
            return Err(self.kind_error(parent, "path"));
        }
        let kv = self.new_key_value_node(kind);
        let state = self.get(parent)?.state;
        if matches!(state, NodeState::Synced | NodeState::Updated) {
            self.get_mut(kv)?.state = NodeState::Synced;
        }
        self.add_child(parent, kv)?;
        Ok(kv)
    }

    fn path_children(&self, id: NodeId) -> Result<&PathChildren> {
        match &self.get(id)?.kind {
            NodeKind::Path(children) => Ok(children),
            _ => Err(self.kind_error(id, "path")),
        }
    }

    fn path_children_mut(&mut self, id: NodeId) -> Result<&mut PathChildren> {
        let err = self.kind_error(id, "path");
        match &mut self.get_mut(id)?.kind {
            NodeKind::Path(children) => Ok(children),
            _ => Err(err),
        }
    }

    /// Unlink `child` from whatever parent holds it
    fn detach(&mut self, child: NodeId) -> Result<()> {
        let Some(parent) = self.get(child)?.parent else {
            return Ok(());
        };
        let name = self.get(child)?.name.clone();
        match &mut self.get_mut(parent)?.kind {
            NodeKind::Path(children) => {
                children.order.retain(|id| *id != child);
                if children.index.get(&name) == Some(&child) {
                    children.index.remove(&name);
                }
                for kind in KeyValueKind::ALL {
                    let slot = children.reserved_slot(kind);
                    if *slot == Some(child) {
                        *slot = None;
                    }
                }
            }
            NodeKind::List { items, .. } => items.retain(|id| *id != child),
            NodeKind::KeyValue { .. } | NodeKind::Value(_) => {}
        }
        self.get_mut(child)?.parent = None;
        self.get_mut(parent)?.touch();
        Ok(())
    }

    fn delete_subtree(&mut self, id: NodeId) {
        for descendant in self.descendants(id) {
            if let Some(node) = self.nodes.get_mut(descendant.0) {
                node.mark_deleted();
            }
        }
    }

    /// `id` and every node it owns, parents before children
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            let Some(node) = self.node(current) else {
                continue;
            };
            let owned: Vec<NodeId> = match &node.kind {
                NodeKind::Path(children) => children
                    .order
                    .iter()
                    .copied()
                    .chain(children.reserved_ids())
                    .collect(),
                NodeKind::List { items, .. } => items.clone(),
                NodeKind::KeyValue { .. } | NodeKind::Value(_) => Vec::new(),
            };
            stack.extend(owned.into_iter().rev());
        }
        out
    }

    fn is_ancestor(&self, candidate: NodeId, of: NodeId) -> bool {
        let mut current = self.node(of).and_then(|n| n.parent);
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            current = self.node(id).and_then(|n| n.parent);
        }
        false
    }

    // ===== Key-value node operations =====

    /// Set `key` on a key-value node (last write wins)
    ///
    /// # Errors
    ///
    /// `InvalidNodeKind` if `id` is not a key-value node.
    pub fn add_key_value(
        &mut self,
        id: NodeId,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<()> {
        self.ensure_writable(id)?;
        let err = self.kind_error(id, "key-value");
        let node = self.get_mut(id)?;
        match &mut node.kind {
            NodeKind::KeyValue { entries, .. } => {
                entries.insert(key, value);
            }
            _ => return Err(err),
        }
        node.touch();
        Ok(())
    }

    /// Remove `key` from a key-value node
    ///
    /// # Errors
    ///
    /// `NotFound` if the key is absent, `InvalidNodeKind` for other nodes.
    pub fn remove_key(&mut self, id: NodeId, key: &str) -> Result<String> {
        self.ensure_writable(id)?;
        let path = format!("{}/{}", self.absolute_path(id), key);
        let err = self.kind_error(id, "key-value");
        let node = self.get_mut(id)?;
        let removed = match &mut node.kind {
            NodeKind::KeyValue { entries, .. } => entries
                .remove(key)
                .ok_or(ConfigError::NotFound { path })?,
            _ => return Err(err),
        };
        node.touch();
        Ok(removed)
    }

    /// Value stored under `key`, for key-value nodes
    pub fn get_value(&self, id: NodeId, key: &str) -> Option<&str> {
        self.node(id)?.entries()?.get(key)
    }

    pub fn has_key(&self, id: NodeId, key: &str) -> bool {
        self.get_value(id, key).is_some()
    }

    /// Convenience: set a key in the reserved child of a path node,
    /// creating the reserved child when needed
    ///
    /// # Errors
    ///
    /// `InvalidNodeKind` if `parent` is not a path node.
    pub fn set_reserved_value(
        &mut self,
        parent: NodeId,
        kind: KeyValueKind,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<()> {
        let kv = self.ensure_reserved(parent, kind)?;
        self.add_key_value(kv, key, value)
    }

    // ===== List node operations =====

    /// Append a scalar to a values list
    ///
    /// # Errors
    ///
    /// `InvalidNodeKind` unless `list` is a values list.
    pub fn add_value(&mut self, list: NodeId, value: impl Into<String>) -> Result<NodeId> {
        self.ensure_writable(list)?;
        let len = match &self.get(list)?.kind {
            NodeKind::List {
                kind: ListKind::Values,
                items,
            } => items.len(),
            _ => return Err(self.kind_error(list, "values list")),
        };
        let item = self.new_value_node(&len.to_string(), value)?;
        self.push_item(list, item)?;
        Ok(item)
    }

    /// Append a path node to an elements list
    ///
    /// # Errors
    ///
    /// `InvalidNodeKind` unless `list` is an elements list and `element` a
    /// path node; `AlreadyExists` for a duplicate element name.
    pub fn add_element(&mut self, list: NodeId, element: NodeId) -> Result<()> {
        self.ensure_writable(list)?;
        if !self.is_elements_list(list) {
            return Err(self.kind_error(list, "elements list"));
        }
        if !self.get(element)?.is_path() {
            return Err(self.kind_error(element, "path"));
        }
        let name = self.get(element)?.name.clone();
        if self.child(list, &name).is_some() {
            return Err(ConfigError::AlreadyExists {
                path: format!("{}/{}", self.absolute_path(list), name),
            });
        }
        self.detach(element)?;
        self.push_item(list, element)
    }

    /// Detach the element called `name` from an elements list
    ///
    /// Like `remove_child`, the removed element stays in the arena marked
    /// `Deleted`.
    ///
    /// # Errors
    ///
    /// `InvalidNodeKind` unless `list` is an elements list, `NotFound` if it
    /// holds no such element.
    pub fn remove_element(&mut self, list: NodeId, name: &str) -> Result<NodeId> {
        self.ensure_writable(list)?;
        if !self.is_elements_list(list) {
            return Err(self.kind_error(list, "elements list"));
        }
        let element = self
            .child(list, name)
            .ok_or_else(|| ConfigError::NotFound {
                path: format!("{}/{}", self.absolute_path(list), name),
            })?;
        self.detach(element)?;
        self.delete_subtree(element);
        Ok(element)
    }

    pub fn is_elements_list(&self, id: NodeId) -> bool {
        matches!(
            self.node(id).map(|n| &n.kind),
            Some(NodeKind::List {
                kind: ListKind::Elements,
                ..
            })
        )
    }

    fn push_item(&mut self, list: NodeId, item: NodeId) -> Result<()> {
        let list_state = self.get(list)?.state;
        if let NodeKind::List { items, .. } = &mut self.get_mut(list)?.kind {
            items.push(item);
        }
        let node = self.get_mut(item)?;
        node.parent = Some(list);
        if matches!(list_state, NodeState::Synced | NodeState::Updated) {
            node.state = NodeState::Synced;
        }
        self.get_mut(list)?.touch();
        Ok(())
    }

    /// Scalar at `index` of a values list
    ///
    /// # Errors
    ///
    /// `IndexOutOfRange` past the end, `InvalidNodeKind` for other nodes.
    pub fn list_value(&self, list: NodeId, index: usize) -> Result<&str> {
        match &self.get(list)?.kind {
            NodeKind::List {
                kind: ListKind::Values,
                items,
            } => {
                let item = items.get(index).ok_or_else(|| ConfigError::IndexOutOfRange {
                    path: self.absolute_path(list),
                    index,
                    len: items.len(),
                })?;
                self.get(*item)?
                    .value()
                    .ok_or_else(|| self.kind_error(*item, "value"))
            }
            _ => Err(self.kind_error(list, "values list")),
        }
    }

    /// All scalars of a values list, in order
    pub fn list_values(&self, list: NodeId) -> Vec<&str> {
        self.children(list)
            .into_iter()
            .filter_map(|id| self.node(id).and_then(|n| n.value()))
            .collect()
    }

    /// Replace the contents of a values list
    ///
    /// # Errors
    ///
    /// `InvalidNodeKind` unless `list` is a values list.
    pub fn replace_values(&mut self, list: NodeId, values: &[String]) -> Result<()> {
        self.ensure_writable(list)?;
        let old = match &mut self.get_mut(list)?.kind {
            NodeKind::List {
                kind: ListKind::Values,
                items,
            } => std::mem::take(items),
            _ => return Err(self.kind_error(list, "values list")),
        };
        for item in old {
            if let Some(node) = self.nodes.get_mut(item.0) {
                node.parent = None;
                node.mark_deleted();
            }
        }
        for value in values {
            self.add_value(list, value.clone())?;
        }
        Ok(())
    }

    // ===== Value node operations =====

    /// Overwrite the scalar of a value node
    ///
    /// # Errors
    ///
    /// `InvalidNodeKind` unless `id` is a value node.
    pub fn set_value(&mut self, id: NodeId, value: impl Into<String>) -> Result<()> {
        self.ensure_writable(id)?;
        let err = self.kind_error(id, "value");
        let node = self.get_mut(id)?;
        match &mut node.kind {
            NodeKind::Value(v) => *v = value.into(),
            _ => return Err(err),
        }
        node.touch();
        Ok(())
    }

    // ===== Common node operations =====

    /// Rename a node
    ///
    /// # Errors
    ///
    /// `InvalidName` for reserved characters, `InvalidNodeKind` for
    /// key-value nodes (their name is the alias), `AlreadyExists` if a
    /// sibling already uses the name.
    pub fn set_name(&mut self, id: NodeId, name: &str) -> Result<()> {
        validate_name(name)?;
        if matches!(self.get(id)?.kind, NodeKind::KeyValue { .. }) {
            return Err(self.kind_error(id, "named"));
        }
        if let Some(parent) = self.get(id)?.parent {
            if self.aliases.kind_for(name).is_some() {
                return Err(ConfigError::InvalidName {
                    name: name.to_string(),
                    reason: "name is reserved for a key-value child".to_string(),
                });
            }
            if self.child(parent, name).is_some_and(|other| other != id) {
                return Err(ConfigError::AlreadyExists {
                    path: format!("{}/{}", self.absolute_path(parent), name),
                });
            }
            let old = self.get(id)?.name.clone();
            if let NodeKind::Path(children) = &mut self.get_mut(parent)?.kind {
                children.index.remove(&old);
                children.index.insert(name.to_string(), id);
            }
        }
        let node = self.get_mut(id)?;
        node.name = name.to_string();
        node.touch();
        Ok(())
    }

    pub fn set_description(&mut self, id: NodeId, description: Option<String>) -> Result<()> {
        let node = self.get_mut(id)?;
        node.description = description;
        node.touch();
        Ok(())
    }

    /// Overwrite both timestamps, used when a node is materialized from an
    /// update event stamped by its sender
    pub fn stamp(&mut self, id: NodeId, at: DateTime<Utc>) -> Result<()> {
        let node = self.get_mut(id)?;
        node.created_at = at;
        node.updated_at = at;
        Ok(())
    }

    /// Flag a node as failed; blocks further state transitions
    pub fn set_error(&mut self, id: NodeId, message: impl Into<String>) -> Result<()> {
        self.get_mut(id)?.error = Some(message.into());
        Ok(())
    }

    pub fn clear_error(&mut self, id: NodeId) -> Result<()> {
        self.get_mut(id)?.error = None;
        Ok(())
    }

    fn ensure_writable(&self, id: NodeId) -> Result<()> {
        let node = self.get(id)?;
        if let Some(error) = &node.error {
            return Err(ConfigError::NodeState {
                path: self.absolute_path(id),
                reason: format!("node holds an error: {}", error),
            });
        }
        if node.state == NodeState::Deleted {
            return Err(ConfigError::NodeState {
                path: self.absolute_path(id),
                reason: "node was deleted".to_string(),
            });
        }
        Ok(())
    }

    /// Ancestor names joined with `/`, root first
    pub fn absolute_path(&self, id: NodeId) -> String {
        self.ancestry(id).join("/")
    }

    /// Same as `absolute_path` in the `.`-separated query form
    pub fn dot_path(&self, id: NodeId) -> String {
        self.ancestry(id).join(".")
    }

    fn ancestry(&self, id: NodeId) -> Vec<&str> {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(cur) = current {
            let Some(node) = self.node(cur) else {
                break;
            };
            names.push(node.name.as_str());
            current = node.parent;
        }
        names.reverse();
        names
    }

    /// Nearest path node at or above `id`
    pub fn enclosing_path_node(&self, id: NodeId) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(cur) = current {
            let node = self.node(cur)?;
            if node.is_path() {
                return Some(cur);
            }
            current = node.parent;
        }
        None
    }

    // ===== Lifecycle =====

    /// Set `state` on `id` and, for path and list nodes, everything they own
    pub fn cascade_state(&mut self, id: NodeId, state: NodeState) {
        for descendant in self.descendants(id) {
            if let Some(node) = self.nodes.get_mut(descendant.0) {
                node.state = state;
            }
        }
    }

    /// First node at or below `id` holding an error
    pub fn first_error(&self, id: NodeId) -> Option<(NodeId, &str)> {
        self.descendants(id)
            .into_iter()
            .find_map(|d| self.node(d).and_then(|n| n.error().map(|e| (d, e))))
    }

    /// Transition `id` and its descendants to `Synced`
    ///
    /// # Errors
    ///
    /// `NodeState` naming the first node holding an error; nothing changes
    /// state in that case.
    pub fn mark_loaded(&mut self, id: NodeId) -> Result<()> {
        if let Some((failed, error)) = self.first_error(id) {
            return Err(ConfigError::NodeState {
                path: self.absolute_path(failed),
                reason: format!("node holds an error: {}", error),
            });
        }
        self.cascade_state(id, NodeState::Synced);
        Ok(())
    }

    fn kind_error(&self, id: NodeId, expected: &str) -> ConfigError {
        ConfigError::InvalidNodeKind {
            path: self.absolute_path(id),
            expected: expected.to_string(),
            actual: self
                .node(id)
                .map(|n| n.kind.label())
                .unwrap_or("missing")
                .to_string(),
        }
    }
}

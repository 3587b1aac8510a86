use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::key_values::KeyValues;
use super::node::{NodeId, NodeState};
use super::tree::ConfigTree;
use super::version::Version;
use crate::errors::{ConfigError, Result};
use crate::path::{self, ConfigPath, SearchResult};
use crate::properties;

/// Who changed a configuration and when
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiedBy {
    pub user: String,
    pub timestamp: DateTime<Utc>,
}

impl ModifiedBy {
    pub fn new(user: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            user: user.into(),
            timestamp,
        }
    }

    pub fn now(user: impl Into<String>) -> Self {
        Self::new(user, Utc::now())
    }
}

/// How a loaded configuration learns about changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncMode {
    /// Changes are pulled by the application
    #[default]
    Manual,
    /// Update batches are pushed as they happen
    Events,
}

/// Identity and version metadata of a configuration, without its tree
///
/// This is what parsers hand over alongside the root node, and what the
/// persisted store keeps in the configuration's header row.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigurationHeader {
    pub id: String,
    pub application_group: String,
    pub application: String,
    pub name: String,
    pub description: String,
    pub version: Option<Version>,
    pub created_by: Option<ModifiedBy>,
    pub updated_by: Option<ModifiedBy>,
    pub sync_mode: SyncMode,
}

/// Root aggregate: owns one tree plus its identity and version
///
/// `version` moves by exactly one minor step per applied update batch.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub id: String,
    pub application_group: String,
    pub application: String,
    pub name: String,
    pub description: String,
    pub version: Option<Version>,
    pub created_by: Option<ModifiedBy>,
    pub updated_by: Option<ModifiedBy>,
    pub sync_mode: SyncMode,
    state: NodeState,
    error: Option<String>,
    tree: ConfigTree,
}

impl Configuration {
    /// Wrap an assembled tree; the tree's root becomes the configuration root
    pub fn new(tree: ConfigTree) -> Self {
        Self::from_header(ConfigurationHeader::default(), tree)
    }

    pub fn from_header(header: ConfigurationHeader, tree: ConfigTree) -> Self {
        Self {
            id: header.id,
            application_group: header.application_group,
            application: header.application,
            name: header.name,
            description: header.description,
            version: header.version,
            created_by: header.created_by,
            updated_by: header.updated_by,
            sync_mode: header.sync_mode,
            state: NodeState::Loading,
            error: None,
            tree,
        }
    }

    pub fn header(&self) -> ConfigurationHeader {
        ConfigurationHeader {
            id: self.id.clone(),
            application_group: self.application_group.clone(),
            application: self.application.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            version: self.version,
            created_by: self.created_by.clone(),
            updated_by: self.updated_by.clone(),
            sync_mode: self.sync_mode,
        }
    }

    pub fn tree(&self) -> &ConfigTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut ConfigTree {
        &mut self.tree
    }

    /// Swap in a new tree, returning the old one
    pub fn replace_tree(&mut self, tree: ConfigTree) -> ConfigTree {
        std::mem::replace(&mut self.tree, tree)
    }

    pub fn root(&self) -> Option<NodeId> {
        self.tree.root()
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Resolve a dot-path from the root
    ///
    /// # Errors
    ///
    /// `InvalidPath` if `path` does not parse. A well-formed path that
    /// matches nothing is `Ok(None)`.
    pub fn find(&self, path: &str) -> Result<Option<SearchResult>> {
        let parsed = ConfigPath::parse(path)?;
        Ok(self.find_path(&parsed))
    }

    pub fn find_path(&self, path: &ConfigPath) -> Option<SearchResult> {
        let root = self.tree.root()?;
        path::find(&self.tree, root, path)
    }

    /// Scalar at `path`, if the path resolves to exactly one value
    ///
    /// # Errors
    ///
    /// `InvalidPath` if `path` does not parse.
    pub fn find_value(&self, path: &str) -> Result<Option<String>> {
        Ok(self
            .find(path)?
            .and_then(|result| result.value(&self.tree).map(str::to_string)))
    }

    pub fn resolved_properties(&self, node: NodeId) -> KeyValues {
        properties::resolved_properties(&self.tree, node)
    }

    /// Check that every identity field is present
    ///
    /// # Errors
    ///
    /// `Configuration` naming the first missing field, in the order id,
    /// name, application_group, application, description, version,
    /// created_by, updated_by, root.
    pub fn validate(&self) -> Result<()> {
        let text_fields = [
            ("id", &self.id),
            ("name", &self.name),
            ("application_group", &self.application_group),
            ("application", &self.application),
            ("description", &self.description),
        ];
        if let Some((field, _)) = text_fields.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(ConfigError::missing_field(field));
        }
        if self.version.is_none() {
            return Err(ConfigError::missing_field("version"));
        }
        if self.created_by.is_none() {
            return Err(ConfigError::missing_field("created_by"));
        }
        if self.updated_by.is_none() {
            return Err(ConfigError::missing_field("updated_by"));
        }
        if self.tree.root().is_none() {
            return Err(ConfigError::missing_field("root"));
        }
        Ok(())
    }

    /// Finish loading: cascade `Synced` through the tree
    ///
    /// # Errors
    ///
    /// `Configuration` if the aggregate itself holds an error or has no
    /// root; `NodeState` if any node holds an error.
    pub fn loaded(&mut self) -> Result<()> {
        if let Some(error) = &self.error {
            return Err(ConfigError::Configuration {
                message: format!("configuration '{}' holds an error: {}", self.name, error),
            });
        }
        let root = self
            .tree
            .root()
            .ok_or_else(|| ConfigError::missing_field("root"))?;
        self.tree.mark_loaded(root)?;
        self.state = NodeState::Synced;
        tracing::debug!(config_name = %self.name, nodes = self.tree.len(), "configuration loaded");
        Ok(())
    }

    /// Advance one minor version and record who changed it
    ///
    /// # Errors
    ///
    /// `Configuration` if no version was ever set, `ValueParse` when the
    /// minor number cannot grow.
    pub fn bump_version(&mut self, by: ModifiedBy) -> Result<Version> {
        let next = self
            .version
            .ok_or_else(|| ConfigError::missing_field("version"))?
            .next_minor()?;
        self.version = Some(next);
        self.updated_by = Some(by);
        if self.state == NodeState::Synced {
            self.state = NodeState::Updated;
        }
        Ok(next)
    }
}

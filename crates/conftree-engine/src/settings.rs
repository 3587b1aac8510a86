//! Engine settings
//!
//! Loaded from TOML. Every section and field has a default, so an empty
//! document is a valid configuration:
//!
//! ```toml
//! [aliases]
//! properties = "props"
//!
//! [store]
//! path = "/var/lib/conftree/nodes.db"
//! atomic_batches = true
//! delete_policy = "tombstone"
//!
//! [logging]
//! profile = "production"
//! ```

#![allow(clippy::result_large_err)]

use conftree_core::errors::{ExError, ExErrorKind};
use conftree_core::logging_facility::Profile;
use conftree_core::NodeAliases;
use conftree_store::{ApplyOptions, DeletePolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use conftree_store::errors::Result;

/// Top-level engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Names of the reserved key-value children.
    #[serde(default)]
    pub aliases: NodeAliases,

    /// Persisted store.
    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Persisted store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// SQLite file; the engine has no store when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Apply each stored batch in one transaction.
    #[serde(default = "default_atomic_batches")]
    pub atomic_batches: bool,

    #[serde(default)]
    pub delete_policy: DeletePolicy,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: None,
            atomic_batches: default_atomic_batches(),
            delete_policy: DeletePolicy::default(),
        }
    }
}

fn default_atomic_batches() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default)]
    pub profile: Profile,
}

impl EngineSettings {
    /// Parse settings from a TOML document
    ///
    /// # Errors
    ///
    /// `Serialization` for malformed TOML or unknown values, `InvalidName`
    /// or `Configuration` for unusable aliases.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let settings: Self = toml::from_str(source).map_err(|e| {
            ExError::new(ExErrorKind::Serialization)
                .with_op("settings_parse")
                .with_message(format!("Invalid engine settings: {}", e))
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read and parse a settings file
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be read, otherwise as for `from_toml_str`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            ExError::new(ExErrorKind::Io)
                .with_op("settings_read")
                .with_message(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&source)
    }

    /// # Errors
    ///
    /// `InvalidName` or `Configuration` for unusable aliases.
    pub fn validate(&self) -> Result<()> {
        self.aliases
            .validate()
            .map_err(|e| ExError::from(e).with_op("settings_validate"))
    }

    /// Options for applying batches to the persisted store
    pub fn apply_options(&self) -> ApplyOptions {
        ApplyOptions {
            aliases: self.aliases.clone(),
            atomic: self.store.atomic_batches,
            delete_policy: self.store.delete_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let settings = EngineSettings::from_toml_str("").unwrap();
        assert_eq!(settings, EngineSettings::default());
        assert!(settings.store.atomic_batches);
        assert_eq!(settings.store.delete_policy, DeletePolicy::Tombstone);
        assert_eq!(settings.aliases.properties, "properties");
        assert_eq!(settings.logging.profile, Profile::Development);
    }

    #[test]
    fn test_full_document() {
        let settings = EngineSettings::from_toml_str(
            r#"
            [aliases]
            properties = "props"

            [store]
            path = "nodes.db"
            atomic_batches = false
            delete_policy = "hard"

            [logging]
            profile = "production"
            "#,
        )
        .unwrap();

        assert_eq!(settings.aliases.properties, "props");
        assert_eq!(settings.aliases.parameters, "parameters");
        assert_eq!(settings.store.path, Some(PathBuf::from("nodes.db")));
        assert_eq!(settings.logging.profile, Profile::Production);

        let options = settings.apply_options();
        assert!(!options.atomic);
        assert_eq!(options.delete_policy, DeletePolicy::Hard);
        assert_eq!(options.aliases.properties, "props");
    }

    #[test]
    fn test_rejects_unknown_policy_and_colliding_aliases() {
        let err = EngineSettings::from_toml_str("[store]\ndelete_policy = \"shred\"").unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::Serialization);

        let err = EngineSettings::from_toml_str("[aliases]\nparameters = \"properties\"")
            .unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::Configuration);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = EngineSettings::from_file("/nonexistent/conftree.toml").unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::Io);
    }
}

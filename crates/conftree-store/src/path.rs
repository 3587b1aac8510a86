//! Store key layout
//!
//! Every configuration lives under `{group}/{application}/{configName}/{major}`.
//! That key holds the configuration header; nodes below the root hang off it
//! by name, so `cfg.db.host` in `G/A/cfg` at 1.x is `G/A/cfg/1/db/host`.

use conftree_core::errors::ConfigError;
use conftree_core::Configuration;

use crate::errors::{domain, Result};

const SEPARATOR: char = '/';

/// Base key of one configuration's major line
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorePath {
    base: String,
}

impl StorePath {
    /// Build the base key
    ///
    /// # Errors
    ///
    /// `InvalidName` if a component is empty or contains `/`.
    pub fn new(group: &str, application: &str, config_name: &str, major: u32) -> Result<Self> {
        for (field, value) in [
            ("group", group),
            ("application", application),
            ("config_name", config_name),
        ] {
            if value.trim().is_empty() || value.contains(SEPARATOR) {
                return Err(domain(
                    "store_path",
                    ConfigError::InvalidName {
                        name: value.to_string(),
                        reason: format!("{} cannot be empty or contain '/'", field),
                    },
                ));
            }
        }
        Ok(Self {
            base: format!("{}/{}/{}/{}", group, application, config_name, major),
        })
    }

    /// Base key for a configuration at its current version
    ///
    /// # Errors
    ///
    /// `Configuration` if the configuration has no version; `InvalidName`
    /// as for `new`.
    pub fn for_configuration(config: &Configuration) -> Result<Self> {
        let version = config
            .version
            .ok_or_else(|| domain("store_path", ConfigError::missing_field("version")))?;
        Self::new(
            &config.application_group,
            &config.application,
            &config.name,
            version.major(),
        )
    }

    /// Key of the configuration header row
    pub fn header_key(&self) -> &str {
        &self.base
    }

    /// Key of the node reached by `names` below the root
    pub fn node_key<S: AsRef<str>>(&self, names: &[S]) -> String {
        let mut key = self.base.clone();
        for name in names {
            key.push(SEPARATOR);
            key.push_str(name.as_ref());
        }
        key
    }

    /// Dot-path of `key` relative to the root, `None` for keys outside
    /// this configuration
    pub fn relative<'a>(&self, key: &'a str) -> Option<Vec<&'a str>> {
        if key == self.base {
            return Some(Vec::new());
        }
        key.strip_prefix(self.base.as_str())
            .and_then(|rest| rest.strip_prefix(SEPARATOR))
            .map(|rest| rest.split(SEPARATOR).collect())
    }
}

/// Parent key, `None` at the top of the key space
pub fn parent_key(key: &str) -> Option<&str> {
    key.rsplit_once(SEPARATOR).map(|(parent, _)| parent)
}

/// Whether `key` is `ancestor` itself or lies below it
pub fn is_within(key: &str, ancestor: &str) -> bool {
    key == ancestor
        || key
            .strip_prefix(ancestor)
            .is_some_and(|rest| rest.starts_with(SEPARATOR))
}

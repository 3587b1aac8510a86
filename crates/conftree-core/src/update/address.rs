use crate::errors::{ConfigError, Result};
use crate::model::{KeyValueKind, NodeAliases};
use crate::path::{ConfigPath, Segment};

/// Normalized location an update event writes to
///
/// Marker shorthand is expanded, so `cfg.db$host` and
/// `cfg.db.properties.host` give the same address. Unlike a query, `$`
/// here names the node's own properties, not the scoped view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventAddress {
    /// Node names from the root, reserved children spelled by alias
    pub segments: Vec<String>,
    /// Set when the address names one key inside a key-value node
    pub entry: Option<(KeyValueKind, String)>,
}

impl EventAddress {
    /// Normalize an event path
    ///
    /// # Errors
    ///
    /// `InvalidPath` if the path does not parse, uses `*`, or continues past
    /// a key lookup.
    pub fn parse(raw: &str, aliases: &NodeAliases) -> Result<Self> {
        let path = ConfigPath::parse(raw)?;
        let invalid = |reason: &str| ConfigError::InvalidPath {
            path: raw.to_string(),
            reason: reason.to_string(),
        };

        let mut segments: Vec<String> = Vec::with_capacity(path.len() + 1);
        let mut entry = None;

        for (i, segment) in path.segments().iter().enumerate() {
            if entry.is_some() {
                return Err(invalid("nothing can follow a key lookup"));
            }
            match segment {
                Segment::Wildcard => return Err(invalid("update paths cannot use '*'")),
                Segment::Name(name) => {
                    // The root may carry any name; below it an alias means a
                    // key-value node, whose children are keys
                    let reserved = segments
                        .last()
                        .filter(|_| i > 1)
                        .and_then(|prev| aliases.kind_for(prev));
                    match reserved {
                        Some(kind) => entry = Some((kind, name.clone())),
                        None => segments.push(name.clone()),
                    }
                }
                Segment::Marked { name, marker, key } => {
                    segments.push(name.clone());
                    segments.push(aliases.alias_for(marker.kind()).to_string());
                    if let Some(key) = key {
                        entry = Some((marker.kind(), key.clone()));
                    }
                }
            }
        }

        Ok(Self { segments, entry })
    }

    /// Dot-path form, for messages and logs
    pub fn display_path(&self) -> String {
        match &self.entry {
            Some((_, key)) => format!("{}.{}", self.segments.join("."), key),
            None => self.segments.join("."),
        }
    }

    /// Reserved kind of the last segment, if it names a key-value node
    pub fn reserved_kind(&self, aliases: &NodeAliases) -> Option<KeyValueKind> {
        match &self.entry {
            Some((kind, _)) => Some(*kind),
            None => self.segments.last().and_then(|s| aliases.kind_for(s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_and_alias_forms_agree() {
        let aliases = NodeAliases::default();
        let short = EventAddress::parse("cfg.db$host", &aliases).unwrap();
        let long = EventAddress::parse("cfg.db.properties.host", &aliases).unwrap();
        assert_eq!(short, long);
        assert_eq!(short.segments, vec!["cfg", "db", "properties"]);
        assert_eq!(short.entry, Some((KeyValueKind::Properties, "host".to_string())));
        assert_eq!(short.display_path(), "cfg.db.properties.host");
    }

    #[test]
    fn test_plain_node_address() {
        let address = EventAddress::parse("cfg.db.port", &NodeAliases::default()).unwrap();
        assert_eq!(address.segments, vec!["cfg", "db", "port"]);
        assert!(address.entry.is_none());
    }

    #[test]
    fn test_reserved_node_itself() {
        let aliases = NodeAliases::default();
        let address = EventAddress::parse("cfg.db@", &aliases).unwrap();
        assert_eq!(address.segments, vec!["cfg", "db", "attributes"]);
        assert_eq!(address.reserved_kind(&aliases), Some(KeyValueKind::Attributes));
    }

    #[test]
    fn test_rejections() {
        let aliases = NodeAliases::default();
        for bad in ["cfg.*.host", "cfg.db$host.more", "cfg.db.properties.host.more", "cfg..x"] {
            assert!(
                matches!(EventAddress::parse(bad, &aliases), Err(ConfigError::InvalidPath { .. })),
                "expected InvalidPath for {:?}",
                bad
            );
        }
    }
}

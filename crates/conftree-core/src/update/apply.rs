use super::address::EventAddress;
use super::batch::{EventType, EventValue, UpdateBatch, UpdateEvent, UpdateHeader};
use super::validate::{validate_batch, ValidatedBatch};
use crate::errors::{ConfigError, Result};
use crate::model::{
    ConfigTree, Configuration, KeyValueKind, ListKind, ModifiedBy, NodeId, NodeKind, NodeState,
    Version,
};

/// User recorded when a batch header names no owner
pub const DEFAULT_OWNER: &str = "system";

/// Result of applying a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// Events that changed the tree
    pub applied: usize,
    /// Configuration version after the batch
    pub version: Version,
}

/// Apply a batch to a loaded configuration
///
/// The batch is validated, checked against the configuration's identity and
/// version line, then applied event by event to a copy of the tree. The
/// copy replaces the live tree only when every event succeeded, so a
/// failing batch leaves the configuration untouched. A batch that changed
/// anything bumps the minor version exactly once.
///
/// # Errors
///
/// Any validation error from `validate_batch`; `BatchConsistency` when the
/// batch addresses another configuration; `IncompatibleVersion` when the
/// configuration is in a different major line; `NodeState` or
/// `Configuration` when the configuration is not loaded; and the first
/// per-event error (`NotFound`, `AlreadyExists`, `InvalidNodeKind`, ...).
pub fn apply_batch(config: &mut Configuration, batch: &UpdateBatch) -> Result<ApplyOutcome> {
    let validated = validate_batch(batch)?;
    check_target(config, &validated)?;

    let mut tree = config.tree().clone();
    let mut applied = 0;
    for event in validated.events {
        apply_event(&mut tree, validated.header, event).map_err(|e| {
            tracing::debug!(
                sequence = event.sequence,
                path = %event.path,
                error = %e,
                "event rejected, batch abandoned"
            );
            e
        })?;
        applied += 1;
    }

    let version = if applied > 0 {
        config.replace_tree(tree);
        let owner = validated
            .header
            .owner
            .clone()
            .unwrap_or_else(|| DEFAULT_OWNER.to_string());
        let version = config.bump_version(ModifiedBy::new(owner, validated.header.timestamp))?;
        if version != validated.updated_version {
            tracing::debug!(
                expected = %validated.updated_version,
                actual = %version,
                "header updated_version differs from the bumped version"
            );
        }
        version
    } else {
        config
            .version
            .ok_or_else(|| ConfigError::missing_field("version"))?
    };

    Ok(ApplyOutcome { applied, version })
}

fn check_target(config: &Configuration, validated: &ValidatedBatch<'_>) -> Result<()> {
    let header = validated.header;
    let identity = [
        ("config_name", &config.name, &header.config_name),
        ("group", &config.application_group, &header.group),
        ("application", &config.application, &header.application),
    ];
    if let Some((field, expected, actual)) = identity.into_iter().find(|(_, e, a)| e != a) {
        return Err(ConfigError::BatchConsistency {
            field: field.to_string(),
            expected: expected.clone(),
            actual: actual.clone(),
        });
    }

    if let Some(error) = config.error() {
        return Err(ConfigError::Configuration {
            message: format!("configuration '{}' holds an error: {}", config.name, error),
        });
    }
    if !matches!(config.state(), NodeState::Synced | NodeState::Updated) {
        return Err(ConfigError::NodeState {
            path: config.name.clone(),
            reason: "configuration is not loaded".to_string(),
        });
    }

    let current = config
        .version
        .ok_or_else(|| ConfigError::missing_field("version"))?;
    if !current.is_compatible(&validated.pre_version) {
        return Err(ConfigError::IncompatibleVersion {
            pre_version: current.to_string(),
            updated_version: header.pre_version.clone(),
        });
    }
    Ok(())
}

/// Where an event lands in the tree
#[derive(Debug)]
enum Located {
    /// Existing node
    Node(NodeId),
    /// Parent exists, the node does not
    Vacant { parent: NodeId, name: String },
    /// One key of a (possibly not yet created) reserved node
    Entry {
        owner: NodeId,
        kind: KeyValueKind,
        key: String,
    },
}

fn locate(tree: &ConfigTree, address: &EventAddress) -> Result<Located> {
    let not_found = || ConfigError::NotFound {
        path: address.display_path(),
    };
    let root = tree.root().ok_or_else(not_found)?;
    let (first, rest) = address.segments.split_first().ok_or_else(not_found)?;
    if tree.get(root)?.name() != first {
        return Err(not_found());
    }

    // With an entry the last segment is the reserved alias, owned by the
    // path node before it
    let walk = match &address.entry {
        Some(_) => &rest[..rest.len().saturating_sub(1)],
        None => rest,
    };

    let mut current = root;
    for (i, name) in walk.iter().enumerate() {
        match tree.child(current, name) {
            Some(child) => current = child,
            None if i + 1 == walk.len() && address.entry.is_none() => {
                return Ok(Located::Vacant {
                    parent: current,
                    name: name.clone(),
                });
            }
            None => return Err(not_found()),
        }
    }

    match &address.entry {
        Some((kind, key)) => Ok(Located::Entry {
            owner: current,
            kind: *kind,
            key: key.clone(),
        }),
        None => Ok(Located::Node(current)),
    }
}

/// Apply one event to `tree`
///
/// # Errors
///
/// `NotFound`, `AlreadyExists`, `InvalidNodeKind` or `InvalidPath`
/// depending on the event and what the tree holds.
pub fn apply_event(tree: &mut ConfigTree, header: &UpdateHeader, event: &UpdateEvent) -> Result<()> {
    let address = EventAddress::parse(&event.target_path(), tree.aliases())?;
    let located = locate(tree, &address)?;
    let path = address.display_path();

    match event.event_type {
        EventType::Add => add(tree, header, event, located, &path),
        EventType::Update => update(tree, event, located, &path),
        EventType::Delete => delete(tree, located, &path),
    }?;

    tracing::debug!(
        event_type = ?event.event_type,
        node_path = %path,
        sequence = event.sequence,
        "event applied"
    );
    Ok(())
}

fn add(
    tree: &mut ConfigTree,
    header: &UpdateHeader,
    event: &UpdateEvent,
    located: Located,
    path: &str,
) -> Result<()> {
    match located {
        Located::Node(_) => Err(ConfigError::AlreadyExists {
            path: path.to_string(),
        }),
        Located::Entry { owner, kind, key } => {
            if tree
                .reserved(owner, kind)
                .is_some_and(|kv| tree.has_key(kv, &key))
            {
                return Err(ConfigError::AlreadyExists {
                    path: path.to_string(),
                });
            }
            let value = scalar(event, path)?;
            tree.set_reserved_value(owner, kind, key, value)
        }
        Located::Vacant { parent, name } if tree.is_elements_list(parent) => {
            if let Some(value) = &event.value {
                return Err(ConfigError::InvalidNodeKind {
                    path: path.to_string(),
                    expected: "element".to_string(),
                    actual: value.label().to_string(),
                });
            }
            if tree.aliases().kind_for(&name).is_some() {
                return Err(ConfigError::InvalidNodeKind {
                    path: path.to_string(),
                    expected: "element".to_string(),
                    actual: "key-value".to_string(),
                });
            }
            let element = tree.new_path_node(&name)?;
            tree.set_description(element, event.description.clone())?;
            tree.stamp(element, header.timestamp)?;
            tree.add_element(parent, element)?;
            tree.cascade_state(element, NodeState::Synced);
            Ok(())
        }
        Located::Vacant { parent, name } => {
            let node = match &event.value {
                Some(EventValue::Scalar(value)) => tree.new_value_node(&name, value.clone())?,
                Some(EventValue::List(values)) => {
                    let list = tree.new_list_node(&name, ListKind::Values)?;
                    for value in values {
                        tree.add_value(list, value.clone())?;
                    }
                    list
                }
                None => tree.new_path_node(&name)?,
            };
            tree.set_description(node, event.description.clone())?;
            tree.stamp(node, header.timestamp)?;
            tree.add_child(parent, node)?;
            tree.cascade_state(node, NodeState::Synced);
            Ok(())
        }
    }
}

fn update(tree: &mut ConfigTree, event: &UpdateEvent, located: Located, path: &str) -> Result<()> {
    let not_found = || ConfigError::NotFound {
        path: path.to_string(),
    };
    match located {
        Located::Vacant { .. } => Err(not_found()),
        Located::Entry { owner, kind, key } => {
            let kv = tree
                .reserved(owner, kind)
                .filter(|kv| tree.has_key(*kv, &key))
                .ok_or_else(not_found)?;
            let value = scalar(event, path)?;
            tree.add_key_value(kv, key, value)
        }
        Located::Node(node) => {
            let value = event
                .value
                .as_ref()
                .ok_or_else(|| ConfigError::missing_field("value"))?;
            let kind = tree.get(node)?.kind().clone();
            match (kind, value) {
                (NodeKind::Value(_), EventValue::Scalar(v)) => tree.set_value(node, v.clone())?,
                (
                    NodeKind::List {
                        kind: ListKind::Values,
                        ..
                    },
                    EventValue::List(values),
                ) => tree.replace_values(node, values)?,
                (kind, value) => {
                    return Err(ConfigError::InvalidNodeKind {
                        path: path.to_string(),
                        expected: value.label().to_string(),
                        actual: kind.label().to_string(),
                    })
                }
            }
            if event.description.is_some() {
                tree.set_description(node, event.description.clone())?;
            }
            Ok(())
        }
    }
}

fn delete(tree: &mut ConfigTree, located: Located, path: &str) -> Result<()> {
    let not_found = || ConfigError::NotFound {
        path: path.to_string(),
    };
    match located {
        Located::Vacant { .. } => Err(not_found()),
        Located::Entry { owner, kind, key } => {
            let kv = tree.reserved(owner, kind).ok_or_else(not_found)?;
            tree.remove_key(kv, &key).map(|_| ())
        }
        Located::Node(node) => {
            let parent = tree
                .get(node)?
                .parent()
                .ok_or_else(|| ConfigError::NodeState {
                    path: path.to_string(),
                    reason: "the root node cannot be deleted".to_string(),
                })?;
            let name = tree.get(node)?.name().to_string();
            if tree.is_elements_list(parent) {
                tree.remove_element(parent, &name).map(|_| ())
            } else {
                tree.remove_child(parent, &name).map(|_| ())
            }
        }
    }
}

fn scalar<'a>(event: &'a UpdateEvent, path: &str) -> Result<&'a str> {
    match &event.value {
        Some(EventValue::Scalar(value)) => Ok(value),
        Some(other) => Err(ConfigError::InvalidNodeKind {
            path: path.to_string(),
            expected: "scalar".to_string(),
            actual: other.label().to_string(),
        }),
        None => Err(ConfigError::missing_field("value")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConfigurationHeader, TreeBuilder};

    fn loaded() -> Configuration {
        let mut b = TreeBuilder::new("cfg").unwrap();
        let root = b.root();
        let db = b.path(root, "db").unwrap();
        b.value(db, "port", "5432").unwrap();
        b.property(db, "host", "h1").unwrap();
        let mut config = b
            .header(ConfigurationHeader {
                id: "1".to_string(),
                application_group: "G".to_string(),
                application: "A".to_string(),
                name: "cfg".to_string(),
                description: "d".to_string(),
                version: Some(Version::new(1, 0)),
                created_by: Some(ModifiedBy::now("u")),
                updated_by: Some(ModifiedBy::now("u")),
                ..Default::default()
            })
            .build();
        config.loaded().unwrap();
        config
    }

    fn header() -> UpdateHeader {
        UpdateHeader {
            config_name: "cfg".to_string(),
            group: "G".to_string(),
            application: "A".to_string(),
            pre_version: "1.0".to_string(),
            updated_version: "1.1".to_string(),
            transaction_id: "tx".to_string(),
            owner: Some("bob".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_update_property_bumps_version_once() {
        let mut config = loaded();
        let h = header();
        let events = vec![
            UpdateEvent::new(&h, EventType::Update, "cfg.db$host").with_value("h2"),
            UpdateEvent::new(&h, EventType::Update, "cfg.db.port").with_value("6543"),
        ];

        let outcome = apply_batch(&mut config, &UpdateBatch::new(h, events)).unwrap();

        assert_eq!(outcome.applied, 2);
        assert_eq!(outcome.version, Version::new(1, 1));
        assert_eq!(config.find_value("cfg.db.port$host").unwrap().as_deref(), Some("h2"));
        assert_eq!(config.find_value("cfg.db.port").unwrap().as_deref(), Some("6543"));
        assert_eq!(config.updated_by.as_ref().unwrap().user, "bob");
    }

    #[test]
    fn test_add_infers_node_kind() {
        let mut config = loaded();
        let h = header();
        let events = vec![
            UpdateEvent::new(&h, EventType::Add, "cfg.db").with_name("user").with_value("admin"),
            UpdateEvent::new(&h, EventType::Add, "cfg.db")
                .with_name("replicas")
                .with_value(vec!["r1".to_string(), "r2".to_string()]),
            UpdateEvent::new(&h, EventType::Add, "cfg.db#pool").with_value("8"),
        ];
        apply_batch(&mut config, &UpdateBatch::new(h, events)).unwrap();

        assert_eq!(config.find_value("cfg.db.user").unwrap().as_deref(), Some("admin"));
        assert_eq!(config.find_value("cfg.db.replicas.1").unwrap().as_deref(), Some("r2"));
        assert_eq!(config.find_value("cfg.db#pool").unwrap().as_deref(), Some("8"));
    }

    #[test]
    fn test_add_existing_fails_and_changes_nothing() {
        let mut config = loaded();
        let h = header();
        let events = vec![
            UpdateEvent::new(&h, EventType::Update, "cfg.db.port").with_value("1"),
            UpdateEvent::new(&h, EventType::Add, "cfg.db").with_name("port").with_value("2"),
        ];
        let err = apply_batch(&mut config, &UpdateBatch::new(h, events)).unwrap_err();

        assert!(matches!(err, ConfigError::AlreadyExists { .. }));
        assert_eq!(config.find_value("cfg.db.port").unwrap().as_deref(), Some("5432"));
        assert_eq!(config.version, Some(Version::new(1, 0)));
    }

    #[test]
    fn test_update_missing_and_add_without_parent() {
        let mut config = loaded();
        let h = header();
        let update = vec![UpdateEvent::new(&h, EventType::Update, "cfg.db.nope").with_value("x")];
        assert!(matches!(
            apply_batch(&mut config, &UpdateBatch::new(h.clone(), update)),
            Err(ConfigError::NotFound { .. })
        ));

        let add = vec![UpdateEvent::new(&h, EventType::Add, "cfg.missing.deeper").with_value("x")];
        assert!(matches!(
            apply_batch(&mut config, &UpdateBatch::new(h, add)),
            Err(ConfigError::NotFound { .. })
        ));
    }

    #[test]
    fn test_delete_node_and_entry() {
        let mut config = loaded();
        let h = header();
        let port = config.find("cfg.db.port").unwrap().unwrap().as_node().unwrap();
        let events = vec![
            UpdateEvent::new(&h, EventType::Delete, "cfg.db.port"),
            UpdateEvent::new(&h, EventType::Delete, "cfg.db$host"),
        ];
        apply_batch(&mut config, &UpdateBatch::new(h, events)).unwrap();

        assert!(config.find("cfg.db.port").unwrap().is_none());
        assert!(config.find("cfg.db$host").unwrap().is_none());
        assert_eq!(config.tree().get(port).unwrap().state(), NodeState::Deleted);
    }

    #[test]
    fn test_batch_for_other_configuration_rejected() {
        let mut config = loaded();
        let mut h = header();
        h.config_name = "other".to_string();
        let err = apply_batch(&mut config, &UpdateBatch::new(h, Vec::new())).unwrap_err();
        assert!(matches!(err, ConfigError::BatchConsistency { ref field, .. } if field == "config_name"));
    }

    #[test]
    fn test_incompatible_configuration_version() {
        let mut config = loaded();
        let mut h = header();
        h.pre_version = "2.0".to_string();
        h.updated_version = "2.1".to_string();
        assert!(matches!(
            apply_batch(&mut config, &UpdateBatch::new(h, Vec::new())),
            Err(ConfigError::IncompatibleVersion { .. })
        ));
    }

    #[test]
    fn test_empty_batch_keeps_version() {
        let mut config = loaded();
        let outcome = apply_batch(&mut config, &UpdateBatch::new(header(), Vec::new())).unwrap();
        assert_eq!(outcome.applied, 0);
        assert_eq!(outcome.version, Version::new(1, 0));
    }

    #[test]
    fn test_type_mismatch_on_update() {
        let mut config = loaded();
        let h = header();
        let events = vec![UpdateEvent::new(&h, EventType::Update, "cfg.db.port")
            .with_value(vec!["1".to_string()])];
        assert!(matches!(
            apply_batch(&mut config, &UpdateBatch::new(h, events)),
            Err(ConfigError::InvalidNodeKind { .. })
        ));
    }
}

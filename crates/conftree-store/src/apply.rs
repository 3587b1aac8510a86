//! Apply update batches directly to a node store
//!
//! Every write to an existing row is a compare-and-swap against the event's
//! `preVersion`. Rows created or changed by a batch take the header's
//! `updatedVersion`, transaction id and owner. The header row moves one
//! minor version per batch that changed anything.
//!
//! The check is per row, not per configuration: a row holds the version of
//! the batch that last wrote it. One batch can therefore only modify rows
//! whose stored version equals its `preVersion`. Rows untouched since an
//! older batch and rows written by a newer one cannot be changed in the
//! same batch. Such writes come back as `StaleVersion`.
//!
//! Elements lists hold only element (path) rows. Adding a value, a values
//! list or a key-value row under one is `InvalidNodeKind`.

#![allow(clippy::result_large_err)]

use conftree_core::errors::{ConfigError, ExError};
use conftree_core::update::{validate_batch, EventAddress, ValidatedBatch, DEFAULT_OWNER};
use conftree_core::{
    EventType, EventValue, KeyValueKind, KeyValues, ModifiedBy, NodeAliases, UpdateBatch,
    UpdateEvent, UpdateHeader, Version,
};
use serde::{Deserialize, Serialize};

use crate::errors::{corrupt_payload, domain, not_found, Result};
use crate::node_store::{NodeStore, StoredKind, StoredNode};
use crate::path::{parent_key, StorePath};
use crate::publish::{entries_value, StoredHeader};

const OP: &str = "store_apply_batch";

/// What a `Delete` does to stored rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Flag the subtree deleted and keep the rows
    #[default]
    Tombstone,
    /// Remove the subtree's rows
    Hard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOptions {
    pub aliases: NodeAliases,
    /// Wrap the batch in one store transaction
    pub atomic: bool,
    pub delete_policy: DeletePolicy,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            aliases: NodeAliases::default(),
            atomic: true,
            delete_policy: DeletePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreApplyOutcome {
    pub applied: usize,
    /// Version recorded on the header row after the batch
    pub version: Version,
}

/// Apply `batch` to the configuration it names inside `store`
///
/// With `atomic` set, a failing event rolls back every earlier write of the
/// batch. Without it, events applied before the failure stay, the header
/// row is bumped for them, and the failure is returned.
///
/// # Errors
///
/// Batch validation errors, `NotFound` when the configuration or a target
/// row is missing, `IncompatibleVersion` when the stored configuration is in
/// another major line, `StaleVersion` when a row moved past the event's
/// pre-version, and `AlreadyExists`/`InvalidNodeKind` for events that do not
/// fit what is stored.
pub fn apply_batch<S: NodeStore + ?Sized>(
    store: &mut S,
    batch: &UpdateBatch,
    options: &ApplyOptions,
) -> Result<StoreApplyOutcome> {
    let validated = validate_batch(batch).map_err(|e| domain(OP, e))?;
    let header = validated.header;
    let path = StorePath::new(
        &header.group,
        &header.application,
        &header.config_name,
        validated.pre_version.major(),
    )?;

    let header_row = store
        .read(path.header_key())?
        .filter(StoredNode::is_live)
        .ok_or_else(|| not_found(OP, path.header_key()).with_config_name(&header.config_name))?;
    let stored_version: Version = header_row.version.parse().map_err(|e| domain(OP, e))?;
    if !stored_version.is_compatible(&validated.pre_version) {
        return Err(domain(
            OP,
            ConfigError::IncompatibleVersion {
                pre_version: stored_version.to_string(),
                updated_version: header.pre_version.clone(),
            },
        ));
    }
    let stored_header = StoredHeader::decode(&header_row)?;

    let target = Target {
        path: &path,
        root: &stored_header.root,
        header,
        options,
    };

    if options.atomic {
        store.begin()?;
    }
    let (applied, failure) = apply_events(store, &target, &validated);

    let result = match failure {
        Some(err) if options.atomic => Err(err),
        failure => {
            let bumped = if applied > 0 {
                bump_header(store, header_row, stored_header, stored_version, header)
            } else {
                Ok(stored_version)
            };
            match (bumped, failure) {
                (Ok(_), Some(err)) | (Err(err), _) => Err(err),
                (Ok(version), None) => Ok(StoreApplyOutcome { applied, version }),
            }
        }
    };

    if options.atomic {
        match &result {
            Ok(_) => store.commit()?,
            Err(_) => {
                if let Err(rollback) = store.rollback() {
                    tracing::warn!(error = %rollback, "rollback failed");
                }
            }
        }
    }

    result.map_err(|e| e.with_config_name(&header.config_name))
}

/// Shared per-batch context
struct Target<'a> {
    path: &'a StorePath,
    root: &'a str,
    header: &'a UpdateHeader,
    options: &'a ApplyOptions,
}

impl Target<'_> {
    fn owner(&self) -> String {
        self.header
            .owner
            .clone()
            .unwrap_or_else(|| DEFAULT_OWNER.to_string())
    }

    fn transaction_id(&self) -> Option<String> {
        Some(self.header.transaction_id.clone()).filter(|t| !t.is_empty())
    }

    /// Stamp a row as written by this batch
    fn stamp(&self, row: &mut StoredNode) {
        row.version = self.header.updated_version.clone();
        row.transaction_id = self.transaction_id();
        row.owner = Some(self.owner());
        row.updated_at = self.header.timestamp;
    }
}

fn apply_events<S: NodeStore + ?Sized>(
    store: &mut S,
    target: &Target<'_>,
    validated: &ValidatedBatch<'_>,
) -> (usize, Option<ExError>) {
    let mut applied = 0;
    for event in validated.events {
        match apply_event(store, target, event) {
            Ok(()) => applied += 1,
            Err(err) => {
                tracing::debug!(
                    sequence = event.sequence,
                    path = %event.path,
                    error = %err,
                    "stored event rejected"
                );
                return (applied, Some(err));
            }
        }
    }
    (applied, None)
}

fn apply_event<S: NodeStore + ?Sized>(
    store: &mut S,
    target: &Target<'_>,
    event: &UpdateEvent,
) -> Result<()> {
    let address = EventAddress::parse(&event.target_path(), &target.options.aliases)
        .map_err(|e| domain(OP, e))?;
    let display = address.display_path();
    let (root, names) = address
        .segments
        .split_first()
        .ok_or_else(|| not_found(OP, &display))?;
    if root != target.root {
        return Err(not_found(OP, &display));
    }
    let key = target.path.node_key(names);

    match (event.event_type, &address.entry) {
        (EventType::Add, None) => add_node(store, target, event, &address, &key),
        (EventType::Add, Some((kind, entry))) => add_entry(store, target, event, *kind, &key, entry),
        (EventType::Update, None) => update_node(store, target, event, &key),
        (EventType::Update, Some((_, entry))) => update_entry(store, target, event, &key, entry),
        (EventType::Delete, None) if names.is_empty() => Err(domain(
            OP,
            ConfigError::NodeState {
                path: display,
                reason: "the root node cannot be deleted".to_string(),
            },
        )),
        (EventType::Delete, None) => delete_node(store, target, event, &key),
        (EventType::Delete, Some((_, entry))) => delete_entry(store, target, event, &key, entry),
    }?;

    tracing::debug!(
        event_type = ?event.event_type,
        key = %key,
        sequence = event.sequence,
        "stored event applied"
    );
    Ok(())
}

fn add_node<S: NodeStore + ?Sized>(
    store: &mut S,
    target: &Target<'_>,
    event: &UpdateEvent,
    address: &EventAddress,
    key: &str,
) -> Result<()> {
    let parent = parent_key(key).ok_or_else(|| not_found(OP, key))?;
    let parent_row = live(store, parent)?;
    if !parent_row.kind.is_container() {
        return Err(domain(OP, kind_mismatch(&parent_row, "path or elements")));
    }

    let reserved = address.reserved_kind(&target.options.aliases);
    if parent_row.kind == StoredKind::Elements {
        let actual = match (&event.value, reserved) {
            (Some(value), _) => Some(value.label()),
            (None, Some(_)) => Some("key-value"),
            (None, None) => None,
        };
        if let Some(actual) = actual {
            return Err(domain(
                OP,
                ConfigError::InvalidNodeKind {
                    path: address.display_path(),
                    expected: "element".to_string(),
                    actual: actual.to_string(),
                },
            ));
        }
    }

    let (kind, value) = match (&event.value, reserved) {
        (None, Some(kind)) => (
            StoredKind::KeyValue(kind),
            entries_value(&KeyValues::new())?,
        ),
        (None, None) => (StoredKind::Path, serde_json::Value::Null),
        (Some(EventValue::Scalar(v)), _) => (StoredKind::Value, serde_json::Value::from(v.as_str())),
        (Some(EventValue::List(values)), _) => (StoredKind::Values, serde_json::Value::from(values.clone())),
    };

    let mut row = StoredNode::new(key, kind, value, "");
    target.stamp(&mut row);
    row.description = event.description.clone();
    row.seq = i64::try_from(store.children(parent)?.len()).unwrap_or(i64::MAX);
    store.create(row)
}

fn add_entry<S: NodeStore + ?Sized>(
    store: &mut S,
    target: &Target<'_>,
    event: &UpdateEvent,
    kind: KeyValueKind,
    key: &str,
    entry: &str,
) -> Result<()> {
    let value = scalar(event, key)?;
    match store.read(key)?.filter(StoredNode::is_live) {
        Some(mut row) => {
            let mut entries = entries_of(&row)?;
            if entries.contains_key(entry) {
                return Err(domain(
                    OP,
                    ConfigError::AlreadyExists {
                        path: format!("{}/{}", key, entry),
                    },
                ));
            }
            entries.insert(entry, value);
            row.value = entries_value(&entries)?;
            target.stamp(&mut row);
            store.compare_and_set(&event.pre_version, row)
        }
        None => {
            let parent = parent_key(key).ok_or_else(|| not_found(OP, key))?;
            let parent_row = live(store, parent)?;
            if !matches!(parent_row.kind, StoredKind::Header | StoredKind::Path) {
                return Err(domain(OP, kind_mismatch(&parent_row, "path")));
            }
            let mut entries = KeyValues::new();
            entries.insert(entry, value);
            let mut row = StoredNode::new(key, StoredKind::KeyValue(kind), entries_value(&entries)?, "");
            target.stamp(&mut row);
            row.seq = i64::try_from(store.children(parent)?.len()).unwrap_or(i64::MAX);
            store.create(row)
        }
    }
}

fn update_node<S: NodeStore + ?Sized>(
    store: &mut S,
    target: &Target<'_>,
    event: &UpdateEvent,
    key: &str,
) -> Result<()> {
    let mut row = live(store, key)?;
    let value = event
        .value
        .as_ref()
        .ok_or_else(|| domain(OP, ConfigError::missing_field("value")))?;
    row.value = match (row.kind, value) {
        (StoredKind::Value, EventValue::Scalar(v)) => serde_json::Value::from(v.as_str()),
        (StoredKind::Values, EventValue::List(values)) => serde_json::Value::from(values.clone()),
        (_, value) => return Err(domain(OP, kind_mismatch(&row, value.label()))),
    };
    if event.description.is_some() {
        row.description = event.description.clone();
    }
    target.stamp(&mut row);
    store.compare_and_set(&event.pre_version, row)
}

fn update_entry<S: NodeStore + ?Sized>(
    store: &mut S,
    target: &Target<'_>,
    event: &UpdateEvent,
    key: &str,
    entry: &str,
) -> Result<()> {
    let value = scalar(event, key)?;
    let mut row = live(store, key)?;
    let mut entries = entries_of(&row)?;
    if !entries.contains_key(entry) {
        return Err(not_found(OP, &format!("{}/{}", key, entry)));
    }
    entries.insert(entry, value);
    row.value = entries_value(&entries)?;
    target.stamp(&mut row);
    store.compare_and_set(&event.pre_version, row)
}

fn delete_node<S: NodeStore + ?Sized>(
    store: &mut S,
    target: &Target<'_>,
    event: &UpdateEvent,
    key: &str,
) -> Result<()> {
    let rows = match target.options.delete_policy {
        DeletePolicy::Tombstone => store.tombstone(
            key,
            &event.pre_version,
            &target.header.updated_version,
            target.transaction_id().as_deref(),
        )?,
        DeletePolicy::Hard => store.remove_subtree(key, &event.pre_version)?,
    };
    tracing::debug!(key, rows, policy = ?target.options.delete_policy, "stored subtree deleted");
    Ok(())
}

fn delete_entry<S: NodeStore + ?Sized>(
    store: &mut S,
    target: &Target<'_>,
    event: &UpdateEvent,
    key: &str,
    entry: &str,
) -> Result<()> {
    let mut row = live(store, key)?;
    let mut entries = entries_of(&row)?;
    if entries.remove(entry).is_none() {
        return Err(not_found(OP, &format!("{}/{}", key, entry)));
    }
    row.value = entries_value(&entries)?;
    target.stamp(&mut row);
    store.compare_and_set(&event.pre_version, row)
}

/// Move the header row to the next minor version
fn bump_header<S: NodeStore + ?Sized>(
    store: &mut S,
    header_row: StoredNode,
    mut stored_header: StoredHeader,
    current: Version,
    header: &UpdateHeader,
) -> Result<Version> {
    let next = current.next_minor().map_err(|e| domain(OP, e))?;
    let owner = header
        .owner
        .clone()
        .unwrap_or_else(|| DEFAULT_OWNER.to_string());
    stored_header.configuration.version = Some(next);
    stored_header.configuration.updated_by = Some(ModifiedBy::new(owner.clone(), header.timestamp));

    let expected = header_row.version.clone();
    let mut row = header_row;
    row.value = stored_header.encode()?;
    row.version = next.to_string();
    row.transaction_id = Some(header.transaction_id.clone()).filter(|t| !t.is_empty());
    row.owner = Some(owner);
    row.updated_at = header.timestamp;
    store.compare_and_set(&expected, row)?;

    if next.to_string() != header.updated_version {
        tracing::debug!(
            expected = %header.updated_version,
            actual = %next,
            "header updated_version differs from the stored version"
        );
    }
    Ok(next)
}

fn live<S: NodeStore + ?Sized>(store: &S, key: &str) -> Result<StoredNode> {
    store
        .read(key)?
        .filter(StoredNode::is_live)
        .ok_or_else(|| not_found(OP, key))
}

fn entries_of(row: &StoredNode) -> Result<KeyValues> {
    if !matches!(row.kind, StoredKind::KeyValue(_)) {
        return Err(domain(OP, kind_mismatch(row, "key-value")));
    }
    serde_json::from_value(row.value.clone()).map_err(|e| corrupt_payload(&row.key, e))
}

fn scalar<'a>(event: &'a UpdateEvent, key: &str) -> Result<&'a str> {
    match &event.value {
        Some(EventValue::Scalar(value)) => Ok(value),
        Some(other) => Err(domain(
            OP,
            ConfigError::InvalidNodeKind {
                path: key.to_string(),
                expected: "scalar".to_string(),
                actual: other.label().to_string(),
            },
        )),
        None => Err(domain(OP, ConfigError::missing_field("value"))),
    }
}

fn kind_mismatch(row: &StoredNode, expected: &str) -> ConfigError {
    ConfigError::InvalidNodeKind {
        path: row.key.clone(),
        expected: expected.to_string(),
        actual: row.kind.as_str().to_string(),
    }
}

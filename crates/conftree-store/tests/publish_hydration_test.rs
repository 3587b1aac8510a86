// Integration tests for publishing configurations and loading them back

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{published_store, sample_configuration, sample_path};
use conftree_core::{ExErrorKind, NodeAliases, NodeState, Version};
use conftree_store::{load_configuration, publish, NodeStore, SqliteNodeStore};

#[test]
fn test_publish_writes_every_live_node() {
    // Given: The sample configuration
    let config = sample_configuration();
    let mut store = SqliteNodeStore::open_in_memory().unwrap();

    // When: It is published
    let rows = publish(&mut store, &config).unwrap();

    // Then: One row per node below the root, plus the header row
    assert_eq!(rows, 13);
    assert_eq!(store.row_count().unwrap(), 13);
    let ports = store.read("G/A/cfg/1/db/ports").unwrap().unwrap();
    assert_eq!(ports.value, serde_json::json!(["5432", "5433"]));
    assert_eq!(ports.version, "1.0");
}

#[test]
fn test_publish_then_load_preserves_queries() {
    // Given: A published configuration
    let store = published_store();

    // When: It is loaded back
    let config = load_configuration(&store, &sample_path(), NodeAliases::default()).unwrap();

    // Then: Queries see the same data
    assert_eq!(config.state(), NodeState::Synced);
    assert_eq!(config.version, Some(Version::new(1, 0)));
    assert_eq!(config.name, "cfg");
    assert_eq!(config.find_value("cfg.db.host").unwrap().as_deref(), Some("db.local"));
    assert_eq!(config.find_value("cfg.db.host$host").unwrap().as_deref(), Some("h1"));
    assert_eq!(config.find_value("cfg.db$region").unwrap().as_deref(), Some("eu"));
    assert_eq!(
        config.find_value("cfg.servers.a@role").unwrap().as_deref(),
        Some("primary")
    );
    let ports = config.find("cfg.db.ports").unwrap().unwrap().as_node().unwrap();
    assert_eq!(config.tree().list_values(ports), vec!["5432", "5433"]);
    let servers = config.find("cfg.servers").unwrap().unwrap().as_node().unwrap();
    let names: Vec<&str> = config
        .tree()
        .children(servers)
        .into_iter()
        .map(|id| config.tree().get(id).unwrap().name())
        .collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[test]
fn test_publish_same_major_twice_fails() {
    // Given: A published configuration
    let mut store = published_store();

    // When: The same major line is published again
    let err = publish(&mut store, &sample_configuration()).unwrap_err();

    // Then: It is rejected and nothing is added
    assert_eq!(err.kind(), ExErrorKind::AlreadyExists);
    assert_eq!(store.row_count().unwrap(), 13);
}

#[test]
fn test_publish_incomplete_configuration_fails() {
    // Given: A configuration without an id
    let mut config = sample_configuration();
    config.id.clear();
    let mut store = SqliteNodeStore::open_in_memory().unwrap();

    // When/Then: Publishing names the missing field and writes nothing
    let err = publish(&mut store, &config).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::Configuration);
    assert!(err.message().contains("id"));
    assert_eq!(store.row_count().unwrap(), 0);
}

#[test]
fn test_store_file_survives_reopen() {
    // Given: A configuration published to a store file
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("conftree.db");
    {
        let mut store = SqliteNodeStore::open(&file).unwrap();
        publish(&mut store, &sample_configuration()).unwrap();
    }

    // When: The file is reopened
    let store = SqliteNodeStore::open(&file).unwrap();

    // Then: The configuration loads from it
    let config = load_configuration(&store, &sample_path(), NodeAliases::default()).unwrap();
    assert_eq!(config.find_value("cfg.servers.b.port").unwrap().as_deref(), Some("81"));
}

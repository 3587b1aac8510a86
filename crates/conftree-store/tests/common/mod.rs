//! Shared fixtures for store integration tests

#![allow(dead_code)]

use chrono::Utc;
use conftree_core::{
    Configuration, ConfigurationHeader, EventType, ModifiedBy, TreeBuilder, UpdateBatch,
    UpdateEvent, UpdateHeader, Version,
};
use conftree_store::{publish, SqliteNodeStore, StorePath};

/// `cfg` with a `db` section, a values list and an elements list:
///
/// ```text
/// cfg                       $region=eu
/// ├── db                    $host=h1 #pool=4
/// │   ├── host = db.local
/// │   └── ports = [5432, 5433]
/// └── servers (elements)
///     ├── a                 port=80 @role=primary
///     └── b                 port=81
/// ```
pub fn sample_configuration() -> Configuration {
    let mut b = TreeBuilder::new("cfg").unwrap();
    let root = b.root();
    b.property(root, "region", "eu").unwrap();

    let db = b.path(root, "db").unwrap();
    b.property(db, "host", "h1").unwrap();
    b.parameter(db, "pool", "4").unwrap();
    b.value(db, "host", "db.local").unwrap();
    b.values(db, "ports", ["5432", "5433"]).unwrap();

    let servers = b.elements(root, "servers").unwrap();
    let a = b.element(servers, "a").unwrap();
    b.value(a, "port", "80").unwrap();
    b.attribute(a, "role", "primary").unwrap();
    let s = b.element(servers, "b").unwrap();
    b.value(s, "port", "81").unwrap();

    let mut config = b
        .header(ConfigurationHeader {
            id: "cfg-1".to_string(),
            application_group: "G".to_string(),
            application: "A".to_string(),
            name: "cfg".to_string(),
            description: "sample".to_string(),
            version: Some(Version::new(1, 0)),
            created_by: Some(ModifiedBy::now("loader")),
            updated_by: Some(ModifiedBy::now("loader")),
            ..Default::default()
        })
        .build();
    config.loaded().unwrap();
    config
}

pub fn sample_path() -> StorePath {
    StorePath::new("G", "A", "cfg", 1).unwrap()
}

/// SQLite store holding the published sample configuration
pub fn published_store() -> SqliteNodeStore {
    let mut store = SqliteNodeStore::open_in_memory().unwrap();
    publish(&mut store, &sample_configuration()).unwrap();
    store
}

pub fn update_header(pre: &str, updated: &str) -> UpdateHeader {
    UpdateHeader {
        config_name: "cfg".to_string(),
        group: "G".to_string(),
        application: "A".to_string(),
        pre_version: pre.to_string(),
        updated_version: updated.to_string(),
        transaction_id: "tx-1".to_string(),
        timestamp: Utc::now(),
        owner: Some("operator".to_string()),
    }
}

pub fn batch(header: &UpdateHeader, events: Vec<UpdateEvent>) -> UpdateBatch {
    UpdateBatch::new(header.clone(), events)
}

pub fn event(header: &UpdateHeader, event_type: EventType, path: &str) -> UpdateEvent {
    UpdateEvent::new(header, event_type, path)
}

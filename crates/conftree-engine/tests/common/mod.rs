//! Shared fixtures for engine integration tests

#![allow(dead_code)]

use chrono::Utc;
use conftree_core::{
    Configuration, ConfigurationHeader, EventType, ModifiedBy, TreeBuilder, UpdateBatch,
    UpdateEvent, UpdateHeader, Version,
};

/// `cfg` with properties on the root and on `db`:
///
/// ```text
/// cfg               $region=eu
/// └── db            $host=h1
///     └── host = db.local
/// ```
///
/// Returned unloaded, the way a parser hands it over.
pub fn parsed_configuration() -> Configuration {
    let mut b = TreeBuilder::new("cfg").unwrap();
    let root = b.root();
    b.property(root, "region", "eu").unwrap();
    let db = b.path(root, "db").unwrap();
    b.property(db, "host", "h1").unwrap();
    b.value(db, "host", "db.local").unwrap();
    b.header(ConfigurationHeader {
        id: "cfg-1".to_string(),
        application_group: "G".to_string(),
        application: "A".to_string(),
        name: "cfg".to_string(),
        description: "engine fixture".to_string(),
        version: Some(Version::new(1, 0)),
        created_by: Some(ModifiedBy::now("loader")),
        updated_by: Some(ModifiedBy::now("loader")),
        ..Default::default()
    })
    .build()
}

pub fn update_header(pre: &str, updated: &str, transaction_id: &str) -> UpdateHeader {
    UpdateHeader {
        config_name: "cfg".to_string(),
        group: "G".to_string(),
        application: "A".to_string(),
        pre_version: pre.to_string(),
        updated_version: updated.to_string(),
        transaction_id: transaction_id.to_string(),
        timestamp: Utc::now(),
        owner: Some("operator".to_string()),
    }
}

/// Batch setting the `host` property of `cfg.db`
pub fn set_db_host(header: &UpdateHeader, host: &str) -> UpdateBatch {
    UpdateBatch::new(
        header.clone(),
        vec![UpdateEvent::new(header, EventType::Update, "cfg.db$host").with_value(host)],
    )
}

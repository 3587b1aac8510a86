use chrono::{TimeZone, Utc};
use conftree_core::{
    Configuration, ConfigurationHeader, EventType, ModifiedBy, SyncMode, TreeBuilder,
    UpdateEvent, UpdateHeader, Version,
};

/// Header fields shared by every fixture configuration
#[allow(dead_code)]
pub fn header(version: Version) -> ConfigurationHeader {
    let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    ConfigurationHeader {
        id: "cfg-0001".to_string(),
        application_group: "G".to_string(),
        application: "A".to_string(),
        name: "cfg".to_string(),
        description: "fixture configuration".to_string(),
        version: Some(version),
        created_by: Some(ModifiedBy::new("loader", at)),
        updated_by: Some(ModifiedBy::new("loader", at)),
        sync_mode: SyncMode::Events,
    }
}

/// Loaded configuration:
///
/// ```text
/// cfg                       properties {region: eu, host: global}
/// ├── db                    properties {host: h1}  parameters {pool: 4}
/// │   ├── host = "db.local"
/// │   └── ports = ["5432", "5433"]
/// └── servers (elements)
///     ├── a   port = "80"   attributes {role: primary}
///     └── b   port = "81"
/// ```
#[allow(dead_code)]
pub fn sample_configuration() -> Configuration {
    let mut b = TreeBuilder::new("cfg").unwrap();
    let root = b.root();
    b.property(root, "region", "eu").unwrap();
    b.property(root, "host", "global").unwrap();

    let db = b.path(root, "db").unwrap();
    b.property(db, "host", "h1").unwrap();
    b.parameter(db, "pool", "4").unwrap();
    b.value(db, "host", "db.local").unwrap();
    b.values(db, "ports", ["5432", "5433"]).unwrap();

    let servers = b.elements(root, "servers").unwrap();
    let a = b.element(servers, "a").unwrap();
    b.value(a, "port", "80").unwrap();
    b.attribute(a, "role", "primary").unwrap();
    let s_b = b.element(servers, "b").unwrap();
    b.value(s_b, "port", "81").unwrap();

    let mut config = b.header(header(Version::new(1, 0))).build();
    config.validate().unwrap();
    config.loaded().unwrap();
    config
}

/// Batch header addressing `sample_configuration`
#[allow(dead_code)]
pub fn update_header(pre: &str, updated: &str) -> UpdateHeader {
    UpdateHeader {
        config_name: "cfg".to_string(),
        group: "G".to_string(),
        application: "A".to_string(),
        pre_version: pre.to_string(),
        updated_version: updated.to_string(),
        transaction_id: "tx-0001".to_string(),
        timestamp: Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap(),
        owner: Some("operator".to_string()),
    }
}

#[allow(dead_code)]
pub fn event(header: &UpdateHeader, event_type: EventType, path: &str) -> UpdateEvent {
    UpdateEvent::new(header, event_type, path)
}

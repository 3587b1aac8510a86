use conftree_core::errors::{ConfigError, ExError, ExErrorKind};

#[test]
fn test_stale_version_verifiable_by_kind() {
    let err = ConfigError::StaleVersion {
        path: "G/A/cfg/1/db/host".to_string(),
        expected: "3".to_string(),
        actual: "4".to_string(),
    };

    let ex_err: ExError = err.into();

    assert_eq!(ex_err.kind(), ExErrorKind::StaleVersion);
    assert_eq!(ex_err.code(), "ERR_STALE_VERSION");
    assert_eq!(ex_err.node_path(), Some("G/A/cfg/1/db/host"));
    assert!(ex_err.message().contains("expected 3"));
}

#[test]
fn test_batch_errors_carry_validation_op() {
    let err = ConfigError::BatchConsistency {
        field: "group".to_string(),
        expected: "G".to_string(),
        actual: "H".to_string(),
    };

    let ex_err: ExError = err.into();

    assert_eq!(ex_err.kind(), ExErrorKind::BatchConsistency);
    assert_eq!(ex_err.op(), Some("validate_batch"));
    assert_eq!(ex_err.node_path(), None);
}

#[test]
fn test_missing_field_is_configuration_error() {
    let ex_err: ExError = ConfigError::missing_field("description").into();
    assert_eq!(ex_err.kind(), ExErrorKind::Configuration);
    assert!(ex_err.message().contains("'description'"));
}

#[test]
fn test_error_kind_code_mapping() {
    // Each kind has a stable, unique code
    let kinds = vec![
        (ExErrorKind::InvalidName, "ERR_INVALID_NAME"),
        (ExErrorKind::NodeState, "ERR_NODE_STATE"),
        (ExErrorKind::Configuration, "ERR_CONFIGURATION"),
        (ExErrorKind::BatchConsistency, "ERR_BATCH_CONSISTENCY"),
        (ExErrorKind::IncompatibleVersion, "ERR_INCOMPATIBLE_VERSION"),
        (ExErrorKind::AlreadyExists, "ERR_ALREADY_EXISTS"),
        (ExErrorKind::NotFound, "ERR_NOT_FOUND"),
        (ExErrorKind::StaleVersion, "ERR_STALE_VERSION"),
        (ExErrorKind::Persistence, "ERR_PERSISTENCE"),
        (ExErrorKind::ValueParse, "ERR_VALUE_PARSE"),
    ];

    let mut seen = std::collections::HashSet::new();
    for (kind, expected_code) in kinds {
        assert_eq!(kind.code(), expected_code);
        assert!(seen.insert(expected_code));
    }
}

#[test]
fn test_display_includes_context() {
    let ex_err = ExError::new(ExErrorKind::NotFound)
        .with_op("apply_batch")
        .with_config_name("cfg")
        .with_message("Node not found: cfg.db.x");

    let rendered = ex_err.to_string();
    assert!(rendered.contains("ERR_NOT_FOUND"));
    assert!(rendered.contains("apply_batch"));
    assert!(rendered.contains("cfg"));
}

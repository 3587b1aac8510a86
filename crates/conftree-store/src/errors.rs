//! Error handling for conftree-store
//!
//! Wraps conftree-core ExError with store-specific helpers

use conftree_core::errors::{ConfigError, ExError, ExErrorKind};

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Create a migration error
pub fn migration_error(migration_id: &str, reason: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("migration")
        .with_message(format!("Migration {} failed: {}", migration_id, reason))
}

/// Create a checksum mismatch error
pub fn checksum_mismatch(migration_id: &str, expected: &str, actual: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("migration_checksum")
        .with_message(format!(
            "Checksum mismatch for migration {}: expected {}, got {}",
            migration_id, expected, actual
        ))
}

/// Create a database error from rusqlite::Error
pub fn from_rusqlite(err: rusqlite::Error) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("sqlite")
        .with_message(err.to_string())
}

/// Create an error for a stored payload that no longer decodes
pub fn corrupt_payload(key: &str, err: serde_json::Error) -> ExError {
    ExError::new(ExErrorKind::Serialization)
        .with_op("decode_node")
        .with_node_path(key)
        .with_message(format!("Stored payload for {} is unreadable: {}", key, err))
}

/// Lift a domain error, recording the store operation that raised it
pub fn domain(op: &str, err: ConfigError) -> ExError {
    ExError::from(err).with_op(op)
}

pub fn not_found(op: &str, key: &str) -> ExError {
    domain(
        op,
        ConfigError::NotFound {
            path: key.to_string(),
        },
    )
}

pub fn stale_version(op: &str, key: &str, expected: &str, actual: &str) -> ExError {
    domain(
        op,
        ConfigError::StaleVersion {
            path: key.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        },
    )
}

use super::batch::{UpdateBatch, UpdateEvent, UpdateHeader};
use crate::errors::{ConfigError, Result};
use crate::model::Version;

/// A batch that passed validation, with its versions parsed
#[derive(Debug, Clone, Copy)]
pub struct ValidatedBatch<'a> {
    pub header: &'a UpdateHeader,
    pub events: &'a [UpdateEvent],
    pub pre_version: Version,
    pub updated_version: Version,
}

/// Check a batch before anything is mutated
///
/// # Errors
///
/// - `BatchConsistency` if the header is missing, a required header field
///   is empty, or an event's group, application, config name or
///   pre-version differs from the header
/// - `ValueParse` if either header version is malformed
/// - `IncompatibleVersion` if the versions are in different major lines
pub fn validate_batch(batch: &UpdateBatch) -> Result<ValidatedBatch<'_>> {
    let header = batch
        .header
        .as_ref()
        .ok_or_else(|| ConfigError::BatchConsistency {
            field: "header".to_string(),
            expected: "present".to_string(),
            actual: "missing".to_string(),
        })?;

    let required = [
        ("config_name", &header.config_name),
        ("group", &header.group),
        ("application", &header.application),
        ("pre_version", &header.pre_version),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(ConfigError::BatchConsistency {
                field: field.to_string(),
                expected: "<non-empty>".to_string(),
                actual: value.clone(),
            });
        }
    }

    for event in &batch.events {
        check_event(header, event)?;
    }

    let pre_version: Version = header.pre_version.parse()?;
    let updated_version: Version = header.updated_version.parse()?;
    if !pre_version.is_compatible(&updated_version) {
        return Err(ConfigError::IncompatibleVersion {
            pre_version: header.pre_version.clone(),
            updated_version: header.updated_version.clone(),
        });
    }

    tracing::debug!(
        config_name = %header.config_name,
        transaction_id = %header.transaction_id,
        events = batch.events.len(),
        "batch validated"
    );

    Ok(ValidatedBatch {
        header,
        events: &batch.events,
        pre_version,
        updated_version,
    })
}

fn check_event(header: &UpdateHeader, event: &UpdateEvent) -> Result<()> {
    let pairs = [
        ("group", &header.group, &event.group),
        ("application", &header.application, &event.application),
        ("config_name", &header.config_name, &event.config_name),
        ("pre_version", &header.pre_version, &event.pre_version),
    ];
    match pairs.into_iter().find(|(_, expected, actual)| expected != actual) {
        Some((field, expected, actual)) => Err(ConfigError::BatchConsistency {
            field: field.to_string(),
            expected: expected.clone(),
            actual: actual.clone(),
        }),
        None => Ok(()),
    }
}

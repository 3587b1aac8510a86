//! Canonical schema constants for structured logging and events
//!
//! These constants keep field names identical across the core, the store
//! and the engine so log pipelines can filter on them.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_REQUEST_ID: &str = "request_id";
pub const FIELD_TRACE_ID: &str = "trace_id";

// Configuration identifiers
pub const FIELD_CONFIG_NAME: &str = "config_name";
pub const FIELD_CONFIG_VERSION: &str = "config_version";
pub const FIELD_NODE_PATH: &str = "node_path";
pub const FIELD_TRANSACTION_ID: &str = "transaction_id";

// Batch sizes
pub const FIELD_EVENT_COUNT: &str = "event_count";
pub const FIELD_APPLIED_COUNT: &str = "applied_count";

// Error fields
pub const FIELD_ERR_KIND: &str = "err.kind";
pub const FIELD_ERR_CODE: &str = "err.code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_accessibility() {
        assert!(!FIELD_COMPONENT.is_empty());
        assert!(!FIELD_OP.is_empty());
        assert!(!FIELD_CONFIG_NAME.is_empty());
        assert!(!EVENT_START.is_empty());
        assert!(!EVENT_END.is_empty());
        assert!(!EVENT_END_ERROR.is_empty());
    }

    #[test]
    fn test_event_names_are_distinct() {
        assert_ne!(EVENT_START, EVENT_END);
        assert_ne!(EVENT_START, EVENT_END_ERROR);
        assert_ne!(EVENT_END, EVENT_END_ERROR);
    }

    #[test]
    fn test_error_fields_are_namespaced() {
        assert!(FIELD_ERR_KIND.starts_with("err."));
        assert!(FIELD_ERR_CODE.starts_with("err."));
    }
}

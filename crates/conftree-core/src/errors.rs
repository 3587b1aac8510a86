use conftree_core_types::{RequestId, TraceId};
use thiserror::Error;

/// Result type alias using ConfigError
pub type Result<T> = std::result::Result<T, ConfigError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code that transports and tests can match
/// on without depending on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Structural
    InvalidName,
    InvalidPath,
    InvalidNodeKind,
    IndexOutOfRange,
    NodeState,

    // Aggregate
    Configuration,

    // Update protocol
    BatchConsistency,
    IncompatibleVersion,
    AlreadyExists,
    NotFound,
    StaleVersion,
    ValueParse,

    // Integration/IO
    Io,
    Serialization,
    Persistence,
    Concurrency,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidName => "ERR_INVALID_NAME",
            ExErrorKind::InvalidPath => "ERR_INVALID_PATH",
            ExErrorKind::InvalidNodeKind => "ERR_INVALID_NODE_KIND",
            ExErrorKind::IndexOutOfRange => "ERR_INDEX_OUT_OF_RANGE",
            ExErrorKind::NodeState => "ERR_NODE_STATE",
            ExErrorKind::Configuration => "ERR_CONFIGURATION",
            ExErrorKind::BatchConsistency => "ERR_BATCH_CONSISTENCY",
            ExErrorKind::IncompatibleVersion => "ERR_INCOMPATIBLE_VERSION",
            ExErrorKind::AlreadyExists => "ERR_ALREADY_EXISTS",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::StaleVersion => "ERR_STALE_VERSION",
            ExErrorKind::ValueParse => "ERR_VALUE_PARSE",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Concurrency => "ERR_CONCURRENCY",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Carries the classification used by callers plus the context needed to
/// find the failing node: the configuration it belongs to and its path.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    config_name: Option<String>,
    node_path: Option<String>,
    request_id: Option<RequestId>,
    trace_id: Option<TraceId>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            config_name: None,
            node_path: None,
            request_id: None,
            trace_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add configuration name context
    pub fn with_config_name(mut self, name: impl Into<String>) -> Self {
        self.config_name = Some(name.into());
        self
    }

    /// Add node path context
    pub fn with_node_path(mut self, path: impl Into<String>) -> Self {
        self.node_path = Some(path.into());
        self
    }

    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    pub fn with_trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn config_name(&self) -> Option<&str> {
        self.config_name.as_deref()
    }

    pub fn node_path(&self) -> Option<&str> {
        self.node_path.as_deref()
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    pub fn trace_id(&self) -> Option<&TraceId> {
        self.trace_id.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(config_name) = &self.config_name {
            write!(f, " (config: {})", config_name)?;
        }
        if let Some(node_path) = &self.node_path {
            write!(f, " (path: {})", node_path)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Error taxonomy for tree, path and update operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    // ===== Structural Errors =====
    /// Node name contains a character reserved by the path grammar
    #[error("Invalid node name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// Path query could not be parsed
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// Operation is not defined for this node kind
    #[error("Node {path} is a {actual} node, expected {expected}")]
    InvalidNodeKind {
        path: String,
        expected: String,
        actual: String,
    },

    /// List index past the end of the list
    #[error("Index {index} out of range for list {path} of length {len}")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },

    /// Node (or a descendant) holds an error and cannot change state
    #[error("Node {path} cannot change state: {reason}")]
    NodeState { path: String, reason: String },

    // ===== Aggregate Errors =====
    /// Configuration is incomplete or in an error state
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    // ===== Update Protocol Errors =====
    /// An event disagrees with its batch header
    #[error("Batch consistency error: {field} expected '{expected}', found '{actual}'")]
    BatchConsistency {
        field: String,
        expected: String,
        actual: String,
    },

    /// Pre/updated versions are not in the same major line
    #[error("Incompatible versions: {pre_version} -> {updated_version}")]
    IncompatibleVersion {
        pre_version: String,
        updated_version: String,
    },

    /// Target path already holds data
    #[error("Node already exists: {path}")]
    AlreadyExists { path: String },

    /// Target path does not exist
    #[error("Node not found: {path}")]
    NotFound { path: String },

    /// Stored version moved on since the caller read it
    #[error("Stale version for {path}: expected {expected}, stored {actual}")]
    StaleVersion {
        path: String,
        expected: String,
        actual: String,
    },

    /// Malformed scalar (e.g. a version string)
    #[error("Cannot parse '{value}': {reason}")]
    ValueParse { value: String, reason: String },

    // ===== Generic Errors =====
    /// Backing store failure
    #[error("Persistence error: {message}")]
    Persistence { message: String },

    /// Serialization error (JSON encoding/decoding)
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl ConfigError {
    /// Shorthand for a `Configuration` error naming a missing field
    pub fn missing_field(field: &str) -> Self {
        ConfigError::Configuration {
            message: format!("missing required field '{}'", field),
        }
    }

    /// The canonical kind of this error
    pub fn kind(&self) -> ExErrorKind {
        match self {
            ConfigError::InvalidName { .. } => ExErrorKind::InvalidName,
            ConfigError::InvalidPath { .. } => ExErrorKind::InvalidPath,
            ConfigError::InvalidNodeKind { .. } => ExErrorKind::InvalidNodeKind,
            ConfigError::IndexOutOfRange { .. } => ExErrorKind::IndexOutOfRange,
            ConfigError::NodeState { .. } => ExErrorKind::NodeState,
            ConfigError::Configuration { .. } => ExErrorKind::Configuration,
            ConfigError::BatchConsistency { .. } => ExErrorKind::BatchConsistency,
            ConfigError::IncompatibleVersion { .. } => ExErrorKind::IncompatibleVersion,
            ConfigError::AlreadyExists { .. } => ExErrorKind::AlreadyExists,
            ConfigError::NotFound { .. } => ExErrorKind::NotFound,
            ConfigError::StaleVersion { .. } => ExErrorKind::StaleVersion,
            ConfigError::ValueParse { .. } => ExErrorKind::ValueParse,
            ConfigError::Persistence { .. } => ExErrorKind::Persistence,
            ConfigError::Serialization { .. } => ExErrorKind::Serialization,
        }
    }
}

/// Conversion from ConfigError to ExError
///
/// Path-carrying variants fill `node_path` so log lines and transport
/// responses can point at the failing node.
impl From<ConfigError> for ExError {
    fn from(err: ConfigError) -> Self {
        let kind = err.kind();
        let message = err.to_string();
        let base = ExError::new(kind).with_message(message);
        match err {
            ConfigError::InvalidPath { path, .. }
            | ConfigError::InvalidNodeKind { path, .. }
            | ConfigError::IndexOutOfRange { path, .. }
            | ConfigError::NodeState { path, .. }
            | ConfigError::AlreadyExists { path }
            | ConfigError::NotFound { path }
            | ConfigError::StaleVersion { path, .. } => base.with_node_path(path),
            ConfigError::BatchConsistency { .. } | ConfigError::IncompatibleVersion { .. } => {
                base.with_op("validate_batch")
            }
            ConfigError::InvalidName { .. }
            | ConfigError::Configuration { .. }
            | ConfigError::ValueParse { .. }
            | ConfigError::Persistence { .. }
            | ConfigError::Serialization { .. } => base,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Serialization {
            message: err.to_string(),
        }
    }
}

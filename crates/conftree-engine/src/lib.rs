//! conftree engine - entry points over loaded and stored configurations
//!
//! `ConfigEnv` owns the registry of loaded configurations and the settings
//! they are handled with. Its methods are the operation boundary: each one
//! logs start/end through the core logging facility and tags errors with
//! the configuration name and a request id.

pub mod env;
pub mod settings;

pub use env::ConfigEnv;
pub use settings::{EngineSettings, LoggingSettings, StoreSettings};

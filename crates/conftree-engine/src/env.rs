//! Engine context holding loaded configurations
//!
//! ## Logging Ownership
//!
//! Every public method here owns the lifecycle logging of its operation:
//! - `log_op_start!` at entry
//! - `log_op_end!` on success
//! - `log_op_error!` on failure
//!
//! The core and store layers below only use `tracing::debug!()`.
//!
//! ## Locking
//!
//! Each registered configuration sits behind its own `RwLock`. Queries take
//! it shared; applying a batch takes it exclusively for the whole batch.

#![allow(clippy::result_large_err)]

use conftree_core::errors::{ConfigError, ExError, ExErrorKind};
use conftree_core::logging_facility;
use conftree_core::update::validate_batch;
use conftree_core::{
    log_op_end, log_op_error, log_op_start, ApplyOutcome, Configuration, KeyValues,
    SearchResult, UpdateBatch,
};
use conftree_core_types::RequestContext;
use conftree_store::errors::Result;
use conftree_store::{NodeStore, SqliteNodeStore, StoreApplyOutcome, StorePath};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use crate::settings::EngineSettings;

type Slot = Arc<RwLock<Configuration>>;

/// Loaded configurations plus the settings they are handled with
#[derive(Debug, Default)]
pub struct ConfigEnv {
    settings: EngineSettings,
    configs: RwLock<HashMap<String, Slot>>,
}

impl ConfigEnv {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            configs: RwLock::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Install the subscriber for the configured logging profile
    pub fn init_logging(&self) {
        logging_facility::init(self.settings.logging.profile);
    }

    /// Registered configuration names, sorted
    ///
    /// # Errors
    ///
    /// `Concurrency` if the registry lock was poisoned.
    pub fn names(&self) -> Result<Vec<String>> {
        let configs = self.configs.read().map_err(|_| poisoned("config_names"))?;
        let mut names: Vec<String> = configs.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Validate a parsed configuration, finish loading it and make it
    /// available under its name
    ///
    /// # Errors
    ///
    /// `Configuration` for missing header fields, `NodeState` when a node
    /// holds an error, `AlreadyExists` if the name is taken.
    pub fn register(&self, config: Configuration) -> Result<()> {
        let name = config.name.clone();
        observe("config_register", &name, &RequestContext::new(), || {
            let mut config = config;
            config.validate()?;
            config.loaded()?;
            self.insert(config, false)
        })
    }

    /// Drop a configuration from the registry
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown name.
    pub fn unregister(&self, name: &str) -> Result<()> {
        let mut configs = self.configs.write().map_err(|_| poisoned("config_unregister"))?;
        configs
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| unknown("config_unregister", name))
    }

    /// Run `read` against a configuration while holding its shared lock
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown name.
    pub fn with_config<R>(&self, name: &str, read: impl FnOnce(&Configuration) -> R) -> Result<R> {
        let slot = self.slot("with_config", name)?;
        let config = slot.read().map_err(|_| poisoned("with_config"))?;
        Ok(read(&config))
    }

    /// Evaluate a path query
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown configuration, `InvalidPath` for a query
    /// that does not parse.
    pub fn find(&self, name: &str, path: &str) -> Result<Option<SearchResult>> {
        observe("config_find", name, &RequestContext::new(), || {
            Ok(self.with_config(name, |config| config.find(path))??)
        })
    }

    /// Scalar at `path`, if the query yields exactly one
    ///
    /// # Errors
    ///
    /// As for `find`.
    pub fn find_value(&self, name: &str, path: &str) -> Result<Option<String>> {
        observe("config_find_value", name, &RequestContext::new(), || {
            Ok(self.with_config(name, |config| config.find_value(path))??)
        })
    }

    /// Properties in scope at the node `path` addresses
    ///
    /// # Errors
    ///
    /// As for `find`, plus `NotFound` when the path does not address a
    /// single node.
    pub fn resolved_properties(&self, name: &str, path: &str) -> Result<KeyValues> {
        observe("config_resolved_properties", name, &RequestContext::new(), || {
            self.with_config(name, |config| -> Result<KeyValues> {
                let node = config
                    .find(path)?
                    .and_then(|found| found.as_node())
                    .ok_or_else(|| ConfigError::NotFound {
                        path: path.to_string(),
                    })?;
                Ok(config.resolved_properties(node))
            })?
        })
    }

    /// Apply an update batch to the registered configuration it names
    ///
    /// The batch's transaction id, when present, becomes the request id of
    /// the log lines and of any returned error.
    ///
    /// # Errors
    ///
    /// Any error of `conftree_core::apply_batch`, plus `NotFound` when no
    /// configuration of that name is registered.
    pub fn apply_batch(&self, batch: &UpdateBatch) -> Result<ApplyOutcome> {
        let ctx = request_context(batch);
        let name = config_name(batch);
        log_op_start!(
            "apply_batch",
            config_name = name.as_str(),
            request_id = ctx.request_id.as_str(),
            event_count = batch.events.len()
        );
        let start = Instant::now();

        let result = self
            .apply_batch_impl(&name, batch)
            .map_err(|e| annotate(e, &name, &ctx))
            .map_err(|e| {
                log_op_error!(
                    "apply_batch",
                    e.clone(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    config_name = name.as_str()
                );
                e
            })?;

        log_op_end!(
            "apply_batch",
            duration_ms = start.elapsed().as_millis() as u64,
            config_name = name.as_str(),
            applied_count = result.applied,
            config_version = %result.version
        );
        Ok(result)
    }

    fn apply_batch_impl(&self, name: &str, batch: &UpdateBatch) -> Result<ApplyOutcome> {
        validate_batch(batch)?;
        let slot = self.slot("apply_batch", name)?;
        let mut config = slot.write().map_err(|_| poisoned("apply_batch"))?;
        Ok(conftree_core::apply_batch(&mut config, batch)?)
    }

    /// Open the SQLite store named in the settings
    ///
    /// # Errors
    ///
    /// `Configuration` when no store path is configured, `Persistence` when
    /// the file cannot be opened or migrated.
    pub fn open_store(&self) -> Result<SqliteNodeStore> {
        let path = self.settings.store.path.as_ref().ok_or_else(|| {
            ExError::from(ConfigError::missing_field("store.path")).with_op("open_store")
        })?;
        SqliteNodeStore::open(path)
    }

    /// Persist a registered configuration
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown name, otherwise as for
    /// `conftree_store::publish`.
    pub fn publish<S: NodeStore + ?Sized>(&self, store: &mut S, name: &str) -> Result<usize> {
        observe("config_publish", name, &RequestContext::new(), || {
            self.with_config(name, |config| conftree_store::publish(store, config))?
        })
    }

    /// Load a stored configuration and register it, replacing any loaded
    /// configuration of the same name
    ///
    /// # Errors
    ///
    /// As for `conftree_store::load_configuration`.
    pub fn load_from_store<S: NodeStore + ?Sized>(
        &self,
        store: &S,
        path: &StorePath,
    ) -> Result<()> {
        let key = path.header_key().to_string();
        observe("config_load", &key, &RequestContext::new(), || {
            let config =
                conftree_store::load_configuration(store, path, self.settings.aliases.clone())?;
            self.insert(config, true)
        })
    }

    /// Apply an update batch directly to the persisted store
    ///
    /// Atomicity and delete policy come from the store settings.
    ///
    /// # Errors
    ///
    /// As for `conftree_store::apply_batch`.
    pub fn apply_batch_to_store<S: NodeStore + ?Sized>(
        &self,
        store: &mut S,
        batch: &UpdateBatch,
    ) -> Result<StoreApplyOutcome> {
        let ctx = request_context(batch);
        let name = config_name(batch);
        log_op_start!(
            "apply_batch_to_store",
            config_name = name.as_str(),
            request_id = ctx.request_id.as_str(),
            event_count = batch.events.len()
        );
        let start = Instant::now();

        let result = conftree_store::apply_batch(store, batch, &self.settings.apply_options())
            .map_err(|e| annotate(e, &name, &ctx))
            .map_err(|e| {
                log_op_error!(
                    "apply_batch_to_store",
                    e.clone(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    config_name = name.as_str()
                );
                e
            })?;

        log_op_end!(
            "apply_batch_to_store",
            duration_ms = start.elapsed().as_millis() as u64,
            config_name = name.as_str(),
            applied_count = result.applied,
            config_version = %result.version
        );
        Ok(result)
    }

    fn slot(&self, op: &str, name: &str) -> Result<Slot> {
        let configs = self.configs.read().map_err(|_| poisoned(op))?;
        configs.get(name).cloned().ok_or_else(|| unknown(op, name))
    }

    fn insert(&self, config: Configuration, replace: bool) -> Result<()> {
        let mut configs = self.configs.write().map_err(|_| poisoned("config_insert"))?;
        if !replace && configs.contains_key(&config.name) {
            return Err(ConfigError::AlreadyExists {
                path: config.name.clone(),
            }
            .into());
        }
        configs.insert(config.name.clone(), Arc::new(RwLock::new(config)));
        Ok(())
    }
}

/// Start/end boundary around a single-configuration operation
fn observe<T>(
    op: &'static str,
    config_name: &str,
    ctx: &RequestContext,
    run: impl FnOnce() -> Result<T>,
) -> Result<T> {
    log_op_start!(op, config_name = config_name, request_id = ctx.request_id.as_str());
    let start = Instant::now();

    match run().map_err(|e| annotate(e, config_name, ctx)) {
        Ok(value) => {
            log_op_end!(
                op,
                duration_ms = start.elapsed().as_millis() as u64,
                config_name = config_name
            );
            Ok(value)
        }
        Err(e) => {
            log_op_error!(
                op,
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64,
                config_name = config_name
            );
            Err(e)
        }
    }
}

fn annotate(err: ExError, config_name: &str, ctx: &RequestContext) -> ExError {
    let err = match err.config_name() {
        Some(_) => err,
        None if config_name.is_empty() => err,
        None => err.with_config_name(config_name),
    };
    let err = err.with_request_id(ctx.request_id.clone());
    match &ctx.trace_id {
        Some(trace_id) => err.with_trace_id(trace_id.clone()),
        None => err,
    }
}

fn request_context(batch: &UpdateBatch) -> RequestContext {
    batch
        .header
        .as_ref()
        .map(|h| RequestContext::for_transaction(&h.transaction_id))
        .unwrap_or_default()
}

fn config_name(batch: &UpdateBatch) -> String {
    batch
        .header
        .as_ref()
        .map(|h| h.config_name.clone())
        .unwrap_or_default()
}

fn unknown(op: &str, name: &str) -> ExError {
    ExError::from(ConfigError::NotFound {
        path: name.to_string(),
    })
    .with_op(op)
    .with_config_name(name)
}

fn poisoned(op: &str) -> ExError {
    ExError::new(ExErrorKind::Concurrency)
        .with_op(op)
        .with_message("configuration lock poisoned by a panicked writer")
}

#[cfg(test)]
mod tests {
    use super::*;
    use conftree_core::{ConfigurationHeader, ModifiedBy, TreeBuilder, Version};

    fn config(name: &str) -> Configuration {
        let mut b = TreeBuilder::new(name).unwrap();
        let root = b.root();
        b.value(root, "port", "80").unwrap();
        b.header(ConfigurationHeader {
            id: "1".to_string(),
            application_group: "G".to_string(),
            application: "A".to_string(),
            name: name.to_string(),
            description: "d".to_string(),
            version: Some(Version::new(1, 0)),
            created_by: Some(ModifiedBy::now("u")),
            updated_by: Some(ModifiedBy::now("u")),
            ..Default::default()
        })
        .build()
    }

    #[test]
    fn test_register_loads_and_rejects_duplicates() {
        let env = ConfigEnv::default();
        env.register(config("cfg")).unwrap();

        assert_eq!(env.names().unwrap(), vec!["cfg"]);
        let state = env.with_config("cfg", |c| c.state()).unwrap();
        assert_eq!(state, conftree_core::NodeState::Synced);

        let err = env.register(config("cfg")).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::AlreadyExists);
    }

    #[test]
    fn test_unknown_configuration() {
        let env = ConfigEnv::default();
        let err = env.find_value("nope", "nope.port").unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::NotFound);
        assert_eq!(err.config_name(), Some("nope"));
        assert!(err.request_id().is_some());
        assert!(env.unregister("nope").is_err());
    }

    #[test]
    fn test_open_store_requires_path() {
        let err = ConfigEnv::default().open_store().unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::Configuration);
    }
}

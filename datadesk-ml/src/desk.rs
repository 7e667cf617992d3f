//! The `Desk` service facade.
//!
//! A `Desk` bundles the record store, the analysis registry, the artifacts
//! directory, and the acting user. Every operation is an inherent method,
//! grouped per concern in `datasets`, `analysis::runner`, `training`,
//! `predict`, and `jobs`.

use crate::analysis::AnalysisRegistry;
use crate::error::MlError;
use datadesk_core::config::DeskConfig;
use datadesk_core::{AuditEvent, Store, TargetRef};
use serde_json::Value;
use std::path::{Path, PathBuf};

pub struct Desk {
    pub(crate) store: Store,
    pub(crate) registry: AnalysisRegistry,
    pub(crate) artifacts_dir: PathBuf,
    pub(crate) actor: Option<String>,
    pub(crate) default_queue: String,
    pub(crate) default_priority: i64,
}

impl std::fmt::Debug for Desk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Desk")
            .field("store", &self.store)
            .field("registry", &self.registry)
            .field("artifacts_dir", &self.artifacts_dir)
            .field("actor", &self.actor)
            .finish()
    }
}

impl Desk {
    pub fn new(store: Store, artifacts_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            registry: AnalysisRegistry::with_builtins(),
            artifacts_dir: artifacts_dir.into(),
            actor: None,
            default_queue: datadesk_core::jobs::DEFAULT_QUEUE.to_string(),
            default_priority: 0,
        }
    }

    /// Open the store and apply the defaults named in `config`.
    pub fn open(config: &DeskConfig, workspace: &Path) -> Result<Self, MlError> {
        config.ensure_valid()?;
        let store = Store::open(&config.database_path(workspace))?;
        let mut desk = Self::new(store, config.artifacts_dir(workspace));
        desk.actor = config.audit.default_actor.clone();
        desk.default_queue = config.jobs.default_queue.clone();
        desk.default_priority = config.jobs.default_priority;
        Ok(desk)
    }

    pub fn with_registry(mut self, registry: AnalysisRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn registry(&self) -> &AnalysisRegistry {
        &self.registry
    }

    pub fn artifacts_dir(&self) -> &Path {
        &self.artifacts_dir
    }

    pub fn actor(&self) -> Option<&str> {
        self.actor.as_deref()
    }

    pub fn default_queue(&self) -> &str {
        &self.default_queue
    }

    pub fn default_priority(&self) -> i64 {
        self.default_priority
    }

    /// Append an audit entry, attributing it to `actor` or the desk's actor.
    pub(crate) fn audit(
        &self,
        event: AuditEvent,
        actor: Option<&str>,
        target: TargetRef,
        message: &str,
        payload: Value,
    ) -> Result<(), MlError> {
        self.store
            .append_audit(event, actor.or(self.actor()), target, message, payload)?;
        Ok(())
    }
}

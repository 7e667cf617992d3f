//! Registry mapping analysis keys to handler functions.

use super::builtin;
use crate::error::MlError;
use crate::runlog::RunLog;
use datadesk_core::{Dataset, DatasetFile, Parameters, TabularFormat};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Key of the analysis used when a template names none, or names one that
/// is not registered.
pub const DEFAULT_ANALYSIS: &str = "builtin.basic_stats";

/// Everything an analysis handler gets to see.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisInput<'a> {
    pub dataset: &'a Dataset,
    /// The dataset's first readable file, if any.
    pub file: Option<(&'a DatasetFile, TabularFormat)>,
    pub parameters: &'a Parameters,
}

impl<'a> AnalysisInput<'a> {
    /// The file to analyze, or a dataset error if there is none on disk.
    pub fn require_file(&self) -> Result<(&'a Path, TabularFormat), MlError> {
        let Some((file, format)) = self.file else {
            return Err(MlError::dataset("No CSV file found in dataset"));
        };
        if !file.path.exists() {
            return Err(MlError::dataset(format!(
                "File not found: {}",
                file.path.display()
            )));
        }
        Ok((file.path.as_path(), format))
    }
}

/// Signature every analysis implements.
pub type AnalysisFn = fn(&AnalysisInput<'_>, &mut RunLog) -> Result<Value, MlError>;

/// Fixed table of analyses, populated once at start-up.
#[derive(Clone)]
pub struct AnalysisRegistry {
    handlers: BTreeMap<String, AnalysisFn>,
}

impl std::fmt::Debug for AnalysisRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisRegistry")
            .field("keys", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for AnalysisRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl AnalysisRegistry {
    /// An empty registry. [`AnalysisRegistry::default_handler`] still works.
    pub fn empty() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// A registry with the built-in analyses.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(DEFAULT_ANALYSIS, builtin::basic_stats);
        registry.register("builtin.value_counts", builtin::value_counts);
        registry.register("builtin.missing_values", builtin::missing_values);
        registry
    }

    /// Register (or replace) a handler.
    pub fn register(&mut self, key: impl Into<String>, handler: AnalysisFn) {
        self.handlers.insert(key.into(), handler);
    }

    pub fn resolve(&self, key: &str) -> Option<AnalysisFn> {
        self.handlers.get(key.trim()).copied()
    }

    /// The statistics routine used as the fallback.
    pub fn default_handler(&self) -> AnalysisFn {
        builtin::basic_stats
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn constant(_: &AnalysisInput<'_>, log: &mut RunLog) -> Result<Value, MlError> {
        log.push("constant analysis");
        Ok(json!({"answer": 42}))
    }

    #[test]
    fn test_builtins_registered() {
        let registry = AnalysisRegistry::with_builtins();
        let keys: Vec<_> = registry.keys().collect();
        assert_eq!(
            keys,
            [
                "builtin.basic_stats",
                "builtin.missing_values",
                "builtin.value_counts"
            ]
        );
        assert!(registry.resolve("builtin.value_counts").is_some());
        assert!(registry.resolve("myapp.analysis.churn").is_none());
    }

    #[test]
    fn test_register_custom_handler() {
        let mut registry = AnalysisRegistry::empty();
        assert!(registry.is_empty());
        registry.register("custom.constant", constant);
        assert_eq!(registry.len(), 1);
        assert!(registry.resolve(" custom.constant ").is_some());
    }
}

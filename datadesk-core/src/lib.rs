//! # Datadesk Core
//!
//! Core library for datadesk.
//! Provides the record types and their status lifecycles, the SQLite record
//! store, the audit trail, configuration, and atomic artifact persistence.

#[macro_use]
mod macros;

pub mod analysis;
pub mod audit;
pub mod catalog;
pub mod config;
pub mod dataset;
pub mod error;
pub mod jobs;
pub mod mlops;
pub mod persistence;
pub mod status;
pub mod store;

// Re-export commonly used types at the crate root.
pub use analysis::{
    AnalysisRun, AnalysisTemplate, NewTemplate, ParamKind, ParameterSpec, Parameters, RunStatus,
};
pub use audit::{AuditEntry, AuditEvent, AuditQuery, TargetRef};
pub use catalog::{DataField, DataSchema, DataType, NewField, SchemaDefinition, Tag, TagCategory};
pub use config::DeskConfig;
pub use dataset::{
    ColumnBound, ColumnProfile, Dataset, DatasetFile, DatasetFilter, DatasetProfile,
    DatasetStatus, NewDataset, NewDatasetFile, ProfileData, SourceType, TabularFormat,
};
pub use error::{CoreError, Result};
pub use jobs::{Job, JobFilter, JobKind, JobStatus, JobTarget};
pub use mlops::{
    Hyperparameters, MlModel, ModelVersion, ModelVersionStatus, NewModel, NewModelVersion,
    TrainingMetrics, TrainingRun, TrainingRunStatus,
};
pub use status::Lifecycle;
pub use store::Store;

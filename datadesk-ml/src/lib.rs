//! # datadesk-ml: validation, profiling, analysis, training, and jobs
//!
//! This crate provides the engines that act on records held by
//! `datadesk-core`: streaming validation and profiling of tabular files,
//! registry-based analysis dispatch, the stub training and prediction
//! pipeline, and the synchronous job dispatcher.
//!
//! Everything is reached through [`Desk`], which owns the store.

// Foundation
pub mod desk;
pub mod error;
pub mod runlog;

// Data engines
pub mod data;

// Operations
pub mod analysis;
pub mod datasets;
pub mod jobs;
pub mod predict;
pub mod training;

// Re-exports
pub use analysis::{AnalysisFn, AnalysisInput, AnalysisRegistry, DEFAULT_ANALYSIS};
pub use data::{ValidationReport, hash_file};
pub use desk::Desk;
pub use error::MlError;
pub use jobs::JobOutcome;
pub use predict::{PredictRequest, PredictResponse, Prediction, UsedModelVersion};
pub use runlog::{OutcomeStatus, RunLog, RunOutcome};
pub use training::{ModelArtifact, STUB_METRICS};

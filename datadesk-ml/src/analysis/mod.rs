//! Analysis dispatch: a registry of named analyses and the run executor.

pub mod builtin;
pub mod registry;
pub mod runner;

pub use registry::{AnalysisFn, AnalysisInput, AnalysisRegistry, DEFAULT_ANALYSIS};

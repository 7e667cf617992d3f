//! Job records: a typed target, a status lifecycle, and scheduling metadata.

use crate::error::CoreError;
use crate::status::Lifecycle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Queue used when none is given.
pub const DEFAULT_QUEUE: &str = "default";

string_enum! {
    /// Kind of work a job wraps.
    pub enum JobKind {
        AnalysisRun => "analysis_run",
        MlTraining => "ml_training",
    }
}

/// What a job executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "job_type", content = "target_id", rename_all = "snake_case")]
pub enum JobTarget {
    /// Execute the analysis run with this id.
    AnalysisRun(i64),
    /// Train the model version with this id.
    MlTraining(i64),
}

impl JobTarget {
    pub fn kind(&self) -> JobKind {
        match self {
            JobTarget::AnalysisRun(_) => JobKind::AnalysisRun,
            JobTarget::MlTraining(_) => JobKind::MlTraining,
        }
    }

    pub fn target_id(&self) -> i64 {
        match self {
            JobTarget::AnalysisRun(id) | JobTarget::MlTraining(id) => *id,
        }
    }

    /// Resolve a stored `(job_type, target_id)` pair.
    pub fn parse(job_type: &str, target_id: &str) -> Result<Self, CoreError> {
        let kind: JobKind = job_type.parse().map_err(|_| {
            CoreError::invalid_input("job_type", format!("Unknown job type: {job_type}"))
        })?;
        let id: i64 = target_id.trim().parse().map_err(|_| {
            CoreError::invalid_input("target_id", format!("'{target_id}' is not a record id"))
        })?;
        Ok(match kind {
            JobKind::AnalysisRun => JobTarget::AnalysisRun(id),
            JobKind::MlTraining => JobTarget::MlTraining(id),
        })
    }
}

string_enum! {
    /// Lifecycle of a job.
    pub enum JobStatus {
        Pending => "pending",
        Running => "running",
        Success => "success",
        Failed => "failed",
        Canceled => "canceled",
    }
}

impl Lifecycle for JobStatus {
    const ENTITY: &'static str = "job";

    fn can_transition_to(self, next: Self) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Running | Canceled) | (Running, Success | Failed | Canceled)
        )
    }

    fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Success | JobStatus::Failed | JobStatus::Canceled
        )
    }
}

/// A job as stored.
///
/// `job_type`/`target_id` are kept verbatim so that a row written by another
/// producer with an unknown type still loads; [`Job::target`] resolves it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub job_type: String,
    pub target_id: String,
    pub status: JobStatus,
    /// Higher runs first.
    pub priority: i64,
    pub queue: String,
    pub log: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn target(&self) -> Result<JobTarget, CoreError> {
        JobTarget::parse(&self.job_type, &self.target_id)
    }
}

/// Filters for listing jobs.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub queue: Option<String>,
    pub limit: Option<usize>,
}

//! Audit trail: append-only facts about notable state transitions.
//!
//! Entries are never updated or deleted. The store only exposes
//! [`crate::store::Store::append_audit`] and a newest-first listing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

string_enum! {
    /// Kind of audited event.
    pub enum AuditEvent {
        DatasetUploaded => "dataset_uploaded",
        DatasetValidated => "dataset_validated",
        DatasetProfiled => "dataset_profiled",
        DatasetArchived => "dataset_archived",
        AnalysisRun => "analysis_run",
        ModelTrained => "model_trained",
        JobExecuted => "job_executed",
        JobCanceled => "job_canceled",
    }
}

/// The record an audit entry is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target_type", content = "target_id", rename_all = "snake_case")]
pub enum TargetRef {
    Dataset(i64),
    AnalysisRun(i64),
    ModelVersion(i64),
    TrainingRun(i64),
    Job(i64),
}

impl TargetRef {
    pub fn target_type(&self) -> &'static str {
        match self {
            TargetRef::Dataset(_) => "dataset",
            TargetRef::AnalysisRun(_) => "analysis_run",
            TargetRef::ModelVersion(_) => "model_version",
            TargetRef::TrainingRun(_) => "training_run",
            TargetRef::Job(_) => "job",
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            TargetRef::Dataset(id)
            | TargetRef::AnalysisRun(id)
            | TargetRef::ModelVersion(id)
            | TargetRef::TrainingRun(id)
            | TargetRef::Job(id) => *id,
        }
    }
}

/// One stored audit fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub event_type: AuditEvent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    pub target_type: String,
    pub target_id: String,
    pub message: String,
    /// Always a JSON object.
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

/// Filters for listing the audit log.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub event_type: Option<AuditEvent>,
    pub target: Option<TargetRef>,
    pub limit: Option<usize>,
}

impl AuditQuery {
    pub fn for_target(target: TargetRef) -> Self {
        Self {
            target: Some(target),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_ref() {
        let target = TargetRef::ModelVersion(4);
        assert_eq!(target.target_type(), "model_version");
        assert_eq!(target.id(), 4);
        assert_eq!(
            serde_json::to_value(target).unwrap(),
            serde_json::json!({"target_type": "model_version", "target_id": 4})
        );
    }

    #[test]
    fn test_event_names() {
        assert_eq!(AuditEvent::DatasetUploaded.as_str(), "dataset_uploaded");
        assert_eq!(
            "job_canceled".parse::<AuditEvent>().unwrap(),
            AuditEvent::JobCanceled
        );
        assert_eq!(AuditEvent::ALL.len(), 8);
    }
}

//! Model registry records: models, versions, and training runs.

use crate::error::CoreError;
use crate::status::Lifecycle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A model definition grouped under a tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlModel {
    pub id: i64,
    pub name: String,
    pub tag_id: i64,
    pub task_type: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema_id: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewModel {
    pub name: String,
    pub tag_id: i64,
    pub task_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_schema_id: Option<i64>,
    #[serde(default)]
    pub output_schema_id: Option<i64>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl NewModel {
    pub fn new(name: impl Into<String>, tag_id: i64, task_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag_id,
            task_type: task_type.into(),
            description: String::new(),
            input_schema_id: None,
            output_schema_id: None,
            is_active: true,
        }
    }
}

string_enum! {
    /// Lifecycle of a model version.
    pub enum ModelVersionStatus {
        Training => "training",
        Ready => "ready",
        Failed => "failed",
        Deprecated => "deprecated",
    }
}

impl Lifecycle for ModelVersionStatus {
    const ENTITY: &'static str = "model version";

    fn can_transition_to(self, next: Self) -> bool {
        use ModelVersionStatus::*;
        matches!(
            (self, next),
            (Training, Ready | Failed) | (Ready, Deprecated)
        )
    }

    fn is_terminal(self) -> bool {
        matches!(
            self,
            ModelVersionStatus::Failed | ModelVersionStatus::Deprecated
        )
    }
}

/// Metrics reported by a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub loss: f64,
    pub training_time_seconds: f64,
}

/// A trained (or training) version of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVersion {
    pub id: i64,
    pub model_id: i64,
    pub version: String,
    pub status: ModelVersionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<TrainingMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trained_on_dataset_id: Option<i64>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a model version and its training run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewModelVersion {
    pub version: String,
    #[serde(default)]
    pub dataset_id: Option<i64>,
    #[serde(default)]
    pub hyperparams: Hyperparameters,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created_by: Option<String>,
}

/// Training hyperparameters: a JSON object keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hyperparameters(BTreeMap<String, Value>);

impl Hyperparameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a JSON value as hyperparameters; `null` means empty.
    pub fn from_value(value: Value) -> Result<Self, CoreError> {
        match value {
            Value::Object(map) => Ok(Self(map.into_iter().collect())),
            Value::Null => Ok(Self::new()),
            other => Err(CoreError::invalid_input(
                "hyperparams",
                format!("expected a JSON object, got {other}"),
            )),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

string_enum! {
    /// Lifecycle of a training run.
    pub enum TrainingRunStatus {
        Pending => "pending",
        Running => "running",
        Success => "success",
        Failed => "failed",
    }
}

impl Lifecycle for TrainingRunStatus {
    const ENTITY: &'static str = "training run";

    fn can_transition_to(self, next: Self) -> bool {
        use TrainingRunStatus::*;
        matches!((self, next), (Pending, Running) | (Running, Success | Failed))
    }

    fn is_terminal(self) -> bool {
        matches!(self, TrainingRunStatus::Success | TrainingRunStatus::Failed)
    }
}

/// The execution record of training one model version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRun {
    pub id: i64,
    pub model_version_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<i64>,
    pub status: TrainingRunStatus,
    pub hyperparams: Hyperparameters,
    pub log: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_version_transitions() {
        use ModelVersionStatus::*;
        assert!(Training.can_transition_to(Ready));
        assert!(Training.can_transition_to(Failed));
        assert!(Ready.can_transition_to(Deprecated));
        assert!(!Ready.can_transition_to(Training));
        assert!(!Failed.can_transition_to(Ready));
        assert!(Deprecated.is_terminal());
        assert!(!Ready.is_terminal());
    }

    #[test]
    fn test_training_run_transitions() {
        use TrainingRunStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Running.can_transition_to(Success));
        assert!(!Success.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Success));
    }

    #[test]
    fn test_hyperparameters_from_value() {
        let hp = Hyperparameters::from_value(json!({"lr": 0.01, "epochs": 5})).unwrap();
        assert_eq!(hp.get("epochs"), Some(&json!(5)));
        assert_eq!(
            serde_json::to_string(&hp).unwrap(),
            r#"{"epochs":5,"lr":0.01}"#
        );
        assert!(Hyperparameters::from_value(json!("lr=0.1")).is_err());
    }
}

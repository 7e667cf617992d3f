//! Model versions and the stub training pipeline.
//!
//! Training does not fit anything. It produces fixed metrics and a small
//! JSON artifact so the rest of the lifecycle (ready versions, prediction,
//! audit) can be exercised end to end.

use crate::desk::Desk;
use crate::error::MlError;
use crate::runlog::{RunLog, RunOutcome};
use chrono::{DateTime, Utc};
use datadesk_core::persistence::atomic_write_json;
use datadesk_core::{
    AuditEvent, Hyperparameters, Lifecycle, MlModel, ModelVersion, ModelVersionStatus, NewModel,
    NewModelVersion, TargetRef, TrainingMetrics, TrainingRun, TrainingRunStatus,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;

/// Metrics reported by every stub training run.
pub const STUB_METRICS: TrainingMetrics = TrainingMetrics {
    accuracy: 0.95,
    precision: 0.94,
    recall: 0.93,
    f1_score: 0.935,
    loss: 0.05,
    training_time_seconds: 10.5,
};

/// Contents of a written model artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub model_type: String,
    pub version: String,
    pub trained_at: DateTime<Utc>,
    pub metrics: TrainingMetrics,
}

/// File name of the artifact for model `model_id` at `version`.
///
/// Characters outside `[A-Za-z0-9._-]` become `_`, so the name never holds
/// a path separator. The model id prefix keeps names that sanitize to the
/// same stem apart.
pub fn artifact_file_name(model_id: i64, model_name: &str, version: &str) -> String {
    format!(
        "{model_id}_{}_v{}.json",
        sanitize_file_stem(model_name).to_lowercase(),
        sanitize_file_stem(version)
    )
}

fn sanitize_file_stem(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl Desk {
    pub fn create_model(&self, new: &NewModel) -> Result<MlModel, MlError> {
        Ok(self.store.create_model(new)?)
    }

    pub fn set_model_active(&self, model_id: i64, active: bool) -> Result<MlModel, MlError> {
        Ok(self.store.set_model_active(model_id, active)?)
    }

    /// Create a version in `training` together with its pending run.
    pub fn create_model_version(
        &self,
        model_id: i64,
        new: &NewModelVersion,
    ) -> Result<(ModelVersion, TrainingRun), MlError> {
        let mut new = new.clone();
        if new.created_by.is_none() {
            new.created_by = self.actor.clone();
        }
        Ok(self.store.create_model_version(model_id, &new)?)
    }

    /// Train a model version.
    ///
    /// Reuses the version's open training run, or starts a new one. A
    /// failure marks both the run and the version `failed` and is reported
    /// through the outcome.
    pub fn train_model(&self, version_id: i64) -> Result<RunOutcome, MlError> {
        let version = self.store.get_model_version(version_id)?;
        version.status.transition(ModelVersionStatus::Ready)?;
        let model = self.store.get_model(version.model_id)?;

        let run = match self.store.open_training_run(version_id)? {
            Some(run) => run,
            None => self
                .store
                .create_training_run(&version, &Hyperparameters::new(), self.actor())?,
        };
        let run = if run.status == TrainingRunStatus::Pending {
            self.store.start_training_run(run.id)?
        } else {
            run
        };

        let mut log = RunLog::new();
        log.push(format!("Starting training for model version {version_id}"));

        match self.perform_training(&model, &version, &run, &mut log) {
            Ok(artifact_path) => {
                log.push("Training completed successfully");
                self.store
                    .finish_training_run(run.id, TrainingRunStatus::Success, &log.joined())?;
                self.audit(
                    AuditEvent::ModelTrained,
                    run.created_by.as_deref(),
                    TargetRef::ModelVersion(version_id),
                    &format!(
                        "Model \"{}\" v{} trained successfully",
                        model.name, version.version
                    ),
                    json!({ "metrics": STUB_METRICS }),
                )?;
                tracing::info!(version_id, model = %model.name, "Model version ready");
                Ok(RunOutcome::success(
                    json!({
                        "training_run_id": run.id,
                        "artifact_path": artifact_path,
                        "metrics": STUB_METRICS,
                    }),
                    &log,
                ))
            }
            Err(err) => {
                log.push(format!("Error during training: {err}"));
                self.store
                    .finish_training_run(run.id, TrainingRunStatus::Failed, &log.joined())?;
                self.store
                    .set_version_status(version_id, ModelVersionStatus::Failed)?;
                tracing::warn!(version_id, error = %err, "Training failed");
                Ok(RunOutcome::failed(err.to_string(), &log))
            }
        }
    }

    fn perform_training(
        &self,
        model: &MlModel,
        version: &ModelVersion,
        run: &TrainingRun,
        log: &mut RunLog,
    ) -> Result<String, MlError> {
        log.push(format!("Model: {}", model.name));
        log.push(format!("Version: {}", version.version));
        log.push(format!(
            "Hyperparameters: {}",
            serde_json::to_string(&run.hyperparams)?
        ));
        log.push("Performing training (dummy implementation)...");

        let path: PathBuf = self
            .artifacts_dir
            .join(artifact_file_name(model.id, &model.name, &version.version));
        let artifact = ModelArtifact {
            model_type: model.task_type.clone(),
            version: version.version.clone(),
            trained_at: Utc::now(),
            metrics: STUB_METRICS,
        };
        atomic_write_json(&path, &artifact)?;
        let artifact_path = path.to_string_lossy().into_owned();
        log.push(format!("Model artifact saved to: {artifact_path}"));

        self.store
            .mark_version_ready(version.id, &artifact_path, &STUB_METRICS)?;
        Ok(artifact_path)
    }

    pub fn deprecate_version(&self, version_id: i64) -> Result<ModelVersion, MlError> {
        let version = self
            .store
            .set_version_status(version_id, ModelVersionStatus::Deprecated)?;
        tracing::info!(version_id, "Model version deprecated");
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runlog::OutcomeStatus;
    use datadesk_core::persistence::load_json;
    use datadesk_core::{AuditQuery, Store, TagCategory};
    use tempfile::TempDir;

    fn setup(artifacts: PathBuf) -> (Desk, MlModel) {
        let desk = Desk::new(Store::open_in_memory().unwrap(), artifacts).with_actor("trainer");
        let tag = desk
            .store()
            .create_tag("churn", TagCategory::MlTask, "")
            .unwrap();
        let model = desk
            .create_model(&NewModel::new("Churn Classifier", tag.id, "classification"))
            .unwrap();
        (desk, model)
    }

    fn version(desk: &Desk, model: &MlModel, v: &str) -> ModelVersion {
        let mut hyperparams = Hyperparameters::new();
        hyperparams.insert("lr", json!(0.01));
        desk.create_model_version(
            model.id,
            &NewModelVersion {
                version: v.into(),
                hyperparams,
                ..Default::default()
            },
        )
        .unwrap()
        .0
    }

    #[test]
    fn test_artifact_file_name() {
        assert_eq!(
            artifact_file_name(1, "Churn Classifier", "1.0"),
            "1_churn_classifier_v1.0.json"
        );
        assert_eq!(
            artifact_file_name(3, "../../etc/passwd", "1.0"),
            "3_.._.._etc_passwd_v1.0.json"
        );
        assert_eq!(
            artifact_file_name(3, "model", "../x\\y"),
            "3_model_v.._x_y.json"
        );
        assert_ne!(
            artifact_file_name(1, "A B", "1.0"),
            artifact_file_name(2, "a_b", "1.0")
        );
    }

    #[test]
    fn test_train_keeps_artifact_inside_dir() {
        let dir = TempDir::new().unwrap();
        let artifacts = dir.path().join("models");
        let desk = Desk::new(Store::open_in_memory().unwrap(), artifacts.clone());
        let tag = desk
            .store()
            .create_tag("escape", TagCategory::MlTask, "")
            .unwrap();
        let model = desk
            .create_model(&NewModel::new("../outside/model", tag.id, "classification"))
            .unwrap();
        let v = version(&desk, &model, "1.0");

        desk.train_model(v.id).unwrap();
        let stored = desk.store().get_model_version(v.id).unwrap();
        let path = PathBuf::from(stored.artifact_path.unwrap());
        assert_eq!(path.parent(), Some(artifacts.as_path()));
        assert!(!dir.path().join("outside").exists());
    }

    #[test]
    fn test_train_writes_artifact_and_marks_ready() {
        let dir = TempDir::new().unwrap();
        let (desk, model) = setup(dir.path().join("models"));
        let v = version(&desk, &model, "1.0");

        let outcome = desk.train_model(v.id).unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Success);
        assert!(outcome.log.iter().any(|l| l == "Hyperparameters: {\"lr\":0.01}"));

        let stored = desk.store().get_model_version(v.id).unwrap();
        assert_eq!(stored.status, ModelVersionStatus::Ready);
        assert_eq!(stored.metrics, Some(STUB_METRICS));
        let path = dir.path().join("models").join(format!("{}_churn_classifier_v1.0.json", model.id));
        assert_eq!(stored.artifact_path.as_deref(), path.to_str());

        let artifact: ModelArtifact = load_json(&path).unwrap().unwrap();
        assert_eq!(artifact.model_type, "classification");
        assert_eq!(artifact.version, "1.0");

        let audit = desk
            .store()
            .list_audit(&AuditQuery::for_target(TargetRef::ModelVersion(v.id)))
            .unwrap();
        assert_eq!(audit[0].event_type, AuditEvent::ModelTrained);
        assert_eq!(audit[0].actor.as_deref(), Some("trainer"));
        assert_eq!(
            audit[0].message,
            "Model \"Churn Classifier\" v1.0 trained successfully"
        );
    }

    #[test]
    fn test_train_reuses_pending_run() {
        let dir = TempDir::new().unwrap();
        let (desk, model) = setup(dir.path().join("models"));
        let (v, run) = desk
            .create_model_version(model.id, &NewModelVersion {
                version: "2.0".into(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(run.created_by.as_deref(), Some("trainer"));
        desk.train_model(v.id).unwrap();

        let run = desk.store().get_training_run(run.id).unwrap();
        assert_eq!(run.status, TrainingRunStatus::Success);
        assert!(run.started_at.is_some());
        assert!(run.log.starts_with("Starting training for model version"));
    }

    #[test]
    fn test_train_failure_marks_run_and_version_failed() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let (desk, model) = setup(blocker.join("models"));
        let v = version(&desk, &model, "1.0");

        let outcome = desk.train_model(v.id).unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert!(outcome.log.last().unwrap().starts_with("Error during training:"));
        let stored = desk.store().get_model_version(v.id).unwrap();
        assert_eq!(stored.status, ModelVersionStatus::Failed);
        assert_eq!(stored.artifact_path, None);

        let err = desk.train_model(v.id).unwrap_err();
        assert_eq!(err.status_code(), 409);
    }

    #[test]
    fn test_deprecate_only_ready() {
        let dir = TempDir::new().unwrap();
        let (desk, model) = setup(dir.path().join("models"));
        let v = version(&desk, &model, "1.0");
        assert_eq!(desk.deprecate_version(v.id).unwrap_err().status_code(), 409);
        desk.train_model(v.id).unwrap();
        let v = desk.deprecate_version(v.id).unwrap();
        assert_eq!(v.status, ModelVersionStatus::Deprecated);
    }
}

//! Models, model versions, and training runs.

use super::{Store, json_column, json_column_opt, to_json};
use crate::error::{CoreError, Result, map_unique};
use crate::mlops::{
    MlModel, ModelVersion, ModelVersionStatus, NewModel, NewModelVersion, TrainingMetrics,
    TrainingRun, TrainingRunStatus,
};
use crate::status::Lifecycle;
use chrono::Utc;
use rusqlite::{OptionalExtension, Row, params};

const MODEL_COLUMNS: &str = "id, name, tag_id, task_type, description, input_schema_id, output_schema_id, is_active, created_at";
const VERSION_COLUMNS: &str = "id, model_id, version, status, artifact_path, metrics, trained_on_dataset_id, description, created_at";
const RUN_COLUMNS: &str = "id, model_version_id, dataset_id, status, hyperparams, log, created_by, created_at, started_at, finished_at";

fn model_from_row(row: &Row<'_>) -> rusqlite::Result<MlModel> {
    Ok(MlModel {
        id: row.get(0)?,
        name: row.get(1)?,
        tag_id: row.get(2)?,
        task_type: row.get(3)?,
        description: row.get(4)?,
        input_schema_id: row.get(5)?,
        output_schema_id: row.get(6)?,
        is_active: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn version_from_row(row: &Row<'_>) -> rusqlite::Result<ModelVersion> {
    Ok(ModelVersion {
        id: row.get(0)?,
        model_id: row.get(1)?,
        version: row.get(2)?,
        status: row.get(3)?,
        artifact_path: row.get(4)?,
        metrics: json_column_opt(row, 5)?,
        trained_on_dataset_id: row.get(6)?,
        description: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn training_run_from_row(row: &Row<'_>) -> rusqlite::Result<TrainingRun> {
    Ok(TrainingRun {
        id: row.get(0)?,
        model_version_id: row.get(1)?,
        dataset_id: row.get(2)?,
        status: row.get(3)?,
        hyperparams: json_column(row, 4)?,
        log: row.get(5)?,
        created_by: row.get(6)?,
        created_at: row.get(7)?,
        started_at: row.get(8)?,
        finished_at: row.get(9)?,
    })
}

impl Store {
    pub fn create_model(&self, new: &NewModel) -> Result<MlModel> {
        if new.name.trim().is_empty() {
            return Err(CoreError::invalid_input("name", "must not be empty"));
        }
        self.get_tag(new.tag_id)?;
        for schema_id in [new.input_schema_id, new.output_schema_id].into_iter().flatten() {
            self.get_schema(schema_id)?;
        }
        self.conn
            .execute(
                "INSERT INTO ml_models (name, tag_id, task_type, description, input_schema_id, output_schema_id, is_active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    new.name,
                    new.tag_id,
                    new.task_type,
                    new.description,
                    new.input_schema_id,
                    new.output_schema_id,
                    new.is_active,
                    Utc::now(),
                ],
            )
            .map_err(|e| map_unique(e, "model", &new.name))?;
        self.get_model(self.conn.last_insert_rowid())
    }

    pub fn get_model(&self, id: i64) -> Result<MlModel> {
        self.conn
            .query_row(
                &format!("SELECT {MODEL_COLUMNS} FROM ml_models WHERE id = ?1"),
                [id],
                model_from_row,
            )
            .optional()?
            .ok_or_else(|| CoreError::not_found("model", id))
    }

    pub fn list_models(&self, tag_id: Option<i64>) -> Result<Vec<MlModel>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MODEL_COLUMNS} FROM ml_models WHERE (?1 IS NULL OR tag_id = ?1) ORDER BY name"
        ))?;
        let rows = stmt
            .query_map(params![tag_id], model_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn set_model_active(&self, id: i64, active: bool) -> Result<MlModel> {
        let updated = self.conn.execute(
            "UPDATE ml_models SET is_active = ?1 WHERE id = ?2",
            params![active, id],
        )?;
        if updated == 0 {
            return Err(CoreError::not_found("model", id));
        }
        self.get_model(id)
    }

    /// The active model for a tag; the most recently created one wins.
    pub fn find_active_model_for_tag(&self, tag_id: i64) -> Result<Option<MlModel>> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT {MODEL_COLUMNS} FROM ml_models WHERE tag_id = ?1 AND is_active = 1
                     ORDER BY created_at DESC, id DESC LIMIT 1"
                ),
                [tag_id],
                model_from_row,
            )
            .optional()?)
    }

    /// Create a version in `training` together with its pending training run.
    pub fn create_model_version(
        &self,
        model_id: i64,
        new: &NewModelVersion,
    ) -> Result<(ModelVersion, TrainingRun)> {
        if new.version.trim().is_empty() {
            return Err(CoreError::invalid_input("version", "must not be empty"));
        }
        let model = self.get_model(model_id)?;
        if let Some(dataset_id) = new.dataset_id {
            self.get_dataset(dataset_id)?;
        }

        let now = Utc::now();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO ml_model_versions (model_id, version, status, trained_on_dataset_id, description, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                model_id,
                new.version,
                ModelVersionStatus::Training,
                new.dataset_id,
                new.description,
                now,
            ],
        )
        .map_err(|e| map_unique(e, "model version", &format!("{}@{}", model.name, new.version)))?;
        let version_id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO ml_training_runs (model_version_id, dataset_id, status, hyperparams, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                version_id,
                new.dataset_id,
                TrainingRunStatus::Pending,
                to_json(&new.hyperparams)?,
                new.created_by,
                now,
            ],
        )?;
        let run_id = tx.last_insert_rowid();
        tx.commit()?;

        tracing::info!(
            model = %model.name,
            version = %new.version,
            version_id,
            "Model version created"
        );
        Ok((
            self.get_model_version(version_id)?,
            self.get_training_run(run_id)?,
        ))
    }

    pub fn get_model_version(&self, id: i64) -> Result<ModelVersion> {
        self.conn
            .query_row(
                &format!("SELECT {VERSION_COLUMNS} FROM ml_model_versions WHERE id = ?1"),
                [id],
                version_from_row,
            )
            .optional()?
            .ok_or_else(|| CoreError::not_found("model version", id))
    }

    pub fn list_model_versions(&self, model_id: i64) -> Result<Vec<ModelVersion>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {VERSION_COLUMNS} FROM ml_model_versions WHERE model_id = ?1
             ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt
            .query_map([model_id], version_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Most recently created `ready` version of a model.
    pub fn latest_ready_version(&self, model_id: i64) -> Result<Option<ModelVersion>> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT {VERSION_COLUMNS} FROM ml_model_versions WHERE model_id = ?1 AND status = ?2
                     ORDER BY created_at DESC, id DESC LIMIT 1"
                ),
                params![model_id, ModelVersionStatus::Ready],
                version_from_row,
            )
            .optional()?)
    }

    /// Mark a version `ready`. The artifact path must be non-empty.
    pub fn mark_version_ready(
        &self,
        id: i64,
        artifact_path: &str,
        metrics: &TrainingMetrics,
    ) -> Result<ModelVersion> {
        if artifact_path.trim().is_empty() {
            return Err(CoreError::invalid_input(
                "artifact_path",
                "a ready model version needs an artifact",
            ));
        }
        let version = self.get_model_version(id)?;
        version.status.transition(ModelVersionStatus::Ready)?;
        self.conn.execute(
            "UPDATE ml_model_versions SET status = ?1, artifact_path = ?2, metrics = ?3 WHERE id = ?4",
            params![
                ModelVersionStatus::Ready,
                artifact_path,
                to_json(metrics)?,
                id
            ],
        )?;
        self.get_model_version(id)
    }

    /// Move a version to `failed` or `deprecated`. Use
    /// [`Store::mark_version_ready`] for `ready`.
    pub fn set_version_status(&self, id: i64, next: ModelVersionStatus) -> Result<ModelVersion> {
        if next == ModelVersionStatus::Ready {
            return Err(CoreError::invalid_input(
                "status",
                "use mark_version_ready to publish a version",
            ));
        }
        let version = self.get_model_version(id)?;
        version.status.transition(next)?;
        self.conn.execute(
            "UPDATE ml_model_versions SET status = ?1 WHERE id = ?2",
            params![next, id],
        )?;
        self.get_model_version(id)
    }

    pub fn create_training_run(
        &self,
        version: &ModelVersion,
        hyperparams: &crate::mlops::Hyperparameters,
        created_by: Option<&str>,
    ) -> Result<TrainingRun> {
        self.conn.execute(
            "INSERT INTO ml_training_runs (model_version_id, dataset_id, status, hyperparams, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                version.id,
                version.trained_on_dataset_id,
                TrainingRunStatus::Pending,
                to_json(hyperparams)?,
                created_by,
                Utc::now(),
            ],
        )?;
        self.get_training_run(self.conn.last_insert_rowid())
    }

    pub fn get_training_run(&self, id: i64) -> Result<TrainingRun> {
        self.conn
            .query_row(
                &format!("SELECT {RUN_COLUMNS} FROM ml_training_runs WHERE id = ?1"),
                [id],
                training_run_from_row,
            )
            .optional()?
            .ok_or_else(|| CoreError::not_found("training run", id))
    }

    /// The newest pending or running training run of a version.
    pub fn open_training_run(&self, model_version_id: i64) -> Result<Option<TrainingRun>> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT {RUN_COLUMNS} FROM ml_training_runs
                     WHERE model_version_id = ?1 AND status IN (?2, ?3)
                     ORDER BY created_at DESC, id DESC LIMIT 1"
                ),
                params![
                    model_version_id,
                    TrainingRunStatus::Pending,
                    TrainingRunStatus::Running
                ],
                training_run_from_row,
            )
            .optional()?)
    }

    pub fn start_training_run(&self, id: i64) -> Result<TrainingRun> {
        let run = self.get_training_run(id)?;
        run.status.transition(TrainingRunStatus::Running)?;
        self.conn.execute(
            "UPDATE ml_training_runs SET status = ?1, started_at = ?2 WHERE id = ?3",
            params![TrainingRunStatus::Running, Utc::now(), id],
        )?;
        self.get_training_run(id)
    }

    pub fn finish_training_run(
        &self,
        id: i64,
        status: TrainingRunStatus,
        log: &str,
    ) -> Result<TrainingRun> {
        let run = self.get_training_run(id)?;
        run.status.transition(status)?;
        self.conn.execute(
            "UPDATE ml_training_runs SET status = ?1, log = ?2, finished_at = ?3 WHERE id = ?4",
            params![status, log, Utc::now(), id],
        )?;
        self.get_training_run(id)
    }
}

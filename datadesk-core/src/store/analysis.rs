//! Analysis templates and runs.

use super::{Store, append_line, json_column, json_column_opt, to_json};
use crate::analysis::{AnalysisRun, AnalysisTemplate, NewTemplate, Parameters, RunStatus};
use crate::error::{CoreError, Result, map_unique};
use crate::status::Lifecycle;
use chrono::Utc;
use rusqlite::{OptionalExtension, Row, params};
use serde_json::Value;

const TEMPLATE_COLUMNS: &str =
    "id, name, tag_id, description, code_identifier, parameter_schema, created_at";
const RUN_COLUMNS: &str = "id, template_id, dataset_id, status, parameters, result, log, created_by, created_at, started_at, finished_at";

fn template_from_row(row: &Row<'_>) -> rusqlite::Result<AnalysisTemplate> {
    Ok(AnalysisTemplate {
        id: row.get(0)?,
        name: row.get(1)?,
        tag_id: row.get(2)?,
        description: row.get(3)?,
        code_identifier: row.get(4)?,
        parameter_schema: json_column(row, 5)?,
        created_at: row.get(6)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<AnalysisRun> {
    Ok(AnalysisRun {
        id: row.get(0)?,
        template_id: row.get(1)?,
        dataset_id: row.get(2)?,
        status: row.get(3)?,
        parameters: json_column(row, 4)?,
        result: json_column_opt(row, 5)?,
        log: row.get(6)?,
        created_by: row.get(7)?,
        created_at: row.get(8)?,
        started_at: row.get(9)?,
        finished_at: row.get(10)?,
    })
}

impl Store {
    pub fn create_template(&self, new: &NewTemplate) -> Result<AnalysisTemplate> {
        if new.name.trim().is_empty() {
            return Err(CoreError::invalid_input("name", "must not be empty"));
        }
        if let Some(tag_id) = new.tag_id {
            self.get_tag(tag_id)?;
        }
        let code_identifier = new
            .code_identifier
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        self.conn
            .execute(
                "INSERT INTO analysis_templates (name, tag_id, description, code_identifier, parameter_schema, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    new.name,
                    new.tag_id,
                    new.description,
                    code_identifier,
                    to_json(&new.parameter_schema)?,
                    Utc::now(),
                ],
            )
            .map_err(|e| map_unique(e, "analysis template", &new.name))?;
        self.get_template(self.conn.last_insert_rowid())
    }

    pub fn get_template(&self, id: i64) -> Result<AnalysisTemplate> {
        self.conn
            .query_row(
                &format!("SELECT {TEMPLATE_COLUMNS} FROM analysis_templates WHERE id = ?1"),
                [id],
                template_from_row,
            )
            .optional()?
            .ok_or_else(|| CoreError::not_found("analysis template", id))
    }

    pub fn list_templates(&self) -> Result<Vec<AnalysisTemplate>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM analysis_templates ORDER BY name"
        ))?;
        let rows = stmt
            .query_map([], template_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Create a pending run. Parameters are checked against the template's
    /// declarations and stored with defaults filled in.
    pub fn create_analysis_run(
        &self,
        template_id: i64,
        dataset_id: i64,
        parameters: Parameters,
        created_by: Option<&str>,
    ) -> Result<AnalysisRun> {
        let template = self.get_template(template_id)?;
        self.get_dataset(dataset_id)?;
        let parameters = parameters.conform(&template.parameter_schema)?;
        self.conn.execute(
            "INSERT INTO analysis_runs (template_id, dataset_id, status, parameters, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                template_id,
                dataset_id,
                RunStatus::Pending,
                to_json(&parameters)?,
                created_by,
                Utc::now(),
            ],
        )?;
        self.get_analysis_run(self.conn.last_insert_rowid())
    }

    pub fn get_analysis_run(&self, id: i64) -> Result<AnalysisRun> {
        self.conn
            .query_row(
                &format!("SELECT {RUN_COLUMNS} FROM analysis_runs WHERE id = ?1"),
                [id],
                run_from_row,
            )
            .optional()?
            .ok_or_else(|| CoreError::not_found("analysis run", id))
    }

    pub fn list_analysis_runs(&self, dataset_id: Option<i64>) -> Result<Vec<AnalysisRun>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RUN_COLUMNS} FROM analysis_runs
             WHERE (?1 IS NULL OR dataset_id = ?1) ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt
            .query_map(params![dataset_id], run_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Move a run to a non-terminal state (`running`), stamping `started_at`.
    pub fn start_analysis_run(&self, id: i64) -> Result<AnalysisRun> {
        let run = self.get_analysis_run(id)?;
        run.status.transition(RunStatus::Running)?;
        self.conn.execute(
            "UPDATE analysis_runs SET status = ?1, started_at = ?2 WHERE id = ?3",
            params![RunStatus::Running, Utc::now(), id],
        )?;
        self.get_analysis_run(id)
    }

    /// Finish a run: set its terminal status, result, and full log.
    pub fn finish_analysis_run(
        &self,
        id: i64,
        status: RunStatus,
        result: Option<&Value>,
        log: &str,
    ) -> Result<AnalysisRun> {
        let run = self.get_analysis_run(id)?;
        run.status.transition(status)?;
        let result = result.map(to_json).transpose()?;
        self.conn.execute(
            "UPDATE analysis_runs SET status = ?1, result = ?2, log = ?3, finished_at = ?4 WHERE id = ?5",
            params![status, result, log, Utc::now(), id],
        )?;
        self.get_analysis_run(id)
    }

    /// Cancel a pending or running run. Returns `false` if it already finished.
    pub fn cancel_analysis_run(&self, id: i64, reason: &str) -> Result<bool> {
        let run = self.get_analysis_run(id)?;
        if !run.status.can_transition_to(RunStatus::Canceled) {
            return Ok(false);
        }
        self.conn.execute(
            "UPDATE analysis_runs SET status = ?1, log = ?2, finished_at = ?3 WHERE id = ?4",
            params![
                RunStatus::Canceled,
                append_line(&run.log, reason),
                Utc::now(),
                id
            ],
        )?;
        Ok(true)
    }
}

//! Executing analysis runs.

use super::registry::AnalysisInput;
use crate::data::select_tabular_file;
use crate::desk::Desk;
use crate::error::MlError;
use crate::runlog::{RunLog, RunOutcome};
use datadesk_core::{
    AnalysisRun, AnalysisTemplate, AuditEvent, NewTemplate, Parameters, RunStatus, TargetRef,
};
use serde_json::{Value, json};

impl Desk {
    pub fn create_template(&self, new: &NewTemplate) -> Result<AnalysisTemplate, MlError> {
        if let Some(key) = new.code_identifier.as_deref().map(str::trim) {
            if !key.is_empty() && self.registry.resolve(key).is_none() {
                tracing::warn!(
                    key,
                    "Template names an unregistered analysis; runs will fall back to the default"
                );
            }
        }
        Ok(self.store.create_template(new)?)
    }

    pub fn create_analysis_run(
        &self,
        template_id: i64,
        dataset_id: i64,
        parameters: Parameters,
    ) -> Result<AnalysisRun, MlError> {
        Ok(self
            .store
            .create_analysis_run(template_id, dataset_id, parameters, self.actor())?)
    }

    /// Execute a pending analysis run to completion.
    ///
    /// Only lookup and transition problems are returned as `Err`. Anything
    /// that goes wrong inside the analysis marks the run `failed` and is
    /// reported through the returned [`RunOutcome`].
    pub fn run_analysis(&self, run_id: i64) -> Result<RunOutcome, MlError> {
        let run = self.store.start_analysis_run(run_id)?;
        let mut log = RunLog::new();
        log.push(format!("Starting analysis run {run_id}"));

        match self.execute_analysis(&run, &mut log) {
            Ok((template_name, result)) => {
                self.store.finish_analysis_run(
                    run_id,
                    RunStatus::Success,
                    Some(&result),
                    &log.joined(),
                )?;
                self.audit(
                    AuditEvent::AnalysisRun,
                    run.created_by.as_deref(),
                    TargetRef::AnalysisRun(run_id),
                    &format!("Analysis \"{template_name}\" completed successfully"),
                    json!({"status": "success", "dataset_id": run.dataset_id}),
                )?;
                tracing::info!(run_id, template = %template_name, "Analysis run succeeded");
                Ok(RunOutcome::success(result, &log))
            }
            Err(err) => {
                log.push(format!("Error during analysis: {err}"));
                self.store
                    .finish_analysis_run(run_id, RunStatus::Failed, None, &log.joined())?;
                tracing::warn!(run_id, error = %err, "Analysis run failed");
                Ok(RunOutcome::failed(err.to_string(), &log))
            }
        }
    }

    fn execute_analysis(
        &self,
        run: &AnalysisRun,
        log: &mut RunLog,
    ) -> Result<(String, Value), MlError> {
        let template = self.store.get_template(run.template_id)?;
        log.push(format!("Template: {}", template.name));

        let dataset = self.store.get_dataset(run.dataset_id)?;
        let files = self.store.dataset_files(dataset.id)?;
        let input = AnalysisInput {
            dataset: &dataset,
            file: select_tabular_file(&files),
            parameters: &run.parameters,
        };

        let result = match template.code_identifier.as_deref() {
            Some(key) => match self.registry.resolve(key) {
                Some(handler) => {
                    let result = handler(&input, log)?;
                    log.push(format!("Analysis function {key} executed successfully"));
                    result
                }
                None => {
                    log.push(format!(
                        "Could not load analysis function: no analysis registered under '{key}'"
                    ));
                    self.run_default_analysis(&input, log)?
                }
            },
            None => self.run_default_analysis(&input, log)?,
        };
        Ok((template.name, result))
    }

    fn run_default_analysis(
        &self,
        input: &AnalysisInput<'_>,
        log: &mut RunLog,
    ) -> Result<Value, MlError> {
        let result = (self.registry.default_handler())(input, log)?;
        log.push("Analysis completed successfully");
        Ok(result)
    }

    /// Cancel a pending or running analysis run.
    pub fn cancel_analysis_run(&self, run_id: i64) -> Result<bool, MlError> {
        Ok(self
            .store
            .cancel_analysis_run(run_id, "Analysis run cancelled by user")?)
    }
}

//! Synchronous job dispatch.

use crate::desk::Desk;
use crate::error::MlError;
use crate::runlog::{RunLog, RunOutcome};
use datadesk_core::{AuditEvent, Job, JobStatus, JobTarget, TargetRef};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// A finished job together with what its handler reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub job: Job,
    pub outcome: RunOutcome,
}

impl Desk {
    /// Enqueue a job, falling back to the configured queue and priority.
    pub fn create_job(
        &self,
        target: JobTarget,
        priority: Option<i64>,
        queue: Option<&str>,
    ) -> Result<Job, MlError> {
        Ok(self.store.create_job(
            target,
            priority.unwrap_or(self.default_priority),
            queue.unwrap_or(&self.default_queue),
        )?)
    }

    /// Execute a pending job to completion.
    ///
    /// The handler's outcome decides between `success` and `failed`. An
    /// unknown job type, or a handler that cannot even start, fails the job.
    pub fn execute_job(&self, job_id: i64) -> Result<JobOutcome, MlError> {
        let job = self.store.get_job(job_id)?;
        let mut log = RunLog::new();
        log.push(format!("Starting job {job_id}"));
        log.push(format!("Job type: {}", job.job_type));
        log.push(format!("Target ID: {}", job.target_id));
        self.store
            .transition_job(job_id, JobStatus::Running, &log.joined())?;

        let dispatched = job
            .target()
            .map_err(MlError::from)
            .and_then(|target| self.dispatch(target));
        let outcome = match dispatched {
            Ok(outcome) => {
                log.extend(&RunLog::from_lines(&outcome.log));
                outcome
            }
            Err(err) => {
                log.push(format!("Error executing job: {err}"));
                RunOutcome::failed(err.to_string(), &RunLog::new())
            }
        };

        let status = if outcome.is_success() {
            JobStatus::Success
        } else {
            JobStatus::Failed
        };
        log.push(format!("Job completed with status: {status}"));
        let job = self.store.transition_job(job_id, status, &log.joined())?;

        self.audit(
            AuditEvent::JobExecuted,
            None,
            TargetRef::Job(job_id),
            &format!("Job {job_id} ({}) finished: {status}", job.job_type),
            json!({
                "status": status,
                "job_type": job.job_type,
                "target_id": job.target_id,
            }),
        )?;
        tracing::info!(job_id, job_type = %job.job_type, %status, "Job finished");
        Ok(JobOutcome { job, outcome })
    }

    fn dispatch(&self, target: JobTarget) -> Result<RunOutcome, MlError> {
        match target {
            JobTarget::AnalysisRun(run_id) => self.run_analysis(run_id),
            JobTarget::MlTraining(version_id) => self.train_model(version_id),
        }
    }

    /// Cancel a pending or running job. Returns `false`, changing nothing,
    /// when the job has already finished.
    pub fn cancel_job(&self, job_id: i64) -> Result<bool, MlError> {
        let job = self.store.get_job(job_id)?;
        if !matches!(job.status, JobStatus::Pending | JobStatus::Running) {
            return Ok(false);
        }
        let mut log = RunLog::from_text(&job.log);
        log.push("Job cancelled by user");
        self.store
            .transition_job(job_id, JobStatus::Canceled, &log.joined())?;
        self.audit(
            AuditEvent::JobCanceled,
            None,
            TargetRef::Job(job_id),
            &format!("Job {job_id} cancelled"),
            json!({"previous_status": job.status}),
        )?;
        Ok(true)
    }

    /// Pending jobs of `queue` (the default queue when `None`) in run order.
    pub fn pending_jobs(&self, queue: Option<&str>, limit: usize) -> Result<Vec<Job>, MlError> {
        Ok(self
            .store
            .pending_jobs(queue.unwrap_or(&self.default_queue), limit)?)
    }

    /// Execute up to `limit` pending jobs of a queue, one after another.
    pub fn run_pending(
        &self,
        queue: Option<&str>,
        limit: usize,
    ) -> Result<Vec<JobOutcome>, MlError> {
        let jobs = self.pending_jobs(queue, limit)?;
        tracing::info!(count = jobs.len(), "Draining pending jobs");
        jobs.iter().map(|job| self.execute_job(job.id)).collect()
    }
}

//! Job records.

use super::Store;
use crate::error::{CoreError, Result};
use crate::jobs::{Job, JobFilter, JobStatus, JobTarget};
use crate::status::Lifecycle;
use chrono::Utc;
use rusqlite::{OptionalExtension, Row, params};

const JOB_COLUMNS: &str = "id, job_type, target_id, status, priority, queue, log, created_at, updated_at, started_at, finished_at";

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<Job> {
    Ok(Job {
        id: row.get(0)?,
        job_type: row.get(1)?,
        target_id: row.get(2)?,
        status: row.get(3)?,
        priority: row.get(4)?,
        queue: row.get(5)?,
        log: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        started_at: row.get(9)?,
        finished_at: row.get(10)?,
    })
}

impl Store {
    /// Enqueue a pending job. The target itself is resolved at execution.
    pub fn create_job(&self, target: JobTarget, priority: i64, queue: &str) -> Result<Job> {
        if queue.trim().is_empty() {
            return Err(CoreError::invalid_input("queue", "must not be empty"));
        }
        let now = Utc::now();
        self.conn.execute(
            "INSERT INTO jobs (job_type, target_id, status, priority, queue, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                target.kind(),
                target.target_id().to_string(),
                JobStatus::Pending,
                priority,
                queue,
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::debug!(job_id = id, kind = %target.kind(), queue, priority, "Job created");
        self.get_job(id)
    }

    pub fn get_job(&self, id: i64) -> Result<Job> {
        self.conn
            .query_row(
                &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
                [id],
                job_from_row,
            )
            .optional()?
            .ok_or_else(|| CoreError::not_found("job", id))
    }

    /// Jobs newest first.
    pub fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        let limit = filter.limit.map_or(-1, |l| l as i64);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs
             WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR queue = ?2)
             ORDER BY created_at DESC, id DESC LIMIT ?3"
        ))?;
        let rows = stmt
            .query_map(params![filter.status, filter.queue, limit], job_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Pending jobs of a queue, highest priority first, then oldest first.
    pub fn pending_jobs(&self, queue: &str, limit: usize) -> Result<Vec<Job>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE queue = ?1 AND status = ?2
             ORDER BY priority DESC, created_at ASC, id ASC LIMIT ?3"
        ))?;
        let rows = stmt
            .query_map(
                params![queue, JobStatus::Pending, limit as i64],
                job_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Move a job along its lifecycle and replace its log.
    ///
    /// `started_at` is stamped on entering `running`; `finished_at` on any
    /// terminal status.
    pub fn transition_job(&self, id: i64, next: JobStatus, log: &str) -> Result<Job> {
        let job = self.get_job(id)?;
        job.status.transition(next)?;
        let now = Utc::now();
        let started_at = if next == JobStatus::Running {
            Some(now)
        } else {
            job.started_at
        };
        let finished_at = next.is_terminal().then_some(now);
        self.conn.execute(
            "UPDATE jobs SET status = ?1, log = ?2, updated_at = ?3, started_at = ?4, finished_at = ?5
             WHERE id = ?6",
            params![next, log, now, started_at, finished_at, id],
        )?;
        tracing::debug!(job_id = id, from = %job.status, to = %next, "Job status changed");
        self.get_job(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_get_job() {
        let store = Store::open_in_memory().unwrap();
        let job = store
            .create_job(JobTarget::AnalysisRun(3), 1, "default")
            .unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.job_type, "analysis_run");
        assert_eq!(job.target_id, "3");
        assert_eq!(job.target().unwrap(), JobTarget::AnalysisRun(3));
        assert!(store.create_job(JobTarget::MlTraining(1), 0, " ").is_err());
    }

    #[test]
    fn test_pending_jobs_ordering() {
        let store = Store::open_in_memory().unwrap();
        let low = store.create_job(JobTarget::AnalysisRun(1), 0, "q").unwrap();
        let high = store.create_job(JobTarget::AnalysisRun(2), 5, "q").unwrap();
        let low2 = store.create_job(JobTarget::AnalysisRun(3), 0, "q").unwrap();
        store.create_job(JobTarget::AnalysisRun(4), 9, "other").unwrap();

        let ids: Vec<_> = store
            .pending_jobs("q", 10)
            .unwrap()
            .iter()
            .map(|j| j.id)
            .collect();
        assert_eq!(ids, [high.id, low.id, low2.id]);
        assert_eq!(store.pending_jobs("q", 1).unwrap().len(), 1);
    }

    #[test]
    fn test_transition_job_stamps_times() {
        let store = Store::open_in_memory().unwrap();
        let job = store.create_job(JobTarget::MlTraining(1), 0, "default").unwrap();
        let running = store
            .transition_job(job.id, JobStatus::Running, "Job started")
            .unwrap();
        assert!(running.started_at.is_some());
        assert!(running.finished_at.is_none());

        let done = store
            .transition_job(job.id, JobStatus::Success, "Job started\nJob finished")
            .unwrap();
        assert!(done.finished_at.is_some());
        assert_eq!(done.started_at, running.started_at);

        let err = store
            .transition_job(job.id, JobStatus::Canceled, "")
            .unwrap_err();
        assert_eq!(err.status_code(), 409);
        assert!(store.pending_jobs("default", 10).unwrap().is_empty());
    }

    #[test]
    fn test_list_jobs_filters() {
        let store = Store::open_in_memory().unwrap();
        let a = store.create_job(JobTarget::MlTraining(1), 0, "default").unwrap();
        store.create_job(JobTarget::MlTraining(2), 0, "batch").unwrap();
        store.transition_job(a.id, JobStatus::Canceled, "").unwrap();

        let canceled = store
            .list_jobs(&JobFilter {
                status: Some(JobStatus::Canceled),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(canceled.len(), 1);
        let batch = store
            .list_jobs(&JobFilter {
                queue: Some("batch".into()),
                limit: Some(5),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(batch.len(), 1);
    }
}

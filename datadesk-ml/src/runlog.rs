//! Line-oriented execution logs and the outcome returned by runs and jobs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Accumulates human-readable log lines for a run.
///
/// Each line is also emitted as a `tracing` event so the operator log and
/// the stored run log tell the same story.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunLog {
    lines: Vec<String>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from an existing stored log.
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    pub fn from_lines(lines: &[String]) -> Self {
        Self {
            lines: lines.to_vec(),
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        let line = line.into();
        tracing::debug!(target: "datadesk::runlog", "{line}");
        self.lines.push(line);
    }

    pub fn extend(&mut self, other: &RunLog) {
        self.lines.extend(other.lines.iter().cloned());
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn joined(&self) -> String {
        self.lines.join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Terminal state reported by an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Failed,
}

/// What an analysis run, training run, or job hands back to its caller.
///
/// Failures inside the run are reported here rather than as an `Err`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub status: OutcomeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub log: Vec<String>,
}

impl RunOutcome {
    pub fn success(result: Value, log: &RunLog) -> Self {
        Self {
            status: OutcomeStatus::Success,
            result: Some(result),
            error: None,
            log: log.lines().to_vec(),
        }
    }

    pub fn failed(error: impl Into<String>, log: &RunLog) -> Self {
        Self {
            status: OutcomeStatus::Failed,
            result: None,
            error: Some(error.into()),
            log: log.lines().to_vec(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runlog_join_and_extend() {
        let mut log = RunLog::from_text("Job started\n");
        log.push("Executing analysis run 3");
        let mut inner = RunLog::new();
        inner.push("Analysis completed");
        log.extend(&inner);
        assert_eq!(
            log.joined(),
            "Job started\nExecuting analysis run 3\nAnalysis completed"
        );
        assert_eq!(log.lines().len(), 3);
        assert!(RunLog::from_text("").is_empty());
    }

    #[test]
    fn test_outcome_serialization() {
        let mut log = RunLog::new();
        log.push("boom");
        let outcome = RunOutcome::failed("Training error: boom", &log);
        assert!(!outcome.is_success());
        let expected = serde_json::json!({
            "status": "failed",
            "error": "Training error: boom",
            "log": ["boom"],
        });
        assert_eq!(serde_json::to_value(&outcome).unwrap(), expected);
    }
}

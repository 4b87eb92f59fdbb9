//! Execution reports for the ewok runner
//!
//! These types only exist at runtime while a pipeline is running.
//! The runner logs them and can print them as JSON; they are not persisted.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outcome of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Passed,
    Failed,
    /// Not run because an earlier main step failed
    Skipped,
}

/// Which list a step came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepPhase {
    Main,
    After,
}

/// Result of running one step
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub id: String,
    pub name: String,
    pub phase: StepPhase,
    pub status: StepStatus,
    /// Exit status reported by the shell; `None` when the step never ran
    /// or the session failed before a status arrived
    pub exit_code: Option<i32>,
    /// Lines the step printed, in order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub output: Vec<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl StepReport {
    pub fn skipped(id: impl Into<String>, name: impl Into<String>, phase: StepPhase) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            phase,
            status: StepStatus::Skipped,
            exit_code: None,
            output: Vec::new(),
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    pub fn passed(&self) -> bool {
        self.status == StepStatus::Passed
    }
}

/// Result of a whole pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub pipeline: String,
    pub target: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub steps: Vec<StepReport>,
}

impl PipelineReport {
    /// A pipeline succeeds when no step failed.
    ///
    /// Skipped steps alone never fail a run; they only appear after a failure.
    pub fn success(&self) -> bool {
        self.steps.iter().all(|s| s.status != StepStatus::Failed)
    }

    /// The first failing step, if any
    pub fn failed_step(&self) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.status == StepStatus::Failed)
    }

    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }

    /// Process exit code for the runner binary
    pub fn exit_code(&self) -> i32 {
        match self.failed_step() {
            None => 0,
            Some(step) => match step.exit_code {
                Some(code) if code != 0 => code,
                _ => 1,
            },
        }
    }
}

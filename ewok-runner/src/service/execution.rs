//! Execution service
//!
//! Handles pipeline execution including:
//! - Turning each step into a shell batch run inside the container
//! - Running main steps in order and stopping at the first failure
//! - Always running after-steps, whatever the main outcome
//!
//! This service contains the core business logic for running pipelines.

use async_trait::async_trait;
use chrono::Utc;
use ewok_core::{ResolvedPipeline, Step};
use tracing::{debug, error, info, warn};

use crate::command::CommandRunner;
use crate::execution::{PipelineReport, StepPhase, StepReport, StepStatus};

/// Service trait for executing resolved pipelines
#[async_trait]
pub trait PipelineExecutor: Send + Sync {
    /// Executes a pipeline over an attached command runner
    ///
    /// # Arguments
    /// * `runner` - Command runner over an attached session
    /// * `pipeline` - The resolved pipeline
    ///
    /// # Returns
    /// A report with one entry per step (main steps first)
    async fn execute(
        &self,
        runner: &mut CommandRunner,
        pipeline: &ResolvedPipeline,
    ) -> PipelineReport;
}

/// Standard implementation of PipelineExecutor
pub struct StandardPipelineExecutor {
    source_path: String,
}

impl StandardPipelineExecutor {
    /// Creates an executor whose steps start in `source_path`
    pub fn new(source_path: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
        }
    }

    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    /// Executes a single step
    async fn execute_step(
        &self,
        runner: &mut CommandRunner,
        step: &Step,
        phase: StepPhase,
    ) -> StepReport {
        let name = step.display_name().to_string();
        let started_at = Utc::now();
        let mut report = StepReport {
            started_at: Some(started_at),
            ..StepReport::skipped(&step.id, &name, phase)
        };

        let commands = match step_commands(step, &self.source_path) {
            Ok(commands) => commands,
            Err(message) => {
                error!("Step '{}' cannot run: {}", name, message);
                report.status = StepStatus::Failed;
                report.error = Some(message);
                report.finished_at = Some(Utc::now());
                return report;
            }
        };

        debug!("Step '{}' sends {} command(s)", name, commands.len());

        match runner.run(commands).await {
            Ok(output) => {
                for line in &output.lines {
                    info!(step = %name, "{}", line);
                }
                report.exit_code = Some(output.exit_code);
                report.status = if output.success() {
                    StepStatus::Passed
                } else {
                    StepStatus::Failed
                };
                report.output = output.lines;
            }
            Err(e) => {
                for line in &e.output {
                    info!(step = %name, "{}", line);
                }
                error!("Step '{}' aborted: {}", name, e);
                report.status = StepStatus::Failed;
                report.error = Some(e.to_string());
                report.output = e.output;
            }
        }

        report.finished_at = Some(Utc::now());
        report
    }
}

#[async_trait]
impl PipelineExecutor for StandardPipelineExecutor {
    async fn execute(
        &self,
        runner: &mut CommandRunner,
        pipeline: &ResolvedPipeline,
    ) -> PipelineReport {
        info!(
            "Starting pipeline '{}' ({} step(s), {} after-step(s))",
            pipeline.name,
            pipeline.steps.len(),
            pipeline.after_steps.len()
        );

        let started_at = Utc::now();
        let mut steps = Vec::with_capacity(pipeline.steps.len() + pipeline.after_steps.len());
        let mut failed = false;

        for (idx, step) in pipeline.steps.iter().enumerate() {
            if failed {
                steps.push(StepReport::skipped(
                    &step.id,
                    step.display_name(),
                    StepPhase::Main,
                ));
                continue;
            }

            info!(
                "Executing step {}/{}: {}",
                idx + 1,
                pipeline.steps.len(),
                step.display_name()
            );

            let report = self.execute_step(runner, step, StepPhase::Main).await;
            if report.passed() {
                info!("Step '{}' passed", report.name);
            } else {
                warn!("Step '{}' failed", report.name);
                failed = true;
            }
            steps.push(report);
        }

        for step in &pipeline.after_steps {
            info!("Executing after-step: {}", step.display_name());
            let report = self.execute_step(runner, step, StepPhase::After).await;
            if !report.passed() {
                warn!("After-step '{}' failed", report.name);
            }
            steps.push(report);
        }

        let report = PipelineReport {
            pipeline: pipeline.name.clone(),
            target: pipeline.target.clone(),
            started_at,
            finished_at: Utc::now(),
            steps,
        };

        if report.success() {
            info!("Pipeline '{}' completed successfully", pipeline.name);
        } else {
            error!("Pipeline '{}' failed", pipeline.name);
        }
        report
    }
}

/// Directory a step runs in: its `cwd` relative to the source path,
/// unless absolute
pub fn step_dir(step: &Step, source_path: &str) -> String {
    match step.cwd.as_deref().map(|c| c.trim_end_matches('/')) {
        Some(cwd) if cwd.starts_with('/') => cwd.to_string(),
        Some(cwd) if !cwd.is_empty() => format!("{}/{}", source_path, cwd),
        _ => source_path.to_string(),
    }
}

/// Shell batch for a step.
///
/// The code runs in a subshell with `set -e`, so the batch status is
/// non-zero as soon as any line fails and `cd` never leaks between steps.
pub fn step_commands(step: &Step, source_path: &str) -> Result<Vec<String>, String> {
    let code = step
        .param("code")
        .filter(|code| !code.trim().is_empty())
        .ok_or_else(|| format!("step {} has no code to run", step.id))?;

    let mut commands = vec![
        "(".to_string(),
        "set -e".to_string(),
        format!("cd {}", shell_quote(&step_dir(step, source_path))),
    ];
    commands.extend(code.lines().map(str::to_string));
    commands.push(")".to_string());
    Ok(commands)
}

/// Single-quotes a word for POSIX sh
pub fn shell_quote(word: &str) -> String {
    format!("'{}'", word.replace('\'', r"'\''"))
}

//! Ewok Runner
//!
//! Runs one pipeline inside an already running container.
//!
//! Architecture:
//! - Configuration: Load settings from the environment and the pipeline config
//! - Session: Attach to the container's shell over the host API
//! - Command: Run batches of shell lines and detect their exit status
//! - Services: Business logic (step execution, reports)
//!
//! The runner resolves the requested pipeline, attaches once, and feeds
//! each step to the same shell, stopping at the first failing main step.

mod command;
mod config;
mod execution;
mod service;
mod session;

use anyhow::{Context, Result};
use ewok_core::{Config as PipelineConfig, ResolvedPipeline};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::command::CommandRunner;
use crate::config::Config;
use crate::execution::StepStatus;
use crate::service::{PipelineExecutor, StandardPipelineExecutor};
use crate::session::{Session, SessionError};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ewok_runner=info,ewok_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Ewok Runner");

    // Load configuration
    let mut config = Config::from_env()?;
    let (path, pipeline_config) = load_pipeline_config(&config)?;
    info!("Loaded pipeline config from {}", path.display());

    config.apply_pipeline_config(&pipeline_config)?;
    config.validate()?;
    info!(
        "Loaded configuration: container_id={}, docker_host={}, pipeline={}",
        config.container_id, config.docker_host, config.pipeline
    );

    let pipeline = resolve_pipeline(&config, &pipeline_config)?;
    info!(
        "Resolved pipeline '{}' with {} step(s)",
        pipeline.name,
        pipeline.steps.len()
    );

    // Attach to the container
    let session = attach_with_retry(&config).await?;

    let mut runner = CommandRunner::new(session, config.timeouts());
    let executor = StandardPipelineExecutor::new(config.source_path(pipeline.base_path.as_deref()));
    info!("Steps run from {}", executor.source_path());

    let report = executor.execute(&mut runner, &pipeline).await;
    runner.close();

    debug!("Report: {}", serde_json::to_string(&report)?);
    info!(
        "Passed: {}, failed: {}, skipped: {}",
        report.count(StepStatus::Passed),
        report.count(StepStatus::Failed),
        report.count(StepStatus::Skipped)
    );

    if let Some(step) = report.failed_step() {
        error!("Pipeline failed at step '{}'", step.name);
        anyhow::bail!(
            "pipeline '{}' failed at step '{}' (exit code {})",
            report.pipeline,
            step.name,
            report.exit_code()
        );
    }

    Ok(())
}

/// Reads the configured pipeline file, or discovers one in the project dir
fn load_pipeline_config(config: &Config) -> Result<(PathBuf, PipelineConfig)> {
    match &config.config_file {
        Some(path) => {
            let pipeline_config = ewok_core::read_config(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            Ok((path.clone(), pipeline_config))
        }
        None => ewok_core::load_config(&config.search_dirs())
            .context("Failed to load pipeline config"),
    }
}

/// Picks the steps to run, honoring deploy target and checkpoint
fn resolve_pipeline(config: &Config, pipeline_config: &PipelineConfig) -> Result<ResolvedPipeline> {
    let mut pipeline = ewok_core::resolve(
        pipeline_config,
        &config.pipeline,
        config.deploy_target.as_deref(),
    )?;

    if let Some(checkpoint) = &config.checkpoint {
        let before = pipeline.steps.len();
        pipeline = pipeline.skip_to_checkpoint(checkpoint)?;
        info!(
            "Resuming after checkpoint '{}', skipped {} step(s)",
            checkpoint,
            before - pipeline.steps.len()
        );
    }

    Ok(pipeline)
}

/// Attach with retry logic and exponential backoff
///
/// The container's API endpoint may not accept connections yet when the
/// runner starts (common right after the container is created).
async fn attach_with_retry(config: &Config) -> Result<Session> {
    const MAX_RETRIES: u32 = 5;
    const INITIAL_DELAY_MS: u64 = 500;
    const MAX_DELAY_MS: u64 = 8_000;

    let mut attempt = 0;
    let mut delay_ms = INITIAL_DELAY_MS;

    loop {
        attempt += 1;

        let mut session = Session::new(&config.docker_host, &config.container_id)?;
        match session.attach().await {
            Ok(()) => {
                if attempt > 1 {
                    info!("Attached after {} attempt(s)", attempt);
                }
                return Ok(session);
            }
            Err(e @ SessionError::Attach { .. }) if attempt < MAX_RETRIES => {
                warn!(
                    "Failed to attach to container (attempt {}/{}): {}",
                    attempt, MAX_RETRIES, e
                );
                warn!("Retrying in {} ms...", delay_ms);

                tokio::time::sleep(Duration::from_millis(delay_ms)).await;

                // Exponential backoff with cap
                delay_ms = (delay_ms * 2).min(MAX_DELAY_MS);
            }
            Err(e) => {
                error!("Failed to attach to container after {} attempt(s)", attempt);
                return Err(e).context("Failed to attach to container");
            }
        }
    }
}

//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod check;
mod pipeline;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Parse the pipeline config and report problems
    Check,
    /// List pipelines with their deploy targets
    Pipelines,
    /// Show the ordered steps a pipeline would run
    Steps {
        /// Pipeline name (e.g., build, deploy)
        pipeline: String,

        /// Deploy target selecting an alternate step list
        #[arg(short, long, env = "EWOK_DEPLOY_TARGET")]
        target: Option<String>,

        /// Start after the step carrying this checkpoint
        #[arg(short, long, env = "EWOK_CHECKPOINT")]
        checkpoint: Option<String>,

        /// Print the resolved pipeline as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Check => check::handle_check_command(config),
        Commands::Pipelines => pipeline::list_pipelines(config),
        Commands::Steps {
            pipeline,
            target,
            checkpoint,
            json,
        } => pipeline::show_steps(
            config,
            &pipeline,
            target.as_deref(),
            checkpoint.as_deref(),
            json,
        ),
    }
}

//! Ewok CLI
//!
//! Command-line interface for inspecting Ewok pipeline configs.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ewok")]
#[command(about = "Ewok pipeline config CLI", long_about = None)]
struct Cli {
    /// Pipeline config file (discovered in the project dir when unset)
    #[arg(short, long, global = true, env = "EWOK_YML_FILE")]
    file: Option<PathBuf>,

    /// Directory searched for the pipeline config
    #[arg(long, global = true, env = "EWOK_PROJECT_DIR", default_value = ".")]
    project_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ewok_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = Config {
        file: cli.file,
        project_dir: cli.project_dir,
    };

    handle_command(cli.command, &config)
}

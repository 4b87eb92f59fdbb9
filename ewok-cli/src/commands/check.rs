//! Config check command

use anyhow::Result;
use colored::*;

use crate::config::Config;

/// Parses the config and prints a short verdict
pub fn handle_check_command(config: &Config) -> Result<()> {
    let (path, pipeline_config) = match config.load() {
        Ok(loaded) => loaded,
        Err(e) => {
            println!("{}", "✗ Invalid pipeline config".red().bold());
            return Err(e);
        }
    };

    println!("{}", "✓ Pipeline config is valid".green().bold());
    println!("  File:      {}", path.display().to_string().cyan());
    if let Some(box_config) = &pipeline_config.box_config {
        println!("  Box:       {}", box_config.id.bold());
    }
    if !pipeline_config.services.is_empty() {
        let services: Vec<&str> = pipeline_config
            .services
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        println!("  Services:  {}", services.join(", ").dimmed());
    }
    let names: Vec<&str> = pipeline_config.pipeline_names().collect();
    println!("  Pipelines: {}", names.join(", "));

    Ok(())
}

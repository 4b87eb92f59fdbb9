//! Pipeline command handlers
//!
//! Handles listing pipelines and showing the steps a run would execute.

use anyhow::Result;
use colored::*;
use ewok_core::{Pipeline, ResolvedPipeline, Step};

use crate::config::Config;

/// List all pipelines in the config
pub fn list_pipelines(config: &Config) -> Result<()> {
    let (_, pipeline_config) = config.load()?;

    if pipeline_config.pipelines.is_empty() {
        println!("{}", "No pipelines found.".yellow());
        return Ok(());
    }

    println!(
        "{}",
        format!("Found {} pipeline(s):", pipeline_config.pipelines.len()).bold()
    );
    println!();
    for (name, pipeline) in &pipeline_config.pipelines {
        print_pipeline_summary(name, pipeline);
    }

    Ok(())
}

/// Resolve a pipeline and print its ordered steps
pub fn show_steps(
    config: &Config,
    name: &str,
    target: Option<&str>,
    checkpoint: Option<&str>,
    json: bool,
) -> Result<()> {
    let (_, pipeline_config) = config.load()?;

    let mut pipeline = ewok_core::resolve(&pipeline_config, name, target)?;
    if let Some(checkpoint) = checkpoint {
        pipeline = pipeline.skip_to_checkpoint(checkpoint)?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&pipeline)?);
    } else {
        print_pipeline_details(&pipeline);
    }

    Ok(())
}

/// Print a pipeline summary
fn print_pipeline_summary(name: &str, pipeline: &Pipeline) {
    println!("  {} {}", "▸".cyan(), name.bold());
    println!("    Steps:       {}", pipeline.steps.len());
    if !pipeline.after_steps.is_empty() {
        println!("    After-steps: {}", pipeline.after_steps.len());
    }
    let targets: Vec<&str> = pipeline.targets().collect();
    if !targets.is_empty() {
        println!("    Targets:     {}", targets.join(", ").dimmed());
    }
    if let Some(box_config) = &pipeline.box_config {
        println!("    Box:         {}", box_config.id.dimmed());
    }
    println!();
}

/// Print the resolved step list
fn print_pipeline_details(pipeline: &ResolvedPipeline) {
    let title = match &pipeline.target {
        Some(target) => format!("Pipeline {} (target {}):", pipeline.name, target),
        None => format!("Pipeline {}:", pipeline.name),
    };
    println!("{}", title.bold());
    if let Some(box_config) = &pipeline.box_config {
        println!("  Box: {}", box_config.id.cyan());
    }

    for (idx, step) in pipeline.steps.iter().enumerate() {
        println!("  {}", step_line(idx + 1, step));
    }
    if !pipeline.after_steps.is_empty() {
        println!("{}", "After-steps:".bold());
        for (idx, step) in pipeline.after_steps.iter().enumerate() {
            println!("  {}", step_line(idx + 1, step));
        }
    }
}

fn step_line(position: usize, step: &Step) -> String {
    let mut line = format!("{:>2}. {}", position, step.display_name());
    if step.name.is_some() {
        line.push_str(&format!(" ({})", step.id));
    }
    if let Some(cwd) = &step.cwd {
        line.push_str(&format!(" in {}", cwd));
    }
    if let Some(checkpoint) = &step.checkpoint {
        line.push_str(&format!(" [checkpoint {}]", checkpoint));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_line() {
        let mut step = Step::new("script");
        assert_eq!(step_line(1, &step), " 1. script");

        step.name = Some("unit tests".to_string());
        step.cwd = Some("web".to_string());
        step.checkpoint = Some("tested".to_string());
        assert_eq!(
            step_line(12, &step),
            "12. unit tests (script) in web [checkpoint tested]"
        );
    }
}

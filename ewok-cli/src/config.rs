//! Configuration module
//!
//! Handles CLI configuration: where to look for the pipeline config.

use anyhow::{Context, Result};
use ewok_core::Config as PipelineConfig;
use std::path::PathBuf;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Explicit pipeline config file
    pub file: Option<PathBuf>,
    /// Directory searched when no file is given
    pub project_dir: PathBuf,
}

impl Config {
    /// Reads and parses the pipeline config, returning where it came from
    pub fn load(&self) -> Result<(PathBuf, PipelineConfig)> {
        match &self.file {
            Some(path) => {
                let config = ewok_core::read_config(path)
                    .with_context(|| format!("Failed to load {}", path.display()))?;
                Ok((path.clone(), config))
            }
            None => Ok(ewok_core::load_config(&[&self.project_dir])?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_discovers_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("wercker.yml"), "build:\n  steps:\n    - script\n").unwrap();

        let config = Config {
            file: None,
            project_dir: dir.path().to_path_buf(),
        };
        let (path, pipeline_config) = config.load().unwrap();

        assert!(path.ends_with("wercker.yml"));
        assert!(pipeline_config.pipeline("build").is_some());
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            file: Some(dir.path().join("nope.yml")),
            project_dir: dir.path().to_path_buf(),
        };

        let err = config.load().unwrap_err();
        assert!(err.to_string().contains("nope.yml"));
    }
}

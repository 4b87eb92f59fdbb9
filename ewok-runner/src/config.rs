//! Runner configuration
//!
//! Defines where the container lives, which pipeline to run and the
//! wall-clock limits applied to every step. Values come from the
//! environment; timeouts and the source dir declared in the pipeline
//! config override the environment defaults.

use ewok_core::Config as PipelineConfig;
use std::path::PathBuf;
use std::time::Duration;

use crate::command::Timeouts;

const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(25 * 60);
const DEFAULT_NO_RESPONSE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Runner configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Container host API endpoint (e.g., "tcp://127.0.0.1:2375")
    pub docker_host: String,

    /// Running container to attach to
    pub container_id: String,

    /// Pipeline to run (e.g., "build", "deploy")
    pub pipeline: String,

    /// Deploy target selecting an alternate step sequence
    pub deploy_target: Option<String>,

    /// Resume after the step carrying this checkpoint
    pub checkpoint: Option<String>,

    /// Explicit pipeline config file; discovered in `project_dir` when unset
    pub config_file: Option<PathBuf>,

    /// Directory searched for the pipeline config
    pub project_dir: PathBuf,

    /// Directory inside the container where work happens
    pub guest_root: String,

    /// Source path relative to the checkout root
    pub source_dir: String,

    /// Maximum time a single step may run
    pub command_timeout: Duration,

    /// Maximum time a step may go without printing anything
    pub no_response_timeout: Duration,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(docker_host: String, container_id: String) -> Self {
        Self {
            docker_host,
            container_id,
            pipeline: "build".to_string(),
            deploy_target: None,
            checkpoint: None,
            config_file: None,
            project_dir: PathBuf::from("."),
            guest_root: "/pipeline".to_string(),
            source_dir: String::new(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            no_response_timeout: DEFAULT_NO_RESPONSE_TIMEOUT,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - EWOK_CONTAINER_ID (required)
    /// - DOCKER_HOST (optional, default: tcp://127.0.0.1:2375)
    /// - EWOK_PIPELINE (optional, default: build)
    /// - EWOK_DEPLOY_TARGET (optional)
    /// - EWOK_CHECKPOINT (optional)
    /// - EWOK_YML_FILE (optional)
    /// - EWOK_PROJECT_DIR (optional, default: .)
    /// - EWOK_GUEST_ROOT (optional, default: /pipeline)
    /// - EWOK_SOURCE_DIR (optional)
    /// - EWOK_COMMAND_TIMEOUT (optional, minutes, default: 25)
    /// - EWOK_NO_RESPONSE_TIMEOUT (optional, minutes, default: 5)
    pub fn from_env() -> anyhow::Result<Self> {
        let container_id = std::env::var("EWOK_CONTAINER_ID")
            .map_err(|_| anyhow::anyhow!("EWOK_CONTAINER_ID environment variable not set"))?;

        let docker_host =
            env_string("DOCKER_HOST").unwrap_or_else(|| "tcp://127.0.0.1:2375".to_string());

        let mut config = Self::new(docker_host, container_id);

        if let Some(pipeline) = env_string("EWOK_PIPELINE") {
            config.pipeline = pipeline;
        }
        config.deploy_target = env_string("EWOK_DEPLOY_TARGET");
        config.checkpoint = env_string("EWOK_CHECKPOINT");
        config.config_file = env_string("EWOK_YML_FILE").map(PathBuf::from);

        if let Some(dir) = env_string("EWOK_PROJECT_DIR") {
            config.project_dir = PathBuf::from(dir);
        }
        if let Some(root) = env_string("EWOK_GUEST_ROOT") {
            config.guest_root = root;
        }
        if let Some(dir) = env_string("EWOK_SOURCE_DIR") {
            config.source_dir = dir;
        }

        if let Some(value) = env_minutes("EWOK_COMMAND_TIMEOUT") {
            config.command_timeout = minutes("EWOK_COMMAND_TIMEOUT", value)?;
        }
        if let Some(value) = env_minutes("EWOK_NO_RESPONSE_TIMEOUT") {
            config.no_response_timeout = minutes("EWOK_NO_RESPONSE_TIMEOUT", value)?;
        }

        Ok(config)
    }

    /// Applies settings declared in the pipeline config.
    ///
    /// Declared timeouts always win; the declared source dir only fills
    /// in when none was configured. Fails when a timeout does not fit
    /// in a [`Duration`].
    pub fn apply_pipeline_config(
        &mut self,
        pipeline_config: &PipelineConfig,
    ) -> anyhow::Result<()> {
        if let Some(timeout) = pipeline_config.command_timeout {
            self.command_timeout = minutes("command-timeout", timeout as f64)?;
        }
        if let Some(timeout) = pipeline_config.no_response_timeout {
            self.no_response_timeout = minutes("no-response-timeout", timeout as f64)?;
        }
        if self.source_dir.is_empty() {
            if let Some(dir) = &pipeline_config.source_dir {
                self.source_dir = dir.clone();
            }
        }
        Ok(())
    }

    /// Limits handed to the command runner
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            command: Some(self.command_timeout),
            no_response: Some(self.no_response_timeout),
        }
    }

    /// Directories searched for the pipeline config
    pub fn search_dirs(&self) -> Vec<PathBuf> {
        vec![self.project_dir.clone()]
    }

    /// Path inside the container where steps run by default:
    /// `<guest_root>/source[/<base_path>][/<source_dir>]`
    pub fn source_path(&self, base_path: Option<&str>) -> String {
        let mut path = format!("{}/source", self.guest_root.trim_end_matches('/'));
        for part in [base_path.unwrap_or(""), self.source_dir.as_str()] {
            let part = part.trim_matches('/');
            if !part.is_empty() {
                path.push('/');
                path.push_str(part);
            }
        }
        path
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.container_id.is_empty() {
            anyhow::bail!("container_id cannot be empty");
        }

        if self.docker_host.is_empty() {
            anyhow::bail!("docker_host cannot be empty");
        }

        if self.pipeline.is_empty() {
            anyhow::bail!("pipeline cannot be empty");
        }

        if !self.guest_root.starts_with('/') {
            anyhow::bail!("guest_root must be an absolute path");
        }

        if self.command_timeout.is_zero() {
            anyhow::bail!("command_timeout must be greater than 0");
        }

        if self.no_response_timeout.is_zero() {
            anyhow::bail!("no_response_timeout must be greater than 0");
        }

        Ok(())
    }
}

fn minutes(key: &str, value: f64) -> anyhow::Result<Duration> {
    Duration::try_from_secs_f64(value * 60.0)
        .map_err(|_| anyhow::anyhow!("{} of {} minutes is out of range", key, value))
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_minutes(key: &str) -> Option<f64> {
    env_string(key)
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|m| m.is_finite() && *m > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::new("tcp://127.0.0.1:2375".to_string(), "abc123".to_string())
    }

    #[test]
    fn test_default_config() {
        let config = config();
        assert_eq!(config.pipeline, "build");
        assert_eq!(config.command_timeout, Duration::from_secs(25 * 60));
        assert_eq!(config.no_response_timeout, Duration::from_secs(5 * 60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = config();
        assert!(config.validate().is_ok());

        config.container_id = String::new();
        assert!(config.validate().is_err());

        config.container_id = "abc".to_string();
        config.guest_root = "pipeline".to_string();
        assert!(config.validate().is_err());

        config.guest_root = "/pipeline".to_string();
        config.command_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pipeline_config_overrides_timeouts() {
        let mut config = config();
        let yaml = "command-timeout: 60\nno-response-timeout: 2\nsource-dir: src\nbuild: {}\n";
        let pipeline_config = PipelineConfig::from_yaml(yaml).unwrap();

        config.apply_pipeline_config(&pipeline_config).unwrap();

        assert_eq!(config.command_timeout, Duration::from_secs(60 * 60));
        assert_eq!(config.no_response_timeout, Duration::from_secs(2 * 60));
        assert_eq!(config.source_dir, "src");

        let timeouts = config.timeouts();
        assert_eq!(timeouts.command, Some(Duration::from_secs(3600)));
    }

    #[test]
    fn test_configured_source_dir_wins() {
        let mut config = config();
        config.source_dir = "cli".to_string();
        let pipeline_config = PipelineConfig::from_yaml("source-dir: src\nbuild: {}\n").unwrap();

        config.apply_pipeline_config(&pipeline_config).unwrap();
        assert_eq!(config.source_dir, "cli");
    }

    #[test]
    fn test_oversized_timeout_is_rejected() {
        let mut config = config();
        let pipeline_config =
            PipelineConfig::from_yaml("command-timeout: 18446744073709551615
build: {}
").unwrap();

        let err = config.apply_pipeline_config(&pipeline_config).unwrap_err();
        assert!(err.to_string().contains("command-timeout"));
        assert_eq!(config.command_timeout, DEFAULT_COMMAND_TIMEOUT);
    }

    #[test]
    fn test_minutes_conversion() {
        assert_eq!(minutes("t", 1.5).unwrap(), Duration::from_secs(90));
        assert!(minutes("t", 1e300).is_err());
    }

    #[test]
    fn test_source_path() {
        let mut config = config();
        assert_eq!(config.source_path(None), "/pipeline/source");
        assert_eq!(config.source_path(Some("app")), "/pipeline/source/app");

        config.source_dir = "/src/".to_string();
        assert_eq!(config.source_path(Some("app")), "/pipeline/source/app/src");
    }
}

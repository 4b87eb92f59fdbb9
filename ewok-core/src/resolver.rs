//! Pipeline resolution
//!
//! Turns a parsed [`Config`] plus a requested pipeline name into the
//! ordered steps to execute. Declaration order is authoritative: steps
//! are never reordered, deduplicated or dependency-sorted.

use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::{BoxConfig, CONFIG_RESERVED_WORDS, Config, Step};
use crate::error::{ConfigError, Result};

/// Everything needed to drive one pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPipeline {
    pub name: String,
    /// Deploy target whose steps replaced the default ones, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(rename = "box", skip_serializing_if = "Option::is_none")]
    pub box_config: Option<BoxConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<BoxConfig>,
    #[serde(rename = "base-path", skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
    pub steps: Vec<Step>,
    #[serde(rename = "after-steps")]
    pub after_steps: Vec<Step>,
}

/// Resolves the steps for pipeline `name`.
///
/// When `target` names one of the pipeline's alternate step sequences,
/// those steps replace the default `steps`. After-steps always come from
/// the pipeline itself. The box and services fall back to the top-level
/// ones when the pipeline does not declare its own.
///
/// # Errors
/// - `ReservedPipelineName` if `name` is a reserved top-level key
/// - `UnknownPipeline` if the config declares no such pipeline
pub fn resolve(config: &Config, name: &str, target: Option<&str>) -> Result<ResolvedPipeline> {
    if CONFIG_RESERVED_WORDS.contains(&name) {
        return Err(ConfigError::ReservedPipelineName(name.to_string()));
    }

    let pipeline = config
        .pipeline(name)
        .ok_or_else(|| ConfigError::UnknownPipeline(name.to_string()))?;

    let (steps, target) = match target.filter(|t| !t.is_empty()) {
        Some(t) => match pipeline.steps_map.get(t) {
            Some(steps) => {
                debug!("Using steps of target '{}' for pipeline '{}'", t, name);
                (steps.clone(), Some(t.to_string()))
            }
            None => {
                warn!(
                    "Pipeline '{}' has no target '{}', using its default steps",
                    name, t
                );
                (pipeline.steps.clone(), None)
            }
        },
        None => (pipeline.steps.clone(), None),
    };

    let services = if pipeline.services.is_empty() {
        config.services.clone()
    } else {
        pipeline.services.clone()
    };

    Ok(ResolvedPipeline {
        name: name.to_string(),
        target,
        box_config: pipeline
            .box_config
            .clone()
            .or_else(|| config.box_config.clone()),
        services,
        base_path: pipeline.base_path.clone(),
        steps,
        after_steps: pipeline.after_steps.clone(),
    })
}

impl ResolvedPipeline {
    /// Drops every step up to and including the one marked `checkpoint`.
    ///
    /// After-steps are never skipped.
    pub fn skip_to_checkpoint(mut self, checkpoint: &str) -> Result<Self> {
        let idx = self
            .steps
            .iter()
            .position(|step| step.checkpoint.as_deref() == Some(checkpoint))
            .ok_or_else(|| ConfigError::UnknownCheckpoint(checkpoint.to_string()))?;

        debug!(
            "Resuming pipeline '{}' after checkpoint '{}' ({} step(s) skipped)",
            self.name,
            checkpoint,
            idx + 1
        );
        self.steps.drain(..=idx);
        Ok(self)
    }

    /// Main steps followed by after-steps
    pub fn all_steps(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter().chain(self.after_steps.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
box: golang
services:
  - redis
build:
  steps:
    - setup
    - script:
        code: go build
        checkpoint: compiled
    - script:
        code: go test
  after-steps:
    - notify
deploy:
  box: alpine
  services:
    - postgres
  base-path: app/
  steps:
    - script:
        code: ./deploy default
  production:
    - script:
        code: ./deploy prod
"#;

    fn config() -> Config {
        Config::from_yaml(SAMPLE).unwrap()
    }

    fn ids(steps: &[Step]) -> Vec<String> {
        steps
            .iter()
            .map(|s| s.param("code").unwrap_or(&s.id).to_string())
            .collect()
    }

    #[test]
    fn test_resolve_default_pipeline() {
        let resolved = resolve(&config(), "build", None).unwrap();

        assert_eq!(ids(&resolved.steps), vec!["setup", "go build", "go test"]);
        assert_eq!(ids(&resolved.after_steps), vec!["notify"]);
        assert_eq!(resolved.box_config.unwrap().id, "golang");
        assert_eq!(resolved.services[0].id, "redis");
        assert_eq!(resolved.target, None);
    }

    #[test]
    fn test_resolve_target_steps() {
        let resolved = resolve(&config(), "deploy", Some("production")).unwrap();

        assert_eq!(ids(&resolved.steps), vec!["./deploy prod"]);
        assert_eq!(resolved.target.as_deref(), Some("production"));
        assert_eq!(resolved.box_config.unwrap().id, "alpine");
        assert_eq!(resolved.services[0].id, "postgres");
        assert_eq!(resolved.base_path.as_deref(), Some("app"));
    }

    #[test]
    fn test_unknown_target_falls_back() {
        let resolved = resolve(&config(), "deploy", Some("staging")).unwrap();
        assert_eq!(ids(&resolved.steps), vec!["./deploy default"]);
        assert_eq!(resolved.target, None);
    }

    #[test]
    fn test_unknown_pipeline() {
        assert!(matches!(
            resolve(&config(), "release", None),
            Err(ConfigError::UnknownPipeline(_))
        ));
    }

    #[test]
    fn test_reserved_pipeline_name() {
        assert!(matches!(
            resolve(&config(), "services", None),
            Err(ConfigError::ReservedPipelineName(_))
        ));
    }

    #[test]
    fn test_skip_to_checkpoint() {
        let resolved = resolve(&config(), "build", None)
            .unwrap()
            .skip_to_checkpoint("compiled")
            .unwrap();

        assert_eq!(ids(&resolved.steps), vec!["go test"]);
        assert_eq!(ids(&resolved.after_steps), vec!["notify"]);
    }

    #[test]
    fn test_unknown_checkpoint() {
        let err = resolve(&config(), "build", None)
            .unwrap()
            .skip_to_checkpoint("nope")
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownCheckpoint(_)));
    }

    #[test]
    fn test_all_steps_in_order() {
        let resolved = resolve(&config(), "build", None).unwrap();
        let all: Vec<&str> = resolved.all_steps().map(|s| s.id.as_str()).collect();
        assert_eq!(all, vec!["setup", "script", "script", "notify"]);
    }
}

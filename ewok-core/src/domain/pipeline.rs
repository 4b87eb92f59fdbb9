//! Pipeline domain type

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use super::{BoxConfig, Step, key_to_string, optional_string, parse_services, parse_steps};
use crate::error::{ConfigError, Result};

/// Keys with a dedicated meaning inside a pipeline section.
///
/// Any other key names an alternate step sequence (a deploy target).
pub const PIPELINE_RESERVED_WORDS: &[&str] =
    &["box", "services", "steps", "after-steps", "base-path"];

/// Ordered steps for one named pipeline (e.g. `build`, `deploy`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    #[serde(rename = "box", default, skip_serializing_if = "Option::is_none")]
    pub box_config: Option<BoxConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<BoxConfig>,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(rename = "after-steps", default, skip_serializing_if = "Vec::is_empty")]
    pub after_steps: Vec<Step>,
    /// Alternate step sequences keyed by target name, in declaration order
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub steps_map: IndexMap<String, Vec<Step>>,
    #[serde(rename = "base-path", default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
}

impl Pipeline {
    /// Parses a pipeline section.
    ///
    /// Reserved keys land in their typed fields; every other key must
    /// hold a step sequence and is stored in `steps_map`.
    pub fn from_value(value: &Value) -> Result<Self> {
        let map = match value {
            Value::Null => return Ok(Self::default()),
            Value::Mapping(map) => map,
            _ => {
                return Err(ConfigError::invalid_field(
                    "pipeline",
                    "expected a mapping of pipeline settings",
                ));
            }
        };

        let mut pipeline = Self::default();

        for (key, value) in map {
            let key = key_to_string(key)
                .ok_or_else(|| ConfigError::invalid_field("pipeline", "keys must be strings"))?;

            match key.as_str() {
                "box" => {
                    pipeline.box_config = match value {
                        Value::Null => None,
                        _ => Some(BoxConfig::from_value("box", value)?),
                    }
                }
                "services" => pipeline.services = parse_services("services", value)?,
                "steps" => pipeline.steps = parse_steps("steps", value)?,
                "after-steps" => pipeline.after_steps = parse_steps("after-steps", value)?,
                "base-path" => {
                    // A trailing slash would nest the source under itself
                    pipeline.base_path = optional_string("base-path", value)?
                        .map(|path| path.trim_end_matches('/').to_string())
                        .filter(|path| !path.is_empty());
                }
                _ => {
                    let steps = parse_steps(&key, value)?;
                    pipeline.steps_map.insert(key, steps);
                }
            }
        }

        Ok(pipeline)
    }

    /// Names of the alternate step sequences, in declaration order
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.steps_map.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Result<Pipeline> {
        let value: Value = serde_yaml::from_str(source).unwrap();
        Pipeline::from_value(&value)
    }

    #[test]
    fn test_parse_pipeline_fields() {
        let pipeline = parse(
            r#"
box: ubuntu
services:
  - redis
steps:
  - setup
  - script:
      code: make
after-steps:
  - notify
"#,
        )
        .unwrap();

        assert_eq!(pipeline.box_config.as_ref().map(|b| b.id.as_str()), Some("ubuntu"));
        assert_eq!(pipeline.services.len(), 1);
        assert_eq!(pipeline.steps.len(), 2);
        assert_eq!(pipeline.after_steps[0].id, "notify");
        assert!(pipeline.steps_map.is_empty());
    }

    #[test]
    fn test_extra_keys_become_targets() {
        let pipeline = parse(
            r#"
steps:
  - default-deploy
production:
  - script:
      code: ./deploy prod
staging:
  - script:
      code: ./deploy staging
"#,
        )
        .unwrap();

        let targets: Vec<&str> = pipeline.targets().collect();
        assert_eq!(targets, vec!["production", "staging"]);
        assert_eq!(pipeline.steps_map["production"][0].param("code"), Some("./deploy prod"));
    }

    #[test]
    fn test_reserved_keys_never_targets() {
        for source in [
            "base-path: app\nsteps: []\nbox: ubuntu\nafter-steps: []\nservices: []\nextra: [a]\n",
            "extra: [a]\nservices: []\nafter-steps: []\nbox: ubuntu\nsteps: []\nbase-path: app\n",
        ] {
            let pipeline = parse(source).unwrap();
            for reserved in PIPELINE_RESERVED_WORDS {
                assert!(!pipeline.steps_map.contains_key(*reserved));
            }
            assert!(pipeline.steps_map.contains_key("extra"));
        }
    }

    #[test]
    fn test_base_path_trailing_slash_stripped() {
        let pipeline = parse("base-path: \"app/\"\n").unwrap();
        assert_eq!(pipeline.base_path.as_deref(), Some("app"));

        let root = parse("base-path: /\n").unwrap();
        assert_eq!(root.base_path, None);
    }

    #[test]
    fn test_invalid_extra_key_is_named() {
        let err = parse("steps: []\nproduction: not-steps\n").unwrap_err();
        match err {
            ConfigError::InvalidSteps { key, .. } => assert_eq!(key, "production"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_pipeline() {
        assert_eq!(parse("~").unwrap(), Pipeline::default());
    }
}

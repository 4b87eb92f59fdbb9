//! Root config domain type

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use super::{BoxConfig, Pipeline, key_to_string, optional_string, parse_services};
use crate::error::{ConfigError, Result};

/// Top-level keys with a dedicated meaning.
///
/// Any other top-level key names a pipeline.
pub const CONFIG_RESERVED_WORDS: &[&str] = &[
    "box",
    "services",
    "command-timeout",
    "no-response-timeout",
    "source-dir",
    "ignore-file",
];

/// Parsed pipeline description (the whole YAML document)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "box", default, skip_serializing_if = "Option::is_none")]
    pub box_config: Option<BoxConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<BoxConfig>,
    /// Minutes a single step may run
    #[serde(rename = "command-timeout", default, skip_serializing_if = "Option::is_none")]
    pub command_timeout: Option<u64>,
    /// Minutes a step may stay silent
    #[serde(rename = "no-response-timeout", default, skip_serializing_if = "Option::is_none")]
    pub no_response_timeout: Option<u64>,
    #[serde(rename = "source-dir", default, skip_serializing_if = "Option::is_none")]
    pub source_dir: Option<String>,
    #[serde(rename = "ignore-file", default, skip_serializing_if = "Option::is_none")]
    pub ignore_file: Option<String>,
    /// Named pipelines in declaration order
    #[serde(default)]
    pub pipelines: IndexMap<String, Pipeline>,
}

impl Config {
    /// Parses and validates a YAML pipeline description
    ///
    /// # Errors
    /// Returns an error if:
    /// - The text is not valid YAML
    /// - The document is empty or not a mapping
    /// - Any box, step or pipeline section has an unsupported shape
    pub fn from_yaml(source: &str) -> Result<Self> {
        if source.trim().is_empty() {
            return Err(ConfigError::Empty);
        }

        let value: Value = serde_yaml::from_str(source)?;
        let config = Self::from_value(&value)?;
        config.validate()?;
        Ok(config)
    }

    /// Normalizes an already-parsed YAML document
    pub fn from_value(value: &Value) -> Result<Self> {
        let map = match value {
            Value::Null => return Err(ConfigError::Empty),
            Value::Mapping(map) => map,
            _ => {
                return Err(ConfigError::invalid_field(
                    "config",
                    "top level must be a mapping",
                ));
            }
        };

        let mut config = Self::default();

        for (key, value) in map {
            let key = key_to_string(key)
                .ok_or_else(|| ConfigError::invalid_field("config", "keys must be strings"))?;

            match key.as_str() {
                "box" => {
                    config.box_config = match value {
                        Value::Null => None,
                        _ => Some(BoxConfig::from_value("box", value)?),
                    }
                }
                "services" => config.services = parse_services("services", value)?,
                "command-timeout" => config.command_timeout = parse_minutes(&key, value)?,
                "no-response-timeout" => config.no_response_timeout = parse_minutes(&key, value)?,
                "source-dir" => config.source_dir = optional_string(&key, value)?,
                "ignore-file" => config.ignore_file = optional_string(&key, value)?,
                _ => {
                    let pipeline =
                        Pipeline::from_value(value).map_err(|source| ConfigError::InvalidPipeline {
                            name: key.clone(),
                            source: Box::new(source),
                        })?;
                    config.pipelines.insert(key, pipeline);
                }
            }
        }

        Ok(config)
    }

    /// Ensures the parsed config carries something to run
    pub fn validate(&self) -> Result<()> {
        if *self == Self::default() {
            return Err(ConfigError::Empty);
        }
        Ok(())
    }

    /// Looks up a pipeline by name
    pub fn pipeline(&self, name: &str) -> Option<&Pipeline> {
        self.pipelines.get(name)
    }

    /// Pipeline names in declaration order
    pub fn pipeline_names(&self) -> impl Iterator<Item = &str> {
        self.pipelines.keys().map(String::as_str)
    }
}

fn parse_minutes(key: &str, value: &Value) -> Result<Option<u64>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| ConfigError::invalid_field(key, "expected a whole number of minutes")),
        _ => Err(ConfigError::invalid_field(key, "expected a whole number of minutes")),
    }
}

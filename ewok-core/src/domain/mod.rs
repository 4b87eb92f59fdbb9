//! Core domain types
//!
//! The canonical model every pipeline description is normalized into.
//! Parsing walks the YAML as an ordered list of key/value pairs and
//! dispatches each pair against a reserved-word set, so unknown keys
//! can be picked up as extra pipelines or deploy targets.

mod box_config;
mod config;
mod pipeline;
mod step;

pub use box_config::BoxConfig;
pub use config::{CONFIG_RESERVED_WORDS, Config};
pub use pipeline::{PIPELINE_RESERVED_WORDS, Pipeline};
pub use step::Step;

use serde_yaml::Value;

use crate::error::{ConfigError, Result};

/// Coerces a YAML scalar into its canonical string form.
///
/// Strings pass through, integers print in decimal and booleans as
/// `true`/`false`. Anything else (floats, null, collections) becomes
/// the empty string.
pub(crate) fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                String::new()
            }
        }
        _ => String::new(),
    }
}

/// Reads a mapping key as a string, rejecting non-scalar keys
pub(crate) fn key_to_string(key: &Value) -> Option<String> {
    match key {
        Value::String(s) => Some(s.clone()),
        Value::Bool(_) | Value::Number(_) => {
            Some(scalar_to_string(key)).filter(|k| !k.is_empty())
        }
        _ => None,
    }
}

/// Parses an optional string field; `null` is treated as absent
pub(crate) fn optional_string(key: &str, value: &Value) -> Result<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Bool(_) | Value::Number(_) => Ok(Some(scalar_to_string(value))),
        _ => Err(ConfigError::invalid_field(key, "expected a string")),
    }
}

/// Parses a sequence of steps, naming `key` when the value is not one
pub(crate) fn parse_steps(key: &str, value: &Value) -> Result<Vec<Step>> {
    let wrap = |source: ConfigError| ConfigError::InvalidSteps {
        key: key.to_string(),
        source: Box::new(source),
    };

    match value {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(items) => items
            .iter()
            .map(Step::from_value)
            .collect::<Result<Vec<_>>>()
            .map_err(wrap),
        _ => Err(wrap(ConfigError::InvalidStep(
            "expected a sequence of steps".to_string(),
        ))),
    }
}

/// Parses a sequence of boxes (the `services` key)
pub(crate) fn parse_services(key: &str, value: &Value) -> Result<Vec<BoxConfig>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(items) => items
            .iter()
            .enumerate()
            .map(|(idx, item)| BoxConfig::from_value(&format!("{}[{}]", key, idx), item))
            .collect(),
        _ => Err(ConfigError::invalid_field(key, "expected a sequence of boxes")),
    }
}

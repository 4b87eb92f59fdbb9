//! Step domain type

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use tracing::warn;

use super::{key_to_string, scalar_to_string};
use crate::error::{ConfigError, Result};

/// One unit of work in a pipeline.
///
/// Three YAML shapes normalize to the same value:
///
/// ```yaml
/// steps:
///   - npm-install        # bare identifier
///   - script:            # single-key mapping of parameters
///       code: make
///   - script:            # flat mapping, first key is the identifier
///     code: make
/// ```
///
/// The `cwd`, `name` and `checkpoint` parameters are lifted out of
/// `data` into typed fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub data: IndexMap<String, String>,
}

impl Step {
    /// Creates a step with no parameters
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cwd: None,
            name: None,
            checkpoint: None,
            data: IndexMap::new(),
        }
    }

    /// Parses a step from any of the three supported YAML shapes.
    ///
    /// A bare number or boolean is taken as the identifier in its
    /// printed form.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(id) => Ok(Self::new(id.clone())),
            Value::Number(n) => Ok(Self::new(n.to_string())),
            Value::Bool(b) => Ok(Self::new(b.to_string())),
            Value::Mapping(map) if map.len() == 1 => Self::from_single_key(map),
            Value::Mapping(map) if !map.is_empty() => Self::from_flat(map),
            Value::Mapping(_) => Err(ConfigError::InvalidStep("step is empty".to_string())),
            _ => Err(ConfigError::InvalidStep(
                "expected a scalar or a mapping".to_string(),
            )),
        }
    }

    /// Label shown in logs: the step name, falling back to its identifier
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Looks up a free-form parameter
    pub fn param(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    fn from_single_key(map: &Mapping) -> Result<Self> {
        let (key, params) = map
            .iter()
            .next()
            .ok_or_else(|| ConfigError::InvalidStep("step is empty".to_string()))?;
        let id = step_id(key)?;

        let Value::Mapping(params) = params else {
            return Err(ConfigError::InvalidStep(format!(
                "step {} has no parameters",
                id
            )));
        };

        Ok(Self::with_data(id, collect_data(params.iter())))
    }

    fn from_flat(map: &Mapping) -> Result<Self> {
        let mut entries = map.iter();
        let (key, _) = entries
            .next()
            .ok_or_else(|| ConfigError::InvalidStep("step is empty".to_string()))?;
        let id = step_id(key)?;

        warn!(
            "Step '{}' uses the flat parameter layout; indent its parameters under the step name",
            id
        );

        Ok(Self::with_data(id, collect_data(entries)))
    }

    fn with_data(id: String, mut data: IndexMap<String, String>) -> Self {
        let mut lift = |key: &str| data.shift_remove(key).filter(|v| !v.is_empty());
        let cwd = lift("cwd");
        let name = lift("name");
        let checkpoint = lift("checkpoint");

        Self {
            id,
            cwd,
            name,
            checkpoint,
            data,
        }
    }
}

fn step_id(key: &Value) -> Result<String> {
    key_to_string(key).filter(|id| !id.is_empty()).ok_or_else(|| {
        ConfigError::InvalidStep("step identifier must be a non-empty scalar".to_string())
    })
}

fn collect_data<'a>(
    entries: impl Iterator<Item = (&'a Value, &'a Value)>,
) -> IndexMap<String, String> {
    entries
        .filter_map(|(k, v)| key_to_string(k).map(|k| (k, scalar_to_string(v))))
        .collect()
}

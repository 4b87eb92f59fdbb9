//! Box domain type

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use super::{key_to_string, scalar_to_string};
use crate::error::{ConfigError, Result};

/// Container image used to run a pipeline's steps, or a service next to it.
///
/// Accepts either a bare image reference (`box: golang:1.22`) or the
/// structured form with credentials, env and ports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxConfig {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volumes: Option<String>,
}

/// Structured shape as written in YAML, before scalar coercion
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawBox {
    id: Option<String>,
    name: Option<String>,
    tag: Option<Value>,
    cmd: Option<String>,
    env: Option<serde_yaml::Mapping>,
    ports: Vec<Value>,
    username: Option<String>,
    password: Option<String>,
    registry: Option<String>,
    entrypoint: Option<String>,
    url: Option<String>,
    volumes: Option<String>,
}

impl BoxConfig {
    /// Creates a box from a bare image reference
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Parses a box from either supported shape.
    ///
    /// `section` names the config key the box was declared under and is
    /// only used for error messages.
    pub fn from_value(section: &str, value: &Value) -> Result<Self> {
        match value {
            Value::String(id) if !id.is_empty() => Ok(Self::new(id.clone())),
            Value::Mapping(_) => {
                let raw: RawBox = serde_yaml::from_value(value.clone())
                    .map_err(|e| ConfigError::invalid_box(section, e.to_string()))?;
                Self::from_raw(section, raw)
            }
            _ => Err(ConfigError::invalid_box(
                section,
                "expected an image reference or a mapping",
            )),
        }
    }

    /// True when the box is loaded from the local filesystem
    pub fn is_external(&self) -> bool {
        self.url
            .as_deref()
            .is_some_and(|url| url.starts_with("file://"))
    }

    /// Image reference to hand to the container host
    pub fn image(&self) -> String {
        match (&self.name, &self.tag) {
            (Some(name), Some(tag)) => format!("{}:{}", name, tag),
            (Some(name), None) => name.clone(),
            _ => self.id.clone(),
        }
    }

    fn from_raw(section: &str, raw: RawBox) -> Result<Self> {
        let tag = raw
            .tag
            .as_ref()
            .map(scalar_to_string)
            .filter(|t| !t.is_empty());

        let id = match (raw.id.filter(|id| !id.is_empty()), &raw.name) {
            (Some(id), _) => id,
            (None, Some(name)) if !name.is_empty() => match &tag {
                Some(tag) => format!("{}:{}", name, tag),
                None => name.clone(),
            },
            _ => {
                return Err(ConfigError::invalid_box(
                    section,
                    "box needs an 'id' or a 'name'",
                ));
            }
        };

        let env = raw
            .env
            .unwrap_or_default()
            .iter()
            .filter_map(|(k, v)| key_to_string(k).map(|k| (k, scalar_to_string(v))))
            .collect();

        let ports = raw
            .ports
            .iter()
            .map(scalar_to_string)
            .filter(|p| !p.is_empty())
            .collect();

        Ok(Self {
            id,
            name: raw.name,
            tag,
            cmd: raw.cmd,
            env,
            ports,
            username: raw.username,
            password: raw.password,
            registry: raw.registry,
            entrypoint: raw.entrypoint,
            url: raw.url,
            volumes: raw.volumes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Result<BoxConfig> {
        let value: Value = serde_yaml::from_str(source).unwrap();
        BoxConfig::from_value("box", &value)
    }

    #[test]
    fn test_bare_box() {
        let b = parse("golang:1.22").unwrap();
        assert_eq!(b.id, "golang:1.22");
        assert_eq!(b.image(), "golang:1.22");
        assert!(b.env.is_empty());
        assert!(!b.is_external());
    }

    #[test]
    fn test_structured_box() {
        let b = parse(
            r#"
id: postgres
tag: 16
cmd: postgres -D /data
env:
  POSTGRES_USER: app
  POSTGRES_PORT: 5432
ports:
  - 5432
  - "8080:80"
username: bot
password: hunter2
registry: registry.example.com
"#,
        )
        .unwrap();

        assert_eq!(b.id, "postgres");
        assert_eq!(b.tag.as_deref(), Some("16"));
        assert_eq!(b.env.get("POSTGRES_PORT").map(String::as_str), Some("5432"));
        assert_eq!(b.ports, vec!["5432".to_string(), "8080:80".to_string()]);
        assert_eq!(b.registry.as_deref(), Some("registry.example.com"));
    }

    #[test]
    fn test_id_derived_from_name_and_tag() {
        let b = parse("name: redis\ntag: \"7\"\n").unwrap();
        assert_eq!(b.id, "redis:7");
        assert_eq!(b.image(), "redis:7");
    }

    #[test]
    fn test_box_without_identity_fails() {
        let err = parse("cmd: sleep 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBox { .. }));
    }

    #[test]
    fn test_external_box() {
        let b = parse("id: local\nurl: file:///boxes/local\n").unwrap();
        assert!(b.is_external());

        let remote = parse("id: remote\nurl: https://example.com/box\n").unwrap();
        assert!(!remote.is_external());
    }

    #[test]
    fn test_sequence_box_fails() {
        assert!(parse("[a]").is_err());
    }
}

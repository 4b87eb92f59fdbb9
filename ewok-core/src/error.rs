//! Error types for configuration parsing and pipeline resolution

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors raised while reading, normalizing or resolving a pipeline config
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document is not valid YAML
    #[error("Error parsing your config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The document parsed but contains nothing
    #[error("Your config is empty")]
    Empty,

    /// A step entry has an unsupported shape
    #[error("Invalid step: {0}")]
    InvalidStep(String),

    /// A box entry has an unsupported shape or is missing its identity
    #[error("Invalid box in '{section}': {message}")]
    InvalidBox { section: String, message: String },

    /// A known key holds a value of the wrong type
    #[error("Invalid value for '{key}': {message}")]
    InvalidField { key: String, message: String },

    /// A key that should hold a step sequence does not
    #[error("'{key}' is not a valid list of steps: {source}")]
    InvalidSteps {
        key: String,
        #[source]
        source: Box<ConfigError>,
    },

    /// A pipeline section failed to parse
    #[error("Invalid pipeline '{name}': {source}")]
    InvalidPipeline {
        name: String,
        #[source]
        source: Box<ConfigError>,
    },

    /// The requested pipeline is not declared
    #[error("Pipeline '{0}' not found in config")]
    UnknownPipeline(String),

    /// The requested pipeline name collides with a reserved top-level key
    #[error("'{0}' is a reserved config key and cannot name a pipeline")]
    ReservedPipelineName(String),

    /// No step carries the requested checkpoint
    #[error("Checkpoint '{0}' not found in pipeline steps")]
    UnknownCheckpoint(String),

    /// Config file discovery came up empty
    #[error("No config file found (searched: {})", .searched.join(", "))]
    NotFound { searched: Vec<String> },

    /// Reading the config file failed
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid_field(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidField {
            key: key.into(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_box(section: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidBox {
            section: section.into(),
            message: message.into(),
        }
    }

    /// Check if this error came from the YAML parser itself
    pub fn is_parse_error(&self) -> bool {
        match self {
            Self::Parse(_) => true,
            Self::InvalidPipeline { source, .. } | Self::InvalidSteps { source, .. } => {
                source.is_parse_error()
            }
            _ => false,
        }
    }
}

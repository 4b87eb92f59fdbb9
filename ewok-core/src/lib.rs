//! Ewok Core
//!
//! Configuration model for the Ewok pipeline runner.
//!
//! This crate contains:
//! - Domain types: boxes, steps, pipelines and the root config
//! - Normalization of the YAML pipeline description into those types
//! - Pipeline resolution: picking the ordered steps to execute
//! - Config file discovery on disk

pub mod domain;
pub mod error;
pub mod loader;
pub mod resolver;

pub use domain::{BoxConfig, Config, Pipeline, Step};
pub use error::{ConfigError, Result};
pub use loader::{CONFIG_FILE_NAMES, find_config, load_config, read_config};
pub use resolver::{ResolvedPipeline, resolve};

//! Config file discovery

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::domain::Config;
use crate::error::{ConfigError, Result};

/// File names probed in each search directory, in priority order
pub const CONFIG_FILE_NAMES: &[&str] = &["ewok.yml", "wercker.yml", ".wercker.yml"];

/// Finds the first config file across `search_dirs`.
///
/// Directories are searched in order; within a directory the names in
/// [`CONFIG_FILE_NAMES`] are tried in order.
pub fn find_config<P: AsRef<Path>>(search_dirs: &[P]) -> Result<PathBuf> {
    let mut searched = Vec::new();

    for dir in search_dirs {
        for name in CONFIG_FILE_NAMES {
            let candidate = dir.as_ref().join(name);
            if candidate.is_file() {
                debug!("Found config file at {}", candidate.display());
                return Ok(candidate);
            }
            searched.push(candidate.display().to_string());
        }
    }

    Err(ConfigError::NotFound { searched })
}

/// Reads and parses the config file at `path`
pub fn read_config(path: &Path) -> Result<Config> {
    let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Config::from_yaml(&source)
}

/// Discovers and parses the config, returning where it was found
pub fn load_config<P: AsRef<Path>>(search_dirs: &[P]) -> Result<(PathBuf, Config)> {
    let path = find_config(search_dirs)?;
    let config = read_config(&path)?;
    Ok((path, config))
}

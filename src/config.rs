//! Configuration file handling for the roll generator.
//! A project may keep its preferred defaults in `roll.json`, `roll.yml` or
//! `roll.yaml`; command-line flags take precedence over them.

use crate::constants::CONFIG_FILES;
use crate::error::{Error, Result};
use crate::options::{Database, SkipFlag};
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Defaults read from a configuration file. Every key is optional.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub database: Option<Database>,
    #[serde(default)]
    pub skip: Vec<SkipFlag>,
    pub heroku: Option<bool>,
    pub heroku_flags: Option<String>,
    pub templates: Option<PathBuf>,
    /// Timeout for external commands, in seconds.
    pub timeout: Option<u64>,
}

/// Finds the first existing configuration file in `dir`.
pub fn find_config<P: AsRef<Path>>(dir: P, config_files: &[&str]) -> Option<PathBuf> {
    config_files
        .iter()
        .map(|file| dir.as_ref().join(file))
        .find(|path| path.is_file())
}

/// Parses configuration content, trying JSON first and YAML second.
///
/// # Errors
/// * `Error::ConfigParseError` if the content is neither valid JSON nor valid YAML
pub fn parse_config(content: &str, source: &str) -> Result<Config> {
    if content.trim().is_empty() {
        return Ok(Config::default());
    }
    match serde_json::from_str(content) {
        Ok(config) => Ok(config),
        Err(_) => serde_yaml::from_str(content).map_err(|e| Error::ConfigParseError {
            path: source.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Loads the configuration from an explicit path, or from the first known
/// file in `dir`. A missing implicit file yields the default configuration.
///
/// # Errors
/// * `Error::ConfigError` if an explicit path does not exist
/// * `Error::ConfigParseError` if the file cannot be parsed
pub fn load_config<P: AsRef<Path>>(explicit: Option<&Path>, dir: P) -> Result<Config> {
    let path = match explicit {
        Some(path) if !path.is_file() => {
            return Err(Error::ConfigError(format!(
                "configuration file '{}' does not exist",
                path.display()
            )));
        }
        Some(path) => path.to_path_buf(),
        None => match find_config(&dir, &CONFIG_FILES) {
            Some(path) => path,
            None => {
                debug!("No configuration file found (tried: {})", CONFIG_FILES.join(", "));
                return Ok(Config::default());
            }
        },
    };

    debug!("Loading configuration from {}", path.display());
    let content = std::fs::read_to_string(&path)?;
    parse_config(&content, &path.display().to_string())
}

use crate::config::schema::{ConfigFile, ValidationError};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config from {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config TOML{}: {source}", origin(.path))]
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },

    #[error("invalid config{}: {source}", origin(.path))]
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

fn origin(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" ({})", p.display()))
        .unwrap_or_default()
}

/// Deserialize and validate a config, tagging errors with `path` if known.
fn parse(input: &str, path: Option<&Path>) -> Result<ConfigFile, ConfigError> {
    let path = path.map(Path::to_path_buf);
    let config: ConfigFile =
        toml_edit::de::from_str(input).map_err(|source| ConfigError::Toml {
            path: path.clone(),
            source,
        })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path, source })?;
    Ok(config)
}

pub fn load_from_str(input: &str) -> Result<ConfigFile, ConfigError> {
    parse(input, None)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<ConfigFile, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&contents, Some(path))
}

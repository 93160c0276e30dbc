//! Reading the optional TOML configuration file.
//!
//! The schema lives in [`crate::domain::config::FileConfig`]; this module only
//! does the file I/O and turns failures into [`ConfigError`].

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::config::FileConfig;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads a [`FileConfig`] from `path`.
///
/// The path was given explicitly by the operator, so a missing file is an
/// error rather than a silent fall-back to defaults.
///
/// # Errors
///
/// - [`ConfigError::Io`] if the file cannot be read.
/// - [`ConfigError::Parse`] if it is not valid TOML for the schema.
pub fn load_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&text)?)
}

//! Error types for verbump settings.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can occur when loading settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error("invalid configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),

    /// A settings file named explicitly does not exist.
    #[error("settings file {0} does not exist")]
    MissingFile(Utf8PathBuf),
}

/// Result type alias using [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;

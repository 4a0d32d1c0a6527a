//! Configuration error types.

use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Figment extraction or merge error.
    #[error("Config error: {0}")]
    Figment(#[from] figment::Error),

    /// A value is out of its accepted range.
    #[error("Invalid config value for {field}: {message}")]
    Invalid { field: String, message: String },
}

//! Configuration error types.

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    /// The config crate failed to read or merge a source
    #[error("failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    /// Loaded values failed validation
    #[error("invalid configuration: {0}")]
    ValidationError(String),
}

impl ConfigurationError {
    pub fn validation(message: impl Into<String>) -> Self {
        ConfigurationError::ValidationError(message.into())
    }
}

impl From<ConfigurationError> for crate::error::InvokerError {
    fn from(err: ConfigurationError) -> Self {
        crate::error::InvokerError::Configuration(err.to_string())
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigurationError>;

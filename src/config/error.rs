use thiserror::Error;

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required configuration parameter: {name}")]
    MissingParameter { name: String },

    #[error("invalid value for configuration parameter {name}: '{value}'")]
    InvalidParameter { name: String, value: String },
}

impl ConfigError {
    pub fn missing(name: impl Into<String>) -> Self {
        Self::MissingParameter { name: name.into() }
    }

    pub fn invalid(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            value: value.into(),
        }
    }

    /// The offending parameter name.
    pub fn parameter(&self) -> &str {
        match self {
            Self::MissingParameter { name } | Self::InvalidParameter { name, .. } => name,
        }
    }
}

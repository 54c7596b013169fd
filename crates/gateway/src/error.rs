//! Error types for the gateway binary.

use thiserror::Error;

/// Main error type for the gateway.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration errors (invalid YAML/JSON, bad catalog tables)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Startup errors (listener failed to bind, transports failed to start)
    #[error("Startup error: {0}")]
    Startup(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl From<apigate_rest_tools::error::DispatchError> for GatewayError {
    fn from(value: apigate_rest_tools::error::DispatchError) -> Self {
        Self::Config(value.to_string())
    }
}

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

use miette::{Diagnostic, Result};
use thiserror::Error;

/// Classified failure of a call to one of the upstream services
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum GatewayError {
    #[error("Upstream resource not found")]
    #[diagnostic(code(elphi_calendar::upstream::not_found))]
    NotFound,

    #[error("Upstream unavailable: {0}")]
    #[diagnostic(code(elphi_calendar::upstream::unavailable))]
    UpstreamUnavailable(String),

    #[error("Malformed upstream payload: {0}")]
    #[diagnostic(code(elphi_calendar::upstream::malformed))]
    MalformedPayload(String),
}

impl GatewayError {
    /// Whether this failure means the resource does not exist upstream
    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::NotFound)
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GatewayError::MalformedPayload(err.to_string())
        } else {
            GatewayError::UpstreamUnavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::MalformedPayload(err.to_string())
    }
}

/// Type alias for results of upstream calls
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Main error type for the application
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Environment error: {0}")]
    #[diagnostic(code(elphi_calendar::environment))]
    Environment(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(elphi_calendar::config))]
    Config(String),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Server error: {0}")]
    #[diagnostic(code(elphi_calendar::server))]
    Server(String),

    #[error(transparent)]
    #[diagnostic(code(elphi_calendar::io))]
    Io(#[from] std::io::Error),

    #[error("Metrics error: {0}")]
    #[diagnostic(code(elphi_calendar::metrics))]
    Metrics(#[from] prometheus::Error),
}

// Implement From for TOML deserialization errors
impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Type alias for Result with our Error type
pub type AppResult<T> = Result<T, Error>;

/// Helper to create environment errors
pub fn env_error(var: &str, message: &str) -> Error {
    Error::Environment(format!("Invalid environment variable {}: {}", var, message))
}

/// Helper to create configuration errors
pub fn config_error(message: &str) -> Error {
    Error::Config(message.to_string())
}

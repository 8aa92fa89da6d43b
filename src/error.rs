use miette::{Diagnostic, Result};
use thiserror::Error;

/// Main error type for the application
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("CalDAV error: {0}")]
    #[diagnostic(code(muistutin::caldav))]
    CalDav(String),

    #[error("Telegram API error: {0}")]
    #[diagnostic(code(muistutin::telegram))]
    Telegram(String),

    #[error("HTTP error: {0}")]
    #[diagnostic(code(muistutin::http))]
    Http(#[from] reqwest::Error),

    #[error("Environment error: {0}")]
    #[diagnostic(code(muistutin::environment))]
    Environment(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(muistutin::config))]
    Config(String),

    #[error("Component error: {0}")]
    #[diagnostic(code(muistutin::component))]
    Component(String),

    #[error(transparent)]
    #[diagnostic(code(muistutin::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(muistutin::serialization))]
    Serialization(String),

    #[error("Other error: {0}")]
    #[diagnostic(code(muistutin::other))]
    Other(String),
}

// Implement From for TOML deserialization errors
impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Type alias for Result with our Error type
pub type BotResult<T> = Result<T, Error>;

/// Helper to create environment errors
pub fn env_error(var: &str) -> Error {
    Error::Environment(format!("Missing environment variable: {}", var))
}

/// Helper to create CalDAV errors
pub fn caldav_error(message: &str) -> Error {
    Error::CalDav(message.to_string())
}

/// Helper to create Telegram errors
pub fn telegram_error(message: &str) -> Error {
    Error::Telegram(message.to_string())
}

/// Helper to create component errors
#[allow(dead_code)]
pub fn component_error(message: &str) -> Error {
    Error::Component(message.to_string())
}

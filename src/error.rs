use miette::{Diagnostic, Result};
use thiserror::Error;

/// Main error type for the application
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Discord API error: {0}")]
    #[diagnostic(code(kalenteribotti::discord_api))]
    DiscordApi(#[from] serenity::Error),

    #[error("Poise framework error: {0}")]
    #[diagnostic(code(kalenteribotti::poise))]
    Poise(#[from] Box<dyn std::error::Error + Send + Sync>),

    #[error("Environment error: {0}")]
    #[diagnostic(code(kalenteribotti::environment))]
    Environment(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(kalenteribotti::config))]
    Config(String),

    #[error("Malformed timestamp: {0}")]
    #[diagnostic(code(kalenteribotti::malformed_timestamp))]
    MalformedTimestamp(String),

    #[error("Could not extract an intent: {0}")]
    #[diagnostic(code(kalenteribotti::extraction_failure))]
    ExtractionFailure(String),

    #[error("Language model quota exceeded: {0}")]
    #[diagnostic(
        code(kalenteribotti::quota_exceeded),
        help("The model provider is rate limiting requests, wait before retrying")
    )]
    QuotaExceeded(String),

    #[error("Language model unavailable: {0}")]
    #[diagnostic(code(kalenteribotti::model_unavailable))]
    ModelUnavailable(String),

    #[error("Event not found: {0}")]
    #[diagnostic(code(kalenteribotti::event_not_found))]
    EventNotFound(String),

    #[error("Calendar store error: {0}")]
    #[diagnostic(code(kalenteribotti::store))]
    Store(String),

    #[error(transparent)]
    #[diagnostic(code(kalenteribotti::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(kalenteribotti::serialization))]
    Serialization(String),

    #[error("Other error: {0}")]
    #[diagnostic(code(kalenteribotti::other))]
    Other(String),
}

// Implement From for TOML deserialization errors
impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Type alias for Result with our Error type
pub type BotResult<T> = Result<T, Error>;

/// Helper to create environment errors
pub fn env_error(var: &str) -> Error {
    Error::Environment(format!("Missing environment variable: {}", var))
}

/// Helper to create configuration errors
pub fn config_error(message: &str) -> Error {
    Error::Config(message.to_string())
}

/// Helper to create calendar store errors
pub fn store_error(message: &str) -> Error {
    Error::Store(message.to_string())
}

/// Helper to create timestamp errors
pub fn malformed_timestamp(message: &str) -> Error {
    Error::MalformedTimestamp(message.to_string())
}

/// Helper to create extraction errors
pub fn extraction_failure(message: &str) -> Error {
    Error::ExtractionFailure(message.to_string())
}

/// Helper to create lookup errors for unknown uids
pub fn event_not_found(uid: &str) -> Error {
    Error::EventNotFound(format!("Could not find event with uid '{}'", uid))
}

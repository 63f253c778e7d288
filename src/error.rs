//! Error types for the mail relay bot.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Channel {name} health check failed: {reason}")]
    HealthCheckFailed { name: String, reason: String },
}

/// Email dispatch errors. Never shown to chat users verbatim.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Invalid {field} address {address:?}: {reason}")]
    InvalidAddress {
        field: &'static str,
        address: String,
        reason: String,
    },

    #[error("Failed to build email: {0}")]
    Build(String),

    #[error("SMTP transport error: {0}")]
    Transport(String),

    #[error("SMTP send timed out after {0:?}")]
    TimedOut(Duration),

    #[error("SMTP send task failed: {0}")]
    TaskFailed(String),
}

//! Error types for routeguard
//!
//! Library-level errors surface through `RouteError`. Per-candidate failures
//! during fallback execution are a separate, non-escaping type
//! (`crate::fallback::AttemptError`) because a single bad provider must never
//! fail the whole request.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum RouteError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read config file at {path}: {source}")]
    ConfigFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    ConfigParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed for {path}: {reason}")]
    ConfigValidationFailed { path: String, reason: String },

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Routing failed: {0}")]
    RoutingFailed(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Health probe failed for {component}: {reason}")]
    ProbeFailed { component: String, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for Results
pub type RouteResult<T> = Result<T, RouteError>;

//! Core error types for pomotray-core.
//!
//! Every store and gateway call returns one of these explicitly; callers
//! decide on the fallback instead of catching broadly.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for pomotray-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Persistence store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// External service errors
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dot-path key
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Data directory could not be prepared
    #[error("Cannot prepare data directory {path}: {source}")]
    DataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by a [`crate::storage::PersistenceStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// Transport failure talking to a remote store
    #[error("request to {path} failed: {message}")]
    Http { path: String, message: String },

    /// Remote store answered with a non-success status
    #[error("store returned HTTP {status} for {path}")]
    Status { path: String, status: u16 },

    /// Local database failure
    #[error("database error: {0}")]
    Database(String),

    /// Stored document could not be decoded
    #[error("cannot decode document at {path}: {message}")]
    Decode { path: String, message: String },

    /// `update_field` target exists but is not an object
    #[error("document at {0} is not an object")]
    NotAnObject(String),
}

/// Errors raised by external service gateways.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Transport failure
    #[error("{service}: request failed: {message}")]
    Http { service: &'static str, message: String },

    /// Non-success HTTP status
    #[error("{service}: HTTP {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// Playback device not present on the account
    #[error("playback device '{name}' not found (available: {available:?})")]
    DeviceNotFound { name: String, available: Vec<String> },

    /// Habit name does not exist on the habit tracker
    #[error("habit '{0}' not found")]
    HabitNotFound(String),

    /// Required secret is not set
    #[error("missing secret: {0}")]
    MissingSecret(&'static str),

    /// External command failed to run or exited unsuccessfully
    #[error("command '{program}' failed: {message}")]
    Command { program: String, message: String },
}

/// Validation errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// Command not allowed in the current state
    #[error("'{command}' is not available while {state}")]
    NotAllowed { command: String, state: String },

    /// Feature cannot be enabled because its gateway is unavailable
    #[error("feature '{0}' is unavailable")]
    FeatureUnavailable(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

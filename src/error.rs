//! Error types for the refresh rate policy engine and its host daemon.
//!
//! The engine reports argument and lookup failures through [`RefreshRateError`].
//! The daemon components each carry their own enum, folded into [`DaemonError`].

use crate::refresh_rate::ConfigId;
use thiserror::Error;

/// Errors raised by the refresh rate engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RefreshRateError {
    /// A policy update was rejected; engine state is unchanged.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Lookup of a configuration id that is not in the catalog.
    #[error("Display config {0} not found")]
    NotFound(ConfigId),

    /// A supplied display configuration cannot produce a finite frame rate.
    #[error("Display config {config_id} has invalid vsync period {vsync_period}ns")]
    InvalidConfig {
        config_id: ConfigId,
        vsync_period: i64,
    },

    #[error("Display config {0} supplied more than once")]
    DuplicateConfigId(ConfigId),

    #[error("No display configs supplied")]
    EmptyCatalog,
}

/// Errors related to IPC server operations.
#[derive(Error, Debug)]
pub enum IpcError {
    #[error("Failed to bind socket at '{path}': {source}")]
    SocketBindFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid command received: {0}")]
    InvalidCommand(String),

    #[error("Failed to serialize response: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors related to configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration '{path}': {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Errors related to logging initialization.
#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Could not determine a data directory for log files")]
    DataDirectoryNotFound,

    #[error("Failed to create log directory '{path}': {source}")]
    DirectoryCreationFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create log file appender: {0}")]
    AppenderCreationFailed(String),
}

/// Top-level daemon errors.
#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("Refresh rate engine error: {0}")]
    Engine(#[from] RefreshRateError),

    #[error("IPC error: {0}")]
    Ipc(#[from] IpcError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),
}

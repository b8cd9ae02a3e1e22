//! Core error types for PhoneProbe.
//!
//! This module defines the central error type shared by the scanner crates.
//! Subsystem-specific errors (database, scanning) live in their own crates.

use thiserror::Error;

/// Central error type for PhoneProbe operations.
#[derive(Error, Debug)]
pub enum PhoneProbeError {
    /// Configuration errors (file loading, parsing, validation)
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Caller supplied a malformed or empty phone identifier
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to determine config directory path
    #[error("could not determine config directory (XDG base directories not available)")]
    NoConfigDir,

    /// Failed to parse TOML
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// I/O error reading config
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },
}

/// Result type alias using `PhoneProbeError`.
pub type Result<T> = std::result::Result<T, PhoneProbeError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

//! PhoneProbe Core - Foundation crate for the PhoneProbe scanner.
//!
//! This crate provides shared types, error handling and configuration
//! management that the database, scanner and application crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths and env overrides
//! - [`types`] - Shared newtypes and records (`Identifier`, `ScanRecord`, `ProbeResult`)
//!
//! # Example
//!
//! ```rust
//! use phoneprobe_core::{AppConfig, Identifier};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! assert_eq!(config.scanning.max_bulk_items, 25);
//!
//! let id = Identifier::normalize("(555) 010-0199", "1")?;
//! assert_eq!(id.as_str(), "15550100199");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, DatabaseConfig, ProxyConfig, ScanningConfig};
pub use error::{ConfigError, ConfigResult, PhoneProbeError, Result};
pub use types::{
    EndpointTemplate, FetchRoute, Identifier, ProbeResult, ScanRecord, ScanStats,
    IDENTIFIER_PLACEHOLDER,
};

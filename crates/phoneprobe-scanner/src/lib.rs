//! PhoneProbe Scanner - Endpoint probing and scan orchestration.
//!
//! This crate resolves a phone identifier against a fixed set of image
//! endpoints, fetches them concurrently through a proxy-first/direct-fallback
//! strategy, aggregates the outcomes into a `ScanRecord` and persists it.
//!
//! # Features
//!
//! - Concurrent fan-out/fan-in over every endpoint of a scan
//! - Random proxy and User-Agent selection from immutable pools
//! - Direct fallback when the proxied attempt fails for any reason
//! - Sequential, delay-throttled bulk scanning
//! - Non-fatal persistence: storage errors are logged, not returned
//!
//! # Example
//!
//! ```rust,ignore
//! use phoneprobe_scanner::ScanOrchestrator;
//! use std::sync::Arc;
//!
//! let orchestrator = ScanOrchestrator::from_config(&config, Arc::new(database))?;
//! let record = orchestrator.scan("+1 (555) 010-0199", "1").await?;
//! println!("{} private hits", record.private_hit_count);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod endpoints;
pub mod error;
pub mod fetch;
pub mod fingerprint;
pub mod orchestrator;

// Re-export commonly used types
pub use endpoints::{EndpointSet, ResolvedEndpoint};
pub use error::{Result, ScanError};
pub use fetch::{
    FetchOutcome, FetchSettings, FetchStrategy, HttpRequest, HttpResponse, HttpTransport,
    ReqwestTransport, TransportError,
};
pub use fingerprint::{Picker, RandomPicker, UserAgentPool};
pub use orchestrator::{BulkItem, BulkRequest, History, ScanOrchestrator};

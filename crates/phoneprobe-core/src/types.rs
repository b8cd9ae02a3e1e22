//! Shared types used across PhoneProbe.
//!
//! This module defines the identifier newtype, endpoint templates and the
//! records a scan produces.

use crate::error::PhoneProbeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder substituted with the identifier in endpoint URL patterns.
pub const IDENTIFIER_PLACEHOLDER: &str = "{id}";

/// Canonical phone identifier: country code followed by the digits of the number.
///
/// Used both as the probe payload and as the unique storage key of a
/// [`ScanRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Normalize a raw phone string and country code into an identifier.
    ///
    /// Every non-digit character is stripped from `raw_phone`; `country_code`
    /// is prepended verbatim.
    ///
    /// # Errors
    /// Returns `PhoneProbeError::InvalidInput` if no digits remain in `raw_phone`.
    pub fn normalize(raw_phone: &str, country_code: &str) -> Result<Self, PhoneProbeError> {
        let digits: String = raw_phone.chars().filter(char::is_ascii_digit).collect();

        if digits.is_empty() {
            return Err(PhoneProbeError::InvalidInput(format!(
                "phone number contains no digits: '{raw_phone}'"
            )));
        }

        Ok(Self(format!("{country_code}{digits}")))
    }

    /// Wrap an identifier that was already normalized, e.g. a stored key.
    #[must_use]
    pub fn from_normalized(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A parametrized endpoint URL probed for every identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointTemplate {
    /// URL with exactly one [`IDENTIFIER_PLACEHOLDER`]
    pub url_pattern: String,
    /// Whether the endpoint serves a contact-scoped (non-public) resource
    #[serde(default)]
    pub is_private_variant: bool,
}

impl EndpointTemplate {
    /// Create a new endpoint template.
    #[must_use]
    pub fn new(url_pattern: impl Into<String>, is_private_variant: bool) -> Self {
        Self {
            url_pattern: url_pattern.into(),
            is_private_variant,
        }
    }
}

/// Network path that produced a probe outcome.
///
/// Diagnostic only: it never changes whether a probe counts as succeeded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchRoute {
    /// Fetched through a proxy from the pool
    Proxy,
    /// Fetched without a proxy after the proxied attempt failed
    Direct,
    /// Neither attempt succeeded
    #[default]
    Unreachable,
}

/// Outcome of fetching one resolved endpoint URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Fully resolved URL that was fetched
    pub endpoint_url: String,
    /// Whether the endpoint is a private variant
    pub is_private_variant: bool,
    /// Whether the endpoint returned an image
    pub succeeded: bool,
    /// Payload size in bytes, when known
    pub response_byte_size: Option<u64>,
    /// When the fetch settled
    pub observed_at: DateTime<Utc>,
    /// Path taken to reach the endpoint
    #[serde(default)]
    pub route: FetchRoute,
}

/// Aggregated outcome of probing every endpoint for one identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    /// Normalized phone identifier (unique key)
    pub identifier: Identifier,
    /// Country code the identifier was built from
    pub country_code: String,
    /// Successful probes, in endpoint declaration order
    pub probe_results: Vec<ProbeResult>,
    /// Number of successful private-variant probes
    pub private_hit_count: u32,
    /// `100 * successes / endpoint count`
    pub success_rate_percent: f64,
    /// Wall-clock time from dispatch to all probes settled
    pub scan_duration_seconds: f64,
    /// When the scan finished
    pub created_at: DateTime<Utc>,
}

/// Summary statistics over every stored scan record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanStats {
    /// Number of stored scan records
    pub total_scans: u64,
    /// Sum of private hits across records
    pub total_private_hits: u64,
    /// Mean success rate across records (0 when empty)
    pub avg_success_rate: f64,
    /// Number of distinct identifiers
    pub unique_identifiers: u64,
}

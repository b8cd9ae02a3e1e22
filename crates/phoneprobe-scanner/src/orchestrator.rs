//! Scan orchestrator for probing every endpoint of one identifier.
//!
//! This module provides the `ScanOrchestrator`, which fans out one fetch per
//! endpoint, waits for all of them to settle, folds the outcomes into a
//! `ScanRecord` and upserts it. Bulk requests run sequentially with a fixed
//! delay between items.

use crate::endpoints::{EndpointSet, ResolvedEndpoint};
use crate::error::{Result, ScanError};
use crate::fetch::{FetchOutcome, FetchStrategy};
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use phoneprobe_core::{AppConfig, Identifier, ProbeResult, ScanRecord, ScanStats, ScanningConfig};
use phoneprobe_db::ScanStore;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default upper bound on items accepted by one bulk request.
pub const MAX_BULK_ITEMS: usize = 25;

/// Default pause between consecutive bulk items.
pub const BULK_DELAY: Duration = Duration::from_secs(3);

/// One input of a bulk request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkRequest {
    /// Raw phone number as entered
    pub raw_phone: String,
    /// Country code prefix
    pub country_code: String,
}

impl BulkRequest {
    /// Create a bulk request item.
    #[must_use]
    pub fn new(raw_phone: impl Into<String>, country_code: impl Into<String>) -> Self {
        Self {
            raw_phone: raw_phone.into(),
            country_code: country_code.into(),
        }
    }
}

/// Per-item result of a bulk request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BulkItem {
    /// The scan completed
    Scanned(ScanRecord),
    /// The scan failed; the rest of the batch still ran
    Failed {
        /// Raw phone number of the failed item
        raw_phone: String,
        /// Country code of the failed item
        country_code: String,
        /// Error description
        error: String,
    },
}

impl BulkItem {
    /// Whether this item produced a record.
    #[must_use]
    pub fn is_scanned(&self) -> bool {
        matches!(self, Self::Scanned(_))
    }
}

/// Result of a history lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum History {
    /// Lookup of a single identifier
    Single(Option<ScanRecord>),
    /// Most recent records, newest first
    Recent(Vec<ScanRecord>),
}

/// Coordinates probing, aggregation and persistence of scans.
pub struct ScanOrchestrator {
    /// Endpoint templates probed per scan
    endpoints: Arc<EndpointSet>,
    /// Proxy-first fetcher
    fetcher: Arc<FetchStrategy>,
    /// Persistence for finished records
    store: Arc<dyn ScanStore>,
    /// Pause between bulk items
    bulk_delay: Duration,
    /// Items beyond this bound are dropped from bulk requests
    max_bulk_items: usize,
    /// Number of records returned by a history listing
    history_limit: u32,
}

impl ScanOrchestrator {
    /// Create a new scan orchestrator with default bulk settings.
    #[must_use]
    pub fn new(
        endpoints: Arc<EndpointSet>,
        fetcher: Arc<FetchStrategy>,
        store: Arc<dyn ScanStore>,
    ) -> Self {
        let defaults = ScanningConfig::default();
        Self {
            endpoints,
            fetcher,
            store,
            bulk_delay: BULK_DELAY,
            max_bulk_items: MAX_BULK_ITEMS,
            history_limit: defaults.history_limit,
        }
    }

    /// Build an orchestrator with a `reqwest` fetcher from application config.
    pub fn from_config(config: &AppConfig, store: Arc<dyn ScanStore>) -> Result<Self> {
        let endpoints = EndpointSet::from_config(&config.endpoints)?;
        let fetcher = FetchStrategy::from_config(config)?;

        Ok(Self::new(Arc::new(endpoints), Arc::new(fetcher), store)
            .with_bulk_delay(config.scanning.bulk_delay())
            .with_max_bulk_items(config.scanning.max_bulk_items)
            .with_history_limit(config.scanning.history_limit))
    }

    /// Set the pause inserted between bulk items.
    #[must_use]
    pub fn with_bulk_delay(mut self, delay: Duration) -> Self {
        self.bulk_delay = delay;
        self
    }

    /// Set the maximum number of items processed per bulk request.
    #[must_use]
    pub fn with_max_bulk_items(mut self, max: usize) -> Self {
        self.max_bulk_items = max;
        self
    }

    /// Set the number of records returned by [`Self::history`] listings.
    #[must_use]
    pub fn with_history_limit(mut self, limit: u32) -> Self {
        self.history_limit = limit;
        self
    }

    /// Number of endpoints probed per scan.
    #[must_use]
    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    /// Scan one phone number across every endpoint.
    ///
    /// Individual endpoint failures are folded into the record. A storage
    /// failure is logged and the record is still returned.
    ///
    /// # Errors
    /// Returns `ScanError::InvalidInput` if the phone number has no digits.
    pub async fn scan(&self, raw_phone: &str, country_code: &str) -> Result<ScanRecord> {
        let identifier = Identifier::normalize(raw_phone, country_code)?;
        let targets = self.endpoints.resolve(&identifier);

        tracing::debug!("Scanning {} across {} endpoints", identifier, targets.len());

        let started = Instant::now();
        let outcomes = self.probe_all(&targets).await;
        let elapsed = started.elapsed();

        let record = self.aggregate(identifier, country_code, &targets, outcomes, elapsed);

        tracing::info!(
            "Scan of {} finished: {} hits ({} private), {:.1}% in {:.2}s",
            record.identifier,
            record.probe_results.len(),
            record.private_hit_count,
            record.success_rate_percent,
            record.scan_duration_seconds
        );

        if let Err(e) = self.store.upsert(&record).await {
            tracing::error!("Failed to persist scan of {}: {}", record.identifier, e);
        }

        Ok(record)
    }

    /// Scan several phone numbers one after another.
    ///
    /// Only the first `max_bulk_items` inputs are processed; the rest are
    /// dropped. A fixed delay separates consecutive items. Failed items are
    /// reported inline and do not stop the batch.
    pub async fn bulk_scan(&self, requests: &[BulkRequest]) -> Vec<BulkItem> {
        if requests.len() > self.max_bulk_items {
            tracing::warn!(
                "Bulk request of {} items truncated to {}",
                requests.len(),
                self.max_bulk_items
            );
        }

        let batch = &requests[..requests.len().min(self.max_bulk_items)];
        let mut results = Vec::with_capacity(batch.len());

        for (index, request) in batch.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.bulk_delay).await;
            }

            let item = match self.scan(&request.raw_phone, &request.country_code).await {
                Ok(record) => BulkItem::Scanned(record),
                Err(e) => {
                    tracing::warn!(
                        "Bulk item {}/{} ({}) failed: {}",
                        index + 1,
                        batch.len(),
                        request.raw_phone,
                        e
                    );
                    BulkItem::Failed {
                        raw_phone: request.raw_phone.clone(),
                        country_code: request.country_code.clone(),
                        error: e.to_string(),
                    }
                }
            };
            results.push(item);
        }

        results
    }

    /// Look up one identifier, or list the most recent records when `None`.
    pub async fn history(&self, identifier: Option<&str>) -> Result<History> {
        match identifier {
            Some(id) => Ok(History::Single(self.store.get_by_identifier(id).await?)),
            None => Ok(History::Recent(
                self.store.list_recent(self.history_limit).await?,
            )),
        }
    }

    /// Aggregate statistics over every stored record.
    pub async fn stats(&self) -> Result<ScanStats> {
        Ok(self.store.aggregate_stats().await?)
    }

    /// Remove the stored record for an identifier.
    pub async fn forget(&self, identifier: &str) -> Result<bool> {
        self.store.delete(identifier).await.map_err(ScanError::from)
    }

    /// Fetch every target concurrently and return outcomes in target order.
    async fn probe_all(&self, targets: &[ResolvedEndpoint]) -> Vec<FetchOutcome> {
        let mut futures: FuturesUnordered<_> = targets
            .iter()
            .enumerate()
            .map(|(index, target)| async move {
                let outcome = self.fetcher.fetch(&target.url).await;
                (index, outcome)
            })
            .collect();

        let mut settled = Vec::with_capacity(targets.len());
        while let Some(result) = futures.next().await {
            settled.push(result);
        }

        settled.sort_by_key(|(index, _)| *index);
        settled.into_iter().map(|(_, outcome)| outcome).collect()
    }

    fn aggregate(
        &self,
        identifier: Identifier,
        country_code: &str,
        targets: &[ResolvedEndpoint],
        outcomes: Vec<FetchOutcome>,
        elapsed: Duration,
    ) -> ScanRecord {
        let observed_at = Utc::now();
        let mut private_hit_count = 0u32;

        let probe_results: Vec<ProbeResult> = targets
            .iter()
            .zip(outcomes)
            .filter(|(_, outcome)| outcome.succeeded)
            .map(|(target, outcome)| {
                if target.is_private_variant {
                    private_hit_count += 1;
                }
                ProbeResult {
                    endpoint_url: target.url.clone(),
                    is_private_variant: target.is_private_variant,
                    succeeded: true,
                    response_byte_size: outcome.byte_size,
                    observed_at,
                    route: outcome.route,
                }
            })
            .collect();

        ScanRecord {
            identifier,
            country_code: country_code.to_string(),
            success_rate_percent: success_rate(probe_results.len(), self.endpoints.len()),
            probe_results,
            private_hit_count,
            scan_duration_seconds: elapsed.as_secs_f64(),
            created_at: observed_at,
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn success_rate(successes: usize, endpoint_count: usize) -> f64 {
    if endpoint_count == 0 {
        return 0.0;
    }
    100.0 * successes as f64 / endpoint_count as f64
}

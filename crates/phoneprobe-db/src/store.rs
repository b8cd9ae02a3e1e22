//! Storage seam used by the scan orchestrator.
//!
//! The orchestrator only talks to a `ScanStore`, so tests can swap the
//! `SQLite` database for a fake and assert on its state.

use crate::error::Result;
use crate::{scan_records, Database};
use async_trait::async_trait;
use phoneprobe_core::{ScanRecord, ScanStats};

/// Persistence for scan records, keyed by identifier.
///
/// Implementations must be safe to call concurrently. Upserts to the same
/// identifier may race; the last writer wins.
#[async_trait]
pub trait ScanStore: Send + Sync {
    /// Insert or fully replace the record for `record.identifier`.
    async fn upsert(&self, record: &ScanRecord) -> Result<()>;

    /// Get the record for an identifier, or `None` if it was never scanned.
    async fn get_by_identifier(&self, identifier: &str) -> Result<Option<ScanRecord>>;

    /// Most recently created records first, at most `limit`.
    async fn list_recent(&self, limit: u32) -> Result<Vec<ScanRecord>>;

    /// Summary statistics computed over all records at call time.
    async fn aggregate_stats(&self) -> Result<ScanStats>;

    /// Remove the record for an identifier. Returns whether one existed.
    async fn delete(&self, identifier: &str) -> Result<bool>;
}

#[async_trait]
impl ScanStore for Database {
    async fn upsert(&self, record: &ScanRecord) -> Result<()> {
        scan_records::upsert(self.pool(), record).await
    }

    async fn get_by_identifier(&self, identifier: &str) -> Result<Option<ScanRecord>> {
        scan_records::get_by_identifier(self.pool(), identifier).await
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<ScanRecord>> {
        scan_records::list_recent(self.pool(), limit).await
    }

    async fn aggregate_stats(&self) -> Result<ScanStats> {
        scan_records::aggregate_stats(self.pool()).await
    }

    async fn delete(&self, identifier: &str) -> Result<bool> {
        scan_records::delete(self.pool(), identifier).await
    }
}

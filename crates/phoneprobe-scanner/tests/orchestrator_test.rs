use async_trait::async_trait;
use phoneprobe_core::{EndpointTemplate, FetchRoute, ProxyConfig, ScanRecord, ScanStats};
use phoneprobe_db::{Database, DatabaseError, ScanStore};
use phoneprobe_scanner::{
    BulkItem, BulkRequest, EndpointSet, FetchSettings, FetchStrategy, History, HttpRequest,
    HttpResponse, HttpTransport, ScanError, ScanOrchestrator, TransportError,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How the fake network treats one endpoint.
#[derive(Debug, Clone, Copy)]
enum Behavior {
    /// Image through the proxy
    Image,
    /// Proxy refuses; direct returns an image
    DirectOnly,
    /// Everything 404s
    Missing,
}

struct FakeNetwork {
    /// Behavior keyed by URL substring
    rules: Vec<(&'static str, Behavior)>,
    latency: Duration,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    proxied_calls: AtomicUsize,
}

impl FakeNetwork {
    fn new(rules: Vec<(&'static str, Behavior)>) -> Arc<Self> {
        Self::with_latency(rules, Duration::ZERO)
    }

    fn with_latency(rules: Vec<(&'static str, Behavior)>, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            rules,
            latency,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            proxied_calls: AtomicUsize::new(0),
        })
    }

    fn behavior(&self, url: &str) -> Behavior {
        self.rules
            .iter()
            .find(|(needle, _)| url.contains(needle))
            .map_or(Behavior::Missing, |(_, b)| *b)
    }
}

fn image() -> HttpResponse {
    HttpResponse {
        status: 200,
        content_type: Some("image/jpeg".to_string()),
        body: vec![0u8; 256],
    }
}

fn not_found() -> HttpResponse {
    HttpResponse {
        status: 404,
        content_type: Some("text/html".to_string()),
        body: Vec::new(),
    }
}

#[async_trait]
impl HttpTransport for FakeNetwork {
    async fn get(&self, request: HttpRequest<'_>) -> Result<HttpResponse, TransportError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if request.proxy.is_some() {
            self.proxied_calls.fetch_add(1, Ordering::SeqCst);
        }

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match (self.behavior(request.url), request.proxy.is_some()) {
            (Behavior::Image, _) | (Behavior::DirectOnly, false) => Ok(image()),
            (Behavior::DirectOnly, true) => Err(TransportError::Connect(
                "proxy refused connection".to_string(),
            )),
            (Behavior::Missing, _) => Ok(not_found()),
        }
    }
}

/// In-memory store used where `SQLite` worker threads would fight a paused clock.
#[derive(Default)]
struct MemoryStore {
    records: Mutex<HashMap<String, ScanRecord>>,
}

#[async_trait]
impl ScanStore for MemoryStore {
    async fn upsert(&self, record: &ScanRecord) -> phoneprobe_db::Result<()> {
        self.records
            .lock()
            .unwrap()
            .insert(record.identifier.to_string(), record.clone());
        Ok(())
    }

    async fn get_by_identifier(&self, identifier: &str) -> phoneprobe_db::Result<Option<ScanRecord>> {
        Ok(self.records.lock().unwrap().get(identifier).cloned())
    }

    async fn list_recent(&self, limit: u32) -> phoneprobe_db::Result<Vec<ScanRecord>> {
        let mut records: Vec<_> = self.records.lock().unwrap().values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit as usize);
        Ok(records)
    }

    async fn aggregate_stats(&self) -> phoneprobe_db::Result<ScanStats> {
        let records = self.records.lock().unwrap();
        Ok(ScanStats {
            total_scans: records.len() as u64,
            unique_identifiers: records.len() as u64,
            ..ScanStats::default()
        })
    }

    async fn delete(&self, identifier: &str) -> phoneprobe_db::Result<bool> {
        Ok(self.records.lock().unwrap().remove(identifier).is_some())
    }
}

/// Store whose every call fails.
struct BrokenStore;

#[async_trait]
impl ScanStore for BrokenStore {
    async fn upsert(&self, _record: &ScanRecord) -> phoneprobe_db::Result<()> {
        Err(DatabaseError::Open("disk unavailable".to_string()))
    }

    async fn get_by_identifier(&self, _identifier: &str) -> phoneprobe_db::Result<Option<ScanRecord>> {
        Err(DatabaseError::Open("disk unavailable".to_string()))
    }

    async fn list_recent(&self, _limit: u32) -> phoneprobe_db::Result<Vec<ScanRecord>> {
        Err(DatabaseError::Open("disk unavailable".to_string()))
    }

    async fn aggregate_stats(&self) -> phoneprobe_db::Result<ScanStats> {
        Err(DatabaseError::Open("disk unavailable".to_string()))
    }

    async fn delete(&self, _identifier: &str) -> phoneprobe_db::Result<bool> {
        Err(DatabaseError::Open("disk unavailable".to_string()))
    }
}

fn three_endpoints() -> Arc<EndpointSet> {
    Arc::new(
        EndpointSet::new(vec![
            EndpointTemplate::new("https://pub-a.example.net/{id}.jpg", false),
            EndpointTemplate::new("https://priv-b.example.net/{id}.jpg", true),
            EndpointTemplate::new("https://pub-c.example.net/{id}.jpg", false),
        ])
        .expect("valid endpoint set"),
    )
}

fn proxy_pool() -> Vec<ProxyConfig> {
    vec![ProxyConfig::parse("probe:secret@proxy.local:3128").expect("parse proxy")]
}

fn orchestrator(
    endpoints: Arc<EndpointSet>,
    network: Arc<FakeNetwork>,
    store: Arc<dyn ScanStore>,
) -> ScanOrchestrator {
    let fetcher = FetchStrategy::new(network, proxy_pool(), FetchSettings::default());
    ScanOrchestrator::new(endpoints, Arc::new(fetcher), store)
}

async fn create_test_db() -> Arc<Database> {
    let db = Database::new(":memory:")
        .await
        .expect("create test database");
    db.run_migrations().await.expect("run migrations");
    Arc::new(db)
}

#[tokio::test]
async fn test_partial_success_aggregation() {
    let db = create_test_db().await;
    let network = FakeNetwork::new(vec![
        ("pub-a", Behavior::Image),
        ("priv-b", Behavior::Image),
        ("pub-c", Behavior::Missing),
    ]);
    let orchestrator = orchestrator(three_endpoints(), network, db.clone());

    let record = orchestrator
        .scan("(555) 010-0199", "1")
        .await
        .expect("scan should succeed");

    assert_eq!(record.identifier.as_str(), "15550100199");
    assert_eq!(record.country_code, "1");
    assert_eq!(record.private_hit_count, 1);
    assert!((record.success_rate_percent - 66.7).abs() < 0.1);
    assert_eq!(record.probe_results.len(), 2);
    assert!(record.probe_results[0].endpoint_url.contains("pub-a"));
    assert!(record.probe_results[1].endpoint_url.contains("priv-b"));
    assert!(record.probe_results.iter().all(|p| p.succeeded));
    assert!(record.probe_results.iter().all(|p| p.response_byte_size == Some(256)));

    let stored = db
        .get_by_identifier("15550100199")
        .await
        .expect("get record")
        .expect("record persisted");
    assert_eq!(stored, record);
}

#[tokio::test]
async fn test_direct_fallback_succeeds_when_every_proxy_fails() {
    let db = create_test_db().await;
    let network = FakeNetwork::new(vec![("example.net", Behavior::DirectOnly)]);
    let orchestrator = orchestrator(three_endpoints(), network.clone(), db);

    let record = orchestrator.scan("5550100", "44").await.expect("scan");

    assert_eq!(network.proxied_calls.load(Ordering::SeqCst), 3);
    assert_eq!(record.probe_results.len(), 3);
    assert!(record
        .probe_results
        .iter()
        .all(|p| p.succeeded && p.route == FetchRoute::Direct));
    assert!((record.success_rate_percent - 100.0).abs() < f64::EPSILON);
    assert_eq!(record.private_hit_count, 1);
}

#[tokio::test]
async fn test_empty_phone_is_invalid_input() {
    let db = create_test_db().await;
    let network = FakeNetwork::new(vec![("example.net", Behavior::Image)]);
    let orchestrator = orchestrator(three_endpoints(), network.clone(), db.clone());

    let result = orchestrator.scan("", "1").await;

    assert!(matches!(result, Err(ScanError::InvalidInput(_))));
    assert_eq!(network.proxied_calls.load(Ordering::SeqCst), 0);
    let stats = db.aggregate_stats().await.expect("stats");
    assert_eq!(stats.total_scans, 0);
}

#[tokio::test]
async fn test_persistence_failure_does_not_fail_scan() {
    let network = FakeNetwork::new(vec![("priv-b", Behavior::Image)]);
    let orchestrator = orchestrator(three_endpoints(), network, Arc::new(BrokenStore));

    let record = orchestrator
        .scan("555 0100", "1")
        .await
        .expect("scan survives storage failure");

    assert_eq!(record.private_hit_count, 1);
    assert_eq!(record.probe_results.len(), 1);

    // Query operations still surface the storage error
    assert!(matches!(
        orchestrator.stats().await,
        Err(ScanError::Storage(_))
    ));
}

#[tokio::test]
async fn test_rescan_replaces_previous_record() {
    let db = create_test_db().await;

    let all_up = FakeNetwork::new(vec![("example.net", Behavior::Image)]);
    orchestrator(three_endpoints(), all_up, db.clone())
        .scan("5550100", "1")
        .await
        .expect("first scan");

    let all_down = FakeNetwork::new(Vec::new());
    let second = orchestrator(three_endpoints(), all_down, db.clone())
        .scan("555-0100", "1")
        .await
        .expect("second scan");

    let stored = db
        .get_by_identifier("15550100")
        .await
        .expect("get record")
        .expect("record exists");
    assert_eq!(stored, second);
    assert!(stored.probe_results.is_empty());
    assert_eq!(stored.private_hit_count, 0);

    let stats = db.aggregate_stats().await.expect("stats");
    assert_eq!(stats.unique_identifiers, 1);
}

#[tokio::test]
async fn test_record_invariants_hold_with_default_endpoints() {
    let db = create_test_db().await;
    let endpoints = Arc::new(EndpointSet::default());
    let e = endpoints.len();
    let network = FakeNetwork::new(vec![
        ("profile", Behavior::Image),
        ("contact", Behavior::DirectOnly),
        ("/c/", Behavior::Missing),
    ]);
    let orchestrator = orchestrator(endpoints, network, db);

    let record = orchestrator.scan("+351 912 345 678", "351").await.expect("scan");

    let private_successes = record
        .probe_results
        .iter()
        .filter(|p| p.succeeded && p.is_private_variant)
        .count();
    assert_eq!(record.private_hit_count as usize, private_successes);
    assert!(record.private_hit_count as usize <= e);
    assert!((0.0..=100.0).contains(&record.success_rate_percent));
    #[allow(clippy::cast_precision_loss)]
    let expected = 100.0 * record.probe_results.len() as f64 / e as f64;
    assert!((record.success_rate_percent - expected).abs() < 1e-9);
    assert!(record.scan_duration_seconds >= 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_endpoints_are_fetched_concurrently() {
    let endpoints = Arc::new(EndpointSet::default());
    let network = FakeNetwork::with_latency(
        vec![("avatar-cdn", Behavior::Image)],
        Duration::from_secs(1),
    );
    let orchestrator = orchestrator(endpoints.clone(), network.clone(), Arc::new(MemoryStore::default()));

    let started = tokio::time::Instant::now();
    let record = orchestrator.scan("5550100", "1").await.expect("scan");

    assert_eq!(record.probe_results.len(), endpoints.len());
    assert_eq!(network.peak_in_flight.load(Ordering::SeqCst), endpoints.len());
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_bulk_scan_truncates_and_throttles() {
    let network = FakeNetwork::new(vec![("example.net", Behavior::Image)]);
    let store = Arc::new(MemoryStore::default());
    let orchestrator = orchestrator(three_endpoints(), network, store.clone());

    let requests: Vec<BulkRequest> = (0..30)
        .map(|i| BulkRequest::new(format!("555-01{i:02}"), "1"))
        .collect();

    let started = tokio::time::Instant::now();
    let results = orchestrator.bulk_scan(&requests).await;

    assert_eq!(results.len(), 25);
    assert!(results.iter().all(BulkItem::is_scanned));
    assert!(started.elapsed() >= Duration::from_secs(24 * 3));
    assert_eq!(store.records.lock().unwrap().len(), 25);
    assert!(store.records.lock().unwrap().contains_key("15550124"));
    assert!(!store.records.lock().unwrap().contains_key("15550125"));
}

#[tokio::test(start_paused = true)]
async fn test_bulk_scan_isolates_failures() {
    let network = FakeNetwork::new(vec![("example.net", Behavior::Image)]);
    let orchestrator = orchestrator(three_endpoints(), network, Arc::new(MemoryStore::default()))
        .with_bulk_delay(Duration::from_millis(10));

    let requests = vec![
        BulkRequest::new("5550100", "1"),
        BulkRequest::new("not a number", "1"),
        BulkRequest::new("5550101", "1"),
    ];

    let results = orchestrator.bulk_scan(&requests).await;

    assert_eq!(results.len(), 3);
    assert!(results[0].is_scanned());
    match &results[1] {
        BulkItem::Failed {
            raw_phone, error, ..
        } => {
            assert_eq!(raw_phone, "not a number");
            assert!(error.contains("invalid input"));
        }
        other => panic!("Expected failed item, got {other:?}"),
    }
    assert!(results[2].is_scanned());
}

#[tokio::test]
async fn test_history_and_stats() {
    let db = create_test_db().await;
    let network = FakeNetwork::new(vec![("priv-b", Behavior::Image), ("pub-a", Behavior::Image)]);
    let orchestrator = orchestrator(three_endpoints(), network, db);

    orchestrator.scan("5550100", "1").await.expect("scan one");
    orchestrator.scan("5550200", "1").await.expect("scan two");

    match orchestrator.history(Some("15550100")).await.expect("history") {
        History::Single(Some(record)) => assert_eq!(record.identifier.as_str(), "15550100"),
        other => panic!("Expected single record, got {other:?}"),
    }

    match orchestrator.history(Some("19999999")).await.expect("history") {
        History::Single(None) => {}
        other => panic!("Expected absent record, got {other:?}"),
    }

    match orchestrator.history(None).await.expect("history") {
        History::Recent(records) => {
            assert_eq!(records.len(), 2);
            assert!(records[0].created_at >= records[1].created_at);
        }
        other => panic!("Expected recent records, got {other:?}"),
    }

    let stats = orchestrator.stats().await.expect("stats");
    assert_eq!(stats.total_scans, 2);
    assert_eq!(stats.unique_identifiers, 2);
    assert_eq!(stats.total_private_hits, 2);
    assert!((stats.avg_success_rate - 200.0 / 3.0).abs() < 1e-9);

    assert!(orchestrator.forget("15550100").await.expect("forget"));
    assert_eq!(orchestrator.stats().await.expect("stats").total_scans, 1);
}

//! Integration tests for the harvester
//!
//! These tests use wiremock to serve a paginated target and run the real
//! reqwest transport, extractor, storage and worker pool end to end.

use serde_json::json;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use sumi_harvest::config::{Config, ProxyEntry, StorageBackend};
use sumi_harvest::output::RunStatus;
use sumi_harvest::storage::SqliteRecordStore;
use sumi_harvest::{submit, FailureKind, FetchPhase, Harvester, ScrapeRequest};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TARGET_PATH: &str = "/review/acme.io";

/// Renders a listing page carrying `reviews` reviews and a pagination block
fn listing_page(reviews: usize, total_pages: u32) -> String {
    let reviews: Vec<_> = (0..reviews)
        .map(|i| json!({"id": format!("r{}", i), "rating": 5}))
        .collect();
    let data = json!({
        "props": {"pageProps": {
            "reviews": reviews,
            "businessUnit": {
                "id": "bu-1",
                "displayName": "Acme",
                "identifyingName": "acme.io",
                "numberOfReviews": 42,
                "trustScore": 4.5,
                "websiteUrl": "https://acme.io",
                "stars": 4.5,
                "internalOnly": true
            },
            "filters": {"pagination": {"totalPages": total_pages}}
        }}
    });
    format!(
        r#"<html><head><title>Acme</title></head><body><script id="__NEXT_DATA__" type="application/json">{}</script></body></html>"#,
        data
    )
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8")
}

/// Creates a test configuration writing everything under `dir`
fn create_test_config(dir: &Path) -> Config {
    let mut config = Config::default();

    config.scraper.workers = 2;
    config.scraper.request_timeout_ms = 5_000;

    // Very short for testing
    config.retry.general_base_delay_ms = 10;
    config.retry.general_max_delay_ms = 50;
    config.retry.block_backoff_ms = (1..=10).map(|step| step * 5).collect();

    config.throttle.page_delay_min_ms = 0;
    config.throttle.page_delay_max_ms = 0;
    config.throttle.batch_delay_min_ms = 0;
    config.throttle.batch_delay_max_ms = 0;
    config.throttle.global_pause_min_ms = 0;
    config.throttle.global_pause_max_ms = 0;

    config.output.directory = dir.join("scraped").display().to_string();
    config.output.retry_log_path = Some(dir.join("logs/retry_log.md").display().to_string());
    config.output.summary_path = Some(dir.join("summary.md").display().to_string());

    config
}

fn request(server: &MockServer, page_count: Option<u32>) -> ScrapeRequest {
    ScrapeRequest {
        base_url: format!("{}{}", server.uri(), TARGET_PATH),
        page_count,
        worker_count: None,
    }
}

#[tokio::test]
async fn test_full_harvest_json_backend() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TARGET_PATH))
        .respond_with(html(listing_page(3, 3)))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(temp_dir.path());
    let harvester = Arc::new(Harvester::new(config).unwrap());

    let handle = submit(harvester, request(&mock_server, None)).unwrap();
    assert_eq!(handle.ack.status, "accepted");
    let summary = handle.wait().await.unwrap();

    assert_eq!(summary.target, "acme.io");
    assert_eq!(summary.discovered_pages, Some(3));
    assert_eq!(summary.jobs_queued, 4);
    assert_eq!(summary.succeeded, 4);
    assert_eq!(summary.files_saved, 4);
    assert!(summary.profile_saved);
    assert_eq!(summary.review_pages_saved, 3);
    assert_eq!(summary.items_saved, 1 + 3 * 3);
    assert_eq!(summary.status, RunStatus::Success);

    let target_dir = temp_dir.path().join("scraped").join("acme.io");
    for file in [
        "page0_company_profile.json",
        "page1_reviews.json",
        "page2_reviews.json",
        "page3_reviews.json",
    ] {
        assert!(target_dir.join(file).exists(), "missing {}", file);
    }

    // Profile is trimmed to the known fields
    let profile: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(target_dir.join("page0_company_profile.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(profile["displayName"], "Acme");
    assert!(profile.get("internalOnly").is_none());

    let report = std::fs::read_to_string(temp_dir.path().join("summary.md")).unwrap();
    assert!(report.contains("success"));

    // Every request carries the page and languages parameters
    let requests = mock_server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.url.query().unwrap_or("").contains("languages=all")));
}

#[tokio::test]
async fn test_block_signals_rotate_and_recover() {
    let mock_server = MockServer::start().await;

    // Page 3 is blocked twice before it goes through
    Mock::given(method("GET"))
        .and(path(TARGET_PATH))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(403))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(TARGET_PATH))
        .respond_with(html(listing_page(2, 3)))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(temp_dir.path());
    let harvester = Arc::new(Harvester::new(config).unwrap());

    let summary = submit(harvester, request(&mock_server, None))
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 4);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.ledger_entries, 2);
    assert_eq!(summary.status, RunStatus::Success);

    let retry_log = std::fs::read_to_string(temp_dir.path().join("logs/retry_log.md")).unwrap();
    assert_eq!(retry_log.matches("|rotated|").count(), 2);
    assert!(retry_log.contains("page=3"));
}

#[tokio::test]
async fn test_payment_required_fails_without_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(TARGET_PATH))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(402))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(TARGET_PATH))
        .respond_with(html(listing_page(2, 3)))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(temp_dir.path());
    let harvester = Arc::new(Harvester::new(config).unwrap());

    let summary = submit(harvester, request(&mock_server, None))
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.ledger_entries, 0);
    assert_eq!(summary.status, RunStatus::PartialSuccess);

    let failure = &summary.failed_sample[0];
    assert_eq!(failure.page_index, 3);
    assert_eq!(failure.http_status, Some(402));
    assert_eq!(failure.attempts, 1);

    let page_three = mock_server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.query().unwrap_or("").contains("page=3"))
        .count();
    assert_eq!(page_three, 1);
}

/// Starts a proxy that answers every request, CONNECT included, with 402
async fn start_refusing_proxy() -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));

    let counter = hits.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => head.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = socket
                    .write_all(b"HTTP/1.1 402 Payment Required\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                    .await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, hits)
}

#[tokio::test]
async fn test_proxy_payment_required_fails_every_job_once() {
    let (proxy_addr, proxy_hits) = start_refusing_proxy().await;

    let temp_dir = TempDir::new().unwrap();
    let mut config = create_test_config(temp_dir.path());
    config.scraper.workers = 1;
    config.identity.proxies.push(ProxyEntry {
        url: format!("http://{}", proxy_addr),
        username: Some("alice".to_string()),
        password: Some("expired".to_string()),
    });
    let harvester = Arc::new(Harvester::new(config).unwrap());

    let request = ScrapeRequest {
        base_url: format!("https://acme.invalid{}", TARGET_PATH),
        page_count: Some(1),
        worker_count: None,
    };
    let summary = submit(harvester, request).unwrap().wait().await.unwrap();

    // Discovery fails on both probes, so the explicit count stands
    assert_eq!(summary.discovered_pages, None);
    assert_eq!(summary.jobs_queued, 2);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.total_attempts, 2);
    assert_eq!(summary.ledger_entries, 0);
    assert_eq!(summary.status, RunStatus::Error);
    assert!(summary.failed_sample.iter().all(|failure| {
        failure.kind == FailureKind::PermanentClientError
            && failure.http_status.is_none()
            && failure.attempts == 1
    }));

    // Two discovery probes plus one attempt per job
    assert_eq!(proxy_hits.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_zero_discovered_pages_fetches_profile_only() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TARGET_PATH))
        .respond_with(html(listing_page(0, 0)))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(temp_dir.path());
    let harvester = Arc::new(Harvester::new(config).unwrap());

    let summary = submit(harvester, request(&mock_server, None))
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(summary.discovered_pages, Some(0));
    assert_eq!(summary.jobs_queued, 1);
    assert!(summary.profile_saved);
    assert_eq!(summary.review_pages_saved, 0);
    assert_eq!(summary.status, RunStatus::Success);

    let target_dir = temp_dir.path().join("scraped").join("acme.io");
    assert!(target_dir.join("page0_company_profile.json").exists());
    assert!(!target_dir.join("page1_reviews.json").exists());
}

#[tokio::test]
async fn test_empty_page_writes_nothing() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TARGET_PATH))
        .and(query_param("page", "2"))
        .respond_with(html(listing_page(0, 2)))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(TARGET_PATH))
        .respond_with(html(listing_page(2, 2)))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let config = create_test_config(temp_dir.path());
    let harvester = Arc::new(Harvester::new(config).unwrap());

    let summary = submit(harvester, request(&mock_server, Some(2)))
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.empty, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.status, RunStatus::Success);

    let target_dir = temp_dir.path().join("scraped").join("acme.io");
    assert!(target_dir.join("page1_reviews.json").exists());
    assert!(!target_dir.join("page2_reviews.json").exists());
}

#[tokio::test]
async fn test_sqlite_backend_records_every_page() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TARGET_PATH))
        .and(query_param("page", "2"))
        .respond_with(html(listing_page(0, 2)))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(TARGET_PATH))
        .respond_with(html(listing_page(4, 2)))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let mut config = create_test_config(temp_dir.path());
    config.output.backend = StorageBackend::Sqlite;
    let db_path = config.output.database_path();
    let harvester = Arc::new(Harvester::new(config).unwrap());

    let summary = submit(harvester, request(&mock_server, None))
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(summary.files_saved, 2);
    assert_eq!(summary.empty, 1);

    let store = SqliteRecordStore::new(&db_path).unwrap();
    assert_eq!(store.count_pages("acme.io", None).unwrap(), 3);
    assert_eq!(store.count_pages("acme.io", Some(FetchPhase::Success)).unwrap(), 2);
    assert_eq!(store.count_pages("acme.io", Some(FetchPhase::Empty)).unwrap(), 1);

    let empty = store.load_page("acme.io", 2).unwrap().unwrap();
    assert!(empty.payload.is_none());
}

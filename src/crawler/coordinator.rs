//! Run orchestration
//!
//! This module wires the fetch engine, throttle and outcome sink together:
//! - `WorkerPool` drains the job queue with N concurrent workers
//! - `Harvester` owns the long-lived collaborators of a configured process
//!   and executes one scrape request end to end

use crate::config::Config;
use crate::crawler::discovery::{NextDataDiscovery, PageCountDiscovery};
use crate::crawler::engine::{FetchEngine, RetryPolicy};
use crate::crawler::fetcher::{ReqwestTransport, Transport};
use crate::crawler::jobs::{job_queue, JobGenerator, JobReceiver};
use crate::crawler::ledger::RetryLedger;
use crate::crawler::parser::{ContentExtractor, NextDataExtractor};
use crate::crawler::scheduler::{ThrottleController, WorkerThrottle};
use crate::identity::{Identity, IdentityRotator, ProxyEndpoint};
use crate::output::{
    generate_markdown_summary, log_summary, OutcomeSink, RunStatus, RunSummary, StoreSink,
};
use crate::storage::{open_store, RecordStore};
use crate::submit::ScrapeRequest;
use crate::url::{normalize_base_url, target_slug};
use crate::HarvestError;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Fixed-size pool of workers sharing one job queue
pub struct WorkerPool {
    engine: Arc<FetchEngine>,
    throttle: Arc<ThrottleController>,
    sink: Arc<dyn OutcomeSink>,
}

impl WorkerPool {
    pub fn new(
        engine: Arc<FetchEngine>,
        throttle: Arc<ThrottleController>,
        sink: Arc<dyn OutcomeSink>,
    ) -> Self {
        Self {
            engine,
            throttle,
            sink,
        }
    }

    /// Runs `worker_count` workers until the queue is closed and drained
    ///
    /// Returns only after every dequeued job has been delivered to the sink.
    ///
    /// # Returns
    ///
    /// The number of jobs processed
    pub async fn run(&self, jobs: JobReceiver, worker_count: usize) -> u64 {
        let worker_count = worker_count.max(1);
        tracing::info!(workers = worker_count, "Starting worker pool");

        let mut handles = Vec::with_capacity(worker_count);
        for worker_id in 1..=worker_count {
            let jobs = jobs.clone();
            let engine = self.engine.clone();
            let throttle = self.throttle.clone();
            let sink = self.sink.clone();

            handles.push(tokio::spawn(async move {
                run_worker(worker_id, jobs, engine, throttle, sink).await
            }));
        }
        drop(jobs);

        let mut processed = 0;
        for (index, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(count) => processed += count,
                Err(e) => tracing::error!(worker = index + 1, error = %e, "Worker ended abnormally"),
            }
        }

        tracing::info!(processed, "Worker pool drained");
        processed
    }
}

async fn run_worker(
    worker_id: usize,
    jobs: JobReceiver,
    engine: Arc<FetchEngine>,
    throttle: Arc<ThrottleController>,
    sink: Arc<dyn OutcomeSink>,
) -> u64 {
    let mut local = WorkerThrottle::new(worker_id);
    let mut processed = 0;

    loop {
        throttle.wait_out_global_pause().await;

        let Some(job) = jobs.next().await else {
            break;
        };

        tracing::debug!(worker = worker_id, page = job.page_index, "Picked up job");
        let result = engine.run(job).await;
        throttle.after_job(&mut local).await;
        sink.deliver(result).await;
        processed += 1;
    }

    tracing::debug!(worker = worker_id, processed, "Worker finished");
    processed
}

/// Long-lived collaborators of one configured process
///
/// A harvester can execute many scrape requests; each run gets its own
/// queue, throttle state, ledger and outcome tally.
pub struct Harvester {
    config: Config,
    config_hash: Option<String>,
    transport: Arc<dyn Transport>,
    rotator: Arc<IdentityRotator>,
    extractor: Arc<dyn ContentExtractor>,
    discovery: Option<Arc<dyn PageCountDiscovery>>,
    store: Option<Arc<dyn RecordStore>>,
}

impl Harvester {
    /// Creates a harvester with the reqwest transport and configured identity pools
    ///
    /// # Returns
    ///
    /// * `Ok(Harvester)` - Ready to run requests
    /// * `Err(HarvestError)` - The proxy file could not be read
    pub fn new(config: Config) -> Result<Self, HarvestError> {
        let rotator = IdentityRotator::from_config(&config.identity)?;
        tracing::info!(
            proxies = rotator.proxy_count(),
            user_agents = rotator.user_agent_count(),
            "Identity pools ready"
        );

        Ok(Self {
            config,
            config_hash: None,
            transport: Arc::new(ReqwestTransport::new()),
            rotator: Arc::new(rotator),
            extractor: Arc::new(NextDataExtractor),
            discovery: None,
            store: None,
        })
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_rotator(mut self, rotator: Arc<IdentityRotator>) -> Self {
        self.rotator = rotator;
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn ContentExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Replaces the `__NEXT_DATA__` discovery built for each run
    pub fn with_discovery(mut self, discovery: Arc<dyn PageCountDiscovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    /// Replaces the backend opened from the output configuration
    pub fn with_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Executes one scrape request to completion
    ///
    /// Only set-up problems (bad base URL, unopenable storage, unwritable
    /// report) are returned as errors. Page failures are counted in the
    /// summary.
    pub async fn run(&self, request: &ScrapeRequest) -> Result<RunSummary, HarvestError> {
        let started = Instant::now();
        let started_at = Utc::now();

        let base_url = normalize_base_url(&request.base_url)?;
        let target = target_slug(&base_url);
        let scraper = &self.config.scraper;

        let store = match &self.store {
            Some(store) => store.clone(),
            None => open_store(&self.config.output)?,
        };
        let ledger = Arc::new(match &self.config.output.retry_log_path {
            Some(path) => RetryLedger::new(path),
            None => RetryLedger::in_memory(),
        });

        tracing::info!(url = %base_url, target = %target, output = %store.location(), "Starting harvest");

        // Page count
        let discovery = self.discovery.clone().unwrap_or_else(|| self.default_discovery());
        let discovered = match discovery.discover_total_pages(&base_url).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = %e, "Page-count discovery failed");
                None
            }
        };

        let generator = JobGenerator::new(
            base_url.clone(),
            scraper.languages(),
            scraper.fallback_max_pages,
        );
        let page_count = generator.resolve_page_count(request.page_count, discovered);
        tracing::info!(
            discovered = ?discovered,
            requested = ?request.page_count,
            page_count,
            "Resolved page count"
        );

        // Workers
        let workers = request.worker_count.unwrap_or(scraper.workers).max(1);
        let (sender, receiver) = job_queue(scraper.effective_queue_capacity(workers));

        let engine = Arc::new(FetchEngine::new(
            self.transport.clone(),
            self.rotator.clone(),
            ledger.clone(),
            self.extractor.clone(),
            RetryPolicy::from_config(&self.config),
        ));
        let throttle = Arc::new(ThrottleController::new(self.config.throttle.clone()));
        let sink = Arc::new(StoreSink::new(target.clone(), store.clone()));
        let pool = WorkerPool::new(engine, throttle.clone(), sink.clone());

        let (jobs_queued, _processed) =
            tokio::join!(generator.fill(page_count, sender), pool.run(receiver, workers));

        // Summary
        let counts = sink.counts();
        let summary = RunSummary {
            target,
            base_url: base_url.to_string(),
            output_location: store.location(),
            started_at: started_at.to_rfc3339(),
            finished_at: Utc::now().to_rfc3339(),
            duration_seconds: started.elapsed().as_secs(),
            status: RunStatus::from_counts(counts.files_saved, counts.failed),
            config_hash: self.config_hash.clone(),
            discovered_pages: discovered,
            planned_pages: page_count,
            jobs_queued,
            succeeded: counts.succeeded,
            empty: counts.empty,
            failed: counts.failed,
            files_saved: counts.files_saved,
            profile_saved: counts.profile_saved,
            review_pages_saved: counts.review_pages_saved,
            items_saved: counts.items_saved,
            storage_errors: counts.storage_errors,
            total_attempts: counts.total_attempts,
            ledger_entries: ledger.len(),
            global_pauses: throttle.pauses_triggered(),
            failed_sample: counts.failed_sample,
        };

        log_summary(&summary);

        if let Some(path) = &self.config.output.summary_path {
            generate_markdown_summary(&summary, Path::new(path))?;
            tracing::info!(file = %path, "Run report written");
        }

        Ok(summary)
    }

    fn default_discovery(&self) -> Arc<dyn PageCountDiscovery> {
        let scraper = &self.config.scraper;
        let identity = match &scraper.discovery_proxy {
            Some(proxy) => {
                let pooled = self.rotator.first();
                Identity::new(Some(ProxyEndpoint::new(proxy.clone())), pooled.user_agent())
            }
            None => self.rotator.first(),
        };

        Arc::new(NextDataDiscovery::new(
            self.transport.clone(),
            identity,
            scraper.languages(),
            scraper.request_timeout(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThrottleConfig;
    use crate::crawler::discovery::DiscoveryError;
    use crate::crawler::testing::{ScriptedTransport, Step};
    use crate::crawler::FetchResult;
    use crate::state::FetchPhase;
    use crate::storage::SqliteRecordStore;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use url::Url;

    struct FixedDiscovery(Option<u32>);

    #[async_trait]
    impl PageCountDiscovery for FixedDiscovery {
        async fn discover_total_pages(&self, _base_url: &Url) -> Result<Option<u32>, DiscoveryError> {
            Ok(self.0)
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        results: Mutex<Vec<FetchResult>>,
    }

    #[async_trait]
    impl OutcomeSink for RecordingSink {
        async fn deliver(&self, result: FetchResult) {
            self.results.lock().unwrap().push(result);
        }
    }

    fn quiet_throttle() -> ThrottleConfig {
        ThrottleConfig {
            page_delay_min_ms: 0,
            page_delay_max_ms: 0,
            batch_size: 5,
            batch_delay_min_ms: 0,
            batch_delay_max_ms: 0,
            global_pause_every: 50,
            global_pause_min_ms: 0,
            global_pause_max_ms: 0,
        }
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.throttle = quiet_throttle();
        config.output.retry_log_path = None;
        config.retry.general_base_delay_ms = 10;
        config.retry.general_max_delay_ms = 50;
        config.retry.block_backoff_ms = (1..=10).map(|step| step * 10).collect();
        config
    }

    fn harvester(transport: Arc<ScriptedTransport>, discovered: Option<u32>) -> (Harvester, Arc<SqliteRecordStore>) {
        let store = Arc::new(SqliteRecordStore::new_in_memory().unwrap());
        let harvester = Harvester::new(test_config())
            .unwrap()
            .with_transport(transport)
            .with_discovery(Arc::new(FixedDiscovery(discovered)))
            .with_store(store.clone());
        (harvester, store)
    }

    fn request(page_count: Option<u32>) -> ScrapeRequest {
        ScrapeRequest {
            base_url: "https://example.com/review/acme.io".to_string(),
            page_count,
            worker_count: Some(3),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pool_delivers_every_job_once() {
        let config = test_config();
        let transport = Arc::new(ScriptedTransport::new(vec![Step::Reviews(2)]));
        let engine = Arc::new(FetchEngine::new(
            transport,
            Arc::new(IdentityRotator::with_seed(vec![], vec![], 5)),
            Arc::new(RetryLedger::in_memory()),
            Arc::new(NextDataExtractor),
            RetryPolicy::from_config(&config),
        ));
        let throttle = Arc::new(ThrottleController::new(config.throttle.clone()));
        let sink = Arc::new(RecordingSink::default());
        let pool = WorkerPool::new(engine, throttle.clone(), sink.clone());

        let generator = JobGenerator::new(
            Url::parse("https://example.com/review/acme.io").unwrap(),
            Some("all"),
            1_000,
        );
        let (tx, rx) = job_queue(4);
        let (queued, processed) = tokio::join!(generator.fill(20, tx), pool.run(rx, 4));

        assert_eq!(queued, 21);
        assert_eq!(processed, 21);
        assert_eq!(throttle.pages_processed(), 21);

        let results = sink.results.lock().unwrap();
        let indices: HashSet<u32> = results.iter().map(|r| r.job.page_index).collect();
        assert_eq!(results.len(), 21);
        assert_eq!(indices.len(), 21);
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovered_zero_pages_fetches_profile_only() {
        let transport = Arc::new(ScriptedTransport::new(vec![Step::Reviews(1)]));
        let (harvester, store) = harvester(transport.clone(), Some(0));

        let summary = harvester.run(&request(None)).await.unwrap();

        assert_eq!(summary.planned_pages, 0);
        assert_eq!(summary.jobs_queued, 1);
        assert!(summary.profile_saved);
        assert_eq!(summary.review_pages_saved, 0);
        assert_eq!(summary.status, RunStatus::Success);
        assert_eq!(transport.seen().len(), 1);
        assert_eq!(store.count_pages("acme.io", None).unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_count_caps_discovery() {
        let transport = Arc::new(ScriptedTransport::new(vec![Step::Reviews(4)]));
        let (harvester, store) = harvester(transport, Some(30));

        let summary = harvester.run(&request(Some(3))).await.unwrap();

        assert_eq!(summary.discovered_pages, Some(30));
        assert_eq!(summary.planned_pages, 3);
        assert_eq!(summary.files_saved, 4);
        assert_eq!(summary.items_saved, 1 + 3 * 4);
        assert_eq!(
            store.count_pages("acme.io", Some(FetchPhase::Success)).unwrap(),
            4
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_give_error_status() {
        let transport = Arc::new(ScriptedTransport::new(vec![Step::Status(404)]));
        let (harvester, _store) = harvester(transport, Some(2));

        let summary = harvester.run(&request(None)).await.unwrap();

        assert_eq!(summary.failed, 3);
        assert_eq!(summary.files_saved, 0);
        assert_eq!(summary.status, RunStatus::Error);
        assert_eq!(summary.failed_sample.len(), 3);
        assert_eq!(summary.ledger_entries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocked_pages_are_partial_success() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Step::Reviews(1),
            Step::Status(403),
        ]));
        let (harvester, _store) = harvester(transport, Some(1));

        let summary = harvester
            .run(&ScrapeRequest {
                worker_count: Some(1),
                ..request(None)
            })
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.ledger_entries, 10);
        assert_eq!(summary.status, RunStatus::PartialSuccess);
        assert!(matches!(
            summary.failed_sample[0],
            crate::output::FailedPage { http_status: Some(403), .. }
        ));
    }

    #[tokio::test]
    async fn test_invalid_base_url() {
        let transport = Arc::new(ScriptedTransport::new(vec![Step::Reviews(1)]));
        let (harvester, _store) = harvester(transport, Some(1));

        let result = harvester
            .run(&ScrapeRequest {
                base_url: "ftp://example.com/review/acme.io".to_string(),
                page_count: None,
                worker_count: None,
            })
            .await;
        assert!(matches!(result, Err(HarvestError::UrlError(_))));
    }
}

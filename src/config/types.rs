use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Browser user agents rotated across attempts when the config supplies none
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:126.0) Gecko/20100101 Firefox/126.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_5 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Linux; Android 14; Pixel 7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Mobile Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Edge/125.0.2535.51",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:126.0) Gecko/20100101 Firefox/126.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; WOW64; Trident/7.0; rv:11.0) like Gecko",
];

/// Main configuration structure for Sumi-Harvest
///
/// Every section is optional; a missing section takes the defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scraper: ScraperConfig,
    pub retry: RetryConfig,
    pub throttle: ThrottleConfig,
    pub identity: IdentityConfig,
    pub output: OutputConfig,
}

/// Run-level scraping behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ScraperConfig {
    /// Number of concurrent workers draining the job queue
    pub workers: usize,

    /// Per-attempt request timeout (milliseconds)
    pub request_timeout_ms: u64,

    /// Page count used when discovery fails and no explicit count is given
    pub fallback_max_pages: u32,

    /// Value of the `languages` query parameter; empty to omit it
    pub languages: String,

    /// Bounded job queue capacity; defaults to twice the worker count
    pub queue_capacity: Option<usize>,

    /// Proxy used for page-count discovery instead of a pooled identity
    pub discovery_proxy: Option<String>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            request_timeout_ms: 30_000,
            fallback_max_pages: 20_000_000,
            languages: "all".to_string(),
            queue_capacity: None,
            discovery_proxy: None,
        }
    }
}

impl ScraperConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Queue capacity, falling back to twice the worker count
    pub fn effective_queue_capacity(&self, workers: usize) -> usize {
        self.queue_capacity.unwrap_or(workers * 2).max(1)
    }

    /// The `languages` parameter, or `None` when configured empty
    pub fn languages(&self) -> Option<&str> {
        if self.languages.is_empty() {
            None
        } else {
            Some(&self.languages)
        }
    }
}

/// Two-tier retry policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetryConfig {
    /// General-tier retries granted to each identity
    pub max_general_attempts: u32,

    /// Base delay of the exponential general-tier backoff (milliseconds)
    pub general_base_delay_ms: u64,

    /// Ceiling of the general-tier backoff (milliseconds)
    pub general_max_delay_ms: u64,

    /// Relative jitter applied to general-tier delays (0.2 = ±20%)
    pub general_jitter: f64,

    /// Block signals tolerated before a job fails
    pub max_block_attempts: u32,

    /// Wait before the n-th block-tier retry (milliseconds)
    pub block_backoff_ms: Vec<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_general_attempts: 2,
            general_base_delay_ms: 2_000,
            general_max_delay_ms: 10_000,
            general_jitter: 0.2,
            max_block_attempts: 10,
            block_backoff_ms: (1..=10).map(|step| step * 10_000).collect(),
        }
    }
}

/// Per-page, per-batch and global throttling
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ThrottleConfig {
    pub page_delay_min_ms: u64,
    pub page_delay_max_ms: u64,

    /// Pages a worker processes before taking a batch break
    pub batch_size: u32,
    pub batch_delay_min_ms: u64,
    pub batch_delay_max_ms: u64,

    /// All workers pause once every this many processed pages
    pub global_pause_every: u64,
    pub global_pause_min_ms: u64,
    pub global_pause_max_ms: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            page_delay_min_ms: 1_000,
            page_delay_max_ms: 2_000,
            batch_size: 5,
            batch_delay_min_ms: 3_000,
            batch_delay_max_ms: 5_000,
            global_pause_every: 50,
            global_pause_min_ms: 5_000,
            global_pause_max_ms: 10_000,
        }
    }
}

/// Network identity pools
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct IdentityConfig {
    pub user_agents: Vec<String>,

    /// File of `host:port:user:pass` proxy lines, merged with `proxy` entries
    pub proxy_file: Option<PathBuf>,

    #[serde(rename = "proxy")]
    pub proxies: Vec<ProxyEntry>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            user_agents: DEFAULT_USER_AGENTS.iter().map(|ua| ua.to_string()).collect(),
            proxy_file: None,
            proxies: Vec::new(),
        }
    }
}

/// A proxy endpoint declared inline in the config
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyEntry {
    /// Proxy URL, e.g. `http://10.0.0.1:8080`
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Where extracted records are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One pretty-printed JSON file per page
    #[default]
    Json,
    /// One SQLite row per page
    Sqlite,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    pub backend: StorageBackend,

    /// Root directory; each target gets its own subdirectory
    pub directory: String,

    /// SQLite database path, defaults to `<directory>/harvest.db`
    pub database_path: Option<String>,

    /// Markdown table of block-tier retries
    pub retry_log_path: Option<String>,

    /// Markdown run report written after the queue drains
    pub summary_path: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Json,
            directory: "scraped_data".to_string(),
            database_path: None,
            retry_log_path: Some("logs/scraper_retry_log.md".to_string()),
            summary_path: None,
        }
    }
}

impl OutputConfig {
    pub fn database_path(&self) -> PathBuf {
        match &self.database_path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(&self.directory).join("harvest.db"),
        }
    }
}

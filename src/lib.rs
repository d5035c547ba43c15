//! Sumi-Harvest: a resilient paginated review harvester
//!
//! This crate fetches sequentially paginated content from a rate-limiting,
//! bot-defensive target. A pool of workers drains a shared job queue; every job
//! runs through a two-tier retry state machine that waits out transient
//! congestion with the same identity and rotates proxy, user agent and
//! connection when the target starts blocking. Throttling is enforced per page,
//! per worker batch and globally across all workers.

pub mod config;
pub mod crawler;
pub mod identity;
pub mod output;
pub mod state;
pub mod storage;
pub mod submit;
pub mod url;

use thiserror::Error;

/// Main error type for Sumi-Harvest operations
///
/// Individual page failures never surface here; they are captured as
/// [`crawler::FetchStatus::Failed`] values and handed to the outcome sink.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Transport error: {0}")]
    Transport(#[from] crawler::TransportError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Harvest task aborted: {0}")]
    Aborted(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid proxy in config: {0}")]
    InvalidProxy(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Sumi-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{FetchEngine, FetchJob, FetchResult, FetchStatus, Harvester, WorkerPool};
pub use identity::{Identity, IdentityRotator, ProxyEndpoint};
pub use state::{FailureKind, FetchPhase, RetryState, RetryTier};
pub use submit::{submit, ScrapeHandle, ScrapeRequest};

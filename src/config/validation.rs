use crate::config::types::{
    Config, IdentityConfig, OutputConfig, ProxyEntry, RetryConfig, ScraperConfig, ThrottleConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_scraper_config(&config.scraper)?;
    validate_retry_config(&config.retry)?;
    validate_throttle_config(&config.throttle)?;
    validate_identity_config(&config.identity)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates run-level scraper settings
fn validate_scraper_config(config: &ScraperConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > 100 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 100, got {}",
            config.workers
        )));
    }

    if config.request_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_ms must be greater than zero".to_string(),
        ));
    }

    if config.queue_capacity == Some(0) {
        return Err(ConfigError::Validation(
            "queue_capacity must be greater than zero".to_string(),
        ));
    }

    if let Some(proxy) = &config.discovery_proxy {
        validate_proxy_url(proxy)?;
    }

    Ok(())
}

/// Validates the two-tier retry policy
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_block_attempts < 1 {
        return Err(ConfigError::Validation(
            "max_block_attempts must be >= 1".to_string(),
        ));
    }

    // The n-th block signal waits block_backoff_ms[n - 1]; the last signal fails the job
    let required = (config.max_block_attempts - 1) as usize;
    if config.block_backoff_ms.len() < required {
        return Err(ConfigError::Validation(format!(
            "block_backoff_ms needs at least {} entries for max_block_attempts = {}, got {}",
            required,
            config.max_block_attempts,
            config.block_backoff_ms.len()
        )));
    }

    if config.block_backoff_ms.windows(2).any(|pair| pair[0] > pair[1]) {
        return Err(ConfigError::Validation(
            "block_backoff_ms must be non-decreasing".to_string(),
        ));
    }

    if config.general_base_delay_ms > config.general_max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "general_base_delay_ms ({}) exceeds general_max_delay_ms ({})",
            config.general_base_delay_ms, config.general_max_delay_ms
        )));
    }

    if !(0.0..1.0).contains(&config.general_jitter) {
        return Err(ConfigError::Validation(format!(
            "general_jitter must be in [0, 1), got {}",
            config.general_jitter
        )));
    }

    Ok(())
}

/// Validates throttle delay ranges and intervals
fn validate_throttle_config(config: &ThrottleConfig) -> Result<(), ConfigError> {
    validate_range(
        "page_delay",
        config.page_delay_min_ms,
        config.page_delay_max_ms,
    )?;
    validate_range(
        "batch_delay",
        config.batch_delay_min_ms,
        config.batch_delay_max_ms,
    )?;
    validate_range(
        "global_pause",
        config.global_pause_min_ms,
        config.global_pause_max_ms,
    )?;

    if config.batch_size < 1 {
        return Err(ConfigError::Validation("batch_size must be >= 1".to_string()));
    }

    if config.global_pause_every < 1 {
        return Err(ConfigError::Validation(
            "global_pause_every must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_range(name: &str, min: u64, max: u64) -> Result<(), ConfigError> {
    if min > max {
        return Err(ConfigError::Validation(format!(
            "{}_min_ms ({}) exceeds {}_max_ms ({})",
            name, min, name, max
        )));
    }
    Ok(())
}

/// Validates identity pools
fn validate_identity_config(config: &IdentityConfig) -> Result<(), ConfigError> {
    if config.user_agents.is_empty() {
        return Err(ConfigError::Validation(
            "user_agents cannot be empty".to_string(),
        ));
    }

    if config.user_agents.iter().any(|ua| ua.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "user_agents cannot contain blank entries".to_string(),
        ));
    }

    for entry in &config.proxies {
        validate_proxy_entry(entry)?;
    }

    Ok(())
}

fn validate_proxy_entry(entry: &ProxyEntry) -> Result<(), ConfigError> {
    validate_proxy_url(&entry.url)?;

    if entry.password.is_some() && entry.username.is_none() {
        return Err(ConfigError::InvalidProxy(format!(
            "Proxy '{}' has a password but no username",
            entry.url
        )));
    }

    Ok(())
}

/// Validates a proxy URL (http, https or socks5 with a host and port)
fn validate_proxy_url(raw: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidProxy(format!("Invalid proxy URL '{}': {}", raw, e)))?;

    if !matches!(url.scheme(), "http" | "https" | "socks5" | "socks5h") {
        return Err(ConfigError::InvalidProxy(format!(
            "Proxy '{}' must use http, https or socks5",
            raw
        )));
    }

    if url.host_str().is_none() || url.port_or_known_default().is_none() {
        return Err(ConfigError::InvalidProxy(format!(
            "Proxy '{}' must include a host and port",
            raw
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.directory.is_empty() {
        return Err(ConfigError::Validation(
            "directory cannot be empty".to_string(),
        ));
    }

    for (name, path) in [
        ("database_path", &config.database_path),
        ("retry_log_path", &config.retry_log_path),
        ("summary_path", &config.summary_path),
    ] {
        if matches!(path, Some(p) if p.is_empty()) {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    Ok(())
}

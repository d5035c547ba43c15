//! Failure classification for fetch attempts

use std::fmt;

/// Which retry tier handles a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryTier {
    /// Wait with exponential backoff and retry with the same identity
    General,
    /// Rotate identity and connection, then wait per the block schedule
    Block,
}

/// Why an attempt did not produce a usable response
///
/// | Kind | Trigger | Handling |
/// |------|---------|----------|
/// | `TransientNetworkFault` | timeout, reset, DNS/connect failure | general tier |
/// | `RateLimited` | HTTP 429 | general tier |
/// | `ServerError` | HTTP 5xx except 502 | general tier |
/// | `BlockSignal` | HTTP 403, 502 | block tier |
/// | `PermanentClientError` | any other status, proxy/payment errors | no retry |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    TransientNetworkFault,
    RateLimited,
    ServerError,
    BlockSignal,
    PermanentClientError,
}

impl FailureKind {
    /// Classifies an HTTP status code
    ///
    /// Returns `None` for 2xx statuses, which are not failures.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            200..=299 => None,
            403 | 502 => Some(Self::BlockSignal),
            429 => Some(Self::RateLimited),
            500..=599 => Some(Self::ServerError),
            _ => Some(Self::PermanentClientError),
        }
    }

    /// The tier that retries this failure, or `None` if it is terminal
    pub fn retry_tier(&self) -> Option<RetryTier> {
        match self {
            Self::TransientNetworkFault | Self::RateLimited | Self::ServerError => {
                Some(RetryTier::General)
            }
            Self::BlockSignal => Some(RetryTier::Block),
            Self::PermanentClientError => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TransientNetworkFault => "transient_network_fault",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::BlockSignal => "block_signal",
            Self::PermanentClientError => "permanent_client_error",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

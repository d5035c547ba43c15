/// Fetch phase definitions for the two-tier retry state machine
///
/// This module defines every phase a job passes through between dequeue and
/// its terminal outcome.
use std::fmt;

/// Represents where a job is in its fetch lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchPhase {
    // ===== Active Phases =====
    /// Job accepted, no attempt issued yet
    Init,

    /// An attempt is in flight
    Fetching,

    /// Waiting out a transient failure before retrying with the same identity
    GeneralRetry,

    /// Waiting out a block signal before retrying with a new identity
    BlockRetry,

    // ===== Terminal Phases =====
    /// Response fetched and content extracted
    Success,

    /// Response fetched but it carried no extractable content
    Empty,

    /// Retries exhausted or a permanent error was returned
    Failed,
}

impl FetchPhase {
    /// Returns true if no further attempts will be made
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Empty | Self::Failed)
    }

    /// Returns true while the job is waiting out a backoff
    pub fn is_retrying(&self) -> bool {
        matches!(self, Self::GeneralRetry | Self::BlockRetry)
    }

    /// Returns true if this phase may be entered from `self`
    pub fn can_transition_to(&self, next: FetchPhase) -> bool {
        use FetchPhase::*;
        match (self, next) {
            (Init, Fetching) => true,
            (Fetching, GeneralRetry | BlockRetry | Success | Empty | Failed) => true,
            (GeneralRetry, Fetching) | (BlockRetry, Fetching) => true,
            _ => false,
        }
    }

    /// Converts the phase to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Fetching => "fetching",
            Self::GeneralRetry => "general_retry",
            Self::BlockRetry => "block_retry",
            Self::Success => "success",
            Self::Empty => "empty",
            Self::Failed => "failed",
        }
    }

    /// Parses a phase from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "init" => Some(Self::Init),
            "fetching" => Some(Self::Fetching),
            "general_retry" => Some(Self::GeneralRetry),
            "block_retry" => Some(Self::BlockRetry),
            "success" => Some(Self::Success),
            "empty" => Some(Self::Empty),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for FetchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

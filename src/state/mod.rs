//! State module for tracking fetch progress
//!
//! This module provides the control state of a single job's fetch attempts.
//!
//! # Components
//!
//! - `FetchPhase`: Where a job is in the two-tier retry state machine
//! - `FailureKind` / `RetryTier`: Classification of a failed attempt and the tier that handles it
//! - `RetryState`: Attempt counters and current identity, owned by the worker running the job

mod failure;
mod fetch_phase;
mod retry_state;

// Re-export main types
pub use failure::{FailureKind, RetryTier};
pub use fetch_phase::FetchPhase;
pub use retry_state::RetryState;

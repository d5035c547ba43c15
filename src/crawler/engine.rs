//! Two-tier retry state machine
//!
//! `FetchEngine::run` drives one job from its first attempt to a terminal
//! result:
//!
//! | Attempt result | Tier | Action |
//! |----------------|------|--------|
//! | 2xx, content extracted | - | `SUCCESS` |
//! | 2xx, nothing extracted | - | `EMPTY` |
//! | timeout, reset, DNS, 429, 5xx except 502 | general | wait `base * 2^n` (jittered), same identity |
//! | 403, 502 | block | new identity + connection, wait `schedule[n - 1]`, ledger entry |
//! | anything else | - | `FAILED`, no retry |
//!
//! When the general budget runs out while a block cycle is active, the
//! failure counts as one block attempt. Otherwise it fails the job.

use crate::config::Config;
use crate::crawler::fetcher::{AttemptRequest, Transport};
use crate::crawler::jobs::FetchJob;
use crate::crawler::ledger::{RetryLedger, RetryLogEntry, RetryOutcome};
use crate::crawler::parser::{ContentExtractor, ParsedRecord};
use crate::identity::{Identity, IdentityRotator};
use crate::state::{FailureKind, FetchPhase, RetryState, RetryTier};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Retry parameters shared by every job of a run
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_general_attempts: u32,
    pub general_base_delay: Duration,
    pub general_max_delay: Duration,
    /// Relative jitter, 0.2 = ±20%
    pub general_jitter: f64,
    pub max_block_attempts: u32,
    pub block_backoff: Vec<Duration>,
    /// Bound on each individual network attempt
    pub request_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_general_attempts: config.retry.max_general_attempts,
            general_base_delay: Duration::from_millis(config.retry.general_base_delay_ms),
            general_max_delay: Duration::from_millis(config.retry.general_max_delay_ms),
            general_jitter: config.retry.general_jitter,
            max_block_attempts: config.retry.max_block_attempts.max(1),
            block_backoff: config
                .retry
                .block_backoff_ms
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
            request_timeout: config.scraper.request_timeout(),
        }
    }

    /// Delay before the n-th general-tier retry (1-based)
    pub fn general_delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        let base = self
            .general_base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.general_max_delay);

        let jittered = if self.general_jitter > 0.0 {
            let factor = rand::thread_rng().gen_range(-self.general_jitter..=self.general_jitter);
            base.mul_f64(1.0 + factor)
        } else {
            base
        };

        jittered.min(self.general_max_delay)
    }

    /// Delay after the n-th block signal (1-based)
    ///
    /// Indexes the fixed schedule; a short schedule repeats its last entry.
    pub fn block_delay(&self, attempt: u32) -> Duration {
        let index = attempt.saturating_sub(1) as usize;
        self.block_backoff
            .get(index)
            .or_else(|| self.block_backoff.last())
            .copied()
            .unwrap_or_default()
    }

    /// Upper bound on attempts for any job
    pub fn max_total_attempts(&self) -> u32 {
        self.max_block_attempts * (self.max_general_attempts + 1)
    }
}

/// Terminal status of a job
#[derive(Debug, Clone, PartialEq)]
pub enum FetchStatus {
    Success { http_status: u16, record: ParsedRecord },
    /// Fetched, but nothing could be extracted
    Empty { http_status: u16 },
    Failed {
        kind: FailureKind,
        /// Status of the last response, if the last attempt got one
        http_status: Option<u16>,
        message: String,
    },
}

impl FetchStatus {
    pub fn phase(&self) -> FetchPhase {
        match self {
            Self::Success { .. } => FetchPhase::Success,
            Self::Empty { .. } => FetchPhase::Empty,
            Self::Failed { .. } => FetchPhase::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Outcome of a completed job, produced exactly once
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub job: FetchJob,
    pub status: FetchStatus,
    /// Network attempts issued, across both tiers
    pub attempts: u32,
    /// Block signals received
    pub block_retries: u32,
    pub final_identity: Identity,
}

/// Runs single jobs to completion
pub struct FetchEngine {
    transport: Arc<dyn Transport>,
    rotator: Arc<IdentityRotator>,
    ledger: Arc<RetryLedger>,
    extractor: Arc<dyn ContentExtractor>,
    policy: RetryPolicy,
}

impl FetchEngine {
    pub fn new(
        transport: Arc<dyn Transport>,
        rotator: Arc<IdentityRotator>,
        ledger: Arc<RetryLedger>,
        extractor: Arc<dyn ContentExtractor>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            rotator,
            ledger,
            extractor,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn ledger(&self) -> &Arc<RetryLedger> {
        &self.ledger
    }

    /// Fetches one job, retrying per the two-tier policy
    ///
    /// Never returns an error: every failure is captured in the result.
    pub async fn run(&self, job: FetchJob) -> FetchResult {
        let mut state = RetryState::new(self.rotator.first());

        loop {
            let fresh_connection = state.begin_attempt();
            let request = AttemptRequest {
                url: &job.url,
                identity: state.identity(),
                fresh_connection,
                timeout: self.policy.request_timeout,
            };

            tracing::debug!(
                page = job.page_index,
                attempt = state.total_attempts(),
                identity = %state.identity(),
                fresh = fresh_connection,
                "Fetching"
            );

            let (kind, http_status, message) = match self.transport.send(request).await {
                Ok(response) if response.is_success() => {
                    let record = self.extractor.extract(job.kind, &response.body, response.content_type());
                    return self.complete(job, state, response.status, record);
                }
                Ok(response) => (
                    FailureKind::from_status(response.status)
                        .unwrap_or(FailureKind::PermanentClientError),
                    Some(response.status),
                    format!("HTTP {}", response.status),
                ),
                Err(e) => (e.failure_kind(), None, e.to_string()),
            };

            match kind.retry_tier() {
                Some(RetryTier::General)
                    if state.general_attempts() < self.policy.max_general_attempts =>
                {
                    let retry = state.enter_general_retry();
                    let delay = self.policy.general_delay(retry);
                    tracing::warn!(
                        page = job.page_index,
                        retry,
                        max = self.policy.max_general_attempts,
                        reason = %kind,
                        status = ?http_status,
                        delay_ms = delay.as_millis() as u64,
                        "Transient failure; retrying with same identity"
                    );
                    tokio::time::sleep(delay).await;
                }
                Some(RetryTier::General) if !state.block_cycle_active() => {
                    return self.fail(job, state, kind, http_status, message);
                }
                Some(_) => {
                    let attempt = state.record_block_signal();
                    let max = self.policy.max_block_attempts;

                    if attempt >= max {
                        self.ledger
                            .append(RetryLogEntry::new(
                                job.url.as_str(),
                                state.identity(),
                                attempt,
                                max,
                                http_status,
                                kind,
                                RetryOutcome::Exhausted,
                            ))
                            .await;
                        return self.fail(job, state, kind, http_status, message);
                    }

                    self.ledger
                        .append(RetryLogEntry::new(
                            job.url.as_str(),
                            state.identity(),
                            attempt,
                            max,
                            http_status,
                            kind,
                            RetryOutcome::Rotated,
                        ))
                        .await;

                    let identity = self.rotator.rotate(state.identity());
                    state.rotate_identity(identity);

                    let delay = self.policy.block_delay(attempt);
                    tracing::debug!(
                        page = job.page_index,
                        attempt,
                        identity = %state.identity(),
                        delay_ms = delay.as_millis() as u64,
                        "Rotated identity after block signal"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => return self.fail(job, state, kind, http_status, message),
            }
        }
    }

    fn complete(
        &self,
        job: FetchJob,
        mut state: RetryState,
        http_status: u16,
        record: Option<ParsedRecord>,
    ) -> FetchResult {
        let status = match record {
            Some(record) => {
                tracing::info!(
                    page = job.page_index,
                    kind = record.kind.as_str(),
                    items = record.item_count,
                    attempts = state.total_attempts(),
                    "Fetched page"
                );
                FetchStatus::Success {
                    http_status,
                    record,
                }
            }
            None => {
                tracing::warn!(page = job.page_index, url = %job.url, "Page had no extractable content");
                FetchStatus::Empty { http_status }
            }
        };

        state.finish(status.phase());
        Self::into_result(job, state, status)
    }

    fn fail(
        &self,
        job: FetchJob,
        mut state: RetryState,
        kind: FailureKind,
        http_status: Option<u16>,
        message: String,
    ) -> FetchResult {
        tracing::error!(
            page = job.page_index,
            url = %job.url,
            reason = %kind,
            status = ?http_status,
            attempts = state.total_attempts(),
            block_retries = state.block_attempts(),
            "Job failed: {}",
            message
        );

        state.finish(FetchPhase::Failed);
        Self::into_result(
            job,
            state,
            FetchStatus::Failed {
                kind,
                http_status,
                message,
            },
        )
    }

    fn into_result(job: FetchJob, state: RetryState, status: FetchStatus) -> FetchResult {
        FetchResult {
            job,
            status,
            attempts: state.total_attempts(),
            block_retries: state.block_attempts(),
            final_identity: state.into_identity(),
        }
    }
}

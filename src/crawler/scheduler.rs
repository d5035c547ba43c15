//! Throttling shared across all workers
//!
//! This module handles:
//! - A short random delay after every page (per worker, unsynchronized)
//! - A longer random break after every batch of pages a worker completes
//! - A global pause every N pages processed by the whole pool
//!
//! The global page counter and the pause deadline are the only cross-worker
//! mutable state. Both are atomics: each increment returns a distinct count,
//! so exactly one worker observes any given threshold and the pause can
//! never be triggered twice for the same crossing.

use crate::config::ThrottleConfig;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Cross-worker throttle state for one run
#[derive(Debug)]
pub struct ThrottleController {
    config: ThrottleConfig,

    /// Pages processed by all workers
    pages_processed: AtomicU64,

    /// End of the active global pause, in milliseconds since `epoch`
    pause_until_ms: AtomicU64,

    /// Number of global pauses triggered so far
    pauses_triggered: AtomicU64,

    epoch: Instant,
}

/// Per-worker throttle state; never shared
#[derive(Debug, Clone)]
pub struct WorkerThrottle {
    worker_id: usize,
    batch_count: u32,
}

impl WorkerThrottle {
    pub fn new(worker_id: usize) -> Self {
        Self {
            worker_id,
            batch_count: 0,
        }
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    pub fn batch_count(&self) -> u32 {
        self.batch_count
    }
}

impl ThrottleController {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            pages_processed: AtomicU64::new(0),
            pause_until_ms: AtomicU64::new(0),
            pauses_triggered: AtomicU64::new(0),
            epoch: Instant::now(),
        }
    }

    pub fn pages_processed(&self) -> u64 {
        self.pages_processed.load(Ordering::SeqCst)
    }

    pub fn pauses_triggered(&self) -> u64 {
        self.pauses_triggered.load(Ordering::SeqCst)
    }

    /// Runs every post-job step for one worker, in order
    pub async fn after_job(&self, worker: &mut WorkerThrottle) {
        self.after_page(worker.worker_id).await;
        self.after_batch(worker).await;
        self.maybe_global_pause(worker.worker_id).await;
    }

    /// Sleeps a short random delay
    pub async fn after_page(&self, worker_id: usize) {
        let delay = random_between(self.config.page_delay_min_ms, self.config.page_delay_max_ms);
        tracing::trace!(worker = worker_id, delay_ms = delay.as_millis() as u64, "Page delay");
        tokio::time::sleep(delay).await;
    }

    /// Counts a page against the worker's batch and takes a break when it fills
    ///
    /// # Returns
    ///
    /// `true` if a batch break was taken and the counter reset
    pub async fn after_batch(&self, worker: &mut WorkerThrottle) -> bool {
        worker.batch_count += 1;
        if worker.batch_count < self.config.batch_size {
            return false;
        }

        worker.batch_count = 0;
        let delay = random_between(self.config.batch_delay_min_ms, self.config.batch_delay_max_ms);
        tracing::debug!(
            worker = worker.worker_id,
            delay_ms = delay.as_millis() as u64,
            "Batch complete; taking a break"
        );
        tokio::time::sleep(delay).await;
        true
    }

    /// Counts a processed page and pauses if it crosses a global threshold
    ///
    /// Only the worker whose increment lands on a multiple of
    /// `global_pause_every` starts the pause; other workers see it through
    /// [`wait_out_global_pause`](Self::wait_out_global_pause) before taking
    /// their next job.
    ///
    /// # Returns
    ///
    /// The pause duration if this call triggered one
    pub async fn maybe_global_pause(&self, worker_id: usize) -> Option<Duration> {
        let count = self.pages_processed.fetch_add(1, Ordering::SeqCst) + 1;
        let every = self.config.global_pause_every.max(1);
        if count % every != 0 {
            return None;
        }

        let delay = random_between(self.config.global_pause_min_ms, self.config.global_pause_max_ms);
        let until = self.now_ms() + delay.as_millis() as u64;
        self.pause_until_ms.fetch_max(until, Ordering::SeqCst);
        self.pauses_triggered.fetch_add(1, Ordering::SeqCst);

        tracing::info!(
            worker = worker_id,
            pages_processed = count,
            delay_ms = delay.as_millis() as u64,
            "Global pause"
        );
        tokio::time::sleep(delay).await;
        tracing::info!(pages_processed = count, "Global pause ended");

        Some(delay)
    }

    /// Waits until any active global pause has ended
    pub async fn wait_out_global_pause(&self) {
        loop {
            let until = self.pause_until_ms.load(Ordering::SeqCst);
            let now = self.now_ms();
            if until <= now {
                return;
            }
            tokio::time::sleep(Duration::from_millis(until - now)).await;
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

/// Uniformly samples a delay from `[min_ms, max_ms]`
fn random_between(min_ms: u64, max_ms: u64) -> Duration {
    if max_ms <= min_ms {
        return Duration::from_millis(min_ms);
    }
    Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
}

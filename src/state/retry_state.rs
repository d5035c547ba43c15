//! Per-job retry control state
//!
//! A `RetryState` is created when a worker starts a job and dropped when the
//! job reaches a terminal phase. It is never shared between workers.

use crate::identity::Identity;
use crate::state::{FetchPhase, RetryTier};

/// Control state of one job's fetch attempts
#[derive(Debug, Clone)]
pub struct RetryState {
    tier: RetryTier,
    phase: FetchPhase,
    general_attempts: u32,
    block_attempts: u32,
    total_attempts: u32,
    identity: Identity,
    fresh_connection: bool,
}

impl RetryState {
    /// Creates the state for a job's first attempt
    ///
    /// The first attempt always opens a fresh connection.
    pub fn new(identity: Identity) -> Self {
        Self {
            tier: RetryTier::General,
            phase: FetchPhase::Init,
            general_attempts: 0,
            block_attempts: 0,
            total_attempts: 0,
            identity,
            fresh_connection: true,
        }
    }

    pub fn tier(&self) -> RetryTier {
        self.tier
    }

    pub fn phase(&self) -> FetchPhase {
        self.phase
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn general_attempts(&self) -> u32 {
        self.general_attempts
    }

    pub fn block_attempts(&self) -> u32 {
        self.block_attempts
    }

    pub fn total_attempts(&self) -> u32 {
        self.total_attempts
    }

    /// Whether a block-retry cycle has started for this job
    pub fn block_cycle_active(&self) -> bool {
        self.tier == RetryTier::Block
    }

    /// Marks an attempt as issued
    ///
    /// Returns whether the attempt must use a brand-new connection.
    pub fn begin_attempt(&mut self) -> bool {
        self.phase = FetchPhase::Fetching;
        self.total_attempts += 1;
        self.fresh_connection
    }

    /// Records a general-tier retry with the same identity and connection policy
    pub fn enter_general_retry(&mut self) -> u32 {
        self.phase = FetchPhase::GeneralRetry;
        self.general_attempts += 1;
        self.fresh_connection = false;
        self.general_attempts
    }

    /// Records a block signal and returns the block attempt number (1-based)
    pub fn record_block_signal(&mut self) -> u32 {
        self.tier = RetryTier::Block;
        self.block_attempts += 1;
        self.block_attempts
    }

    /// Swaps in a new identity after a block signal
    ///
    /// The new identity gets its own general-retry budget and a fresh connection.
    pub fn rotate_identity(&mut self, identity: Identity) {
        self.phase = FetchPhase::BlockRetry;
        self.identity = identity;
        self.general_attempts = 0;
        self.fresh_connection = true;
    }

    /// Moves to a terminal phase
    pub fn finish(&mut self, phase: FetchPhase) {
        debug_assert!(phase.is_terminal());
        self.phase = phase;
    }

    /// Consumes the state, returning the identity used last
    pub fn into_identity(self) -> Identity {
        self.identity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_attempt_is_fresh() {
        let mut state = RetryState::new(Identity::direct("UA/1"));
        assert_eq!(state.phase(), FetchPhase::Init);
        assert!(state.begin_attempt());
        assert_eq!(state.total_attempts(), 1);
        assert_eq!(state.phase(), FetchPhase::Fetching);
    }

    #[test]
    fn test_general_retry_keeps_identity() {
        let identity = Identity::direct("UA/1");
        let mut state = RetryState::new(identity.clone());
        state.begin_attempt();

        assert_eq!(state.enter_general_retry(), 1);
        assert!(!state.begin_attempt());
        assert_eq!(state.identity(), &identity);
        assert_eq!(state.tier(), RetryTier::General);
    }

    #[test]
    fn test_rotation_resets_general_budget() {
        let mut state = RetryState::new(Identity::direct("UA/1"));
        state.begin_attempt();
        state.enter_general_retry();
        state.enter_general_retry();

        assert_eq!(state.record_block_signal(), 1);
        state.rotate_identity(Identity::direct("UA/2"));

        assert!(state.block_cycle_active());
        assert_eq!(state.general_attempts(), 0);
        assert_eq!(state.phase(), FetchPhase::BlockRetry);
        assert_eq!(state.identity().user_agent(), "UA/2");
        assert!(state.begin_attempt());
    }

    #[test]
    fn test_finish() {
        let mut state = RetryState::new(Identity::direct("UA/1"));
        state.begin_attempt();
        state.finish(FetchPhase::Empty);
        assert!(state.phase().is_terminal());
        assert_eq!(state.into_identity().user_agent(), "UA/1");
    }
}

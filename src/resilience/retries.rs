//! Retry and failover bounds.
//!
//! # Responsibilities
//! - Hold the two bounds: retries per service, attempts across services
//! - Carry per-request counters through the router's state machine
//!
//! # Design Decisions
//! - Counters live with the request, never in shared state
//! - Retries hit the same service after a fixed backoff
//! - Exhausted retries demote the service and count one attempt

use std::time::Duration;

use crate::config::RetryConfig;

/// Bounds for one logical client request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Another dispatch against the current service is allowed.
    pub fn can_retry(&self, state: &RetryState) -> bool {
        state.retries < self.max_retries
    }

    /// Attempt count is past the bound; the request is answered with 503.
    pub fn attempts_exhausted(&self, state: &RetryState) -> bool {
        state.attempts > self.max_attempts
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            max_attempts: config.max_attempts,
            backoff: Duration::from_millis(config.backoff_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

/// Counters for one client request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Dispatches repeated against the currently selected service.
    pub retries: u32,
    /// Services given up on so far.
    pub attempts: u32,
}

impl RetryState {
    pub fn record_retry(&mut self) {
        self.retries += 1;
    }

    /// Move on to a different service: one more attempt, fresh retries.
    pub fn record_failover(&mut self) {
        self.attempts += 1;
        self.retries = 0;
    }
}

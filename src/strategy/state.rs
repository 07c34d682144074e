use crate::policy::RetryPolicy;
use std::time::{Duration, Instant};

/// Outcome of consulting the retry state after a transient fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RetryDecision {
    /// Retry after waiting out this delay.
    Retry { delay: Duration },
    /// Ceiling reached; stop retrying.
    Exhausted,
}

/// Per-invocation retry bookkeeping.
///
/// Owned by exactly one strategy invocation and dropped when it returns.
/// The ceiling convention: `max_retries` counts retries beyond the first
/// attempt, so an exhausted invocation has made `max_retries + 1` attempts.
#[derive(Debug)]
pub(crate) struct RetrySession {
    policy: RetryPolicy,
    failures: u32,
    started: Instant,
}

impl RetrySession {
    pub(crate) fn new(policy: &RetryPolicy) -> Self {
        Self {
            policy: policy.clone(),
            failures: 0,
            started: Instant::now(),
        }
    }

    /// Attempts made so far, including the first. Meaningful after at least
    /// one failure has been registered.
    pub(crate) fn attempts(&self) -> u32 {
        self.failures
    }

    /// Record a failed attempt and decide whether another one is allowed.
    pub(crate) fn register_failure(&mut self) -> RetryDecision {
        self.failures += 1;

        if self.failures > self.policy.max_retries {
            return RetryDecision::Exhausted;
        }

        if let Some(max_elapsed) = self.policy.max_elapsed {
            if self.started.elapsed() >= max_elapsed {
                return RetryDecision::Exhausted;
            }
        }

        RetryDecision::Retry {
            delay: self.policy.delay_for(self.failures - 1),
        }
    }
}

use rand::Rng;
use std::time::Duration;

/// Retry delay policy and ceiling configuration.
///
/// Builder-style, in the manner of driver connection configs:
///
/// ```
/// use std::time::Duration;
/// use txretry::RetryPolicy;
///
/// let policy = RetryPolicy::new()
///     .max_retries(4)
///     .base_delay(Duration::from_millis(200))
///     .max_delay(Duration::from_secs(10));
///
/// assert!(policy.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum retries after the first attempt. An exhausted invocation has
    /// made `max_retries + 1` attempts in total.
    pub max_retries: u32,

    /// Delay before the first retry; doubles on each retry after that.
    pub base_delay: Duration,

    /// Cap on any single computed delay.
    pub max_delay: Duration,

    /// Jitter as a percentage of the computed delay (0-100), to keep
    /// concurrent callers from retrying in lockstep.
    pub jitter_pct: u8,

    /// Optional wall-clock ceiling across the whole invocation. Mainly an
    /// override hook for fast test runs.
    pub max_elapsed: Option<Duration>,
}

impl RetryPolicy {
    /// Create a policy with the default ceiling and backoff curve.
    pub fn new() -> Self {
        Self {
            max_retries: 6,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter_pct: 20,
            max_elapsed: None,
        }
    }

    /// Set the maximum number of retries after the first attempt.
    pub fn max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    /// Set the delay before the first retry.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the cap on any single delay.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the jitter percentage (0-100).
    pub fn jitter_pct(mut self, pct: u8) -> Self {
        self.jitter_pct = pct;
        self
    }

    /// Set the wall-clock ceiling for a whole invocation.
    pub fn max_elapsed(mut self, elapsed: Duration) -> Self {
        self.max_elapsed = Some(elapsed);
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.jitter_pct > 100 {
            return Err("jitter_pct must be <= 100".to_string());
        }

        if self.max_delay < self.base_delay {
            return Err("max_delay cannot be below base_delay".to_string());
        }

        if let Some(max_elapsed) = self.max_elapsed {
            if max_elapsed.is_zero() {
                return Err("max_elapsed must be > 0".to_string());
            }
        }

        Ok(())
    }

    /// Delay before retry number `retry` (0-based): exponential growth from
    /// `base_delay`, capped at `max_delay`, with jitter applied.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = retry.min(30);
        let mut delay = self.base_delay.saturating_mul(1u32 << exp);

        if delay > self.max_delay {
            delay = self.max_delay;
        }

        self.apply_jitter(delay)
    }

    /// Uniform jitter in `[delay - jitter%, delay + jitter%]`.
    fn apply_jitter(&self, delay: Duration) -> Duration {
        if self.jitter_pct == 0 || delay.is_zero() {
            return delay;
        }

        let delay_ns = delay.as_nanos() as u64;
        let jitter_ns = delay_ns.saturating_mul(self.jitter_pct as u64) / 100;
        if jitter_ns == 0 {
            return delay;
        }

        let low = delay_ns.saturating_sub(jitter_ns);
        let high = delay_ns.saturating_add(jitter_ns);
        Duration::from_nanos(rand::thread_rng().gen_range(low..=high))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

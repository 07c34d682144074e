// ============================================================================
// Execution Strategy
// ============================================================================
//
// Orchestrates one logical operation against the store: attempt, classify
// the fault, decide retry or abort, wait out the backoff delay, repeat.
// Attempts are strictly sequential, and the session is reset between
// attempts so every retry starts from clean transport state.
//
// ============================================================================

pub mod cancel;
mod state;

pub use cancel::CancellationToken;
pub(crate) use state::{RetryDecision, RetrySession};

use crate::classify::FaultClassifier;
use crate::core::RetryError;
use crate::policy::RetryPolicy;
use crate::session::{AsyncSession, Session};
use futures::future::BoxFuture;
use log::{debug, warn};
use std::thread;
use std::time::Duration;

/// What the retry loop does with a fault after classification.
pub(crate) enum FaultAction {
    /// Not transient: surface it unchanged.
    Propagate,
    /// Transient and under the ceiling: wait, reset the session, go again.
    RetryAfter(Duration),
    /// Transient but the ceiling is reached.
    Exhausted,
}

/// Retrying executor for logical operations against an unreliable
/// transactional store.
///
/// Transient faults back off and re-run; non-transient faults surface
/// unchanged; a fault raised during commit is resolved through a
/// caller-supplied verification predicate before any retry decision (see
/// [`execute_in_transaction`](Self::execute_in_transaction)).
///
/// One instance runs one logical operation at a time: the entry points take
/// `&mut self`, so overlapping invocations on a shared instance are a
/// compile error rather than corrupted retry state.
///
/// # Examples
///
/// ```ignore
/// let mut strategy = ExecutionStrategy::new(PgFaultClassifier, RetryPolicy::new());
/// let mut session = pool.get_session()?;
///
/// strategy.execute_in_transaction(
///     &mut session,
///     |s| s.execute("INSERT INTO orders VALUES (1, 'widget')"),
///     |s| Ok(s.query("SELECT id FROM orders WHERE id = 1")?.row_count() > 0),
///     None,
/// )?;
/// ```
pub struct ExecutionStrategy<C> {
    classifier: C,
    policy: RetryPolicy,
}

impl<C> ExecutionStrategy<C> {
    /// Build a strategy from a fault classifier and a delay policy.
    pub fn new(classifier: C, policy: RetryPolicy) -> Self {
        Self { classifier, policy }
    }

    /// The configured delay policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub(crate) fn classifier(&self) -> &C {
        &self.classifier
    }

    pub(crate) fn retry_session(&self) -> RetrySession {
        RetrySession::new(&self.policy)
    }

    /// Classify a fault and decide what the retry loop does next.
    pub(crate) fn on_fault<E>(&self, retries: &mut RetrySession, fault: &E) -> FaultAction
    where
        C: FaultClassifier<E>,
        E: std::error::Error,
    {
        if !self.classifier.is_transient(fault) {
            return FaultAction::Propagate;
        }

        match retries.register_failure() {
            RetryDecision::Exhausted => {
                warn!(
                    "giving up after {} attempts, last fault: {}",
                    retries.attempts(),
                    fault
                );
                FaultAction::Exhausted
            }
            RetryDecision::Retry { delay } => {
                debug!(
                    "transient fault on attempt {}, retrying in {:?}: {}",
                    retries.attempts(),
                    delay,
                    fault
                );
                FaultAction::RetryAfter(delay)
            }
        }
    }

    /// Sleep out a backoff delay, waking early on cancellation.
    pub(crate) async fn wait<E>(
        &self,
        delay: Duration,
        token: &CancellationToken,
    ) -> Result<(), RetryError<E>> {
        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = token.cancelled() => Err(RetryError::Cancelled),
        }
    }

    /// Run `op` against the store, retrying transient faults until it
    /// succeeds or the retry ceiling is reached.
    ///
    /// The session is opened before the first attempt and reset before each
    /// retry, so each attempt produces one open event.
    pub fn execute<S, R, F>(
        &mut self,
        session: &mut S,
        mut op: F,
    ) -> Result<R, RetryError<S::Fault>>
    where
        S: Session,
        C: FaultClassifier<S::Fault>,
        F: FnMut(&mut S) -> Result<R, S::Fault>,
    {
        let mut retries = self.retry_session();
        session.open().map_err(RetryError::Fault)?;

        loop {
            match op(session) {
                Ok(result) => return Ok(result),
                Err(fault) => match self.on_fault(&mut retries, &fault) {
                    FaultAction::Propagate => return Err(RetryError::Fault(fault)),
                    FaultAction::Exhausted => {
                        return Err(RetryError::RetryLimitExceeded {
                            attempts: retries.attempts(),
                            source: fault,
                        });
                    }
                    FaultAction::RetryAfter(delay) => {
                        thread::sleep(delay);
                        session.reset().map_err(RetryError::Fault)?;
                    }
                },
            }
        }
    }

    /// Asynchronous form of [`execute`](Self::execute).
    ///
    /// Cancellation observed during the backoff delay, or after an in-flight
    /// attempt, aborts with [`RetryError::Cancelled`] before any further
    /// attempt starts.
    pub async fn execute_async<S, R, F>(
        &mut self,
        session: &mut S,
        mut op: F,
        token: &CancellationToken,
    ) -> Result<R, RetryError<S::Fault>>
    where
        S: AsyncSession,
        C: FaultClassifier<S::Fault>,
        F: for<'s> FnMut(&'s mut S) -> BoxFuture<'s, Result<R, S::Fault>>,
    {
        if token.is_cancelled() {
            return Err(RetryError::Cancelled);
        }

        let mut retries = self.retry_session();
        session.open().await.map_err(RetryError::Fault)?;

        loop {
            match op(session).await {
                Ok(result) => return Ok(result),
                Err(fault) => {
                    if token.is_cancelled() {
                        return Err(RetryError::Cancelled);
                    }
                    match self.on_fault(&mut retries, &fault) {
                        FaultAction::Propagate => return Err(RetryError::Fault(fault)),
                        FaultAction::Exhausted => {
                            return Err(RetryError::RetryLimitExceeded {
                                attempts: retries.attempts(),
                                source: fault,
                            });
                        }
                        FaultAction::RetryAfter(delay) => {
                            self.wait(delay, token).await?;
                            session.reset().await.map_err(RetryError::Fault)?;
                        }
                    }
                }
            }
        }
    }
}

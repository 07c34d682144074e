use crate::classify::FaultClassifier;
use crate::core::RetryError;
use crate::session::{AsyncSession, IsolationLevel, Session};
use crate::strategy::{CancellationToken, ExecutionStrategy, FaultAction};
use futures::future::BoxFuture;
use log::debug;
use std::thread;

impl<C> ExecutionStrategy<C> {
    /// Run `op` inside a transaction, retrying transient faults and
    /// resolving commit ambiguity through `verify_succeeded`.
    ///
    /// Each attempt begins a fresh transaction (at `isolation`, or the store
    /// default), runs the whole unit of work, then commits. A fault before
    /// commit rolls back and retries the entire sequence; the transaction is
    /// known not to have committed, so the predicate is never consulted. A
    /// transient fault *during* commit leaves the outcome unknown: the
    /// session is reset and `verify_succeeded` decides — `true` means the
    /// effect is durable and the already-computed result is returned without
    /// retrying, `false` means a genuine failure worth another attempt.
    ///
    /// `verify_succeeded` runs outside any transaction, on a fresh implicit
    /// read, and must tolerate being called repeatedly. A fault it raises is
    /// classified and retried like any other, within the same ceiling.
    pub fn execute_in_transaction<S, R, F, V>(
        &mut self,
        session: &mut S,
        mut op: F,
        mut verify_succeeded: V,
        isolation: Option<IsolationLevel>,
    ) -> Result<R, RetryError<S::Fault>>
    where
        S: Session,
        C: FaultClassifier<S::Fault>,
        F: FnMut(&mut S) -> Result<R, S::Fault>,
        V: FnMut(&mut S) -> Result<bool, S::Fault>,
    {
        let mut retries = self.retry_session();
        session.open().map_err(RetryError::Fault)?;

        loop {
            let attempt = transactional_attempt(
                self.classifier(),
                session,
                &mut op,
                &mut verify_succeeded,
                isolation,
            );
            match attempt {
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

    /// Asynchronous form of
    /// [`execute_in_transaction`](Self::execute_in_transaction).
    ///
    /// Cancellation observed during the backoff delay, or after an in-flight
    /// attempt, aborts with [`RetryError::Cancelled`] before any further
    /// attempt starts.
    pub async fn execute_in_transaction_async<S, R, F, V>(
        &mut self,
        session: &mut S,
        mut op: F,
        mut verify_succeeded: V,
        isolation: Option<IsolationLevel>,
        token: &CancellationToken,
    ) -> Result<R, RetryError<S::Fault>>
    where
        S: AsyncSession,
        C: FaultClassifier<S::Fault>,
        F: for<'s> FnMut(&'s mut S) -> BoxFuture<'s, Result<R, S::Fault>>,
        V: for<'s> FnMut(&'s mut S) -> BoxFuture<'s, Result<bool, S::Fault>>,
    {
        if token.is_cancelled() {
            return Err(RetryError::Cancelled);
        }

        let mut retries = self.retry_session();
        session.open().await.map_err(RetryError::Fault)?;

        loop {
            let attempt = transactional_attempt_async(
                self.classifier(),
                session,
                &mut op,
                &mut verify_succeeded,
                isolation,
            )
            .await;
            match attempt {
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

/// One begin -> operation -> commit attempt, with ambiguity resolution.
fn transactional_attempt<C, S, R, F, V>(
    classifier: &C,
    session: &mut S,
    op: &mut F,
    verify_succeeded: &mut V,
    isolation: Option<IsolationLevel>,
) -> Result<R, S::Fault>
where
    S: Session,
    C: FaultClassifier<S::Fault>,
    F: FnMut(&mut S) -> Result<R, S::Fault>,
    V: FnMut(&mut S) -> Result<bool, S::Fault>,
{
    let tx = session.begin(isolation)?;

    let result = match op(session) {
        Ok(result) => result,
        Err(fault) => {
            // Best effort: the operation's fault must not be masked.
            let _ = session.rollback(&tx);
            return Err(fault);
        }
    };

    match session.commit(&tx) {
        Ok(()) => Ok(result),
        Err(fault) => {
            if classifier.is_transient(&fault) && classifier.is_commit_ambiguous(&fault) {
                // The store may or may not have applied the transaction.
                // Check on a fresh implicit read before deciding anything.
                session.reset()?;
                if verify_succeeded(session)? {
                    debug!("ambiguous commit fault resolved as committed: {fault}");
                    return Ok(result);
                }
            }
            Err(fault)
        }
    }
}

/// Asynchronous twin of [`transactional_attempt`]; same rules, same order.
async fn transactional_attempt_async<C, S, R, F, V>(
    classifier: &C,
    session: &mut S,
    op: &mut F,
    verify_succeeded: &mut V,
    isolation: Option<IsolationLevel>,
) -> Result<R, S::Fault>
where
    S: AsyncSession,
    C: FaultClassifier<S::Fault>,
    F: for<'s> FnMut(&'s mut S) -> BoxFuture<'s, Result<R, S::Fault>>,
    V: for<'s> FnMut(&'s mut S) -> BoxFuture<'s, Result<bool, S::Fault>>,
{
    let tx = session.begin(isolation).await?;

    let result = match op(session).await {
        Ok(result) => result,
        Err(fault) => {
            let _ = session.rollback(&tx).await;
            return Err(fault);
        }
    };

    match session.commit(&tx).await {
        Ok(()) => Ok(result),
        Err(fault) => {
            if classifier.is_transient(&fault) && classifier.is_commit_ambiguous(&fault) {
                session.reset().await?;
                if verify_succeeded(session).await? {
                    debug!("ambiguous commit fault resolved as committed: {fault}");
                    return Ok(result);
                }
            }
            Err(fault)
        }
    }
}

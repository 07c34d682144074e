use thiserror::Error;

/// Terminal outcome of a strategy invocation that did not produce a result.
///
/// Classification and verification happen inside the strategy; the caller
/// only ever sees one of these variants, never an intermediate transient
/// fault that was retried away.
#[derive(Error, Debug)]
pub enum RetryError<E> {
    /// A non-transient fault, propagated unchanged.
    #[error(transparent)]
    Fault(E),

    /// The retry ceiling was reached while retrying a transient fault.
    #[error("retry limit exceeded after {attempts} attempts")]
    RetryLimitExceeded {
        /// Attempts made, including the first.
        attempts: u32,
        /// The last fault observed before giving up.
        #[source]
        source: E,
    },

    /// The invocation was cancelled before completing. Takes precedence
    /// over starting any further attempt.
    #[error("operation cancelled")]
    Cancelled,
}

pub type StrategyResult<T, E> = std::result::Result<T, RetryError<E>>;

use std::sync::Arc;
use tokio::sync::watch;

/// Clonable cancellation signal for the asynchronous execution path.
///
/// Cancelling aborts the invocation promptly: a strategy sleeping out a
/// backoff delay wakes immediately, and no further attempt is started.
/// Clones observe the same signal.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    signal: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { signal: Arc::new(tx) }
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.signal.send_replace(true);
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        *self.signal.borrow()
    }

    /// Wait until [`cancel`](Self::cancel) is called. Returns immediately if
    /// it already was.
    pub async fn cancelled(&self) {
        let mut rx = self.signal.subscribe();
        // wait_for inspects the current value before suspending and the
        // token keeps the sender alive, so this can neither error nor miss
        // a signal sent before subscribing.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

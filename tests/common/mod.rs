//! Fault-injecting fake store shared by the integration suites.
//!
//! Shaped like a remote transactional store: sessions open transport, stage
//! statements inside transactions, and commit durably. Outcome queues inject
//! faults per call: `None` means success, `Some(false)` a benign fault (the
//! effect was applied but a fault was still raised), `Some(true)` a real
//! fault (no effect).

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use txretry::{AsyncSession, FaultClassifier, IsolationLevel, Session, TransactionHandle};

#[derive(Debug, Error)]
pub enum FakeFault {
    #[error("connection dropped")]
    ConnectionDropped,

    #[error("commit interrupted: outcome unknown")]
    CommitInterrupted,

    #[error("constraint violation")]
    ConstraintViolation,

    #[error("protocol error: {0}")]
    Protocol(&'static str),
}

pub struct FakeClassifier;

impl FaultClassifier<FakeFault> for FakeClassifier {
    fn is_transient(&self, fault: &FakeFault) -> bool {
        matches!(
            fault,
            FakeFault::ConnectionDropped | FakeFault::CommitInterrupted
        )
    }

    fn is_commit_ambiguous(&self, fault: &FakeFault) -> bool {
        matches!(fault, FakeFault::CommitInterrupted)
    }
}

#[derive(Default)]
struct StoreInner {
    rows: Vec<i64>,
    staged: HashMap<u64, Vec<i64>>,
    next_tx_id: u64,
    open_count: usize,
    execution_count: usize,
    commit_outcomes: VecDeque<Option<bool>>,
    execution_outcomes: VecDeque<Option<bool>>,
    last_isolation: Option<IsolationLevel>,
}

/// Shared fake store. Cheap to clone; every session observes the same state.
#[derive(Clone, Default)]
pub struct FakeStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> FakeSession {
        FakeSession {
            store: self.clone(),
            open: false,
            owned: None,
            enlisted: None,
        }
    }

    /// Queue commit outcomes, consumed one per commit call. An empty queue
    /// means commits succeed.
    pub fn enqueue_commit_outcomes<I>(&self, outcomes: I)
    where
        I: IntoIterator<Item = Option<bool>>,
    {
        self.inner.lock().unwrap().commit_outcomes.extend(outcomes);
    }

    /// Queue statement outcomes, consumed one per executed statement. An
    /// empty queue means statements succeed.
    pub fn enqueue_execution_outcomes<I>(&self, outcomes: I)
    where
        I: IntoIterator<Item = Option<bool>>,
    {
        self.inner
            .lock()
            .unwrap()
            .execution_outcomes
            .extend(outcomes);
    }

    /// Transport opens observed so far, across all sessions.
    pub fn open_count(&self) -> usize {
        self.inner.lock().unwrap().open_count
    }

    /// Statements executed so far, across all sessions and attempts.
    pub fn execution_count(&self) -> usize {
        self.inner.lock().unwrap().execution_count
    }

    /// Durably committed rows.
    pub fn rows(&self) -> Vec<i64> {
        self.inner.lock().unwrap().rows.clone()
    }

    pub fn row_count(&self) -> usize {
        self.inner.lock().unwrap().rows.len()
    }

    /// Isolation level passed to the most recent begin.
    pub fn last_isolation(&self) -> Option<IsolationLevel> {
        self.inner.lock().unwrap().last_isolation
    }
}

/// One session onto the fake store.
pub struct FakeSession {
    store: FakeStore,
    open: bool,
    owned: Option<TransactionHandle>,
    enlisted: Option<TransactionHandle>,
}

impl FakeSession {
    pub fn store(&self) -> &FakeStore {
        &self.store
    }

    /// Execute one insert statement. Staged inside the current transaction
    /// (enlisted or owned); outside any transaction the row lands durably
    /// right away.
    pub fn insert(&mut self, value: i64) -> Result<(), FakeFault> {
        if !self.open {
            return Err(FakeFault::Protocol("statement on a closed session"));
        }

        let target = self
            .enlisted
            .as_ref()
            .or(self.owned.as_ref())
            .map(TransactionHandle::id);

        let mut inner = self.store.inner.lock().unwrap();
        inner.execution_count += 1;

        let outcome = inner.execution_outcomes.pop_front().flatten();
        if outcome == Some(true) {
            return Err(FakeFault::ConnectionDropped);
        }

        match target {
            Some(tx_id) => inner.staged.entry(tx_id).or_default().push(value),
            None => inner.rows.push(value),
        }

        if outcome == Some(false) {
            return Err(FakeFault::ConnectionDropped);
        }
        Ok(())
    }

    /// Fresh implicit read of the durable row count, outside any
    /// transaction. What verification predicates use.
    pub fn row_count(&self) -> usize {
        self.store.row_count()
    }

    fn do_open(&mut self) -> Result<(), FakeFault> {
        self.store.inner.lock().unwrap().open_count += 1;
        self.open = true;
        Ok(())
    }

    fn do_close(&mut self) -> Result<(), FakeFault> {
        // Dropping transport discards any transaction still owned.
        if let Some(tx) = self.owned.take() {
            self.store.inner.lock().unwrap().staged.remove(&tx.id());
        }
        self.open = false;
        Ok(())
    }

    fn do_begin(
        &mut self,
        isolation: Option<IsolationLevel>,
    ) -> Result<TransactionHandle, FakeFault> {
        if !self.open {
            return Err(FakeFault::Protocol("begin on a closed session"));
        }
        if self.owned.is_some() {
            return Err(FakeFault::Protocol("nested transaction"));
        }

        let mut inner = self.store.inner.lock().unwrap();
        inner.next_tx_id += 1;
        let id = inner.next_tx_id;
        inner.last_isolation = isolation;
        inner.staged.insert(id, Vec::new());
        drop(inner);

        let handle = TransactionHandle::new(id);
        self.owned = Some(handle.clone());
        Ok(handle)
    }

    fn do_commit(&mut self, tx: &TransactionHandle) -> Result<(), FakeFault> {
        if self.owned.as_ref() != Some(tx) {
            return Err(FakeFault::Protocol("commit of an unowned transaction"));
        }
        self.owned = None;

        let mut inner = self.store.inner.lock().unwrap();
        let staged = inner.staged.remove(&tx.id()).unwrap_or_default();

        match inner.commit_outcomes.pop_front().flatten() {
            // Real failure: the store did not apply the transaction.
            Some(true) => Err(FakeFault::CommitInterrupted),
            // Benign failure: applied, but the fault was raised anyway.
            Some(false) => {
                inner.rows.extend(staged);
                Err(FakeFault::CommitInterrupted)
            }
            None => {
                inner.rows.extend(staged);
                Ok(())
            }
        }
    }

    fn do_rollback(&mut self, tx: &TransactionHandle) -> Result<(), FakeFault> {
        if self.owned.as_ref() == Some(tx) {
            self.owned = None;
        }
        self.store.inner.lock().unwrap().staged.remove(&tx.id());
        Ok(())
    }

    fn do_enlist(&mut self, tx: &TransactionHandle) -> Result<(), FakeFault> {
        if self.owned.is_some() {
            return Err(FakeFault::Protocol("session already owns a transaction"));
        }
        self.enlisted = Some(tx.clone());
        Ok(())
    }

    fn do_clear_enlistment(&mut self) -> Result<(), FakeFault> {
        self.enlisted = None;
        Ok(())
    }
}

impl Session for FakeSession {
    type Fault = FakeFault;

    fn open(&mut self) -> Result<(), FakeFault> {
        self.do_open()
    }

    fn close(&mut self) -> Result<(), FakeFault> {
        self.do_close()
    }

    fn begin(
        &mut self,
        isolation: Option<IsolationLevel>,
    ) -> Result<TransactionHandle, FakeFault> {
        self.do_begin(isolation)
    }

    fn commit(&mut self, tx: &TransactionHandle) -> Result<(), FakeFault> {
        self.do_commit(tx)
    }

    fn rollback(&mut self, tx: &TransactionHandle) -> Result<(), FakeFault> {
        self.do_rollback(tx)
    }

    fn current_transaction(&self) -> Option<&TransactionHandle> {
        self.owned.as_ref()
    }

    fn enlist(&mut self, tx: &TransactionHandle) -> Result<(), FakeFault> {
        self.do_enlist(tx)
    }

    fn clear_enlistment(&mut self) -> Result<(), FakeFault> {
        self.do_clear_enlistment()
    }
}

#[async_trait]
impl AsyncSession for FakeSession {
    type Fault = FakeFault;

    async fn open(&mut self) -> Result<(), FakeFault> {
        self.do_open()
    }

    async fn close(&mut self) -> Result<(), FakeFault> {
        self.do_close()
    }

    async fn begin(
        &mut self,
        isolation: Option<IsolationLevel>,
    ) -> Result<TransactionHandle, FakeFault> {
        self.do_begin(isolation)
    }

    async fn commit(&mut self, tx: &TransactionHandle) -> Result<(), FakeFault> {
        self.do_commit(tx)
    }

    async fn rollback(&mut self, tx: &TransactionHandle) -> Result<(), FakeFault> {
        self.do_rollback(tx)
    }

    fn current_transaction(&self) -> Option<&TransactionHandle> {
        self.owned.as_ref()
    }

    async fn enlist(&mut self, tx: &TransactionHandle) -> Result<(), FakeFault> {
        self.do_enlist(tx)
    }

    async fn clear_enlistment(&mut self) -> Result<(), FakeFault> {
        self.do_clear_enlistment()
    }
}

/// A strategy tuned for fast test runs: tiny deterministic delays.
pub fn fast_strategy(max_retries: u32) -> txretry::ExecutionStrategy<FakeClassifier> {
    let policy = txretry::RetryPolicy::new()
        .max_retries(max_retries)
        .base_delay(std::time::Duration::from_millis(1))
        .max_delay(std::time::Duration::from_millis(4))
        .jitter_pct(0);
    txretry::ExecutionStrategy::new(FakeClassifier, policy)
}

//! The opaque session seam between the strategy and the store.
//!
//! The strategy drives the lifecycle below and passes the session through to
//! operations and verification predicates unchanged; it never inspects store
//! internals.

use async_trait::async_trait;

/// Transaction isolation levels recognized by the store seam.
///
/// `None` at the call sites means the store's default level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

/// Opaque handle to one store transaction.
///
/// Owned by the session driving the current attempt. Other sessions may hold
/// an enlisted copy placed by the shared-transaction coordinator for the
/// duration of one shared commit, never an independent one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionHandle {
    id: u64,
}

impl TransactionHandle {
    /// Wrap a store-assigned transaction id.
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    /// The store-assigned id.
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Blocking session handle onto the store.
pub trait Session {
    /// Store fault type, classified by the paired
    /// [`FaultClassifier`](crate::classify::FaultClassifier).
    type Fault: std::error::Error + Send + Sync + 'static;

    /// Acquire transport resources. Called once before the first attempt.
    fn open(&mut self) -> Result<(), Self::Fault>;

    /// Release transport resources.
    fn close(&mut self) -> Result<(), Self::Fault>;

    /// Close and reopen, so the next attempt (or a verification read) starts
    /// from clean transport state. One observable open per attempt.
    fn reset(&mut self) -> Result<(), Self::Fault> {
        self.close()?;
        self.open()
    }

    /// Begin a transaction at the given isolation level, or the store
    /// default when omitted.
    fn begin(
        &mut self,
        isolation: Option<IsolationLevel>,
    ) -> Result<TransactionHandle, Self::Fault>;

    /// Commit the transaction.
    fn commit(&mut self, tx: &TransactionHandle) -> Result<(), Self::Fault>;

    /// Roll the transaction back.
    fn rollback(&mut self, tx: &TransactionHandle) -> Result<(), Self::Fault>;

    /// The transaction currently owned by this session, if any.
    fn current_transaction(&self) -> Option<&TransactionHandle>;

    /// Enlist this session in a transaction owned by another session, so
    /// both commit or roll back together.
    fn enlist(&mut self, tx: &TransactionHandle) -> Result<(), Self::Fault>;

    /// Clear any enlistment previously placed by [`enlist`](Session::enlist).
    fn clear_enlistment(&mut self) -> Result<(), Self::Fault>;
}

/// Asynchronous twin of [`Session`].
///
/// Every retry and verification rule applies identically on this path.
#[async_trait]
pub trait AsyncSession: Send {
    /// Store fault type, classified by the paired
    /// [`FaultClassifier`](crate::classify::FaultClassifier).
    type Fault: std::error::Error + Send + Sync + 'static;

    /// Acquire transport resources. Called once before the first attempt.
    async fn open(&mut self) -> Result<(), Self::Fault>;

    /// Release transport resources.
    async fn close(&mut self) -> Result<(), Self::Fault>;

    /// Close and reopen, so the next attempt (or a verification read) starts
    /// from clean transport state.
    async fn reset(&mut self) -> Result<(), Self::Fault> {
        self.close().await?;
        self.open().await
    }

    /// Begin a transaction at the given isolation level, or the store
    /// default when omitted.
    async fn begin(
        &mut self,
        isolation: Option<IsolationLevel>,
    ) -> Result<TransactionHandle, Self::Fault>;

    /// Commit the transaction.
    async fn commit(&mut self, tx: &TransactionHandle) -> Result<(), Self::Fault>;

    /// Roll the transaction back.
    async fn rollback(&mut self, tx: &TransactionHandle) -> Result<(), Self::Fault>;

    /// The transaction currently owned by this session, if any.
    fn current_transaction(&self) -> Option<&TransactionHandle>;

    /// Enlist this session in a transaction owned by another session.
    async fn enlist(&mut self, tx: &TransactionHandle) -> Result<(), Self::Fault>;

    /// Clear any enlistment previously placed by
    /// [`enlist`](AsyncSession::enlist).
    async fn clear_enlistment(&mut self) -> Result<(), Self::Fault>;
}

use crate::session::{AsyncSession, Session, TransactionHandle};

/// Enlists additional sessions into a transaction owned by another session,
/// so their units of work commit or roll back together as one atomic
/// operation.
///
/// The coordinator holds only a copy of the owner's handle; the owning
/// session keeps driving begin/commit/rollback through its own strategy
/// invocation, and enlisted sessions borrow the transaction for the duration
/// of one shared commit.
#[derive(Debug, Clone)]
pub struct SharedTransactionCoordinator {
    owner: TransactionHandle,
}

impl SharedTransactionCoordinator {
    /// Coordinate sharing of the transaction currently owned by the driving
    /// session.
    pub fn new(owner: TransactionHandle) -> Self {
        Self { owner }
    }

    /// The owning transaction.
    pub fn handle(&self) -> &TransactionHandle {
        &self.owner
    }

    /// Enlist `session` in the owning transaction.
    ///
    /// Always detaches first: a stale enlistment left over from a previous
    /// attempt is cleared before the current handle is attached, so attach
    /// is safe to repeat on every retry.
    pub fn attach<S: Session>(&self, session: &mut S) -> Result<(), S::Fault> {
        session.clear_enlistment()?;
        session.enlist(&self.owner)
    }

    /// Remove `session` from the owning transaction.
    pub fn detach<S: Session>(&self, session: &mut S) -> Result<(), S::Fault> {
        session.clear_enlistment()
    }

    /// Asynchronous form of [`attach`](Self::attach).
    pub async fn attach_async<S: AsyncSession>(&self, session: &mut S) -> Result<(), S::Fault> {
        session.clear_enlistment().await?;
        session.enlist(&self.owner).await
    }

    /// Asynchronous form of [`detach`](Self::detach).
    pub async fn detach_async<S: AsyncSession>(&self, session: &mut S) -> Result<(), S::Fault> {
        session.clear_enlistment().await
    }
}

// ============================================================================
// Transactional Execution Module
// ============================================================================
//
// Layers transaction boundaries under the retry loop: every attempt is a
// fresh begin -> operation -> commit sequence, and a fault raised while the
// commit was in flight is resolved through the caller's verification
// predicate before any retry decision.
//
// ============================================================================

pub mod executor;
pub mod shared;

pub use shared::SharedTransactionCoordinator;

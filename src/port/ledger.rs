//! Point-ledger port.

use std::future::Future;

use crate::domain::UserId;
use crate::error::Result;

/// External capability that credits and debits user point balances.
///
/// The ledger is the single authority on balances; this core never stores
/// or computes them. Implementations must make `credit` idempotent under
/// retry using the provided key - settlement passes the stake id, so a
/// retried settlement run re-sends the same keys and must not double-pay.
pub trait PointLedger: Send + Sync {
    /// Remove `amount` points from the user's balance.
    ///
    /// Fails with `LedgerError::InsufficientBalance` if the user cannot
    /// cover the amount.
    fn debit(&self, user: &UserId, amount: i64) -> impl Future<Output = Result<()>> + Send;

    /// Add `amount` points to the user's balance.
    ///
    /// A repeated call with the same `idempotency_key` must be a no-op
    /// reported as success.
    fn credit(
        &self,
        user: &UserId,
        amount: i64,
        idempotency_key: &str,
    ) -> impl Future<Output = Result<()>> + Send;
}

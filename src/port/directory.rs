//! User-directory port.

use std::future::Future;

use crate::domain::UserId;
use crate::error::Result;

/// Resolves whether a user id refers to an existing account.
///
/// Consulted before accepting a stake; everything else about users is out
/// of this core's hands.
pub trait UserDirectory: Send + Sync {
    /// Whether the user exists.
    fn exists(&self, user: &UserId) -> impl Future<Output = Result<bool>> + Send;
}

//! Append-only status history entries.

use chrono::{DateTime, Utc};

use super::id::MarketId;
use super::market::MarketStatus;

/// One audit entry recorded on every lifecycle transition.
///
/// Entries are append-only: no update or delete operation exists anywhere
/// in the crate. The services append one right after each successful
/// status mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    pub market_id: MarketId,
    pub status: MarketStatus,
    pub recorded_at: DateTime<Utc>,
}

impl StatusRecord {
    /// Create a record stamped with the current time.
    pub fn now(market_id: MarketId, status: MarketStatus) -> Self {
        Self {
            market_id,
            status,
            recorded_at: Utc::now(),
        }
    }
}

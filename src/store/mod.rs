//! Persistence layer with pluggable storage backends.
//!
//! Two implementations exist: [`MemoryStore`] (tests and the reference
//! implementation of the atomicity contract) and [`SqliteStore`] (Diesel).
//!
//! # Atomicity contract
//!
//! Two race classes from the concurrency model are discharged here rather
//! than in the services:
//!
//! - `place_stake` performs the lifecycle check and the stake insert in one
//!   atomic unit, so a stake cannot sneak in after the market leaves
//!   `Ongoing`.
//! - `transition_status` is a conditional update guarded by the current
//!   status. The `Resolved -> Rewarded` transition is the settlement
//!   serialization point: exactly one caller observes `true`, everyone
//!   else loses the race and performs no ledger calls.

pub mod db;
mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::future::Future;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::{
    ChoiceId, Market, MarketId, MarketStatus, OptionId, Stake, StakeId, StatusRecord, UserId,
};
use crate::error::Result;

/// Storage operations for the market aggregate.
pub trait MarketStore: Send + Sync {
    /// Persist a freshly created market with its options and choices.
    fn insert_market(&self, market: &Market) -> impl Future<Output = Result<()>> + Send;

    /// Load a market aggregate by id.
    fn get_market(&self, id: &MarketId) -> impl Future<Output = Result<Option<Market>>> + Send;

    /// List all markets currently in the given status.
    fn list_by_status(
        &self,
        status: MarketStatus,
    ) -> impl Future<Output = Result<Vec<Market>>> + Send;

    /// List `Ongoing` markets whose end time is at or before `now`.
    fn list_ongoing_past_end(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Market>>> + Send;

    /// Conditionally move a market from `from` to `to`.
    ///
    /// Returns `false` without mutating anything if the market's current
    /// status is not `from`. Marks the market settled when `to` is
    /// `Rewarded`.
    fn transition_status(
        &self,
        id: &MarketId,
        from: MarketStatus,
        to: MarketStatus,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Conditionally cancel a market, recording the reason.
    ///
    /// Succeeds only from `Reviewing` or `Ongoing`; returns `false`
    /// otherwise.
    fn cancel_market(
        &self,
        id: &MarketId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Record the winning choice for an option.
    fn set_winning_choice(
        &self,
        market: &MarketId,
        option: &OptionId,
        choice: &ChoiceId,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Persist settlement odds onto an option (display only, post hoc).
    fn set_option_odds(
        &self,
        market: &MarketId,
        option: &OptionId,
        odds: Decimal,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Storage operations for stakes.
pub trait StakeStore: Send + Sync {
    /// Insert a stake and update the choice pool atomically.
    ///
    /// Fails with `InvalidState` if the market is not `Ongoing`, and with
    /// `DuplicateStake` if the user already holds an active stake in the
    /// market. Both checks happen inside the same unit of work as the
    /// insert.
    fn place_stake(&self, stake: &Stake) -> impl Future<Output = Result<()>> + Send;

    /// Cancel a stake and restore the choice pool atomically.
    ///
    /// Guards: the stake must exist, belong to `user`, not be cancelled
    /// already, and its market must still be `Ongoing`. Returns the
    /// cancelled stake so the caller can refund it.
    fn cancel_stake(
        &self,
        id: &StakeId,
        user: &UserId,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<Stake>> + Send;

    /// All stakes ever placed on a market, cancelled included.
    fn stakes_for_market(
        &self,
        market: &MarketId,
    ) -> impl Future<Output = Result<Vec<Stake>>> + Send;

    /// All stakes a user has placed, across markets.
    fn stakes_for_user(&self, user: &UserId) -> impl Future<Output = Result<Vec<Stake>>> + Send;

    /// The user's active stake in a market, if any.
    fn active_stake(
        &self,
        market: &MarketId,
        user: &UserId,
    ) -> impl Future<Output = Result<Option<Stake>>> + Send;

    /// Record the settled reward on a stake.
    fn set_reward(
        &self,
        id: &StakeId,
        reward: i64,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Overwrite the cached display odds for a market's choices.
    fn refresh_choice_odds(
        &self,
        market: &MarketId,
        odds: &[(ChoiceId, Decimal)],
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Append-only sink for lifecycle audit entries.
pub trait HistoryStore: Send + Sync {
    /// Append a status record. There is no update or delete.
    fn append_status(&self, record: &StatusRecord) -> impl Future<Output = Result<()>> + Send;

    /// All records for a market, in insertion order.
    fn history_for_market(
        &self,
        market: &MarketId,
    ) -> impl Future<Output = Result<Vec<StatusRecord>>> + Send;
}

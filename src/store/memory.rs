//! In-memory store implementation for testing.
//!
//! A single `RwLock` over all tables gives every operation the same
//! atomicity the SQLite backend gets from transactions, which is exactly
//! what the race tests need.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;

use super::{HistoryStore, MarketStore, StakeStore};
use crate::domain::{
    ChoiceId, DomainError, Market, MarketId, MarketStatus, OptionId, Stake, StakeId, StatusRecord,
    UserId,
};
use crate::error::Result;

#[derive(Debug, Default)]
struct Tables {
    markets: HashMap<MarketId, Market>,
    stakes: HashMap<StakeId, Stake>,
    history: Vec<StatusRecord>,
}

/// In-memory store for testing purposes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a stake directly, bypassing the lifecycle and duplicate
    /// guards. Fixture-only: lets tests seed already-settled history that
    /// `place_stake` would rightly reject.
    #[cfg(any(test, feature = "testkit"))]
    pub fn insert_stake_unchecked(&self, stake: &Stake) {
        self.tables
            .write()
            .stakes
            .insert(stake.id.clone(), stake.clone());
    }

    fn not_found(entity: &'static str, id: impl ToString) -> crate::error::Error {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
        .into()
    }
}

impl MarketStore for MemoryStore {
    async fn insert_market(&self, market: &Market) -> Result<()> {
        self.tables
            .write()
            .markets
            .insert(market.id.clone(), market.clone());
        Ok(())
    }

    async fn get_market(&self, id: &MarketId) -> Result<Option<Market>> {
        Ok(self.tables.read().markets.get(id).cloned())
    }

    async fn list_by_status(&self, status: MarketStatus) -> Result<Vec<Market>> {
        let tables = self.tables.read();
        let mut markets: Vec<Market> = tables
            .markets
            .values()
            .filter(|m| m.status == status)
            .cloned()
            .collect();
        markets.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(markets)
    }

    async fn list_ongoing_past_end(&self, now: DateTime<Utc>) -> Result<Vec<Market>> {
        let tables = self.tables.read();
        let mut markets: Vec<Market> = tables
            .markets
            .values()
            .filter(|m| m.status == MarketStatus::Ongoing && m.end_at <= now)
            .cloned()
            .collect();
        markets.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(markets)
    }

    async fn transition_status(
        &self,
        id: &MarketId,
        from: MarketStatus,
        to: MarketStatus,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tables = self.tables.write();
        let market = tables
            .markets
            .get_mut(id)
            .ok_or_else(|| Self::not_found("market", id))?;
        if market.status != from {
            return Ok(false);
        }
        market.status = to;
        market.updated_at = at;
        // Reverting a failed settlement claim must clear the flag again.
        market.settled = to == MarketStatus::Rewarded;
        Ok(true)
    }

    async fn cancel_market(&self, id: &MarketId, reason: &str, at: DateTime<Utc>) -> Result<bool> {
        let mut tables = self.tables.write();
        let market = tables
            .markets
            .get_mut(id)
            .ok_or_else(|| Self::not_found("market", id))?;
        if !matches!(
            market.status,
            MarketStatus::Reviewing | MarketStatus::Ongoing
        ) {
            return Ok(false);
        }
        market.status = MarketStatus::Cancelled;
        market.cancel_reason = Some(reason.to_string());
        market.updated_at = at;
        Ok(true)
    }

    async fn set_winning_choice(
        &self,
        market: &MarketId,
        option: &OptionId,
        choice: &ChoiceId,
    ) -> Result<()> {
        let mut tables = self.tables.write();
        let market = tables
            .markets
            .get_mut(market)
            .ok_or_else(|| Self::not_found("market", market))?;
        let option = market
            .options
            .iter_mut()
            .find(|o| &o.id == option)
            .ok_or_else(|| Self::not_found("option", option))?;
        option.winning_choice = Some(choice.clone());
        Ok(())
    }

    async fn set_option_odds(
        &self,
        market: &MarketId,
        option: &OptionId,
        odds: Decimal,
    ) -> Result<()> {
        let mut tables = self.tables.write();
        let market = tables
            .markets
            .get_mut(market)
            .ok_or_else(|| Self::not_found("market", market))?;
        let option = market
            .options
            .iter_mut()
            .find(|o| &o.id == option)
            .ok_or_else(|| Self::not_found("option", option))?;
        option.odds = Some(odds);
        Ok(())
    }
}

impl StakeStore for MemoryStore {
    async fn place_stake(&self, stake: &Stake) -> Result<()> {
        let mut tables = self.tables.write();

        let duplicate = tables.stakes.values().any(|s| {
            s.market_id == stake.market_id && s.user_id == stake.user_id && s.is_active()
        });
        if duplicate {
            return Err(DomainError::DuplicateStake {
                market: stake.market_id.to_string(),
                user: stake.user_id.to_string(),
            }
            .into());
        }

        let market = tables
            .markets
            .get_mut(&stake.market_id)
            .ok_or_else(|| Self::not_found("market", &stake.market_id))?;
        if market.status != MarketStatus::Ongoing {
            return Err(DomainError::InvalidState {
                operation: "stake",
                status: market.status,
            }
            .into());
        }

        let choice = market
            .options
            .iter_mut()
            .find(|o| o.id == stake.option_id)
            .and_then(|o| o.choices.iter_mut().find(|c| c.id == stake.choice_id))
            .ok_or_else(|| Self::not_found("choice", &stake.choice_id))?;
        choice.pool += stake.amount;
        choice.participants += 1;

        tables.stakes.insert(stake.id.clone(), stake.clone());
        Ok(())
    }

    async fn cancel_stake(&self, id: &StakeId, user: &UserId, at: DateTime<Utc>) -> Result<Stake> {
        let mut tables = self.tables.write();

        let stake = tables
            .stakes
            .get(id)
            .cloned()
            .ok_or_else(|| Self::not_found("stake", id))?;
        if &stake.user_id != user {
            return Err(DomainError::StakeNotOwned {
                stake: id.to_string(),
                user: user.to_string(),
            }
            .into());
        }
        if stake.cancelled {
            return Err(DomainError::StakeCancelled {
                stake: id.to_string(),
            }
            .into());
        }

        let market = tables
            .markets
            .get_mut(&stake.market_id)
            .ok_or_else(|| Self::not_found("market", &stake.market_id))?;
        if market.status != MarketStatus::Ongoing {
            return Err(DomainError::InvalidState {
                operation: "cancel stake",
                status: market.status,
            }
            .into());
        }

        let choice = market
            .options
            .iter_mut()
            .find(|o| o.id == stake.option_id)
            .and_then(|o| o.choices.iter_mut().find(|c| c.id == stake.choice_id))
            .ok_or_else(|| Self::not_found("choice", &stake.choice_id))?;
        choice.pool -= stake.amount;
        choice.participants -= 1;

        let stored = tables
            .stakes
            .get_mut(id)
            .ok_or_else(|| Self::not_found("stake", id))?;
        stored.cancelled = true;
        stored.updated_at = at;
        Ok(stored.clone())
    }

    async fn stakes_for_market(&self, market: &MarketId) -> Result<Vec<Stake>> {
        let tables = self.tables.read();
        let mut stakes: Vec<Stake> = tables
            .stakes
            .values()
            .filter(|s| &s.market_id == market)
            .cloned()
            .collect();
        stakes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(stakes)
    }

    async fn stakes_for_user(&self, user: &UserId) -> Result<Vec<Stake>> {
        let tables = self.tables.read();
        let mut stakes: Vec<Stake> = tables
            .stakes
            .values()
            .filter(|s| &s.user_id == user)
            .cloned()
            .collect();
        stakes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(stakes)
    }

    async fn active_stake(&self, market: &MarketId, user: &UserId) -> Result<Option<Stake>> {
        let tables = self.tables.read();
        Ok(tables
            .stakes
            .values()
            .find(|s| &s.market_id == market && &s.user_id == user && s.is_active())
            .cloned())
    }

    async fn set_reward(&self, id: &StakeId, reward: i64, at: DateTime<Utc>) -> Result<()> {
        let mut tables = self.tables.write();
        let stake = tables
            .stakes
            .get_mut(id)
            .ok_or_else(|| Self::not_found("stake", id))?;
        stake.reward = Some(reward);
        stake.updated_at = at;
        Ok(())
    }

    async fn refresh_choice_odds(
        &self,
        market: &MarketId,
        odds: &[(ChoiceId, Decimal)],
    ) -> Result<()> {
        let mut tables = self.tables.write();
        let market = tables
            .markets
            .get_mut(market)
            .ok_or_else(|| Self::not_found("market", market))?;
        for (choice_id, value) in odds {
            if let Some(choice) = market
                .options
                .iter_mut()
                .flat_map(|o| o.choices.iter_mut())
                .find(|c| &c.id == choice_id)
            {
                choice.odds = Some(*value);
            }
        }
        Ok(())
    }
}

impl HistoryStore for MemoryStore {
    async fn append_status(&self, record: &StatusRecord) -> Result<()> {
        self.tables.write().history.push(record.clone());
        Ok(())
    }

    async fn history_for_market(&self, market: &MarketId) -> Result<Vec<StatusRecord>> {
        let tables = self.tables.read();
        Ok(tables
            .history
            .iter()
            .filter(|r| &r.market_id == market)
            .cloned()
            .collect())
    }
}

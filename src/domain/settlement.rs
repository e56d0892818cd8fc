//! Pure settlement computation.
//!
//! Given a resolved market and its frozen stakes, [`settle_market`] produces
//! the full payout plan without touching any store or ledger. Preview and
//! real settlement both run this exact code path, so they agree on every
//! number by construction; only the side effects differ.
//!
//! The critical invariant is conservation: for every option,
//! `sum(rewards) == floor(option_pool * (1 - fee_rate))` exactly, for any
//! stake distribution. The fee comes off the full option pool once, up
//! front; winners are then paid `floor(distributable * amount / winner_pool)`
//! in stable stake-id order, and the last winner receives whatever remains,
//! absorbing all rounding slack. No points leak, none are minted.

use rust_decimal::Decimal;

use super::error::DomainError;
use super::id::{ChoiceId, MarketId, OptionId, StakeId, UserId};
use super::market::{Market, MarketOption};
use super::odds::{distributable_pool, OddsParams};
use super::stake::Stake;

/// Payout decision for a single stake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakePayout {
    pub stake_id: StakeId,
    pub user_id: UserId,
    pub amount: i64,
    /// Computed reward; 0 for losers, recorded explicitly so "did this
    /// stake settle" stays queryable.
    pub reward: i64,
    pub won: bool,
}

/// Settlement outcome for one option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionSettlement {
    pub option_id: OptionId,
    pub winning_choice: ChoiceId,
    pub option_pool: i64,
    pub winner_pool: i64,
    pub distributable_pool: i64,
    /// Settlement odds, for display only.
    pub odds: Decimal,
    /// Payouts in stable stake-id order, winners first.
    pub payouts: Vec<StakePayout>,
}

impl OptionSettlement {
    /// Total points actually distributed to winners.
    #[must_use]
    pub fn distributed(&self) -> i64 {
        self.payouts.iter().map(|p| p.reward).sum()
    }

    /// Number of winning stakes.
    #[must_use]
    pub fn winner_count(&self) -> usize {
        self.payouts.iter().filter(|p| p.won).count()
    }
}

/// The full payout plan for a market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementPlan {
    pub market_id: MarketId,
    pub options: Vec<OptionSettlement>,
}

impl SettlementPlan {
    /// Total points distributed across all options.
    #[must_use]
    pub fn total_distributed(&self) -> i64 {
        self.options.iter().map(OptionSettlement::distributed).sum()
    }

    /// Total winning stakes across all options.
    #[must_use]
    pub fn total_winner_count(&self) -> usize {
        self.options.iter().map(OptionSettlement::winner_count).sum()
    }
}

/// Compute the payout plan for one option.
///
/// `stakes` may contain stakes from other options or cancelled ones; they
/// are filtered out here so callers can pass the market's whole stake list.
pub fn settle_option(
    option: &MarketOption,
    winning_choice: &ChoiceId,
    stakes: &[Stake],
    fee_rate: Decimal,
    params: &OddsParams,
) -> OptionSettlement {
    let mut option_bets: Vec<&Stake> = stakes
        .iter()
        .filter(|s| s.option_id == option.id && s.is_active())
        .collect();
    // Stable total order so repeated runs against the same frozen pool
    // produce byte-identical output.
    option_bets.sort_by(|a, b| a.id.cmp(&b.id));

    let winners: Vec<&Stake> = option_bets
        .iter()
        .copied()
        .filter(|s| &s.choice_id == winning_choice)
        .collect();

    let option_pool: i64 = option_bets.iter().map(|s| s.amount).sum();
    let winner_pool: i64 = winners.iter().map(|s| s.amount).sum();
    let distributable = distributable_pool(option_pool, fee_rate);
    let odds = params.settlement_odds(distributable, winner_pool);

    let mut payouts = Vec::with_capacity(option_bets.len());
    let mut remaining = distributable;
    let last = winners.len().saturating_sub(1);
    for (i, stake) in winners.iter().enumerate() {
        let reward = if i == last {
            // Last winner takes the remainder; this is what makes the
            // distribution conservation-exact under integer rounding.
            remaining
        } else {
            let share = (i128::from(distributable) * i128::from(stake.amount))
                / i128::from(winner_pool);
            share as i64
        };
        remaining -= reward;
        payouts.push(StakePayout {
            stake_id: stake.id.clone(),
            user_id: stake.user_id.clone(),
            amount: stake.amount,
            reward,
            won: true,
        });
    }
    for stake in option_bets
        .iter()
        .filter(|s| &s.choice_id != winning_choice)
    {
        payouts.push(StakePayout {
            stake_id: stake.id.clone(),
            user_id: stake.user_id.clone(),
            amount: stake.amount,
            reward: 0,
            won: false,
        });
    }

    OptionSettlement {
        option_id: option.id.clone(),
        winning_choice: winning_choice.clone(),
        option_pool,
        winner_pool,
        distributable_pool: distributable,
        odds,
        payouts,
    }
}

/// Compute the payout plan for a whole market.
///
/// # Errors
///
/// Returns `DomainError::MissingResolution` if any option lacks a declared
/// winning choice; no partial plan is produced.
pub fn settle_market(
    market: &Market,
    stakes: &[Stake],
    params: &OddsParams,
) -> Result<SettlementPlan, DomainError> {
    let mut options = Vec::with_capacity(market.options.len());
    for option in &market.options {
        let winning = option
            .winning_choice
            .as_ref()
            .ok_or_else(|| DomainError::MissingResolution {
                option: option.id.to_string(),
            })?;
        options.push(settle_option(
            option,
            winning,
            stakes,
            market.fee_rate,
            params,
        ));
    }
    Ok(SettlementPlan {
        market_id: market.id.clone(),
        options,
    })
}

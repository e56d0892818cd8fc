//! Per-user betting statistics.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::debug;

use crate::domain::{Market, MarketStatus, Stake, UserId};
use crate::error::Result;
use crate::store::{MarketStore, StakeStore};

/// Aggregated betting record for one user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserStatistics {
    /// Settled stakes the user won.
    pub wins: u32,
    /// Settled stakes the user lost.
    pub losses: u32,
    /// Active stakes on markets that can still settle. Stakes on cancelled
    /// markets count nowhere: they will never produce an outcome.
    pub pending: u32,
    /// `wins / (wins + losses)` rounded to two decimals; 0 with no settled
    /// stakes.
    pub win_rate: Decimal,
    /// Consecutive wins ending at the most recently settled market.
    pub current_streak: u32,
    /// Longest win streak ever.
    pub max_streak: u32,
}

/// Read-side statistics service.
pub struct StatsService<S> {
    store: Arc<S>,
}

impl<S> StatsService<S>
where
    S: MarketStore + StakeStore,
{
    /// Create a new stats service.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Compute the user's win/loss record and streaks.
    ///
    /// Cancelled stakes never count. Settled outcomes are ordered by market
    /// end time so streaks follow the order results actually landed.
    pub async fn user_statistics(&self, user: &UserId) -> Result<UserStatistics> {
        let stakes = self.store.stakes_for_user(user).await?;
        debug!(user = %user, stakes = stakes.len(), "computing statistics");

        // (end_at, won) per settled stake.
        let mut outcomes = Vec::new();
        let mut stats = UserStatistics::default();

        for stake in stakes.iter().filter(|s| s.is_active()) {
            let Some(market) = self.store.get_market(&stake.market_id).await? else {
                continue;
            };
            if market.settled {
                outcomes.push((market.end_at, won(&market, stake)));
            } else if market.status != MarketStatus::Cancelled {
                stats.pending += 1;
            }
        }
        outcomes.sort_by_key(|(end_at, _)| *end_at);

        let mut run = 0u32;
        for &(_, won) in &outcomes {
            if won {
                stats.wins += 1;
                run += 1;
                stats.max_streak = stats.max_streak.max(run);
            } else {
                stats.losses += 1;
                run = 0;
            }
        }
        stats.current_streak = run;

        let settled = stats.wins + stats.losses;
        if settled > 0 {
            stats.win_rate =
                (Decimal::from(stats.wins) / Decimal::from(settled)).round_dp(2);
        }
        Ok(stats)
    }
}

fn won(market: &Market, stake: &Stake) -> bool {
    market
        .option(&stake.option_id)
        .and_then(|o| o.winning_choice.as_ref())
        .is_some_and(|winner| winner == &stake.choice_id)
}

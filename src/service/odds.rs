//! Live and expected odds queries.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::domain::{ChoiceId, DomainError, ExpectedOdds, Market, MarketId, OddsParams, UserId};
use crate::error::Result;
use crate::store::MarketStore;

/// Read-side odds service.
///
/// All numbers here are advisory: the settlement odds a winner is actually
/// paid at come from the frozen pools at close, not from anything computed
/// while staking is open.
pub struct OddsService<S> {
    store: Arc<S>,
    params: OddsParams,
}

impl<S> OddsService<S>
where
    S: MarketStore,
{
    /// Create a new odds service.
    pub fn new(store: Arc<S>, params: OddsParams) -> Self {
        Self { store, params }
    }

    /// Current live odds for every choice of the market.
    pub async fn live_odds(&self, id: &MarketId) -> Result<Vec<(ChoiceId, Decimal)>> {
        let market = self.require_market(id).await?;
        Ok(live_odds_for(&market, &self.params))
    }

    /// Simulate the odds and reward a candidate stake would see.
    ///
    /// `user` is accepted for symmetry with staking but never charged;
    /// nothing is written.
    pub async fn expected_odds(
        &self,
        id: &MarketId,
        choice: &ChoiceId,
        _user: &UserId,
        amount: i64,
    ) -> Result<ExpectedOdds> {
        let market = self.require_market(id).await?;
        let option = market
            .option_for_choice(choice)
            .ok_or_else(|| DomainError::NotFound {
                entity: "choice",
                id: choice.to_string(),
            })?;
        let choice_pool = option
            .choice(choice)
            .map(|c| c.pool)
            .unwrap_or_default();
        Ok(self
            .params
            .expected_odds(option.pool(), choice_pool, market.fee_rate, amount))
    }

    async fn require_market(&self, id: &MarketId) -> Result<Market> {
        self.store.get_market(id).await?.ok_or_else(|| {
            DomainError::NotFound {
                entity: "market",
                id: id.to_string(),
            }
            .into()
        })
    }
}

/// Compute the live odds for every choice of a loaded market.
///
/// Shared with the staking service, which refreshes the cached display
/// odds after every pool mutation.
pub fn live_odds_for(market: &Market, params: &OddsParams) -> Vec<(ChoiceId, Decimal)> {
    market
        .options
        .iter()
        .flat_map(|option| {
            let option_pool = option.pool();
            option.choices.iter().map(move |choice| {
                (
                    choice.id.clone(),
                    params.live_odds(option_pool, choice.pool, market.fee_rate),
                )
            })
        })
        .collect()
}

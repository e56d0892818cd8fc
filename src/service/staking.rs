//! Stake placement and cancellation.
//!
//! The debit-then-insert ordering matters: the ledger rejects stakes the
//! user cannot cover before anything is written, and a failed insert is
//! compensated with an idempotent refund credit. The store's atomic insert
//! closes the stake-vs-close race; the guards here only produce friendlier
//! errors on the common paths.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::odds::live_odds_for;
use crate::domain::{
    ChoiceId, DomainError, Market, MarketId, MarketStatus, OddsParams, Stake, StakeId, UserId,
};
use crate::error::Result;
use crate::port::{PointLedger, UserDirectory};
use crate::store::{MarketStore, StakeStore};

/// Idempotency key for the refund credit of a stake.
fn refund_key(stake: &StakeId) -> String {
    format!("refund-{stake}")
}

/// Staking workflow service.
pub struct StakingService<S, L, D> {
    store: Arc<S>,
    ledger: Arc<L>,
    directory: Arc<D>,
    params: OddsParams,
}

impl<S, L, D> StakingService<S, L, D>
where
    S: MarketStore + StakeStore,
    L: PointLedger,
    D: UserDirectory,
{
    /// Create a new staking service.
    pub fn new(store: Arc<S>, ledger: Arc<L>, directory: Arc<D>, params: OddsParams) -> Self {
        Self {
            store,
            ledger,
            directory,
            params,
        }
    }

    /// Place a stake of `amount` points on a choice.
    ///
    /// Validates the user, the market state, and the option/choice pairing,
    /// debits the ledger, then inserts atomically. The insert re-checks the
    /// market state and the one-active-stake rule inside the store, so a
    /// concurrent close or duplicate attempt fails there; the ledger debit
    /// is refunded in that case.
    pub async fn place_stake(
        &self,
        market_id: &MarketId,
        choice_id: &ChoiceId,
        user: &UserId,
        amount: i64,
    ) -> Result<Stake> {
        if !self.directory.exists(user).await? {
            return Err(DomainError::NotFound {
                entity: "user",
                id: user.to_string(),
            }
            .into());
        }

        let market = self.require_market(market_id).await?;
        if market.status != MarketStatus::Ongoing {
            return Err(DomainError::InvalidState {
                operation: "stake",
                status: market.status,
            }
            .into());
        }
        let option = market
            .option_for_choice(choice_id)
            .ok_or_else(|| DomainError::NotFound {
                entity: "choice",
                id: choice_id.to_string(),
            })?;
        if self.store.active_stake(market_id, user).await?.is_some() {
            return Err(DomainError::DuplicateStake {
                market: market_id.to_string(),
                user: user.to_string(),
            }
            .into());
        }

        let stake = Stake::try_new(
            market_id.clone(),
            option.id.clone(),
            choice_id.clone(),
            user.clone(),
            amount,
        )?;

        self.ledger.debit(user, amount).await?;
        if let Err(e) = self.store.place_stake(&stake).await {
            warn!(stake = %stake.id, user = %user, error = %e, "stake insert failed, refunding debit");
            self.ledger
                .credit(user, amount, &refund_key(&stake.id))
                .await?;
            return Err(e);
        }

        self.refresh_display_odds(market_id).await?;
        info!(stake = %stake.id, market = %market_id, user = %user, amount, "stake placed");
        Ok(stake)
    }

    /// Cancel an active stake and refund its amount.
    ///
    /// Only the stake's owner may cancel, and only while the market is
    /// still `Ongoing`.
    pub async fn cancel_stake(&self, stake_id: &StakeId, user: &UserId) -> Result<Stake> {
        let stake = self.store.cancel_stake(stake_id, user, Utc::now()).await?;
        self.ledger
            .credit(user, stake.amount, &refund_key(stake_id))
            .await?;
        self.refresh_display_odds(&stake.market_id).await?;
        info!(stake = %stake_id, user = %user, amount = stake.amount, "stake cancelled");
        Ok(stake)
    }

    async fn refresh_display_odds(&self, market_id: &MarketId) -> Result<()> {
        let market = self.require_market(market_id).await?;
        let odds = live_odds_for(&market, &self.params);
        self.store.refresh_choice_odds(market_id, &odds).await
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MarketOption, OddsParams};
    use crate::error::{Error, LedgerError};
    use crate::store::MemoryStore;
    use crate::testkit::{RecordingLedger, StaticDirectory};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    async fn setup() -> (
        StakingService<MemoryStore, RecordingLedger, StaticDirectory>,
        Market,
        Arc<MemoryStore>,
        Arc<RecordingLedger>,
    ) {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(RecordingLedger::with_balance(10_000));
        let directory = Arc::new(StaticDirectory::with_users(["u1", "u2"]));

        let market = Market::try_new(
            "test",
            dec!(0.10),
            Utc::now() + chrono::Duration::hours(1),
            MarketStatus::Ongoing,
            vec![MarketOption::new("q", vec!["A".into(), "B".into()])],
        )
        .unwrap();
        store.insert_market(&market).await.unwrap();

        let svc = StakingService::new(
            store.clone(),
            ledger.clone(),
            directory,
            OddsParams::default(),
        );
        (svc, market, store, ledger)
    }

    #[tokio::test]
    async fn place_stake_debits_and_updates_pools_and_odds() {
        let (svc, market, store, ledger) = setup().await;
        let choice = market.options[0].choices[0].id.clone();

        let stake = svc
            .place_stake(&market.id, &choice, &UserId::new("u1"), 600)
            .await
            .unwrap();
        assert_eq!(stake.amount, 600);
        assert_eq!(ledger.debited(&UserId::new("u1")), 600);

        let loaded = store.get_market(&market.id).await.unwrap().unwrap();
        assert_eq!(loaded.options[0].choices[0].pool, 600);
        // Sole staked choice carries the whole pool; odds floor at 1.0.
        assert_eq!(loaded.options[0].choices[0].odds, Some(Decimal::ONE));
        assert_eq!(loaded.options[0].choices[1].odds, Some(Decimal::ONE));
    }

    #[tokio::test]
    async fn unknown_user_is_rejected_before_any_debit() {
        let (svc, market, _store, ledger) = setup().await;
        let choice = market.options[0].choices[0].id.clone();

        let err = svc
            .place_stake(&market.id, &choice, &UserId::new("ghost"), 100)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Domain(DomainError::NotFound { .. })));
        assert_eq!(ledger.debited(&UserId::new("ghost")), 0);
    }

    #[tokio::test]
    async fn non_positive_amount_is_rejected() {
        let (svc, market, _store, _ledger) = setup().await;
        let choice = market.options[0].choices[0].id.clone();

        let err = svc
            .place_stake(&market.id, &choice, &UserId::new("u1"), 0)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Domain(DomainError::NonPositiveStake { .. })
        ));
    }

    #[tokio::test]
    async fn second_active_stake_is_rejected() {
        let (svc, market, _store, ledger) = setup().await;
        let a = market.options[0].choices[0].id.clone();
        let b = market.options[0].choices[1].id.clone();
        let user = UserId::new("u1");

        svc.place_stake(&market.id, &a, &user, 100).await.unwrap();
        let err = svc.place_stake(&market.id, &b, &user, 50).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Domain(DomainError::DuplicateStake { .. })
        ));
        // Only the first debit went through.
        assert_eq!(ledger.debited(&user), 100);
    }

    #[tokio::test]
    async fn insufficient_balance_propagates_from_ledger() {
        let (svc, market, store, _ledger) = setup().await;
        let choice = market.options[0].choices[0].id.clone();

        let err = svc
            .place_stake(&market.id, &choice, &UserId::new("u1"), 999_999)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Ledger(LedgerError::InsufficientBalance { .. })
        ));

        let loaded = store.get_market(&market.id).await.unwrap().unwrap();
        assert_eq!(loaded.options[0].choices[0].pool, 0);
    }

    #[tokio::test]
    async fn cancel_refunds_and_restores_pool() {
        let (svc, market, store, ledger) = setup().await;
        let choice = market.options[0].choices[0].id.clone();
        let user = UserId::new("u1");

        let stake = svc.place_stake(&market.id, &choice, &user, 300).await.unwrap();
        let cancelled = svc.cancel_stake(&stake.id, &user).await.unwrap();
        assert!(cancelled.cancelled);
        assert_eq!(ledger.credited(&user), 300);

        let loaded = store.get_market(&market.id).await.unwrap().unwrap();
        assert_eq!(loaded.options[0].choices[0].pool, 0);

        // The position is free again afterwards.
        svc.place_stake(&market.id, &choice, &user, 100).await.unwrap();
    }

    #[tokio::test]
    async fn cancel_by_non_owner_is_rejected() {
        let (svc, market, _store, ledger) = setup().await;
        let choice = market.options[0].choices[0].id.clone();

        let stake = svc
            .place_stake(&market.id, &choice, &UserId::new("u1"), 300)
            .await
            .unwrap();
        let err = svc
            .cancel_stake(&stake.id, &UserId::new("u2"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Domain(DomainError::StakeNotOwned { .. })
        ));
        assert_eq!(ledger.credited(&UserId::new("u2")), 0);
    }

    #[tokio::test]
    async fn stake_rejected_when_market_not_ongoing() {
        let (svc, market, store, ledger) = setup().await;
        store
            .transition_status(
                &market.id,
                MarketStatus::Ongoing,
                MarketStatus::Finished,
                Utc::now(),
            )
            .await
            .unwrap();

        let choice = market.options[0].choices[0].id.clone();
        let err = svc
            .place_stake(&market.id, &choice, &UserId::new("u1"), 100)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Domain(DomainError::InvalidState { .. })
        ));
        assert_eq!(ledger.debited(&UserId::new("u1")), 0);
    }
}

//! Settlement engine.
//!
//! The serialization point is the conditional `Resolved -> Rewarded`
//! transition: it is claimed before any ledger call, so exactly one of any
//! number of concurrent triggers performs payouts. Credits are keyed by
//! stake id, which makes a retried run after a ledger failure safe; the
//! failed run reverts the claim and leaves the market `Resolved`.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};

use crate::domain::{
    settle_market, DomainError, Market, MarketId, MarketStatus, OddsParams, SettlementPlan,
    StatusRecord,
};
use crate::error::Result;
use crate::port::PointLedger;
use crate::store::{HistoryStore, MarketStore, StakeStore};

/// Settlement engine for resolved markets.
pub struct SettlementService<S, L> {
    store: Arc<S>,
    ledger: Arc<L>,
    params: OddsParams,
}

impl<S, L> SettlementService<S, L>
where
    S: MarketStore + StakeStore + HistoryStore,
    L: PointLedger,
{
    /// Create a new settlement service.
    pub fn new(store: Arc<S>, ledger: Arc<L>, params: OddsParams) -> Self {
        Self {
            store,
            ledger,
            params,
        }
    }

    /// Compute the payout plan without performing any side effect.
    ///
    /// Runs the exact code path [`settle`](Self::settle) runs, so against
    /// the same frozen pools the numbers are identical.
    pub async fn preview(&self, id: &MarketId) -> Result<SettlementPlan> {
        let market = self.resolved_market(id).await?;
        let stakes = self.store.stakes_for_market(id).await?;
        Ok(settle_market(&market, &stakes, &self.params)?)
    }

    /// Settle a resolved market: compute the plan, claim the market, pay
    /// winners, record rewards and settlement odds, append history.
    ///
    /// Losing the claim to a concurrent run surfaces as `AlreadySettled`,
    /// which the scheduler treats as a no-op. A ledger failure mid-payout
    /// reverts the market to `Resolved` and propagates; retrying re-sends
    /// the same idempotent credit keys.
    pub async fn settle(&self, id: &MarketId) -> Result<SettlementPlan> {
        let market = self.resolved_market(id).await?;
        let stakes = self.store.stakes_for_market(id).await?;
        let plan = settle_market(&market, &stakes, &self.params)?;

        let now = Utc::now();
        let claimed = self
            .store
            .transition_status(id, MarketStatus::Resolved, MarketStatus::Rewarded, now)
            .await?;
        if !claimed {
            return Err(DomainError::AlreadySettled {
                market: id.to_string(),
            }
            .into());
        }

        if let Err(e) = self.apply(&plan).await {
            error!(market = %id, error = %e, "payout failed, reverting settlement claim");
            self.store
                .transition_status(id, MarketStatus::Rewarded, MarketStatus::Resolved, now)
                .await?;
            return Err(e);
        }

        self.store
            .append_status(&StatusRecord {
                market_id: id.clone(),
                status: MarketStatus::Rewarded,
                recorded_at: now,
            })
            .await?;
        info!(
            market = %id,
            distributed = plan.total_distributed(),
            winners = plan.total_winner_count(),
            "market settled"
        );
        Ok(plan)
    }

    async fn apply(&self, plan: &SettlementPlan) -> Result<()> {
        let now = Utc::now();
        for option in &plan.options {
            for payout in &option.payouts {
                if payout.reward > 0 {
                    self.ledger
                        .credit(&payout.user_id, payout.reward, payout.stake_id.as_str())
                        .await?;
                }
                self.store
                    .set_reward(&payout.stake_id, payout.reward, now)
                    .await?;
            }
            self.store
                .set_option_odds(&plan.market_id, &option.option_id, option.odds)
                .await?;
        }
        Ok(())
    }

    async fn resolved_market(&self, id: &MarketId) -> Result<Market> {
        let market = self
            .store
            .get_market(id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "market",
                id: id.to_string(),
            })?;
        if market.settled {
            return Err(DomainError::AlreadySettled {
                market: id.to_string(),
            }
            .into());
        }
        if market.status != MarketStatus::Resolved {
            return Err(DomainError::InvalidState {
                operation: "settle",
                status: market.status,
            }
            .into());
        }
        Ok(market)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MarketOption, Stake, UserId};
    use crate::error::{Error, LedgerError};
    use crate::store::MemoryStore;
    use crate::testkit::RecordingLedger;
    use rust_decimal_macros::dec;

    struct Fixture {
        svc: SettlementService<MemoryStore, RecordingLedger>,
        store: Arc<MemoryStore>,
        ledger: Arc<RecordingLedger>,
        market: Market,
    }

    /// Resolved market with a worked example: 600 on the winner (400 + 200),
    /// 400 on the loser, 10% fee.
    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(RecordingLedger::with_balance(1_000_000));

        let market = Market::try_new(
            "test",
            dec!(0.10),
            Utc::now(),
            MarketStatus::Ongoing,
            vec![MarketOption::new("q", vec!["A".into(), "B".into()])],
        )
        .unwrap();
        store.insert_market(&market).await.unwrap();

        for (user, choice_idx, amount) in [("u1", 0, 400), ("u2", 0, 200), ("u3", 1, 400)] {
            let stake = Stake::try_new(
                market.id.clone(),
                market.options[0].id.clone(),
                market.options[0].choices[choice_idx].id.clone(),
                UserId::new(user),
                amount,
            )
            .unwrap();
            store.place_stake(&stake).await.unwrap();
        }

        for (from, to) in [
            (MarketStatus::Ongoing, MarketStatus::Finished),
            (MarketStatus::Finished, MarketStatus::Resolved),
        ] {
            store
                .transition_status(&market.id, from, to, Utc::now())
                .await
                .unwrap();
        }
        store
            .set_winning_choice(
                &market.id,
                &market.options[0].id,
                &market.options[0].choices[0].id,
            )
            .await
            .unwrap();

        let svc = SettlementService::new(store.clone(), ledger.clone(), OddsParams::default());
        Fixture {
            svc,
            store,
            ledger,
            market,
        }
    }

    #[tokio::test]
    async fn settle_pays_winners_and_finalizes_market() {
        let f = fixture().await;
        let plan = f.svc.settle(&f.market.id).await.unwrap();

        assert_eq!(plan.options[0].distributable_pool, 900);
        assert_eq!(plan.total_distributed(), 900);
        assert_eq!(f.ledger.credited(&UserId::new("u1")), 600);
        assert_eq!(f.ledger.credited(&UserId::new("u2")), 300);
        assert_eq!(f.ledger.credited(&UserId::new("u3")), 0);

        let market = f.store.get_market(&f.market.id).await.unwrap().unwrap();
        assert_eq!(market.status, MarketStatus::Rewarded);
        assert!(market.settled);
        assert_eq!(market.options[0].odds, Some(dec!(1.50)));

        let stakes = f.store.stakes_for_market(&f.market.id).await.unwrap();
        assert!(stakes.iter().all(Stake::is_settled));
        // Losers carry an explicit zero reward.
        assert!(stakes
            .iter()
            .any(|s| s.user_id == UserId::new("u3") && s.reward == Some(0)));
    }

    #[tokio::test]
    async fn preview_matches_settlement_exactly() {
        let f = fixture().await;
        let preview = f.svc.preview(&f.market.id).await.unwrap();
        let real = f.svc.settle(&f.market.id).await.unwrap();
        assert_eq!(preview, real);
        // Preview alone performed no credits.
        assert_eq!(
            f.ledger.total_credited(),
            real.total_distributed()
        );
    }

    #[tokio::test]
    async fn second_settlement_is_already_settled() {
        let f = fixture().await;
        f.svc.settle(&f.market.id).await.unwrap();

        let err = f.svc.settle(&f.market.id).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Domain(DomainError::AlreadySettled { .. })
        ));
        assert!(err.is_benign_race());
        // No double payment.
        assert_eq!(f.ledger.credited(&UserId::new("u1")), 600);
    }

    #[tokio::test]
    async fn settle_rejected_before_resolution() {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(RecordingLedger::with_balance(0));
        let market = Market::try_new(
            "test",
            dec!(0.10),
            Utc::now(),
            MarketStatus::Ongoing,
            vec![MarketOption::new("q", vec!["A".into(), "B".into()])],
        )
        .unwrap();
        store.insert_market(&market).await.unwrap();

        let svc = SettlementService::new(store, ledger, OddsParams::default());
        let err = svc.settle(&market.id).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Domain(DomainError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn ledger_failure_reverts_to_resolved_and_retry_succeeds() {
        let f = fixture().await;
        f.ledger.fail_next_credits(1);

        let err = f.svc.settle(&f.market.id).await.unwrap_err();
        assert!(matches!(err, Error::Ledger(LedgerError::Unavailable(_))));

        let market = f.store.get_market(&f.market.id).await.unwrap().unwrap();
        assert_eq!(market.status, MarketStatus::Resolved);
        assert!(!market.settled);

        // Retry completes; idempotency keys prevent double-credits even for
        // users whose payout succeeded in the failed run.
        let plan = f.svc.settle(&f.market.id).await.unwrap();
        assert_eq!(plan.total_distributed(), 900);
        assert_eq!(f.ledger.credited(&UserId::new("u1")), 600);
        assert_eq!(f.ledger.credited(&UserId::new("u2")), 300);
    }

    #[tokio::test]
    async fn no_winner_settlement_retains_pool() {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(RecordingLedger::with_balance(1_000_000));
        let market = Market::try_new(
            "test",
            dec!(0.10),
            Utc::now(),
            MarketStatus::Ongoing,
            vec![MarketOption::new("q", vec!["A".into(), "B".into()])],
        )
        .unwrap();
        store.insert_market(&market).await.unwrap();

        // Everyone staked on B; A wins.
        let stake = Stake::try_new(
            market.id.clone(),
            market.options[0].id.clone(),
            market.options[0].choices[1].id.clone(),
            UserId::new("u1"),
            1000,
        )
        .unwrap();
        store.place_stake(&stake).await.unwrap();

        for (from, to) in [
            (MarketStatus::Ongoing, MarketStatus::Finished),
            (MarketStatus::Finished, MarketStatus::Resolved),
        ] {
            store
                .transition_status(&market.id, from, to, Utc::now())
                .await
                .unwrap();
        }
        store
            .set_winning_choice(
                &market.id,
                &market.options[0].id,
                &market.options[0].choices[0].id,
            )
            .await
            .unwrap();

        let svc = SettlementService::new(store.clone(), ledger.clone(), OddsParams::default());
        let plan = svc.settle(&market.id).await.unwrap();
        assert_eq!(plan.total_distributed(), 0);
        assert_eq!(ledger.total_credited(), 0);

        let loaded = store.get_market(&market.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, MarketStatus::Rewarded);
    }
}

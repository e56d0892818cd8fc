//! Periodic maintenance sweeps.
//!
//! Two jobs run on the same tick: close `Ongoing` markets whose end time
//! has passed, and settle markets stuck in `Resolved` (winners declared but
//! payout not yet applied, usually after a crash or a ledger outage).
//! Races with manual triggers surface as benign `AlreadySettled` or
//! `InvalidState` errors and are counted as skips, not failures.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::settlement::SettlementService;
use crate::domain::{MarketStatus, OddsParams, StatusRecord};
use crate::error::Result;
use crate::port::PointLedger;
use crate::store::{HistoryStore, MarketStore, StakeStore};

/// What one sweep pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepReport {
    /// Markets moved from `Ongoing` to `Finished`.
    pub closed: usize,
    /// Markets settled and paid out.
    pub settled: usize,
    /// Benign races lost to a concurrent trigger.
    pub skipped: usize,
    /// Real failures, logged and left for the next pass.
    pub failed: usize,
}

/// Background sweeper over the market store.
pub struct Sweeper<S, L> {
    store: Arc<S>,
    settlement: SettlementService<S, L>,
}

impl<S, L> Sweeper<S, L>
where
    S: MarketStore + StakeStore + HistoryStore,
    L: PointLedger,
{
    /// Create a new sweeper.
    pub fn new(store: Arc<S>, ledger: Arc<L>, params: OddsParams) -> Self {
        let settlement = SettlementService::new(store.clone(), ledger, params);
        Self { store, settlement }
    }

    /// Run one sweep pass against the given clock reading.
    ///
    /// Taking `now` as a parameter keeps the pass deterministic under test;
    /// the daemon loop passes `Utc::now()`.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let mut report = SweepReport::default();

        for market in self.store.list_ongoing_past_end(now).await? {
            if self
                .store
                .transition_status(&market.id, MarketStatus::Ongoing, MarketStatus::Finished, now)
                .await?
            {
                self.store
                    .append_status(&StatusRecord {
                        market_id: market.id.clone(),
                        status: MarketStatus::Finished,
                        recorded_at: now,
                    })
                    .await?;
                info!(market = %market.id, "auto-closed past end time");
                report.closed += 1;
            } else {
                debug!(market = %market.id, "lost close race, skipping");
                report.skipped += 1;
            }
        }

        for market in self.store.list_by_status(MarketStatus::Resolved).await? {
            match self.settlement.settle(&market.id).await {
                Ok(plan) => {
                    info!(
                        market = %market.id,
                        distributed = plan.total_distributed(),
                        "auto-settled"
                    );
                    report.settled += 1;
                }
                Err(e) if e.is_benign_race() => {
                    debug!(market = %market.id, "lost settlement race, skipping");
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!(market = %market.id, error = %e, "sweep settlement failed");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Run the sweep loop until `shutdown` resolves.
    pub async fn run(&self, interval: Duration, shutdown: impl std::future::Future<Output = ()>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.sweep_once(Utc::now()).await {
                        Ok(report) => {
                            debug!(?report, "sweep pass complete");
                        }
                        Err(e) => warn!(error = %e, "sweep pass failed"),
                    }
                }
                () = &mut shutdown => {
                    info!("sweeper shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Market, MarketOption, Stake, UserId};
    use crate::store::MemoryStore;
    use crate::testkit::RecordingLedger;
    use chrono::Duration as ChronoDuration;
    use rust_decimal_macros::dec;

    fn sweeper(
        store: Arc<MemoryStore>,
        ledger: Arc<RecordingLedger>,
    ) -> Sweeper<MemoryStore, RecordingLedger> {
        Sweeper::new(store, ledger, OddsParams::default())
    }

    async fn ongoing_market(store: &MemoryStore, ends_in_hours: i64) -> Market {
        let market = Market::try_new(
            "m",
            dec!(0.10),
            Utc::now() + ChronoDuration::hours(ends_in_hours),
            MarketStatus::Ongoing,
            vec![MarketOption::new("q", vec!["A".into(), "B".into()])],
        )
        .unwrap();
        store.insert_market(&market).await.unwrap();
        market
    }

    #[tokio::test]
    async fn closes_expired_markets_only() {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(RecordingLedger::with_balance(0));
        let expired = ongoing_market(&store, -1).await;
        let open = ongoing_market(&store, 1).await;

        let report = sweeper(store.clone(), ledger)
            .sweep_once(Utc::now())
            .await
            .unwrap();
        assert_eq!(report.closed, 1);
        assert_eq!(report.settled, 0);

        let expired = store.get_market(&expired.id).await.unwrap().unwrap();
        assert_eq!(expired.status, MarketStatus::Finished);
        let open = store.get_market(&open.id).await.unwrap().unwrap();
        assert_eq!(open.status, MarketStatus::Ongoing);

        let history = store.history_for_market(&expired.id).await.unwrap();
        assert_eq!(history.last().unwrap().status, MarketStatus::Finished);
    }

    #[tokio::test]
    async fn settles_stuck_resolved_markets() {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(RecordingLedger::with_balance(1_000_000));
        let market = ongoing_market(&store, -1).await;

        let stake = Stake::try_new(
            market.id.clone(),
            market.options[0].id.clone(),
            market.options[0].choices[0].id.clone(),
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

        let report = sweeper(store.clone(), ledger.clone())
            .sweep_once(Utc::now())
            .await
            .unwrap();
        assert_eq!(report.settled, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(ledger.credited(&UserId::new("u1")), 900);

        let market = store.get_market(&market.id).await.unwrap().unwrap();
        assert_eq!(market.status, MarketStatus::Rewarded);
    }

    #[tokio::test]
    async fn sweep_is_idempotent_across_passes() {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(RecordingLedger::with_balance(0));
        ongoing_market(&store, -1).await;

        let sweeper = sweeper(store, ledger);
        let first = sweeper.sweep_once(Utc::now()).await.unwrap();
        assert_eq!(first.closed, 1);

        let second = sweeper.sweep_once(Utc::now()).await.unwrap();
        assert_eq!(second, SweepReport::default());
    }

    #[tokio::test]
    async fn ledger_outage_counts_as_failure_and_leaves_market_resolved() {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(RecordingLedger::with_balance(1_000_000));
        let market = ongoing_market(&store, 1).await;

        let stake = Stake::try_new(
            market.id.clone(),
            market.options[0].id.clone(),
            market.options[0].choices[0].id.clone(),
            UserId::new("u1"),
            500,
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

        ledger.fail_next_credits(1);
        let sweeper = sweeper(store.clone(), ledger.clone());
        let report = sweeper.sweep_once(Utc::now()).await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.settled, 0);

        let loaded = store.get_market(&market.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, MarketStatus::Resolved);

        // Next pass retries and succeeds.
        let report = sweeper.sweep_once(Utc::now()).await.unwrap();
        assert_eq!(report.settled, 1);
        assert_eq!(ledger.credited(&UserId::new("u1")), 450);
    }
}

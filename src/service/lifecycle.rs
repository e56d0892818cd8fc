//! Market lifecycle orchestration.
//!
//! Owns every legal status transition except the settlement claim, which
//! belongs to the settlement engine. Each transition appends a history
//! record; the conditional store updates make concurrent triggers safe.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;

use crate::domain::{
    settle_market, ChoiceId, DomainError, Market, MarketId, MarketOption, MarketStatus,
    OddsParams, OptionId, SettlementPlan, StatusRecord,
};
use crate::error::Result;
use crate::store::{HistoryStore, MarketStore, StakeStore};

/// Default house fee applied when a creation request does not specify one.
pub const DEFAULT_FEE_RATE: Decimal = dec!(0.10);

/// Creation request for one option.
#[derive(Debug, Clone)]
pub struct NewOption {
    pub title: String,
    pub choice_labels: Vec<String>,
}

/// Creation request for a market.
#[derive(Debug, Clone)]
pub struct NewMarket {
    pub title: String,
    /// Defaults to [`DEFAULT_FEE_RATE`] when absent.
    pub fee_rate: Option<Decimal>,
    pub end_at: DateTime<Utc>,
    /// `Reviewing` for the moderated flow, `Ongoing` for direct listing.
    pub initial_status: MarketStatus,
    pub options: Vec<NewOption>,
}

/// Lifecycle controller for markets.
pub struct LifecycleService<S> {
    store: Arc<S>,
    params: OddsParams,
}

impl<S> LifecycleService<S>
where
    S: MarketStore + StakeStore + HistoryStore,
{
    /// Create a new lifecycle service.
    pub fn new(store: Arc<S>, params: OddsParams) -> Self {
        Self { store, params }
    }

    /// Create and persist a market aggregate, recording its initial status.
    pub async fn create_market(&self, request: NewMarket) -> Result<Market> {
        let options = request
            .options
            .into_iter()
            .map(|o| MarketOption::new(o.title, o.choice_labels))
            .collect();
        let market = Market::try_new(
            request.title,
            request.fee_rate.unwrap_or(DEFAULT_FEE_RATE),
            request.end_at,
            request.initial_status,
            options,
        )?;

        self.store.insert_market(&market).await?;
        self.store
            .append_status(&StatusRecord::now(market.id.clone(), market.status))
            .await?;
        info!(market = %market.id, status = %market.status, "market created");
        Ok(market)
    }

    /// Open a reviewed market for staking.
    pub async fn open(&self, id: &MarketId) -> Result<()> {
        self.transition(id, MarketStatus::Reviewing, MarketStatus::Ongoing, "open")
            .await
    }

    /// Close staking on a market.
    pub async fn close(&self, id: &MarketId) -> Result<()> {
        self.transition(id, MarketStatus::Ongoing, MarketStatus::Finished, "close")
            .await
    }

    /// Cancel a market before it finishes, recording the reason.
    ///
    /// Legal only from `Reviewing` or `Ongoing`; stake refunds are the
    /// caller's concern since cancellation policy differs per flow.
    pub async fn cancel(&self, id: &MarketId, reason: &str) -> Result<()> {
        let now = Utc::now();
        if !self.store.cancel_market(id, reason, now).await? {
            let market = self.require_market(id).await?;
            return Err(DomainError::InvalidState {
                operation: "cancel",
                status: market.status,
            }
            .into());
        }
        self.store
            .append_status(&StatusRecord {
                market_id: id.clone(),
                status: MarketStatus::Cancelled,
                recorded_at: now,
            })
            .await?;
        info!(market = %id, reason, "market cancelled");
        Ok(())
    }

    /// Declare the winning choice of every option and move the market to
    /// `Resolved`, returning a payout preview computed from the same pure
    /// settlement path the real run will use.
    ///
    /// The winner list must cover each option exactly once, with a choice
    /// that actually belongs to it; partial declarations are rejected
    /// before anything is written.
    pub async fn declare_winners(
        &self,
        id: &MarketId,
        winners: &[(OptionId, ChoiceId)],
    ) -> Result<SettlementPlan> {
        let mut market = self.require_market(id).await?;

        // The declaration must cover the market's option set exactly:
        // every option once, no duplicates, no foreign choices.
        let mut declared = HashSet::with_capacity(winners.len());
        for (option_id, choice_id) in winners {
            let option = market.option(option_id).ok_or_else(|| DomainError::NotFound {
                entity: "option",
                id: option_id.to_string(),
            })?;
            if !option.owns_choice(choice_id) {
                return Err(DomainError::InvalidReference {
                    choice: choice_id.to_string(),
                    option: option_id.to_string(),
                }
                .into());
            }
            if !declared.insert(option_id.clone()) {
                return Err(DomainError::DuplicateResolution {
                    option: option_id.to_string(),
                }
                .into());
            }
        }
        if let Some(missing) = market.options.iter().find(|o| !declared.contains(&o.id)) {
            return Err(DomainError::MissingResolution {
                option: missing.id.to_string(),
            }
            .into());
        }

        let now = Utc::now();
        if !self
            .store
            .transition_status(id, MarketStatus::Finished, MarketStatus::Resolved, now)
            .await?
        {
            return Err(DomainError::InvalidState {
                operation: "declare winners",
                status: market.status,
            }
            .into());
        }

        for (option_id, choice_id) in winners {
            self.store.set_winning_choice(id, option_id, choice_id).await?;
        }
        self.store
            .append_status(&StatusRecord {
                market_id: id.clone(),
                status: MarketStatus::Resolved,
                recorded_at: now,
            })
            .await?;
        info!(market = %id, "winners declared");

        // Preview from the state just written, not a re-read.
        for option in &mut market.options {
            option.winning_choice = winners
                .iter()
                .find(|(oid, _)| oid == &option.id)
                .map(|(_, cid)| cid.clone());
        }
        let stakes = self.store.stakes_for_market(id).await?;
        Ok(settle_market(&market, &stakes, &self.params)?)
    }

    async fn transition(
        &self,
        id: &MarketId,
        from: MarketStatus,
        to: MarketStatus,
        operation: &'static str,
    ) -> Result<()> {
        let now = Utc::now();
        if !self.store.transition_status(id, from, to, now).await? {
            let market = self.require_market(id).await?;
            return Err(DomainError::InvalidState {
                operation,
                status: market.status,
            }
            .into());
        }
        self.store
            .append_status(&StatusRecord {
                market_id: id.clone(),
                status: to,
                recorded_at: now,
            })
            .await?;
        info!(market = %id, from = %from, to = %to, "market transitioned");
        Ok(())
    }

    async fn require_market(&self, id: &MarketId) -> Result<Market> {
        self.store
            .get_market(id)
            .await?
            .ok_or_else(|| {
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
    use crate::error::Error;
    use crate::store::MemoryStore;

    fn service() -> LifecycleService<MemoryStore> {
        LifecycleService::new(Arc::new(MemoryStore::new()), OddsParams::default())
    }

    fn request(initial: MarketStatus) -> NewMarket {
        NewMarket {
            title: "Cup final".into(),
            fee_rate: None,
            end_at: Utc::now() + chrono::Duration::hours(1),
            initial_status: initial,
            options: vec![NewOption {
                title: "Who wins?".into(),
                choice_labels: vec!["Home".into(), "Away".into()],
            }],
        }
    }

    #[tokio::test]
    async fn create_market_applies_default_fee_and_records_history() {
        let svc = service();
        let market = svc.create_market(request(MarketStatus::Reviewing)).await.unwrap();
        assert_eq!(market.fee_rate, DEFAULT_FEE_RATE);
        assert_eq!(market.status, MarketStatus::Reviewing);

        let history = svc.store.history_for_market(&market.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, MarketStatus::Reviewing);
    }

    #[tokio::test]
    async fn full_forward_path_appends_history_per_step() {
        let svc = service();
        let market = svc.create_market(request(MarketStatus::Reviewing)).await.unwrap();

        svc.open(&market.id).await.unwrap();
        svc.close(&market.id).await.unwrap();
        let winner = (
            market.options[0].id.clone(),
            market.options[0].choices[0].id.clone(),
        );
        svc.declare_winners(&market.id, &[winner]).await.unwrap();

        let statuses: Vec<MarketStatus> = svc
            .store
            .history_for_market(&market.id)
            .await
            .unwrap()
            .iter()
            .map(|r| r.status)
            .collect();
        assert_eq!(
            statuses,
            vec![
                MarketStatus::Reviewing,
                MarketStatus::Ongoing,
                MarketStatus::Finished,
                MarketStatus::Resolved
            ]
        );
    }

    #[tokio::test]
    async fn close_rejected_unless_ongoing() {
        let svc = service();
        let market = svc.create_market(request(MarketStatus::Reviewing)).await.unwrap();
        let err = svc.close(&market.id).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Domain(DomainError::InvalidState {
                status: MarketStatus::Reviewing,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn cancel_rejected_after_finish() {
        let svc = service();
        let market = svc.create_market(request(MarketStatus::Ongoing)).await.unwrap();
        svc.close(&market.id).await.unwrap();

        let err = svc.cancel(&market.id, "too late").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Domain(DomainError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn declare_winners_rejects_foreign_choice() {
        let svc = service();
        let market = svc.create_market(request(MarketStatus::Ongoing)).await.unwrap();
        svc.close(&market.id).await.unwrap();

        let bogus = (market.options[0].id.clone(), ChoiceId::new());
        let err = svc.declare_winners(&market.id, &[bogus]).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Domain(DomainError::InvalidReference { .. })
        ));

        // Nothing was transitioned by the failed declaration.
        let loaded = svc.store.get_market(&market.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, MarketStatus::Finished);
    }

    #[tokio::test]
    async fn declare_winners_requires_every_option() {
        let svc = service();
        let mut req = request(MarketStatus::Ongoing);
        req.options.push(NewOption {
            title: "Total goals?".into(),
            choice_labels: vec!["Under".into(), "Over".into()],
        });
        let market = svc.create_market(req).await.unwrap();
        svc.close(&market.id).await.unwrap();

        let partial = vec![(
            market.options[0].id.clone(),
            market.options[0].choices[0].id.clone(),
        )];
        let err = svc.declare_winners(&market.id, &partial).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Domain(DomainError::MissingResolution { .. })
        ));
    }

    #[tokio::test]
    async fn declare_winners_rejects_duplicate_option_before_any_write() {
        let svc = service();
        let mut req = request(MarketStatus::Ongoing);
        req.options.push(NewOption {
            title: "Total goals?".into(),
            choice_labels: vec!["Under".into(), "Over".into()],
        });
        let market = svc.create_market(req).await.unwrap();
        svc.close(&market.id).await.unwrap();

        // Both entries name the first option; the list length still matches
        // the option count.
        let duplicated = vec![
            (
                market.options[0].id.clone(),
                market.options[0].choices[0].id.clone(),
            ),
            (
                market.options[0].id.clone(),
                market.options[0].choices[1].id.clone(),
            ),
        ];
        let err = svc
            .declare_winners(&market.id, &duplicated)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Domain(DomainError::DuplicateResolution { .. })
        ));

        // The market must remain Finished with no winners recorded, so a
        // corrected declaration can still go through.
        let loaded = svc.store.get_market(&market.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, MarketStatus::Finished);
        assert!(loaded.options.iter().all(|o| o.winning_choice.is_none()));

        let corrected = vec![
            (
                market.options[0].id.clone(),
                market.options[0].choices[0].id.clone(),
            ),
            (
                market.options[1].id.clone(),
                market.options[1].choices[0].id.clone(),
            ),
        ];
        svc.declare_winners(&market.id, &corrected).await.unwrap();
        let loaded = svc.store.get_market(&market.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, MarketStatus::Resolved);
    }

    #[tokio::test]
    async fn declare_winners_only_from_finished() {
        let svc = service();
        let market = svc.create_market(request(MarketStatus::Ongoing)).await.unwrap();

        let winner = vec![(
            market.options[0].id.clone(),
            market.options[0].choices[0].id.clone(),
        )];
        let err = svc.declare_winners(&market.id, &winner).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Domain(DomainError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn not_found_for_unknown_market() {
        let svc = service();
        let err = svc.open(&MarketId::new()).await.unwrap_err();
        assert!(matches!(err, Error::Domain(DomainError::NotFound { .. })));
    }
}

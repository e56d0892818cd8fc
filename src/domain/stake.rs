//! A user's wager on one choice.

use chrono::{DateTime, Utc};

use super::error::DomainError;
use super::id::{ChoiceId, MarketId, OptionId, StakeId, UserId};

/// One user's bet.
///
/// Created when a user stakes; mutated only to set `cancelled` or `reward`;
/// never physically deleted once settlement has touched it. At most one
/// non-cancelled stake per (user, market) may exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stake {
    pub id: StakeId,
    pub market_id: MarketId,
    pub option_id: OptionId,
    pub choice_id: ChoiceId,
    pub user_id: UserId,
    /// Positive integer points.
    pub amount: i64,
    pub cancelled: bool,
    /// Null until settled, then the computed payout (0 for losers).
    pub reward: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Stake {
    /// Create a new stake with a validated amount.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NonPositiveStake` if `amount <= 0`.
    pub fn try_new(
        market_id: MarketId,
        option_id: OptionId,
        choice_id: ChoiceId,
        user_id: UserId,
        amount: i64,
    ) -> Result<Self, DomainError> {
        if amount <= 0 {
            return Err(DomainError::NonPositiveStake { amount });
        }
        let now = Utc::now();
        Ok(Self {
            id: StakeId::new(),
            market_id,
            option_id,
            choice_id,
            user_id,
            amount,
            cancelled: false,
            reward: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Whether this stake still participates in pools and settlement.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.cancelled
    }

    /// Whether settlement has recorded a payout (possibly 0) on this stake.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.reward.is_some()
    }
}

//! Market aggregate: the staking event with its options and choices.
//!
//! A [`Market`] owns a list of [`MarketOption`]s (independent sub-questions),
//! each of which owns mutually exclusive [`Choice`]s. Pools are denormalized
//! onto choices and kept in sync by the store, which is the only component
//! allowed to mutate them after creation.
//!
//! The lifecycle state machine lives here as [`MarketStatus`]; which
//! operation is legal in which state is enforced by the lifecycle service
//! and by the store's conditional status updates.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::error::DomainError;
use super::id::{ChoiceId, MarketId, OptionId};

/// Market lifecycle states.
///
/// Forward path is `Reviewing → Ongoing → Finished → Resolved → Rewarded`,
/// with `Cancelled` as an orthogonal terminal state reachable from
/// `Reviewing` or `Ongoing` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarketStatus {
    /// Created, not yet visible for staking.
    Reviewing,
    /// Staking allowed.
    Ongoing,
    /// Staking closed, no winner declared yet.
    Finished,
    /// Winners declared, payouts not yet applied.
    Resolved,
    /// Terminal success state; payouts applied exactly once.
    Rewarded,
    /// Terminal failure state; no payouts.
    Cancelled,
}

impl MarketStatus {
    /// Whether a transition from `self` to `to` is legal.
    #[must_use]
    pub fn can_transition(self, to: MarketStatus) -> bool {
        use MarketStatus::*;
        matches!(
            (self, to),
            (Reviewing, Ongoing)
                | (Ongoing, Finished)
                | (Finished, Resolved)
                | (Resolved, Rewarded)
                | (Reviewing, Cancelled)
                | (Ongoing, Cancelled)
        )
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, MarketStatus::Rewarded | MarketStatus::Cancelled)
    }

    /// Stable lowercase name used for persistence and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MarketStatus::Reviewing => "reviewing",
            MarketStatus::Ongoing => "ongoing",
            MarketStatus::Finished => "finished",
            MarketStatus::Resolved => "resolved",
            MarketStatus::Rewarded => "rewarded",
            MarketStatus::Cancelled => "cancelled",
        }
    }

    /// Parse the persisted name back into a status.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reviewing" => Some(MarketStatus::Reviewing),
            "ongoing" => Some(MarketStatus::Ongoing),
            "finished" => Some(MarketStatus::Finished),
            "resolved" => Some(MarketStatus::Resolved),
            "rewarded" => Some(MarketStatus::Rewarded),
            "cancelled" => Some(MarketStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One selectable outcome within an option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub id: ChoiceId,
    pub label: String,
    /// Sum of all non-cancelled stake amounts on this choice.
    pub pool: i64,
    pub participants: i64,
    /// Cached display odds; advisory, recomputed after every stake mutation.
    pub odds: Option<Decimal>,
}

impl Choice {
    /// Create an empty choice with the given label.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: ChoiceId::new(),
            label: label.into(),
            pool: 0,
            participants: 0,
            odds: None,
        }
    }
}

/// One independent sub-question inside a market.
///
/// Choices within an option are mutually exclusive and collectively
/// exhaustive for settlement: the declared winner is always exactly one
/// choice per option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketOption {
    pub id: OptionId,
    pub title: String,
    pub choices: Vec<Choice>,
    /// Null until the market is resolved.
    pub winning_choice: Option<ChoiceId>,
    /// Settlement odds, persisted post hoc for display only.
    pub odds: Option<Decimal>,
}

impl MarketOption {
    /// Create an option with fresh, empty choices.
    pub fn new(title: impl Into<String>, choice_labels: Vec<String>) -> Self {
        Self {
            id: OptionId::new(),
            title: title.into(),
            choices: choice_labels.into_iter().map(Choice::new).collect(),
            winning_choice: None,
            odds: None,
        }
    }

    /// Total pool across all choices of this option (derived, not stored).
    #[must_use]
    pub fn pool(&self) -> i64 {
        self.choices.iter().map(|c| c.pool).sum()
    }

    /// Look up a choice by id.
    #[must_use]
    pub fn choice(&self, id: &ChoiceId) -> Option<&Choice> {
        self.choices.iter().find(|c| &c.id == id)
    }

    /// Whether the given choice belongs to this option.
    #[must_use]
    pub fn owns_choice(&self, id: &ChoiceId) -> bool {
        self.choice(id).is_some()
    }
}

/// One staking event.
///
/// Mutated only by the lifecycle service and the settlement engine, never
/// deleted (cancellation is a terminal status, not a delete).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Market {
    pub id: MarketId,
    pub title: String,
    /// Fraction of the pool retained by the house, in `[0, 1)`.
    pub fee_rate: Decimal,
    pub status: MarketStatus,
    pub end_at: DateTime<Utc>,
    /// True once payouts have been applied; cleared again if a failed
    /// settlement claim is reverted.
    pub settled: bool,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub options: Vec<MarketOption>,
}

impl Market {
    /// Create a market aggregate with validated invariants.
    ///
    /// # Errors
    ///
    /// Returns `DomainError` if the fee rate is outside `[0, 1)`, the option
    /// list is empty, any option has fewer than two choices, or the initial
    /// status is not `Reviewing` or `Ongoing`.
    pub fn try_new(
        title: impl Into<String>,
        fee_rate: Decimal,
        end_at: DateTime<Utc>,
        initial_status: MarketStatus,
        options: Vec<MarketOption>,
    ) -> Result<Self, DomainError> {
        if fee_rate < Decimal::ZERO || fee_rate >= Decimal::ONE {
            return Err(DomainError::InvalidFeeRate { fee_rate });
        }
        if options.is_empty() {
            return Err(DomainError::EmptyOptions);
        }
        for option in &options {
            if option.choices.len() < 2 {
                return Err(DomainError::TooFewChoices {
                    option: option.id.to_string(),
                });
            }
        }
        if !matches!(
            initial_status,
            MarketStatus::Reviewing | MarketStatus::Ongoing
        ) {
            return Err(DomainError::InvalidInitialStatus {
                status: initial_status,
            });
        }

        let now = Utc::now();
        Ok(Self {
            id: MarketId::new(),
            title: title.into(),
            fee_rate,
            status: initial_status,
            end_at,
            settled: false,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
            options,
        })
    }

    /// Look up an option by id.
    #[must_use]
    pub fn option(&self, id: &OptionId) -> Option<&MarketOption> {
        self.options.iter().find(|o| &o.id == id)
    }

    /// Find the option that owns the given choice.
    #[must_use]
    pub fn option_for_choice(&self, choice: &ChoiceId) -> Option<&MarketOption> {
        self.options.iter().find(|o| o.owns_choice(choice))
    }

    /// Whether this is a simple binary market: a sole option with two choices.
    #[must_use]
    pub fn is_binary(&self) -> bool {
        self.options.len() == 1 && self.options[0].choices.len() == 2
    }

    /// Total pool across all options.
    #[must_use]
    pub fn total_pool(&self) -> i64 {
        self.options.iter().map(MarketOption::pool).sum()
    }
}

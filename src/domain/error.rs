//! Domain errors for the market core.
//!
//! Every failure a caller can provoke through the lifecycle, staking, odds,
//! or settlement surface maps to one of these variants. They are returned to
//! the caller (admin UI or scheduler log) as-is, never silently retried with
//! altered semantics.

use thiserror::Error;

use super::market::MarketStatus;

/// Errors that occur when a market-core invariant or state guard is violated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The operation is not permitted in the market's current state.
    #[error("cannot {operation} while market is {status}")]
    InvalidState {
        operation: &'static str,
        status: MarketStatus,
    },

    /// A choice/option pairing in a request does not match the actual relation.
    #[error("choice {choice} does not belong to option {option}")]
    InvalidReference { choice: String, option: String },

    /// Settlement attempted while an option lacks a declared winner.
    #[error("option {option} has no winning choice declared")]
    MissingResolution { option: String },

    /// A winner declaration named the same option more than once.
    #[error("option {option} declared more than once")]
    DuplicateResolution { option: String },

    /// Settlement attempted on a market that has already been paid out.
    #[error("market {market} is already settled")]
    AlreadySettled { market: String },

    /// A user may hold at most one non-cancelled stake per market.
    #[error("user {user} already holds a stake in market {market}")]
    DuplicateStake { market: String, user: String },

    /// The stake was already cancelled.
    #[error("stake {stake} is already cancelled")]
    StakeCancelled { stake: String },

    /// A user may only cancel their own stake.
    #[error("stake {stake} is not owned by user {user}")]
    StakeNotOwned { stake: String, user: String },

    /// Stake amounts must be positive integer points.
    #[error("stake amount must be positive, got {amount}")]
    NonPositiveStake { amount: i64 },

    /// Fee rates are fractions in `[0, 1)`.
    #[error("fee rate must be in [0, 1), got {fee_rate}")]
    InvalidFeeRate { fee_rate: rust_decimal::Decimal },

    /// Markets must have at least one option.
    #[error("options cannot be empty")]
    EmptyOptions,

    /// Options must offer at least two mutually exclusive choices.
    #[error("option {option} needs at least two choices")]
    TooFewChoices { option: String },

    /// Markets are created in `Reviewing` or `Ongoing` only.
    #[error("{status} is not a valid initial market status")]
    InvalidInitialStatus { status: MarketStatus },
}

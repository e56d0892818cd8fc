//! Pure domain types and computations.
//!
//! Nothing in this module performs I/O. The market aggregate, odds math,
//! and the settlement plan are all deterministic functions of their inputs,
//! which is what makes preview-vs-real equivalence and exact payout tests
//! possible.

pub mod error;
pub mod history;
pub mod id;
pub mod market;
pub mod odds;
pub mod reaction;
pub mod settlement;
pub mod stake;

pub use error::DomainError;
pub use history::StatusRecord;
pub use id::{ChoiceId, MarketId, OptionId, StakeId, UserId};
pub use market::{Choice, Market, MarketOption, MarketStatus};
pub use odds::{ExpectedOdds, OddsParams, EPSILON, MAX_ODDS};
pub use settlement::{settle_market, settle_option, OptionSettlement, SettlementPlan, StakePayout};
pub use stake::Stake;

//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`ledger`] - [`RecordingLedger`], an in-memory point ledger with
//!   idempotency tracking and scriptable failures.
//! - [`directory`] - [`StaticDirectory`] and [`AllowAllDirectory`] user
//!   directories.
//! - [`fixtures`] - Builders for markets and stakes in common shapes.

pub mod directory;
pub mod fixtures;
pub mod ledger;

pub use directory::{AllowAllDirectory, StaticDirectory};
pub use fixtures::{binary_market, market_with_options, stake_for};
pub use ledger::RecordingLedger;

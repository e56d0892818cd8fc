//! Parimut - Parimutuel prediction-market core.
//!
//! This crate implements the money-critical core of a parimutuel betting
//! platform: the market lifecycle state machine, the odds calculator, and
//! the settlement engine that distributes each option's pool to the winning
//! stakes with exact point conservation.
//!
//! # Architecture
//!
//! Pure computation is separated from orchestration and I/O:
//!
//! - **`domain`** - Markets, stakes, odds, and the settlement plan as
//!   deterministic functions. Preview and real settlement share one code
//!   path here, which is what makes them provably equal.
//! - **`service`** - Lifecycle controller, staking workflow, settlement
//!   engine, per-user statistics, and the periodic sweeper.
//! - **`store`** - Storage traits plus an in-memory and a Diesel/SQLite
//!   backend. The stores own the two race-critical operations: atomic
//!   stake insertion and the conditional status update that serializes
//!   settlement.
//! - **`port`** - Traits for the external point ledger and user directory.
//! - **`adapter`** - HTTP client implementing the ports.
//!
//! # Modules
//!
//! - [`config`] - Configuration loading from TOML files
//! - [`domain`] - Pure domain types and computations
//! - [`error`] - Error types for the crate
//! - [`port`] - Boundary traits for external collaborators
//! - [`store`] - Persistence backends
//! - [`service`] - Orchestration services
//! - [`adapter`] - Outbound adapters
//!
//! # Features
//!
//! - `testkit` - Expose test doubles and fixtures to integration tests

pub mod adapter;
pub mod config;
pub mod domain;
pub mod error;
pub mod port;
pub mod service;
pub mod store;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

//! Boundary traits for external collaborators.
//!
//! The point ledger and the user directory are owned by other services;
//! this core only consumes them through these traits. Adapters live in
//! [`crate::adapter`], test doubles in the testkit.

mod directory;
mod ledger;

pub use directory::UserDirectory;
pub use ledger::PointLedger;

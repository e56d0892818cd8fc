//! Orchestration services.
//!
//! Services wire the pure domain computations to the stores and the
//! external ports. Each one owns a narrow slice of the market lifecycle;
//! none of them holds state beyond its collaborators.

pub mod lifecycle;
pub mod odds;
pub mod settlement;
pub mod staking;
pub mod stats;
pub mod sweep;

pub use lifecycle::{LifecycleService, NewMarket, NewOption};
pub use odds::OddsService;
pub use settlement::SettlementService;
pub use staking::StakingService;
pub use stats::{StatsService, UserStatistics};
pub use sweep::{SweepReport, Sweeper};

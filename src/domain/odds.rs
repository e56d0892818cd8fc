//! Pure odds computations.
//!
//! Three distinct calculations share the same pool inputs but serve
//! different moments in the market lifecycle:
//!
//! - **Live odds** - the multiplier displayed next to a choice while
//!   staking is open.
//! - **Expected odds** - a what-if simulation for a candidate stake before
//!   it is placed. Never mutates any pool.
//! - **Settlement odds** - computed at settlement time from the final,
//!   frozen pools. Not required to equal the last live odds a user saw,
//!   because the pool keeps moving until close.
//!
//! All results are clamped to `[1.0, max_odds]` and rounded to two decimal
//! places. The ceiling and the expected-odds smoothing constant appear to be
//! tuned by trial in production rather than derived, so they stay named and
//! overridable instead of hard-coded.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Display ceiling preventing absurd multipliers when a choice pool is near
/// zero. A UX guard; settlement conservation never depends on it.
pub const MAX_ODDS: Decimal = dec!(10.0);

/// Smoothing constant added to the hypothetical choice pool in expected-odds
/// simulations, avoiding division blow-up on an empty choice.
pub const EPSILON: Decimal = dec!(1.0);

/// Tunable odds parameters, usually sourced from config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OddsParams {
    pub max_odds: Decimal,
    pub epsilon: Decimal,
}

impl Default for OddsParams {
    fn default() -> Self {
        Self {
            max_odds: MAX_ODDS,
            epsilon: EPSILON,
        }
    }
}

/// Result of an expected-odds simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedOdds {
    pub odds: Decimal,
    /// `floor(amount * odds)`, the reward the user would see if the pools
    /// froze right now.
    pub expected_reward: i64,
}

impl OddsParams {
    fn clamp(&self, raw: Decimal) -> Decimal {
        raw.round_dp(2).clamp(Decimal::ONE, self.max_odds)
    }

    /// Live display odds for a choice given its option's current pools.
    ///
    /// An empty choice pool yields 1.0: no reward multiplier is shown on a
    /// choice nobody has staked on.
    #[must_use]
    pub fn live_odds(&self, option_pool: i64, choice_pool: i64, fee_rate: Decimal) -> Decimal {
        if choice_pool <= 0 {
            return Decimal::ONE;
        }
        let distributable = Decimal::from(option_pool) * (Decimal::ONE - fee_rate);
        self.clamp(distributable / Decimal::from(choice_pool))
    }

    /// Simulate the odds a new stake of `amount` on the choice would see.
    ///
    /// Non-positive amounts short-circuit to odds 1.0 and reward 0.
    #[must_use]
    pub fn expected_odds(
        &self,
        option_pool: i64,
        choice_pool: i64,
        fee_rate: Decimal,
        amount: i64,
    ) -> ExpectedOdds {
        if amount <= 0 {
            return ExpectedOdds {
                odds: Decimal::ONE,
                expected_reward: 0,
            };
        }
        let new_option_pool = Decimal::from(option_pool + amount);
        let new_choice_pool = Decimal::from(choice_pool + amount) + self.epsilon;
        let odds = self.clamp(new_option_pool * (Decimal::ONE - fee_rate) / new_choice_pool);
        let expected_reward = (Decimal::from(amount) * odds)
            .floor()
            .to_i64()
            .unwrap_or(i64::MAX);
        ExpectedOdds {
            odds,
            expected_reward,
        }
    }

    /// Settlement odds from the frozen distributable pool and winner pool.
    ///
    /// `winner_pool == 0` yields 1.0: there is nobody to pay and the
    /// distributable pool is retained by the house.
    #[must_use]
    pub fn settlement_odds(&self, distributable_pool: i64, winner_pool: i64) -> Decimal {
        if winner_pool <= 0 {
            return Decimal::ONE;
        }
        self.clamp(Decimal::from(distributable_pool) / Decimal::from(winner_pool))
    }
}

/// The pool available to winners after the fee is deducted once, up front,
/// from the full option pool: `floor(option_pool * (1 - fee_rate))`.
#[must_use]
pub fn distributable_pool(option_pool: i64, fee_rate: Decimal) -> i64 {
    (Decimal::from(option_pool) * (Decimal::ONE - fee_rate))
        .floor()
        .to_i64()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_odds_empty_choice_is_one() {
        let params = OddsParams::default();
        assert_eq!(params.live_odds(1000, 0, dec!(0.10)), Decimal::ONE);
    }

    #[test]
    fn live_odds_matches_pool_ratio() {
        let params = OddsParams::default();
        // 1000 * 0.9 / 600 = 1.5
        assert_eq!(params.live_odds(1000, 600, dec!(0.10)), dec!(1.50));
    }

    #[test]
    fn live_odds_clamped_to_ceiling() {
        let params = OddsParams::default();
        // 100_000 * 0.9 / 10 = 9000, clamped to 10
        assert_eq!(params.live_odds(100_000, 10, dec!(0.10)), MAX_ODDS);
    }

    #[test]
    fn live_odds_floored_at_one() {
        let params = OddsParams::default();
        // Choice holds nearly the whole pool; raw odds < 1 after the fee.
        assert_eq!(params.live_odds(1000, 990, dec!(0.10)), Decimal::ONE);
    }

    #[test]
    fn expected_odds_non_positive_amount_short_circuits() {
        let params = OddsParams::default();
        for amount in [0, -5] {
            let sim = params.expected_odds(1000, 600, dec!(0.10), amount);
            assert_eq!(sim.odds, Decimal::ONE);
            assert_eq!(sim.expected_reward, 0);
        }
    }

    #[test]
    fn expected_odds_applies_epsilon_smoothing() {
        let params = OddsParams::default();
        // Empty pools: (0+100)*0.9 / (0+100+1) = 90/101 -> clamped to 1.0
        let sim = params.expected_odds(0, 0, dec!(0.10), 100);
        assert_eq!(sim.odds, Decimal::ONE);
        assert_eq!(sim.expected_reward, 100);
    }

    #[test]
    fn expected_odds_uses_simulated_pools() {
        let params = OddsParams::default();
        // (900+100)*0.9 / (200+100+1) = 900/301 = 2.99
        let sim = params.expected_odds(900, 200, dec!(0.10), 100);
        assert_eq!(sim.odds, dec!(2.99));
        assert_eq!(sim.expected_reward, 299);
    }

    #[test]
    fn expected_odds_respects_custom_params() {
        let params = OddsParams {
            max_odds: dec!(5.0),
            epsilon: dec!(0),
        };
        // (0+10)*1.0 / (0+10+0) = 1.0 with zero epsilon and no fee
        let sim = params.expected_odds(0, 0, Decimal::ZERO, 10);
        assert_eq!(sim.odds, Decimal::ONE);

        // Huge ratio clamps to the custom ceiling.
        let sim = params.expected_odds(1_000_000, 1, Decimal::ZERO, 1);
        assert_eq!(sim.odds, dec!(5.0));
    }

    #[test]
    fn settlement_odds_no_winner_is_one() {
        let params = OddsParams::default();
        assert_eq!(params.settlement_odds(900, 0), Decimal::ONE);
    }

    #[test]
    fn settlement_odds_worked_example() {
        // 1000-point pool, 10% fee, 600 on the winner.
        let params = OddsParams::default();
        let distributable = distributable_pool(1000, dec!(0.10));
        assert_eq!(distributable, 900);
        assert_eq!(params.settlement_odds(distributable, 600), dec!(1.50));
    }

    #[test]
    fn settlement_odds_always_within_bounds() {
        let params = OddsParams::default();
        for (dist, winners) in [(0, 1), (1, 1_000_000), (1_000_000, 1), (900, 600), (7, 3)] {
            let odds = params.settlement_odds(dist, winners);
            assert!(odds >= Decimal::ONE && odds <= MAX_ODDS, "odds {odds}");
        }
    }

    #[test]
    fn distributable_pool_floors() {
        assert_eq!(distributable_pool(1000, dec!(0.10)), 900);
        assert_eq!(distributable_pool(999, dec!(0.10)), 899); // 899.1 floored
        assert_eq!(distributable_pool(0, dec!(0.10)), 0);
        assert_eq!(distributable_pool(1000, Decimal::ZERO), 1000);
    }
}

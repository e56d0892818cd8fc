//! Builders for domain fixtures in common shapes.

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;

use crate::domain::{Market, MarketOption, MarketStatus, Stake, UserId};

/// An `Ongoing` yes/no market with a 10% fee, ending in one hour.
#[must_use]
pub fn binary_market() -> Market {
    market_with_options(vec![("Will it happen?", vec!["Yes", "No"])])
}

/// An `Ongoing` market with the given option titles and choice labels.
#[must_use]
pub fn market_with_options(options: Vec<(&str, Vec<&str>)>) -> Market {
    let options = options
        .into_iter()
        .map(|(title, labels)| {
            MarketOption::new(title, labels.into_iter().map(String::from).collect())
        })
        .collect();
    Market::try_new(
        "fixture market",
        dec!(0.10),
        Utc::now() + Duration::hours(1),
        MarketStatus::Ongoing,
        options,
    )
    .expect("fixture market must be valid")
}

/// A stake for `user` on the given option/choice index of the market.
#[must_use]
pub fn stake_for(market: &Market, option_idx: usize, choice_idx: usize, user: &str, amount: i64) -> Stake {
    let option = &market.options[option_idx];
    Stake::try_new(
        market.id.clone(),
        option.id.clone(),
        option.choices[choice_idx].id.clone(),
        UserId::new(user),
        amount,
    )
    .expect("fixture stake must be valid")
}

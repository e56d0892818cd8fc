//! Database model types for Diesel ORM.
//!
//! Timestamps are stored as RFC 3339 text, fee rates and odds as decimal
//! text to keep exact values across the round trip.

use diesel::prelude::*;

use super::schema::{choices, market_options, markets, stakes, status_history};

/// Database row for a market.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = markets)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MarketRow {
    pub id: String,
    pub title: String,
    pub fee_rate: String,
    pub status: String,
    pub end_at: String,
    pub settled: i32,
    pub cancel_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Database row for a market option.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = market_options)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MarketOptionRow {
    pub id: String,
    pub market_id: String,
    pub title: String,
    pub winning_choice_id: Option<String>,
    pub odds: Option<String>,
    pub position: i32,
}

/// Database row for a choice.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = choices)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ChoiceRow {
    pub id: String,
    pub option_id: String,
    pub label: String,
    pub pool: i64,
    pub participants: i64,
    pub odds: Option<String>,
    pub position: i32,
}

/// Database row for a stake.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = stakes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct StakeRow {
    pub id: String,
    pub market_id: String,
    pub option_id: String,
    pub choice_id: String,
    pub user_id: String,
    pub amount: i64,
    pub cancelled: i32,
    pub reward: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

/// Database row for a status history entry (insertable).
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = status_history)]
pub struct NewStatusHistoryRow {
    pub market_id: String,
    pub status: String,
    pub recorded_at: String,
}

/// Database row for a status history entry (queryable).
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = status_history)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct StatusHistoryRow {
    pub id: Option<i32>,
    pub market_id: String,
    pub status: String,
    pub recorded_at: String,
}

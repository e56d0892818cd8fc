//! SQLite store implementation using Diesel.
//!
//! Every multi-row mutation runs inside a transaction so the atomicity
//! contract holds under concurrent access. Conditional status changes are
//! expressed as `UPDATE ... WHERE status = from`, which makes the affected
//! row count the race arbiter.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;

use super::db::model::{ChoiceRow, MarketOptionRow, MarketRow, NewStatusHistoryRow, StakeRow};
use super::db::schema::{choices, market_options, markets, stakes, status_history};
use super::db::DbPool;
use super::{HistoryStore, MarketStore, StakeStore};
use crate::domain::{
    Choice, ChoiceId, DomainError, Market, MarketId, MarketOption, MarketStatus, OptionId, Stake,
    StakeId, StatusRecord, UserId,
};
use crate::error::{Error, Result};

/// SQLite-backed market, stake, and history store.
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    /// Create a new SQLite store over an existing pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(
        &self,
    ) -> Result<diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<SqliteConnection>>>
    {
        self.pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))
    }

    fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
        Ok(DateTime::parse_from_rfc3339(s)
            .map_err(|e| Error::Parse(e.to_string()))?
            .with_timezone(&Utc))
    }

    fn parse_decimal(s: &str) -> Result<Decimal> {
        Decimal::from_str(s).map_err(|e| Error::Parse(e.to_string()))
    }

    fn parse_status(s: &str) -> Result<MarketStatus> {
        MarketStatus::parse(s).ok_or_else(|| Error::Parse(format!("unknown market status: {s}")))
    }

    fn market_to_row(market: &Market) -> MarketRow {
        MarketRow {
            id: market.id.to_string(),
            title: market.title.clone(),
            fee_rate: market.fee_rate.to_string(),
            status: market.status.as_str().to_string(),
            end_at: market.end_at.to_rfc3339(),
            settled: i32::from(market.settled),
            cancel_reason: market.cancel_reason.clone(),
            created_at: market.created_at.to_rfc3339(),
            updated_at: market.updated_at.to_rfc3339(),
        }
    }

    fn market_from_rows(
        row: MarketRow,
        option_rows: Vec<MarketOptionRow>,
        choice_rows: Vec<ChoiceRow>,
    ) -> Result<Market> {
        let mut options = Vec::with_capacity(option_rows.len());
        for option_row in option_rows {
            let option_choices = choice_rows
                .iter()
                .filter(|c| c.option_id == option_row.id)
                .map(|c| {
                    Ok(Choice {
                        id: ChoiceId::from(c.id.clone()),
                        label: c.label.clone(),
                        pool: c.pool,
                        participants: c.participants,
                        odds: c.odds.as_deref().map(Self::parse_decimal).transpose()?,
                    })
                })
                .collect::<Result<Vec<Choice>>>()?;

            options.push(MarketOption {
                id: OptionId::from(option_row.id),
                title: option_row.title,
                choices: option_choices,
                winning_choice: option_row.winning_choice_id.map(ChoiceId::from),
                odds: option_row
                    .odds
                    .as_deref()
                    .map(Self::parse_decimal)
                    .transpose()?,
            });
        }

        Ok(Market {
            id: MarketId::from(row.id),
            title: row.title,
            fee_rate: Self::parse_decimal(&row.fee_rate)?,
            status: Self::parse_status(&row.status)?,
            end_at: Self::parse_timestamp(&row.end_at)?,
            settled: row.settled != 0,
            cancel_reason: row.cancel_reason,
            created_at: Self::parse_timestamp(&row.created_at)?,
            updated_at: Self::parse_timestamp(&row.updated_at)?,
            options,
        })
    }

    fn stake_to_row(stake: &Stake) -> StakeRow {
        StakeRow {
            id: stake.id.to_string(),
            market_id: stake.market_id.to_string(),
            option_id: stake.option_id.to_string(),
            choice_id: stake.choice_id.to_string(),
            user_id: stake.user_id.to_string(),
            amount: stake.amount,
            cancelled: i32::from(stake.cancelled),
            reward: stake.reward,
            created_at: stake.created_at.to_rfc3339(),
            updated_at: stake.updated_at.to_rfc3339(),
        }
    }

    fn stake_from_row(row: StakeRow) -> Result<Stake> {
        Ok(Stake {
            id: StakeId::from(row.id),
            market_id: MarketId::from(row.market_id),
            option_id: OptionId::from(row.option_id),
            choice_id: ChoiceId::from(row.choice_id),
            user_id: UserId::from(row.user_id),
            amount: row.amount,
            cancelled: row.cancelled != 0,
            reward: row.reward,
            created_at: Self::parse_timestamp(&row.created_at)?,
            updated_at: Self::parse_timestamp(&row.updated_at)?,
        })
    }

    fn load_market(conn: &mut SqliteConnection, id: &MarketId) -> Result<Option<Market>> {
        let row: Option<MarketRow> = markets::table
            .find(id.to_string())
            .first(conn)
            .optional()?;
        let Some(row) = row else {
            return Ok(None);
        };

        let option_rows: Vec<MarketOptionRow> = market_options::table
            .filter(market_options::market_id.eq(id.to_string()))
            .order(market_options::position.asc())
            .load(conn)?;
        let option_ids: Vec<String> = option_rows.iter().map(|o| o.id.clone()).collect();
        let choice_rows: Vec<ChoiceRow> = choices::table
            .filter(choices::option_id.eq_any(&option_ids))
            .order((choices::option_id.asc(), choices::position.asc()))
            .load(conn)?;

        Self::market_from_rows(row, option_rows, choice_rows).map(Some)
    }

    fn load_markets_where(
        conn: &mut SqliteConnection,
        rows: Vec<MarketRow>,
    ) -> Result<Vec<Market>> {
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let option_rows: Vec<MarketOptionRow> = market_options::table
                .filter(market_options::market_id.eq(&row.id))
                .order(market_options::position.asc())
                .load(conn)?;
            let option_ids: Vec<String> = option_rows.iter().map(|o| o.id.clone()).collect();
            let choice_rows: Vec<ChoiceRow> = choices::table
                .filter(choices::option_id.eq_any(&option_ids))
                .order((choices::option_id.asc(), choices::position.asc()))
                .load(conn)?;
            out.push(Self::market_from_rows(row, option_rows, choice_rows)?);
        }
        Ok(out)
    }

    fn current_status(conn: &mut SqliteConnection, id: &MarketId) -> Result<MarketStatus> {
        let status: Option<String> = markets::table
            .find(id.to_string())
            .select(markets::status)
            .first(conn)
            .optional()?;
        let status = status.ok_or_else(|| DomainError::NotFound {
            entity: "market",
            id: id.to_string(),
        })?;
        Self::parse_status(&status)
    }
}

impl MarketStore for SqliteStore {
    async fn insert_market(&self, market: &Market) -> Result<()> {
        let mut conn = self.conn()?;
        let market_row = Self::market_to_row(market);
        let option_rows: Vec<MarketOptionRow> = market
            .options
            .iter()
            .enumerate()
            .map(|(i, o)| MarketOptionRow {
                id: o.id.to_string(),
                market_id: market.id.to_string(),
                title: o.title.clone(),
                winning_choice_id: o.winning_choice.as_ref().map(ToString::to_string),
                odds: o.odds.map(|d| d.to_string()),
                position: i as i32,
            })
            .collect();
        let choice_rows: Vec<ChoiceRow> = market
            .options
            .iter()
            .flat_map(|o| {
                o.choices.iter().enumerate().map(|(i, c)| ChoiceRow {
                    id: c.id.to_string(),
                    option_id: o.id.to_string(),
                    label: c.label.clone(),
                    pool: c.pool,
                    participants: c.participants,
                    odds: c.odds.map(|d| d.to_string()),
                    position: i as i32,
                })
            })
            .collect();

        conn.transaction::<_, Error, _>(|conn| {
            diesel::insert_into(markets::table)
                .values(&market_row)
                .execute(conn)?;
            diesel::insert_into(market_options::table)
                .values(&option_rows)
                .execute(conn)?;
            diesel::insert_into(choices::table)
                .values(&choice_rows)
                .execute(conn)?;
            Ok(())
        })
    }

    async fn get_market(&self, id: &MarketId) -> Result<Option<Market>> {
        let mut conn = self.conn()?;
        Self::load_market(&mut conn, id)
    }

    async fn list_by_status(&self, status: MarketStatus) -> Result<Vec<Market>> {
        let mut conn = self.conn()?;
        let rows: Vec<MarketRow> = markets::table
            .filter(markets::status.eq(status.as_str()))
            .order(markets::id.asc())
            .load(&mut conn)?;
        Self::load_markets_where(&mut conn, rows)
    }

    async fn list_ongoing_past_end(&self, now: DateTime<Utc>) -> Result<Vec<Market>> {
        let mut conn = self.conn()?;
        let rows: Vec<MarketRow> = markets::table
            .filter(markets::status.eq(MarketStatus::Ongoing.as_str()))
            .filter(markets::end_at.le(now.to_rfc3339()))
            .order(markets::id.asc())
            .load(&mut conn)?;
        Self::load_markets_where(&mut conn, rows)
    }

    async fn transition_status(
        &self,
        id: &MarketId,
        from: MarketStatus,
        to: MarketStatus,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut conn = self.conn()?;
        conn.transaction::<_, Error, _>(|conn| {
            // Existence check so a missing market is NotFound, not a lost race.
            Self::current_status(conn, id)?;

            let updated = diesel::update(
                markets::table
                    .find(id.to_string())
                    .filter(markets::status.eq(from.as_str())),
            )
            .set((
                markets::status.eq(to.as_str()),
                markets::settled.eq(i32::from(to == MarketStatus::Rewarded)),
                markets::updated_at.eq(at.to_rfc3339()),
            ))
            .execute(conn)?;
            Ok(updated > 0)
        })
    }

    async fn cancel_market(&self, id: &MarketId, reason: &str, at: DateTime<Utc>) -> Result<bool> {
        let mut conn = self.conn()?;
        conn.transaction::<_, Error, _>(|conn| {
            Self::current_status(conn, id)?;

            let updated = diesel::update(
                markets::table.find(id.to_string()).filter(
                    markets::status.eq_any([
                        MarketStatus::Reviewing.as_str(),
                        MarketStatus::Ongoing.as_str(),
                    ]),
                ),
            )
            .set((
                markets::status.eq(MarketStatus::Cancelled.as_str()),
                markets::cancel_reason.eq(reason),
                markets::updated_at.eq(at.to_rfc3339()),
            ))
            .execute(conn)?;
            Ok(updated > 0)
        })
    }

    async fn set_winning_choice(
        &self,
        market: &MarketId,
        option: &OptionId,
        choice: &ChoiceId,
    ) -> Result<()> {
        let mut conn = self.conn()?;
        let updated = diesel::update(
            market_options::table
                .find(option.to_string())
                .filter(market_options::market_id.eq(market.to_string())),
        )
        .set(market_options::winning_choice_id.eq(choice.to_string()))
        .execute(&mut conn)?;
        if updated == 0 {
            return Err(DomainError::NotFound {
                entity: "option",
                id: option.to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn set_option_odds(
        &self,
        market: &MarketId,
        option: &OptionId,
        odds: Decimal,
    ) -> Result<()> {
        let mut conn = self.conn()?;
        let updated = diesel::update(
            market_options::table
                .find(option.to_string())
                .filter(market_options::market_id.eq(market.to_string())),
        )
        .set(market_options::odds.eq(odds.to_string()))
        .execute(&mut conn)?;
        if updated == 0 {
            return Err(DomainError::NotFound {
                entity: "option",
                id: option.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

impl StakeStore for SqliteStore {
    async fn place_stake(&self, stake: &Stake) -> Result<()> {
        let mut conn = self.conn()?;
        let row = Self::stake_to_row(stake);
        conn.transaction::<_, Error, _>(|conn| {
            let existing: i64 = stakes::table
                .filter(stakes::market_id.eq(&row.market_id))
                .filter(stakes::user_id.eq(&row.user_id))
                .filter(stakes::cancelled.eq(0))
                .count()
                .get_result(conn)?;
            if existing > 0 {
                return Err(DomainError::DuplicateStake {
                    market: row.market_id.clone(),
                    user: row.user_id.clone(),
                }
                .into());
            }

            let status = Self::current_status(conn, &stake.market_id)?;
            if status != MarketStatus::Ongoing {
                return Err(DomainError::InvalidState {
                    operation: "stake",
                    status,
                }
                .into());
            }

            let updated = diesel::update(choices::table.find(&row.choice_id))
                .set((
                    choices::pool.eq(choices::pool + row.amount),
                    choices::participants.eq(choices::participants + 1),
                ))
                .execute(conn)?;
            if updated == 0 {
                return Err(DomainError::NotFound {
                    entity: "choice",
                    id: row.choice_id.clone(),
                }
                .into());
            }

            diesel::insert_into(stakes::table).values(&row).execute(conn)?;
            Ok(())
        })
    }

    async fn cancel_stake(&self, id: &StakeId, user: &UserId, at: DateTime<Utc>) -> Result<Stake> {
        let mut conn = self.conn()?;
        conn.transaction::<_, Error, _>(|conn| {
            let row: Option<StakeRow> = stakes::table
                .find(id.to_string())
                .first(conn)
                .optional()?;
            let row = row.ok_or_else(|| DomainError::NotFound {
                entity: "stake",
                id: id.to_string(),
            })?;

            if row.user_id != user.to_string() {
                return Err(DomainError::StakeNotOwned {
                    stake: id.to_string(),
                    user: user.to_string(),
                }
                .into());
            }
            if row.cancelled != 0 {
                return Err(DomainError::StakeCancelled {
                    stake: id.to_string(),
                }
                .into());
            }

            let market_id = MarketId::from(row.market_id.clone());
            let status = Self::current_status(conn, &market_id)?;
            if status != MarketStatus::Ongoing {
                return Err(DomainError::InvalidState {
                    operation: "cancel stake",
                    status,
                }
                .into());
            }

            diesel::update(choices::table.find(&row.choice_id))
                .set((
                    choices::pool.eq(choices::pool - row.amount),
                    choices::participants.eq(choices::participants - 1),
                ))
                .execute(conn)?;

            diesel::update(stakes::table.find(id.to_string()))
                .set((
                    stakes::cancelled.eq(1),
                    stakes::updated_at.eq(at.to_rfc3339()),
                ))
                .execute(conn)?;

            let mut stake = Self::stake_from_row(row)?;
            stake.cancelled = true;
            stake.updated_at = at;
            Ok(stake)
        })
    }

    async fn stakes_for_market(&self, market: &MarketId) -> Result<Vec<Stake>> {
        let mut conn = self.conn()?;
        let rows: Vec<StakeRow> = stakes::table
            .filter(stakes::market_id.eq(market.to_string()))
            .order(stakes::id.asc())
            .load(&mut conn)?;
        rows.into_iter().map(Self::stake_from_row).collect()
    }

    async fn stakes_for_user(&self, user: &UserId) -> Result<Vec<Stake>> {
        let mut conn = self.conn()?;
        let rows: Vec<StakeRow> = stakes::table
            .filter(stakes::user_id.eq(user.to_string()))
            .order(stakes::id.asc())
            .load(&mut conn)?;
        rows.into_iter().map(Self::stake_from_row).collect()
    }

    async fn active_stake(&self, market: &MarketId, user: &UserId) -> Result<Option<Stake>> {
        let mut conn = self.conn()?;
        let row: Option<StakeRow> = stakes::table
            .filter(stakes::market_id.eq(market.to_string()))
            .filter(stakes::user_id.eq(user.to_string()))
            .filter(stakes::cancelled.eq(0))
            .first(&mut conn)
            .optional()?;
        row.map(Self::stake_from_row).transpose()
    }

    async fn set_reward(&self, id: &StakeId, reward: i64, at: DateTime<Utc>) -> Result<()> {
        let mut conn = self.conn()?;
        let updated = diesel::update(stakes::table.find(id.to_string()))
            .set((
                stakes::reward.eq(reward),
                stakes::updated_at.eq(at.to_rfc3339()),
            ))
            .execute(&mut conn)?;
        if updated == 0 {
            return Err(DomainError::NotFound {
                entity: "stake",
                id: id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn refresh_choice_odds(
        &self,
        _market: &MarketId,
        odds: &[(ChoiceId, Decimal)],
    ) -> Result<()> {
        let mut conn = self.conn()?;
        conn.transaction::<_, Error, _>(|conn| {
            for (choice_id, value) in odds {
                diesel::update(choices::table.find(choice_id.to_string()))
                    .set(choices::odds.eq(value.to_string()))
                    .execute(conn)?;
            }
            Ok(())
        })
    }
}

impl HistoryStore for SqliteStore {
    async fn append_status(&self, record: &StatusRecord) -> Result<()> {
        let mut conn = self.conn()?;
        let row = NewStatusHistoryRow {
            market_id: record.market_id.to_string(),
            status: record.status.as_str().to_string(),
            recorded_at: record.recorded_at.to_rfc3339(),
        };
        diesel::insert_into(status_history::table)
            .values(&row)
            .execute(&mut conn)?;
        Ok(())
    }

    async fn history_for_market(&self, market: &MarketId) -> Result<Vec<StatusRecord>> {
        let mut conn = self.conn()?;
        let rows: Vec<(String, String)> = status_history::table
            .filter(status_history::market_id.eq(market.to_string()))
            .order(status_history::id.asc())
            .select((status_history::status, status_history::recorded_at))
            .load(&mut conn)?;
        rows.into_iter()
            .map(|(status, recorded_at)| {
                Ok(StatusRecord {
                    market_id: market.clone(),
                    status: Self::parse_status(&status)?,
                    recorded_at: Self::parse_timestamp(&recorded_at)?,
                })
            })
            .collect()
    }
}

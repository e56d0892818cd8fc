//! In-memory point ledger for tests.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use crate::domain::UserId;
use crate::error::{LedgerError, Result};
use crate::port::PointLedger;

#[derive(Debug, Default)]
struct Books {
    balances: HashMap<UserId, i64>,
    debits: HashMap<UserId, i64>,
    credits: HashMap<UserId, i64>,
    seen_keys: HashSet<String>,
    fail_credits: u32,
}

/// Recording ledger double.
///
/// Tracks every debit and credit, honors idempotency keys exactly like the
/// real ledger contract demands, and can be told to fail the next N credit
/// calls to exercise settlement failure paths.
#[derive(Debug, Default)]
pub struct RecordingLedger {
    books: Mutex<Books>,
    starting_balance: i64,
}

impl RecordingLedger {
    /// Ledger where every user starts with the given balance.
    #[must_use]
    pub fn with_balance(starting_balance: i64) -> Self {
        Self {
            books: Mutex::new(Books::default()),
            starting_balance,
        }
    }

    /// Make the next `n` credit calls fail with `LedgerError::Unavailable`.
    pub fn fail_next_credits(&self, n: u32) {
        self.books.lock().fail_credits = n;
    }

    /// Total points ever debited from the user.
    #[must_use]
    pub fn debited(&self, user: &UserId) -> i64 {
        self.books.lock().debits.get(user).copied().unwrap_or(0)
    }

    /// Total points ever credited to the user (idempotent replays excluded).
    #[must_use]
    pub fn credited(&self, user: &UserId) -> i64 {
        self.books.lock().credits.get(user).copied().unwrap_or(0)
    }

    /// Total points credited across all users.
    #[must_use]
    pub fn total_credited(&self) -> i64 {
        self.books.lock().credits.values().sum()
    }

    /// Whether the idempotency key has been accepted.
    #[must_use]
    pub fn saw_key(&self, key: &str) -> bool {
        self.books.lock().seen_keys.contains(key)
    }
}

impl PointLedger for RecordingLedger {
    async fn debit(&self, user: &UserId, amount: i64) -> Result<()> {
        let mut books = self.books.lock();
        let balance = books
            .balances
            .entry(user.clone())
            .or_insert(self.starting_balance);
        if *balance < amount {
            return Err(LedgerError::InsufficientBalance {
                user: user.to_string(),
                requested: amount,
            }
            .into());
        }
        *balance -= amount;
        *books.debits.entry(user.clone()).or_default() += amount;
        Ok(())
    }

    async fn credit(&self, user: &UserId, amount: i64, idempotency_key: &str) -> Result<()> {
        let mut books = self.books.lock();
        if books.fail_credits > 0 {
            books.fail_credits -= 1;
            return Err(LedgerError::Unavailable("scripted outage".into()).into());
        }
        // Replays with a seen key succeed without moving any points.
        if !books.seen_keys.insert(idempotency_key.to_string()) {
            return Ok(());
        }
        *books
            .balances
            .entry(user.clone())
            .or_insert(self.starting_balance) += amount;
        *books.credits.entry(user.clone()).or_default() += amount;
        Ok(())
    }
}

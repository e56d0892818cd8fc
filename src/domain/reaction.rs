//! Per-user reaction state machine with derived counters.
//!
//! Each (user, entity) pair holds one of three states: none, liked, or
//! disliked. Clicking the same reaction again cancels it; clicking the
//! other one moves between the sets. Counters follow state deltas, which
//! keeps them non-negative without any decrement guard.

use std::collections::HashMap;

use super::id::UserId;

/// The two reaction kinds a user can click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionKind {
    Like,
    Dislike,
}

/// A user's current reaction toward one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReactionState {
    #[default]
    None,
    Liked,
    Disliked,
}

impl ReactionState {
    /// Apply one click: same reaction cancels, the other switches.
    #[must_use]
    pub fn toggle(self, kind: ReactionKind) -> ReactionState {
        match (self, kind) {
            (ReactionState::Liked, ReactionKind::Like) => ReactionState::None,
            (ReactionState::Disliked, ReactionKind::Dislike) => ReactionState::None,
            (_, ReactionKind::Like) => ReactionState::Liked,
            (_, ReactionKind::Dislike) => ReactionState::Disliked,
        }
    }
}

/// Aggregate counts for one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReactionCounts {
    pub likes: i64,
    pub dislikes: i64,
}

/// Reaction bookkeeping for a set of entities.
///
/// Keys are opaque entity ids (articles, comments, posts); this module does
/// not care what they refer to.
#[derive(Debug, Default)]
pub struct ReactionBoard {
    states: HashMap<(String, UserId), ReactionState>,
    counts: HashMap<String, ReactionCounts>,
}

impl ReactionBoard {
    /// Create an empty board.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one click and return the entity's updated counts.
    pub fn toggle(&mut self, entity: &str, user: &UserId, kind: ReactionKind) -> ReactionCounts {
        let key = (entity.to_string(), user.clone());
        let before = self.states.get(&key).copied().unwrap_or_default();
        let after = before.toggle(kind);

        let counts = self.counts.entry(entity.to_string()).or_default();
        match before {
            ReactionState::Liked => counts.likes -= 1,
            ReactionState::Disliked => counts.dislikes -= 1,
            ReactionState::None => {}
        }
        match after {
            ReactionState::Liked => counts.likes += 1,
            ReactionState::Disliked => counts.dislikes += 1,
            ReactionState::None => {}
        }

        if after == ReactionState::None {
            self.states.remove(&key);
        } else {
            self.states.insert(key, after);
        }
        *counts
    }

    /// Current counts for an entity.
    #[must_use]
    pub fn counts(&self, entity: &str) -> ReactionCounts {
        self.counts.get(entity).copied().unwrap_or_default()
    }

    /// A user's current state toward an entity.
    #[must_use]
    pub fn state(&self, entity: &str, user: &UserId) -> ReactionState {
        self.states
            .get(&(entity.to_string(), user.clone()))
            .copied()
            .unwrap_or_default()
    }
}

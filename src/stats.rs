//! Deck statistics and their TTL cache
//!
//! The cache sits in front of the storage collaborator's aggregate queries
//! so frequent UI refreshes stay cheap. It is strictly cache-aside: it
//! never fetches or recomputes anything itself. A miss tells the caller to
//! recompute from storage and `set` the result; every write that changes a
//! deck's card set or any card state in it must `invalidate` that deck.
//!
//! The internal map is the core's single piece of shared mutable state. All
//! access goes through one mutex so a partial invalidation can never be
//! observed mid-batch, and no method does I/O while holding the lock.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use crate::models::{CardMemoryState, DeckId, DeckStatisticsSnapshot, LifecycleState};

/// Default snapshot lifetime. Deliberately short (seconds, not minutes):
/// deck contents change during an active session.
pub const DEFAULT_TTL_SECONDS: i64 = 5;

/// TTL cache of per-deck statistics snapshots.
pub struct StatisticsCache {
    ttl: Duration,
    entries: Mutex<HashMap<DeckId, DeckStatisticsSnapshot>>,
}

impl StatisticsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached snapshot for a deck if one exists and is still
    /// fresh at `now`. Expired entries are dropped on observation. A miss
    /// is not an error; the caller recomputes and calls [`set`](Self::set).
    pub fn get(&self, deck_id: DeckId, now: DateTime<Utc>) -> Option<DeckStatisticsSnapshot> {
        let mut entries = self.lock();
        match entries.get(&deck_id) {
            Some(snapshot) if now - snapshot.computed_at < self.ttl => Some(snapshot.clone()),
            Some(_) => {
                entries.remove(&deck_id);
                None
            }
            None => None,
        }
    }

    /// Store or replace the snapshot for a deck.
    pub fn set(&self, snapshot: DeckStatisticsSnapshot) {
        self.lock().insert(snapshot.deck_id, snapshot);
    }

    /// Drop one deck's snapshot immediately. Must be called after any
    /// mutation affecting that deck (review submitted, card imported or
    /// moved, deck deleted).
    pub fn invalidate(&self, deck_id: DeckId) {
        if self.lock().remove(&deck_id).is_some() {
            log::debug!("Invalidated statistics cache for deck {}", deck_id);
        }
    }

    /// Drop every snapshot, e.g. after a bulk import touching many decks.
    pub fn invalidate_all(&self) {
        let mut entries = self.lock();
        if !entries.is_empty() {
            log::debug!("Invalidated statistics cache ({} decks)", entries.len());
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<DeckId, DeckStatisticsSnapshot>> {
        // A poisoned lock only means another holder panicked; the map
        // itself is still consistent, so keep serving.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for StatisticsCache {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_TTL_SECONDS))
    }
}

impl DeckStatisticsSnapshot {
    /// Aggregate a deck's fetched card states into a snapshot at `now`.
    /// Averages cover reviewed cards only and are 0.0 when there are none.
    pub fn compute(deck_id: DeckId, states: &[CardMemoryState], now: DateTime<Utc>) -> Self {
        let mut snapshot = Self {
            deck_id,
            due_count: 0,
            total_count: states.len(),
            new_count: 0,
            learning_count: 0,
            review_count: 0,
            average_stability: 0.0,
            average_difficulty: 0.0,
            computed_at: now,
        };

        let mut reviewed = 0usize;
        let mut stability_sum = 0.0f32;
        let mut difficulty_sum = 0.0f32;

        for state in states {
            match state.lifecycle {
                LifecycleState::New => snapshot.new_count += 1,
                LifecycleState::Learning => snapshot.learning_count += 1,
                LifecycleState::Review | LifecycleState::Relearning => {
                    snapshot.review_count += 1
                }
            }
            if state.is_due(now) {
                snapshot.due_count += 1;
            }
            if state.reps > 0 {
                reviewed += 1;
                stability_sum += state.stability;
                difficulty_sum += state.difficulty;
            }
        }

        if reviewed > 0 {
            snapshot.average_stability = stability_sum / reviewed as f32;
            snapshot.average_difficulty = difficulty_sum / reviewed as f32;
        }

        snapshot
    }
}

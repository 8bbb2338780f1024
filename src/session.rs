//! Session orchestration
//!
//! The seam between the core and its collaborators: storage sits behind
//! [`ReviewStore`], and the functions here wire the scheduling engine,
//! statistics cache, and interleaving planner together for the UI layer.
//!
//! The cache discipline is cache-aside throughout: reads try the cache
//! first and recompute from storage on a miss (outside the cache's lock);
//! every mutation invalidates the affected deck before returning.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::algorithm::{self, schedule, SchedulerConfig, SchedulerError};
use crate::models::{
    CardId, CardMemoryState, DeckId, DeckStatisticsSnapshot, Rating, ReviewEvent, StudySession,
};
use crate::planner::{build_session, TieBreak};
use crate::stats::StatisticsCache;

/// Storage collaborator contract.
///
/// The core never persists anything itself; it receives and returns plain
/// in-memory records through this trait. Due-card lists must come back
/// ordered by due-date urgency (ties by card creation order) — the planner
/// preserves that order within each deck.
pub trait ReviewStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Current memory state for a card.
    fn fetch_memory_state(&self, card_id: CardId) -> Result<CardMemoryState, Self::Error>;

    /// Cards in a deck due at or before `as_of`, most urgent first.
    fn fetch_due_cards(&self, deck_id: DeckId, as_of: DateTime<Utc>)
        -> Result<Vec<CardId>, Self::Error>;

    /// Memory states of every card in a deck, for aggregate statistics.
    fn fetch_deck_states(&self, deck_id: DeckId) -> Result<Vec<CardMemoryState>, Self::Error>;

    /// Persist an updated memory state.
    fn persist(&mut self, state: &CardMemoryState) -> Result<(), Self::Error>;

    /// Append one immutable review event to the audit trail.
    fn append_review_event(&mut self, event: &ReviewEvent) -> Result<(), Self::Error>;
}

#[derive(Error, Debug)]
pub enum SessionError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("Storage error: {0}")]
    Store(E),
}

/// Deck statistics with cache-aside recompute.
///
/// Returns the cached snapshot when fresh; otherwise fetches the deck's
/// states, aggregates them, stores the result, and returns it. Concurrent
/// misses on the same deck may both recompute — duplicate work, never a
/// stale read.
pub fn deck_statistics<S: ReviewStore>(
    store: &S,
    cache: &StatisticsCache,
    deck_id: DeckId,
    now: DateTime<Utc>,
) -> Result<DeckStatisticsSnapshot, SessionError<S::Error>> {
    if let Some(snapshot) = cache.get(deck_id, now) {
        return Ok(snapshot);
    }

    let states = store
        .fetch_deck_states(deck_id)
        .map_err(SessionError::Store)?;
    let snapshot = DeckStatisticsSnapshot::compute(deck_id, &states, now);
    cache.set(snapshot.clone());
    log::debug!(
        "Recomputed statistics for deck {}: {} due of {}",
        deck_id,
        snapshot.due_count,
        snapshot.total_count
    );
    Ok(snapshot)
}

/// Start a multi-deck study session.
///
/// Fetches each deck's due cards (storage order preserved), warms the
/// statistics cache along the way, and interleaves the decks into one
/// queue of at most `max_cards`.
pub fn start_session<S: ReviewStore>(
    store: &S,
    cache: &StatisticsCache,
    deck_ids: &[DeckId],
    max_cards: usize,
    tie_break: TieBreak,
    now: DateTime<Utc>,
) -> Result<StudySession, SessionError<S::Error>> {
    let mut due_by_deck = std::collections::HashMap::with_capacity(deck_ids.len());

    for &deck_id in deck_ids {
        let due = store
            .fetch_due_cards(deck_id, now)
            .map_err(SessionError::Store)?;
        deck_statistics(store, cache, deck_id, now)?;
        due_by_deck.insert(deck_id, due);
    }

    let session = build_session(&due_by_deck, max_cards, tie_break, now);
    log::info!(
        "Study session started: {} cards across {} decks",
        session.len(),
        deck_ids.len()
    );
    Ok(session)
}

/// Submit a recall rating for one card.
///
/// Runs the scheduling engine, persists the new state, appends exactly one
/// review event, and invalidates the deck's cached statistics. Returns the
/// updated state for display.
pub fn submit_review<S: ReviewStore>(
    store: &mut S,
    cache: &StatisticsCache,
    config: &SchedulerConfig,
    deck_id: DeckId,
    card_id: CardId,
    rating: Rating,
    now: DateTime<Utc>,
) -> Result<CardMemoryState, SessionError<S::Error>> {
    let state = store
        .fetch_memory_state(card_id)
        .map_err(SessionError::Store)?;

    let scheduled_days = match state.last_review {
        Some(last) => ((state.due_date - last).num_seconds() as f32 / 86400.0).max(0.0),
        None => 0.0,
    };
    let elapsed_days = algorithm::elapsed_days(&state, now);

    let next = schedule(config, &state, rating, now)?;

    let event = ReviewEvent {
        card_id,
        rating,
        review_date: now,
        scheduled_days,
        elapsed_days,
    };

    store.persist(&next).map_err(SessionError::Store)?;
    store
        .append_review_event(&event)
        .map_err(SessionError::Store)?;
    cache.invalidate(deck_id);

    log::debug!(
        "Review submitted for card {}: {:?}, next due {}",
        card_id,
        rating,
        next.due_date
    );
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LifecycleState;
    use chrono::Duration;
    use std::collections::HashMap;
    use std::convert::Infallible;
    use uuid::Uuid;

    /// In-memory stand-in for the storage collaborator.
    #[derive(Default)]
    struct MemoryStore {
        states: HashMap<CardId, CardMemoryState>,
        decks: HashMap<DeckId, Vec<CardId>>,
        events: Vec<ReviewEvent>,
    }

    impl MemoryStore {
        fn add_card(&mut self, deck_id: DeckId, now: DateTime<Utc>) -> CardId {
            let card_id = Uuid::new_v4();
            self.states
                .insert(card_id, CardMemoryState::new(card_id, now));
            self.decks.entry(deck_id).or_default().push(card_id);
            card_id
        }
    }

    impl ReviewStore for MemoryStore {
        type Error = Infallible;

        fn fetch_memory_state(&self, card_id: CardId) -> Result<CardMemoryState, Infallible> {
            Ok(self.states[&card_id].clone())
        }

        fn fetch_due_cards(
            &self,
            deck_id: DeckId,
            as_of: DateTime<Utc>,
        ) -> Result<Vec<CardId>, Infallible> {
            let mut due: Vec<&CardMemoryState> = self
                .decks
                .get(&deck_id)
                .map(|cards| {
                    cards
                        .iter()
                        .map(|id| &self.states[id])
                        .filter(|s| s.is_due(as_of))
                        .collect()
                })
                .unwrap_or_default();
            due.sort_by(|a, b| a.due_date.cmp(&b.due_date));
            Ok(due.into_iter().map(|s| s.card_id).collect())
        }

        fn fetch_deck_states(&self, deck_id: DeckId) -> Result<Vec<CardMemoryState>, Infallible> {
            Ok(self
                .decks
                .get(&deck_id)
                .map(|cards| cards.iter().map(|id| self.states[id].clone()).collect())
                .unwrap_or_default())
        }

        fn persist(&mut self, state: &CardMemoryState) -> Result<(), Infallible> {
            self.states.insert(state.card_id, state.clone());
            Ok(())
        }

        fn append_review_event(&mut self, event: &ReviewEvent) -> Result<(), Infallible> {
            self.events.push(event.clone());
            Ok(())
        }
    }

    fn config() -> SchedulerConfig {
        SchedulerConfig {
            fuzz: 0.0,
            ..SchedulerConfig::default()
        }
    }

    #[test]
    fn test_lifecycle_trajectory_good_good_again_good() {
        let t0 = Utc::now();
        let mut store = MemoryStore::default();
        let cache = StatisticsCache::default();
        let cfg = config();
        let deck = Uuid::new_v4();
        let card = store.add_card(deck, t0);

        let mut now = t0;
        let mut expected = vec![
            (Rating::Good, LifecycleState::Learning),
            (Rating::Good, LifecycleState::Review),
            (Rating::Again, LifecycleState::Relearning),
            (Rating::Good, LifecycleState::Review),
        ];

        let mut previous_due = None;
        let mut previous_interval = f32::INFINITY;
        for (step, (rating, want)) in expected.drain(..).enumerate() {
            let state =
                submit_review(&mut store, &cache, &cfg, deck, card, rating, now).unwrap();
            assert_eq!(state.lifecycle, want, "step {}", step);

            // Due dates strictly increase; the Again step resets the
            // interval to the nearest slot instead of growing it.
            if let Some(prev) = previous_due {
                assert!(state.due_date > prev, "step {}", step);
            }
            let interval = (state.due_date - now).num_seconds() as f32 / 86400.0;
            if rating == Rating::Again {
                assert!(interval < previous_interval, "Again must shrink the interval");
            }
            previous_interval = interval;
            previous_due = Some(state.due_date);

            // Review each card exactly when it comes due
            now = state.due_date;
        }

        // One append-only event per submission, in order
        assert_eq!(store.events.len(), 4);
        assert_eq!(store.events[2].rating, Rating::Again);
        assert!(store.events[0].elapsed_days == 0.0);
        assert!(store.events[1].elapsed_days > 0.0);
    }

    #[test]
    fn test_submit_review_invalidates_deck_statistics() {
        let t0 = Utc::now();
        let mut store = MemoryStore::default();
        let cache = StatisticsCache::default();
        let cfg = config();
        let deck = Uuid::new_v4();
        let card = store.add_card(deck, t0);

        let before = deck_statistics(&store, &cache, deck, t0).unwrap();
        assert_eq!(before.due_count, 1);
        assert!(cache.get(deck, t0).is_some());

        submit_review(&mut store, &cache, &cfg, deck, card, Rating::Good, t0).unwrap();
        assert!(cache.get(deck, t0).is_none());

        // Recompute sees the rescheduled card
        let after = deck_statistics(&store, &cache, deck, t0).unwrap();
        assert_eq!(after.due_count, 0);
        assert_eq!(after.learning_count, 1);
    }

    #[test]
    fn test_deck_statistics_served_from_cache_until_stale() {
        let t0 = Utc::now();
        let mut store = MemoryStore::default();
        let cache = StatisticsCache::default();
        let deck = Uuid::new_v4();
        store.add_card(deck, t0);

        let first = deck_statistics(&store, &cache, deck, t0).unwrap();

        // Mutate storage behind the cache's back: within the TTL the stale
        // snapshot is still served (callers must invalidate on writes).
        store.add_card(deck, t0);
        let cached = deck_statistics(&store, &cache, deck, t0 + Duration::seconds(1)).unwrap();
        assert_eq!(cached.total_count, first.total_count);

        // Past the TTL the cache misses and the recompute sees both cards
        let fresh = deck_statistics(&store, &cache, deck, t0 + Duration::seconds(10)).unwrap();
        assert_eq!(fresh.total_count, 2);
    }

    #[test]
    fn test_start_session_interleaves_decks() {
        let t0 = Utc::now();
        let mut store = MemoryStore::default();
        let cache = StatisticsCache::default();
        let deck_a = Uuid::new_v4();
        let deck_b = Uuid::new_v4();
        for _ in 0..4 {
            store.add_card(deck_a, t0 - Duration::hours(1));
        }
        for _ in 0..4 {
            store.add_card(deck_b, t0 - Duration::hours(1));
        }

        let session = start_session(
            &store,
            &cache,
            &[deck_a, deck_b],
            6,
            TieBreak::Deterministic,
            t0,
        )
        .unwrap();

        assert_eq!(session.len(), 6);
        let from_a = session.entries.iter().filter(|e| e.deck_id == deck_a).count();
        assert_eq!(from_a, 3);
        // The cache was warmed for both decks
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_start_session_with_empty_deck() {
        let t0 = Utc::now();
        let mut store = MemoryStore::default();
        let cache = StatisticsCache::default();
        let deck_a = Uuid::new_v4();
        let deck_b = Uuid::new_v4();
        let c1 = store.add_card(deck_a, t0 - Duration::hours(2));
        let c2 = store.add_card(deck_a, t0 - Duration::hours(1));
        store.decks.entry(deck_b).or_default();

        let session = start_session(
            &store,
            &cache,
            &[deck_a, deck_b],
            10,
            TieBreak::Deterministic,
            t0,
        )
        .unwrap();

        let got: Vec<CardId> = session.entries.iter().map(|e| e.card_id).collect();
        assert_eq!(got, vec![c1, c2]);
    }

    #[test]
    fn test_scheduled_days_recorded_for_reviewed_card() {
        let t0 = Utc::now();
        let mut store = MemoryStore::default();
        let cache = StatisticsCache::default();
        let cfg = config();
        let deck = Uuid::new_v4();
        let card = store.add_card(deck, t0);

        let state = submit_review(&mut store, &cache, &cfg, deck, card, Rating::Good, t0).unwrap();
        let due = state.due_date;

        submit_review(&mut store, &cache, &cfg, deck, card, Rating::Good, due).unwrap();
        let event = store.events.last().unwrap();

        let scheduled = (due - t0).num_seconds() as f32 / 86400.0;
        assert!((event.scheduled_days - scheduled).abs() < 1e-3);
        assert!((event.elapsed_days - scheduled).abs() < 1e-3);
    }
}

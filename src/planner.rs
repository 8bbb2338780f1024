//! Multi-deck session interleaving
//!
//! Builds one ordered study queue from several decks' due-card lists using
//! weighted fair queuing: at each slot the planner picks the deck whose
//! allocated-so-far / weight ratio is lowest, so a deck with twice the due
//! cards gets roughly twice the early representation without ever forming
//! long single-deck runs. Within a deck the incoming order (already sorted
//! by due-date urgency by the storage collaborator) is never changed.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::{CardId, DeckId, SessionEntry, StudySession};

/// How ratio ties between decks are resolved.
///
/// Deterministic mode breaks ties by ascending deck id, so identical inputs
/// always produce identical queues. Seeded mode draws from an explicit
/// session seed instead; a fixed seed still reproduces the same order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TieBreak {
    Deterministic,
    Seeded(u64),
}

/// Tolerance for comparing allocation ratios.
const RATIO_EPSILON: f32 = 1e-6;

struct Lane<'a> {
    deck_id: DeckId,
    cards: &'a [CardId],
    taken: usize,
    weight: f32,
}

/// Build an interleaved study queue, weighting each deck by its due count.
pub fn build_session(
    due_by_deck: &HashMap<DeckId, Vec<CardId>>,
    max_cards: usize,
    tie_break: TieBreak,
    now: DateTime<Utc>,
) -> StudySession {
    build_session_weighted(due_by_deck, &HashMap::new(), max_cards, tie_break, now)
}

/// Build an interleaved study queue with per-deck priority multipliers.
///
/// A deck's weight is its due count times its multiplier (default 1.0).
/// Decks with no due cards or a non-positive weight contribute nothing and
/// are skipped without error; `max_cards == 0` yields an empty session.
pub fn build_session_weighted(
    due_by_deck: &HashMap<DeckId, Vec<CardId>>,
    priorities: &HashMap<DeckId, f32>,
    max_cards: usize,
    tie_break: TieBreak,
    now: DateTime<Utc>,
) -> StudySession {
    let mut lanes: Vec<Lane> = due_by_deck
        .iter()
        .filter_map(|(&deck_id, cards)| {
            let multiplier = priorities.get(&deck_id).copied().unwrap_or(1.0);
            let weight = cards.len() as f32 * multiplier;
            if cards.is_empty() || weight <= 0.0 {
                return None;
            }
            Some(Lane {
                deck_id,
                cards,
                taken: 0,
                weight,
            })
        })
        .collect();

    // Stable lane order independent of HashMap iteration, and the
    // deterministic tie-break order.
    lanes.sort_by_key(|lane| lane.deck_id);

    let mut rng = match tie_break {
        TieBreak::Seeded(seed) => Some(StdRng::seed_from_u64(seed)),
        TieBreak::Deterministic => None,
    };

    let mut entries = Vec::new();
    while entries.len() < max_cards {
        let mut best_ratio = f32::INFINITY;
        let mut candidates: Vec<usize> = Vec::new();

        for (i, lane) in lanes.iter().enumerate() {
            if lane.taken >= lane.cards.len() {
                continue;
            }
            let ratio = lane.taken as f32 / lane.weight;
            if ratio < best_ratio - RATIO_EPSILON {
                best_ratio = ratio;
                candidates.clear();
                candidates.push(i);
            } else if (ratio - best_ratio).abs() <= RATIO_EPSILON {
                candidates.push(i);
            }
        }

        let Some(&first) = candidates.first() else {
            break; // all decks exhausted
        };

        let pick = match rng.as_mut() {
            Some(rng) if candidates.len() > 1 => candidates[rng.gen_range(0..candidates.len())],
            _ => first,
        };

        let lane = &mut lanes[pick];
        entries.push(SessionEntry {
            card_id: lane.cards[lane.taken],
            deck_id: lane.deck_id,
        });
        lane.taken += 1;
    }

    log::debug!(
        "Built study session: {} cards from {} decks",
        entries.len(),
        lanes.iter().filter(|l| l.taken > 0).count()
    );

    StudySession {
        entries,
        created_at: now,
    }
}

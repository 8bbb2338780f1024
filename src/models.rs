//! Data models for the scheduling core
//!
//! Everything here is plain data. Memory states are mutated only by the
//! scheduling engine in [`crate::algorithm`]; review events are append-only
//! and never touched again after creation. All timestamps are UTC and all
//! structs serialize with camelCase field names, which is the shape the
//! storage collaborator persists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a single flashcard.
pub type CardId = Uuid;

/// Identifier of a deck.
pub type DeckId = Uuid;

/// Coarse phase of a card's learning progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleState {
    /// Never reviewed
    New,
    /// In initial learning phase
    Learning,
    /// Regular spaced review
    Review,
    /// Failed and re-learning
    Relearning,
}

impl Default for LifecycleState {
    fn default() -> Self {
        Self::New
    }
}

/// User recall rating for a single review.
///
/// The numeric values (1-4) are the wire representation used by review
/// history records and by UI rating buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[repr(i32)]
pub enum Rating {
    /// Failed to recall
    Again = 1,
    /// Recalled with serious difficulty
    Hard = 2,
    /// Recalled with some hesitation
    Good = 3,
    /// Effortless recall
    Easy = 4,
}

impl Rating {
    /// All ratings in ascending order of recall quality.
    pub const ALL: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];

    /// Numeric value (1-4) used in persisted review records.
    pub fn value(self) -> i32 {
        self as i32
    }

    /// Parse a numeric rating value.
    ///
    /// Returns `InvalidRating` for anything outside 1-4.
    pub fn from_value(value: i32) -> Result<Self, crate::algorithm::SchedulerError> {
        match value {
            1 => Ok(Rating::Again),
            2 => Ok(Rating::Hard),
            3 => Ok(Rating::Good),
            4 => Ok(Rating::Easy),
            other => Err(crate::algorithm::SchedulerError::InvalidRating(other)),
        }
    }

    /// Whether this rating counts as a successful recall.
    pub fn is_success(self) -> bool {
        !matches!(self, Rating::Again)
    }
}

/// Current memory model for one card.
///
/// Owned by the scheduling engine: the storage collaborator persists and
/// returns these records verbatim but never edits the fields itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardMemoryState {
    pub card_id: CardId,
    /// Days until recall probability decays to the 90% reference threshold.
    /// Strictly positive once the card has been reviewed.
    #[serde(default)]
    pub stability: f32,
    /// Intrinsic item difficulty, bounded to [1, 10].
    #[serde(default)]
    pub difficulty: f32,
    /// Estimated recall probability at the last scheduling computation.
    #[serde(default)]
    pub retrievability: f32,
    /// When the card next becomes eligible for review.
    pub due_date: DateTime<Utc>,
    /// Current lifecycle phase.
    #[serde(default)]
    pub lifecycle: LifecycleState,
    /// Timestamp of the most recent review, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_review: Option<DateTime<Utc>>,
    /// Total number of reviews submitted for this card.
    #[serde(default)]
    pub reps: u32,
    /// Number of failed (`Again`) reviews.
    #[serde(default)]
    pub lapses: u32,
}

impl CardMemoryState {
    /// Fresh state for a card that has never been reviewed, due immediately.
    pub fn new(card_id: CardId, now: DateTime<Utc>) -> Self {
        Self {
            card_id,
            stability: 0.0,
            difficulty: 0.0,
            retrievability: 0.0,
            due_date: now,
            lifecycle: LifecycleState::New,
            last_review: None,
            reps: 0,
            lapses: 0,
        }
    }

    /// Check whether the card is due for review at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.due_date
    }
}

/// A record of a single review attempt.
///
/// Created exactly once per submitted rating; forms the audit trail consumed
/// by statistics but not by the scheduling engine itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewEvent {
    pub card_id: CardId,
    pub rating: Rating,
    /// When the review occurred.
    pub review_date: DateTime<Utc>,
    /// Interval (days) that was scheduled before this review.
    pub scheduled_days: f32,
    /// Actual elapsed days since the previous review.
    pub elapsed_days: f32,
}

/// UI-facing mastery category derived from stability and lifecycle state.
///
/// Ordinal: `Beginner < Intermediate < Advanced < Mastered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MasteryLevel {
    Beginner,
    Intermediate,
    Advanced,
    Mastered,
}

impl MasteryLevel {
    pub fn label(&self) -> &'static str {
        match self {
            MasteryLevel::Beginner => "Beginner",
            MasteryLevel::Intermediate => "Intermediate",
            MasteryLevel::Advanced => "Advanced",
            MasteryLevel::Mastered => "Mastered",
        }
    }
}

/// Aggregate statistics for one deck at a point in time.
///
/// Cached by [`crate::stats::StatisticsCache`]; replaced wholesale on
/// refresh, discarded on invalidation or TTL expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckStatisticsSnapshot {
    pub deck_id: DeckId,
    pub due_count: usize,
    pub total_count: usize,
    pub new_count: usize,
    pub learning_count: usize,
    pub review_count: usize,
    /// Mean stability over reviewed cards, 0.0 if none.
    pub average_stability: f32,
    /// Mean difficulty over reviewed cards, 0.0 if none.
    pub average_difficulty: f32,
    /// When this snapshot was computed.
    pub computed_at: DateTime<Utc>,
}

/// One slot in a study session queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntry {
    pub card_id: CardId,
    pub deck_id: DeckId,
}

/// An ordered multi-deck study queue, consumed once by the UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudySession {
    pub entries: Vec<SessionEntry>,
    pub created_at: DateTime<Utc>,
}

impl StudySession {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! FSRS-style spaced repetition scheduling
//!
//! The engine is a pure function from `(state, rating, now)` to the next
//! memory state. Stability and difficulty are updated from the previous
//! state using a parametrized memory model:
//!
//! - first review initializes both from fixed per-rating tables
//! - successful recall grows stability multiplicatively, with a larger
//!   boost the lower the retrievability was at review time (the spacing
//!   effect)
//! - a lapse shrinks stability based on difficulty and retrievability
//!
//! Retrievability decays as `0.9^(elapsed / stability)`, so a card is at
//! exactly 90% recall probability when reviewed right on schedule.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{CardId, CardMemoryState, LifecycleState, Rating};

/// Stability floor; stability must never reach zero.
const MIN_STABILITY: f32 = 0.01;

/// Shortest interval the engine will schedule (10 minutes, in days).
const MIN_INTERVAL_DAYS: f32 = 10.0 / 1440.0;

/// Retention level that defines the stability unit: a card reviewed after
/// exactly `stability` days has 90% recall probability.
const REFERENCE_RETENTION: f32 = 0.9;

/// Initial stability (days) by first rating: Again, Hard, Good, Easy.
const INITIAL_STABILITY: [f32; 4] = [0.5, 1.2, 2.5, 5.8];

/// Initial difficulty by first rating: Again, Hard, Good, Easy.
const INITIAL_DIFFICULTY: [f32; 4] = [7.5, 6.5, 5.0, 3.5];

/// Scale of the stability boost on successful recall.
const STABILITY_GROWTH: f32 = 8.0;

/// Base fraction of stability retained after a lapse.
const LAPSE_RETENTION: f32 = 0.5;

/// Per-update pull of difficulty back toward the neutral midpoint.
const DIFFICULTY_MEAN_REVERSION: f32 = 0.05;

const NEUTRAL_DIFFICULTY: f32 = 5.0;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Invalid rating value: {0} (expected 1-4)")]
    InvalidRating(i32),

    #[error("Invalid memory state: {0}")]
    InvalidState(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Tunable scheduling policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerConfig {
    /// Target recall probability at the scheduled review time.
    #[serde(default = "default_desired_retention")]
    pub desired_retention: f32,
    /// Due-date fuzz as a fraction of the interval (0 disables).
    #[serde(default = "default_fuzz")]
    pub fuzz: f32,
    /// An `Easy` answer on a new card graduates it straight to `Review`.
    #[serde(default = "default_graduate_easy")]
    pub graduate_easy: bool,
    /// Hard cap on scheduled intervals, in days.
    #[serde(default = "default_maximum_interval_days")]
    pub maximum_interval_days: f32,
}

fn default_desired_retention() -> f32 {
    0.9
}

fn default_fuzz() -> f32 {
    0.05
}

fn default_graduate_easy() -> bool {
    true
}

fn default_maximum_interval_days() -> f32 {
    36500.0
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            desired_retention: default_desired_retention(),
            fuzz: default_fuzz(),
            graduate_easy: default_graduate_easy(),
            maximum_interval_days: default_maximum_interval_days(),
        }
    }
}

/// Estimated recall probability after `elapsed_days` for a card with the
/// given stability. 1.0 immediately after review, 0.9 at `elapsed ==
/// stability`, decaying exponentially beyond.
pub fn retrievability(elapsed_days: f32, stability: f32) -> f32 {
    if stability < MIN_STABILITY {
        return 0.0;
    }
    REFERENCE_RETENTION
        .powf(elapsed_days.max(0.0) / stability)
        .clamp(0.0, 1.0)
}

/// Compute the next memory state for a card given a recall rating.
///
/// Pure and total over valid input: no I/O, no ambient clock, no hidden
/// randomness (due-date fuzz is seeded from the card id and review count).
/// Early review (`now` before the scheduled due date) is allowed and shows
/// up as a small elapsed time, hence a retrievability near 1.
pub fn schedule(
    config: &SchedulerConfig,
    state: &CardMemoryState,
    rating: Rating,
    now: DateTime<Utc>,
) -> Result<CardMemoryState> {
    validate_state(state)?;

    let mut next = state.clone();

    if state.lifecycle == LifecycleState::New {
        let idx = rating.value() as usize - 1;
        next.stability = INITIAL_STABILITY[idx];
        next.difficulty = clamp_difficulty(INITIAL_DIFFICULTY[idx]);
        next.retrievability = 1.0;
        next.lifecycle = if rating == Rating::Easy && config.graduate_easy {
            LifecycleState::Review
        } else {
            LifecycleState::Learning
        };
        if rating == Rating::Again {
            next.lapses += 1;
        }
    } else {
        let elapsed = elapsed_days(state, now);
        let r = retrievability(elapsed, state.stability);
        next.retrievability = r;

        if rating.is_success() {
            next.stability = grow_stability(state.stability, state.difficulty, r, rating);
            next.lifecycle = LifecycleState::Review;
        } else {
            next.stability = lapse_stability(state.stability, state.difficulty, r);
            next.lifecycle = LifecycleState::Relearning;
            next.lapses += 1;
        }
        next.difficulty = next_difficulty(state.difficulty, rating);
    }

    next.stability = next.stability.max(MIN_STABILITY);
    next.reps = state.reps.saturating_add(1);
    next.last_review = Some(now);

    let interval = interval_for_stability(config, next.stability);
    let interval = apply_fuzz(config, state.card_id, state.reps, interval);
    next.due_date = now + Duration::seconds((interval * 86400.0) as i64);

    Ok(next)
}

/// Would-be intervals in days for each rating `[Again, Hard, Good, Easy]`,
/// from the same prior state. Used by UIs to label the rating buttons.
pub fn preview_intervals(
    config: &SchedulerConfig,
    state: &CardMemoryState,
    now: DateTime<Utc>,
) -> Result<[f32; 4]> {
    let mut intervals = [0.0; 4];
    for (i, rating) in Rating::ALL.iter().enumerate() {
        let next = schedule(config, state, *rating, now)?;
        intervals[i] = (next.due_date - now).num_seconds() as f32 / 86400.0;
    }
    Ok(intervals)
}

/// Actual elapsed days since the last review, clamped at zero.
pub(crate) fn elapsed_days(state: &CardMemoryState, now: DateTime<Utc>) -> f32 {
    match state.last_review {
        Some(last) => ((now - last).num_seconds() as f32 / 86400.0).max(0.0),
        None => 0.0,
    }
}

/// Reject states that violate the engine's entry invariants. The engine is
/// the sole mutator of memory state, so a failure here is a defect in the
/// surrounding system, not something to repair silently.
fn validate_state(state: &CardMemoryState) -> Result<()> {
    if state.lifecycle == LifecycleState::New {
        if state.last_review.is_some() {
            return Err(SchedulerError::InvalidState(
                "new card has a prior review".to_string(),
            ));
        }
        return Ok(());
    }

    if !state.stability.is_finite() || state.stability <= 0.0 {
        return Err(SchedulerError::InvalidState(format!(
            "stability {} out of range (must be > 0)",
            state.stability
        )));
    }
    if !state.difficulty.is_finite() || !(1.0..=10.0).contains(&state.difficulty) {
        return Err(SchedulerError::InvalidState(format!(
            "difficulty {} out of range [1, 10]",
            state.difficulty
        )));
    }
    if state.last_review.is_none() {
        return Err(SchedulerError::InvalidState(
            "reviewed card is missing its last review date".to_string(),
        ));
    }
    Ok(())
}

fn clamp_difficulty(difficulty: f32) -> f32 {
    difficulty.clamp(1.0, 10.0)
}

/// Stability after a successful recall. The `exp(1 - r) - 1` term is the
/// spacing effect: recall at low retrievability earns a larger boost.
fn grow_stability(stability: f32, difficulty: f32, r: f32, rating: Rating) -> f32 {
    let rating_modifier = match rating {
        Rating::Hard => 0.6,
        Rating::Good => 1.0,
        Rating::Easy => 1.5,
        // A lapse never reaches this path
        Rating::Again => 0.0,
    };

    let ease = (11.0 - difficulty) / 10.0;
    let saturation = stability.powf(-0.1);
    let spacing = ((1.0 - r).exp() - 1.0).max(0.0);

    stability * (1.0 + STABILITY_GROWTH * ease * saturation * spacing * rating_modifier)
}

/// Stability after a lapse: harder cards and lower retrievability at the
/// time of forgetting both shrink the remainder.
fn lapse_stability(stability: f32, difficulty: f32, r: f32) -> f32 {
    let ease = (11.0 - difficulty) / 10.0;
    (stability * LAPSE_RETENTION * ease * r.powf(0.4)).max(MIN_STABILITY)
}

/// Difficulty step per rating with mean reversion toward the midpoint,
/// clamped to [1, 10] on every update.
fn next_difficulty(difficulty: f32, rating: Rating) -> f32 {
    let step = match rating {
        Rating::Again => 1.2,
        Rating::Hard => 0.6,
        Rating::Good => 0.0,
        Rating::Easy => -0.8,
    };
    let stepped = difficulty + step;
    let reverted = stepped + DIFFICULTY_MEAN_REVERSION * (NEUTRAL_DIFFICULTY - stepped);
    clamp_difficulty(reverted)
}

/// Interval in days for a stability at the configured retention target.
/// Identity at the 0.9 reference retention: the interval equals stability.
fn interval_for_stability(config: &SchedulerConfig, stability: f32) -> f32 {
    let retention = config.desired_retention.clamp(0.5, 0.995);
    let interval = stability * retention.ln() / REFERENCE_RETENTION.ln();
    interval.clamp(MIN_INTERVAL_DAYS, config.maximum_interval_days)
}

/// Deterministic due-date fuzz, seeded per (card, review count) so repeat
/// runs reproduce the same date and sibling cards spread apart instead of
/// clumping. Sub-day intervals are left exact.
fn apply_fuzz(config: &SchedulerConfig, card_id: CardId, reps: u32, interval: f32) -> f32 {
    if config.fuzz <= 0.0 || interval < 1.0 {
        return interval;
    }

    let mut hasher = DefaultHasher::new();
    card_id.hash(&mut hasher);
    reps.hash(&mut hasher);
    let mut rng = StdRng::seed_from_u64(hasher.finish());

    let factor = rng.gen_range(1.0 - config.fuzz..=1.0 + config.fuzz);
    (interval * factor).clamp(MIN_INTERVAL_DAYS, config.maximum_interval_days)
}

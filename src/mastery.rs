//! Mastery classification
//!
//! Maps a card's stability and lifecycle state to the 4-level ordinal used
//! for UI badges and deck filters. The stability cutoffs are policy
//! constants, not derived values.

use serde::{Deserialize, Serialize};

use crate::models::{LifecycleState, MasteryLevel};

/// Stability cutoffs (days) between mastery levels.
///
/// Defaults: below 3 days Beginner, 3-14 Intermediate, 14-30 Advanced,
/// 30 and up Mastered. Each boundary belongs to the higher level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryThresholds {
    pub intermediate: f32,
    pub advanced: f32,
    pub mastered: f32,
}

impl Default for MasteryThresholds {
    fn default() -> Self {
        Self {
            intermediate: 3.0,
            advanced: 14.0,
            mastered: 30.0,
        }
    }
}

impl MasteryThresholds {
    pub fn new(intermediate: f32, advanced: f32, mastered: f32) -> Self {
        debug_assert!(
            intermediate < advanced && advanced < mastered,
            "mastery thresholds must be strictly ascending"
        );
        Self {
            intermediate,
            advanced,
            mastered,
        }
    }
}

/// Classify a card's mastery.
///
/// A card not in regular review (new, learning, or relearning) is always
/// `Beginner` regardless of stability; otherwise the level is bucketed by
/// stability against the thresholds.
pub fn classify(
    thresholds: &MasteryThresholds,
    stability: f32,
    lifecycle: LifecycleState,
) -> MasteryLevel {
    if lifecycle != LifecycleState::Review {
        return MasteryLevel::Beginner;
    }

    if stability >= thresholds.mastered {
        MasteryLevel::Mastered
    } else if stability >= thresholds.advanced {
        MasteryLevel::Advanced
    } else if stability >= thresholds.intermediate {
        MasteryLevel::Intermediate
    } else {
        MasteryLevel::Beginner
    }
}

//! Spaced repetition scheduling core for vocabulary flashcards
//!
//! This crate is the scheduling heart of a multi-deck vocabulary trainer:
//! - FSRS-style per-card scheduling ([`algorithm`])
//! - mastery classification for UI badges and filters ([`mastery`])
//! - a TTL cache for deck-level aggregate statistics ([`stats`])
//! - fair interleaving of several decks into one study queue ([`planner`])
//! - the orchestration seam callers drive, with storage behind the
//!   [`session::ReviewStore`] trait ([`session`])
//!
//! Persistence, rendering, and speech synthesis live outside this crate;
//! the core exchanges plain in-memory records with its collaborators.
//! Every API takes an explicit `now` so nothing depends on an ambient
//! clock, and all randomness (due-date fuzz, shuffled tie-breaks) is
//! seeded explicitly.

pub mod algorithm;
pub mod mastery;
pub mod models;
pub mod planner;
pub mod session;
pub mod stats;

pub use algorithm::{preview_intervals, retrievability, schedule, SchedulerConfig, SchedulerError};
pub use mastery::{classify, MasteryThresholds};
pub use models::*;
pub use planner::{build_session, build_session_weighted, TieBreak};
pub use session::{deck_statistics, start_session, submit_review, ReviewStore, SessionError};
pub use stats::{StatisticsCache, DEFAULT_TTL_SECONDS};

//! Session orchestration.
//!
//! The [`Coach`] ties the stores to the memory model and the allocator:
//! previewing and starting sessions, recording graded exercises, closing
//! sessions, and reporting learner progress.

mod main;
mod progress;
mod stats;
mod types;

pub use main::Coach;
pub use progress::{exercise_feedback, session_progress};
pub use stats::{learner_stats, promotions};
pub use types::{
    ExerciseOutcome, ExerciseRecord, ItemUpdate, LearnerStats, Promotion, SessionProgress,
    SessionStart, SessionSummary,
};

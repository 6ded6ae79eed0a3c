//! Cognitive modules.
//!
//! Memory-decay scheduling and mastery classification.

mod mastery;
mod scheduler;

pub use mastery::{balance_status, classify, MasteryClassifier};
pub use scheduler::{MemoryModel, ReviewOutcome};

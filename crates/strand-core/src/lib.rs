//! strand-core - Core library for strand.
//!
//! Schedules reviews of learning items with a memory-decay model and plans
//! time-boxed practice sessions that keep four learning strands in balance.
//!
//! # Example
//!
//! ```ignore
//! use strand_core::{Coach, ExerciseRecord, LearnerProfile, CefrLevel, StrandConfig};
//!
//! let coach = Coach::open(StrandConfig::from_env())?;
//! let profile = LearnerProfile::new("ana", CefrLevel::A2);
//!
//! // Plan and start a 20 minute session
//! let session = coach.start_session(&profile, 20.0, None, chrono::Utc::now())?;
//!
//! // Record a graded exercise
//! let outcome = coach.record_exercise(record, chrono::Utc::now())?;
//! ```

pub mod balance;
pub mod coach;
pub mod cognitive;
pub mod config;
pub mod error;
pub mod planner;
pub mod store;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use balance::{compute_balance, compute_weights, preference_from_goal};
pub use coach::{Coach, ExerciseOutcome, ExerciseRecord, LearnerStats, SessionStart, SessionSummary};
pub use cognitive::{classify, MasteryClassifier, MemoryModel, ReviewOutcome};
pub use config::StrandConfig;
pub use error::{ErrorCode, StrandError, StrandResult};
pub use planner::{CandidateCatalogue, SessionAllocator};
pub use store::{InMemoryCatalogue, InMemoryItemStore, SqliteCatalogueStore, SqliteItemStore};
pub use traits::{CatalogueStore, ItemStore, SessionRepository};
pub use types::{
    BalanceStatus, CatalogueNode, CefrLevel, Exercise, Item, LearnerProfile, MasteryStatus,
    PracticeLogEntry, Quality, ReviewEvent, SessionPlan, Skill, Strand, StrandBalance,
    StrandPreference, StrandWeights,
};

//! Request and result types for session orchestration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{
    BalanceStatus, CefrLevel, ExerciseType, MasteryStatus, SessionPlan, Skill, Strand,
    StrandBalance,
};

/// A started session: its id plus the plan it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStart {
    pub session_id: String,
    pub plan: SessionPlan,
    pub guidance: String,
}

/// One completed, graded exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseRecord {
    pub session_id: String,
    /// Tracked item, if any. Item-less activities are only logged.
    #[serde(default)]
    pub item_id: Option<String>,
    pub node_id: String,
    pub strand: Strand,
    #[serde(default)]
    pub skill: Skill,
    #[serde(default)]
    pub exercise_type: Option<ExerciseType>,
    /// Grade from the external grader, 0-5.
    pub quality: i64,
    pub duration_seconds: f64,
    #[serde(default)]
    pub response_text: String,
}

/// Memory-model result for the exercised item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemUpdate {
    pub item_id: String,
    pub next_due_at: DateTime<Utc>,
    pub stability: f64,
    pub difficulty: f64,
    pub retrievability: f64,
    pub mastery_status: MasteryStatus,
    pub mastery_changed: bool,
}

/// Session progress, rebuilt from the logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionProgress {
    pub completed: usize,
    pub planned: usize,
    pub graded: usize,
    pub quality_sum: u32,
    pub mastery_changes: usize,
}

impl SessionProgress {
    pub fn average_quality(&self) -> Option<f64> {
        (self.graded > 0).then(|| self.quality_sum as f64 / self.graded as f64)
    }
}

impl fmt::Display for SessionProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.completed, self.planned.max(self.completed))
    }
}

/// Result of recording an exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseOutcome {
    pub session_id: String,
    pub quality: u8,
    /// Absent for item-less activities.
    pub item: Option<ItemUpdate>,
    pub balance: StrandBalance,
    pub progress: SessionProgress,
    pub feedback: String,
}

/// Closing summary of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub learner_id: String,
    pub exercises_completed: usize,
    pub target_minutes: f64,
    pub actual_minutes: f64,
    pub average_quality: Option<f64>,
    pub mastery_changes: usize,
    pub final_balance: StrandBalance,
    pub balance_status: BalanceStatus,
    pub notes: String,
}

/// A secure-level promotion for one skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promotion {
    pub skill: Skill,
    pub from: CefrLevel,
    pub to: CefrLevel,
}

/// Aggregate counters over a learner's items and reviews.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearnerStats {
    pub total_items: usize,
    /// Reviewed items whose next review time has passed.
    pub due_count: usize,
    pub new_count: usize,
    pub learning_count: usize,
    pub mastered_count: usize,
    pub average_difficulty: f64,
    pub reviews_today: usize,
    /// Consecutive UTC days with at least one review, ending today or yesterday.
    pub streak_days: u32,
}

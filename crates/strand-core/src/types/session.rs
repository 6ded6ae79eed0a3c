//! Persisted session state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::balance::BalanceStatus;
use super::plan::Exercise;
use super::strand::StrandPreference;

/// What a running session needs to survive a process restart.
///
/// Progress is not stored here; it is rebuilt from the practice and review
/// logs whenever it is needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub learner_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub target_minutes: f64,
    pub planned: Vec<Exercise>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preference: Option<StrandPreference>,
    pub balance_status: BalanceStatus,
    #[serde(default)]
    pub notes: String,
}

impl SessionRecord {
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}

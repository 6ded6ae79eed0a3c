//! Item state, review events and the per-strand practice log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use super::strand::{ExerciseType, Skill, Strand};
use crate::error::{StrandError, StrandResult};

/// Quality of one answer on the 0-5 scale, as judged by an external grader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Quality(u8);

impl Quality {
    /// Lowest passing grade.
    pub const PASS: u8 = 3;

    /// Validate a raw grade.
    pub fn new(value: i64) -> StrandResult<Self> {
        if (0..=5).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(StrandError::InvalidQuality { value })
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64
    }

    /// Whether the answer counts as a successful recall (quality >= 3).
    pub fn is_success(&self) -> bool {
        self.0 >= Self::PASS
    }
}

impl TryFrom<i64> for Quality {
    type Error = StrandError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quality> for i64 {
    fn from(q: Quality) -> Self {
        q.0 as i64
    }
}

/// Mastery label assigned by the classifier.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MasteryStatus {
    #[default]
    New,
    Learning,
    Mastered,
}

/// One practiced unit of knowledge.
///
/// `reps == 0` exactly when `last_reviewed_at` is unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub item_id: String,
    /// Catalogue entry this item belongs to; many items may share a node.
    pub node_id: String,
    pub strand: Strand,
    pub skill: Skill,
    /// Days until recall probability decays to 90%.
    pub stability: f64,
    /// Intrinsic hardness, 1-10.
    pub difficulty: f64,
    pub reps: u32,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    /// Next due time computed at the last review.
    pub due_at: Option<DateTime<Utc>>,
    pub mastery_status: MasteryStatus,
}

impl Item {
    /// Base difficulty for an item that has never been scored.
    pub const INITIAL_DIFFICULTY: f64 = 5.0;

    /// Create a never-reviewed item.
    pub fn new(
        item_id: impl Into<String>,
        node_id: impl Into<String>,
        strand: Strand,
        skill: Skill,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            node_id: node_id.into(),
            strand,
            skill,
            stability: 0.0,
            difficulty: Self::INITIAL_DIFFICULTY,
            reps: 0,
            last_reviewed_at: None,
            due_at: None,
            mastery_status: MasteryStatus::New,
        }
    }

    pub fn is_new(&self) -> bool {
        self.reps == 0
    }

    /// Whether the item should be reviewed at `now`.
    ///
    /// Never-reviewed items are always due. Without a stored due time, the
    /// item is due once the elapsed days reach its stability.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match (self.due_at, self.last_reviewed_at) {
            (_, None) => true,
            (Some(due), _) => due <= now,
            (None, Some(last)) => {
                let elapsed = now.signed_duration_since(last).num_seconds() as f64 / 86_400.0;
                elapsed >= self.stability
            }
        }
    }
}

/// Immutable record of one scoring action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewEvent {
    pub item_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub quality: Quality,
    pub reviewed_at: DateTime<Utc>,
    pub strand: Strand,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exercise_type: Option<ExerciseType>,
    pub stability_before: f64,
    pub stability_after: f64,
    pub difficulty_before: f64,
    pub difficulty_after: f64,
    pub mastery_before: MasteryStatus,
    pub mastery_after: MasteryStatus,
}

/// Strand-specific detail attached to a practice log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strand", rename_all = "snake_case")]
pub enum StrandDetail {
    MeaningInput {
        understood_key_points: bool,
    },
    MeaningOutput {
        communication_successful: bool,
    },
    LanguageFocused,
    Fluency {
        output_word_count: u32,
        words_per_minute: f64,
        smooth: bool,
    },
}

impl StrandDetail {
    /// Derive the detail for one graded exercise.
    ///
    /// Fluency speed is measured from the response text over the exercise
    /// duration; a response counts as smooth at quality 4 or above.
    pub fn for_exercise(
        strand: Strand,
        quality: Quality,
        response_text: &str,
        duration_seconds: f64,
    ) -> Self {
        match strand {
            Strand::MeaningInput => StrandDetail::MeaningInput {
                understood_key_points: quality.is_success(),
            },
            Strand::MeaningOutput => StrandDetail::MeaningOutput {
                communication_successful: quality.is_success(),
            },
            Strand::LanguageFocused => StrandDetail::LanguageFocused,
            Strand::Fluency => {
                let words = response_text.split_whitespace().count() as u32;
                let words_per_minute = if duration_seconds > 0.0 {
                    words as f64 / duration_seconds * 60.0
                } else {
                    0.0
                };
                StrandDetail::Fluency {
                    output_word_count: words,
                    words_per_minute,
                    smooth: quality.value() >= 4,
                }
            }
        }
    }
}

/// One entry of the per-strand time log used to compute balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeLogEntry {
    pub learner_id: String,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    pub node_id: String,
    pub strand: Strand,
    pub practiced_at: DateTime<Utc>,
    pub duration_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<Quality>,
    pub detail: StrandDetail,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_quality_bounds() {
        assert!(Quality::new(0).is_ok());
        assert!(Quality::new(5).is_ok());
        assert!(matches!(
            Quality::new(6),
            Err(StrandError::InvalidQuality { value: 6 })
        ));
        assert!(Quality::new(-1).is_err());
        assert!(Quality::new(3).unwrap().is_success());
        assert!(!Quality::new(2).unwrap().is_success());
    }

    #[test]
    fn test_quality_deserialize_rejects_out_of_range() {
        let q: Quality = serde_json::from_str("4").unwrap();
        assert_eq!(q.value(), 4);
        assert!(serde_json::from_str::<Quality>("9").is_err());
    }

    #[test]
    fn test_new_item_defaults() {
        let item = Item::new("it-1", "node-1", Strand::LanguageFocused, Skill::Reading);
        assert_eq!(item.stability, 0.0);
        assert_eq!(item.difficulty, 5.0);
        assert_eq!(item.reps, 0);
        assert!(item.last_reviewed_at.is_none());
        assert_eq!(item.mastery_status, MasteryStatus::New);
        assert!(item.is_due(Utc::now()));
    }

    #[test]
    fn test_is_due_without_stored_due_time() {
        let now = Utc::now();
        let mut item = Item::new("it-1", "node-1", Strand::MeaningOutput, Skill::Speaking);
        item.reps = 1;
        item.stability = 3.0;
        item.last_reviewed_at = Some(now - Duration::days(2));
        assert!(!item.is_due(now));
        item.last_reviewed_at = Some(now - Duration::days(4));
        assert!(item.is_due(now));
    }

    #[test]
    fn test_fluency_detail() {
        let q = Quality::new(4).unwrap();
        let detail = StrandDetail::for_exercise(Strand::Fluency, q, "one two three four", 30.0);
        assert_eq!(
            detail,
            StrandDetail::Fluency {
                output_word_count: 4,
                words_per_minute: 8.0,
                smooth: true,
            }
        );

        let low = Quality::new(3).unwrap();
        match StrandDetail::for_exercise(Strand::Fluency, low, "", 0.0) {
            StrandDetail::Fluency {
                words_per_minute,
                smooth,
                ..
            } => {
                assert_eq!(words_per_minute, 0.0);
                assert!(!smooth);
            }
            other => panic!("unexpected detail {other:?}"),
        }
    }
}

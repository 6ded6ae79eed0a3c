//! Item and history storage trait.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StrandResult;
use crate::types::{Item, PracticeLogEntry, Quality, ReviewEvent};

/// Rolling average of an item's review qualities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityAverage {
    pub mean: f64,
    pub count: u32,
}

impl QualityAverage {
    /// Average after adding one more review.
    pub fn including(&self, quality: Quality) -> QualityAverage {
        let count = self.count + 1;
        let mean = (self.mean * self.count as f64 + quality.as_f64()) / count as f64;
        QualityAverage { mean, count }
    }
}

/// All writes for one scored exercise, applied together or not at all.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewCommit {
    /// Item state after the review.
    pub item: Item,
    /// `reps` the writer read before computing the update. The commit fails
    /// if the stored item no longer has this value.
    pub expected_reps: u32,
    /// The item did not exist when read and must be inserted.
    pub create: bool,
    pub event: ReviewEvent,
    pub log_entry: PracticeLogEntry,
}

/// Persistence for items, the append-only review log and the practice log.
#[cfg_attr(test, mockall::automock)]
pub trait ItemStore: Send + Sync {
    /// Get an item by id.
    fn get_item(&self, item_id: &str) -> StrandResult<Option<Item>>;

    /// Insert a never-reviewed item. Fails if the id already exists.
    fn insert_item(&self, item: &Item) -> StrandResult<()>;

    /// All items, ordered by id.
    fn all_items(&self) -> StrandResult<Vec<Item>>;

    /// Items due at `now`, oldest review first; never-reviewed items lead.
    fn due_items(&self, now: DateTime<Utc>, limit: usize) -> StrandResult<Vec<Item>>;

    /// Average quality over an item's review history.
    fn average_quality(&self, item_id: &str) -> StrandResult<QualityAverage>;

    /// Review events for one item, oldest first.
    fn review_history(&self, item_id: &str) -> StrandResult<Vec<ReviewEvent>>;

    /// Review events at or after `since` (all when `None`), oldest first.
    fn reviews_since(&self, since: Option<DateTime<Utc>>) -> StrandResult<Vec<ReviewEvent>>;

    /// A learner's practice log at or after `since` (all when `None`), oldest first.
    fn practice_log(
        &self,
        learner_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> StrandResult<Vec<PracticeLogEntry>>;

    /// Practice log entries written for one session.
    fn session_log(&self, session_id: &str) -> StrandResult<Vec<PracticeLogEntry>>;

    /// Review events written for one session.
    fn session_reviews(&self, session_id: &str) -> StrandResult<Vec<ReviewEvent>>;

    /// Apply item update, review event and practice-log entry atomically.
    ///
    /// Any failure rolls back every write and surfaces as
    /// `StorageTransactionFailed`.
    fn commit_review(&self, commit: &ReviewCommit) -> StrandResult<()>;

    /// Append a log entry for an activity with no tracked item.
    fn log_practice(&self, entry: &PracticeLogEntry) -> StrandResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_average_including() {
        let avg = QualityAverage::default().including(Quality::new(4).unwrap());
        assert_eq!(avg, QualityAverage { mean: 4.0, count: 1 });
        let avg = avg.including(Quality::new(1).unwrap());
        assert_eq!(avg.count, 2);
        assert!((avg.mean - 2.5).abs() < 1e-12);
    }
}

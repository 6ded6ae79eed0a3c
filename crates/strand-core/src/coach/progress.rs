//! Session progress and exercise feedback.

use std::collections::HashSet;

use super::types::SessionProgress;
use crate::config::BalanceConfig;
use crate::types::{
    MasteryStatus, PracticeLogEntry, Quality, ReviewEvent, SessionRecord, StrandBalance,
};

/// Rebuild a session's progress from its log entries and review events.
///
/// Every log entry is one completed exercise; graded entries contribute to
/// the quality average. A mastery change is counted once per reviewed item
/// whose status differs between the first and last review of the session.
pub fn session_progress(
    record: &SessionRecord,
    log: &[PracticeLogEntry],
    reviews: &[ReviewEvent],
) -> SessionProgress {
    let graded: Vec<Quality> = log.iter().filter_map(|e| e.quality).collect();

    let mut seen = HashSet::new();
    let mastery_changes = reviews
        .iter()
        .filter(|r| seen.insert(r.item_id.as_str()))
        .filter(|first| {
            let last = reviews
                .iter()
                .rev()
                .find(|r| r.item_id == first.item_id)
                .unwrap_or(first);
            first.mastery_before != last.mastery_after
        })
        .count();

    SessionProgress {
        completed: log.len(),
        planned: record.planned.len(),
        graded: graded.len(),
        quality_sum: graded.iter().map(|q| u32::from(q.value())).sum(),
        mastery_changes,
    }
}

/// Short feedback line for one exercise, parts joined by ` | `.
pub fn exercise_feedback(
    quality: Quality,
    item: Option<(f64, MasteryStatus, bool)>,
    balance: &StrandBalance,
    config: &BalanceConfig,
) -> String {
    let mut parts: Vec<String> = Vec::new();

    parts.push(
        match quality.value() {
            4..=5 => "Strong performance!",
            3 => "Good effort.",
            _ => "Keep practicing.",
        }
        .to_string(),
    );

    if let Some((stability, status, changed)) = item {
        parts.push(format!("Stability: {:.1} days", stability));
        if changed {
            parts.push(format!("Status changed to: {}", status));
        } else {
            parts.push(format!("Status: {}", status));
        }
    }

    if balance.max_deviation(config.target_share) > config.severe_threshold {
        parts.push("Strand balance needs attention".to_string());
    }

    parts.join(" | ")
}

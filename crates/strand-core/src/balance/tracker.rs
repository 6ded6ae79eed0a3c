//! Aggregation of logged practice time into a strand distribution.

use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};

use crate::types::{LookbackWindow, PracticeLogEntry, Strand, StrandBalance};

/// Earliest timestamp a day-based window can include, for store queries.
///
/// Session-based windows cannot be bounded by time, so they return `None`.
pub fn window_start(window: LookbackWindow, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match window {
        LookbackWindow::Days(days) => Some(now - Duration::days(i64::from(days))),
        LookbackWindow::Sessions(_) => None,
    }
}

/// Sum practice seconds per strand over the lookback window.
///
/// With nothing logged in the window every strand reads 0.25. Entries with
/// negative or non-finite durations are skipped.
pub fn compute_balance(
    history: &[PracticeLogEntry],
    window: LookbackWindow,
    now: DateTime<Utc>,
) -> StrandBalance {
    let in_window = select_window(history, window, now);

    let mut seconds: BTreeMap<Strand, f64> = Strand::ALL.iter().map(|s| (*s, 0.0)).collect();
    let mut total_seconds = 0.0;
    let mut total_exercises = 0;

    for entry in in_window {
        if !entry.duration_seconds.is_finite() || entry.duration_seconds < 0.0 {
            tracing::warn!(
                session_id = %entry.session_id,
                node_id = %entry.node_id,
                duration_seconds = entry.duration_seconds,
                "Skipping practice entry with invalid duration"
            );
            continue;
        }
        *seconds.entry(entry.strand).or_insert(0.0) += entry.duration_seconds;
        total_seconds += entry.duration_seconds;
        total_exercises += 1;
    }

    if total_seconds <= 0.0 {
        return StrandBalance {
            total_exercises,
            ..StrandBalance::neutral()
        };
    }

    let percentages = seconds
        .iter()
        .map(|(strand, secs)| (*strand, secs / total_seconds))
        .collect();

    StrandBalance {
        percentages,
        seconds,
        total_exercises,
        total_seconds,
    }
}

fn select_window(
    history: &[PracticeLogEntry],
    window: LookbackWindow,
    now: DateTime<Utc>,
) -> Vec<&PracticeLogEntry> {
    match window {
        LookbackWindow::Days(_) => {
            let start = window_start(window, now).unwrap_or(now);
            history
                .iter()
                .filter(|e| e.practiced_at >= start && e.practiced_at <= now)
                .collect()
        }
        LookbackWindow::Sessions(n) => {
            // Latest activity per session decides recency.
            let mut latest: HashMap<&str, DateTime<Utc>> = HashMap::new();
            for entry in history.iter().filter(|e| e.practiced_at <= now) {
                let slot = latest.entry(entry.session_id.as_str()).or_insert(entry.practiced_at);
                if entry.practiced_at > *slot {
                    *slot = entry.practiced_at;
                }
            }
            let mut sessions: Vec<(&str, DateTime<Utc>)> = latest.into_iter().collect();
            sessions.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
            let keep: Vec<&str> = sessions.into_iter().take(n as usize).map(|(id, _)| id).collect();

            history
                .iter()
                .filter(|e| e.practiced_at <= now && keep.contains(&e.session_id.as_str()))
                .collect()
        }
    }
}

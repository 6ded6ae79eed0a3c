//! Memory-decay model for review scheduling.
//!
//! A modified FSRS model on the 0-5 quality scale. Retrievability follows
//! `R = 0.9^(elapsed / S)`, so `R` is exactly 0.9 when the elapsed days equal
//! the stability. Everything here is pure: no I/O and no hidden state.

use chrono::{DateTime, Duration, Utc};

use crate::config::{MemoryModelParams, StrandConfig, MAX_INTERVAL_DAYS};
use crate::error::{StrandError, StrandResult};
use crate::types::{Item, Quality};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Output of one review.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewOutcome {
    /// Item with updated stability, difficulty, reps, review and due times.
    /// `mastery_status` is left for the classifier.
    pub item: Item,
    pub next_due_at: DateTime<Utc>,
    /// Retrievability at the moment of review (1.0 on the first review).
    pub retrievability: f64,
    pub interval_days: f64,
}

/// Memory-decay scheduler.
///
/// Computes updated stability and difficulty from a quality rating and the
/// elapsed time, and derives the next due date from the target retention.
#[derive(Debug, Clone)]
pub struct MemoryModel {
    params: MemoryModelParams,
}

impl MemoryModel {
    /// Create a model with default parameters.
    pub fn new() -> Self {
        Self {
            params: MemoryModelParams::default(),
        }
    }

    /// Create a model from validated configuration.
    pub fn from_config(config: &StrandConfig) -> StrandResult<Self> {
        config.validate()?;
        Ok(Self {
            params: config.memory_model.clone(),
        })
    }

    /// Create a model with custom parameters.
    pub fn with_params(params: MemoryModelParams) -> StrandResult<Self> {
        let config = StrandConfig {
            memory_model: params,
            ..Default::default()
        };
        Self::from_config(&config)
    }

    pub fn params(&self) -> &MemoryModelParams {
        &self.params
    }

    fn w(&self, i: usize) -> f64 {
        self.params.weights[i]
    }

    /// Retrievability after `elapsed_days` at the given stability.
    ///
    /// Negative elapsed time is treated as zero; non-positive stability gives 0.
    pub fn retrievability(&self, elapsed_days: f64, stability: f64) -> f64 {
        if stability <= 0.0 {
            return 0.0;
        }
        let elapsed = elapsed_days.max(0.0);
        0.9_f64.powf(elapsed / stability)
    }

    /// Current retrievability of an item at `now`.
    ///
    /// Never-reviewed items report 1.0.
    pub fn item_retrievability(&self, item: &Item, now: DateTime<Utc>) -> f64 {
        if item.reps == 0 {
            return 1.0;
        }
        self.retrievability(elapsed_days(item, now), item.stability)
    }

    /// Initial stability for a first review: a step function of quality.
    pub fn initial_stability(&self, quality: Quality) -> f64 {
        let q = quality.as_f64();
        let s = match quality.value() {
            0 => self.params.min_stability,
            1 | 2 => self.w(0) * q / 2.0,
            3 => self.w(2),
            _ => self.w(2) + (self.w(3) - self.w(2)) * (q - 3.0) / 2.0,
        };
        s.max(self.params.min_stability)
    }

    /// Initial difficulty for a first review.
    pub fn initial_difficulty(&self, quality: Quality) -> f64 {
        (self.w(4) - self.w(10) * (quality.as_f64() - 3.0)).clamp(1.0, 10.0)
    }

    /// Stability after a failed review.
    ///
    /// Shrinks more the lower the retrievability was. Never exceeds
    /// `max_lapse_retention` of the prior value and never drops below the floor.
    fn lapse_stability(&self, stability: f64, difficulty: f64, r: f64) -> f64 {
        let raw = self.w(11)
            * difficulty.powf(-self.w(12))
            * ((stability + 1.0).powf(self.w(13)) - 1.0)
            * ((1.0 - r) * self.w(14)).exp();
        raw.min(stability * self.params.max_lapse_retention)
            .max(self.params.min_stability)
    }

    /// Stability after a successful review.
    ///
    /// Grows more when recall happened against lower retrievability, scaled by
    /// the success tier: hard (3) < good (4) < easy (5).
    fn recall_stability(&self, stability: f64, difficulty: f64, r: f64, quality: Quality) -> f64 {
        let tier = match quality.value() {
            3 => self.w(7),
            4 => self.w(6),
            _ => self.w(5),
        };
        let growth = self.w(15).exp()
            * (11.0 - difficulty)
            * stability.max(self.params.min_stability).powf(-self.w(13))
            * (((1.0 - r) * self.w(14)).exp() - 1.0)
            * tier;
        let grown = stability * (1.0 + growth);
        grown.max(stability + self.params.min_recall_gain)
    }

    fn next_difficulty(&self, difficulty: f64, quality: Quality) -> f64 {
        (difficulty - self.w(12) * (quality.as_f64() - 3.0)).clamp(1.0, 10.0)
    }

    /// Interval in days for the given stability at the configured target retention.
    pub fn interval_days(&self, stability: f64) -> f64 {
        let ratio = self.params.target_retention.ln() / 0.9_f64.ln();
        (stability * ratio)
            .max(self.params.min_interval_days)
            .min(self.params.max_interval_days)
    }

    /// Apply one review to an item.
    ///
    /// `reps` increments by exactly one. The returned item carries the new
    /// `due_at`; its mastery status is unchanged.
    pub fn review(&self, item: &Item, quality: Quality, now: DateTime<Utc>) -> ReviewOutcome {
        let (stability, difficulty, retrievability) = if item.reps == 0 {
            (
                self.initial_stability(quality),
                self.initial_difficulty(quality),
                1.0,
            )
        } else {
            let r = self.retrievability(elapsed_days(item, now), item.stability);
            let s = if quality.is_success() {
                self.recall_stability(item.stability, item.difficulty, r, quality)
            } else {
                self.lapse_stability(item.stability, item.difficulty, r)
            };
            (s, self.next_difficulty(item.difficulty, quality), r)
        };

        let interval_days = self.interval_days(stability);
        let next_due_at = due_after(now, interval_days);

        tracing::debug!(
            item_id = %item.item_id,
            quality = quality.value(),
            stability_before = item.stability,
            stability_after = stability,
            difficulty_after = difficulty,
            retrievability,
            interval_days,
            "Reviewed item"
        );

        let mut updated = item.clone();
        updated.stability = stability;
        updated.difficulty = difficulty;
        updated.reps = item.reps.saturating_add(1);
        updated.last_reviewed_at = Some(now);
        updated.due_at = Some(next_due_at);

        ReviewOutcome {
            item: updated,
            next_due_at,
            retrievability,
            interval_days,
        }
    }

    /// Validate a raw quality and schedule the item.
    ///
    /// Fails with `InvalidQuality` before any computation if the grade is
    /// outside 0-5.
    pub fn schedule(
        &self,
        item: &Item,
        quality: i64,
        now: DateTime<Utc>,
    ) -> StrandResult<(Item, DateTime<Utc>)> {
        let quality = Quality::new(quality)?;
        let outcome = self.review(item, quality, now);
        Ok((outcome.item, outcome.next_due_at))
    }

    /// Next due date for a given stability, with an explicit retention target.
    pub fn next_due_with_retention(
        &self,
        stability: f64,
        target_retention: f64,
        now: DateTime<Utc>,
    ) -> StrandResult<DateTime<Utc>> {
        if !(target_retention > 0.0 && target_retention < 1.0) {
            return Err(StrandError::InvalidRetentionTarget {
                value: target_retention,
            });
        }
        let days = (stability * target_retention.ln() / 0.9_f64.ln())
            .max(self.params.min_interval_days)
            .min(self.params.max_interval_days);
        Ok(due_after(now, days))
    }
}

/// `now` plus `days`, saturating at the latest representable instant.
fn due_after(now: DateTime<Utc>, days: f64) -> DateTime<Utc> {
    let seconds = (days.clamp(0.0, MAX_INTERVAL_DAYS) * SECONDS_PER_DAY).round() as i64;
    now.checked_add_signed(Duration::seconds(seconds))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl Default for MemoryModel {
    fn default() -> Self {
        Self::new()
    }
}

/// Days since the last review; 0 when the item has no review timestamp.
fn elapsed_days(item: &Item, now: DateTime<Utc>) -> f64 {
    match item.last_reviewed_at {
        Some(last) => (now.signed_duration_since(last).num_seconds() as f64 / SECONDS_PER_DAY).max(0.0),
        None => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Skill, Strand};

    fn q(v: i64) -> Quality {
        Quality::new(v).unwrap()
    }

    fn fresh() -> Item {
        Item::new("it-1", "node-1", Strand::LanguageFocused, Skill::Reading)
    }

    fn reviewed(stability: f64, difficulty: f64, days_ago: i64, now: DateTime<Utc>) -> Item {
        let mut item = fresh();
        item.stability = stability;
        item.difficulty = difficulty;
        item.reps = 3;
        item.last_reviewed_at = Some(now - Duration::days(days_ago));
        item
    }

    #[test]
    fn test_first_review_good() {
        let model = MemoryModel::new();
        let t0 = Utc::now();
        let out = model.review(&fresh(), q(4), t0);

        assert!((out.item.stability - 4.1).abs() < 1e-9);
        assert!(out.item.difficulty < Item::INITIAL_DIFFICULTY);
        assert_eq!(out.item.reps, 1);
        assert_eq!(out.item.last_reviewed_at, Some(t0));
        assert_eq!(out.retrievability, 1.0);
        let days = out.next_due_at.signed_duration_since(t0).num_seconds() as f64 / 86_400.0;
        assert!((days - 4.1).abs() < 1e-4);
    }

    #[test]
    fn test_initial_stability_is_monotone_in_quality() {
        let model = MemoryModel::new();
        let values: Vec<f64> = (0..=5).map(|v| model.initial_stability(q(v))).collect();
        assert_eq!(values[0], 0.1);
        assert_eq!(values[3], 2.4);
        assert!((values[5] - 5.8).abs() < 1e-9);
        for pair in values.windows(2) {
            assert!(pair[1] >= pair[0], "{values:?}");
        }
    }

    #[test]
    fn test_initial_difficulty_clamped() {
        let model = MemoryModel::new();
        assert!((model.initial_difficulty(q(3)) - 4.93).abs() < 1e-9);
        assert_eq!(model.initial_difficulty(q(0)), (4.93_f64 + 0.94 * 3.0).clamp(1.0, 10.0));
        assert!(model.initial_difficulty(q(5)) >= 1.0);
    }

    #[test]
    fn test_retrievability_fixed_point() {
        let model = MemoryModel::new();
        for s in [0.1, 1.0, 7.5, 42.0, 365.0] {
            assert!((model.retrievability(s, s) - 0.9).abs() < 1e-12);
        }
        assert_eq!(model.retrievability(3.0, 0.0), 0.0);
        assert_eq!(model.retrievability(-2.0, 5.0), 1.0);
    }

    #[test]
    fn test_success_strictly_increases_stability() {
        let model = MemoryModel::new();
        let now = Utc::now();
        for days_ago in [0, 1, 5, 30, 200] {
            for stability in [0.1, 2.0, 20.0, 400.0] {
                for difficulty in [1.0, 5.0, 10.0] {
                    let item = reviewed(stability, difficulty, days_ago, now);
                    for grade in 3..=5 {
                        let out = model.review(&item, q(grade), now);
                        assert!(
                            out.item.stability > stability,
                            "s={stability} d={difficulty} ago={days_ago} q={grade}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_success_tiers_ordered() {
        let model = MemoryModel::new();
        let now = Utc::now();
        let item = reviewed(5.0, 5.0, 7, now);
        let hard = model.review(&item, q(3), now).item.stability;
        let good = model.review(&item, q(4), now).item.stability;
        let easy = model.review(&item, q(5), now).item.stability;
        assert!(hard < good && good < easy, "{hard} {good} {easy}");
    }

    #[test]
    fn test_failure_shrinks_stability_with_floor() {
        let model = MemoryModel::new();
        let now = Utc::now();
        for days_ago in [0, 3, 30] {
            for stability in [0.5, 4.0, 60.0] {
                let item = reviewed(stability, 6.0, days_ago, now);
                for grade in 0..=2 {
                    let out = model.review(&item, q(grade), now);
                    assert!(out.item.stability < stability);
                    assert!(out.item.stability >= 0.1);
                }
            }
        }

        let tiny = reviewed(0.1, 6.0, 1, now);
        assert_eq!(model.review(&tiny, q(0), now).item.stability, 0.1);
    }

    #[test]
    fn test_difficulty_moves_with_quality() {
        let model = MemoryModel::new();
        let now = Utc::now();
        let item = reviewed(5.0, 5.0, 3, now);
        assert!(model.review(&item, q(5), now).item.difficulty < 5.0);
        assert_eq!(model.review(&item, q(3), now).item.difficulty, 5.0);
        assert!(model.review(&item, q(1), now).item.difficulty > 5.0);

        let hardest = reviewed(5.0, 10.0, 3, now);
        assert_eq!(model.review(&hardest, q(0), now).item.difficulty, 10.0);
    }

    #[test]
    fn test_interval_lower_bound() {
        let model = MemoryModel::new();
        let now = Utc::now();
        let out = model.review(&fresh(), q(0), now);
        assert!(out.next_due_at - now >= Duration::days(1));
        assert_eq!(model.interval_days(0.0), 1.0);
        assert_eq!(model.interval_days(1e9), 36_500.0);
    }

    #[test]
    fn test_due_date_never_overflows() {
        let model = MemoryModel::new();
        let far = DateTime::<Utc>::MAX_UTC - Duration::days(10);
        let item = reviewed(1e9, 5.0, 0, far);
        let out = model.review(&item, q(5), far);
        assert_eq!(out.next_due_at, DateTime::<Utc>::MAX_UTC);
        assert_eq!(
            model.next_due_with_retention(f64::INFINITY, 0.9, far).unwrap(),
            DateTime::<Utc>::MAX_UTC
        );

        let now = Utc::now();
        assert_eq!(due_after(now, f64::NAN), now);
        assert_eq!(due_after(now, 1e300), now + Duration::days(36_500));
    }

    #[test]
    fn test_reps_increment_and_missing_timestamp() {
        let model = MemoryModel::new();
        let now = Utc::now();
        let mut item = reviewed(3.0, 5.0, 0, now);
        item.last_reviewed_at = None;
        let out = model.review(&item, q(4), now);
        assert_eq!(out.item.reps, 4);
        assert_eq!(out.retrievability, 1.0);
    }

    #[test]
    fn test_schedule_rejects_invalid_quality() {
        let model = MemoryModel::new();
        let item = fresh();
        let err = model.schedule(&item, 6, Utc::now()).unwrap_err();
        assert!(matches!(err, StrandError::InvalidQuality { value: 6 }));
        assert!(model.schedule(&item, -1, Utc::now()).is_err());
    }

    #[test]
    fn test_retention_target_validation() {
        let model = MemoryModel::new();
        let now = Utc::now();
        assert!(matches!(
            model.next_due_with_retention(5.0, 1.0, now),
            Err(StrandError::InvalidRetentionTarget { .. })
        ));
        assert!(model.next_due_with_retention(5.0, -0.5, now).is_err());

        let lower = model.next_due_with_retention(10.0, 0.8, now).unwrap();
        let higher = model.next_due_with_retention(10.0, 0.95, now).unwrap();
        assert!(lower > higher);
    }

    #[test]
    fn test_custom_params_validated() {
        let params = MemoryModelParams {
            target_retention: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            MemoryModel::with_params(params),
            Err(StrandError::InvalidRetentionTarget { .. })
        ));
    }
}

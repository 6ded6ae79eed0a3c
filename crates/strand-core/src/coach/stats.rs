//! Learner statistics and secure-level promotion.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::{BTreeSet, HashMap};
use strum::IntoEnumIterator;

use super::types::{LearnerStats, Promotion};
use crate::types::{CatalogueNode, CefrLevel, Item, LearnerProfile, MasteryStatus, ReviewEvent, Skill};

/// Counters over items and the review log at `now`.
pub fn learner_stats(items: &[Item], reviews: &[ReviewEvent], now: DateTime<Utc>) -> LearnerStats {
    let today = now.date_naive();
    let average_difficulty = if items.is_empty() {
        0.0
    } else {
        items.iter().map(|i| i.difficulty).sum::<f64>() / items.len() as f64
    };

    LearnerStats {
        total_items: items.len(),
        due_count: items.iter().filter(|i| !i.is_new() && i.is_due(now)).count(),
        new_count: items.iter().filter(|i| i.is_new()).count(),
        learning_count: count_status(items, MasteryStatus::Learning),
        mastered_count: count_status(items, MasteryStatus::Mastered),
        average_difficulty,
        reviews_today: reviews
            .iter()
            .filter(|r| r.reviewed_at.date_naive() == today)
            .count(),
        streak_days: streak(reviews.iter().map(|r| r.reviewed_at.date_naive()), today),
    }
}

fn count_status(items: &[Item], status: MasteryStatus) -> usize {
    items.iter().filter(|i| i.mastery_status == status).count()
}

/// Consecutive review days ending today, or yesterday if nothing yet today.
fn streak(days: impl IntoIterator<Item = NaiveDate>, today: NaiveDate) -> u32 {
    let days: BTreeSet<NaiveDate> = days.into_iter().collect();
    let mut day = if days.contains(&today) {
        today
    } else {
        today - Duration::days(1)
    };
    let mut count = 0;
    while days.contains(&day) {
        count += 1;
        day -= Duration::days(1);
    }
    count
}

/// Promote each skill's secure level one step when at least `ratio` of the
/// learner's items at the next level are mastered.
///
/// Skills with no items at the next level, or already at C2, are left alone.
pub fn promotions(
    profile: &LearnerProfile,
    items: &[Item],
    nodes: &[CatalogueNode],
    ratio: f64,
) -> Vec<Promotion> {
    let levels: HashMap<&str, CefrLevel> = nodes
        .iter()
        .map(|n| (n.node_id.as_str(), n.cefr_level))
        .collect();

    Skill::iter()
        .filter_map(|skill| {
            let from = profile.secure_level(skill);
            let to = from.next()?;
            let at_level: Vec<&Item> = items
                .iter()
                .filter(|i| i.skill == skill)
                .filter(|i| levels.get(i.node_id.as_str()) == Some(&to))
                .collect();
            if at_level.is_empty() {
                return None;
            }
            let mastered = at_level
                .iter()
                .filter(|i| i.mastery_status == MasteryStatus::Mastered)
                .count();
            (mastered as f64 / at_level.len() as f64 >= ratio).then_some(Promotion { skill, from, to })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Quality, Strand};

    fn review_at(at: DateTime<Utc>) -> ReviewEvent {
        ReviewEvent {
            item_id: "i".to_string(),
            session_id: None,
            quality: Quality::new(3).unwrap(),
            reviewed_at: at,
            strand: Strand::LanguageFocused,
            exercise_type: None,
            stability_before: 1.0,
            stability_after: 2.0,
            difficulty_before: 5.0,
            difficulty_after: 5.0,
            mastery_before: MasteryStatus::Learning,
            mastery_after: MasteryStatus::Learning,
        }
    }

    #[test]
    fn test_streak() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let d = |n: i64| today - Duration::days(n);
        assert_eq!(streak([d(0), d(1), d(2), d(4)], today), 3);
        assert_eq!(streak([d(1), d(2)], today), 2);
        assert_eq!(streak([d(2), d(3)], today), 0);
        assert_eq!(streak(Vec::new(), today), 0);
    }

    #[test]
    fn test_stats_counts() {
        let now = Utc::now();
        let fresh = Item::new("a", "n", Strand::Fluency, Skill::Reading);
        let mut overdue = Item::new("b", "n", Strand::Fluency, Skill::Reading);
        overdue.reps = 2;
        overdue.difficulty = 3.0;
        overdue.last_reviewed_at = Some(now - Duration::days(3));
        overdue.due_at = Some(now - Duration::days(1));
        overdue.mastery_status = MasteryStatus::Learning;
        let mut mastered = overdue.clone();
        mastered.item_id = "c".to_string();
        mastered.due_at = Some(now + Duration::days(30));
        mastered.mastery_status = MasteryStatus::Mastered;

        let reviews = vec![review_at(now), review_at(now - Duration::days(1))];
        let stats = learner_stats(&[fresh, overdue, mastered], &reviews, now);
        assert_eq!(stats.total_items, 3);
        assert_eq!(stats.due_count, 1);
        assert_eq!(stats.new_count, 1);
        assert_eq!(stats.learning_count, 1);
        assert_eq!(stats.mastered_count, 1);
        assert!((stats.average_difficulty - 11.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.reviews_today, 1);
        assert_eq!(stats.streak_days, 2);
    }

    #[test]
    fn test_promotion_threshold() {
        let profile = LearnerProfile::new("ana", CefrLevel::B1);
        let nodes = vec![CatalogueNode::new("a2", "Lexeme", "x", CefrLevel::A2)];
        let mut items: Vec<Item> = (0..5)
            .map(|i| Item::new(format!("a2.{i}"), "a2", Strand::LanguageFocused, Skill::Reading))
            .collect();
        for item in items.iter_mut().take(3) {
            item.mastery_status = MasteryStatus::Mastered;
        }
        assert!(promotions(&profile, &items, &nodes, 0.8).is_empty());

        items[3].mastery_status = MasteryStatus::Mastered;
        let promoted = promotions(&profile, &items, &nodes, 0.8);
        assert_eq!(
            promoted,
            vec![Promotion {
                skill: Skill::Reading,
                from: CefrLevel::A1,
                to: CefrLevel::A2
            }]
        );
    }
}

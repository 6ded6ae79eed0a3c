//! Per-strand candidate pools, priority order and greedy selection.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::config::PlannerConfig;
use crate::types::{Candidate, CandidatePools, Exercise, Strand};

/// Candidates for one strand, deduplicated and in priority order.
///
/// Meaning input draws on frontier then due material, meaning output and
/// language-focused on due then frontier, all filtered by strand tag.
/// Fluency draws on the mastered pool, which the catalogue already limits
/// to secure-level material.
pub fn strand_pool(strand: Strand, pools: &CandidatePools) -> Vec<Candidate> {
    let mut pool = match strand {
        Strand::MeaningInput => {
            let mut pool = tagged(strand, pools.frontier.iter().chain(pools.due.iter()));
            pool.sort_by(|a, b| {
                b.is_new()
                    .cmp(&a.is_new())
                    .then_with(|| desc(a.stability, b.stability))
            });
            pool
        }
        Strand::MeaningOutput | Strand::LanguageFocused => {
            let mut due = tagged(strand, pools.due.iter());
            due.sort_by(|a, b| a.last_reviewed_at.cmp(&b.last_reviewed_at));
            let frontier = tagged(strand, pools.frontier.iter());
            due.into_iter().chain(frontier).collect()
        }
        Strand::Fluency => {
            let mut pool: Vec<Candidate> = pools.mastered.to_vec();
            pool.sort_by(|a, b| {
                desc(a.stability, b.stability)
                    .then_with(|| a.last_reviewed_at.cmp(&b.last_reviewed_at))
            });
            pool
        }
    };
    dedup(&mut pool);
    pool
}

/// Greedily take candidates while the allotted minutes are not yet reached.
///
/// The last exercise may overshoot the allotment by less than one exercise.
pub fn select(
    strand: Strand,
    pool: &[Candidate],
    target_minutes: f64,
    config: &PlannerConfig,
) -> Vec<Exercise> {
    let minutes = config.minutes_per_exercise(strand);
    let mut allocated = 0.0;
    let mut exercises = Vec::new();

    for candidate in pool {
        if allocated >= target_minutes {
            break;
        }
        exercises.push(Exercise {
            strand,
            node_id: candidate.node_id.clone(),
            item_id: candidate.item_id.clone(),
            exercise_type: strand.exercise_type(),
            duration_estimate: minutes,
            instructions: instructions(strand, candidate),
        });
        allocated += minutes;
    }

    exercises
}

/// Instruction text for one exercise.
pub fn instructions(strand: Strand, candidate: &Candidate) -> String {
    let name = candidate.display_name();
    match strand {
        Strand::MeaningInput => format!("Understand {} in context", name),
        Strand::MeaningOutput => format!("Communicate using {}", name),
        Strand::LanguageFocused => format!("Practice {} (focus on accuracy)", name),
        Strand::Fluency => format!("Speed practice: {} (focus on fluency, not accuracy)", name),
    }
}

fn tagged<'a>(strand: Strand, candidates: impl Iterator<Item = &'a Candidate>) -> Vec<Candidate> {
    candidates.filter(|c| c.strand == strand).cloned().collect()
}

fn desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

fn dedup(pool: &mut Vec<Candidate>) {
    let mut seen: HashSet<(String, Option<String>)> = HashSet::new();
    pool.retain(|c| seen.insert((c.node_id.clone(), c.item_id.clone())));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExerciseType, MasteryStatus};
    use chrono::{Duration, Utc};

    fn cand(node: &str, item: Option<&str>, strand: Strand, stability: f64, reps: u32) -> Candidate {
        Candidate {
            node_id: node.to_string(),
            item_id: item.map(str::to_string),
            strand,
            label: String::new(),
            skill: None,
            stability,
            reps,
            last_reviewed_at: None,
            mastery_status: if reps == 0 {
                MasteryStatus::New
            } else {
                MasteryStatus::Learning
            },
        }
    }

    fn reviewed(mut c: Candidate, days_ago: i64) -> Candidate {
        c.last_reviewed_at = Some(Utc::now() - Duration::days(days_ago));
        c
    }

    #[test]
    fn test_meaning_input_new_first_then_stability() {
        let pools = CandidatePools {
            frontier: vec![cand("t-new", None, Strand::MeaningInput, 0.0, 0)],
            due: vec![
                reviewed(cand("t-low", Some("i1"), Strand::MeaningInput, 2.0, 2), 3),
                reviewed(cand("t-high", Some("i2"), Strand::MeaningInput, 9.0, 4), 10),
                reviewed(cand("lex", Some("i3"), Strand::LanguageFocused, 5.0, 2), 1),
            ],
            mastered: vec![],
        };
        let pool = strand_pool(Strand::MeaningInput, &pools);
        let order: Vec<&str> = pool.iter().map(|c| c.node_id.as_str()).collect();
        assert_eq!(order, vec!["t-new", "t-high", "t-low"]);
    }

    #[test]
    fn test_due_before_frontier_oldest_first() {
        let pools = CandidatePools {
            frontier: vec![cand("fresh", None, Strand::LanguageFocused, 0.0, 0)],
            due: vec![
                reviewed(cand("recent", Some("a"), Strand::LanguageFocused, 1.0, 1), 2),
                reviewed(cand("old", Some("b"), Strand::LanguageFocused, 1.0, 1), 20),
            ],
            mastered: vec![],
        };
        let pool = strand_pool(Strand::LanguageFocused, &pools);
        let order: Vec<&str> = pool.iter().map(|c| c.node_id.as_str()).collect();
        assert_eq!(order, vec!["old", "recent", "fresh"]);
    }

    #[test]
    fn test_pool_deduplicates() {
        let item = cand("n", Some("i"), Strand::MeaningOutput, 0.0, 0);
        let pools = CandidatePools {
            frontier: vec![item.clone()],
            due: vec![item],
            mastered: vec![],
        };
        assert_eq!(strand_pool(Strand::MeaningOutput, &pools).len(), 1);
    }

    #[test]
    fn test_fluency_ignores_strand_tag() {
        let pools = CandidatePools {
            frontier: vec![],
            due: vec![],
            mastered: vec![
                reviewed(cand("a", Some("1"), Strand::LanguageFocused, 30.0, 5), 3),
                reviewed(cand("b", Some("2"), Strand::MeaningOutput, 50.0, 6), 3),
            ],
        };
        let pool = strand_pool(Strand::Fluency, &pools);
        assert_eq!(pool[0].node_id, "b");
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_greedy_selection_respects_budget() {
        let config = PlannerConfig::default();
        let pool: Vec<Candidate> = (0..10)
            .map(|i| cand(&format!("n{i}"), None, Strand::MeaningInput, 0.0, 0))
            .collect();

        let picked = select(Strand::MeaningInput, &pool, 5.0, &config);
        // 2 minutes each: 0, 2, 4 are below 5, so three exercises (6 minutes).
        assert_eq!(picked.len(), 3);
        assert!(picked.iter().all(|e| e.exercise_type == ExerciseType::Comprehension));
        assert_eq!(picked[0].instructions, "Understand n0 in context");

        assert!(select(Strand::MeaningInput, &pool, 0.0, &config).is_empty());
        assert_eq!(select(Strand::Fluency, &pool[..2], 100.0, &config).len(), 2);
    }

    #[test]
    fn test_instructions_use_label() {
        let mut c = cand("lex.hablar", None, Strand::Fluency, 0.0, 0);
        c.label = "hablar".to_string();
        assert_eq!(
            instructions(Strand::Fluency, &c),
            "Speed practice: hablar (focus on fluency, not accuracy)"
        );
        assert_eq!(
            instructions(Strand::LanguageFocused, &c),
            "Practice hablar (focus on accuracy)"
        );
    }
}

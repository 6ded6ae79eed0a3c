//! Conversion of balance deviations into strand selection weights.

use crate::config::BalanceConfig;
use crate::types::{Strand, StrandBalance, StrandPreference, StrandWeights};

/// Sum every weight set is normalized to: one neutral unit per strand.
pub const WEIGHT_TOTAL: f64 = 4.0;

/// Tiered pressure for a single deviation (`target - actual`).
///
/// Within tolerance the weight is neutral; beyond it the weight moves with
/// the deviation, gently up to the severe threshold and strongly past it.
pub fn pressure(deviation: f64, config: &BalanceConfig) -> f64 {
    let magnitude = deviation.abs();
    if magnitude <= config.tolerance {
        1.0
    } else if magnitude <= config.severe_threshold {
        1.0 + config.gentle_gain * deviation
    } else {
        1.0 + config.strong_gain * deviation
    }
}

/// Selection weights from a balance snapshot and an optional preference.
///
/// Preferences only touch the strands they name and never fully override
/// the rebalancing signal. The result always sums to 4.0; if blending leaves
/// a non-positive total the neutral set is returned instead.
pub fn compute_weights(
    balance: &StrandBalance,
    preference: Option<&StrandPreference>,
    config: &BalanceConfig,
) -> StrandWeights {
    let mut weights: StrandWeights = Strand::ALL
        .iter()
        .map(|s| (*s, pressure(balance.deviation(*s, config.target_share), config)))
        .collect();

    if let Some(preference) = preference {
        for (strand, user_weight) in preference.iter() {
            if !user_weight.is_finite() {
                tracing::warn!(%strand, user_weight, "Ignoring non-finite strand preference");
                continue;
            }
            let system = weights.get(strand);
            weights.set(
                strand,
                config.system_share * system + (1.0 - config.system_share) * user_weight,
            );
        }
    }

    match weights.normalized_to(WEIGHT_TOTAL) {
        Some(normalized) => normalized,
        None => {
            tracing::warn!(
                total = weights.sum(),
                "Strand weights collapsed; falling back to neutral weights"
            );
            StrandWeights::neutral()
        }
    }
}

/// Keyword groups checked in order; the first match wins.
const GOAL_RULES: &[(&[&str], &[(Strand, f64)])] = &[
    (
        &["travel", "trip", "vacation", "booking", "hotel", "restaurant"],
        &[(Strand::MeaningOutput, 2.0), (Strand::MeaningInput, 1.5)],
    ),
    (
        &["grammar", "correct", "accuracy", "mistakes", "rules"],
        &[(Strand::LanguageFocused, 2.5), (Strand::MeaningOutput, 0.5)],
    ),
    (
        &["fluent", "fluency", "speed", "automatic", "faster"],
        &[
            (Strand::Fluency, 2.5),
            (Strand::MeaningOutput, 1.5),
            (Strand::LanguageFocused, 0.5),
        ],
    ),
    (
        &["understand", "listening", "comprehension", "podcast", "movie"],
        &[(Strand::MeaningInput, 2.5), (Strand::MeaningOutput, 0.8)],
    ),
    (
        &["speak", "speaking", "conversation", "talk", "communicate"],
        &[(Strand::MeaningOutput, 2.5), (Strand::MeaningInput, 1.2)],
    ),
    (
        &["write", "writing", "email", "letter", "essay"],
        &[(Strand::MeaningOutput, 2.0), (Strand::LanguageFocused, 1.5)],
    ),
];

/// Share above which a strand's goal emphasis is halved.
const OVER_REPRESENTED: f64 = 0.35;

/// Heuristic preference for a free-text learner goal.
///
/// Strands already above 35% of recent practice get half the emphasis.
/// Values are bounded to [0, 2] and normalized to sum 4.0.
pub fn preference_from_goal(goal: &str, current: Option<&StrandBalance>) -> StrandPreference {
    let goal = goal.to_lowercase();
    let mut weights = StrandWeights::neutral();

    if let Some((_, emphasis)) = GOAL_RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| goal.contains(k)))
    {
        for (strand, weight) in emphasis.iter() {
            weights.set(*strand, *weight);
        }
    }

    if let Some(balance) = current {
        for strand in Strand::ALL {
            if balance.share(strand) > OVER_REPRESENTED {
                weights.set(strand, weights.get(strand) * 0.5);
            }
        }
    }

    let bounded: StrandWeights = weights.iter().map(|(s, w)| (s, w.clamp(0.0, 2.0))).collect();
    bounded
        .normalized_to(WEIGHT_TOTAL)
        .unwrap_or_else(StrandWeights::neutral)
        .iter()
        .collect()
}

//! Mastery classification and plan-level balance status.

use crate::config::{BalanceConfig, MasteryCriteria};
use crate::types::{BalanceStatus, Item, MasteryStatus, StrandBalance};

/// Applies fixed thresholds to an item's memory state.
///
/// Status is recomputed from scratch on every call, so a mastered item can
/// fall back to learning when its rolling average quality drops.
#[derive(Debug, Clone, Default)]
pub struct MasteryClassifier {
    criteria: MasteryCriteria,
}

impl MasteryClassifier {
    pub fn new(criteria: MasteryCriteria) -> Self {
        Self { criteria }
    }

    pub fn criteria(&self) -> &MasteryCriteria {
        &self.criteria
    }

    pub fn classify(&self, item: &Item, avg_quality: f64) -> MasteryStatus {
        if item.reps == 0 {
            MasteryStatus::New
        } else if item.stability >= self.criteria.stability_days
            && item.reps >= self.criteria.min_reps
            && avg_quality >= self.criteria.avg_quality
        {
            MasteryStatus::Mastered
        } else {
            MasteryStatus::Learning
        }
    }
}

/// Classify with the default thresholds.
pub fn classify(item: &Item, avg_quality: f64) -> MasteryStatus {
    MasteryClassifier::default().classify(item, avg_quality)
}

/// Balance status from the largest per-strand deviation.
pub fn balance_status(balance: &StrandBalance, config: &BalanceConfig) -> BalanceStatus {
    let max_dev = balance.max_deviation(config.target_share);
    if max_dev <= config.tolerance {
        BalanceStatus::Balanced
    } else if max_dev <= config.severe_threshold {
        BalanceStatus::SlightImbalance
    } else {
        BalanceStatus::SevereImbalance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Skill, Strand};

    fn item(stability: f64, reps: u32) -> Item {
        let mut item = Item::new("it", "node", Strand::MeaningOutput, Skill::Speaking);
        item.stability = stability;
        item.reps = reps;
        item
    }

    #[test]
    fn test_classifier_scenario() {
        let it = item(25.0, 4);
        assert_eq!(classify(&it, 4.0), MasteryStatus::Mastered);
        assert_eq!(classify(&it, 3.0), MasteryStatus::Learning);
    }

    #[test]
    fn test_never_reviewed_is_new() {
        assert_eq!(classify(&item(100.0, 0), 5.0), MasteryStatus::New);
    }

    #[test]
    fn test_thresholds_inclusive() {
        assert_eq!(classify(&item(21.0, 3), 3.5), MasteryStatus::Mastered);
        assert_eq!(classify(&item(20.9, 3), 5.0), MasteryStatus::Learning);
        assert_eq!(classify(&item(30.0, 2), 5.0), MasteryStatus::Learning);
    }

    fn balance(mi: f64, mo: f64, lf: f64, fl: f64) -> StrandBalance {
        let mut b = StrandBalance::neutral();
        b.percentages.insert(Strand::MeaningInput, mi);
        b.percentages.insert(Strand::MeaningOutput, mo);
        b.percentages.insert(Strand::LanguageFocused, lf);
        b.percentages.insert(Strand::Fluency, fl);
        b
    }

    #[test]
    fn test_balance_status_tiers() {
        let config = BalanceConfig::default();
        assert_eq!(
            balance_status(&StrandBalance::neutral(), &config),
            BalanceStatus::Balanced
        );
        assert_eq!(
            balance_status(&balance(0.28, 0.22, 0.25, 0.25), &config),
            BalanceStatus::Balanced
        );
        assert_eq!(
            balance_status(&balance(0.33, 0.17, 0.25, 0.25), &config),
            BalanceStatus::SlightImbalance
        );
        assert_eq!(
            balance_status(&balance(0.0, 0.0, 1.0, 0.0), &config),
            BalanceStatus::SevereImbalance
        );
    }
}

//! Strand balance snapshots and the plan-level balance status.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString, IntoStaticStr};

use super::strand::Strand;

/// Share of practice every strand should receive.
pub const TARGET_SHARE: f64 = 0.25;

/// Distribution of practice time across strands over a lookback window.
///
/// Percentages sum to 1.0 when `total_seconds > 0`; otherwise every strand
/// reads 0.25.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrandBalance {
    pub percentages: BTreeMap<Strand, f64>,
    pub seconds: BTreeMap<Strand, f64>,
    pub total_exercises: usize,
    pub total_seconds: f64,
}

impl StrandBalance {
    /// Cold-start balance: 25% per strand, nothing logged.
    pub fn neutral() -> Self {
        Self {
            percentages: Strand::ALL.iter().map(|s| (*s, TARGET_SHARE)).collect(),
            seconds: Strand::ALL.iter().map(|s| (*s, 0.0)).collect(),
            total_exercises: 0,
            total_seconds: 0.0,
        }
    }

    pub fn share(&self, strand: Strand) -> f64 {
        self.percentages.get(&strand).copied().unwrap_or(0.0)
    }

    /// `target - actual` for one strand; positive means under-represented.
    pub fn deviation(&self, strand: Strand, target: f64) -> f64 {
        target - self.share(strand)
    }

    /// Largest absolute deviation from `target` across all strands.
    pub fn max_deviation(&self, target: f64) -> f64 {
        Strand::ALL
            .iter()
            .map(|s| self.deviation(*s, target).abs())
            .fold(0.0, f64::max)
    }
}

impl Default for StrandBalance {
    fn default() -> Self {
        Self::neutral()
    }
}

/// How far recent practice has drifted from an even split.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BalanceStatus {
    Balanced,
    SlightImbalance,
    SevereImbalance,
}

impl BalanceStatus {
    /// One-line guidance for whoever runs the session.
    pub fn guidance(&self) -> &'static str {
        match self {
            BalanceStatus::Balanced => "Strand balance is good. Proceed with planned exercises.",
            BalanceStatus::SlightImbalance => {
                "Strand balance slightly off. This session emphasizes under-represented strands."
            }
            BalanceStatus::SevereImbalance => {
                "Strand balance needs correction. Focus on exercises that restore balance."
            }
        }
    }
}

/// Window of history considered when computing balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookbackWindow {
    /// Entries practiced within the last N days.
    Days(u32),
    /// Entries belonging to the N most recent sessions.
    Sessions(u32),
}

impl Default for LookbackWindow {
    fn default() -> Self {
        LookbackWindow::Days(10)
    }
}

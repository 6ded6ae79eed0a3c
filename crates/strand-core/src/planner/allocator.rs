//! Time-budget allocation across strands.

use chrono::{DateTime, Utc};
use std::fmt::Write as _;

use super::selection::{select, strand_pool};
use crate::balance::{compute_balance, compute_weights, WEIGHT_TOTAL};
use crate::cognitive::balance_status;
use crate::config::{BalanceConfig, PlannerConfig, StrandConfig};
use crate::error::StrandResult;
use crate::types::{
    CandidatePools, Exercise, PracticeLogEntry, SessionPlan, Strand, StrandBalance,
    StrandPreference, StrandWeights,
};

/// Note attached to a plan when no strand has any material.
pub const NO_MATERIALS_NOTE: &str = "No materials available for any strand";

/// Partitions a session's minutes across strands and fills each share.
///
/// Only strands with candidate material take part: weights are
/// re-normalized over them so no time is spent on empty strands.
#[derive(Debug, Clone)]
pub struct SessionAllocator {
    balance: BalanceConfig,
    planner: PlannerConfig,
}

impl SessionAllocator {
    pub fn new(config: &StrandConfig) -> StrandResult<Self> {
        config.validate()?;
        Ok(Self {
            balance: config.balance.clone(),
            planner: config.planner.clone(),
        })
    }

    pub fn planner_config(&self) -> &PlannerConfig {
        &self.planner
    }

    pub fn balance_config(&self) -> &BalanceConfig {
        &self.balance
    }

    /// Full pipeline: balance from history, weights, then allocation.
    ///
    /// Never fails; an empty catalogue yields an empty plan with a note.
    pub fn plan_session(
        &self,
        history: &[PracticeLogEntry],
        pools: &CandidatePools,
        total_minutes: f64,
        preference: Option<&StrandPreference>,
        now: DateTime<Utc>,
    ) -> SessionPlan {
        let balance = compute_balance(history, self.balance.lookback, now);
        let weights = compute_weights(&balance, preference, &self.balance);
        self.plan(pools, balance, weights, total_minutes)
    }

    /// Allocate `total_minutes` across viable strands and select exercises.
    pub fn plan(
        &self,
        pools: &CandidatePools,
        balance: StrandBalance,
        weights: StrandWeights,
        total_minutes: f64,
    ) -> SessionPlan {
        let status = balance_status(&balance, &self.balance);
        let total_minutes = if total_minutes.is_finite() {
            total_minutes.max(0.0)
        } else {
            0.0
        };

        let strand_pools: Vec<(Strand, Vec<_>)> = Strand::ALL
            .iter()
            .map(|s| (*s, strand_pool(*s, pools)))
            .filter(|(_, pool)| !pool.is_empty())
            .collect();

        if strand_pools.is_empty() {
            tracing::debug!(total_minutes, "No viable strands; returning empty plan");
            return SessionPlan {
                total_minutes,
                exercises: Vec::new(),
                balance,
                weights,
                allocations: StrandWeights::empty(),
                balance_status: status,
                notes: NO_MATERIALS_NOTE.to_string(),
            };
        }

        let viable: StrandWeights = strand_pools
            .iter()
            .map(|(s, _)| (*s, weights.get(*s)))
            .collect();
        let effective = viable.normalized_to(WEIGHT_TOTAL).unwrap_or_else(|| {
            let even = WEIGHT_TOTAL / strand_pools.len() as f64;
            strand_pools.iter().map(|(s, _)| (*s, even)).collect()
        });

        let mut allocations = StrandWeights::empty();
        let mut exercises = Vec::new();
        for (strand, pool) in &strand_pools {
            let minutes = (total_minutes * effective.get(*strand) / WEIGHT_TOTAL).max(0.0);
            let picked = select(*strand, pool, minutes, &self.planner);
            tracing::debug!(
                %strand,
                weight = effective.get(*strand),
                minutes,
                candidates = pool.len(),
                selected = picked.len(),
                "Allocated strand"
            );
            allocations.set(*strand, minutes);
            exercises.extend(picked);
        }

        let notes = self.notes(&balance, &effective, &exercises, status.guidance());

        SessionPlan {
            total_minutes,
            exercises,
            balance,
            weights,
            allocations,
            balance_status: status,
            notes,
        }
    }

    fn notes(
        &self,
        balance: &StrandBalance,
        effective: &StrandWeights,
        exercises: &[Exercise],
        guidance: &str,
    ) -> String {
        let mut notes = String::from("Recent strand distribution:\n");
        for strand in Strand::ALL {
            let _ = writeln!(notes, "  {}: {:.1}%", strand, balance.share(strand) * 100.0);
        }

        notes.push_str("\nThis session emphasizes:\n");
        let mut ranked: Vec<(Strand, f64)> = effective.iter().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        for (strand, weight) in ranked.into_iter().take(2) {
            if weight > self.planner.emphasis_threshold {
                let _ = writeln!(notes, "  {} (rebalancing)", strand);
            }
        }

        notes.push_str("\nExercises selected:\n");
        for strand in Strand::ALL {
            let count = exercises.iter().filter(|e| e.strand == strand).count();
            if count > 0 {
                let _ = writeln!(notes, "  {}: {} exercises", strand, count);
            }
        }

        notes.push('\n');
        notes.push_str(guidance);
        notes
    }
}

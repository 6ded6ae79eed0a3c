//! Catalogue entries, candidate pools and the session plan.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::balance::{BalanceStatus, StrandBalance};
use super::item::{Item, MasteryStatus};
use super::strand::{CefrLevel, ExerciseType, Skill, Strand, StrandWeights};

/// An entry of the external knowledge catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogueNode {
    pub node_id: String,
    /// Free-form node type from the catalogue, e.g. `Lexeme` or `CanDo`.
    pub node_type: String,
    pub label: String,
    pub cefr_level: CefrLevel,
    /// Explicit strand tag; when absent the strand is inferred from `node_type`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strand: Option<Strand>,
    #[serde(default)]
    pub prerequisites: Vec<String>,
}

impl CatalogueNode {
    pub fn new(
        node_id: impl Into<String>,
        node_type: impl Into<String>,
        label: impl Into<String>,
        cefr_level: CefrLevel,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            node_type: node_type.into(),
            label: label.into(),
            cefr_level,
            strand: None,
            prerequisites: Vec::new(),
        }
    }

    pub fn with_strand(mut self, strand: Strand) -> Self {
        self.strand = Some(strand);
        self
    }

    pub fn with_prerequisites<I, S>(mut self, prerequisites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prerequisites = prerequisites.into_iter().map(Into::into).collect();
        self
    }

    /// Explicit strand tag, falling back to node-type inference.
    pub fn effective_strand(&self) -> Strand {
        self.strand
            .unwrap_or_else(|| Strand::infer_from_node_type(&self.node_type))
    }
}

/// Something the allocator may turn into an exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub node_id: String,
    /// Absent for frontier nodes that have no tracked item yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    pub strand: Strand,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill: Option<Skill>,
    pub stability: f64,
    pub reps: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub mastery_status: MasteryStatus,
}

impl Candidate {
    /// Candidate for a catalogue node with no tracked item.
    pub fn from_node(node: &CatalogueNode) -> Self {
        Self {
            node_id: node.node_id.clone(),
            item_id: None,
            strand: node.effective_strand(),
            label: node.label.clone(),
            skill: None,
            stability: 0.0,
            reps: 0,
            last_reviewed_at: None,
            mastery_status: MasteryStatus::New,
        }
    }

    /// Candidate for a tracked item. `label` comes from the catalogue when known.
    pub fn from_item(item: &Item, label: impl Into<String>) -> Self {
        Self {
            node_id: item.node_id.clone(),
            item_id: Some(item.item_id.clone()),
            strand: item.strand,
            label: label.into(),
            skill: Some(item.skill),
            stability: item.stability,
            reps: item.reps,
            last_reviewed_at: item.last_reviewed_at,
            mastery_status: item.mastery_status,
        }
    }

    pub fn is_new(&self) -> bool {
        self.reps == 0
    }

    pub fn display_name(&self) -> &str {
        if self.label.is_empty() {
            &self.node_id
        } else {
            &self.label
        }
    }
}

/// The three pools a catalogue supplies to the allocator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidatePools {
    /// New material whose prerequisites are satisfied.
    pub frontier: Vec<Candidate>,
    /// Items due for review.
    pub due: Vec<Candidate>,
    /// Mastered items eligible for fluency drills.
    pub mastered: Vec<Candidate>,
}

impl CandidatePools {
    pub fn is_empty(&self) -> bool {
        self.frontier.is_empty() && self.due.is_empty() && self.mastered.is_empty()
    }
}

/// A planned unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub strand: Strand,
    pub node_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    pub exercise_type: ExerciseType,
    /// Estimated minutes.
    pub duration_estimate: f64,
    pub instructions: String,
}

/// Ordered exercises plus the balance and weights that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPlan {
    pub total_minutes: f64,
    pub exercises: Vec<Exercise>,
    pub balance: StrandBalance,
    /// Weights after blending and normalization, before viability filtering.
    pub weights: StrandWeights,
    /// Minutes allotted to each viable strand.
    pub allocations: StrandWeights,
    pub balance_status: BalanceStatus,
    pub notes: String,
}

impl SessionPlan {
    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }

    /// Sum of exercise duration estimates.
    pub fn estimated_minutes(&self) -> f64 {
        self.exercises.iter().map(|e| e.duration_estimate).sum()
    }

    pub fn count_for(&self, strand: Strand) -> usize {
        self.exercises.iter().filter(|e| e.strand == strand).count()
    }
}

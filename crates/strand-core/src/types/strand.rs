//! Strand taxonomy and the small enums that travel with it.
//!
//! Practice is split across four strands that should each receive roughly a
//! quarter of the learner's time. Strands serialize to snake_case for storage
//! compatibility.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// One of the four learning-activity categories.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Strand {
    /// Meaning-focused input: comprehension of content in context.
    MeaningInput,
    /// Meaning-focused output: producing language to communicate.
    MeaningOutput,
    /// Explicit study of forms, grammar and vocabulary.
    LanguageFocused,
    /// Automaticity drills on already-mastered material.
    Fluency,
}

impl Strand {
    /// All strands in canonical order.
    pub const ALL: [Strand; 4] = [
        Strand::MeaningInput,
        Strand::MeaningOutput,
        Strand::LanguageFocused,
        Strand::Fluency,
    ];

    /// Returns all strand names as static strings.
    pub fn all_names() -> Vec<&'static str> {
        Self::iter().map(|s| s.into()).collect()
    }

    /// Infer a strand from a catalogue node type string.
    ///
    /// Only used at the catalogue boundary for nodes that carry no explicit
    /// strand tag. Unknown types default to meaning output.
    pub fn infer_from_node_type(node_type: &str) -> Strand {
        match node_type {
            "Lexeme" | "Construction" | "Morph" => Strand::LanguageFocused,
            "Topic" => Strand::MeaningInput,
            "CanDo" | "Function" | "DiscourseMove" | "PragmaticCue" | "AssessmentCriterion" => {
                Strand::MeaningOutput
            }
            _ => Strand::MeaningOutput,
        }
    }

    /// The exercise type used for this strand's planned work.
    pub fn exercise_type(&self) -> ExerciseType {
        match self {
            Strand::MeaningInput => ExerciseType::Comprehension,
            Strand::MeaningOutput => ExerciseType::Production,
            Strand::LanguageFocused => ExerciseType::ControlledDrill,
            Strand::Fluency => ExerciseType::SpeedDrill,
        }
    }
}

/// Language skill an item exercises.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Default,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Skill {
    #[default]
    Reading,
    Listening,
    Speaking,
    Writing,
}

/// Kind of activity planned for an exercise.
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
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ExerciseType {
    Comprehension,
    Production,
    ControlledDrill,
    SpeedDrill,
}

/// CEFR proficiency level, ordered A1 < ... < C2.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Default,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
pub enum CefrLevel {
    #[default]
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

impl CefrLevel {
    /// Parse a level leniently; unknown or missing strings fall back to A1.
    pub fn parse_lenient(value: Option<&str>) -> CefrLevel {
        value
            .and_then(|v| v.trim().to_uppercase().parse().ok())
            .unwrap_or_default()
    }

    /// The next level up, or `None` at C2.
    pub fn next(&self) -> Option<CefrLevel> {
        match self {
            CefrLevel::A1 => Some(CefrLevel::A2),
            CefrLevel::A2 => Some(CefrLevel::B1),
            CefrLevel::B1 => Some(CefrLevel::B2),
            CefrLevel::B2 => Some(CefrLevel::C1),
            CefrLevel::C1 => Some(CefrLevel::C2),
            CefrLevel::C2 => None,
        }
    }
}

/// Per-strand selection weights. A neutral set has 1.0 per strand (sum 4.0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrandWeights(BTreeMap<Strand, f64>);

impl StrandWeights {
    /// Neutral weights: 1.0 for every strand.
    pub fn neutral() -> Self {
        Self(Strand::ALL.iter().map(|s| (*s, 1.0)).collect())
    }

    /// No strands at all.
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// Weight for a strand; strands without an entry count as 0.
    pub fn get(&self, strand: Strand) -> f64 {
        self.0.get(&strand).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, strand: Strand, weight: f64) {
        self.0.insert(strand, weight);
    }

    pub fn sum(&self) -> f64 {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Strand, f64)> + '_ {
        self.0.iter().map(|(s, w)| (*s, *w))
    }

    /// Scale every weight so the set sums to `target`.
    ///
    /// Returns `None` when the current sum is not positive or not finite.
    pub fn normalized_to(&self, target: f64) -> Option<Self> {
        let total = self.sum();
        if !total.is_finite() || total <= 0.0 {
            return None;
        }
        Some(Self(
            self.0.iter().map(|(s, w)| (*s, w * target / total)).collect(),
        ))
    }
}

impl Default for StrandWeights {
    fn default() -> Self {
        Self::neutral()
    }
}

impl FromIterator<(Strand, f64)> for StrandWeights {
    fn from_iter<I: IntoIterator<Item = (Strand, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A learner's explicit, possibly partial, strand preference.
///
/// Strands absent from the map keep their system weight unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrandPreference(BTreeMap<Strand, f64>);

impl StrandPreference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, strand: Strand, weight: f64) -> Self {
        self.0.insert(strand, weight);
        self
    }

    pub fn get(&self, strand: Strand) -> Option<f64> {
        self.0.get(&strand).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Strand, f64)> + '_ {
        self.0.iter().map(|(s, w)| (*s, *w))
    }
}

impl FromIterator<(Strand, f64)> for StrandPreference {
    fn from_iter<I: IntoIterator<Item = (Strand, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

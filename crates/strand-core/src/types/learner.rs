//! Learner profile.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::strand::{CefrLevel, Skill};
use crate::error::{StrandError, StrandResult};

/// Per-skill proficiency record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillProficiency {
    /// Highest level the learner handles comfortably; fluency drills stay at or below it.
    pub secure_level: CefrLevel,
}

/// Who is learning and at what level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerProfile {
    pub learner_id: String,
    /// Level that bounds new (frontier) material.
    #[serde(default)]
    pub current_level: CefrLevel,
    #[serde(default)]
    pub proficiency: BTreeMap<Skill, SkillProficiency>,
}

impl LearnerProfile {
    pub fn new(learner_id: impl Into<String>, current_level: CefrLevel) -> Self {
        Self {
            learner_id: learner_id.into(),
            current_level,
            proficiency: BTreeMap::new(),
        }
    }

    pub fn with_secure_level(mut self, skill: Skill, level: CefrLevel) -> Self {
        self.set_secure_level(skill, level);
        self
    }

    /// Secure level for a skill; A1 when nothing is recorded.
    pub fn secure_level(&self, skill: Skill) -> CefrLevel {
        self.proficiency
            .get(&skill)
            .map(|p| p.secure_level)
            .unwrap_or_default()
    }

    pub fn set_secure_level(&mut self, skill: Skill, level: CefrLevel) {
        self.proficiency.entry(skill).or_default().secure_level = level;
    }

    /// Load a profile from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> StrandResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        serde_yaml::from_str(&content).map_err(|e| {
            StrandError::validation_with_suggestion(
                format!("Invalid learner profile: {}", e),
                "Check learner_id, current_level and proficiency entries",
            )
        })
    }

    /// Write the profile back as YAML.
    pub fn save_yaml_file(&self, path: impl AsRef<Path>) -> StrandResult<()> {
        let content = serde_yaml::to_string(self).map_err(|e| StrandError::Internal(e.to_string()))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_yaml() {
        let yaml = r#"
learner_id: ana
current_level: B1
proficiency:
  reading:
    secure_level: A2
  speaking: {}
"#;
        let profile: LearnerProfile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(profile.current_level, CefrLevel::B1);
        assert_eq!(profile.secure_level(Skill::Reading), CefrLevel::A2);
        assert_eq!(profile.secure_level(Skill::Speaking), CefrLevel::A1);
        assert_eq!(profile.secure_level(Skill::Writing), CefrLevel::A1);
    }

    #[test]
    fn test_profile_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("learner.yaml");
        let profile = LearnerProfile::new("ana", CefrLevel::A2)
            .with_secure_level(Skill::Listening, CefrLevel::A2);
        profile.save_yaml_file(&path).unwrap();
        let loaded = LearnerProfile::from_yaml_file(&path).unwrap();
        assert_eq!(loaded, profile);
    }
}

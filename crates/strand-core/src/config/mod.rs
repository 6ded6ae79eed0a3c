//! Configuration system for strand.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{StrandError, StrandResult};
use crate::types::{LookbackWindow, Strand};

/// Default memory-model weights.
pub const DEFAULT_WEIGHTS: [f64; 17] = [
    0.4, 0.6, 2.4, 5.8, 4.93, 0.94, 0.86, 0.01, 1.49, 0.14, 0.94, 2.18, 0.05, 0.34, 1.26, 0.29,
    2.61,
];

/// Longest interval the scheduler will ever produce, in days.
pub const MAX_INTERVAL_DAYS: f64 = 36_500.0;

/// Parameters of the memory-decay model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryModelParams {
    /// Weight table `w0..w16`.
    pub weights: [f64; 17],
    /// Recall probability the next interval aims for.
    pub target_retention: f64,
    /// Floor for stability after any review.
    pub min_stability: f64,
    pub min_interval_days: f64,
    pub max_interval_days: f64,
    /// A failed review keeps at most this fraction of the prior stability.
    pub max_lapse_retention: f64,
    /// Minimum stability gain, in days, for a successful review.
    pub min_recall_gain: f64,
}

impl Default for MemoryModelParams {
    fn default() -> Self {
        Self {
            weights: DEFAULT_WEIGHTS,
            target_retention: 0.9,
            min_stability: 0.1,
            min_interval_days: 1.0,
            max_interval_days: MAX_INTERVAL_DAYS,
            max_lapse_retention: 0.9,
            min_recall_gain: 0.01,
        }
    }
}

/// Thresholds for the mastered label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasteryCriteria {
    pub stability_days: f64,
    pub min_reps: u32,
    pub avg_quality: f64,
}

impl Default for MasteryCriteria {
    fn default() -> Self {
        Self {
            stability_days: 21.0,
            min_reps: 3,
            avg_quality: 3.5,
        }
    }
}

/// Balance tracking and pressure settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceConfig {
    /// Share each strand should receive.
    pub target_share: f64,
    /// Deviations up to this are treated as balanced.
    pub tolerance: f64,
    /// Deviations above this trigger strong pressure.
    pub severe_threshold: f64,
    pub gentle_gain: f64,
    pub strong_gain: f64,
    /// Share of the blended weight taken from the system signal.
    pub system_share: f64,
    pub lookback: LookbackWindow,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            target_share: 0.25,
            tolerance: 0.05,
            severe_threshold: 0.10,
            gentle_gain: 2.0,
            strong_gain: 4.0,
            system_share: 0.7,
            lookback: LookbackWindow::default(),
        }
    }
}

/// Candidate limits and per-exercise estimates for planning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub frontier_limit: usize,
    pub due_limit: usize,
    pub mastered_limit: usize,
    pub meaning_input_minutes: f64,
    pub meaning_output_minutes: f64,
    pub language_focused_minutes: f64,
    pub fluency_minutes: f64,
    /// Weight above which a strand is reported as emphasized.
    pub emphasis_threshold: f64,
}

impl PlannerConfig {
    /// Estimated minutes for one exercise of `strand`.
    pub fn minutes_per_exercise(&self, strand: Strand) -> f64 {
        match strand {
            Strand::MeaningInput => self.meaning_input_minutes,
            Strand::MeaningOutput => self.meaning_output_minutes,
            Strand::LanguageFocused => self.language_focused_minutes,
            Strand::Fluency => self.fluency_minutes,
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            frontier_limit: 20,
            due_limit: 30,
            mastered_limit: 20,
            meaning_input_minutes: 2.0,
            meaning_output_minutes: 1.0,
            language_focused_minutes: 1.0,
            fluency_minutes: 1.0,
            emphasis_threshold: 1.1,
        }
    }
}

/// Session orchestration settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoachConfig {
    /// How long a previewed plan may be reused by `start_session`.
    pub preview_ttl_minutes: i64,
    /// Create unknown items on first score instead of failing.
    pub auto_create_items: bool,
    /// Share of next-level items that must be mastered to promote a secure level.
    pub promotion_ratio: f64,
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self {
            preview_ttl_minutes: 5,
            auto_create_items: true,
            promotion_ratio: 0.8,
        }
    }
}

/// Main strand configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrandConfig {
    pub memory_model: MemoryModelParams,
    pub mastery: MasteryCriteria,
    pub balance: BalanceConfig,
    pub planner: PlannerConfig,
    pub coach: CoachConfig,
    /// Path to the item/history database.
    pub item_db_path: PathBuf,
    /// Path to the catalogue database.
    pub catalogue_db_path: PathBuf,
}

impl Default for StrandConfig {
    fn default() -> Self {
        let strand_dir = dirs::home_dir()
            .map(|h| h.join(".strand"))
            .unwrap_or_else(|| PathBuf::from(".strand"));

        Self {
            memory_model: MemoryModelParams::default(),
            mastery: MasteryCriteria::default(),
            balance: BalanceConfig::default(),
            planner: PlannerConfig::default(),
            coach: CoachConfig::default(),
            item_db_path: strand_dir.join("items.db"),
            catalogue_db_path: strand_dir.join("catalogue.db"),
        }
    }
}

impl StrandConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<std::path::Path>) -> StrandResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        let config: Self = match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| StrandError::Configuration(e.to_string()))?
            }
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| StrandError::Configuration(e.to_string()))?,
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| StrandError::Configuration(e.to_string()))?,
            _ => {
                return Err(StrandError::Configuration(
                    "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
                ))
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables.
    ///
    /// Unparseable numeric values are ignored and the default kept.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(retention) = env_parse::<f64>("STRAND_TARGET_RETENTION") {
            config.memory_model.target_retention = retention;
        }
        if let Ok(path) = std::env::var("STRAND_ITEM_DB_PATH") {
            config.item_db_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("STRAND_CATALOGUE_DB_PATH") {
            config.catalogue_db_path = PathBuf::from(path);
        }
        if let Some(days) = env_parse::<u32>("STRAND_LOOKBACK_DAYS") {
            config.balance.lookback = LookbackWindow::Days(days);
        }
        if let Some(ttl) = env_parse::<i64>("STRAND_PREVIEW_TTL_MINUTES") {
            config.coach.preview_ttl_minutes = ttl;
        }

        config
    }

    /// Build configuration using builder pattern.
    pub fn builder() -> StrandConfigBuilder {
        StrandConfigBuilder::default()
    }

    /// Check every numeric setting once, before any component uses it.
    pub fn validate(&self) -> StrandResult<()> {
        let m = &self.memory_model;
        if !(m.target_retention > 0.0 && m.target_retention < 1.0) {
            return Err(StrandError::InvalidRetentionTarget {
                value: m.target_retention,
            });
        }
        if m.weights.iter().any(|w| !w.is_finite()) {
            return Err(StrandError::Configuration(
                "memory_model.weights must all be finite".to_string(),
            ));
        }
        if !(m.min_stability > 0.0 && m.min_stability.is_finite()) {
            return Err(StrandError::Configuration(
                "memory_model.min_stability must be positive".to_string(),
            ));
        }
        if !(m.min_interval_days > 0.0
            && m.min_interval_days <= m.max_interval_days
            && m.max_interval_days <= MAX_INTERVAL_DAYS)
        {
            return Err(StrandError::Configuration(format!(
                "memory_model interval bounds must satisfy 0 < min <= max <= {}",
                MAX_INTERVAL_DAYS
            )));
        }
        if !(m.max_lapse_retention > 0.0 && m.max_lapse_retention < 1.0) {
            return Err(StrandError::Configuration(
                "memory_model.max_lapse_retention must lie in (0, 1)".to_string(),
            ));
        }
        if !(m.min_recall_gain > 0.0 && m.min_recall_gain.is_finite()) {
            return Err(StrandError::Configuration(
                "memory_model.min_recall_gain must be positive".to_string(),
            ));
        }

        let b = &self.balance;
        if !(b.target_share > 0.0 && b.target_share <= 1.0) {
            return Err(StrandError::Configuration(
                "balance.target_share must lie in (0, 1]".to_string(),
            ));
        }
        if !(b.tolerance >= 0.0 && b.tolerance <= b.severe_threshold) {
            return Err(StrandError::Configuration(
                "balance thresholds must satisfy 0 <= tolerance <= severe_threshold".to_string(),
            ));
        }
        if !(b.gentle_gain.is_finite() && b.strong_gain.is_finite()) {
            return Err(StrandError::Configuration(
                "balance gains must be finite".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&b.system_share) {
            return Err(StrandError::Configuration(
                "balance.system_share must lie in [0, 1]".to_string(),
            ));
        }
        match b.lookback {
            LookbackWindow::Days(0) | LookbackWindow::Sessions(0) => {
                return Err(StrandError::Configuration(
                    "balance.lookback must cover at least one day or session".to_string(),
                ))
            }
            _ => {}
        }

        if Strand::ALL
            .iter()
            .any(|s| !(self.planner.minutes_per_exercise(*s) > 0.0))
        {
            return Err(StrandError::Configuration(
                "planner minutes per exercise must be positive".to_string(),
            ));
        }

        let q = &self.mastery;
        if !(q.stability_days >= 0.0 && (0.0..=5.0).contains(&q.avg_quality)) {
            return Err(StrandError::Configuration(
                "mastery thresholds out of range".to_string(),
            ));
        }

        if !(self.coach.promotion_ratio > 0.0 && self.coach.promotion_ratio <= 1.0) {
            return Err(StrandError::Configuration(
                "coach.promotion_ratio must lie in (0, 1]".to_string(),
            ));
        }

        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparseable environment value");
            None
        }
    }
}

/// Builder for StrandConfig.
#[derive(Default)]
pub struct StrandConfigBuilder {
    config: StrandConfig,
}

impl StrandConfigBuilder {
    /// Set memory-model parameters.
    pub fn memory_model(mut self, params: MemoryModelParams) -> Self {
        self.config.memory_model = params;
        self
    }

    /// Set the target retention for interval computation.
    pub fn target_retention(mut self, retention: f64) -> Self {
        self.config.memory_model.target_retention = retention;
        self
    }

    /// Set mastery thresholds.
    pub fn mastery(mut self, criteria: MasteryCriteria) -> Self {
        self.config.mastery = criteria;
        self
    }

    /// Set balance settings.
    pub fn balance(mut self, config: BalanceConfig) -> Self {
        self.config.balance = config;
        self
    }

    /// Set the balance lookback window.
    pub fn lookback(mut self, window: LookbackWindow) -> Self {
        self.config.balance.lookback = window;
        self
    }

    /// Set planner settings.
    pub fn planner(mut self, config: PlannerConfig) -> Self {
        self.config.planner = config;
        self
    }

    /// Set coach settings.
    pub fn coach(mut self, config: CoachConfig) -> Self {
        self.config.coach = config;
        self
    }

    /// Set item database path.
    pub fn item_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.item_db_path = path.into();
        self
    }

    /// Set catalogue database path.
    pub fn catalogue_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.catalogue_db_path = path.into();
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> StrandResult<StrandConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

//! Encounter configuration model and load-time validation.
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::constants::{BUNDLED_ENCOUNTERS, DEFAULT_FALLBACK_ENCOUNTER, OUTCOME_WEIGHT_TOLERANCE};
use crate::skills::Skill;

/// Failure raised while loading or validating an encounter configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read encounter config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse encounter config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid encounter config: {0}")]
    Invalid(String),
}

impl ConfigError {
    fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid(reason.into())
    }
}

fn is_valid_key(raw: &str) -> bool {
    !raw.is_empty() && !raw.chars().any(char::is_whitespace)
}

/// Identifier of a configured encounter type (e.g. `explore`, `combat_boss`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncounterKey(String);

impl EncounterKey {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        is_valid_key(&self.0)
    }
}

impl Borrow<str> for EncounterKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EncounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inventory item granted as a reward (e.g. `lootbox_tier1`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemKey(String);

impl ItemKey {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        is_valid_key(&self.0)
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Positive/neutral/negative classification of a turn's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeCategory {
    Positive,
    Neutral,
    Negative,
}

impl OutcomeCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }
}

impl fmt::Display for OutcomeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an encounter with several usable skills chooses the one it checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillSelection {
    /// Always check the first listed skill.
    #[default]
    First,
    /// Draw one of the listed skills uniformly.
    Random,
}

/// Tunable engine parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    pub base_fatigue_per_turn: i32,
    pub max_fatigue: i32,
    pub max_turns: u32,
    #[serde(default)]
    pub starting_purse: i64,
    #[serde(default, rename = "skill_check_bonus_money")]
    pub skill_check_bonus: i64,
    pub xp_formula_divisor: i64,
    #[serde(default)]
    pub leader_bonus_reward: Option<ItemKey>,
    #[serde(default)]
    pub win_bonus_reward: Option<ItemKey>,
    #[serde(default)]
    pub win_bonus_money: i64,
    pub party_scale_divisor: i64,
    #[serde(default)]
    pub temp_skill_bonus: f64,
    #[serde(default = "EngineSettings::default_fallback_encounter")]
    pub fallback_encounter: EncounterKey,
}

impl EngineSettings {
    #[must_use]
    pub fn default_fallback_encounter() -> EncounterKey {
        EncounterKey::new(DEFAULT_FALLBACK_ENCOUNTER)
    }
}

/// Mechanical consequences of one outcome branch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EffectsDef {
    #[serde(default)]
    pub fatigue_delta: i32,
    #[serde(default)]
    pub purse_delta: i64,
    #[serde(default)]
    pub reward: Option<ItemKey>,
    #[serde(default)]
    pub ko_scale: u32,
    #[serde(default)]
    pub revive_scale: u32,
    #[serde(default)]
    pub debuff_primary: bool,
    #[serde(default)]
    pub temp_skill: Option<Skill>,
    #[serde(default)]
    pub shift_weights: f64,
}

/// Three sentence fragments rendered into one narrative line.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NarrativeDef {
    #[serde(default)]
    pub surprise: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub outcome: String,
}

impl NarrativeDef {
    #[must_use]
    pub fn new(surprise: &str, action: &str, outcome: &str) -> Self {
        Self {
            surprise: surprise.to_string(),
            action: action.to_string(),
            outcome: outcome.to_string(),
        }
    }

    /// Fragments in render order.
    #[must_use]
    pub fn fragments(&self) -> [&str; 3] {
        [&self.surprise, &self.action, &self.outcome]
    }
}

/// Effects and narrative variants for a skill pass or a skill fail.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OutcomeDetail {
    #[serde(default)]
    pub effects: EffectsDef,
    #[serde(default)]
    pub narratives: Vec<NarrativeDef>,
}

/// One outcome category of an encounter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeDef {
    pub weight: f64,
    pub skill_pass: OutcomeDetail,
    pub skill_fail: OutcomeDetail,
}

impl OutcomeDef {
    /// Branch matching the skill check result.
    #[must_use]
    pub const fn detail(&self, passed: bool) -> &OutcomeDetail {
        if passed {
            &self.skill_pass
        } else {
            &self.skill_fail
        }
    }
}

/// A configured encounter type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounterDef {
    pub display_name: String,
    pub base_weight: f64,
    pub skills: Vec<Skill>,
    #[serde(default)]
    pub min_party: u32,
    #[serde(default)]
    pub skill_selection: SkillSelection,
    pub outcomes: BTreeMap<OutcomeCategory, OutcomeDef>,
}

/// Full encounter configuration, immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounterConfig {
    #[serde(default)]
    pub version: String,
    pub settings: EngineSettings,
    pub intro_narratives: Vec<String>,
    pub encounters: BTreeMap<EncounterKey, EncounterDef>,
}

impl EncounterConfig {
    /// Parse and validate a configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed or fails validation.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable, unparseable, or invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// The configuration compiled into the crate.
    ///
    /// # Errors
    ///
    /// Returns an error if the bundled asset does not validate.
    pub fn bundled() -> Result<Self, ConfigError> {
        Self::from_json(BUNDLED_ENCOUNTERS)
    }

    #[must_use]
    pub fn encounter(&self, key: &str) -> Option<&EncounterDef> {
        self.encounters.get(key)
    }

    /// Check every structural and numeric invariant the engine relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.intro_narratives.is_empty() {
            return Err(ConfigError::invalid("no intro narratives defined"));
        }
        if self.encounters.is_empty() {
            return Err(ConfigError::invalid("no encounters defined"));
        }
        self.validate_settings()?;
        for (key, encounter) in &self.encounters {
            validate_encounter(key, encounter)?;
        }
        Ok(())
    }

    fn validate_settings(&self) -> Result<(), ConfigError> {
        let settings = &self.settings;
        if settings.max_turns == 0 {
            return Err(ConfigError::invalid("max_turns must be positive"));
        }
        if settings.max_fatigue <= 0 {
            return Err(ConfigError::invalid("max_fatigue must be positive"));
        }
        if settings.party_scale_divisor <= 0 {
            return Err(ConfigError::invalid("party_scale_divisor must be positive"));
        }
        if settings.xp_formula_divisor <= 0 {
            return Err(ConfigError::invalid("xp_formula_divisor must be positive"));
        }
        if settings.base_fatigue_per_turn < 0 {
            return Err(ConfigError::invalid(
                "base_fatigue_per_turn must not be negative",
            ));
        }
        if !settings.temp_skill_bonus.is_finite() || settings.temp_skill_bonus < 0.0 {
            return Err(ConfigError::invalid(
                "temp_skill_bonus must be a non-negative number",
            ));
        }
        for (label, reward) in [
            ("leader_bonus_reward", &settings.leader_bonus_reward),
            ("win_bonus_reward", &settings.win_bonus_reward),
        ] {
            if let Some(item) = reward
                && !item.is_valid()
            {
                return Err(ConfigError::Invalid(format!(
                    "{label} \"{item}\" is not a valid item key"
                )));
            }
        }
        if !self.encounters.contains_key(&settings.fallback_encounter) {
            return Err(ConfigError::Invalid(format!(
                "fallback encounter {:?} is not defined",
                settings.fallback_encounter.as_str()
            )));
        }
        Ok(())
    }
}

fn validate_encounter(key: &EncounterKey, encounter: &EncounterDef) -> Result<(), ConfigError> {
    if !key.is_valid() {
        return Err(ConfigError::Invalid(format!(
            "encounter key {:?} is not valid",
            key.as_str()
        )));
    }
    if !encounter.base_weight.is_finite() || encounter.base_weight <= 0.0 {
        return Err(ConfigError::Invalid(format!(
            "encounter \"{key}\" base_weight must be positive"
        )));
    }
    if encounter.skills.is_empty() {
        return Err(ConfigError::Invalid(format!("encounter \"{key}\" has no skills")));
    }
    if encounter.outcomes.is_empty() {
        return Err(ConfigError::Invalid(format!(
            "encounter \"{key}\" has no outcomes"
        )));
    }

    let mut weight_sum = 0.0;
    for (category, outcome) in &encounter.outcomes {
        if !outcome.weight.is_finite() || outcome.weight < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "encounter \"{key}\" outcome {category} has a negative weight"
            )));
        }
        weight_sum += outcome.weight;
        for (branch, detail) in [
            ("skill_pass", &outcome.skill_pass),
            ("skill_fail", &outcome.skill_fail),
        ] {
            if detail.narratives.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "encounter \"{key}\" outcome {category} {branch} has no narratives"
                )));
            }
            if let Some(item) = &detail.effects.reward
                && !item.is_valid()
            {
                return Err(ConfigError::Invalid(format!(
                    "encounter \"{key}\" outcome {category} {branch} reward \"{item}\" is not a valid item key"
                )));
            }
            if !detail.effects.shift_weights.is_finite() {
                return Err(ConfigError::Invalid(format!(
                    "encounter \"{key}\" outcome {category} {branch} shift_weights must be finite"
                )));
            }
        }
    }

    if (weight_sum - 1.0).abs() > OUTCOME_WEIGHT_TOLERANCE {
        return Err(ConfigError::Invalid(format!(
            "encounter \"{key}\" outcome weights sum to {weight_sum:.2} (expected ~1.0)"
        )));
    }
    Ok(())
}

/// Source of an already-validated encounter configuration.
///
/// Platform layers provide implementations; the engine only ever sees the
/// resulting [`EncounterConfig`].
pub trait ConfigSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the encounter configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be produced.
    fn load_encounter_config(&self) -> Result<EncounterConfig, Self::Error>;
}

/// Reads the configuration from a JSON file on disk.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for FileConfigSource {
    type Error = ConfigError;

    fn load_encounter_config(&self) -> Result<EncounterConfig, Self::Error> {
        EncounterConfig::load(&self.path)
    }
}

/// Serves the configuration compiled into the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticConfigSource;

impl ConfigSource for StaticConfigSource {
    type Error = ConfigError;

    fn load_encounter_config(&self) -> Result<EncounterConfig, Self::Error> {
        EncounterConfig::bundled()
    }
}

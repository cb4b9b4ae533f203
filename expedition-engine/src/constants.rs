//! Centralized names and fallbacks for the expedition engine.
//!
//! Tunable balance lives in the encounter configuration; the values here are
//! structural constants that the engine relies on regardless of data.

// Logging ------------------------------------------------------------------
pub(crate) const DEBUG_ENV_VAR: &str = "EXPEDITION_DEBUG_LOGS";

// Selection ----------------------------------------------------------------
/// Encounter used when no configured encounter is eligible for the party.
pub const DEFAULT_FALLBACK_ENCOUNTER: &str = "explore";
/// Lowest weight an outcome category may fall to after a momentum shift.
pub const MIN_OUTCOME_WEIGHT: f64 = 0.01;
/// Allowed deviation from 1.0 for the outcome weights of one encounter.
pub const OUTCOME_WEIGHT_TOLERANCE: f64 = 0.01;
pub(crate) const ENCOUNTER_POOL_ID: &str = "expedition.encounter";
pub(crate) const OUTCOME_POOL_ID: &str = "expedition.outcome";

// Narrative ----------------------------------------------------------------
pub(crate) const PRIMARY_PLACEHOLDER: &str = "{{primary}}";
pub(crate) const SECONDARY_PLACEHOLDER: &str = "{{secondary}}";
/// Name substituted for `{{secondary}}` when nobody else is conscious.
pub const SECONDARY_FALLBACK_NAME: &str = "a companion";
/// Name substituted for `{{primary}}` when the party has nobody to act.
pub const PRIMARY_FALLBACK_NAME: &str = "the party";
pub(crate) const FRAGMENT_SEPARATOR: &str = " ";

// Skill checks -------------------------------------------------------------
/// Floor applied to the highest job level so contributions never divide by zero.
pub const MIN_MAX_JOB_LEVEL: u32 = 1;

// Float comparisons --------------------------------------------------------
pub const FLOAT_EPSILON: f64 = 1e-9;

// Bundled data ---------------------------------------------------------------
pub(crate) const BUNDLED_ENCOUNTERS: &str = include_str!("../assets/encounters.json");

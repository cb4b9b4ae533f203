//! Encounter and outcome selection
//!
//! Both picks are pure functions of the configuration, an explicit bias scalar
//! (run progress or momentum shift), and the caller's RNG stream.
#[cfg(debug_assertions)]
use crate::constants::DEBUG_ENV_VAR;
use crate::config::{EncounterConfig, EncounterDef, EncounterKey, OutcomeCategory, OutcomeDef};
use crate::constants::{ENCOUNTER_POOL_ID, MIN_OUTCOME_WEIGHT, OUTCOME_POOL_ID};
use crate::event::{EventDecisionTrace, WeightFactor, WeightedCandidate};
use crate::numbers::{u32_to_usize, usize_to_f64};
use rand::Rng;
use std::collections::BTreeMap;

#[cfg(debug_assertions)]
fn debug_log_enabled() -> bool {
    matches!(std::env::var(DEBUG_ENV_VAR), Ok(val) if val != "0")
}

#[cfg(not(debug_assertions))]
const fn debug_log_enabled() -> bool {
    false
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncounterPick {
    pub key: EncounterKey,
    /// No configured encounter was eligible and the fallback was used.
    pub fallback: bool,
    pub decision_trace: Option<EventDecisionTrace>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutcomePick {
    pub category: OutcomeCategory,
    pub decision_trace: Option<EventDecisionTrace>,
}

/// Fraction of the run already elapsed when `turn` (1-based) starts.
///
/// Zero on the first turn and strictly below one on the last.
#[must_use]
pub fn run_progress(turn: u32, max_turns: u32) -> f64 {
    if max_turns == 0 {
        return 0.0;
    }
    let elapsed = f64::from(turn.saturating_sub(1).min(max_turns));
    elapsed / f64::from(max_turns)
}

/// Interpolate each base weight toward its normalized inverse as `progress` grows.
///
/// Non-positive base weights stay at zero.
#[must_use]
pub fn effective_encounter_weights(base: &[f64], progress: f64) -> Vec<f64> {
    let progress = progress.clamp(0.0, 1.0);
    let inverted_sum: f64 = base
        .iter()
        .filter(|weight| **weight > 0.0)
        .map(|weight| weight.recip())
        .sum();

    base.iter()
        .map(|&weight| {
            if weight <= 0.0 || inverted_sum <= 0.0 {
                return 0.0;
            }
            let inverted = weight.recip() / inverted_sum;
            weight.mul_add(1.0 - progress, inverted * progress)
        })
        .collect()
}

/// Encounters whose minimum party size is met by `conscious_count`, in key order.
#[must_use]
pub fn eligible_encounters(
    config: &EncounterConfig,
    conscious_count: usize,
) -> Vec<(&EncounterKey, &EncounterDef)> {
    config
        .encounters
        .iter()
        .filter(|(_, encounter)| u32_to_usize(encounter.min_party) <= conscious_count)
        .collect()
}

/// Pick this turn's encounter with progressive inversion applied.
pub fn pick_encounter<R: Rng + ?Sized>(
    config: &EncounterConfig,
    conscious_count: usize,
    progress: f64,
    rng: &mut R,
) -> EncounterPick {
    let candidates = eligible_encounters(config, conscious_count);
    let base: Vec<f64> = candidates
        .iter()
        .map(|(_, encounter)| encounter.base_weight)
        .collect();
    let weights = effective_encounter_weights(&base, progress);

    if debug_log_enabled() {
        println!(
            "Encounter selection | progress:{progress:.3} conscious:{conscious_count} candidates:{}",
            candidates.len()
        );
        for ((key, _), (base_weight, weight)) in candidates.iter().zip(base.iter().zip(&weights)) {
            println!(
                "  {:<16} base:{base_weight:.3} effective:{weight:.3}",
                key.as_str()
            );
        }
    }

    let Some((chosen_idx, roll)) = choose_weighted(&weights, rng) else {
        return EncounterPick {
            key: config.settings.fallback_encounter.clone(),
            fallback: true,
            decision_trace: None,
        };
    };

    let key = candidates[chosen_idx].0.clone();
    let trace_candidates = candidates
        .iter()
        .zip(base.iter().zip(&weights))
        .map(|((candidate, _), (&base_weight, &final_weight))| WeightedCandidate {
            id: candidate.to_string(),
            base_weight,
            multipliers: vec![WeightFactor::new(
                "progress",
                if base_weight > 0.0 {
                    final_weight / base_weight
                } else {
                    1.0
                },
            )],
            final_weight,
        })
        .collect();

    EncounterPick {
        decision_trace: Some(EventDecisionTrace {
            pool_id: String::from(ENCOUNTER_POOL_ID),
            roll,
            candidates: trace_candidates,
            chosen_id: key.to_string(),
        }),
        key,
        fallback: false,
    }
}

/// Average of the accumulated shift modifiers over every configured encounter.
#[must_use]
pub fn momentum_shift(modifiers: &BTreeMap<EncounterKey, f64>, encounter_count: usize) -> f64 {
    if encounter_count == 0 {
        return 0.0;
    }
    modifiers.values().sum::<f64>() / usize_to_f64(encounter_count)
}

/// Outcome weights after moving `shift` from negative to positive, floored at the minimum.
#[must_use]
pub fn shifted_outcome_weights(
    outcomes: &BTreeMap<OutcomeCategory, OutcomeDef>,
    shift: f64,
) -> Vec<(OutcomeCategory, f64)> {
    outcomes
        .iter()
        .map(|(&category, outcome)| {
            let weight = match category {
                OutcomeCategory::Positive => outcome.weight + shift,
                OutcomeCategory::Neutral => outcome.weight,
                OutcomeCategory::Negative => outcome.weight - shift,
            };
            (category, weight.max(MIN_OUTCOME_WEIGHT))
        })
        .collect()
}

/// Pick an outcome category of `encounter` under the current momentum shift.
///
/// Returns `None` only for an encounter without outcomes, which validation rejects.
pub fn pick_outcome<R: Rng + ?Sized>(
    encounter: &EncounterDef,
    shift: f64,
    rng: &mut R,
) -> Option<OutcomePick> {
    let shifted = shifted_outcome_weights(&encounter.outcomes, shift);
    let weights: Vec<f64> = shifted.iter().map(|(_, weight)| *weight).collect();
    let (chosen_idx, roll) = choose_weighted(&weights, rng)?;
    let category = shifted[chosen_idx].0;

    let candidates = shifted
        .iter()
        .map(|(candidate, final_weight)| {
            let base_weight = encounter
                .outcomes
                .get(candidate)
                .map_or(0.0, |outcome| outcome.weight);
            WeightedCandidate {
                id: candidate.to_string(),
                base_weight,
                multipliers: vec![WeightFactor::new("shift", final_weight - base_weight)],
                final_weight: *final_weight,
            }
        })
        .collect();

    Some(OutcomePick {
        category,
        decision_trace: Some(EventDecisionTrace {
            pool_id: String::from(OUTCOME_POOL_ID),
            roll,
            candidates,
            chosen_id: category.to_string(),
        }),
    })
}

/// Single weighted draw over `weights`. Returns the chosen index and the scaled roll.
pub fn choose_weighted<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> Option<(usize, f64)> {
    let total: f64 = weights.iter().filter(|weight| **weight > 0.0).sum();
    if !total.is_finite() || total <= 0.0 {
        return None;
    }

    let roll = rng.r#gen::<f64>() * total;
    let mut cumulative = 0.0;
    let mut last_positive = None;
    for (idx, &weight) in weights.iter().enumerate() {
        if weight <= 0.0 {
            continue;
        }
        cumulative += weight;
        last_positive = Some(idx);
        if roll < cumulative {
            return Some((idx, roll));
        }
    }

    last_positive.map(|idx| (idx, roll))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::FLOAT_EPSILON;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    const PICK_CONFIG: &str = r#"{
        "settings": {
            "base_fatigue_per_turn": 5,
            "max_fatigue": 100,
            "max_turns": 20,
            "xp_formula_divisor": 4,
            "party_scale_divisor": 3
        },
        "intro_narratives": ["Go."],
        "encounters": {
            "explore": {
                "display_name": "Exploration",
                "base_weight": 0.9,
                "skills": ["perception"],
                "min_party": 1,
                "outcomes": {
                    "positive": { "weight": 0.3, "skill_pass": { "narratives": [{ "outcome": "Good" }] }, "skill_fail": { "narratives": [{ "outcome": "Meh" }] } },
                    "neutral": { "weight": 0.4, "skill_pass": { "narratives": [{ "outcome": "Fine" }] }, "skill_fail": { "narratives": [{ "outcome": "Fine" }] } },
                    "negative": { "weight": 0.3, "skill_pass": { "narratives": [{ "outcome": "Close" }] }, "skill_fail": { "narratives": [{ "outcome": "Bad" }] } }
                }
            },
            "combat_boss": {
                "display_name": "Boss",
                "base_weight": 0.1,
                "skills": ["fortitude"],
                "min_party": 3,
                "outcomes": {
                    "positive": { "weight": 0.5, "skill_pass": { "narratives": [{ "outcome": "Win" }] }, "skill_fail": { "narratives": [{ "outcome": "Hurt" }] } },
                    "negative": { "weight": 0.5, "skill_pass": { "narratives": [{ "outcome": "Hurt" }] }, "skill_fail": { "narratives": [{ "outcome": "Ouch" }] } }
                }
            }
        }
    }"#;

    fn config() -> EncounterConfig {
        EncounterConfig::from_json(PICK_CONFIG).unwrap()
    }

    #[test]
    fn progress_starts_at_zero_and_stays_below_one() {
        assert!(run_progress(1, 10).abs() < FLOAT_EPSILON);
        assert!((run_progress(10, 10) - 0.9).abs() < FLOAT_EPSILON);
        assert!(run_progress(0, 10).abs() < FLOAT_EPSILON);
        assert!(run_progress(3, 0).abs() < FLOAT_EPSILON);
    }

    #[test]
    fn inversion_moves_weight_to_rare_encounters() {
        let base = [0.9, 0.1];
        let start = effective_encounter_weights(&base, 0.0);
        assert!((start[0] - 0.9).abs() < FLOAT_EPSILON);
        assert!((start[1] - 0.1).abs() < FLOAT_EPSILON);

        let end = effective_encounter_weights(&base, 1.0);
        assert!((end[0] - 0.1).abs() < FLOAT_EPSILON);
        assert!((end[1] - 0.9).abs() < FLOAT_EPSILON);

        let mid = effective_encounter_weights(&base, 0.5);
        assert!((mid[0] - 0.5).abs() < FLOAT_EPSILON);
        assert!(effective_encounter_weights(&[0.0, 1.0], 0.5)[0].abs() < FLOAT_EPSILON);
    }

    #[test]
    fn min_party_gates_encounters() {
        let config = config();
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        for turn in 1..=20 {
            let pick = pick_encounter(&config, 2, run_progress(turn, 20), &mut rng);
            assert_eq!(pick.key.as_str(), "explore");
            assert!(!pick.fallback);
        }
        assert_eq!(eligible_encounters(&config, 3).len(), 2);
    }

    #[test]
    fn empty_eligible_set_uses_fallback_without_drawing() {
        let config = config();
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let mut untouched = ChaCha20Rng::seed_from_u64(3);
        let pick = pick_encounter(&config, 0, 0.0, &mut rng);
        assert!(pick.fallback);
        assert_eq!(pick.key.as_str(), "explore");
        assert!(pick.decision_trace.is_none());
        assert_eq!(rng.r#gen::<u64>(), untouched.r#gen::<u64>());
    }

    #[test]
    fn late_run_favours_rare_encounter() {
        let config = config();
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let trials = 5_000;
        let count_boss = |progress: f64, rng: &mut ChaCha20Rng| {
            (0..trials)
                .filter(|_| pick_encounter(&config, 3, progress, rng).key.as_str() == "combat_boss")
                .count()
        };
        let early = count_boss(0.0, &mut rng);
        let late = count_boss(0.95, &mut rng);
        assert!(early < 700, "early = {early}");
        assert!(late > 3_800, "late = {late}");
    }

    #[test]
    fn encounter_trace_lists_every_candidate() {
        let config = config();
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let pick = pick_encounter(&config, 4, 0.25, &mut rng);
        let trace = pick.decision_trace.expect("trace");
        assert_eq!(trace.pool_id, ENCOUNTER_POOL_ID);
        assert_eq!(trace.candidates.len(), 2);
        assert_eq!(trace.chosen_id, pick.key.as_str());
    }

    #[test]
    fn momentum_shift_averages_over_all_encounters() {
        let mut mods = BTreeMap::new();
        mods.insert(EncounterKey::new("explore"), 0.3);
        mods.insert(EncounterKey::new("camp"), 0.1);
        assert!((momentum_shift(&mods, 4) - 0.1).abs() < FLOAT_EPSILON);
        assert!(momentum_shift(&mods, 0).abs() < FLOAT_EPSILON);
    }

    #[test]
    fn shift_moves_weight_and_clamps() {
        let config = config();
        let outcomes = &config.encounter("explore").unwrap().outcomes;
        let shifted = shifted_outcome_weights(outcomes, 0.5);
        let lookup = |category: OutcomeCategory| {
            shifted
                .iter()
                .find(|(candidate, _)| *candidate == category)
                .map(|(_, weight)| *weight)
                .unwrap()
        };
        assert!((lookup(OutcomeCategory::Positive) - 0.8).abs() < FLOAT_EPSILON);
        assert!((lookup(OutcomeCategory::Neutral) - 0.4).abs() < FLOAT_EPSILON);
        assert!((lookup(OutcomeCategory::Negative) - MIN_OUTCOME_WEIGHT).abs() < FLOAT_EPSILON);
    }

    #[test]
    fn positive_shift_suppresses_negative_outcomes() {
        let config = config();
        let explore = config.encounter("explore").unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(21);
        let trials = 10_000;
        let negatives = (0..trials)
            .filter_map(|_| pick_outcome(explore, 0.5, &mut rng))
            .filter(|pick| pick.category == OutcomeCategory::Negative)
            .count();
        assert!(negatives < 300, "negatives = {negatives}");

        let baseline = (0..trials)
            .filter_map(|_| pick_outcome(explore, 0.0, &mut rng))
            .filter(|pick| pick.category == OutcomeCategory::Negative)
            .count();
        assert!((2_700..=3_300).contains(&baseline), "baseline = {baseline}");
    }

    #[test]
    fn outcome_trace_records_the_scaled_roll() {
        let config = config();
        let explore = config.encounter("explore").unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(13);
        let trace = pick_outcome(explore, 0.0, &mut rng)
            .unwrap()
            .decision_trace
            .expect("trace");
        assert_eq!(trace.pool_id, OUTCOME_POOL_ID);
        assert!(trace.roll >= 0.0 && trace.roll < 1.0 + FLOAT_EPSILON);
        let value = serde_json::to_value(&trace).unwrap();
        assert!(value["roll"].is_f64());
    }

    #[test]
    fn choose_weighted_skips_empty_weights() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        assert!(choose_weighted(&[], &mut rng).is_none());
        assert!(choose_weighted(&[0.0, 0.0], &mut rng).is_none());
        for _ in 0..100 {
            let (idx, roll) = choose_weighted(&[0.0, 2.0, 0.0], &mut rng).unwrap();
            assert_eq!(idx, 1);
            assert!((0.0..2.0).contains(&roll));
        }
    }
}

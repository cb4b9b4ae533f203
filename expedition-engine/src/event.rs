//! Structured events emitted around an expedition run.
//!
//! Decision traces explain weighted picks inside the engine; notifications are
//! what the orchestration layer publishes once a run has finished.
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::result::{ExpeditionResult, ExpeditionTurn, PartyMemberReward};

/// Explainability telemetry for weighted random selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDecisionTrace {
    /// Identifier for the selection pool (e.g., `expedition.encounter`).
    pub pool_id: String,
    /// Random draw in `[0, total_weight)` used to select from the weighted pool.
    pub roll: f64,
    /// Candidate weights considered during selection.
    pub candidates: Vec<WeightedCandidate>,
    /// Identifier of the selected candidate.
    pub chosen_id: String,
}

/// Candidate weight telemetry captured during selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedCandidate {
    pub id: String,
    pub base_weight: f64,
    /// Adjustments applied in order.
    pub multipliers: Vec<WeightFactor>,
    pub final_weight: f64,
}

/// Single weight factor used in a selection trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightFactor {
    pub label: String,
    pub value: f64,
}

impl WeightFactor {
    #[must_use]
    pub fn new(label: &str, value: f64) -> Self {
        Self {
            label: label.to_string(),
            value,
        }
    }
}

/// Notification published by the orchestration layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExpeditionEvent {
    /// One narrated turn, published in turn order.
    Turn {
        expedition_id: Uuid,
        turn_number: u32,
        narrative: String,
        fatigue: i32,
        purse: i64,
    },
    /// Terminal summary of a run.
    Completed {
        expedition_id: Uuid,
        total_turns: u32,
        won: bool,
        all_knocked_out: bool,
        rewards: Vec<PartyMemberReward>,
    },
}

impl ExpeditionEvent {
    #[must_use]
    pub fn turn(expedition_id: Uuid, turn: &ExpeditionTurn) -> Self {
        Self::Turn {
            expedition_id,
            turn_number: turn.turn_number,
            narrative: turn.narrative.clone(),
            fatigue: turn.fatigue,
            purse: turn.purse_after,
        }
    }

    #[must_use]
    pub fn completed(expedition_id: Uuid, result: &ExpeditionResult) -> Self {
        Self::Completed {
            expedition_id,
            total_turns: result.total_turns,
            won: result.won,
            all_knocked_out: result.all_knocked_out,
            rewards: result.party_rewards.clone(),
        }
    }

    #[must_use]
    pub const fn expedition_id(&self) -> Uuid {
        match self {
            Self::Turn { expedition_id, .. } | Self::Completed { expedition_id, .. } => {
                *expedition_id
            }
        }
    }
}

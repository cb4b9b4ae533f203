//! Terminal run output: journal turns, classification, and rewards.
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::config::{EncounterKey, ItemKey, OutcomeCategory};
use crate::event::EventDecisionTrace;
use crate::skills::Skill;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunEnding {
    /// Reached the turn limit with fatigue and consciousness intact.
    Won,
    /// Fatigue hit the ceiling while someone was still standing.
    Collapsed,
    /// Nobody in the party remained conscious.
    AllKnockedOut,
}

impl RunEnding {
    #[must_use]
    pub const fn is_win(self) -> bool {
        matches!(self, Self::Won)
    }
}

impl fmt::Display for RunEnding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Won => write!(f, "won"),
            Self::Collapsed => write!(f, "collapsed"),
            Self::AllKnockedOut => write!(f, "all_knocked_out"),
        }
    }
}

/// Immutable audit record of one turn. Turn 0 carries the intro narrative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpeditionTurn {
    pub turn_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encounter: Option<EncounterKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<OutcomeCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_checked: Option<Skill>,
    pub skill_passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_member: Option<String>,
    pub narrative: String,
    pub fatigue: i32,
    pub purse_after: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_trace: Option<EventDecisionTrace>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome_trace: Option<EventDecisionTrace>,
}

impl ExpeditionTurn {
    /// The synthetic opening entry.
    #[must_use]
    pub fn intro(narrative: String, fatigue: i32, purse: i64) -> Self {
        Self {
            turn_number: 0,
            encounter: None,
            outcome: None,
            skill_checked: None,
            skill_passed: false,
            primary_member: None,
            narrative,
            fatigue,
            purse_after: purse,
            decision_trace: None,
            outcome_trace: None,
        }
    }

    #[must_use]
    pub const fn is_intro(&self) -> bool {
        self.turn_number == 0
    }
}

/// Everything one member takes home from a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyMemberReward {
    pub user_id: Uuid,
    pub username: String,
    pub money: i64,
    pub items: Vec<ItemKey>,
    pub xp: i64,
    pub is_leader: bool,
}

/// Aggregate terminal state of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpeditionResult {
    pub seed: u64,
    pub total_turns: u32,
    pub ending: RunEnding,
    pub won: bool,
    pub all_knocked_out: bool,
    pub final_fatigue: i32,
    pub final_purse: i64,
    pub journal: Vec<ExpeditionTurn>,
    pub party_rewards: Vec<PartyMemberReward>,
}

impl ExpeditionResult {
    /// Journal entries after the intro.
    pub fn turns(&self) -> impl Iterator<Item = &ExpeditionTurn> {
        self.journal.iter().filter(|turn| !turn.is_intro())
    }

    #[must_use]
    pub fn leader(&self) -> Option<&PartyMemberReward> {
        self.party_rewards.iter().find(|reward| reward.is_leader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intro_turn_skips_empty_fields_when_serialized() {
        let intro = ExpeditionTurn::intro(String::from("We set out."), 0, 100);
        assert!(intro.is_intro());
        let value = serde_json::to_value(&intro).unwrap();
        assert_eq!(value["turn_number"], 0);
        assert!(value.get("encounter").is_none());
        assert!(value.get("primary_member").is_none());
        assert_eq!(value["purse_after"], 100);
    }

    #[test]
    fn ending_labels_are_stable() {
        assert_eq!(RunEnding::Won.to_string(), "won");
        assert_eq!(RunEnding::AllKnockedOut.to_string(), "all_knocked_out");
        assert!(RunEnding::Won.is_win());
        assert!(!RunEnding::Collapsed.is_win());
    }
}

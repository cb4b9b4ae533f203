//! Read-only renderings of a finished run.
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::config::{EncounterKey, OutcomeCategory};
use crate::result::{ExpeditionResult, ExpeditionTurn, PartyMemberReward, RunEnding};
use crate::skills::Skill;

/// Display-oriented journal row for incremental consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub turn_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encounter_type: Option<EncounterKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<OutcomeCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_checked: Option<Skill>,
    pub skill_passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_member: Option<String>,
    pub narrative: String,
    pub fatigue: i32,
    pub purse: i64,
}

impl From<&ExpeditionTurn> for JournalEntry {
    fn from(turn: &ExpeditionTurn) -> Self {
        Self {
            turn_number: turn.turn_number,
            encounter_type: turn.encounter.clone(),
            outcome: turn.outcome,
            skill_checked: turn.skill_checked,
            skill_passed: turn.skill_passed,
            primary_member: turn.primary_member.clone(),
            narrative: turn.narrative.clone(),
            fatigue: turn.fatigue,
            purse: turn.purse_after,
        }
    }
}

/// One entry per journal turn, intro included.
#[must_use]
pub fn format_entries(result: &ExpeditionResult) -> Vec<JournalEntry> {
    result.journal.iter().map(JournalEntry::from).collect()
}

/// Summary line for a run ending.
#[must_use]
pub const fn ending_line(ending: RunEnding) -> &'static str {
    match ending {
        RunEnding::Won => "The expedition has seen all there is to see!",
        RunEnding::AllKnockedOut => "The entire party was knocked out!",
        RunEnding::Collapsed => "The party collapsed from exhaustion.",
    }
}

/// `name[ (Leader)]: M money, X xp, items|none`
#[must_use]
pub fn reward_line(reward: &PartyMemberReward) -> String {
    let leader_tag = if reward.is_leader { " (Leader)" } else { "" };
    let items = if reward.items.is_empty() {
        String::from("none")
    } else {
        reward
            .items
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "{}{leader_tag}: {} money, {} xp, {items}",
        reward.username, reward.money, reward.xp
    )
}

/// Human-readable transcript of the whole run.
#[must_use]
pub fn format_transcript(result: &ExpeditionResult) -> String {
    let mut out = String::new();

    for turn in &result.journal {
        out.push_str(&turn.narrative);
        out.push('\n');
        if turn.is_intro() {
            out.push_str("---\n");
        }
    }

    out.push_str("---\n");
    out.push_str(ending_line(result.ending));
    out.push('\n');
    let _ = writeln!(
        out,
        "Turns: {} | Final Fatigue: {}",
        result.total_turns, result.final_fatigue
    );

    out.push_str("---\nRewards:\n");
    for reward in &result.party_rewards {
        out.push_str(&reward_line(reward));
        out.push('\n');
    }
    out
}

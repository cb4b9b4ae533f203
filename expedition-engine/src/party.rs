//! Run-scoped party member state.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::config::ItemKey;
use crate::skills::Skill;

/// One-use skill grants held inline without additional allocations.
pub type TempSkills = SmallVec<[Skill; 2]>;

/// Job-level snapshot of one participant, supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantSnapshot {
    pub id: Uuid,
    pub username: String,
    #[serde(default)]
    pub job_levels: BTreeMap<String, u32>,
}

impl ParticipantSnapshot {
    #[must_use]
    pub fn new(id: Uuid, username: impl Into<String>, job_levels: BTreeMap<String, u32>) -> Self {
        Self {
            id,
            username: username.into(),
            job_levels,
        }
    }
}

/// Mutable state of one member for the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyMemberState {
    pub id: Uuid,
    pub username: String,
    pub job_levels: BTreeMap<String, u32>,
    pub conscious: bool,
    pub debuffed: bool,
    #[serde(default)]
    pub temp_skills: TempSkills,
    pub prize_money: i64,
    #[serde(default)]
    pub prize_items: Vec<ItemKey>,
}

impl PartyMemberState {
    #[must_use]
    pub fn new(id: Uuid, username: impl Into<String>, job_levels: BTreeMap<String, u32>) -> Self {
        Self {
            id,
            username: username.into(),
            job_levels,
            conscious: true,
            debuffed: false,
            temp_skills: TempSkills::new(),
            prize_money: 0,
            prize_items: Vec::new(),
        }
    }

    /// Level in `job`, zero when the member has never taken it.
    #[must_use]
    pub fn level(&self, job: &str) -> u32 {
        self.job_levels.get(job).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn has_temp_skill(&self, skill: Skill) -> bool {
        self.temp_skills.contains(&skill)
    }

    pub fn grant_temp_skill(&mut self, skill: Skill) {
        self.temp_skills.push(skill);
    }

    pub fn knock_out(&mut self) {
        self.conscious = false;
    }

    /// Bring the member back with any debuff cleared.
    pub fn revive(&mut self) {
        self.conscious = true;
        self.debuffed = false;
    }
}

impl From<ParticipantSnapshot> for PartyMemberState {
    fn from(snapshot: ParticipantSnapshot) -> Self {
        Self::new(snapshot.id, snapshot.username, snapshot.job_levels)
    }
}

/// Party indices of every conscious member, in party order.
#[must_use]
pub fn conscious_indices(party: &[PartyMemberState]) -> Vec<usize> {
    party
        .iter()
        .enumerate()
        .filter_map(|(idx, member)| member.conscious.then_some(idx))
        .collect()
}

#[must_use]
pub fn conscious_count(party: &[PartyMemberState]) -> usize {
    party.iter().filter(|member| member.conscious).count()
}

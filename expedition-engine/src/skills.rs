//! Proportional multi-member skill checks.
//!
//! Every conscious member contributes `level / max_level` for the job mapped
//! to the checked skill. Contributions are laid out as half-open intervals on
//! `[0, total)`; a uniform roll inside the table passes and names the member
//! whose interval holds it, a roll past the end fails.
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::MIN_MAX_JOB_LEVEL;
use crate::party::PartyMemberState;

/// Skill an encounter can check, each backed by one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Skill {
    Fortitude,
    Perception,
    Survival,
    Cunning,
    Persuasion,
    Knowledge,
}

impl Skill {
    pub const ALL: [Self; 6] = [
        Self::Fortitude,
        Self::Perception,
        Self::Survival,
        Self::Cunning,
        Self::Persuasion,
        Self::Knowledge,
    ];

    /// Job whose level drives this skill.
    #[must_use]
    pub const fn job_key(self) -> &'static str {
        match self {
            Self::Fortitude => "blacksmith",
            Self::Perception => "explorer",
            Self::Survival => "farmer",
            Self::Cunning => "gambler",
            Self::Persuasion => "merchant",
            Self::Knowledge => "scholar",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fortitude => "fortitude",
            Self::Perception => "perception",
            Self::Survival => "survival",
            Self::Cunning => "cunning",
            Self::Persuasion => "persuasion",
            Self::Knowledge => "knowledge",
        }
    }

    /// Every job key reachable from a skill, in skill order.
    #[must_use]
    pub fn job_keys() -> [&'static str; 6] {
        Self::ALL.map(Self::job_key)
    }
}

impl fmt::Display for Skill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One member's slice of the skill check probability table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkillContribution {
    /// Index of the member in the party slice.
    pub member: usize,
    pub contribution: f64,
    pub cum_start: f64,
    pub cum_end: f64,
}

impl SkillContribution {
    #[must_use]
    pub fn contains(&self, roll: f64) -> bool {
        roll >= self.cum_start && roll < self.cum_end
    }
}

/// Result of a single skill check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkillCheck {
    pub passed: bool,
    /// Party index of the member credited with the attempt.
    pub actor: Option<usize>,
    /// The actor held a matching temporary grant when the check was rolled.
    pub used_temp_skill: bool,
}

impl SkillCheck {
    const fn failed(actor: Option<usize>) -> Self {
        Self {
            passed: false,
            actor,
            used_temp_skill: false,
        }
    }
}

/// Highest level held by any member in any job, floored at 1.
#[must_use]
pub fn find_max_job_level(members: &[PartyMemberState]) -> u32 {
    members
        .iter()
        .flat_map(|member| member.job_levels.values().copied())
        .fold(MIN_MAX_JOB_LEVEL, u32::max)
}

/// Build the cumulative contribution table for `skill` over the conscious members.
#[must_use]
pub fn build_skill_table(
    skill: Skill,
    members: &[PartyMemberState],
    max_level: u32,
    temp_bonus: f64,
) -> Vec<SkillContribution> {
    let divisor = f64::from(max_level.max(MIN_MAX_JOB_LEVEL));
    let mut table = Vec::with_capacity(members.len());
    let mut cumulative = 0.0;

    for (idx, member) in members.iter().enumerate() {
        if !member.conscious {
            continue;
        }
        let mut contribution = f64::from(member.level(skill.job_key())) / divisor;
        if member.has_temp_skill(skill) {
            contribution += temp_bonus;
        }
        if contribution <= 0.0 {
            continue;
        }
        table.push(SkillContribution {
            member: idx,
            contribution,
            cum_start: cumulative,
            cum_end: cumulative + contribution,
        });
        cumulative += contribution;
    }

    table
}

/// Roll a skill check for the conscious members of `members`.
///
/// A party with no positive contribution always fails; the first conscious
/// member (if any) is credited. On a failed roll the strongest contributor is
/// credited, earliest member winning ties.
pub fn resolve_skill_check<R: Rng + ?Sized>(
    rng: &mut R,
    skill: Skill,
    members: &[PartyMemberState],
    max_level: u32,
    temp_bonus: f64,
) -> SkillCheck {
    let table = build_skill_table(skill, members, max_level, temp_bonus);
    let Some(last) = table.last() else {
        let first_conscious = members.iter().position(|member| member.conscious);
        return SkillCheck::failed(first_conscious);
    };

    let total = last.cum_end;
    let roll = rng.r#gen::<f64>();

    let (passed, actor) = if roll >= total {
        let mut best = table[0];
        for entry in &table[1..] {
            if entry.contribution > best.contribution {
                best = *entry;
            }
        }
        (false, best.member)
    } else {
        let actor = table
            .iter()
            .find(|entry| entry.contains(roll))
            .map_or(table[0].member, |entry| entry.member);
        (true, actor)
    };

    SkillCheck {
        passed,
        actor: Some(actor),
        used_temp_skill: members[actor].has_temp_skill(skill),
    }
}

/// Remove one matching temporary grant. Returns whether anything was removed.
pub fn consume_temp_skill(member: &mut PartyMemberState, skill: Skill) -> bool {
    if let Some(pos) = member.temp_skills.iter().position(|held| *held == skill) {
        member.temp_skills.remove(pos);
        true
    } else {
        false
    }
}

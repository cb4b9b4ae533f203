//! Turn engine driving a single expedition run to completion.
use log::{debug, info, warn};
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::config::{EffectsDef, EncounterConfig, EncounterKey, SkillSelection};
use crate::encounters::{momentum_shift, pick_encounter, pick_outcome, run_progress};
use crate::narrative::{pick_intro, render_narrative};
use crate::numbers::{ceil_div_i64, u32_to_usize, usize_to_i64};
use crate::party::{PartyMemberState, conscious_count, conscious_indices};
use crate::result::{ExpeditionResult, ExpeditionTurn, PartyMemberReward, RunEnding};
use crate::rng::RngBundle;
use crate::scaling::scale_effect;
use crate::skills::{consume_temp_skill, find_max_job_level, resolve_skill_check};

/// Precondition failures detected before any turn executes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("expedition party is empty")]
    EmptyParty,
    #[error("encounter config defines no encounters")]
    NoEncounters,
    #[error("encounter config defines no intro narratives")]
    NoIntroNarratives,
    #[error("encounter config max_turns must be positive")]
    NoTurns,
    #[error("fallback encounter \"{0}\" is not defined")]
    MissingFallback(EncounterKey),
}

/// Mutable per-run totals threaded through the turn loop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunContext {
    pub turn: u32,
    pub fatigue: i32,
    pub purse: i64,
    /// Accumulated momentum per encounter type. Every shift lands on all types,
    /// so their average is the run's total shift.
    pub weight_modifiers: BTreeMap<EncounterKey, f64>,
    pub journal: Vec<ExpeditionTurn>,
}

/// Single-pass simulation of one expedition.
#[derive(Debug, Clone)]
pub struct ExpeditionEngine<'a> {
    config: &'a EncounterConfig,
    party: Vec<PartyMemberState>,
    rng: RngBundle,
    context: RunContext,
    max_job_level: u32,
}

impl<'a> ExpeditionEngine<'a> {
    /// Prepare a run. Party member 0 is the leader.
    ///
    /// # Errors
    ///
    /// Returns an error if the party is empty or the configuration cannot
    /// drive a run at all.
    pub fn new(
        config: &'a EncounterConfig,
        party: Vec<PartyMemberState>,
        seed: u64,
    ) -> Result<Self, EngineError> {
        if party.is_empty() {
            return Err(EngineError::EmptyParty);
        }
        if config.encounters.is_empty() {
            return Err(EngineError::NoEncounters);
        }
        if config.intro_narratives.is_empty() {
            return Err(EngineError::NoIntroNarratives);
        }
        if config.settings.max_turns == 0 {
            return Err(EngineError::NoTurns);
        }
        let fallback = &config.settings.fallback_encounter;
        if !config.encounters.contains_key(fallback) {
            return Err(EngineError::MissingFallback(fallback.clone()));
        }

        let max_job_level = find_max_job_level(&party);
        Ok(Self {
            config,
            party,
            rng: RngBundle::from_user_seed(seed),
            context: RunContext {
                purse: config.settings.starting_purse.max(0),
                ..RunContext::default()
            },
            max_job_level,
        })
    }

    #[must_use]
    pub fn party(&self) -> &[PartyMemberState] {
        &self.party
    }

    #[must_use]
    pub const fn context(&self) -> &RunContext {
        &self.context
    }

    /// Execute every turn and compute the terminal result.
    #[must_use]
    pub fn run(mut self) -> ExpeditionResult {
        info!(
            "expedition run starting: seed={} party={} max_turns={}",
            self.rng.seed(),
            self.party.len(),
            self.config.settings.max_turns
        );

        let intro = pick_intro(self.config, self.rng.narrative());
        self.context.journal.push(ExpeditionTurn::intro(
            intro,
            self.context.fatigue,
            self.context.purse,
        ));

        while self.is_running() {
            self.run_turn();
        }

        let ending = self.classify();
        let party_rewards = self.distribute_rewards(ending);
        info!(
            "expedition run finished: ending={ending} turns={} fatigue={} purse={} draws={}",
            self.context.turn,
            self.context.fatigue,
            self.context.purse,
            self.rng.total_draws()
        );

        ExpeditionResult {
            seed: self.rng.seed(),
            total_turns: self.context.turn,
            ending,
            won: ending.is_win(),
            all_knocked_out: ending == RunEnding::AllKnockedOut,
            final_fatigue: self.context.fatigue,
            final_purse: self.context.purse,
            journal: self.context.journal,
            party_rewards,
        }
    }

    fn is_running(&self) -> bool {
        let settings = &self.config.settings;
        self.context.turn < settings.max_turns
            && self.context.fatigue < settings.max_fatigue
            && conscious_count(&self.party) > 0
    }

    fn classify(&self) -> RunEnding {
        if conscious_count(&self.party) == 0 {
            RunEnding::AllKnockedOut
        } else if self.context.fatigue >= self.config.settings.max_fatigue {
            RunEnding::Collapsed
        } else {
            RunEnding::Won
        }
    }

    fn run_turn(&mut self) {
        let config = self.config;
        let settings = &config.settings;
        self.context.turn += 1;
        let turn = self.context.turn;

        let progress = run_progress(turn, settings.max_turns);
        let pick = pick_encounter(
            config,
            conscious_count(&self.party),
            progress,
            self.rng.encounter(),
        );
        let Some(encounter) = config.encounter(pick.key.as_str()) else {
            warn!("turn {turn}: encounter {} is not configured", pick.key);
            self.add_fatigue(0);
            return;
        };

        let shift = momentum_shift(&self.context.weight_modifiers, config.encounters.len());
        let Some(outcome_pick) = pick_outcome(encounter, shift, self.rng.outcome()) else {
            warn!("turn {turn}: encounter {} has no outcomes", pick.key);
            self.add_fatigue(0);
            return;
        };
        let Some(outcome) = encounter.outcomes.get(&outcome_pick.category) else {
            self.add_fatigue(0);
            return;
        };

        let Some(&first_skill) = encounter.skills.first() else {
            self.add_fatigue(0);
            return;
        };
        let skill = match encounter.skill_selection {
            SkillSelection::First => first_skill,
            SkillSelection::Random => {
                let idx = self.rng.skill().gen_range(0..encounter.skills.len());
                encounter.skills[idx]
            }
        };

        let check = resolve_skill_check(
            self.rng.skill(),
            skill,
            &self.party,
            self.max_job_level,
            settings.temp_skill_bonus,
        );
        let mut passed = check.passed;
        if let Some(actor) = check.actor
            && self.party[actor].debuffed
        {
            passed = false;
            self.party[actor].debuffed = false;
        }

        let detail = outcome.detail(passed);
        self.apply_effects(&detail.effects, check.actor, passed, &pick.key);

        let narrative = render_narrative(detail, check.actor, &self.party, self.rng.narrative());

        if check.used_temp_skill
            && let Some(actor) = check.actor
        {
            consume_temp_skill(&mut self.party[actor], skill);
        }

        let primary_member = check
            .actor
            .map(|actor| self.party[actor].username.clone());
        debug!(
            "turn {turn}: encounter={} outcome={} skill={skill} passed={passed} actor={} fatigue={} purse={}",
            pick.key,
            outcome_pick.category,
            primary_member.as_deref().unwrap_or("-"),
            self.context.fatigue,
            self.context.purse
        );

        self.context.journal.push(ExpeditionTurn {
            turn_number: turn,
            encounter: Some(pick.key),
            outcome: Some(outcome_pick.category),
            skill_checked: Some(skill),
            skill_passed: passed,
            primary_member,
            narrative,
            fatigue: self.context.fatigue,
            purse_after: self.context.purse,
            decision_trace: pick.decision_trace,
            outcome_trace: outcome_pick.decision_trace,
        });
    }

    fn add_fatigue(&mut self, delta: i32) {
        let gained = self
            .config
            .settings
            .base_fatigue_per_turn
            .saturating_add(delta);
        self.context.fatigue = self.context.fatigue.saturating_add(gained).max(0);
    }

    fn apply_effects(
        &mut self,
        effects: &EffectsDef,
        actor: Option<usize>,
        passed: bool,
        encounter: &EncounterKey,
    ) {
        let config = self.config;
        let settings = &config.settings;
        let party_size = self.party.len();

        self.add_fatigue(effects.fatigue_delta);

        let purse_delta =
            scale_effect(effects.purse_delta, party_size, settings.party_scale_divisor);
        self.context.purse = self.context.purse.saturating_add(purse_delta).max(0);
        if passed && effects.purse_delta >= 0 {
            self.context.purse = self.context.purse.saturating_add(settings.skill_check_bonus);
        }

        if effects.ko_scale > 0 {
            self.knock_out(u32_to_usize(effects.ko_scale));
        }
        if effects.revive_scale > 0 {
            self.revive(u32_to_usize(effects.revive_scale));
        }

        if let Some(actor) = actor.and_then(|idx| self.party.get_mut(idx)) {
            if effects.debuff_primary {
                actor.debuffed = true;
            }
            if let Some(skill) = effects.temp_skill {
                actor.grant_temp_skill(skill);
            }
            if let Some(item) = &effects.reward {
                let copies = scale_effect(1, party_size, settings.party_scale_divisor);
                for _ in 0..copies {
                    actor.prize_items.push(item.clone());
                }
            }
        }

        if effects.shift_weights != 0.0 {
            debug!("momentum shift {:+} from {encounter}", effects.shift_weights);
            for key in config.encounters.keys() {
                *self
                    .context
                    .weight_modifiers
                    .entry(key.clone())
                    .or_insert(0.0) += effects.shift_weights;
            }
        }
    }

    /// Knock out up to `count` distinct conscious members chosen at random.
    fn knock_out(&mut self, count: usize) {
        let conscious = conscious_indices(&self.party);
        let targets: Vec<usize> = conscious
            .choose_multiple(self.rng.party(), count.min(conscious.len()))
            .copied()
            .collect();
        for idx in targets {
            self.party[idx].knock_out();
        }
    }

    /// Revive up to `count` knocked-out members in party order.
    fn revive(&mut self, count: usize) {
        self.party
            .iter_mut()
            .filter(|member| !member.conscious)
            .take(count)
            .for_each(PartyMemberState::revive);
    }

    fn distribute_rewards(&mut self, ending: RunEnding) -> Vec<PartyMemberReward> {
        let config = self.config;
        let settings = &config.settings;
        let party_size = usize_to_i64(self.party.len());
        let purse = self.context.purse;
        let share = purse / party_size;
        let remainder = purse % party_size;
        let xp = experience_award(
            purse,
            self.party.len(),
            settings.xp_formula_divisor,
            settings.party_scale_divisor,
            self.context.turn,
        );

        self.party
            .iter_mut()
            .enumerate()
            .map(|(idx, member)| {
                let is_leader = idx == 0;
                member.prize_money = member.prize_money.saturating_add(share);
                if is_leader {
                    member.prize_money = member.prize_money.saturating_add(remainder);
                    if let Some(item) = &settings.leader_bonus_reward {
                        member.prize_items.push(item.clone());
                    }
                }
                if ending.is_win() {
                    if let Some(item) = &settings.win_bonus_reward {
                        member.prize_items.push(item.clone());
                    }
                    member.prize_money =
                        member.prize_money.saturating_add(settings.win_bonus_money);
                }
                PartyMemberReward {
                    user_id: member.id,
                    username: member.username.clone(),
                    money: member.prize_money,
                    items: member.prize_items.clone(),
                    xp,
                    is_leader,
                }
            })
            .collect()
    }
}

/// XP granted to every member for a finished run.
///
/// `purse / (xp_divisor * ceil(party_size / party_divisor))`, at least 1 once a
/// turn has run.
#[must_use]
pub fn experience_award(
    purse: i64,
    party_size: usize,
    xp_divisor: i64,
    party_divisor: i64,
    turns: u32,
) -> i64 {
    let floor = i64::from(turns > 0);
    let party_factor = ceil_div_i64(usize_to_i64(party_size), party_divisor);
    let denominator = xp_divisor.saturating_mul(party_factor);
    if denominator <= 0 {
        return floor;
    }
    (purse.max(0) / denominator).max(floor)
}

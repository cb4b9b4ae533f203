use expedition_engine::{
    EffectsDef, EncounterConfig, ExpeditionEngine, ExpeditionResult, ItemKey, PartyMemberState,
    RunEnding, Skill, format_entries, format_transcript,
};
use std::collections::BTreeMap;
use std::hash::Hasher;
use twox_hash::XxHash64;
use uuid::Uuid;

fn bundled() -> EncounterConfig {
    EncounterConfig::bundled().unwrap()
}

fn party(size: usize) -> Vec<PartyMemberState> {
    (0..size)
        .map(|idx| {
            let level = u32::try_from(idx).unwrap() * 3 + 2;
            let levels: BTreeMap<String, u32> = Skill::job_keys()
                .iter()
                .enumerate()
                .map(|(job_idx, job)| {
                    let offset = u32::try_from(job_idx).unwrap();
                    ((*job).to_string(), (level + offset * 2) % 17)
                })
                .collect();
            let id = Uuid::from_u128(u128::try_from(idx).unwrap() + 1);
            PartyMemberState::new(id, format!("member{idx}"), levels)
        })
        .collect()
}

fn edit_effects(config: &mut EncounterConfig, mut edit: impl FnMut(&mut EffectsDef)) {
    for encounter in config.encounters.values_mut() {
        for outcome in encounter.outcomes.values_mut() {
            edit(&mut outcome.skill_pass.effects);
            edit(&mut outcome.skill_fail.effects);
        }
    }
}

fn run(config: &EncounterConfig, size: usize, seed: u64) -> ExpeditionResult {
    ExpeditionEngine::new(config, party(size), seed).unwrap().run()
}

fn digest(result: &ExpeditionResult) -> u64 {
    let bytes = serde_json::to_vec(result).unwrap();
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(&bytes);
    hasher.finish()
}

#[test]
fn calm_short_runs_are_won() {
    let mut config = bundled();
    config.settings.max_turns = 3;
    edit_effects(&mut config, |effects| {
        effects.fatigue_delta = 0;
        effects.ko_scale = 0;
    });

    for seed in 0..50 {
        let result = run(&config, 3, seed);
        assert_eq!(result.ending, RunEnding::Won, "seed {seed}");
        assert!(result.won);
        assert_eq!(result.total_turns, 3);
        assert_eq!(result.journal.len(), 4);
    }
}

#[test]
fn overwhelming_knockouts_end_the_run() {
    let mut config = bundled();
    edit_effects(&mut config, |effects| {
        effects.ko_scale = 10;
        effects.revive_scale = 0;
        effects.fatigue_delta = 0;
    });

    for seed in 0..20 {
        let result = run(&config, 2, seed);
        assert_eq!(result.ending, RunEnding::AllKnockedOut, "seed {seed}");
        assert!(result.all_knocked_out);
        assert!(!result.won);
        assert_eq!(result.total_turns, 1);
    }
}

#[test]
fn unavoidable_fatigue_collapses_the_party() {
    let mut config = bundled();
    config.settings.max_fatigue = 10;
    edit_effects(&mut config, |effects| {
        effects.fatigue_delta = 0;
        effects.ko_scale = 0;
    });

    let result = run(&config, 1, 99);
    assert_eq!(result.ending, RunEnding::Collapsed);
    assert!(!result.won);
    assert!(!result.all_knocked_out);
    assert!(result.final_fatigue >= 10);
    assert_eq!(result.total_turns, 2);
}

#[test]
fn every_run_terminates_within_the_turn_limit() {
    let config = bundled();
    let max_turns = config.settings.max_turns;
    for size in 1..=6 {
        for seed in 0..60 {
            let result = run(&config, size, seed);
            assert!(result.total_turns >= 1);
            assert!(result.total_turns <= max_turns);
            assert_eq!(result.journal.len(), usize::try_from(result.total_turns).unwrap() + 1);
            match result.ending {
                RunEnding::Won => {
                    assert_eq!(result.total_turns, max_turns);
                    assert!(result.final_fatigue < config.settings.max_fatigue);
                }
                RunEnding::Collapsed => {
                    assert!(result.final_fatigue >= config.settings.max_fatigue);
                }
                RunEnding::AllKnockedOut => assert!(result.all_knocked_out),
            }
        }
    }
}

#[test]
fn journal_opens_with_an_intro() {
    let config = bundled();
    for seed in 0..25 {
        let result = run(&config, 3, seed);
        let intro = &result.journal[0];
        assert_eq!(intro.turn_number, 0);
        assert!(config.intro_narratives.contains(&intro.narrative));
        assert!(intro.encounter.is_none());

        for (idx, turn) in result.turns().enumerate() {
            assert_eq!(turn.turn_number, u32::try_from(idx).unwrap() + 1);
            assert!(turn.encounter.is_some());
            assert!(turn.narrative.ends_with(['.', '!', '?']));
        }
    }
}

#[test]
fn identical_inputs_replay_identically() {
    let config = bundled();
    for seed in [1_u64, 42, 0xDEAD_BEEF] {
        let first = run(&config, 4, seed);
        let second = run(&config, 4, seed);
        assert_eq!(first, second);
        assert_eq!(digest(&first), digest(&second));
        assert_eq!(format_transcript(&first), format_transcript(&second));
    }
    assert_ne!(digest(&run(&config, 4, 1)), digest(&run(&config, 4, 2)));
}

#[test]
fn rewards_follow_the_split_and_bonus_rules() {
    let config = bundled();
    let settings = &config.settings;
    let leader_item = settings.leader_bonus_reward.clone().unwrap();
    let win_item = settings.win_bonus_reward.clone().unwrap();

    for seed in 0..40 {
        let result = run(&config, 4, seed);
        assert_eq!(result.party_rewards.len(), 4);
        let leader = result.leader().unwrap();
        assert_eq!(leader.username, "member0");
        assert!(leader.items.contains(&leader_item));
        assert!(result.party_rewards.iter().all(|reward| reward.xp >= 1));
        let xp = result.party_rewards[0].xp;
        assert!(result.party_rewards.iter().all(|reward| reward.xp == xp));

        let win_money = if result.won { settings.win_bonus_money } else { 0 };
        let paid: i64 = result
            .party_rewards
            .iter()
            .map(|reward| reward.money - win_money)
            .sum();
        assert_eq!(paid, result.final_purse);

        let with_win_item = result
            .party_rewards
            .iter()
            .filter(|reward| reward.items.contains(&win_item))
            .count();
        assert_eq!(with_win_item, if result.won { 4 } else { 0 });
    }
}

#[test]
fn entries_mirror_the_journal() {
    let config = bundled();
    let result = run(&config, 3, 7);
    let entries = format_entries(&result);
    assert_eq!(entries.len(), result.journal.len());
    for (entry, turn) in entries.iter().zip(&result.journal) {
        assert_eq!(entry.turn_number, turn.turn_number);
        assert_eq!(entry.narrative, turn.narrative);
        assert_eq!(entry.purse, turn.purse_after);
    }

    let transcript = format_transcript(&result);
    assert!(transcript.starts_with(&format!("{}\n---\n", result.journal[0].narrative)));
    assert!(transcript.contains("\n---\nRewards:\n"));
    assert!(transcript.contains("member0 (Leader): "));
    assert!(transcript.contains(&format!(
        "Turns: {} | Final Fatigue: {}",
        result.total_turns, result.final_fatigue
    )));
}

#[test]
fn single_member_parties_never_meet_large_encounters() {
    let config = bundled();
    for seed in 0..30 {
        let result = run(&config, 1, seed);
        assert!(result.turns().all(|turn| {
            turn.encounter
                .as_ref()
                .and_then(|key| config.encounter(key.as_str()))
                .is_some_and(|encounter| encounter.min_party <= 1)
        }));
    }
}

#[test]
fn loot_rewards_are_kept_by_the_earner() {
    let mut config = bundled();
    config.settings.leader_bonus_reward = None;
    config.settings.win_bonus_reward = None;
    edit_effects(&mut config, |effects| {
        effects.reward = Some(ItemKey::new("lootbox_tier0"));
        effects.ko_scale = 0;
    });
    config.settings.max_turns = 5;

    let result = run(&config, 2, 13);
    for reward in &result.party_rewards {
        let acted = result
            .turns()
            .filter(|turn| turn.primary_member.as_deref() == Some(reward.username.as_str()))
            .count();
        assert_eq!(reward.items.len(), acted);
    }
}

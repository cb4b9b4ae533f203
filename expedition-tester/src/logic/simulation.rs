use anyhow::Result;
use colored::Colorize;
use expedition_engine::{
    EncounterConfig, ExpeditionEngine, ExpeditionResult, ParticipantSnapshot, PartyMemberState,
    RunEnding, Skill,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::hash::Hasher;
use std::time::{Duration, Instant};
use twox_hash::XxHash64;
use uuid::Uuid;

const MAX_SYNTHETIC_LEVEL: u32 = 20;

/// Shape of one batch: how many members, how many runs per seed.
#[derive(Debug, Clone, Copy)]
pub struct BatchPlan {
    pub party_size: usize,
    pub iterations: usize,
}

/// Ending counts for a batch of runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndingTally {
    pub won: usize,
    pub collapsed: usize,
    pub all_knocked_out: usize,
}

impl EndingTally {
    pub const fn record(&mut self, ending: RunEnding) {
        match ending {
            RunEnding::Won => self.won += 1,
            RunEnding::Collapsed => self.collapsed += 1,
            RunEnding::AllKnockedOut => self.all_knocked_out += 1,
        }
    }

    #[must_use]
    pub const fn total(&self) -> usize {
        self.won + self.collapsed + self.all_knocked_out
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn win_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.won as f64 / total as f64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedReport {
    pub seed: u64,
    pub party_size: usize,
    pub passed: bool,
    pub iterations_run: usize,
    pub successful_iterations: usize,
    pub failures: Vec<String>,
    pub endings: EndingTally,
    pub mean_turns: f64,
    pub mean_purse: f64,
    #[serde(with = "duration_serde")]
    pub average_duration: Duration,
}

/// Deterministic synthetic party; member 0 leads.
#[must_use]
pub fn synthetic_party(size: usize, seed: u64) -> Vec<ParticipantSnapshot> {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    (0..size)
        .map(|idx| {
            let job_levels: BTreeMap<String, u32> = Skill::job_keys()
                .iter()
                .map(|job| ((*job).to_string(), rng.gen_range(0..=MAX_SYNTHETIC_LEVEL)))
                .collect();
            let id = Uuid::from_u64_pair(seed, u64::try_from(idx).unwrap_or(u64::MAX));
            ParticipantSnapshot::new(id, format!("adventurer{}", idx + 1), job_levels)
        })
        .collect()
}

/// Serialized-result digest used for replay comparisons.
pub fn result_digest(result: &ExpeditionResult) -> Result<u64> {
    let bytes = serde_json::to_vec(result)?;
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(&bytes);
    Ok(hasher.finish())
}

/// Structural checks every finished run must satisfy.
pub fn check_invariants(config: &EncounterConfig, result: &ExpeditionResult) -> Result<(), String> {
    let settings = &config.settings;
    if result.total_turns > settings.max_turns {
        return Err(format!(
            "ran {} turns with a limit of {}",
            result.total_turns, settings.max_turns
        ));
    }
    let expected_entries = usize::try_from(result.total_turns).unwrap_or(usize::MAX) + 1;
    if result.journal.len() != expected_entries {
        return Err(format!(
            "journal holds {} entries for {} turns",
            result.journal.len(),
            result.total_turns
        ));
    }
    if result.journal.first().is_none_or(|intro| intro.turn_number != 0) {
        return Err(String::from("journal does not open with an intro"));
    }
    if result.final_fatigue < 0 || result.final_purse < 0 {
        return Err(format!(
            "negative totals: fatigue {} purse {}",
            result.final_fatigue, result.final_purse
        ));
    }
    match result.ending {
        RunEnding::Won if result.total_turns != settings.max_turns => Err(format!(
            "won after {} of {} turns",
            result.total_turns, settings.max_turns
        )),
        RunEnding::Collapsed if result.final_fatigue < settings.max_fatigue => Err(format!(
            "collapsed at fatigue {} below {}",
            result.final_fatigue, settings.max_fatigue
        )),
        _ if result.party_rewards.iter().filter(|reward| reward.is_leader).count() != 1 => {
            Err(String::from("rewards do not name exactly one leader"))
        }
        _ => Ok(()),
    }
}

/// Runs seeded batches against one configuration.
pub struct BatchTester {
    config: EncounterConfig,
    verbose: bool,
}

impl BatchTester {
    #[must_use]
    pub const fn new(config: EncounterConfig, verbose: bool) -> Self {
        Self { config, verbose }
    }

    #[must_use]
    pub const fn config(&self) -> &EncounterConfig {
        &self.config
    }

    /// Simulate one run for `seed` with a synthetic party of `party_size`.
    pub fn simulate(&self, party_size: usize, seed: u64) -> Result<ExpeditionResult> {
        let party = synthetic_party(party_size, seed)
            .into_iter()
            .map(PartyMemberState::from)
            .collect();
        let engine = ExpeditionEngine::new(&self.config, party, seed)?;
        Ok(engine.run())
    }

    pub fn run_seeds(&self, seeds: &[u64], plan: BatchPlan) -> Vec<SeedReport> {
        seeds
            .iter()
            .map(|&seed| {
                if self.verbose {
                    println!(
                        "🧪 Simulating seed {} (party {} x {} runs)",
                        seed.to_string().bright_white(),
                        plan.party_size,
                        plan.iterations
                    );
                }
                self.run_seed(seed, plan)
            })
            .collect()
    }

    fn run_seed(&self, seed: u64, plan: BatchPlan) -> SeedReport {
        let mut successes = 0;
        let mut failures = Vec::new();
        let mut endings = EndingTally::default();
        let mut turns_total = 0_u64;
        let mut purse_total = 0_i64;
        let mut durations = Vec::new();

        for i in 0..plan.iterations {
            let start_time = Instant::now();
            let iteration_seed = seed.wrapping_add(u64::try_from(i).unwrap_or(u64::MAX));

            match self.run_iteration(plan.party_size, iteration_seed) {
                Ok(result) => {
                    endings.record(result.ending);
                    turns_total += u64::from(result.total_turns);
                    purse_total = purse_total.saturating_add(result.final_purse);
                    successes += 1;
                    let duration = start_time.elapsed();
                    durations.push(duration);
                    if self.verbose {
                        println!(
                            "  ✅ Iteration {}/{} ({duration:?}) seed:{iteration_seed} ending:{} turns:{} purse:{}",
                            i + 1,
                            plan.iterations,
                            result.ending,
                            result.total_turns,
                            result.final_purse
                        );
                    }
                }
                Err(err) => {
                    if self.verbose {
                        println!(
                            "  ❌ Iteration {}/{} failed: {}",
                            i + 1,
                            plan.iterations,
                            err.as_str().red()
                        );
                    }
                    failures.push(format!(
                        "Iteration {} (seed {iteration_seed}, party {}): {err}",
                        i + 1,
                        plan.party_size
                    ));
                }
            }
        }

        let average_duration = if durations.is_empty() {
            Duration::ZERO
        } else {
            durations.iter().sum::<Duration>() / u32::try_from(durations.len()).unwrap_or(1)
        };

        SeedReport {
            seed,
            party_size: plan.party_size,
            passed: failures.is_empty(),
            iterations_run: plan.iterations,
            successful_iterations: successes,
            failures,
            endings,
            mean_turns: mean(turns_total, successes),
            mean_purse: mean(u64::try_from(purse_total).unwrap_or(0), successes),
            average_duration,
        }
    }

    fn run_iteration(&self, party_size: usize, seed: u64) -> Result<ExpeditionResult, String> {
        let first = self.simulate(party_size, seed).map_err(|err| err.to_string())?;
        let replay = self.simulate(party_size, seed).map_err(|err| err.to_string())?;
        let first_digest = result_digest(&first).map_err(|err| err.to_string())?;
        let replay_digest = result_digest(&replay).map_err(|err| err.to_string())?;
        if first_digest != replay_digest {
            return Err(format!(
                "replay diverged: digest {first_digest:016x} vs {replay_digest:016x}"
            ));
        }
        check_invariants(&self.config, &first)?;
        Ok(first)
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(total: u64, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    total as f64 / count as f64
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u128::deserialize(deserializer)?;
        Ok(Duration::from_millis(u64::try_from(millis).unwrap_or(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tester() -> BatchTester {
        BatchTester::new(EncounterConfig::bundled().unwrap(), false)
    }

    #[test]
    fn synthetic_parties_are_seeded() {
        let first = synthetic_party(4, 99);
        assert_eq!(first, synthetic_party(4, 99));
        assert_ne!(first, synthetic_party(4, 100));
        assert_eq!(first[0].username, "adventurer1");
        assert!(first.iter().all(|member| member.job_levels.len() == 6));
        assert!(
            first
                .iter()
                .flat_map(|member| member.job_levels.values())
                .all(|level| *level <= MAX_SYNTHETIC_LEVEL)
        );
    }

    #[test]
    fn batches_pass_on_the_bundled_config() {
        let plan = BatchPlan {
            party_size: 3,
            iterations: 8,
        };
        let reports = tester().run_seeds(&[1, 2], plan);
        assert_eq!(reports.len(), 2);
        for report in &reports {
            assert!(report.passed, "{:?}", report.failures);
            assert_eq!(report.successful_iterations, 8);
            assert_eq!(report.endings.total(), 8);
            assert!(report.mean_turns >= 1.0);
        }
    }

    #[test]
    fn invariant_check_flags_early_wins() {
        let tester = tester();
        let mut result = tester.simulate(2, 5).unwrap();
        assert!(check_invariants(tester.config(), &result).is_ok());

        result.ending = RunEnding::Won;
        result.total_turns = 0;
        result.journal.truncate(1);
        let err = check_invariants(tester.config(), &result).unwrap_err();
        assert!(err.contains("won after 0"));
    }

    #[test]
    fn empty_party_is_reported_as_failure() {
        let plan = BatchPlan {
            party_size: 0,
            iterations: 2,
        };
        let reports = tester().run_seeds(&[7], plan);
        assert!(!reports[0].passed);
        assert_eq!(reports[0].failures.len(), 2);
        assert!(reports[0].failures[0].contains("party is empty"));
    }

    #[test]
    fn tally_tracks_win_rate() {
        let mut tally = EndingTally::default();
        assert!(tally.win_rate().abs() < f64::EPSILON);
        tally.record(RunEnding::Won);
        tally.record(RunEnding::Collapsed);
        assert!((tally.win_rate() - 0.5).abs() < f64::EPSILON);
    }
}

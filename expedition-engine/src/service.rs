//! Orchestration boundary around the turn engine.
//!
//! The service claims an expedition exactly once through a conditional state
//! transition, runs the engine, and fans the result out to persistence,
//! notification, and reward collaborators. Only the claim and the final
//! completion write are allowed to fail the call; every other side effect is
//! logged and skipped.
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error as StdError;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{EncounterConfig, ItemKey};
use crate::engine::{EngineError, ExpeditionEngine};
use crate::event::ExpeditionEvent;
use crate::journal::JournalEntry;
use crate::party::PartyMemberState;
use crate::result::{ExpeditionResult, PartyMemberReward};
use crate::skills::Skill;

type PartyJobLevels = BTreeMap<Uuid, BTreeMap<String, u32>>;

type BoxedError = Box<dyn StdError + Send + Sync + 'static>;

fn boxed<E: StdError + Send + Sync + 'static>(err: E) -> BoxedError {
    Box::new(err)
}

/// Persisted lifecycle of an expedition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpeditionState {
    Created,
    Recruiting,
    InProgress,
    Completed,
}

/// Join record of one user, as stored by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpeditionParticipant {
    pub user_id: Uuid,
    pub username: String,
    #[serde(default)]
    pub is_leader: bool,
}

/// Persistence boundary for expeditions and their participants.
pub trait ExpeditionStore {
    type Error: StdError + Send + Sync + 'static;

    /// Move the expedition from `from` to `to` only if it is currently in `from`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be updated.
    fn transition_state(
        &self,
        expedition_id: Uuid,
        from: ExpeditionState,
        to: ExpeditionState,
    ) -> Result<u64, Self::Error>;

    /// Participants in join order, `None` when the expedition does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the participants cannot be read.
    fn load_participants(
        &self,
        expedition_id: Uuid,
    ) -> Result<Option<Vec<ExpeditionParticipant>>, Self::Error>;

    /// Append one journal row.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be written.
    fn save_journal_entry(&self, expedition_id: Uuid, entry: &JournalEntry)
    -> Result<(), Self::Error>;

    /// Record a participant's final rewards alongside the job levels they ran with.
    ///
    /// # Errors
    ///
    /// Returns an error if the result cannot be written.
    fn save_participant_rewards(
        &self,
        expedition_id: Uuid,
        reward: &PartyMemberReward,
        job_levels: &BTreeMap<String, u32>,
    ) -> Result<(), Self::Error>;

    /// Mark the expedition completed.
    ///
    /// # Errors
    ///
    /// Returns an error if the completion cannot be written.
    fn complete_expedition(&self, expedition_id: Uuid) -> Result<(), Self::Error>;
}

/// Source of current job levels per user.
pub trait PartySnapshotProvider {
    type Error: StdError + Send + Sync + 'static;

    /// # Errors
    ///
    /// Returns an error if the levels cannot be fetched.
    fn job_levels(&self, user_id: Uuid) -> Result<BTreeMap<String, u32>, Self::Error>;
}

/// Fire-and-forget publication of expedition events.
pub trait NotificationSink {
    type Error: StdError + Send + Sync + 'static;

    /// # Errors
    ///
    /// Returns an error if delivery fails.
    fn publish(&self, event: &ExpeditionEvent) -> Result<(), Self::Error>;
}

/// Inventory and progression side effects of a finished run.
pub trait RewardSink {
    type Error: StdError + Send + Sync + 'static;

    /// # Errors
    ///
    /// Returns an error if the item cannot be granted.
    fn add_item(&self, username: &str, item: &ItemKey, quantity: u32) -> Result<(), Self::Error>;

    /// # Errors
    ///
    /// Returns an error if the XP cannot be awarded.
    fn award_job_xp(&self, user_id: Uuid, job_xp: &BTreeMap<String, i64>)
    -> Result<(), Self::Error>;
}

/// Failures that abort [`ExpeditionService::execute`].
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("failed to claim expedition {id}: {source}")]
    Claim { id: Uuid, source: BoxedError },
    #[error("failed to load expedition {id}: {source}")]
    Load { id: Uuid, source: BoxedError },
    #[error("expedition {0} not found")]
    NotFound(Uuid),
    #[error("expedition could not start: {0}")]
    Engine(#[from] EngineError),
    #[error("failed to complete expedition {id}: {source}")]
    Complete { id: Uuid, source: BoxedError },
}

/// What a call to [`ExpeditionService::execute`] did.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum ExecutionOutcome {
    /// This caller claimed the expedition and ran it.
    Executed(ExpeditionResult),
    /// Another caller already claimed the expedition.
    AlreadyClaimed,
}

impl ExecutionOutcome {
    #[must_use]
    pub const fn result(&self) -> Option<&ExpeditionResult> {
        match self {
            Self::Executed(result) => Some(result),
            Self::AlreadyClaimed => None,
        }
    }
}

/// Runs claimed expeditions against the platform collaborators.
pub struct ExpeditionService<S, P, N, R>
where
    S: ExpeditionStore,
    P: PartySnapshotProvider,
    N: NotificationSink,
    R: RewardSink,
{
    config: EncounterConfig,
    store: S,
    snapshots: P,
    notifier: N,
    rewards: R,
}

impl<S, P, N, R> ExpeditionService<S, P, N, R>
where
    S: ExpeditionStore,
    P: PartySnapshotProvider,
    N: NotificationSink,
    R: RewardSink,
{
    pub const fn new(
        config: EncounterConfig,
        store: S,
        snapshots: P,
        notifier: N,
        rewards: R,
    ) -> Self {
        Self {
            config,
            store,
            snapshots,
            notifier,
            rewards,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &EncounterConfig {
        &self.config
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub const fn notifier(&self) -> &N {
        &self.notifier
    }

    #[must_use]
    pub const fn rewards(&self) -> &R {
        &self.rewards
    }

    /// Claim, run, and finalize one expedition.
    ///
    /// Repeated or concurrent calls for the same expedition run it at most
    /// once; the losers get [`ExecutionOutcome::AlreadyClaimed`].
    ///
    /// # Errors
    ///
    /// Returns an error if the claim, the participant load, the engine
    /// preconditions, or the completion write fail.
    pub fn execute(
        &self,
        expedition_id: Uuid,
        seed: u64,
    ) -> Result<ExecutionOutcome, ServiceError> {
        let claimed = self
            .store
            .transition_state(
                expedition_id,
                ExpeditionState::Recruiting,
                ExpeditionState::InProgress,
            )
            .map_err(|err| ServiceError::Claim {
                id: expedition_id,
                source: boxed(err),
            })?;
        if claimed == 0 {
            info!("expedition {expedition_id} already claimed, skipping execution");
            return Ok(ExecutionOutcome::AlreadyClaimed);
        }

        let (result, job_levels) = self
            .run_claimed(expedition_id, seed)
            .inspect_err(|err| {
                error!("expedition {expedition_id} is stuck in progress after its claim: {err}");
            })?;

        self.persist_journal(expedition_id, &result);
        self.distribute_rewards(expedition_id, &result, &job_levels);

        self.store
            .complete_expedition(expedition_id)
            .map_err(|err| ServiceError::Complete {
                id: expedition_id,
                source: boxed(err),
            })?;

        if let Err(err) = self
            .notifier
            .publish(&ExpeditionEvent::completed(expedition_id, &result))
        {
            warn!("failed to publish completion of expedition {expedition_id}: {err}");
        }

        Ok(ExecutionOutcome::Executed(result))
    }

    /// Load the party of a claimed expedition and run the engine to completion.
    fn run_claimed(
        &self,
        expedition_id: Uuid,
        seed: u64,
    ) -> Result<(ExpeditionResult, PartyJobLevels), ServiceError> {
        let participants = self
            .store
            .load_participants(expedition_id)
            .map_err(|err| ServiceError::Load {
                id: expedition_id,
                source: boxed(err),
            })?
            .ok_or(ServiceError::NotFound(expedition_id))?;
        info!(
            "executing expedition {expedition_id} with {} participants",
            participants.len()
        );

        let party = self.prepare_party(&participants);
        let job_levels: PartyJobLevels = party
            .iter()
            .map(|member| (member.id, member.job_levels.clone()))
            .collect();
        let result = ExpeditionEngine::new(&self.config, party, seed)?.run();
        info!(
            "expedition {expedition_id} finished after {} turns: {}",
            result.total_turns, result.ending
        );
        Ok((result, job_levels))
    }

    /// Snapshot job levels with the leader first. Lookup failures run with no levels.
    fn prepare_party(&self, participants: &[ExpeditionParticipant]) -> Vec<PartyMemberState> {
        let leaders = participants.iter().filter(|p| p.is_leader);
        let others = participants.iter().filter(|p| !p.is_leader);
        leaders
            .chain(others)
            .map(|participant| {
                let job_levels = self
                    .snapshots
                    .job_levels(participant.user_id)
                    .unwrap_or_else(|err| {
                        error!(
                            "failed to fetch job levels for {} ({}): {err}",
                            participant.username, participant.user_id
                        );
                        BTreeMap::new()
                    });
                PartyMemberState::new(participant.user_id, participant.username.clone(), job_levels)
            })
            .collect()
    }

    fn persist_journal(&self, expedition_id: Uuid, result: &ExpeditionResult) {
        for turn in &result.journal {
            let entry = JournalEntry::from(turn);
            if let Err(err) = self.store.save_journal_entry(expedition_id, &entry) {
                error!(
                    "failed to save journal turn {} of expedition {expedition_id}: {err}",
                    turn.turn_number
                );
            }
            if let Err(err) = self
                .notifier
                .publish(&ExpeditionEvent::turn(expedition_id, turn))
            {
                warn!(
                    "failed to publish turn {} of expedition {expedition_id}: {err}",
                    turn.turn_number
                );
            }
        }
    }

    fn distribute_rewards(
        &self,
        expedition_id: Uuid,
        result: &ExpeditionResult,
        job_levels: &PartyJobLevels,
    ) {
        let empty = BTreeMap::new();
        for reward in &result.party_rewards {
            for item in &reward.items {
                if let Err(err) = self.rewards.add_item(&reward.username, item, 1) {
                    error!(
                        "failed to add {item} to the inventory of {}: {err}",
                        reward.username
                    );
                }
            }

            if reward.xp > 0 {
                let job_xp: BTreeMap<String, i64> = Skill::job_keys()
                    .into_iter()
                    .map(|job| (job.to_string(), reward.xp))
                    .collect();
                if let Err(err) = self.rewards.award_job_xp(reward.user_id, &job_xp) {
                    error!("failed to award job XP to {}: {err}", reward.username);
                }
            }

            let levels = job_levels.get(&reward.user_id).unwrap_or(&empty);
            if let Err(err) = self
                .store
                .save_participant_rewards(expedition_id, reward, levels)
            {
                error!(
                    "failed to save rewards of {} for expedition {expedition_id}: {err}",
                    reward.user_id
                );
            }
        }
    }
}

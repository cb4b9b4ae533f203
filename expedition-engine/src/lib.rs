//! Expedition Engine
//!
//! Deterministic, configuration-driven simulation of party expeditions: a seed
//! and a party snapshot go in, a narrated journal and reward allocation come out.
//! The crate performs no I/O during a run; platform concerns are reached through
//! the collaborator traits in [`service`].

pub mod config;
pub mod constants;
pub mod encounters;
pub mod engine;
pub mod event;
pub mod journal;
pub mod narrative;
pub mod numbers;
pub mod party;
pub mod result;
pub mod rng;
pub mod scaling;
pub mod service;
pub mod skills;

// Re-export commonly used types
pub use config::{
    ConfigError, ConfigSource, EffectsDef, EncounterConfig, EncounterDef, EncounterKey,
    EngineSettings, FileConfigSource, ItemKey, NarrativeDef, OutcomeCategory, OutcomeDef,
    OutcomeDetail, SkillSelection, StaticConfigSource,
};
pub use encounters::{
    EncounterPick, OutcomePick, choose_weighted, effective_encounter_weights, momentum_shift,
    pick_encounter, pick_outcome, run_progress, shifted_outcome_weights,
};
pub use engine::{EngineError, ExpeditionEngine, RunContext, experience_award};
pub use event::{EventDecisionTrace, ExpeditionEvent, WeightFactor, WeightedCandidate};
pub use journal::{JournalEntry, format_entries, format_transcript};
pub use narrative::{pick_intro, render_narrative};
pub use party::{ParticipantSnapshot, PartyMemberState};
pub use result::{ExpeditionResult, ExpeditionTurn, PartyMemberReward, RunEnding};
pub use rng::{CountingRng, RngBundle};
pub use scaling::scale_effect;
pub use service::{
    ExecutionOutcome, ExpeditionParticipant, ExpeditionService, ExpeditionState, ExpeditionStore,
    NotificationSink, PartySnapshotProvider, RewardSink, ServiceError,
};
pub use skills::{Skill, SkillCheck, find_max_job_level, resolve_skill_check};

/// Failure of a one-shot [`simulate`] call.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[error(transparent)]
    Config(E),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Load a validated configuration from `source` and run one expedition.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or the engine
/// preconditions are not met.
pub fn simulate<C>(
    source: &C,
    party: Vec<ParticipantSnapshot>,
    seed: u64,
) -> Result<ExpeditionResult, SimulationError<C::Error>>
where
    C: ConfigSource,
{
    let config = source
        .load_encounter_config()
        .map_err(SimulationError::Config)?;
    let party = party.into_iter().map(PartyMemberState::from).collect();
    let engine = ExpeditionEngine::new(&config, party, seed)?;
    Ok(engine.run())
}

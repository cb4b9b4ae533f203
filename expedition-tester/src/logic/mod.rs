pub mod reports;
pub mod seeds;
pub mod simulation;

pub use seeds::{resolve_seed_inputs, split_csv};
pub use simulation::{BatchPlan, BatchTester, SeedReport};

//! Trial engines, result aggregation and the parallel match runners.

pub mod engine;
pub mod engine_v2;
pub mod aggregate;
pub mod runner;

pub use aggregate::MatchAggregator;
pub use engine::{run_trial, SimulationEngine, TrialError};
pub use engine_v2::{run_trial_v2, SimulationEngineV2};
pub use runner::{MatchError, MatchRunner, MatchRunnerV2};

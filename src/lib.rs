//! AMM strategy match engine.
//!
//! Runs compiled fee strategies inside an in-memory EVM, pits two of them
//! against each other over many simulated market trials in parallel, and
//! aggregates the outcomes into a deterministic match result.
//!
//! ```no_run
//! use amm_match::{
//!     BaselineSettings, CompiledStrategy, MatchOverrides, StrategyAdapter, StrategyInterface,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let (bytecode_a, bytecode_b) = (Vec::new(), Vec::new());
//! let a = StrategyAdapter::new(&CompiledStrategy::new(bytecode_a, StrategyInterface::assume_all()))?;
//! let b = StrategyAdapter::new(&CompiledStrategy::new(bytecode_b, StrategyInterface::assume_all()))?;
//!
//! let runner = MatchOverrides::default()
//!     .resolve(&BaselineSettings::default())?
//!     .runner()?;
//! let result = runner.run_match(&a, &b, false)?;
//! println!("{} edge: {}", result.strategy_a(), result.average_edge_a());
//! # Ok(())
//! # }
//! ```

pub mod types;
pub mod evm;
pub mod amm;
pub mod market;
pub mod simulation;
pub mod settings;
pub mod logging;

#[cfg(feature = "python")]
mod python;

pub use evm::{
    CallbackVersion, CompiledStrategy, ExecutorError, StrategyAdapter, StrategyId,
    StrategyInterface, StrategyProgram,
};
pub use settings::{BaselineSettings, MatchOverrides, MultiAssetSpec, ResolvedMatch};
pub use simulation::{MatchError, MatchRunner, MatchRunnerV2, TrialError};
pub use types::{
    ConfigError, FeeQuote, HyperparameterVariance, MatchResult, ParameterRange, PoolConfig,
    ScenarioConfig, ScenarioConfigV2, Side, TrialOutcome,
};

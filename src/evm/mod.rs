//! Strategy execution: compiled artifacts, the call boundary, the strict
//! executor and the fee-quoting adapter.

pub mod compiled;
pub mod program;
pub mod executor;
pub mod adapter;

pub use adapter::{StrategyAdapter, StrategyInstance};
pub use compiled::{CallbackVersion, CompiledStrategy, StrategyId, StrategyInterface};
pub use executor::{ExecutorError, ExecutorInstance, RawFeePair, StrategyExecutor};
pub use program::{CallFault, EvmProgram, ProgramInstance, StrategyProgram};

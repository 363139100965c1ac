//! Strict call gate over a deployed strategy.
//!
//! The executor only encodes calldata, runs the call and checks the shape of
//! what comes back. It never clamps or converts units; a fee callback either
//! returns exactly two 32-byte words or fails.

use revm::primitives::U256;
use thiserror::Error;

use crate::evm::compiled::{CallbackVersion, CompiledStrategy, StrategyId, StrategyInterface};
use crate::evm::program::{EvmProgram, ProgramInstance, StrategyProgram};
use crate::types::trade_info::{
    decode_fee_words, decode_string, encode_after_initialize, encode_after_initialize_v2,
    PoolContext, TradeEvent, AFTER_SWAP_LEN, AFTER_SWAP_V2_LEN, SELECTOR_GET_NAME,
};
use crate::types::wad::Wad;

/// Gas limit for afterInitialize / afterSwap and their V2 variants.
pub const GAS_LIMIT_CALLBACK: u64 = 250_000;

/// Gas limit for getName.
pub const GAS_LIMIT_NAME: u64 = 50_000;

/// Errors surfaced by the executor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    #[error("{callback} returned {len} bytes, expected 64")]
    InvalidReturnData { callback: &'static str, len: usize },

    #[error("{callback} failed: {reason}")]
    CallFailed { callback: &'static str, reason: String },

    #[error("deployment failed: {0}")]
    DeploymentFailed(String),

    #[error("strategy declares no {0} callback")]
    MissingCallback(&'static str),
}

/// Undecoded (bid, ask) words exactly as the strategy returned them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFeePair {
    pub bid: U256,
    pub ask: U256,
}

/// One deployed strategy.
pub struct StrategyExecutor {
    program: Box<dyn StrategyProgram>,
    interface: StrategyInterface,
    id: StrategyId,
}

impl StrategyExecutor {
    /// Deploy compiled bytecode into its own in-memory EVM.
    pub fn deploy(compiled: &CompiledStrategy) -> Result<Self, ExecutorError> {
        let program =
            EvmProgram::deploy(&compiled.bytecode).map_err(ExecutorError::DeploymentFailed)?;
        Ok(Self::from_program(program, compiled.interface, compiled.id()))
    }

    /// Wrap any program, e.g. a scripted one in tests.
    pub fn from_program(
        program: impl StrategyProgram + 'static,
        interface: StrategyInterface,
        id: StrategyId,
    ) -> Self {
        Self {
            program: Box::new(program),
            interface,
            id,
        }
    }

    pub fn interface(&self) -> &StrategyInterface {
        &self.interface
    }

    pub fn id(&self) -> StrategyId {
        self.id
    }

    /// Fresh callback state for one pool copy.
    pub fn instantiate(&self) -> ExecutorInstance<'_> {
        ExecutorInstance {
            program: self.program.instantiate(),
        }
    }

    /// `getName()`, or `None` when it is undeclared, fails or is undecodable.
    pub fn fetch_name(&self) -> Option<String> {
        if !self.interface.get_name {
            return None;
        }
        let data = self.program.call(&SELECTOR_GET_NAME, GAS_LIMIT_NAME).ok()?;
        decode_string(&data)
    }
}

/// Fee callbacks against one program instance; storage written by a
/// callback is visible to the next one.
pub struct ExecutorInstance<'e> {
    program: Box<dyn ProgramInstance + 'e>,
}

impl ExecutorInstance<'_> {
    /// Call the initialization callback of the given version.
    pub fn initialize(
        &mut self,
        version: CallbackVersion,
        pool: &PoolContext,
        reserve_a: Wad,
        reserve_b: Wad,
    ) -> Result<RawFeePair, ExecutorError> {
        let callback = version.initialize_callback();
        match version {
            CallbackVersion::V1 => {
                let calldata = encode_after_initialize(reserve_a, reserve_b);
                self.call_fee_callback(callback, &calldata)
            }
            CallbackVersion::V2 => {
                let calldata = encode_after_initialize_v2(reserve_a, reserve_b, pool);
                self.call_fee_callback(callback, &calldata)
            }
        }
    }

    /// Call the post-swap callback of the given version.
    #[inline]
    pub fn swap(
        &mut self,
        version: CallbackVersion,
        trade: &TradeEvent,
    ) -> Result<RawFeePair, ExecutorError> {
        let callback = version.swap_callback();
        match version {
            CallbackVersion::V1 => {
                let mut calldata = [0u8; AFTER_SWAP_LEN];
                trade.encode_v1(&mut calldata);
                self.call_fee_callback(callback, &calldata)
            }
            CallbackVersion::V2 => {
                let mut calldata = [0u8; AFTER_SWAP_V2_LEN];
                trade.encode_v2(&mut calldata);
                self.call_fee_callback(callback, &calldata)
            }
        }
    }

    fn call_fee_callback(
        &mut self,
        callback: &'static str,
        calldata: &[u8],
    ) -> Result<RawFeePair, ExecutorError> {
        let data = self
            .program
            .call(calldata, GAS_LIMIT_CALLBACK)
            .map_err(|fault| ExecutorError::CallFailed {
                callback,
                reason: fault.to_string(),
            })?;

        let (bid, ask) = decode_fee_words(&data).ok_or(ExecutorError::InvalidReturnData {
            callback,
            len: data.len(),
        })?;
        Ok(RawFeePair { bid, ask })
    }
}

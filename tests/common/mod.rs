//! Scripted in-process strategies for match-level tests.

#![allow(dead_code)]

use std::sync::Mutex;

use amm_match::evm::{CallFault, StrategyExecutor, StrategyProgram};
use amm_match::types::trade_info::{
    SELECTOR_AFTER_INITIALIZE, SELECTOR_AFTER_INITIALIZE_V2, SELECTOR_AFTER_SWAP,
    SELECTOR_AFTER_SWAP_V2, SELECTOR_GET_NAME,
};
use amm_match::{ScenarioConfig, StrategyAdapter, StrategyId, StrategyInterface};

pub const ONE_BPS_WAD: u64 = 100_000_000_000_000;

pub fn word(value: u64) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[24..].copy_from_slice(&value.to_be_bytes());
    out
}

pub fn fee_pair(bid_bps: u64, ask_bps: u64) -> Vec<u8> {
    let mut out = word(bid_bps * ONE_BPS_WAD).to_vec();
    out.extend_from_slice(&word(ask_bps * ONE_BPS_WAD));
    out
}

/// ABI encoding of a single `string` return value.
pub fn abi_string(value: &str) -> Vec<u8> {
    let mut out = word(32).to_vec();
    out.extend_from_slice(&word(value.len() as u64));
    let mut data = value.as_bytes().to_vec();
    data.resize(value.len().div_ceil(32) * 32, 0);
    out.extend_from_slice(&data);
    out
}

fn selector(calldata: &[u8]) -> [u8; 4] {
    let mut sel = [0u8; 4];
    if calldata.len() >= 4 {
        sel.copy_from_slice(&calldata[..4]);
    }
    sel
}

/// Which callbacks a scripted strategy answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answers {
    Both,
    V1Only,
    V2Only,
    /// Initialization works, every swap callback reverts
    NoSwaps,
    /// Swap callbacks panic inside the program
    PanicOnSwap,
}

/// Quotes a fixed fee on the callbacks it answers and records every call.
pub struct Scripted {
    pub bid_bps: u64,
    pub ask_bps: u64,
    pub answers: Answers,
    pub name: Option<String>,
    pub calls: Mutex<Vec<Vec<u8>>>,
}

impl Scripted {
    pub fn new(bps: u64, answers: Answers) -> Self {
        Self {
            bid_bps: bps,
            ask_bps: bps,
            answers,
            name: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn calls_with(&self, sel: [u8; 4]) -> Vec<Vec<u8>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| selector(c) == sel)
            .cloned()
            .collect()
    }
}

impl StrategyProgram for Scripted {
    fn call(&self, calldata: &[u8], _gas_limit: u64) -> Result<Vec<u8>, CallFault> {
        self.calls.lock().unwrap().push(calldata.to_vec());
        let sel = selector(calldata);

        if sel == SELECTOR_GET_NAME {
            return match &self.name {
                Some(name) => Ok(abi_string(name)),
                None => Err(CallFault::Reverted(Vec::new())),
            };
        }

        let is_v1 = sel == SELECTOR_AFTER_INITIALIZE || sel == SELECTOR_AFTER_SWAP;
        let is_v2 = sel == SELECTOR_AFTER_INITIALIZE_V2 || sel == SELECTOR_AFTER_SWAP_V2;
        let is_swap = sel == SELECTOR_AFTER_SWAP || sel == SELECTOR_AFTER_SWAP_V2;

        let answered = match self.answers {
            Answers::Both => is_v1 || is_v2,
            Answers::V1Only => is_v1,
            Answers::V2Only => is_v2,
            Answers::NoSwaps => !is_swap && (is_v1 || is_v2),
            Answers::PanicOnSwap => {
                if is_swap {
                    panic!("scripted strategy exploded");
                }
                is_v1 || is_v2
            }
        };

        if answered {
            Ok(fee_pair(self.bid_bps, self.ask_bps))
        } else {
            Err(CallFault::Reverted(Vec::new()))
        }
    }
}

/// Adapter over a scripted program; every callback is declared.
pub fn adapter(program: impl StrategyProgram + 'static, tag: &str) -> StrategyAdapter {
    adapter_with(program, StrategyInterface::assume_all(), tag)
}

pub fn adapter_with(
    program: impl StrategyProgram + 'static,
    interface: StrategyInterface,
    tag: &str,
) -> StrategyAdapter {
    let executor =
        StrategyExecutor::from_program(program, interface, StrategyId::of_bytecode(tag.as_bytes()));
    StrategyAdapter::from_executor(executor, None).unwrap()
}

pub fn fixed(bps: u64, tag: &str) -> StrategyAdapter {
    adapter(Scripted::new(bps, Answers::Both).named(tag), tag)
}

pub fn scenario() -> ScenarioConfig {
    ScenarioConfig {
        n_steps: 50,
        initial_price: 100.0,
        initial_x: 100.0,
        initial_y: 10_000.0,
        gbm_mu: 0.0,
        gbm_sigma: 0.001,
        gbm_dt: 1.0,
        retail_arrival_rate: 5.0,
        retail_mean_size: 2.0,
        retail_size_sigma: 0.7,
        retail_buy_prob: 0.5,
        seed: Some(42),
    }
}

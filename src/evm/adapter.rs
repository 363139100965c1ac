//! Uniform fee-quoting interface over either callback generation.

use tracing::{debug, warn};

use crate::evm::compiled::{CallbackVersion, CompiledStrategy, StrategyId};
use crate::evm::executor::{ExecutorError, ExecutorInstance, RawFeePair, StrategyExecutor};
use crate::types::fee_quote::FeeQuote;
use crate::types::trade_info::{PoolContext, TradeEvent};
use crate::types::wad::Wad;

/// Name reported when a strategy gives none.
pub const UNNAMED: &str = "Unnamed";

/// Wraps an executor with clamping, version fallback and a cached name.
///
/// Shared read-only by every worker of a match; per-pool callback state
/// lives in a [`StrategyInstance`].
pub struct StrategyAdapter {
    executor: StrategyExecutor,
    name: String,
    init_attempts: Vec<CallbackVersion>,
    swap_attempts: Vec<CallbackVersion>,
}

impl StrategyAdapter {
    /// Deploy a compiled strategy and read its name from `getName()`.
    pub fn new(compiled: &CompiledStrategy) -> Result<Self, ExecutorError> {
        Self::from_executor(StrategyExecutor::deploy(compiled)?, None)
    }

    /// Deploy a compiled strategy under an explicit display name.
    pub fn with_name(
        compiled: &CompiledStrategy,
        name: impl Into<String>,
    ) -> Result<Self, ExecutorError> {
        Self::from_executor(StrategyExecutor::deploy(compiled)?, Some(name.into()))
    }

    pub fn from_executor(
        executor: StrategyExecutor,
        name: Option<String>,
    ) -> Result<Self, ExecutorError> {
        let interface = *executor.interface();
        let init_attempts: Vec<_> = CallbackVersion::PREFERENCE
            .into_iter()
            .filter(|v| interface.supports_initialize(*v))
            .collect();
        let swap_attempts: Vec<_> = CallbackVersion::PREFERENCE
            .into_iter()
            .filter(|v| interface.supports_swap(*v))
            .collect();

        if init_attempts.is_empty() {
            return Err(ExecutorError::MissingCallback("afterInitialize"));
        }
        if swap_attempts.is_empty() {
            return Err(ExecutorError::MissingCallback("afterSwap"));
        }

        let name = match name {
            Some(name) => name,
            None => executor.fetch_name().unwrap_or_else(|| {
                warn!(id = %executor.id(), "getName() unavailable, using default name");
                UNNAMED.to_string()
            }),
        };

        Ok(Self {
            executor,
            name,
            init_attempts,
            swap_attempts,
        })
    }

    /// Display name. Not an identity: two strategies may share it.
    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> StrategyId {
        self.executor.id()
    }

    /// Callback state for one pool copy; lives for one trial.
    pub fn instantiate(&self) -> StrategyInstance<'_> {
        StrategyInstance {
            adapter: self,
            executor: self.executor.instantiate(),
            swap_start: 0,
        }
    }
}

/// One pool copy's view of a strategy.
///
/// Once a preferred swap version fails and a later one succeeds, the
/// instance keeps using the later one.
pub struct StrategyInstance<'a> {
    adapter: &'a StrategyAdapter,
    executor: ExecutorInstance<'a>,
    swap_start: usize,
}

impl StrategyInstance<'_> {
    pub fn after_initialize(
        &mut self,
        pool: &PoolContext,
        reserve_a: Wad,
        reserve_b: Wad,
    ) -> Result<FeeQuote, ExecutorError> {
        let adapter = self.adapter;
        let executor = &mut self.executor;
        let (_, quote) = first_success(&adapter.name, &adapter.init_attempts, |version| {
            executor.initialize(version, pool, reserve_a, reserve_b)
        })?;
        Ok(quote)
    }

    #[inline]
    pub fn after_swap(&mut self, trade: &TradeEvent) -> Result<FeeQuote, ExecutorError> {
        let adapter = self.adapter;
        let executor = &mut self.executor;
        let attempts = &adapter.swap_attempts[self.swap_start..];
        let (index, quote) =
            first_success(&adapter.name, attempts, |version| executor.swap(version, trade))?;
        if index > 0 {
            self.swap_start += index;
            debug!(
                strategy = %adapter.name,
                version = %adapter.swap_attempts[self.swap_start],
                "swap callback pinned to fallback version"
            );
        }
        Ok(quote)
    }
}

/// Walk the attempt list; the first success wins with its position,
/// otherwise the last error is returned.
fn first_success<F>(
    name: &str,
    attempts: &[CallbackVersion],
    mut call: F,
) -> Result<(usize, FeeQuote), ExecutorError>
where
    F: FnMut(CallbackVersion) -> Result<RawFeePair, ExecutorError>,
{
    let mut last_error = None;
    for (index, &version) in attempts.iter().enumerate() {
        match call(version) {
            Ok(raw) => return Ok((index, quote_from_raw(raw))),
            Err(err) => {
                debug!(strategy = %name, %version, error = %err, "strategy callback failed");
                last_error = Some(err);
            }
        }
    }
    Err(last_error.unwrap_or(ExecutorError::MissingCallback("afterSwap")))
}

/// Signed WAD words to a clamped quote; never rejects.
#[inline]
fn quote_from_raw(raw: RawFeePair) -> FeeQuote {
    FeeQuote::from_wad(Wad::from_word(raw.bid), Wad::from_word(raw.ask))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evm::compiled::StrategyInterface;
    use crate::evm::program::{CallFault, StrategyProgram};
    use crate::types::fee_quote::FEE_CAP;
    use crate::types::trade_info::{
        encode_string_return, TradeSide, SELECTOR_AFTER_SWAP, SELECTOR_AFTER_SWAP_V2,
        SELECTOR_GET_NAME,
    };
    use revm::primitives::U256;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn words(bid: U256, ask: U256) -> Vec<u8> {
        let mut out = bid.to_be_bytes::<32>().to_vec();
        out.extend_from_slice(&ask.to_be_bytes::<32>());
        out
    }

    fn bps(n: u64) -> U256 {
        U256::from(n) * U256::from(100_000_000_000_000u64)
    }

    /// Answers by selector; V2 swap can be made to fail.
    struct Scripted {
        v2_swap: Result<Vec<u8>, CallFault>,
        v1_swap: Vec<u8>,
        name: Option<&'static str>,
        v1_swap_calls: AtomicUsize,
        v2_swap_calls: AtomicUsize,
    }

    impl StrategyProgram for Scripted {
        fn call(&self, calldata: &[u8], _gas_limit: u64) -> Result<Vec<u8>, CallFault> {
            let selector: [u8; 4] = calldata[0..4].try_into().unwrap();
            match selector {
                SELECTOR_AFTER_SWAP_V2 => {
                    self.v2_swap_calls.fetch_add(1, Ordering::SeqCst);
                    self.v2_swap.clone()
                }
                SELECTOR_AFTER_SWAP => {
                    self.v1_swap_calls.fetch_add(1, Ordering::SeqCst);
                    Ok(self.v1_swap.clone())
                }
                SELECTOR_GET_NAME => match self.name {
                    Some(name) => Ok(encode_string_return(name)),
                    None => Err(CallFault::Reverted(Vec::new())),
                },
                _ => Ok(words(bps(30), bps(30))),
            }
        }
    }

    fn adapter(program: Arc<Scripted>, interface: StrategyInterface) -> Result<StrategyAdapter, ExecutorError> {
        let executor =
            StrategyExecutor::from_program(program, interface, StrategyId::of_bytecode(b"scripted"));
        StrategyAdapter::from_executor(executor, None)
    }

    fn scripted(v2_swap: Result<Vec<u8>, CallFault>) -> Arc<Scripted> {
        Arc::new(Scripted {
            v2_swap,
            v1_swap: words(bps(50), bps(60)),
            name: Some("Scripted"),
            v1_swap_calls: AtomicUsize::new(0),
            v2_swap_calls: AtomicUsize::new(0),
        })
    }

    fn trade() -> TradeEvent {
        TradeEvent {
            side: TradeSide::Buy,
            amount_a: Wad::from_f64(1.0),
            amount_b: Wad::from_f64(100.0),
            timestamp: 0,
            reserve_a: Wad::from_f64(100.0),
            reserve_b: Wad::from_f64(10_000.0),
            pool: PoolContext::new(0, 1, 0),
        }
    }

    #[test]
    fn test_out_of_range_words_are_clamped() {
        // bid = -1 (all ones), ask = 20%
        let program = scripted(Ok(words(U256::MAX, bps(2000))));
        let adapter = adapter(program, StrategyInterface::with_callbacks(false, true)).unwrap();
        let quote = adapter.instantiate().after_swap(&trade()).unwrap();
        assert_eq!(quote.bid_fee, Decimal::ZERO);
        assert_eq!(quote.ask_fee, FEE_CAP);
    }

    #[test]
    fn test_v2_preferred_without_fallback() {
        let program = scripted(Ok(words(bps(10), bps(20))));
        let adapter = adapter(program.clone(), StrategyInterface::assume_all()).unwrap();
        let quote = adapter.instantiate().after_swap(&trade()).unwrap();
        assert_eq!(quote.bid_fee, dec!(0.001));
        assert_eq!(quote.ask_fee, dec!(0.002));
        assert_eq!(program.v1_swap_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_falls_back_to_v1() {
        let program = scripted(Err(CallFault::Reverted(Vec::new())));
        let adapter = adapter(program.clone(), StrategyInterface::assume_all()).unwrap();
        let quote = adapter.instantiate().after_swap(&trade()).unwrap();
        assert_eq!(quote.bid_fee, dec!(0.005));
        assert_eq!(quote.ask_fee, dec!(0.006));
        assert_eq!(program.v1_swap_calls.load(Ordering::SeqCst), 1);

        // short return data also triggers fallback
        let program = scripted(Ok(vec![0u8; 32]));
        let adapter = self::adapter(program, StrategyInterface::assume_all()).unwrap();
        assert!(adapter.instantiate().after_swap(&trade()).is_ok());
    }

    #[test]
    fn test_fallback_sticks_per_instance() {
        let program = scripted(Err(CallFault::Reverted(Vec::new())));
        let adapter = adapter(program.clone(), StrategyInterface::assume_all()).unwrap();

        let mut pool = adapter.instantiate();
        for _ in 0..4 {
            assert_eq!(pool.after_swap(&trade()).unwrap().bid_fee, dec!(0.005));
        }
        assert_eq!(program.v2_swap_calls.load(Ordering::SeqCst), 1);
        assert_eq!(program.v1_swap_calls.load(Ordering::SeqCst), 4);

        // a new pool copy starts from the preferred version again
        let mut other = adapter.instantiate();
        other.after_swap(&trade()).unwrap();
        assert_eq!(program.v2_swap_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failure_without_v1_propagates() {
        let program = scripted(Err(CallFault::OutOfGas));
        let adapter = adapter(program.clone(), StrategyInterface::with_callbacks(false, true)).unwrap();
        let err = adapter.instantiate().after_swap(&trade()).unwrap_err();
        assert_eq!(
            err,
            ExecutorError::CallFailed {
                callback: "afterSwapV2",
                reason: "out of gas".to_string()
            }
        );
        assert_eq!(program.v1_swap_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_callbacks_rejected() {
        let mut interface = StrategyInterface::with_callbacks(true, false);
        interface.after_swap = false;
        let err = adapter(scripted(Ok(Vec::new())), interface).err();
        assert_eq!(err, Some(ExecutorError::MissingCallback("afterSwap")));

        let err = adapter(scripted(Ok(Vec::new())), StrategyInterface::default()).err();
        assert_eq!(err, Some(ExecutorError::MissingCallback("afterInitialize")));
    }

    #[test]
    fn test_name_resolution() {
        let adapter = adapter(scripted(Ok(Vec::new())), StrategyInterface::assume_all()).unwrap();
        assert_eq!(adapter.get_name(), "Scripted");

        let nameless = Arc::new(Scripted {
            v2_swap: Ok(Vec::new()),
            v1_swap: Vec::new(),
            name: None,
            v1_swap_calls: AtomicUsize::new(0),
            v2_swap_calls: AtomicUsize::new(0),
        });
        let adapter = self::adapter(nameless, StrategyInterface::assume_all()).unwrap();
        assert_eq!(adapter.get_name(), UNNAMED);

        let executor = StrategyExecutor::from_program(
            scripted(Ok(Vec::new())),
            StrategyInterface::assume_all(),
            StrategyId::of_bytecode(b"x"),
        );
        let adapter = StrategyAdapter::from_executor(executor, Some("Override".into())).unwrap();
        assert_eq!(adapter.get_name(), "Override");
    }

    #[test]
    fn test_initialize_falls_back() {
        struct InitV1Only;
        impl StrategyProgram for InitV1Only {
            fn call(&self, calldata: &[u8], _gas: u64) -> Result<Vec<u8>, CallFault> {
                match calldata.len() {
                    68 => Ok(words(bps(25), bps(35))),
                    _ => Err(CallFault::Halted("InvalidFEOpcode".into())),
                }
            }
        }
        let executor = StrategyExecutor::from_program(
            InitV1Only,
            StrategyInterface::assume_all(),
            StrategyId::of_bytecode(b"v1"),
        );
        let adapter = StrategyAdapter::from_executor(executor, Some("v1".into())).unwrap();
        let quote = adapter
            .instantiate()
            .after_initialize(&PoolContext::new(0, 1, 0), Wad::from_f64(100.0), Wad::from_f64(10_000.0))
            .unwrap();
        assert_eq!(quote.bid_fee, dec!(0.0025));
        assert_eq!(quote.ask_fee, dec!(0.0035));
    }
}

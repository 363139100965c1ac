//! Constant Function Market Maker (x * y = k).
//!
//! Implements Uniswap V3/V4-style fee model where fees are collected
//! into separate buckets rather than being reinvested into liquidity.
//! This means fees count toward PnL but don't inflate the k constant.
//!
//! X is the pool's token A and Y its token B.

use crate::evm::adapter::StrategyInstance;
use crate::evm::StrategyAdapter;
use crate::simulation::engine::TrialError;
use crate::types::fee_quote::FeeQuote;
use crate::types::result::{PoolState, Side};
use crate::types::trade_info::{PoolContext, TradeEvent, TradeSide};
use crate::types::wad::Wad;

/// Result of a trade execution.
#[derive(Debug, Clone, Copy)]
pub struct TradeResult {
    pub side: TradeSide,
    pub amount_x: f64,
    /// Y paid by (or to) the trader, fees included
    pub amount_y: f64,
    pub fee_amount: f64,
}

/// Constant Function Market Maker with dynamic fees.
///
/// Implements x * y = k invariant with strategy-determined fees.
/// Uses Uniswap V3/V4 fee model where fees are collected separately
/// (not reinvested into liquidity).
pub struct CFMM<'s> {
    /// Competitor owning this pool copy
    pub side: Side,
    /// Index of the configured pool
    pub pool_id: usize,
    /// Token id on the X side
    pub token_a: usize,
    /// Token id on the Y side
    pub token_b: usize,
    /// This copy's own strategy state
    strategy: StrategyInstance<'s>,
    reserve_x: f64,
    reserve_y: f64,
    current_fees: FeeQuote,
    /// Float copies of the current fees for the hot quote paths
    bid_fee: f64,
    ask_fee: f64,
    /// Accumulated fees in X (collected separately, not in reserves)
    accumulated_fees_x: f64,
    /// Accumulated fees in Y (collected separately, not in reserves)
    accumulated_fees_y: f64,
}

impl<'s> CFMM<'s> {
    /// Create a single-asset pool (token 1 priced in token 0).
    pub fn new(strategy: &'s StrategyAdapter, side: Side, reserve_x: f64, reserve_y: f64) -> Self {
        Self::new_with_pair(strategy, side, 0, 1, 0, reserve_x, reserve_y)
    }

    /// Create a pool with explicit token pair metadata.
    pub fn new_with_pair(
        strategy: &'s StrategyAdapter,
        side: Side,
        pool_id: usize,
        token_a: usize,
        token_b: usize,
        reserve_x: f64,
        reserve_y: f64,
    ) -> Self {
        let current_fees = FeeQuote::default();
        Self {
            side,
            pool_id,
            token_a,
            token_b,
            strategy: strategy.instantiate(),
            reserve_x,
            reserve_y,
            current_fees,
            bid_fee: current_fees.bid_f64(),
            ask_fee: current_fees.ask_f64(),
            accumulated_fees_x: 0.0,
            accumulated_fees_y: 0.0,
        }
    }

    /// Context handed to V2 callbacks.
    #[inline]
    pub fn context(&self) -> PoolContext {
        PoolContext::new(self.pool_id as u64, self.token_a as u64, self.token_b as u64)
    }

    /// Get starting fees from the strategy.
    pub fn initialize(&mut self) -> Result<(), TrialError> {
        let context = self.context();
        let quote = self
            .strategy
            .after_initialize(
                &context,
                Wad::from_f64(self.reserve_x),
                Wad::from_f64(self.reserve_y),
            )
            .map_err(|source| TrialError::Strategy {
                side: self.side,
                source,
            })?;
        self.set_fees(quote);
        Ok(())
    }

    /// Returns true when this pool directly connects token_in -> token_out.
    pub fn supports_pair(&self, token_in: usize, token_out: usize) -> bool {
        (self.token_a == token_in && self.token_b == token_out)
            || (self.token_b == token_in && self.token_a == token_out)
    }

    pub fn reserves(&self) -> (f64, f64) {
        (self.reserve_x, self.reserve_y)
    }

    /// Current spot price (Y per X).
    pub fn spot_price(&self) -> f64 {
        if self.reserve_x == 0.0 {
            return 0.0;
        }
        self.reserve_y / self.reserve_x
    }

    pub fn fees(&self) -> FeeQuote {
        self.current_fees
    }

    #[inline]
    pub fn bid_fee(&self) -> f64 {
        self.bid_fee
    }

    #[inline]
    pub fn ask_fee(&self) -> f64 {
        self.ask_fee
    }

    /// Get accumulated fees (collected separately from reserves).
    pub fn accumulated_fees(&self) -> (f64, f64) {
        (self.accumulated_fees_x, self.accumulated_fees_y)
    }

    pub fn state(&self) -> PoolState {
        PoolState {
            side: self.side,
            pool_id: self.pool_id,
            token_a: self.token_a,
            token_b: self.token_b,
            reserve_a: self.reserve_x,
            reserve_b: self.reserve_y,
        }
    }

    fn set_fees(&mut self, quote: FeeQuote) {
        self.current_fees = quote;
        self.bid_fee = quote.bid_f64();
        self.ask_fee = quote.ask_f64();
    }

    /// Quote for AMM buying X (trader selling X).
    ///
    /// Returns (y_out, fee_amount) or (0, 0) if invalid.
    #[inline]
    pub fn quote_buy_x(&self, amount_x: f64) -> (f64, f64) {
        if amount_x <= 0.0 {
            return (0.0, 0.0);
        }

        let fee = self.bid_fee;
        let gamma = (1.0 - fee).clamp(0.0, 1.0);
        if gamma <= 0.0 {
            return (0.0, 0.0);
        }
        let net_x = amount_x * gamma;

        let k = self.reserve_x * self.reserve_y;
        let new_rx = self.reserve_x + net_x;
        let new_ry = k / new_rx;
        let y_out = self.reserve_y - new_ry;

        if y_out > 0.0 {
            (y_out, amount_x * fee)
        } else {
            (0.0, 0.0)
        }
    }

    /// Quote for AMM selling X (trader buying X).
    ///
    /// Returns (total_y_in, fee_amount) or (0, 0) if invalid.
    #[inline]
    pub fn quote_sell_x(&self, amount_x: f64) -> (f64, f64) {
        if amount_x <= 0.0 || amount_x >= self.reserve_x {
            return (0.0, 0.0);
        }

        let k = self.reserve_x * self.reserve_y;
        let fee = self.ask_fee;
        let gamma = (1.0 - fee).clamp(0.0, 1.0);
        if gamma <= 0.0 {
            return (0.0, 0.0);
        }

        let new_rx = self.reserve_x - amount_x;
        let new_ry = k / new_rx;
        let net_y = new_ry - self.reserve_y;

        if net_y <= 0.0 {
            return (0.0, 0.0);
        }

        let total_y = net_y / gamma;
        (total_y, total_y - net_y)
    }

    /// Quote for Y input to X output.
    ///
    /// Returns (x_out, fee_amount) or (0, 0) if invalid.
    #[inline]
    pub fn quote_x_for_y(&self, amount_y: f64) -> (f64, f64) {
        if amount_y <= 0.0 {
            return (0.0, 0.0);
        }

        let k = self.reserve_x * self.reserve_y;
        let fee = self.ask_fee;
        let gamma = (1.0 - fee).clamp(0.0, 1.0);
        if gamma <= 0.0 {
            return (0.0, 0.0);
        }

        let net_y = amount_y * gamma;
        let new_ry = self.reserve_y + net_y;
        let new_rx = k / new_ry;
        let x_out = self.reserve_x - new_rx;

        if x_out > 0.0 {
            (x_out, amount_y * fee)
        } else {
            (0.0, 0.0)
        }
    }

    /// Quote an exact-input swap in either direction of the pair.
    ///
    /// Returns (amount_out, fee_amount_in_token_in).
    #[inline]
    pub fn quote_exact_in(&self, token_in: usize, token_out: usize, amount_in: f64) -> Option<(f64, f64)> {
        if amount_in <= 0.0 {
            return None;
        }
        if token_in == self.token_a && token_out == self.token_b {
            return Some(self.quote_buy_x(amount_in));
        }
        if token_in == self.token_b && token_out == self.token_a {
            return Some(self.quote_x_for_y(amount_in));
        }
        None
    }

    /// Execute trade where AMM buys X (trader sells X for Y).
    pub fn execute_buy_x(&mut self, amount_x: f64, timestamp: u64) -> Result<Option<TradeResult>, TrialError> {
        let (y_out, fee_amount) = self.quote_buy_x(amount_x);
        if y_out <= 0.0 {
            return Ok(None);
        }

        let event = self.event(TradeSide::Buy, amount_x, y_out, timestamp);

        // fees go to a separate bucket, not into liquidity
        self.reserve_x += amount_x - fee_amount;
        self.accumulated_fees_x += fee_amount;
        self.reserve_y -= y_out;

        self.update_fees(&event)?;

        Ok(Some(TradeResult {
            side: TradeSide::Buy,
            amount_x,
            amount_y: y_out,
            fee_amount,
        }))
    }

    /// Execute trade where AMM sells X (trader buys X with Y).
    pub fn execute_sell_x(&mut self, amount_x: f64, timestamp: u64) -> Result<Option<TradeResult>, TrialError> {
        let (total_y, fee_amount) = self.quote_sell_x(amount_x);
        if total_y <= 0.0 {
            return Ok(None);
        }

        let event = self.event(TradeSide::Sell, amount_x, total_y, timestamp);

        self.reserve_x -= amount_x;
        self.reserve_y += total_y - fee_amount;
        self.accumulated_fees_y += fee_amount;

        self.update_fees(&event)?;

        Ok(Some(TradeResult {
            side: TradeSide::Sell,
            amount_x,
            amount_y: total_y,
            fee_amount,
        }))
    }

    /// Execute trade where trader pays Y to receive X.
    pub fn execute_buy_x_with_y(&mut self, amount_y: f64, timestamp: u64) -> Result<Option<TradeResult>, TrialError> {
        let (x_out, fee_amount) = self.quote_x_for_y(amount_y);
        if x_out <= 0.0 {
            return Ok(None);
        }

        let event = self.event(TradeSide::Sell, x_out, amount_y, timestamp);

        self.reserve_x -= x_out;
        self.reserve_y += amount_y - fee_amount;
        self.accumulated_fees_y += fee_amount;

        self.update_fees(&event)?;

        Ok(Some(TradeResult {
            side: TradeSide::Sell,
            amount_x: x_out,
            amount_y,
            fee_amount,
        }))
    }

    /// Execute an exact-input swap in either direction of the pair.
    ///
    /// Returns the amount of `token_out` received.
    pub fn execute_exact_in(
        &mut self,
        token_in: usize,
        token_out: usize,
        amount_in: f64,
        timestamp: u64,
    ) -> Result<Option<f64>, TrialError> {
        if token_in == self.token_a && token_out == self.token_b {
            let result = self.execute_buy_x(amount_in, timestamp)?;
            return Ok(result.map(|r| r.amount_y));
        }
        if token_in == self.token_b && token_out == self.token_a {
            let result = self.execute_buy_x_with_y(amount_in, timestamp)?;
            return Ok(result.map(|r| r.amount_x));
        }
        Ok(None)
    }

    /// Trade event carrying the reserves as they were before the trade.
    fn event(&self, side: TradeSide, amount_x: f64, amount_y: f64, timestamp: u64) -> TradeEvent {
        TradeEvent {
            side,
            amount_a: Wad::from_f64(amount_x),
            amount_b: Wad::from_f64(amount_y),
            timestamp,
            reserve_a: Wad::from_f64(self.reserve_x),
            reserve_b: Wad::from_f64(self.reserve_y),
            pool: self.context(),
        }
    }

    /// Ask the strategy for new fees; a failure after fallback ends the trial.
    fn update_fees(&mut self, event: &TradeEvent) -> Result<(), TrialError> {
        let quote = self
            .strategy
            .after_swap(event)
            .map_err(|source| TrialError::Strategy {
                side: self.side,
                source,
            })?;
        self.set_fees(quote);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::evm::program::{CallFault, StrategyProgram};
    use crate::evm::{StrategyExecutor, StrategyId, StrategyInterface};
    use crate::types::trade_info::{decode_fee_words, AFTER_SWAP_V2_LEN};
    use revm::primitives::U256;
    use std::sync::Mutex;

    /// Always quotes a fixed fee and remembers every swap callback it saw.
    pub(crate) struct FixedFee {
        pub(crate) bps: u64,
        pub(crate) swaps: Mutex<Vec<Vec<u8>>>,
    }

    impl FixedFee {
        pub(crate) fn new(bps: u64) -> Self {
            Self {
                bps,
                swaps: Mutex::new(Vec::new()),
            }
        }
    }

    impl StrategyProgram for FixedFee {
        fn call(&self, calldata: &[u8], _gas_limit: u64) -> Result<Vec<u8>, CallFault> {
            if calldata.len() == AFTER_SWAP_V2_LEN {
                self.swaps.lock().unwrap().push(calldata.to_vec());
            }
            let fee = U256::from(self.bps) * U256::from(100_000_000_000_000u64);
            let mut out = fee.to_be_bytes::<32>().to_vec();
            out.extend_from_slice(&fee.to_be_bytes::<32>());
            Ok(out)
        }
    }

    pub(crate) fn fixed_fee_adapter(bps: u64) -> StrategyAdapter {
        let executor = StrategyExecutor::from_program(
            FixedFee::new(bps),
            StrategyInterface::assume_all(),
            StrategyId::of_bytecode(&bps.to_be_bytes()),
        );
        match StrategyAdapter::from_executor(executor, Some(format!("Fixed_{}bps", bps))) {
            Ok(adapter) => adapter,
            Err(err) => panic!("fixed fee adapter: {}", err),
        }
    }

    #[test]
    fn test_quote_formulas() {
        let adapter = fixed_fee_adapter(25);
        let mut amm = CFMM::new(&adapter, Side::A, 1000.0, 1000.0);
        amm.initialize().unwrap();
        assert!((amm.bid_fee() - 0.0025).abs() < 1e-15);

        // y_out should be approximately 9.876 (accounting for fee and price impact)
        let (y_out, fee) = amm.quote_buy_x(10.0);
        assert!(y_out > 9.8 && y_out < 10.0);
        assert!((fee - 0.025).abs() < 1e-12);

        assert_eq!(amm.quote_sell_x(1000.0), (0.0, 0.0));
        assert_eq!(amm.quote_exact_in(2, 0, 1.0), None);
    }

    #[test]
    fn test_fees_kept_outside_reserves() {
        let adapter = fixed_fee_adapter(30);
        let mut amm = CFMM::new(&adapter, Side::B, 100.0, 10_000.0);
        amm.initialize().unwrap();
        let k = amm.reserves().0 * amm.reserves().1;

        let trade = amm.execute_buy_x_with_y(500.0, 1).unwrap().unwrap();
        assert_eq!(trade.side, TradeSide::Sell);
        assert!((trade.fee_amount - 1.5).abs() < 1e-9);
        assert!((amm.accumulated_fees().1 - 1.5).abs() < 1e-9);

        let (rx, ry) = amm.reserves();
        assert!(((rx * ry) - k).abs() / k < 1e-12);
    }

    #[test]
    fn test_swap_event_carries_pre_trade_reserves() {
        let program = std::sync::Arc::new(FixedFee::new(30));
        let executor = StrategyExecutor::from_program(
            program.clone(),
            StrategyInterface::assume_all(),
            StrategyId::of_bytecode(b"fixed"),
        );
        let adapter = StrategyAdapter::from_executor(executor, None).unwrap();
        let mut amm = CFMM::new_with_pair(&adapter, Side::A, 2, 3, 1, 100.0, 200.0);
        amm.initialize().unwrap();
        amm.execute_exact_in(3, 1, 1.0, 7).unwrap().unwrap();

        let swaps = program.swaps.lock().unwrap();
        assert_eq!(swaps.len(), 1);
        let calldata = &swaps[0];
        // reserveX / reserveY words sit at 132..196 and hold the pre-trade values
        let (rx, ry) = decode_fee_words(&calldata[132..196]).unwrap();
        assert_eq!(rx, U256::from(100u128 * 1_000_000_000_000_000_000));
        assert_eq!(ry, U256::from(200u128 * 1_000_000_000_000_000_000));
        // pool id, token a, token b
        assert_eq!(U256::from_be_slice(&calldata[196..228]), U256::from(2u8));
        assert_eq!(U256::from_be_slice(&calldata[228..260]), U256::from(3u8));
        assert_eq!(U256::from_be_slice(&calldata[260..292]), U256::from(1u8));
    }
}

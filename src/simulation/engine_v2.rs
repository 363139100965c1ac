//! Multi-asset trial engine (N tokens, many two-token pools).

use rust_decimal::Decimal;

use crate::amm::CFMM;
use crate::evm::StrategyAdapter;
use crate::market::{Arbitrageur, MultiAssetPriceProcess, OrderRouter, RetailTraderV2};
use crate::simulation::engine::{exact_for, TrialError};
use crate::types::config::ScenarioConfigV2;
use crate::types::result::{Side, TrialOutcome};
use crate::types::trade_info::TradeSide;

/// Smallest price used when converting a numeraire size into token units.
const MIN_PRICE: f64 = 1e-9;
/// Smallest order amount sent to a pool.
const MIN_AMOUNT_IN: f64 = 1e-12;

/// Simulation engine for a two-strategy, multi-asset trial.
///
/// Every configured pool exists twice, once per strategy. Values are
/// measured in the numeraire token.
pub struct SimulationEngineV2<'c> {
    config: &'c ScenarioConfigV2,
}

impl<'c> SimulationEngineV2<'c> {
    pub fn new(config: &'c ScenarioConfigV2) -> Self {
        Self { config }
    }

    pub fn run(
        &self,
        strategy_a: &StrategyAdapter,
        strategy_b: &StrategyAdapter,
    ) -> Result<TrialOutcome, TrialError> {
        let config = self.config;
        config.validate()?;
        let seed = config.seed.unwrap_or(0);

        let mut price_process = MultiAssetPriceProcess::new(
            config.initial_prices.clone(),
            config.numeraire_token,
            config.gbm_mu,
            config.gbm_sigma,
            config.gbm_dt,
            Some(seed),
        );
        let mut retail_trader = RetailTraderV2::new(
            config.n_tokens(),
            config.retail_arrival_rate,
            config.retail_mean_size,
            config.retail_size_sigma,
            config.retail_buy_prob,
            Some(seed.wrapping_add(1)),
        )?;

        let arbitrageur = Arbitrageur::new();
        let router = OrderRouter::new();

        let mut amms: Vec<CFMM<'_>> = Vec::with_capacity(config.pools.len() * 2);
        for (pool_id, pool) in config.pools.iter().enumerate() {
            for (side, strategy) in [(Side::A, strategy_a), (Side::B, strategy_b)] {
                let mut amm = CFMM::new_with_pair(
                    strategy,
                    side,
                    pool_id,
                    pool.token_a,
                    pool.token_b,
                    pool.initial_a,
                    pool.initial_b,
                );
                amm.initialize()?;
                amms.push(amm);
            }
        }

        let mut initial_value = [0.0f64; 2];
        {
            let prices = price_process.current_prices();
            for amm in &amms {
                let (ra, rb) = amm.reserves();
                initial_value[amm.side.index()] += ra * prices[amm.token_a] + rb * prices[amm.token_b];
            }
        }

        let mut edges = [0.0f64; 2];

        for t in 0..config.n_steps {
            let timestamp = u64::from(t);
            let prices = price_process.step();

            // arbitrage each pool to the fair cross rate (token_b per token_a)
            for amm in amms.iter_mut() {
                let (pa, pb) = (prices[amm.token_a], prices[amm.token_b]);
                if let Some(arb) = arbitrageur.execute_arb(amm, pa / pb, timestamp)? {
                    let edge = match arb.side {
                        TradeSide::Buy => arb.amount_x * pa - arb.amount_y * pb,
                        TradeSide::Sell => arb.amount_y * pb - arb.amount_x * pa,
                    };
                    edges[amm.side.index()] += edge;
                }
            }

            for order in retail_trader.generate_orders() {
                let amount_in =
                    (order.size_numeraire / prices[order.token_in].max(MIN_PRICE)).max(MIN_AMOUNT_IN);
                if let Some(trade) = router.route_order_v2(&order, amount_in, &mut amms, timestamp)? {
                    let edge = trade.amount_in * prices[order.token_in]
                        - trade.amount_out * prices[order.token_out];
                    edges[amms[trade.amm_index].side.index()] += edge;
                }
            }
        }

        let final_prices = price_process.current_prices().to_vec();
        let mut final_value = [0.0f64; 2];
        for amm in &amms {
            let (ra, rb) = amm.reserves();
            let (fa, fb) = amm.accumulated_fees();
            final_value[amm.side.index()] +=
                (ra + fa) * final_prices[amm.token_a] + (rb + fb) * final_prices[amm.token_b];
        }

        let mut pnl = [Decimal::ZERO; 2];
        let mut edge = [Decimal::ZERO; 2];
        for side in Side::BOTH {
            let i = side.index();
            pnl[i] = exact_for(side, "pnl", final_value[i] - initial_value[i])?;
            edge[i] = exact_for(side, "edge", edges[i])?;
        }

        Ok(TrialOutcome {
            seed,
            pnl,
            edge,
            pools: amms.iter().map(CFMM::state).collect(),
            final_prices,
            diagnostics: None,
        })
    }
}

/// Run one multi-asset trial between two strategies.
pub fn run_trial_v2(
    config: &ScenarioConfigV2,
    strategy_a: &StrategyAdapter,
    strategy_b: &StrategyAdapter,
) -> Result<TrialOutcome, TrialError> {
    SimulationEngineV2::new(config).run(strategy_a, strategy_b)
}

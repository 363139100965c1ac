//! Single-asset trial engine.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::amm::CFMM;
use crate::evm::{ExecutorError, StrategyAdapter};
use crate::market::{Arbitrageur, GBMPriceProcess, OrderRouter, RetailTrader};
use crate::types::config::{ConfigError, ScenarioConfig};
use crate::types::result::{exact_amount, Side, TrialDiagnostics, TrialOutcome};

/// Reason a single trial could not produce an outcome.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrialError {
    /// A strategy callback failed after every fallback attempt.
    #[error("strategy {side} failed: {source}")]
    Strategy {
        side: Side,
        #[source]
        source: ExecutorError,
    },

    #[error("non-finite {quantity} for strategy {side}")]
    NonFinite { side: Side, quantity: &'static str },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Convert a per-side float result into exact accounting.
pub(crate) fn exact_for(side: Side, quantity: &'static str, value: f64) -> Result<Decimal, TrialError> {
    exact_amount(value).ok_or(TrialError::NonFinite { side, quantity })
}

/// Simulation engine for a two-strategy, single-asset trial.
///
/// Runs a simulation with the following loop per step:
/// 1. Generate new fair price via GBM
/// 2. Arbitrageur extracts profit from each AMM
/// 3. Retail orders arrive and are routed across both AMMs
///
/// Each strategy quotes fees on its own copy of the pool; the copies start
/// from the same reserves.
pub struct SimulationEngine<'c> {
    config: &'c ScenarioConfig,
}

impl<'c> SimulationEngine<'c> {
    pub fn new(config: &'c ScenarioConfig) -> Self {
        Self { config }
    }

    /// Run a complete trial.
    pub fn run(
        &self,
        strategy_a: &StrategyAdapter,
        strategy_b: &StrategyAdapter,
    ) -> Result<TrialOutcome, TrialError> {
        let config = self.config;
        config.validate()?;
        let seed = config.seed.unwrap_or(0);

        let mut price_process = GBMPriceProcess::new(
            config.initial_price,
            config.gbm_mu,
            config.gbm_sigma,
            config.gbm_dt,
            Some(seed),
        );

        // retail flow draws from its own stream
        let mut retail_trader = RetailTrader::new(
            config.retail_arrival_rate,
            config.retail_mean_size,
            config.retail_size_sigma,
            config.retail_buy_prob,
            Some(seed.wrapping_add(1)),
        )?;

        let arbitrageur = Arbitrageur::new();
        let router = OrderRouter::new();

        let mut amms = [
            CFMM::new(strategy_a, Side::A, config.initial_x, config.initial_y),
            CFMM::new(strategy_b, Side::B, config.initial_x, config.initial_y),
        ];
        for amm in amms.iter_mut() {
            amm.initialize()?;
        }

        let initial_fair_price = price_process.current_price();
        let initial_value = config.initial_x * initial_fair_price + config.initial_y;

        let mut edges = [0.0f64; 2];
        let mut arb_volume_y = [0.0f64; 2];
        let mut retail_volume_y = [0.0f64; 2];
        let mut cumulative_fees = [(0.0f64, 0.0f64); 2];

        for t in 0..config.n_steps {
            let timestamp = u64::from(t);
            let fair_price = price_process.step();

            for amm in amms.iter_mut() {
                if let Some(arb) = arbitrageur.execute_arb(amm, fair_price, timestamp)? {
                    let i = amm.side.index();
                    arb_volume_y[i] += arb.amount_y;
                    edges[i] += arb.amm_edge();
                }
            }

            let orders = retail_trader.generate_orders();
            for trade in router.route_orders(&orders, &mut amms, fair_price, timestamp)? {
                let i = trade.side.index();
                retail_volume_y[i] += trade.amount_y;
                edges[i] += trade.amm_edge(fair_price);
            }

            for amm in &amms {
                let fees = &mut cumulative_fees[amm.side.index()];
                fees.0 += amm.bid_fee();
                fees.1 += amm.ask_fee();
            }
        }

        let final_fair_price = price_process.current_price();
        let mut average_fees = [(0.0f64, 0.0f64); 2];
        let mut pnl = [Decimal::ZERO; 2];
        let mut edge = [Decimal::ZERO; 2];

        for amm in &amms {
            let i = amm.side.index();
            average_fees[i] = if config.n_steps == 0 {
                (amm.bid_fee(), amm.ask_fee())
            } else {
                let n = f64::from(config.n_steps);
                (cumulative_fees[i].0 / n, cumulative_fees[i].1 / n)
            };

            // reserves plus the separately collected fees
            let (final_x, final_y) = amm.reserves();
            let (fees_x, fees_y) = amm.accumulated_fees();
            let final_value = (final_x + fees_x) * final_fair_price + final_y + fees_y;

            pnl[i] = exact_for(amm.side, "pnl", final_value - initial_value)?;
            edge[i] = exact_for(amm.side, "edge", edges[i])?;
        }

        Ok(TrialOutcome {
            seed,
            pnl,
            edge,
            final_prices: vec![final_fair_price],
            pools: amms.iter().map(CFMM::state).collect(),
            diagnostics: Some(TrialDiagnostics {
                arb_volume_y,
                retail_volume_y,
                average_fees,
            }),
        })
    }
}

/// Run one single-asset trial between two strategies.
pub fn run_trial(
    config: &ScenarioConfig,
    strategy_a: &StrategyAdapter,
    strategy_b: &StrategyAdapter,
) -> Result<TrialOutcome, TrialError> {
    SimulationEngine::new(config).run(strategy_a, strategy_b)
}

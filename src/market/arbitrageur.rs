//! Arbitrageur logic for extracting profit from mispriced AMMs.

use crate::amm::CFMM;
use crate::simulation::engine::TrialError;
use crate::types::trade_info::TradeSide;

/// An executed arbitrage.
#[derive(Debug, Clone, Copy)]
pub struct ArbResult {
    /// AMM-perspective direction
    pub side: TradeSide,
    /// Arbitrageur profit at the fair price, in Y
    pub profit: f64,
    pub amount_x: f64,
    pub amount_y: f64,
}

impl ArbResult {
    /// The AMM loses exactly what the arbitrageur gains.
    #[inline]
    pub fn amm_edge(&self) -> f64 {
        -self.profit
    }
}

/// Arbitrageur that extracts profit from mispriced AMMs.
///
/// Uses closed-form solutions for constant product AMMs.
/// For reserves (x, y), k=xy, fee f (fee-on-input), γ = 1 - f, and fair price p (Y per X):
/// - Buy X from AMM (AMM sells X): Δx_out = x - sqrt(k / (γ·p))
/// - Sell X to AMM (AMM buys X): Δx_in = (sqrt(k·γ / p) - x) / γ, gross input
#[derive(Debug, Default, Clone, Copy)]
pub struct Arbitrageur;

impl Arbitrageur {
    pub fn new() -> Self {
        Self
    }

    /// Find and execute the optimal arbitrage trade, if any is profitable.
    pub fn execute_arb(
        &self,
        amm: &mut CFMM<'_>,
        fair_price: f64,
        timestamp: u64,
    ) -> Result<Option<ArbResult>, TrialError> {
        if !(fair_price > 0.0) {
            return Ok(None);
        }
        let spot_price = amm.spot_price();

        if spot_price < fair_price {
            // AMM underprices X: buy X from it
            self.buy_from_amm(amm, fair_price, timestamp)
        } else if spot_price > fair_price {
            // AMM overprices X: sell X to it
            self.sell_to_amm(amm, fair_price, timestamp)
        } else {
            Ok(None)
        }
    }

    /// Maximize Δx * p - Y_paid.
    fn buy_from_amm(
        &self,
        amm: &mut CFMM<'_>,
        fair_price: f64,
        timestamp: u64,
    ) -> Result<Option<ArbResult>, TrialError> {
        let (rx, ry) = amm.reserves();
        let gamma = 1.0 - amm.ask_fee();
        if gamma <= 0.0 {
            return Ok(None);
        }

        let amount_x = rx - (rx * ry / (gamma * fair_price)).sqrt();
        if amount_x <= 0.0 {
            return Ok(None);
        }
        // never drain more than 99% of the pool
        let amount_x = amount_x.min(rx * 0.99);

        let (total_y, _) = amm.quote_sell_x(amount_x);
        if total_y <= 0.0 {
            return Ok(None);
        }
        let profit = amount_x * fair_price - total_y;
        if profit <= 0.0 {
            return Ok(None);
        }

        let executed = amm.execute_sell_x(amount_x, timestamp)?;
        Ok(executed.map(|trade| ArbResult {
            side: TradeSide::Sell,
            profit,
            amount_x: trade.amount_x,
            amount_y: trade.amount_y,
        }))
    }

    /// Maximize Y_received - Δx * p.
    fn sell_to_amm(
        &self,
        amm: &mut CFMM<'_>,
        fair_price: f64,
        timestamp: u64,
    ) -> Result<Option<ArbResult>, TrialError> {
        let (rx, ry) = amm.reserves();
        let gamma = 1.0 - amm.bid_fee();
        if gamma <= 0.0 {
            return Ok(None);
        }

        // x + γ·Δx_in = sqrt(k·γ/p)
        let amount_x = ((rx * ry * gamma / fair_price).sqrt() - rx) / gamma;
        if amount_x <= 0.0 {
            return Ok(None);
        }

        let (y_out, _) = amm.quote_buy_x(amount_x);
        if y_out <= 0.0 {
            return Ok(None);
        }
        let profit = y_out - amount_x * fair_price;
        if profit <= 0.0 {
            return Ok(None);
        }

        let executed = amm.execute_buy_x(amount_x, timestamp)?;
        Ok(executed.map(|trade| ArbResult {
            side: TradeSide::Buy,
            profit,
            amount_x: trade.amount_x,
            amount_y: trade.amount_y,
        }))
    }
}

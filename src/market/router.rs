//! Order routing: optimal two-venue split for single-asset flow and best
//! direct pool for multi-asset flow.

use crate::amm::CFMM;
use crate::market::retail::{OrderSide, RetailOrder, RetailOrderV2};
use crate::simulation::engine::TrialError;
use crate::types::result::Side;

/// Orders below this size on one venue are not sent.
const MIN_AMOUNT: f64 = 0.0001;

/// Result of routing part of an order to one AMM.
#[derive(Debug, Clone, Copy)]
pub struct RoutedTrade {
    /// Owner of the AMM that filled
    pub side: Side,
    /// Amount of Y spent (buy) or received (sell)
    pub amount_y: f64,
    pub amount_x: f64,
    /// True if AMM buys X (trader sells X)
    pub amm_buys_x: bool,
}

impl RoutedTrade {
    /// AMM edge at the fair price: value received minus value paid, in Y.
    #[inline]
    pub fn amm_edge(&self, fair_price: f64) -> f64 {
        if self.amm_buys_x {
            self.amount_x * fair_price - self.amount_y
        } else {
            self.amount_y - self.amount_x * fair_price
        }
    }
}

/// A filled multi-asset order.
#[derive(Debug, Clone, Copy)]
pub struct RoutedTradeV2 {
    /// Index of the AMM that filled
    pub amm_index: usize,
    pub amount_in: f64,
    pub amount_out: f64,
}

/// Routes retail orders across AMMs.
///
/// With two venues the split equalizes marginal prices after the trade,
/// which for constant product AMMs has a closed form.
#[derive(Debug, Default, Clone, Copy)]
pub struct OrderRouter;

impl OrderRouter {
    pub fn new() -> Self {
        Self
    }

    /// Optimal Y split for buying X across two AMMs.
    ///
    /// Uniswap v2 fee-on-input model with γ = 1 - f:
    /// - A_i = sqrt(x_i * γ_i * y_i), r = A_1/A_2
    /// - Δy_1* = (r * (y_2 + γ_2 * Y) - y_1) / (γ_1 + r * γ_2)
    fn split_buy(&self, amm1: &CFMM<'_>, amm2: &CFMM<'_>, total_y: f64) -> (f64, f64) {
        let (x1, y1) = amm1.reserves();
        let (x2, y2) = amm2.reserves();
        let gamma1 = 1.0 - amm1.ask_fee();
        let gamma2 = 1.0 - amm2.ask_fee();

        let a1 = (x1 * gamma1 * y1).sqrt();
        let a2 = (x2 * gamma2 * y2).sqrt();
        Self::split(a1, a2, y1, y2, gamma1, gamma2, total_y)
    }

    /// Optimal X split for selling X across two AMMs.
    ///
    /// - B_i = sqrt(y_i * γ_i * x_i), r = B_1/B_2
    /// - Δx_1* = (r * (x_2 + γ_2 * X) - x_1) / (γ_1 + r * γ_2)
    fn split_sell(&self, amm1: &CFMM<'_>, amm2: &CFMM<'_>, total_x: f64) -> (f64, f64) {
        let (x1, y1) = amm1.reserves();
        let (x2, y2) = amm2.reserves();
        let gamma1 = 1.0 - amm1.bid_fee();
        let gamma2 = 1.0 - amm2.bid_fee();

        let b1 = (y1 * gamma1 * x1).sqrt();
        let b2 = (y2 * gamma2 * x2).sqrt();
        Self::split(b1, b2, x1, x2, gamma1, gamma2, total_x)
    }

    #[allow(clippy::too_many_arguments)]
    fn split(c1: f64, c2: f64, r1: f64, r2: f64, gamma1: f64, gamma2: f64, total: f64) -> (f64, f64) {
        if c2 == 0.0 {
            return (total, 0.0);
        }
        let r = c1 / c2;
        let denominator = gamma1 + r * gamma2;
        let first = if denominator == 0.0 {
            total / 2.0
        } else {
            (r * (r2 + gamma2 * total) - r1) / denominator
        };
        let first = first.clamp(0.0, total);
        (first, total - first)
    }

    /// Route one single-asset order across the AMMs.
    pub fn route_order(
        &self,
        order: &RetailOrder,
        amms: &mut [CFMM<'_>],
        fair_price: f64,
        timestamp: u64,
    ) -> Result<Vec<RoutedTrade>, TrialError> {
        let mut trades = Vec::with_capacity(2);

        match amms {
            [] => {}
            [amm] => {
                let amount = match order.side {
                    OrderSide::Buy => order.size,
                    OrderSide::Sell => order.size / fair_price,
                };
                Self::fill(amm, order.side, amount, timestamp, &mut trades)?;
            }
            // venues beyond the first two are not routed to
            [amm1, amm2, ..] => {
                let (first, second) = match order.side {
                    OrderSide::Buy => self.split_buy(amm1, amm2, order.size),
                    OrderSide::Sell => self.split_sell(amm1, amm2, order.size / fair_price),
                };
                if first > MIN_AMOUNT {
                    Self::fill(amm1, order.side, first, timestamp, &mut trades)?;
                }
                if second > MIN_AMOUNT {
                    Self::fill(amm2, order.side, second, timestamp, &mut trades)?;
                }
            }
        }

        Ok(trades)
    }

    /// Buy spends `amount` Y; sell delivers `amount` X.
    fn fill(
        amm: &mut CFMM<'_>,
        side: OrderSide,
        amount: f64,
        timestamp: u64,
        trades: &mut Vec<RoutedTrade>,
    ) -> Result<(), TrialError> {
        let executed = match side {
            OrderSide::Buy => amm.execute_buy_x_with_y(amount, timestamp)?,
            OrderSide::Sell => amm.execute_buy_x(amount, timestamp)?,
        };
        if let Some(trade) = executed {
            trades.push(RoutedTrade {
                side: amm.side,
                amount_y: trade.amount_y,
                amount_x: trade.amount_x,
                amm_buys_x: side == OrderSide::Sell,
            });
        }
        Ok(())
    }

    /// Route multiple orders in arrival order.
    pub fn route_orders(
        &self,
        orders: &[RetailOrder],
        amms: &mut [CFMM<'_>],
        fair_price: f64,
        timestamp: u64,
    ) -> Result<Vec<RoutedTrade>, TrialError> {
        let mut all_trades = Vec::new();
        for order in orders {
            all_trades.extend(self.route_order(order, amms, fair_price, timestamp)?);
        }
        Ok(all_trades)
    }

    /// Send a multi-asset order whole to the direct pool with the best output.
    ///
    /// Ties go to the earlier pool.
    pub fn route_order_v2(
        &self,
        order: &RetailOrderV2,
        amount_in: f64,
        amms: &mut [CFMM<'_>],
        timestamp: u64,
    ) -> Result<Option<RoutedTradeV2>, TrialError> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, amm) in amms.iter().enumerate() {
            if let Some((out, _fee)) = amm.quote_exact_in(order.token_in, order.token_out, amount_in) {
                if out > best.map_or(0.0, |(_, best_out)| best_out) {
                    best = Some((idx, out));
                }
            }
        }

        let Some((amm_index, _)) = best else {
            return Ok(None);
        };
        let filled =
            amms[amm_index].execute_exact_in(order.token_in, order.token_out, amount_in, timestamp)?;
        Ok(filled.map(|amount_out| RoutedTradeV2 {
            amm_index,
            amount_in,
            amount_out,
        }))
    }
}

//! Retail order flow with Poisson arrivals and lognormal sizes.
//!
//! Retail traders are uninformed: direction is a coin flip weighted by the
//! buy probability, independent of the fair price.

use rand::Rng;
use rand::SeedableRng;
use rand_distr::{Distribution, LogNormal, Poisson};
use rand_pcg::Pcg64;

use crate::types::config::ConfigError;

/// Floor for the arrival rate and size parameters.
const MIN_PARAM: f64 = 0.01;

/// Trader-side direction with respect to X.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    /// Trader buys X, spending Y
    Buy,
    /// Trader sells X, receiving Y
    Sell,
}

/// A single-asset retail order to be routed to AMMs.
#[derive(Debug, Clone, Copy)]
pub struct RetailOrder {
    pub side: OrderSide,
    /// Size in Y terms (how much Y willing to spend/receive)
    pub size: f64,
}

/// A multi-asset retail order in token-id space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetailOrderV2 {
    pub token_in: usize,
    pub token_out: usize,
    /// Order notional in numeraire terms
    pub size_numeraire: f64,
}

/// Shared arrival/size sampling.
struct OrderFlow {
    buy_prob: f64,
    rng: Pcg64,
    poisson: Poisson<f64>,
    lognormal: LogNormal<f64>,
}

impl OrderFlow {
    fn new(
        arrival_rate: f64,
        mean_size: f64,
        size_sigma: f64,
        buy_prob: f64,
        seed: Option<u64>,
    ) -> Result<Self, ConfigError> {
        let rng = match seed {
            Some(s) => Pcg64::seed_from_u64(s),
            None => Pcg64::from_entropy(),
        };

        if ![arrival_rate, mean_size, size_sigma].iter().all(|v| v.is_finite()) {
            return Err(ConfigError::InvalidScenario(format!(
                "retail parameters must be finite, got rate={} mean={} sigma={}",
                arrival_rate, mean_size, size_sigma
            )));
        }

        // zero rates and sizes are allowed by the config; floor them
        let lambda = arrival_rate.max(MIN_PARAM);
        let mean = mean_size.max(MIN_PARAM);
        let sigma = size_sigma.max(MIN_PARAM);
        let mu = mean.ln() - 0.5 * sigma * sigma;

        let poisson = Poisson::new(lambda).map_err(|e| {
            ConfigError::InvalidScenario(format!("retail arrival rate {}: {}", arrival_rate, e))
        })?;
        let lognormal = LogNormal::new(mu, sigma).map_err(|e| {
            ConfigError::InvalidScenario(format!("retail size distribution: {}", e))
        })?;

        Ok(Self {
            buy_prob,
            rng,
            poisson,
            lognormal,
        })
    }

    #[inline]
    fn arrivals(&mut self) -> usize {
        self.poisson.sample(&mut self.rng) as usize
    }

    #[inline]
    fn size(&mut self) -> f64 {
        self.lognormal.sample(&mut self.rng)
    }

    #[inline]
    fn is_buy(&mut self) -> bool {
        self.rng.gen::<f64>() < self.buy_prob
    }
}

/// Single-asset retail flow.
pub struct RetailTrader {
    flow: OrderFlow,
}

impl RetailTrader {
    pub fn new(
        arrival_rate: f64,
        mean_size: f64,
        size_sigma: f64,
        buy_prob: f64,
        seed: Option<u64>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            flow: OrderFlow::new(arrival_rate, mean_size, size_sigma, buy_prob, seed)?,
        })
    }

    /// Generate retail orders for one time step.
    #[inline]
    pub fn generate_orders(&mut self) -> Vec<RetailOrder> {
        let n_arrivals = self.flow.arrivals();
        let mut orders = Vec::with_capacity(n_arrivals);

        for _ in 0..n_arrivals {
            let size = self.flow.size();
            let side = if self.flow.is_buy() { OrderSide::Buy } else { OrderSide::Sell };
            orders.push(RetailOrder { side, size });
        }

        orders
    }
}

/// Retail flow across a token universe.
///
/// For a sampled ordered pair (a, b): a buy pays b to receive a, a sell
/// pays a to receive b.
pub struct RetailTraderV2 {
    n_tokens: usize,
    flow: OrderFlow,
}

impl RetailTraderV2 {
    pub fn new(
        n_tokens: usize,
        arrival_rate: f64,
        mean_size_numeraire: f64,
        size_sigma: f64,
        buy_prob: f64,
        seed: Option<u64>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            n_tokens,
            flow: OrderFlow::new(arrival_rate, mean_size_numeraire, size_sigma, buy_prob, seed)?,
        })
    }

    pub fn generate_orders(&mut self) -> Vec<RetailOrderV2> {
        if self.n_tokens < 2 {
            return Vec::new();
        }
        let n_arrivals = self.flow.arrivals();
        let mut orders = Vec::with_capacity(n_arrivals);

        for _ in 0..n_arrivals {
            let a = self.flow.rng.gen_range(0..self.n_tokens);
            let mut b = self.flow.rng.gen_range(0..self.n_tokens - 1);
            if b >= a {
                b += 1;
            }
            let (token_in, token_out) = if self.flow.is_buy() { (b, a) } else { (a, b) };
            orders.push(RetailOrderV2 {
                token_in,
                token_out,
                size_numeraire: self.flow.size(),
            });
        }

        orders
    }
}

//! Geometric Brownian Motion price processes.
//!
//! S(t+1) = S(t) * exp((mu - 0.5*sigma^2)*dt + sigma*sqrt(dt)*Z)

use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use rand_pcg::Pcg64;

/// Floor applied to multi-asset prices so cross rates stay finite.
const MIN_PRICE: f64 = 1e-9;

fn seeded(seed: Option<u64>) -> Pcg64 {
    match seed {
        Some(s) => Pcg64::seed_from_u64(s),
        None => Pcg64::from_entropy(),
    }
}

/// Drift and volatility terms shared by both processes.
#[derive(Debug, Clone, Copy)]
struct GbmTerms {
    /// (mu - 0.5 * sigma^2) * dt
    drift: f64,
    /// sigma * sqrt(dt)
    vol: f64,
}

impl GbmTerms {
    fn new(mu: f64, sigma: f64, dt: f64) -> Self {
        Self {
            drift: (mu - 0.5 * sigma * sigma) * dt,
            vol: sigma * dt.sqrt(),
        }
    }

    #[inline]
    fn factor(&self, rng: &mut Pcg64) -> f64 {
        let z: f64 = StandardNormal.sample(rng);
        (self.drift + self.vol * z).exp()
    }
}

/// Fair price of the single risky asset (Y per X).
pub struct GBMPriceProcess {
    current_price: f64,
    terms: GbmTerms,
    rng: Pcg64,
}

impl GBMPriceProcess {
    pub fn new(initial_price: f64, mu: f64, sigma: f64, dt: f64, seed: Option<u64>) -> Self {
        Self {
            current_price: initial_price,
            terms: GbmTerms::new(mu, sigma, dt),
            rng: seeded(seed),
        }
    }

    #[inline]
    pub fn current_price(&self) -> f64 {
        self.current_price
    }

    /// Generate the next price.
    #[inline]
    pub fn step(&mut self) -> f64 {
        self.current_price *= self.terms.factor(&mut self.rng);
        self.current_price
    }
}

/// Fair prices of many assets in numeraire terms.
///
/// Every non-numeraire asset follows an independent GBM; the numeraire is
/// pinned to 1.
pub struct MultiAssetPriceProcess {
    prices: Vec<f64>,
    numeraire_token: usize,
    terms: GbmTerms,
    rng: Pcg64,
}

impl MultiAssetPriceProcess {
    pub fn new(
        initial_prices: Vec<f64>,
        numeraire_token: usize,
        mu: f64,
        sigma: f64,
        dt: f64,
        seed: Option<u64>,
    ) -> Self {
        let mut prices = initial_prices;
        if let Some(p) = prices.get_mut(numeraire_token) {
            *p = 1.0;
        }

        Self {
            prices,
            numeraire_token,
            terms: GbmTerms::new(mu, sigma, dt),
            rng: seeded(seed),
        }
    }

    pub fn current_prices(&self) -> &[f64] {
        &self.prices
    }

    /// Advance every non-numeraire price by one step.
    pub fn step(&mut self) -> &[f64] {
        for (token, price) in self.prices.iter_mut().enumerate() {
            if token == self.numeraire_token {
                continue;
            }
            *price = (*price * self.terms.factor(&mut self.rng)).max(MIN_PRICE);
        }
        &self.prices
    }
}

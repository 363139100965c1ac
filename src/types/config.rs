//! Scenario configuration.

use rand::Rng;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected configuration, reported before any trial executes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid scenario: {0}")]
    InvalidScenario(String),

    #[error("invalid pool at index {index}: {reason}")]
    InvalidPool { index: usize, reason: String },

    #[error("invalid range for {parameter}: {reason}")]
    InvalidRange {
        parameter: &'static str,
        reason: String,
    },
}

fn scenario_error(reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidScenario(reason.into())
}

fn require_positive(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(scenario_error(format!("{} must be finite and > 0, got {}", name, value)))
    }
}

fn require_non_negative(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(scenario_error(format!("{} must be finite and >= 0, got {}", name, value)))
    }
}

/// Largest accepted retail arrival rate (orders per step).
pub const MAX_RETAIL_ARRIVAL_RATE: f64 = 1e6;

fn require_arrival_rate(value: f64) -> Result<(), ConfigError> {
    require_non_negative("retail_arrival_rate", value)?;
    if value > MAX_RETAIL_ARRIVAL_RATE {
        return Err(scenario_error(format!(
            "retail_arrival_rate must be <= {}, got {}",
            MAX_RETAIL_ARRIVAL_RATE, value
        )));
    }
    Ok(())
}

fn require_probability(name: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(scenario_error(format!("{} must be within [0, 1], got {}", name, value)))
    }
}

/// Configuration for a single-asset trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Number of simulation steps
    pub n_steps: u32,

    /// Initial fair price
    pub initial_price: f64,

    /// Initial X reserves
    pub initial_x: f64,

    /// Initial Y reserves
    pub initial_y: f64,

    /// GBM drift
    pub gbm_mu: f64,

    /// GBM per-step volatility
    pub gbm_sigma: f64,

    /// GBM time step
    pub gbm_dt: f64,

    /// Retail order arrival rate (Poisson lambda)
    pub retail_arrival_rate: f64,

    /// Mean retail order size (lognormal mean)
    pub retail_mean_size: f64,

    /// Lognormal sigma for retail order sizes (log-space)
    pub retail_size_sigma: f64,

    /// Probability of buy order
    pub retail_buy_prob: f64,

    /// Random seed; a match treats `None` as 0
    pub seed: Option<u64>,
}

impl ScenarioConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("initial_price", self.initial_price)?;
        require_positive("initial_x", self.initial_x)?;
        require_positive("initial_y", self.initial_y)?;
        require_positive("gbm_dt", self.gbm_dt)?;
        if !self.gbm_mu.is_finite() {
            return Err(scenario_error("gbm_mu must be finite"));
        }
        require_non_negative("gbm_sigma", self.gbm_sigma)?;
        require_arrival_rate(self.retail_arrival_rate)?;
        require_non_negative("retail_mean_size", self.retail_mean_size)?;
        require_non_negative("retail_size_sigma", self.retail_size_sigma)?;
        require_probability("retail_buy_prob", self.retail_buy_prob)
    }

    /// Same scenario under a different seed.
    pub fn with_seed(&self, seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..self.clone()
        }
    }
}

/// One configured pool: `(token_a, token_b, initial_a, initial_b)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub token_a: usize,
    pub token_b: usize,
    pub initial_a: f64,
    pub initial_b: f64,
}

impl PoolConfig {
    pub fn new(token_a: usize, token_b: usize, initial_a: f64, initial_b: f64) -> Self {
        Self {
            token_a,
            token_b,
            initial_a,
            initial_b,
        }
    }
}

impl From<(usize, usize, f64, f64)> for PoolConfig {
    fn from((token_a, token_b, initial_a, initial_b): (usize, usize, f64, f64)) -> Self {
        Self::new(token_a, token_b, initial_a, initial_b)
    }
}

/// Configuration for a multi-asset trial.
///
/// Prices are quoted in units of the numeraire token, whose own price is
/// pinned to 1 for the whole trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfigV2 {
    pub n_steps: u32,
    /// Initial price per token, indexed by token id
    pub initial_prices: Vec<f64>,
    pub numeraire_token: usize,
    pub pools: Vec<PoolConfig>,
    pub gbm_mu: f64,
    pub gbm_sigma: f64,
    pub gbm_dt: f64,
    pub retail_arrival_rate: f64,
    /// Mean retail order size in numeraire terms
    pub retail_mean_size: f64,
    pub retail_size_sigma: f64,
    pub retail_buy_prob: f64,
    pub seed: Option<u64>,
}

impl ScenarioConfigV2 {
    /// Express a single-asset scenario as a two-token, one-pool scenario.
    ///
    /// Token 0 is the numeraire (the old Y); token 1 is the risky asset
    /// (the old X) priced at `initial_price`.
    pub fn from_single_asset(config: &ScenarioConfig) -> Self {
        Self {
            n_steps: config.n_steps,
            initial_prices: vec![1.0, config.initial_price],
            numeraire_token: 0,
            pools: vec![PoolConfig::new(1, 0, config.initial_x, config.initial_y)],
            gbm_mu: config.gbm_mu,
            gbm_sigma: config.gbm_sigma,
            gbm_dt: config.gbm_dt,
            retail_arrival_rate: config.retail_arrival_rate,
            retail_mean_size: config.retail_mean_size,
            retail_size_sigma: config.retail_size_sigma,
            retail_buy_prob: config.retail_buy_prob,
            seed: config.seed,
        }
    }

    #[inline]
    pub fn n_tokens(&self) -> usize {
        self.initial_prices.len()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let n_tokens = self.n_tokens();
        if n_tokens < 2 {
            return Err(scenario_error("at least 2 tokens are required"));
        }
        if self.numeraire_token >= n_tokens {
            return Err(scenario_error(format!(
                "numeraire_token {} out of range for {} tokens",
                self.numeraire_token, n_tokens
            )));
        }
        for (token, &price) in self.initial_prices.iter().enumerate() {
            if !(price.is_finite() && price > 0.0) {
                return Err(scenario_error(format!(
                    "initial price of token {} must be finite and > 0, got {}",
                    token, price
                )));
            }
        }
        if self.pools.is_empty() {
            return Err(scenario_error("at least 1 pool is required"));
        }
        for (index, pool) in self.pools.iter().enumerate() {
            if pool.token_a == pool.token_b {
                return Err(ConfigError::InvalidPool {
                    index,
                    reason: format!("token ids must be distinct, got {} twice", pool.token_a),
                });
            }
            if pool.token_a >= n_tokens || pool.token_b >= n_tokens {
                return Err(ConfigError::InvalidPool {
                    index,
                    reason: format!(
                        "token ids ({}, {}) out of range for {} tokens",
                        pool.token_a, pool.token_b, n_tokens
                    ),
                });
            }
            let reserves_ok = [pool.initial_a, pool.initial_b]
                .iter()
                .all(|r| r.is_finite() && *r > 0.0);
            if !reserves_ok {
                return Err(ConfigError::InvalidPool {
                    index,
                    reason: "reserves must be finite and > 0".to_string(),
                });
            }
        }

        require_positive("gbm_dt", self.gbm_dt)?;
        if !self.gbm_mu.is_finite() {
            return Err(scenario_error("gbm_mu must be finite"));
        }
        require_non_negative("gbm_sigma", self.gbm_sigma)?;
        require_arrival_rate(self.retail_arrival_rate)?;
        require_non_negative("retail_mean_size", self.retail_mean_size)?;
        require_non_negative("retail_size_sigma", self.retail_size_sigma)?;
        require_probability("retail_buy_prob", self.retail_buy_prob)
    }
}

/// `(min, max, enabled)` for one hyperparameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterRange {
    pub min: f64,
    pub max: f64,
    pub enabled: bool,
}

impl ParameterRange {
    /// The same value for every trial.
    pub const fn fixed(value: f64) -> Self {
        Self {
            min: value,
            max: value,
            enabled: false,
        }
    }

    /// Uniform draw from `[min, max]` per trial.
    pub const fn uniform(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            enabled: true,
        }
    }

    pub fn validate(&self, parameter: &'static str) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidRange { parameter, reason };
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(invalid(format!("bounds must be finite, got [{}, {}]", self.min, self.max)));
        }
        if self.min < 0.0 {
            return Err(invalid(format!("min must be >= 0, got {}", self.min)));
        }
        if self.min > self.max {
            return Err(invalid(format!("min {} exceeds max {}", self.min, self.max)));
        }
        if !self.enabled && self.min != self.max {
            return Err(invalid(format!(
                "disabled range must pin a single value, got [{}, {}]",
                self.min, self.max
            )));
        }
        Ok(())
    }

    #[inline]
    fn sample(&self, rng: &mut Pcg64) -> f64 {
        if self.enabled {
            // inclusive, so min == max cannot panic
            rng.gen_range(self.min..=self.max)
        } else {
            self.min
        }
    }
}

/// Per-trial sampling of the variance-eligible parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HyperparameterVariance {
    pub retail_mean_size: ParameterRange,
    pub retail_arrival_rate: ParameterRange,
    pub gbm_sigma: ParameterRange,
}

impl HyperparameterVariance {
    /// Pin every parameter to the value already in `base`.
    pub fn fixed_from(base: &ScenarioConfig) -> Self {
        Self {
            retail_mean_size: ParameterRange::fixed(base.retail_mean_size),
            retail_arrival_rate: ParameterRange::fixed(base.retail_arrival_rate),
            gbm_sigma: ParameterRange::fixed(base.gbm_sigma),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retail_mean_size.validate("retail_mean_size")?;
        self.retail_arrival_rate.validate("retail_arrival_rate")?;
        if self.retail_arrival_rate.max > MAX_RETAIL_ARRIVAL_RATE {
            return Err(ConfigError::InvalidRange {
                parameter: "retail_arrival_rate",
                reason: format!(
                    "max must be <= {}, got {}",
                    MAX_RETAIL_ARRIVAL_RATE, self.retail_arrival_rate.max
                ),
            });
        }
        self.gbm_sigma.validate("gbm_sigma")
    }

    /// Derive the config for the trial that runs under `seed`.
    ///
    /// Draw order is mean size, arrival rate, volatility; only enabled
    /// ranges consume randomness.
    pub fn apply(&self, base: &ScenarioConfig, seed: u64) -> ScenarioConfig {
        let mut rng = Pcg64::seed_from_u64(seed);

        let retail_mean_size = self.retail_mean_size.sample(&mut rng);
        let retail_arrival_rate = self.retail_arrival_rate.sample(&mut rng);
        let gbm_sigma = self.gbm_sigma.sample(&mut rng);

        ScenarioConfig {
            gbm_sigma,
            retail_arrival_rate,
            retail_mean_size,
            seed: Some(seed),
            ..base.clone()
        }
    }
}

//! Baseline match settings and caller overrides.
//!
//! Every parameter a caller leaves out falls back to the shared baseline.
//! Overriding a variance-eligible parameter pins its range to the override,
//! so the value is the same in every trial.

use serde::{Deserialize, Serialize};

use crate::simulation::runner::{MatchError, MatchRunner};
use crate::types::config::{
    ConfigError, HyperparameterVariance, ParameterRange, PoolConfig, ScenarioConfig,
    ScenarioConfigV2,
};

/// Trial count for a multi-asset run description that names none.
const DEFAULT_V2_SIMULATIONS: u32 = 100;

/// Shared defaults for every match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineSettings {
    pub n_steps: u32,
    pub initial_price: f64,
    pub initial_x: f64,
    pub initial_y: f64,
    pub gbm_mu: f64,
    pub gbm_dt: f64,
    pub retail_size_sigma: f64,
    pub retail_buy_prob: f64,
    pub n_simulations: u32,
    /// Per-trial ranges for volatility, arrival rate and mean size
    pub variance: HyperparameterVariance,
}

impl Default for BaselineSettings {
    fn default() -> Self {
        Self {
            n_steps: 10_000,
            initial_price: 100.0,
            initial_x: 100.0,
            initial_y: 10_000.0,
            gbm_mu: 0.0,
            gbm_dt: 1.0,
            retail_size_sigma: 1.2,
            retail_buy_prob: 0.5,
            n_simulations: 1000,
            variance: HyperparameterVariance {
                retail_mean_size: ParameterRange::uniform(19.0, 21.0),
                retail_arrival_rate: ParameterRange::uniform(0.6, 1.0),
                gbm_sigma: ParameterRange::uniform(0.000882, 0.001008),
            },
        }
    }
}

fn midpoint(range: &ParameterRange) -> f64 {
    (range.min + range.max) / 2.0
}

impl BaselineSettings {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Volatility used where a single value is needed.
    pub fn nominal_sigma(&self) -> f64 {
        midpoint(&self.variance.gbm_sigma)
    }

    pub fn nominal_retail_rate(&self) -> f64 {
        midpoint(&self.variance.retail_arrival_rate)
    }

    pub fn nominal_retail_size(&self) -> f64 {
        midpoint(&self.variance.retail_mean_size)
    }
}

/// Optional per-match overrides of the baseline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchOverrides {
    pub n_steps: Option<u32>,
    pub initial_price: Option<f64>,
    pub initial_x: Option<f64>,
    pub initial_y: Option<f64>,
    pub volatility: Option<f64>,
    pub retail_rate: Option<f64>,
    pub retail_size: Option<f64>,
    pub retail_size_sigma: Option<f64>,
    pub simulations: Option<u32>,
    /// `0` or absent picks the worker count automatically
    pub workers: Option<usize>,
    pub seed: Option<u64>,
}

/// Everything needed to build a [`MatchRunner`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMatch {
    pub config: ScenarioConfig,
    pub variance: HyperparameterVariance,
    pub n_simulations: u32,
    pub n_workers: usize,
}

impl ResolvedMatch {
    pub fn runner(&self) -> Result<MatchRunner, MatchError> {
        MatchRunner::new(self.config.clone(), self.n_simulations, self.n_workers, self.variance)
    }
}

/// Override wins; otherwise the baseline range is kept.
fn pinned_or(value: Option<f64>, baseline: ParameterRange) -> ParameterRange {
    value.map_or(baseline, ParameterRange::fixed)
}

impl MatchOverrides {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn resolve(&self, baseline: &BaselineSettings) -> Result<ResolvedMatch, ConfigError> {
        let config = ScenarioConfig {
            n_steps: self.n_steps.unwrap_or(baseline.n_steps),
            initial_price: self.initial_price.unwrap_or(baseline.initial_price),
            initial_x: self.initial_x.unwrap_or(baseline.initial_x),
            initial_y: self.initial_y.unwrap_or(baseline.initial_y),
            gbm_mu: baseline.gbm_mu,
            gbm_sigma: self.volatility.unwrap_or_else(|| baseline.nominal_sigma()),
            gbm_dt: baseline.gbm_dt,
            retail_arrival_rate: self.retail_rate.unwrap_or_else(|| baseline.nominal_retail_rate()),
            retail_mean_size: self.retail_size.unwrap_or_else(|| baseline.nominal_retail_size()),
            retail_size_sigma: self.retail_size_sigma.unwrap_or(baseline.retail_size_sigma),
            retail_buy_prob: baseline.retail_buy_prob,
            seed: self.seed,
        };
        config.validate()?;

        let variance = HyperparameterVariance {
            retail_mean_size: pinned_or(self.retail_size, baseline.variance.retail_mean_size),
            retail_arrival_rate: pinned_or(self.retail_rate, baseline.variance.retail_arrival_rate),
            gbm_sigma: pinned_or(self.volatility, baseline.variance.gbm_sigma),
        };
        variance.validate()?;

        Ok(ResolvedMatch {
            config,
            variance,
            n_simulations: self.simulations.unwrap_or(baseline.n_simulations),
            n_workers: self.workers.unwrap_or(0),
        })
    }
}

/// A pool written either as an object or as a 4-element list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PoolSpec {
    Named(PoolConfig),
    Tuple(usize, usize, f64, f64),
}

impl From<PoolSpec> for PoolConfig {
    fn from(spec: PoolSpec) -> Self {
        match spec {
            PoolSpec::Named(pool) => pool,
            PoolSpec::Tuple(token_a, token_b, initial_a, initial_b) => {
                PoolConfig::new(token_a, token_b, initial_a, initial_b)
            }
        }
    }
}

/// Description of a multi-asset run.
///
/// Absent market parameters fall back to the baseline; trial `i` runs
/// under `seed + i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiAssetSpec {
    pub n_steps: u32,
    pub initial_prices: Vec<f64>,
    #[serde(default)]
    pub numeraire_token: usize,
    #[serde(default)]
    pub pools: Vec<PoolSpec>,
    #[serde(default)]
    pub gbm_mu: Option<f64>,
    #[serde(default)]
    pub gbm_sigma: Option<f64>,
    #[serde(default)]
    pub gbm_dt: Option<f64>,
    #[serde(default)]
    pub retail_arrival_rate: Option<f64>,
    #[serde(default)]
    pub retail_mean_size: Option<f64>,
    #[serde(default)]
    pub retail_size_sigma: Option<f64>,
    #[serde(default)]
    pub retail_buy_prob: Option<f64>,
    #[serde(default = "default_v2_simulations")]
    pub n_simulations: u32,
    #[serde(default)]
    pub seed: u64,
}

fn default_v2_simulations() -> u32 {
    DEFAULT_V2_SIMULATIONS
}

impl MultiAssetSpec {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// One validated config per trial.
    pub fn build_configs(
        &self,
        baseline: &BaselineSettings,
    ) -> Result<Vec<ScenarioConfigV2>, ConfigError> {
        if self.pools.is_empty() {
            return Err(ConfigError::InvalidScenario(
                "multi-asset run must include a non-empty pools list".to_string(),
            ));
        }

        let template = ScenarioConfigV2 {
            n_steps: self.n_steps,
            initial_prices: self.initial_prices.clone(),
            numeraire_token: self.numeraire_token,
            pools: self.pools.iter().copied().map(PoolConfig::from).collect(),
            gbm_mu: self.gbm_mu.unwrap_or(baseline.gbm_mu),
            gbm_sigma: self.gbm_sigma.unwrap_or_else(|| baseline.nominal_sigma()),
            gbm_dt: self.gbm_dt.unwrap_or(baseline.gbm_dt),
            retail_arrival_rate: self
                .retail_arrival_rate
                .unwrap_or_else(|| baseline.nominal_retail_rate()),
            retail_mean_size: self
                .retail_mean_size
                .unwrap_or_else(|| baseline.nominal_retail_size()),
            retail_size_sigma: self.retail_size_sigma.unwrap_or(baseline.retail_size_sigma),
            retail_buy_prob: self.retail_buy_prob.unwrap_or(baseline.retail_buy_prob),
            seed: None,
        };
        template.validate()?;

        Ok((0..self.n_simulations)
            .map(|i| ScenarioConfigV2 {
                seed: Some(self.seed.wrapping_add(u64::from(i))),
                ..template.clone()
            })
            .collect())
    }
}

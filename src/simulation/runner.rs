//! Parallel match runners using rayon.
//!
//! A match is N independent trials between the same two strategies. Trials
//! are fanned out over a dedicated thread pool and folded into
//! [`MatchAggregator`] partials; the result does not depend on the worker
//! count or on scheduling.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::evm::{ExecutorError, StrategyAdapter};
use crate::simulation::aggregate::MatchAggregator;
use crate::simulation::engine::{run_trial, TrialError};
use crate::simulation::engine_v2::run_trial_v2;
use crate::types::config::{ConfigError, HyperparameterVariance, ScenarioConfig, ScenarioConfigV2};
use crate::types::result::{Competitor, MatchResult, Side, TrialOutcome};

/// Upper bound on the automatically chosen worker count.
const MAX_AUTO_WORKERS: usize = 8;

/// Reason a match produced no result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatchError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),

    #[error("trial {trial}: strategy {side} failed: {source}")]
    FatalTrial {
        trial: usize,
        side: Side,
        #[source]
        source: ExecutorError,
    },

    #[error("trial {trial}: non-finite {quantity} for strategy {side}")]
    NonFiniteTrial {
        trial: usize,
        side: Side,
        quantity: &'static str,
    },

    #[error("trial {trial} panicked: {message}")]
    TrialPanicked { trial: usize, message: String },

    #[error("failed to create thread pool: {0}")]
    ThreadPool(String),
}

impl MatchError {
    fn from_trial(trial: usize, err: TrialError) -> Self {
        match err {
            TrialError::Strategy { side, source } => MatchError::FatalTrial { trial, side, source },
            TrialError::NonFinite { side, quantity } => MatchError::NonFiniteTrial {
                trial,
                side,
                quantity,
            },
            TrialError::Config(err) => MatchError::InvalidConfiguration(err),
        }
    }

    /// Index of the failing trial, when the failure belongs to one.
    pub fn trial(&self) -> Option<usize> {
        match self {
            MatchError::FatalTrial { trial, .. }
            | MatchError::NonFiniteTrial { trial, .. }
            | MatchError::TrialPanicked { trial, .. } => Some(*trial),
            MatchError::InvalidConfiguration(_) | MatchError::ThreadPool(_) => None,
        }
    }
}

/// `0` picks the pool's default size, capped at [`MAX_AUTO_WORKERS`].
fn resolve_workers(n_workers: usize) -> usize {
    if n_workers == 0 {
        rayon::current_num_threads().min(MAX_AUTO_WORKERS)
    } else {
        n_workers
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Run one trial, turning a failure or panic into a match error.
fn run_guarded<C, F>(trial: usize, config: &C, run: &F) -> Result<TrialOutcome, MatchError>
where
    F: Fn(&C) -> Result<TrialOutcome, TrialError>,
{
    match catch_unwind(AssertUnwindSafe(|| run(config))) {
        Ok(Ok(outcome)) => {
            debug!(
                "Trial {} (seed {}) finished: pnl {} / {}",
                trial, outcome.seed, outcome.pnl[0], outcome.pnl[1]
            );
            Ok(outcome)
        }
        Ok(Err(err)) => Err(MatchError::from_trial(trial, err)),
        Err(payload) => Err(MatchError::TrialPanicked {
            trial,
            message: panic_message(payload),
        }),
    }
}

fn competitors(strategy_a: &StrategyAdapter, strategy_b: &StrategyAdapter) -> [Competitor; 2] {
    [strategy_a, strategy_b].map(|adapter| Competitor {
        name: adapter.get_name().to_string(),
        id: adapter.id(),
    })
}

type Partial = Result<MatchAggregator, (usize, MatchError)>;

/// Keep the failure with the lowest trial index.
fn combine(left: Partial, right: Partial) -> Partial {
    match (left, right) {
        (Ok(a), Ok(b)) => Ok(a.merge(b)),
        (Err(a), Err(b)) => Err(if a.0 <= b.0 { a } else { b }),
        (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(e),
    }
}

/// Run one trial per config on a dedicated pool and aggregate.
fn dispatch<C, F>(
    configs: &[C],
    n_workers: usize,
    store_results: bool,
    competitors: [Competitor; 2],
    run: F,
) -> Result<MatchResult, MatchError>
where
    C: Sync,
    F: Fn(&C) -> Result<TrialOutcome, TrialError> + Sync,
{
    let workers = resolve_workers(n_workers);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| MatchError::ThreadPool(e.to_string()))?;

    info!(
        "Starting match {} vs {}: {} trials on {} workers",
        competitors[0].name,
        competitors[1].name,
        configs.len(),
        workers
    );

    let outcome = pool.install(|| {
        configs
            .par_iter()
            .enumerate()
            .fold(
                || Ok(MatchAggregator::new(store_results)),
                |acc: Partial, (trial, config)| match (acc, run_guarded(trial, config, &run)) {
                    (Ok(mut aggregate), Ok(outcome)) => {
                        aggregate.record(trial, outcome);
                        Ok(aggregate)
                    }
                    (acc, Err(err)) => combine(acc, Err((trial, err))),
                    (Err(failure), Ok(_)) => Err(failure),
                },
            )
            .reduce(|| Ok(MatchAggregator::new(store_results)), combine)
    });

    match outcome {
        Ok(aggregate) => {
            let result = aggregate.finish(competitors);
            info!(
                "Match finished: {} games, {} wins A, {} wins B, {} draws",
                result.total_games(),
                result.wins_a(),
                result.wins_b(),
                result.draws()
            );
            Ok(result)
        }
        Err((_, err)) => {
            error!("Match aborted: {}", err);
            Err(err)
        }
    }
}

/// Single-asset match runner.
#[derive(Debug, Clone)]
pub struct MatchRunner {
    config: ScenarioConfig,
    n_simulations: u32,
    n_workers: usize,
    variance: HyperparameterVariance,
}

impl MatchRunner {
    /// Validates the base config and variance ranges up front.
    pub fn new(
        config: ScenarioConfig,
        n_simulations: u32,
        n_workers: usize,
        variance: HyperparameterVariance,
    ) -> Result<Self, MatchError> {
        config.validate()?;
        variance.validate()?;
        Ok(Self {
            config,
            n_simulations,
            n_workers,
            variance,
        })
    }

    pub fn n_simulations(&self) -> u32 {
        self.n_simulations
    }

    /// Per-trial configs; trial `i` runs under `base_seed + i`.
    pub fn trial_configs(&self) -> Vec<ScenarioConfig> {
        let base_seed = self.config.seed.unwrap_or(0);
        (0..self.n_simulations)
            .map(|i| self.variance.apply(&self.config, base_seed.wrapping_add(u64::from(i))))
            .collect()
    }

    pub fn run_match(
        &self,
        strategy_a: &StrategyAdapter,
        strategy_b: &StrategyAdapter,
        store_results: bool,
    ) -> Result<MatchResult, MatchError> {
        let configs = self.trial_configs();
        for config in &configs {
            config.validate()?;
        }
        dispatch(
            &configs,
            self.n_workers,
            store_results,
            competitors(strategy_a, strategy_b),
            |config| run_trial(config, strategy_a, strategy_b),
        )
    }
}

/// Multi-asset match runner over an explicit list of trial configs.
#[derive(Debug, Clone)]
pub struct MatchRunnerV2 {
    configs: Vec<ScenarioConfigV2>,
    n_workers: usize,
}

impl MatchRunnerV2 {
    /// Every config is validated before the runner exists.
    pub fn new(configs: Vec<ScenarioConfigV2>, n_workers: usize) -> Result<Self, MatchError> {
        for config in &configs {
            config.validate()?;
        }
        Ok(Self { configs, n_workers })
    }

    /// Run a single-asset scenario through the multi-asset engine.
    ///
    /// Variance is applied per trial exactly as [`MatchRunner`] does, then
    /// each derived config becomes a two-token, one-pool scenario.
    pub fn from_legacy(
        config: &ScenarioConfig,
        n_simulations: u32,
        n_workers: usize,
        variance: HyperparameterVariance,
    ) -> Result<Self, MatchError> {
        let legacy = MatchRunner::new(config.clone(), n_simulations, n_workers, variance)?;
        let configs = legacy
            .trial_configs()
            .iter()
            .map(ScenarioConfigV2::from_single_asset)
            .collect();
        Self::new(configs, n_workers)
    }

    pub fn configs(&self) -> &[ScenarioConfigV2] {
        &self.configs
    }

    pub fn run_match(
        &self,
        strategy_a: &StrategyAdapter,
        strategy_b: &StrategyAdapter,
        store_results: bool,
    ) -> Result<MatchResult, MatchError> {
        dispatch(
            &self.configs,
            self.n_workers,
            store_results,
            competitors(strategy_a, strategy_b),
            |config| run_trial_v2(config, strategy_a, strategy_b),
        )
    }
}

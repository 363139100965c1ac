//! Python bindings (feature `python`).

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::evm::{CompiledStrategy, StrategyAdapter, StrategyInterface};
use crate::logging::init_logging;
use crate::settings::{BaselineSettings, MatchOverrides, MultiAssetSpec};
use crate::simulation::runner::MatchRunnerV2;
use crate::types::result::MatchResult;

fn value_error(err: impl std::fmt::Display) -> PyErr {
    PyValueError::new_err(err.to_string())
}

fn runtime_error(err: impl std::fmt::Display) -> PyErr {
    PyRuntimeError::new_err(err.to_string())
}

/// Match statistics handed back to Python.
#[pyclass(frozen, get_all)]
#[derive(Debug, Clone)]
pub struct MatchSummary {
    pub strategy_a: String,
    pub strategy_b: String,
    pub total_games: u32,
    pub wins_a: u32,
    pub wins_b: u32,
    pub draws: u32,
    pub total_pnl_a: f64,
    pub total_pnl_b: f64,
    pub total_edge_a: f64,
    pub total_edge_b: f64,
    pub average_edge_a: f64,
    pub average_edge_b: f64,
}

fn lossy(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

impl From<&MatchResult> for MatchSummary {
    fn from(result: &MatchResult) -> Self {
        Self {
            strategy_a: result.strategy_a().to_string(),
            strategy_b: result.strategy_b().to_string(),
            total_games: result.total_games(),
            wins_a: result.wins_a(),
            wins_b: result.wins_b(),
            draws: result.draws(),
            total_pnl_a: lossy(result.total_pnl_a()),
            total_pnl_b: lossy(result.total_pnl_b()),
            total_edge_a: lossy(result.total_edge_a()),
            total_edge_b: lossy(result.total_edge_b()),
            average_edge_a: lossy(result.average_edge_a()),
            average_edge_b: lossy(result.average_edge_b()),
        }
    }
}

#[pymethods]
impl MatchSummary {
    fn __repr__(&self) -> String {
        format!(
            "MatchSummary({} vs {}: {}W / {}L / {}D, edge {:.4} vs {:.4})",
            self.strategy_a,
            self.strategy_b,
            self.wins_a,
            self.wins_b,
            self.draws,
            self.average_edge_a,
            self.average_edge_b
        )
    }
}

/// Deploy one strategy; without an ABI every callback is attempted.
fn adapter(bytecode: Vec<u8>, abi: Option<&str>) -> PyResult<StrategyAdapter> {
    let interface = match abi {
        Some(json) => StrategyInterface::from_abi_json(json).map_err(value_error)?,
        None => StrategyInterface::assume_all(),
    };
    StrategyAdapter::new(&CompiledStrategy::new(bytecode, interface)).map_err(runtime_error)
}

/// Run a single-asset match between two compiled strategies.
///
/// `overrides_json` holds optional overrides of the baseline settings.
#[pyfunction]
#[pyo3(signature = (bytecode_a, bytecode_b, abi_a = None, abi_b = None, overrides_json = None))]
fn run_match(
    py: Python<'_>,
    bytecode_a: Vec<u8>,
    bytecode_b: Vec<u8>,
    abi_a: Option<&str>,
    abi_b: Option<&str>,
    overrides_json: Option<&str>,
) -> PyResult<MatchSummary> {
    let overrides = match overrides_json {
        Some(json) => MatchOverrides::from_json(json).map_err(value_error)?,
        None => MatchOverrides::default(),
    };
    let resolved = overrides
        .resolve(&BaselineSettings::default())
        .map_err(value_error)?;
    let runner = resolved.runner().map_err(value_error)?;

    let strategy_a = adapter(bytecode_a, abi_a)?;
    let strategy_b = adapter(bytecode_b, abi_b)?;

    let result = py
        .allow_threads(|| runner.run_match(&strategy_a, &strategy_b, false))
        .map_err(runtime_error)?;
    Ok(MatchSummary::from(&result))
}

/// Run a multi-asset match described by a JSON run description.
#[pyfunction]
#[pyo3(signature = (bytecode_a, bytecode_b, spec_json, n_workers = 0, abi_a = None, abi_b = None))]
fn run_match_v2(
    py: Python<'_>,
    bytecode_a: Vec<u8>,
    bytecode_b: Vec<u8>,
    spec_json: &str,
    n_workers: usize,
    abi_a: Option<&str>,
    abi_b: Option<&str>,
) -> PyResult<MatchSummary> {
    let spec = MultiAssetSpec::from_json(spec_json).map_err(value_error)?;
    let configs = spec
        .build_configs(&BaselineSettings::default())
        .map_err(value_error)?;
    let runner = MatchRunnerV2::new(configs, n_workers).map_err(value_error)?;

    let strategy_a = adapter(bytecode_a, abi_a)?;
    let strategy_b = adapter(bytecode_b, abi_b)?;

    let result = py
        .allow_threads(|| runner.run_match(&strategy_a, &strategy_b, false))
        .map_err(runtime_error)?;
    Ok(MatchSummary::from(&result))
}

/// Python module definition
#[pymodule]
fn amm_match(m: &Bound<'_, PyModule>) -> PyResult<()> {
    init_logging("amm_match=warn");
    m.add_function(wrap_pyfunction!(run_match, m)?)?;
    m.add_function(wrap_pyfunction!(run_match_v2, m)?)?;
    m.add_class::<MatchSummary>()?;
    Ok(())
}

//! Core types shared by the executor, trial engines and match runners.

pub mod wad;
pub mod fee_quote;
pub mod trade_info;
pub mod config;
pub mod result;

pub use wad::Wad;
pub use fee_quote::{FeeQuote, FEE_CAP};
pub use trade_info::{PoolContext, TradeEvent, TradeSide};
pub use config::{
    ConfigError, HyperparameterVariance, ParameterRange, PoolConfig, ScenarioConfig,
    ScenarioConfigV2,
};
pub use result::{
    exact_amount, Competitor, MatchResult, PoolState, Side, TrialDiagnostics, TrialOutcome,
};

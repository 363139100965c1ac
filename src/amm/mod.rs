//! Constant-product pools whose fees are set by strategies.

pub mod cfmm;

pub use cfmm::{TradeResult, CFMM};

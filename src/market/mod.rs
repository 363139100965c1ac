//! Market actors and price processes.

pub mod price_process;
pub mod arbitrageur;
pub mod retail;
pub mod router;

pub use price_process::{GBMPriceProcess, MultiAssetPriceProcess};
pub use arbitrageur::{ArbResult, Arbitrageur};
pub use retail::{OrderSide, RetailOrder, RetailOrderV2, RetailTrader, RetailTraderV2};
pub use router::{OrderRouter, RoutedTrade, RoutedTradeV2};

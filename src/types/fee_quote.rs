//! Bounded fee quotes handed out by strategy adapters.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::types::wad::Wad;

/// Hard ceiling on any quoted fee (10%).
pub const FEE_CAP: Decimal = dec!(0.10);

/// Fee quote (bid and ask fees) as fractions in `[0, FEE_CAP]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeQuote {
    /// Fee when AMM buys token A
    pub bid_fee: Decimal,
    /// Fee when AMM sells token A
    pub ask_fee: Decimal,
}

impl FeeQuote {
    /// Build a quote from WAD values, clamping each side independently.
    pub fn from_wad(bid_fee: Wad, ask_fee: Wad) -> Self {
        Self {
            bid_fee: bid_fee.to_fee_fraction(),
            ask_fee: ask_fee.to_fee_fraction(),
        }
    }

    pub fn symmetric(fee: Wad) -> Self {
        Self::from_wad(fee, fee)
    }

    #[inline]
    pub fn bid_f64(&self) -> f64 {
        self.bid_fee.to_f64().unwrap_or(0.0)
    }

    #[inline]
    pub fn ask_f64(&self) -> f64 {
        self.ask_fee.to_f64().unwrap_or(0.0)
    }
}

impl Default for FeeQuote {
    /// 30 bps both ways, the vanilla reference fee.
    fn default() -> Self {
        Self::symmetric(Wad::from_bps(30))
    }
}

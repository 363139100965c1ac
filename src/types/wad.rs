//! WAD fixed-point arithmetic (18 decimal places).
//!
//! WAD is the standard fixed-point representation used in DeFi:
//! - 1 WAD = 1e18
//! - Fees: 30 bps = 0.003 = 30e14 WAD
//! - Max fee: 10% = 0.1 = 1e17 WAD
//!
//! Strategies speak WAD on the wire (as 256-bit words); the harness turns
//! them into bounded decimal fractions before anything else sees them.

use revm::primitives::U256;
use rust_decimal::Decimal;

/// WAD precision constant (1e18)
pub const WAD: i128 = 1_000_000_000_000_000_000;

/// Number of decimal places in a WAD.
pub const WAD_DECIMALS: u32 = 18;

/// One basis point in WAD (0.0001 = 1e14)
pub const BPS: i128 = 100_000_000_000_000;

/// Maximum fee in WAD (10% = 1e17)
pub const MAX_FEE: i128 = 100_000_000_000_000_000;

/// WAD fixed-point number with 18 decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Wad(pub i128);

impl Wad {
    /// Create a new WAD from raw i128 value.
    #[inline]
    pub const fn new(value: i128) -> Self {
        Wad(value)
    }

    /// Create a WAD from a floating point number.
    ///
    /// Saturates at the i128 bounds; NaN maps to zero.
    #[inline]
    pub fn from_f64(value: f64) -> Self {
        Wad((value * WAD as f64) as i128)
    }

    /// Convert WAD to floating point.
    #[inline]
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / WAD as f64
    }

    /// Create a WAD representing a number of basis points.
    #[inline]
    pub const fn from_bps(bps: i128) -> Self {
        Wad(bps * BPS)
    }

    /// Convert WAD to basis points.
    #[inline]
    pub fn to_bps(self) -> i128 {
        self.0 / BPS
    }

    /// Interpret a 256-bit word as a two's-complement signed WAD.
    ///
    /// Values outside the i128 range saturate, so an absurd word can never
    /// wrap around into something that looks like a valid fee.
    pub fn from_word(word: U256) -> Wad {
        if word.bit(255) {
            let magnitude = (!word).wrapping_add(U256::from(1u8));
            match u128::try_from(magnitude).ok().and_then(|m| i128::try_from(m).ok()) {
                Some(m) => Wad(-m),
                None => Wad(i128::MIN),
            }
        } else {
            match u128::try_from(word).ok().and_then(|v| i128::try_from(v).ok()) {
                Some(v) => Wad(v),
                None => Wad(i128::MAX),
            }
        }
    }

    /// Big-endian 32-byte word for ABI encoding. Negative values encode as zero.
    #[inline]
    pub fn to_word_bytes(self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out[16..32].copy_from_slice(&(self.0.max(0) as u128).to_be_bytes());
        out
    }

    /// Clamp fee to valid range [0, MAX_FEE].
    #[inline]
    pub fn clamp_fee(self) -> Wad {
        Wad(self.0.clamp(0, MAX_FEE))
    }

    /// Clamp to the fee range and express as a decimal fraction (0.003 = 30 bps).
    #[inline]
    pub fn to_fee_fraction(self) -> Decimal {
        // |clamped| <= 1e17 always fits the 96-bit decimal mantissa
        Decimal::from_i128_with_scale(self.clamp_fee().0, WAD_DECIMALS)
    }
}

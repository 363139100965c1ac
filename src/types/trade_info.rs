//! Trade events and the ABI encoding of strategy callbacks.
//!
//! Strategies expose two generations of callbacks. V1 only sees the trade
//! and the reserves; V2 additionally receives the pool id and the token ids
//! of the pair, which lets one contract price many pools differently.

use revm::primitives::U256;

use crate::types::wad::Wad;

/// Function selector for afterInitialize(uint256,uint256)
pub const SELECTOR_AFTER_INITIALIZE: [u8; 4] = [0x83, 0x7a, 0xef, 0x47];

/// Function selector for afterSwap((bool,uint256,uint256,uint256,uint256,uint256))
pub const SELECTOR_AFTER_SWAP: [u8; 4] = [0xc2, 0xba, 0xbb, 0x57];

/// Function selector for afterInitializeV2(uint256,uint256,uint256,uint256,uint256)
pub const SELECTOR_AFTER_INITIALIZE_V2: [u8; 4] = [0x1a, 0xfe, 0xf3, 0x59];

/// Function selector for
/// afterSwapV2((bool,uint256,uint256,uint256,uint256,uint256,uint256,uint256,uint256))
pub const SELECTOR_AFTER_SWAP_V2: [u8; 4] = [0x7b, 0xca, 0x99, 0xa5];

/// Function selector for getName()
pub const SELECTOR_GET_NAME: [u8; 4] = [0x17, 0xd7, 0xde, 0x7c];

/// Selector of Solidity's `Error(string)` revert payload.
const SELECTOR_ERROR_STRING: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// Calldata sizes per callback.
pub const AFTER_INITIALIZE_LEN: usize = 4 + 2 * 32;
pub const AFTER_INITIALIZE_V2_LEN: usize = 4 + 5 * 32;
pub const AFTER_SWAP_LEN: usize = 4 + 6 * 32;
pub const AFTER_SWAP_V2_LEN: usize = 4 + 9 * 32;

/// A fee callback must return exactly two words.
pub const FEE_PAIR_RETURN_LEN: usize = 64;

/// Trade direction from the AMM's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum TradeSide {
    /// AMM bought token A (trader sold A)
    #[display("buy")]
    Buy,
    /// AMM sold token A (trader bought A)
    #[display("sell")]
    Sell,
}

/// Identifies the pool a callback is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PoolContext {
    pub pool_id: u64,
    pub token_a: u64,
    pub token_b: u64,
}

impl PoolContext {
    pub fn new(pool_id: u64, token_a: u64, token_b: u64) -> Self {
        Self { pool_id, token_a, token_b }
    }
}

/// Information about an executed trade, passed to strategies.
#[derive(Debug, Clone, Copy)]
pub struct TradeEvent {
    pub side: TradeSide,
    /// Amount of token A traded (WAD precision)
    pub amount_a: Wad,
    /// Amount of token B traded (WAD precision)
    pub amount_b: Wad,
    /// Simulation step number
    pub timestamp: u64,
    /// Token A reserves immediately before the trade
    pub reserve_a: Wad,
    /// Token B reserves immediately before the trade
    pub reserve_b: Wad,
    /// Pool the trade hit
    pub pool: PoolContext,
}

impl TradeEvent {
    #[inline]
    pub fn is_buy(&self) -> bool {
        self.side == TradeSide::Buy
    }

    /// Encode as ABI calldata for afterSwap.
    ///
    /// Layout (196 bytes total):
    /// - bytes 0-3: function selector (0xc2babb57)
    /// - bytes 4-35: isBuy (bool as uint256)
    /// - bytes 36-67: amountX (uint256)
    /// - bytes 68-99: amountY (uint256)
    /// - bytes 100-131: timestamp (uint256)
    /// - bytes 132-163: reserveX (uint256)
    /// - bytes 164-195: reserveY (uint256)
    #[inline]
    pub fn encode_v1(&self, buffer: &mut [u8; AFTER_SWAP_LEN]) {
        buffer[0..4].copy_from_slice(&SELECTOR_AFTER_SWAP);
        self.encode_common(&mut buffer[4..]);
    }

    /// Encode as ABI calldata for afterSwapV2.
    ///
    /// Same head as V1 followed by three more words: poolId, tokenA, tokenB
    /// (292 bytes total).
    #[inline]
    pub fn encode_v2(&self, buffer: &mut [u8; AFTER_SWAP_V2_LEN]) {
        buffer[0..4].copy_from_slice(&SELECTOR_AFTER_SWAP_V2);
        self.encode_common(&mut buffer[4..196]);
        put_word(&mut buffer[196..228], self.pool.pool_id as u128);
        put_word(&mut buffer[228..260], self.pool.token_a as u128);
        put_word(&mut buffer[260..292], self.pool.token_b as u128);
    }

    fn encode_common(&self, words: &mut [u8]) {
        put_word(&mut words[0..32], self.is_buy() as u128);
        words[32..64].copy_from_slice(&self.amount_a.to_word_bytes());
        words[64..96].copy_from_slice(&self.amount_b.to_word_bytes());
        put_word(&mut words[96..128], self.timestamp as u128);
        words[128..160].copy_from_slice(&self.reserve_a.to_word_bytes());
        words[160..192].copy_from_slice(&self.reserve_b.to_word_bytes());
    }
}

/// Encode afterInitialize(uint256, uint256) calldata.
#[inline]
pub fn encode_after_initialize(initial_a: Wad, initial_b: Wad) -> [u8; AFTER_INITIALIZE_LEN] {
    let mut buffer = [0u8; AFTER_INITIALIZE_LEN];
    buffer[0..4].copy_from_slice(&SELECTOR_AFTER_INITIALIZE);
    buffer[4..36].copy_from_slice(&initial_a.to_word_bytes());
    buffer[36..68].copy_from_slice(&initial_b.to_word_bytes());
    buffer
}

/// Encode afterInitializeV2(uint256 a, uint256 b, uint256 poolId, uint256 tokenA, uint256 tokenB).
#[inline]
pub fn encode_after_initialize_v2(
    initial_a: Wad,
    initial_b: Wad,
    pool: &PoolContext,
) -> [u8; AFTER_INITIALIZE_V2_LEN] {
    let mut buffer = [0u8; AFTER_INITIALIZE_V2_LEN];
    buffer[0..4].copy_from_slice(&SELECTOR_AFTER_INITIALIZE_V2);
    buffer[4..36].copy_from_slice(&initial_a.to_word_bytes());
    buffer[36..68].copy_from_slice(&initial_b.to_word_bytes());
    put_word(&mut buffer[68..100], pool.pool_id as u128);
    put_word(&mut buffer[100..132], pool.token_a as u128);
    put_word(&mut buffer[132..164], pool.token_b as u128);
    buffer
}

/// Split a fee callback's return data into its two raw words.
///
/// Anything but exactly two words is rejected; trailing or missing bytes
/// are never tolerated.
#[inline]
pub fn decode_fee_words(data: &[u8]) -> Option<(U256, U256)> {
    if data.len() != FEE_PAIR_RETURN_LEN {
        return None;
    }
    let bid = U256::from_be_slice(&data[0..32]);
    let ask = U256::from_be_slice(&data[32..64]);
    Some((bid, ask))
}

/// Decode an ABI-encoded `string` return value.
///
/// String is encoded as: offset (32 bytes) + length (32 bytes) + data
pub fn decode_string(data: &[u8]) -> Option<String> {
    if data.len() < 64 {
        return None;
    }
    let offset = word_to_usize(&data[0..32])?;
    let len_end = offset.checked_add(32)?;
    let length = word_to_usize(data.get(offset..len_end)?)?;
    let bytes = data.get(len_end..len_end.checked_add(length)?)?;
    String::from_utf8(bytes.to_vec()).ok()
}

/// Human-readable reason for a revert payload.
pub fn decode_revert_reason(data: &[u8]) -> String {
    if data.is_empty() {
        return "reverted without reason".to_string();
    }
    if data.len() >= 4 && data[0..4] == SELECTOR_ERROR_STRING {
        if let Some(reason) = decode_string(&data[4..]) {
            return format!("reverted: {}", reason);
        }
    }
    let hex: String = data.iter().map(|b| format!("{:02x}", b)).collect();
    format!("reverted: 0x{}", hex)
}

/// Encode a u128 as big-endian 32 bytes.
#[inline]
fn put_word(buffer: &mut [u8], value: u128) {
    buffer.fill(0);
    buffer[16..32].copy_from_slice(&value.to_be_bytes());
}

/// Convert 32-byte big-endian slice to usize (upper 24 bytes must be zero).
fn word_to_usize(data: &[u8]) -> Option<usize> {
    if data.len() != 32 || data[0..24].iter().any(|&b| b != 0) {
        return None;
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[24..32]);
    usize::try_from(u64::from_be_bytes(bytes)).ok()
}

#[cfg(test)]
pub(crate) fn encode_string_return(value: &str) -> Vec<u8> {
    let mut out = vec![0u8; 64];
    put_word(&mut out[0..32], 32);
    put_word(&mut out[32..64], value.len() as u128);
    let mut data = value.as_bytes().to_vec();
    data.resize(value.len().div_ceil(32) * 32, 0);
    out.extend_from_slice(&data);
    out
}

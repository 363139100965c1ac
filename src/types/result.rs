//! Trial and match result types.
//!
//! Everything here is keyed by [`Side`], never by strategy name: two
//! strategies may report the same name and must still keep separate books.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::evm::compiled::StrategyId;

/// Decimal places kept when a float quantity enters exact accounting.
pub const EXACT_DECIMALS: u32 = 9;

/// Convert a float amount to the exact decimal used for sums.
///
/// Returns `None` for NaN, infinities and values outside the decimal range.
#[inline]
pub fn exact_amount(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_f64(value).map(|d| d.round_dp(EXACT_DECIMALS))
}

/// Competitor slot in a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum Side {
    #[display("A")]
    A,
    #[display("B")]
    B,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::A, Side::B];

    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Side::A => 0,
            Side::B => 1,
        }
    }
}

/// Final reserves of one side's copy of one pool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolState {
    pub side: Side,
    /// Index of the configured pool this copy belongs to
    pub pool_id: usize,
    pub token_a: usize,
    pub token_b: usize,
    pub reserve_a: f64,
    pub reserve_b: f64,
}

/// Per-side activity summary of a single-asset trial.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrialDiagnostics {
    /// Total arb volume (in Y), indexed by side
    pub arb_volume_y: [f64; 2],
    /// Total retail volume (in Y), indexed by side
    pub retail_volume_y: [f64; 2],
    /// Average (bid, ask) fee over the trial, indexed by side
    pub average_fees: [(f64, f64); 2],
}

/// Financial outcome of one trial.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialOutcome {
    pub seed: u64,
    /// PnL in Y (single-asset) or numeraire (multi-asset), indexed by side
    pub pnl: [Decimal; 2],
    /// Sum of per-trade edge, indexed by side
    pub edge: [Decimal; 2],
    /// Fair price(s) at the end of the trial; one per token for multi-asset
    pub final_prices: Vec<f64>,
    /// Each side's copy of each pool
    pub pools: Vec<PoolState>,
    pub diagnostics: Option<TrialDiagnostics>,
}

impl TrialOutcome {
    #[inline]
    pub fn pnl(&self, side: Side) -> Decimal {
        self.pnl[side.index()]
    }

    #[inline]
    pub fn edge(&self, side: Side) -> Decimal {
        self.edge[side.index()]
    }

    /// Strictly higher PnL wins; equal PnL is a draw.
    pub fn winner(&self) -> Option<Side> {
        match self.pnl[0].cmp(&self.pnl[1]) {
            std::cmp::Ordering::Greater => Some(Side::A),
            std::cmp::Ordering::Less => Some(Side::B),
            std::cmp::Ordering::Equal => None,
        }
    }
}

/// Display name and content id of one competitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Competitor {
    pub name: String,
    pub id: StrategyId,
}

/// Outcome of a whole match between two strategies.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub(crate) competitors: [Competitor; 2],
    pub(crate) total_games: u32,
    pub(crate) wins: [u32; 2],
    pub(crate) draws: u32,
    pub(crate) total_pnl: [Decimal; 2],
    pub(crate) total_edge: [Decimal; 2],
    pub(crate) trial_results: Option<Vec<TrialOutcome>>,
}

impl MatchResult {
    pub fn strategy_a(&self) -> &str {
        &self.competitors[0].name
    }

    pub fn strategy_b(&self) -> &str {
        &self.competitors[1].name
    }

    pub fn strategy_id(&self, side: Side) -> StrategyId {
        self.competitors[side.index()].id
    }

    pub fn total_games(&self) -> u32 {
        self.total_games
    }

    pub fn wins_a(&self) -> u32 {
        self.wins[0]
    }

    pub fn wins_b(&self) -> u32 {
        self.wins[1]
    }

    pub fn draws(&self) -> u32 {
        self.draws
    }

    pub fn total_pnl_a(&self) -> Decimal {
        self.total_pnl[0]
    }

    pub fn total_pnl_b(&self) -> Decimal {
        self.total_pnl[1]
    }

    pub fn total_edge_a(&self) -> Decimal {
        self.total_edge[0]
    }

    pub fn total_edge_b(&self) -> Decimal {
        self.total_edge[1]
    }

    /// Outcomes ordered by trial index, present only when requested.
    pub fn trial_results(&self) -> Option<&[TrialOutcome]> {
        self.trial_results.as_deref()
    }

    pub fn average_edge_a(&self) -> Decimal {
        self.average(self.total_edge[0])
    }

    pub fn average_edge_b(&self) -> Decimal {
        self.average(self.total_edge[1])
    }

    fn average(&self, total: Decimal) -> Decimal {
        if self.total_games == 0 {
            Decimal::ZERO
        } else {
            total / Decimal::from(self.total_games)
        }
    }

    /// Side with more trial wins, `None` on a tie.
    pub fn winner(&self) -> Option<Side> {
        match self.wins[0].cmp(&self.wins[1]) {
            std::cmp::Ordering::Greater => Some(Side::A),
            std::cmp::Ordering::Less => Some(Side::B),
            std::cmp::Ordering::Equal => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_exact_amount() {
        assert_eq!(exact_amount(1.5), Some(dec!(1.5)));
        assert_eq!(exact_amount(-0.1234567891234), Some(dec!(-0.123456789)));
        assert_eq!(exact_amount(f64::NAN), None);
        assert_eq!(exact_amount(f64::NEG_INFINITY), None);
        assert_eq!(exact_amount(1e40), None);
    }

    #[test]
    fn test_trial_winner_by_pnl() {
        let mut outcome = TrialOutcome {
            seed: 1,
            pnl: [dec!(1), dec!(2)],
            // edge never decides the trial
            edge: [dec!(5), dec!(0)],
            final_prices: vec![100.0],
            pools: Vec::new(),
            diagnostics: None,
        };
        assert_eq!(outcome.winner(), Some(Side::B));
        outcome.pnl = [dec!(2), dec!(2)];
        assert_eq!(outcome.winner(), None);
    }

    #[test]
    fn test_side_helpers() {
        assert_eq!(Side::A.index(), 0);
        assert_eq!(Side::B.index(), 1);
        assert_eq!(Side::B.to_string(), "B");
    }
}

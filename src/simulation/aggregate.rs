//! Order-independent aggregation of trial outcomes.

use rust_decimal::Decimal;

use crate::types::result::{Competitor, MatchResult, TrialOutcome};

/// Partial match statistics over any subset of trials.
///
/// Sums are exact decimals, so merging partials in any grouping gives the
/// same totals. Stored outcomes carry their trial index and are sorted once
/// in [`MatchAggregator::finish`].
#[derive(Debug, Clone, Default)]
pub struct MatchAggregator {
    total_games: u32,
    wins: [u32; 2],
    draws: u32,
    total_pnl: [Decimal; 2],
    total_edge: [Decimal; 2],
    stored: Option<Vec<(usize, TrialOutcome)>>,
}

impl MatchAggregator {
    pub fn new(store_results: bool) -> Self {
        Self {
            stored: store_results.then(Vec::new),
            ..Self::default()
        }
    }

    pub fn total_games(&self) -> u32 {
        self.total_games
    }

    /// Add one trial.
    pub fn record(&mut self, index: usize, outcome: TrialOutcome) {
        self.total_games += 1;
        match outcome.winner() {
            Some(side) => self.wins[side.index()] += 1,
            None => self.draws += 1,
        }
        for i in 0..2 {
            self.total_pnl[i] += outcome.pnl[i];
            self.total_edge[i] += outcome.edge[i];
        }
        if let Some(stored) = self.stored.as_mut() {
            stored.push((index, outcome));
        }
    }

    /// Combine two partials.
    pub fn merge(mut self, other: MatchAggregator) -> MatchAggregator {
        self.total_games += other.total_games;
        self.draws += other.draws;
        for i in 0..2 {
            self.wins[i] += other.wins[i];
            self.total_pnl[i] += other.total_pnl[i];
            self.total_edge[i] += other.total_edge[i];
        }
        self.stored = match (self.stored, other.stored) {
            (Some(mut left), Some(right)) => {
                left.extend(right);
                Some(left)
            }
            (left, right) => left.or(right),
        };
        self
    }

    pub fn finish(self, competitors: [Competitor; 2]) -> MatchResult {
        let trial_results = self.stored.map(|mut stored| {
            stored.sort_by_key(|(index, _)| *index);
            stored.into_iter().map(|(_, outcome)| outcome).collect()
        });

        MatchResult {
            competitors,
            total_games: self.total_games,
            wins: self.wins,
            draws: self.draws,
            total_pnl: self.total_pnl,
            total_edge: self.total_edge,
            trial_results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evm::StrategyId;
    use rust_decimal_macros::dec;

    fn outcome(seed: u64, pnl_a: Decimal, pnl_b: Decimal) -> TrialOutcome {
        TrialOutcome {
            seed,
            pnl: [pnl_a, pnl_b],
            edge: [pnl_a / dec!(2), pnl_b / dec!(2)],
            final_prices: vec![100.0],
            pools: Vec::new(),
            diagnostics: None,
        }
    }

    fn competitors() -> [Competitor; 2] {
        [
            Competitor {
                name: "Same".to_string(),
                id: StrategyId::of_bytecode(b"a"),
            },
            Competitor {
                name: "Same".to_string(),
                id: StrategyId::of_bytecode(b"b"),
            },
        ]
    }

    fn trials() -> Vec<TrialOutcome> {
        vec![
            outcome(0, dec!(0.1), dec!(0.2)),
            outcome(1, dec!(0.3), dec!(-0.1)),
            outcome(2, dec!(1.000000001), dec!(1.000000001)),
            outcome(3, dec!(-5), dec!(2.5)),
            outcome(4, dec!(7.25), dec!(0)),
        ]
    }

    #[test]
    fn test_counts_and_sums() {
        let mut agg = MatchAggregator::new(false);
        for (i, t) in trials().into_iter().enumerate() {
            agg.record(i, t);
        }
        let result = agg.finish(competitors());
        assert_eq!(result.total_games(), 5);
        assert_eq!(result.wins_a(), 2);
        assert_eq!(result.wins_b(), 2);
        assert_eq!(result.draws(), 1);
        assert_eq!(result.total_pnl_a(), dec!(3.650000001));
        assert_eq!(result.total_pnl_b(), dec!(3.600000001));
        assert!(result.trial_results().is_none());
    }

    #[test]
    fn test_merge_order_does_not_matter() {
        let trials = trials();
        let mut sequential = MatchAggregator::new(true);
        for (i, t) in trials.iter().cloned().enumerate() {
            sequential.record(i, t);
        }

        // reversed, uneven partials
        let mut left = MatchAggregator::new(true);
        let mut right = MatchAggregator::new(true);
        for (i, t) in trials.iter().cloned().enumerate().rev() {
            if i < 3 {
                right.record(i, t);
            } else {
                left.record(i, t);
            }
        }
        let merged = MatchAggregator::new(true).merge(left).merge(right);

        let a = sequential.finish(competitors());
        let b = merged.finish(competitors());
        assert_eq!(a, b);
        let seeds: Vec<u64> = b.trial_results().unwrap().iter().map(|t| t.seed).collect();
        assert_eq!(seeds, vec![0, 1, 2, 3, 4]);
    }
}

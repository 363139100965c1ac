mod common;

use std::sync::Arc;

use amm_match::types::trade_info::{
    SELECTOR_AFTER_INITIALIZE_V2, SELECTOR_AFTER_SWAP, SELECTOR_AFTER_SWAP_V2,
};
use amm_match::{
    HyperparameterVariance, MatchError, MatchRunner, MatchRunnerV2, ParameterRange, PoolConfig,
    ScenarioConfigV2, Side, StrategyInterface,
};
use rust_decimal::Decimal;

use common::{adapter, adapter_with, fixed, scenario, Answers, Scripted};

fn varied() -> HyperparameterVariance {
    HyperparameterVariance {
        retail_mean_size: ParameterRange::uniform(1.5, 2.5),
        retail_arrival_rate: ParameterRange::uniform(3.0, 6.0),
        gbm_sigma: ParameterRange::uniform(0.0008, 0.0012),
    }
}

#[test]
fn test_result_independent_of_worker_count() {
    let a = fixed(25, "a");
    let b = fixed(60, "b");

    let run = |workers| {
        MatchRunner::new(scenario(), 16, workers, varied())
            .unwrap()
            .run_match(&a, &b, true)
            .unwrap()
    };
    let single = run(1);
    let four = run(4);
    let auto = run(0);

    assert_eq!(single, four);
    assert_eq!(single, auto);
    let seeds: Vec<u64> = single.trial_results().unwrap().iter().map(|t| t.seed).collect();
    assert_eq!(seeds, (42..58).collect::<Vec<_>>());
}

#[test]
fn test_wins_losses_draws_cover_every_trial() {
    let a = fixed(10, "a");
    let b = fixed(90, "b");
    let result = MatchRunner::new(scenario(), 7, 3, varied())
        .unwrap()
        .run_match(&a, &b, true)
        .unwrap();

    assert_eq!(result.total_games(), 7);
    assert_eq!(result.wins_a() + result.wins_b() + result.draws(), 7);

    let trials = result.trial_results().unwrap();
    let pnl_a: Decimal = trials.iter().map(|t| t.pnl(Side::A)).sum();
    let edge_b: Decimal = trials.iter().map(|t| t.edge(Side::B)).sum();
    assert_eq!(result.total_pnl_a(), pnl_a);
    assert_eq!(result.total_edge_b(), edge_b);
    assert_eq!(result.average_edge_b(), edge_b / Decimal::from(7));
}

#[test]
fn test_concrete_scenario_shape() {
    let a = fixed(30, "a");
    let b = fixed(30, "b");
    let runner =
        MatchRunner::new(scenario(), 5, 2, HyperparameterVariance::fixed_from(&scenario())).unwrap();

    let configs = runner.trial_configs();
    assert_eq!(configs.len(), 5);
    assert!(configs.iter().all(|c| c.retail_arrival_rate == 5.0 && c.gbm_sigma == 0.001));

    let result = runner.run_match(&a, &b, true).unwrap();
    assert_eq!(result.total_games(), 5);
    assert_eq!(result.wins_a() + result.wins_b() + result.draws(), 5);
    for trial in result.trial_results().unwrap() {
        assert_eq!(trial.final_prices.len(), 1);
        assert_eq!(trial.pools.len(), 2);
        assert!(trial.diagnostics.is_some());
    }

    let without = runner.run_match(&a, &b, false).unwrap();
    assert!(without.trial_results().is_none());
    assert_eq!(without.total_pnl_a(), result.total_pnl_a());
}

#[test]
fn test_same_display_name_keeps_separate_books() {
    let a = adapter(Scripted::new(20, Answers::Both).named("Twin"), "first");
    let b = adapter(Scripted::new(80, Answers::Both).named("Twin"), "second");
    assert_eq!(a.get_name(), b.get_name());

    let result = MatchRunner::new(scenario(), 4, 2, varied())
        .unwrap()
        .run_match(&a, &b, false)
        .unwrap();
    assert_eq!(result.strategy_a(), "Twin");
    assert_eq!(result.strategy_b(), "Twin");
    assert_ne!(result.strategy_id(Side::A), result.strategy_id(Side::B));
    assert_ne!(result.total_edge_a(), result.total_edge_b());
}

#[test]
fn test_unnamed_strategy() {
    let a = adapter(Scripted::new(30, Answers::Both), "anon");
    assert_eq!(a.get_name(), "Unnamed");
}

#[test]
fn test_v2_only_and_v1_only_strategies_complete() {
    let v2_program = Arc::new(Scripted::new(30, Answers::V2Only));
    let v2_only = adapter_with(
        v2_program.clone(),
        StrategyInterface::with_callbacks(false, true),
        "v2",
    );
    // declares both generations but every V2 call reverts
    let v1_program = Arc::new(Scripted::new(30, Answers::V1Only));
    let v1_only = adapter(v1_program.clone(), "v1");

    let result = MatchRunner::new(scenario(), 3, 2, varied())
        .unwrap()
        .run_match(&v2_only, &v1_only, false)
        .unwrap();
    assert_eq!(result.total_games(), 3);

    assert!(v2_program.calls_with(SELECTOR_AFTER_SWAP).is_empty());
    assert!(!v2_program.calls_with(SELECTOR_AFTER_SWAP_V2).is_empty());
    // one pool copy per trial; each tries V2 once, then stays on V1
    let v2_attempts = v1_program.calls_with(SELECTOR_AFTER_SWAP_V2).len();
    assert!(v2_attempts > 0 && v2_attempts <= 3, "{}", v2_attempts);
    assert!(v1_program.calls_with(SELECTOR_AFTER_SWAP).len() > v2_attempts);
}

#[test]
fn test_failing_v2_swap_without_v1_is_fatal() {
    let good = fixed(30, "good");
    let v2_only = adapter_with(
        Scripted::new(30, Answers::NoSwaps),
        StrategyInterface::with_callbacks(false, true),
        "v2",
    );

    let err = MatchRunner::new(scenario(), 3, 2, varied())
        .unwrap()
        .run_match(&v2_only, &good, false)
        .unwrap_err();
    assert!(matches!(
        err,
        MatchError::FatalTrial { trial: 0, side: Side::A, .. }
    ));
    assert!(err.to_string().contains("afterSwapV2"));
}

#[test]
fn test_declared_v1_interface_never_calls_v2() {
    let program = Arc::new(Scripted::new(30, Answers::Both));
    let v1 = adapter_with(program.clone(), StrategyInterface::with_callbacks(true, false), "v1");
    let other = fixed(30, "other");

    MatchRunner::new(scenario(), 2, 1, varied())
        .unwrap()
        .run_match(&v1, &other, false)
        .unwrap();
    assert!(program.calls_with(SELECTOR_AFTER_INITIALIZE_V2).is_empty());
    assert!(!program.calls_with(SELECTOR_AFTER_SWAP).is_empty());
}

#[test]
fn test_failing_strategy_aborts_match_at_lowest_trial() {
    let good = fixed(30, "good");
    let broken = adapter(Scripted::new(30, Answers::NoSwaps), "broken");

    let err = MatchRunner::new(scenario(), 6, 3, varied())
        .unwrap()
        .run_match(&good, &broken, true)
        .unwrap_err();
    match &err {
        MatchError::FatalTrial { trial, side, .. } => {
            assert_eq!(*trial, 0);
            assert_eq!(*side, Side::B);
        }
        other => panic!("unexpected error: {}", other),
    }
    let message = err.to_string();
    assert!(message.contains("trial 0"), "{}", message);
    assert!(message.contains("afterSwap"), "{}", message);
}

#[test]
fn test_panicking_strategy_is_reported() {
    let good = fixed(30, "good");
    let exploding = adapter(Scripted::new(30, Answers::PanicOnSwap), "boom");

    let err = MatchRunner::new(scenario(), 3, 2, varied())
        .unwrap()
        .run_match(&exploding, &good, false)
        .unwrap_err();
    match err {
        MatchError::TrialPanicked { trial, message } => {
            assert_eq!(trial, 0);
            assert!(message.contains("exploded"));
        }
        other => panic!("unexpected error: {}", other),
    }
}

fn three_pool_config(seed: u64) -> ScenarioConfigV2 {
    ScenarioConfigV2 {
        n_steps: 40,
        initial_prices: vec![1.0, 100.0, 20.0],
        numeraire_token: 0,
        pools: vec![
            PoolConfig::new(1, 0, 100.0, 10_000.0),
            PoolConfig::new(2, 0, 500.0, 10_000.0),
            PoolConfig::new(1, 2, 100.0, 500.0),
        ],
        gbm_mu: 0.0,
        gbm_sigma: 0.001,
        gbm_dt: 1.0,
        retail_arrival_rate: 2.0,
        retail_mean_size: 20.0,
        retail_size_sigma: 1.2,
        retail_buy_prob: 0.5,
        seed: Some(seed),
    }
}

#[test]
fn test_multi_asset_match_shapes() {
    let a = fixed(30, "a");
    let b = fixed(50, "b");
    let configs: Vec<_> = (0..4).map(three_pool_config).collect();
    let runner = MatchRunnerV2::new(configs, 2).unwrap();

    let result = runner.run_match(&a, &b, true).unwrap();
    assert_eq!(result.total_games(), 4);
    for trial in result.trial_results().unwrap() {
        assert_eq!(trial.final_prices.len(), 3);
        assert_eq!(trial.pools.len(), 6);
    }

    let again = MatchRunnerV2::new((0..4).map(three_pool_config).collect(), 1)
        .unwrap()
        .run_match(&a, &b, true)
        .unwrap();
    assert_eq!(result, again);
}

#[test]
fn test_huge_arrival_rate_rejected() {
    let mut config = scenario();
    config.retail_arrival_rate = 1e30;
    let variance = HyperparameterVariance::fixed_from(&config);
    assert!(matches!(
        MatchRunner::new(config, 2, 1, variance),
        Err(MatchError::InvalidConfiguration(_))
    ));
}

#[test]
fn test_multi_asset_invalid_config_rejected() {
    let mut bad = three_pool_config(1);
    bad.pools.push(PoolConfig::new(0, 3, 1.0, 1.0));
    assert!(matches!(
        MatchRunnerV2::new(vec![three_pool_config(0), bad], 1),
        Err(MatchError::InvalidConfiguration(_))
    ));
}

#[test]
fn test_legacy_conversion() {
    let runner = MatchRunnerV2::from_legacy(&scenario(), 3, 1, varied()).unwrap();
    let legacy = MatchRunner::new(scenario(), 3, 1, varied()).unwrap();

    for (v2, v1) in runner.configs().iter().zip(legacy.trial_configs()) {
        assert_eq!(v2.initial_prices, vec![1.0, 100.0]);
        assert_eq!(v2.numeraire_token, 0);
        assert_eq!(v2.pools, vec![PoolConfig::new(1, 0, 100.0, 10_000.0)]);
        assert_eq!(v2.seed, v1.seed);
        assert_eq!(v2.gbm_sigma, v1.gbm_sigma);
        assert_eq!(v2.retail_mean_size, v1.retail_mean_size);
    }

    let program = Arc::new(Scripted::new(30, Answers::Both));
    let a = adapter(program.clone(), "a");
    let b = fixed(45, "b");
    let result = runner.run_match(&a, &b, true).unwrap();
    assert_eq!(result.total_games(), 3);
    assert!(result.trial_results().unwrap().iter().all(|t| t.pools.len() == 2));

    // V2 initialization sees pool 0 with token 1 priced in token 0
    let inits = program.calls_with(SELECTOR_AFTER_INITIALIZE_V2);
    assert_eq!(inits.len(), 3);
    let tail = &inits[0][68..164];
    assert_eq!(tail[31], 0);
    assert_eq!(tail[63], 1);
    assert_eq!(tail[95], 0);
}

/// Pilot-sizing binary search and the list-evaluation mode.
use swapnet_sim::config::{
    EngineKind, RevenueConfig, Scenario, SimulationConfig, StationConfig,
};
use swapnet_sim::error::CancelToken;
use swapnet_sim::optimizer::{
    find_minimum_fleet_size, find_optimal_scale, NpvPolicy, TargetMetric,
};

fn scenario() -> Scenario {
    Scenario {
        station: StationConfig {
            num_stations: 2,
            docks_per_station: 8,
            operating_hours_per_day: 18.0,
            ..StationConfig::default()
        },
        revenue: RevenueConfig {
            initial_fleet_size: 100,
            ..RevenueConfig::default()
        },
        simulation: SimulationConfig {
            horizon_months: 36,
            engine: EngineKind::Static,
            ..SimulationConfig::default()
        },
        ..Scenario::default()
    }
}

#[test]
fn finds_a_minimal_passing_fleet() {
    let scenario = scenario();
    let charger = scenario.charger_variants[0].clone();

    let result = find_minimum_fleet_size(
        &scenario,
        &charger,
        TargetMetric::PositiveNcf,
        50.0,
        10,
        2_000,
        30,
        None,
        NpvPolicy::Representative,
        &CancelToken::new(),
    )
    .expect("search");

    assert!(result.achieved);
    let recommended = result.recommended_fleet_size;
    assert!((10..=2_000).contains(&recommended));

    // Binary search contract: every probe below the recommendation failed,
    // every probe at or above it passed.
    for entry in &result.search_log {
        if entry.fleet_size < recommended {
            assert!(!entry.passed, "fleet {} passed below minimum", entry.fleet_size);
        } else {
            assert!(entry.passed, "fleet {} failed above minimum", entry.fleet_size);
        }
    }
    assert!(result.best_npv.is_some());
    assert!(result.search_iterations <= 30);
}

#[test]
fn impossible_target_reports_not_achieved() {
    let mut scenario = scenario();
    // Free swaps: revenue is zero, nothing can break even.
    scenario.revenue.price_per_swap = 0.0;
    let charger = scenario.charger_variants[0].clone();

    let result = find_minimum_fleet_size(
        &scenario,
        &charger,
        TargetMetric::PositiveNcf,
        50.0,
        10,
        500,
        30,
        None,
        NpvPolicy::Representative,
        &CancelToken::new(),
    )
    .expect("search");

    assert!(!result.achieved);
    assert_eq!(result.recommended_fleet_size, 500);
    assert!(result.search_log.iter().all(|e| !e.passed));
}

#[test]
fn break_even_target_defaults_to_horizon() {
    let scenario = scenario();
    let charger = scenario.charger_variants[0].clone();

    let result = find_minimum_fleet_size(
        &scenario,
        &charger,
        TargetMetric::BreakEvenWithin,
        50.0,
        10,
        2_000,
        30,
        None,
        NpvPolicy::Representative,
        &CancelToken::new(),
    )
    .expect("search");

    if result.achieved {
        let be = result.best_break_even_month.expect("passing run breaks even");
        assert!(be <= scenario.simulation.horizon_months);
    }
}

#[test]
fn list_mode_prefers_highest_npv_among_passing() {
    let scenario = scenario();
    let charger = scenario.charger_variants[0].clone();

    let result = find_optimal_scale(
        &scenario,
        &charger,
        Some(&[50, 150, 400]),
        TargetMetric::PositiveNcf,
        50.0,
        NpvPolicy::Representative,
        &CancelToken::new(),
    )
    .expect("scale search");

    assert_eq!(result.search_iterations, 3);
    assert_eq!(result.search_log.len(), 3);

    if result.achieved {
        let best_logged_npv = result
            .search_log
            .iter()
            .filter(|e| e.passed)
            .filter_map(|e| e.npv)
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(result.best_npv, Some(best_logged_npv));
    }
}

#[test]
fn search_respects_iteration_cap() {
    let scenario = scenario();
    let charger = scenario.charger_variants[0].clone();

    let result = find_minimum_fleet_size(
        &scenario,
        &charger,
        TargetMetric::PositiveNpv,
        50.0,
        10,
        2_000,
        3,
        None,
        NpvPolicy::Representative,
        &CancelToken::new(),
    )
    .expect("search");

    assert!(result.search_iterations <= 3);
    assert!(result.search_log.len() <= 3);
}

#[test]
fn stochastic_confidence_policies_both_run() {
    let mut scenario = scenario();
    scenario.simulation.engine = EngineKind::Stochastic;
    scenario.simulation.random_seed = Some(42);
    scenario.simulation.monte_carlo_runs = 5;
    scenario.simulation.horizon_months = 12;
    let charger = scenario.charger_variants[0].clone();

    for policy in [NpvPolicy::Representative, NpvPolicy::ConfidencePercentile] {
        let result = find_minimum_fleet_size(
            &scenario,
            &charger,
            TargetMetric::PositiveNcf,
            90.0,
            50,
            400,
            6,
            None,
            policy,
            &CancelToken::new(),
        )
        .expect("stochastic search");
        assert!(result.search_iterations >= 1);
        assert_eq!(result.target_confidence_pct, 90.0);
    }
}

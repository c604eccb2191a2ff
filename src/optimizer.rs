//! Pilot sizing — the minimum fleet that hits a financial target.
//!
//! Binary search over fleet sizes: each candidate deep-copies the scenario,
//! sets the initial fleet, runs the configured engine, and tests the target.
//! With the stochastic engine the confidence level picks which Monte-Carlo
//! percentile must pass: confidence 90 tests the P10 outcome ("90% of runs
//! meet the goal"), 50 tests the median, below 50 the optimistic P90.

use serde::{Deserialize, Serialize};

use crate::config::{ChargerVariant, EngineKind, Scenario};
use crate::dcf::build_dcf_table;
use crate::error::{CancelToken, SimError};
use crate::orchestrator::{run_engine_cancellable, run_monte_carlo_select};
use crate::util::round2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetMetric {
    /// Total net cash flow > 0.
    PositiveNcf,
    /// NPV > 0 (DCF-adjusted).
    PositiveNpv,
    /// Break-even month ≤ the configured target.
    BreakEvenWithin,
}

/// Where the NPV for a Monte-Carlo evaluation comes from. The original
/// system always reused the representative (P50-closest) run's DCF; the
/// conservative alternative rebuilds the DCF on the run matching the
/// confidence percentile. Neither is obviously right, so both are offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NpvPolicy {
    Representative,
    ConfidencePercentile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchLogEntry {
    pub fleet_size: u32,
    pub npv: Option<f64>,
    pub ncf: Option<f64>,
    pub break_even_month: Option<u32>,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PilotSizingResult {
    /// Minimum fleet size that hit the target (search bound max if not).
    pub recommended_fleet_size: u32,
    pub recommended_num_stations: u32,
    pub recommended_docks_per_station: u32,
    pub target_confidence_pct: f64,
    pub target_metric: TargetMetric,
    /// Whether any candidate within bounds passed.
    pub achieved: bool,
    pub best_npv: Option<f64>,
    pub best_break_even_month: Option<u32>,
    /// Steady-state monthly NCF at the recommended scale.
    pub best_monthly_ncf_at_target: Option<f64>,
    pub search_iterations: u32,
    pub search_log: Vec<SearchLogEntry>,
}

/// Binary-search the minimum fleet size that achieves the target.
#[allow(clippy::too_many_arguments)]
pub fn find_minimum_fleet_size(
    scenario: &Scenario,
    charger: &ChargerVariant,
    target_metric: TargetMetric,
    target_confidence_pct: f64,
    min_fleet: u32,
    max_fleet: u32,
    max_iterations: u32,
    break_even_target_months: Option<u32>,
    npv_policy: NpvPolicy,
    cancel: &CancelToken,
) -> Result<PilotSizingResult, SimError> {
    let break_even_target = match target_metric {
        TargetMetric::BreakEvenWithin => {
            Some(break_even_target_months.unwrap_or(scenario.simulation.horizon_months))
        }
        _ => break_even_target_months,
    };

    let mut search_log = Vec::new();
    let mut best_passing: Option<u32> = None;
    let mut best_npv = None;
    let mut best_be = None;
    let mut best_ncf = None;
    let mut iterations = 0u32;

    let (mut lo, mut hi) = (min_fleet, max_fleet);

    while lo <= hi && iterations < max_iterations {
        let mid = (lo + hi) / 2;
        iterations += 1;

        let (npv, ncf, be_month) =
            evaluate_fleet_size(scenario, charger, mid, target_confidence_pct, npv_policy, cancel)?;
        let passed = check_target(target_metric, npv, ncf, be_month, break_even_target);

        search_log.push(SearchLogEntry {
            fleet_size: mid,
            npv: npv.map(round2),
            ncf: ncf.map(round2),
            break_even_month: be_month,
            passed,
        });

        if passed {
            best_passing = Some(mid);
            best_npv = npv;
            best_be = be_month;
            best_ncf = ncf;
            if mid == 0 {
                break;
            }
            hi = mid - 1; // try smaller
        } else {
            lo = mid + 1; // need bigger
        }
    }

    let achieved = best_passing.is_some();

    Ok(PilotSizingResult {
        recommended_fleet_size: best_passing.unwrap_or(max_fleet),
        recommended_num_stations: scenario.station.num_stations,
        recommended_docks_per_station: scenario.station.docks_per_station,
        target_confidence_pct,
        target_metric,
        achieved,
        best_npv: best_npv.map(round2),
        best_break_even_month: best_be,
        best_monthly_ncf_at_target: monthly_ncf(best_ncf, scenario.simulation.horizon_months),
        search_iterations: iterations,
        search_log,
    })
}

/// Evaluate an explicit list of fleet sizes and return the passing one with
/// the highest NPV ("should we start with 100, 200, or 500 vehicles?").
pub fn find_optimal_scale(
    scenario: &Scenario,
    charger: &ChargerVariant,
    fleet_sizes: Option<&[u32]>,
    target_metric: TargetMetric,
    target_confidence_pct: f64,
    npv_policy: NpvPolicy,
    cancel: &CancelToken,
) -> Result<PilotSizingResult, SimError> {
    let default_sizes = [50, 100, 200, 300, 500];
    let fleet_sizes = fleet_sizes.unwrap_or(&default_sizes);

    let mut search_log = Vec::new();
    let mut best_fleet: Option<u32> = None;
    let mut best_npv: Option<f64> = None;
    let mut best_be = None;
    let mut best_ncf = None;

    for &fs in fleet_sizes {
        let (npv, ncf, be_month) =
            evaluate_fleet_size(scenario, charger, fs, target_confidence_pct, npv_policy, cancel)?;
        let passed = check_target(
            target_metric,
            npv,
            ncf,
            be_month,
            Some(scenario.simulation.horizon_months),
        );

        search_log.push(SearchLogEntry {
            fleet_size: fs,
            npv: npv.map(round2),
            ncf: ncf.map(round2),
            break_even_month: be_month,
            passed,
        });

        if passed && (best_npv.is_none() || npv > best_npv) {
            best_fleet = Some(fs);
            best_npv = npv;
            best_be = be_month;
            best_ncf = ncf;
        }
    }

    let achieved = best_fleet.is_some();

    Ok(PilotSizingResult {
        recommended_fleet_size: best_fleet
            .or_else(|| fleet_sizes.last().copied())
            .unwrap_or(0),
        recommended_num_stations: scenario.station.num_stations,
        recommended_docks_per_station: scenario.station.docks_per_station,
        target_confidence_pct,
        target_metric,
        achieved,
        best_npv: best_npv.map(round2),
        best_break_even_month: best_be,
        best_monthly_ncf_at_target: monthly_ncf(best_ncf, scenario.simulation.horizon_months),
        search_iterations: fleet_sizes.len() as u32,
        search_log,
    })
}

fn monthly_ncf(total_ncf: Option<f64>, horizon_months: u32) -> Option<f64> {
    total_ncf.and_then(|ncf| {
        if horizon_months > 0 {
            Some(round2(ncf / horizon_months as f64))
        } else {
            None
        }
    })
}

/// Run the engine at one fleet size → (npv, ncf, break_even).
fn evaluate_fleet_size(
    scenario: &Scenario,
    charger: &ChargerVariant,
    fleet_size: u32,
    confidence_pct: f64,
    npv_policy: NpvPolicy,
    cancel: &CancelToken,
) -> Result<(Option<f64>, Option<f64>, Option<u32>), SimError> {
    let mut trial = scenario.clone();
    trial.revenue.initial_fleet_size = fleet_size.max(1);

    let monte_carlo = trial.simulation.engine == EngineKind::Stochastic
        && trial.simulation.monte_carlo_runs > 1;

    // Confidence → percentile of the run distribution to test. Confidence 90
    // means the pessimistic P10 must pass.
    let percentile_used = if confidence_pct >= 90.0 {
        10.0
    } else if confidence_pct >= 50.0 {
        50.0
    } else {
        90.0
    };

    let result = if monte_carlo && npv_policy == NpvPolicy::ConfidencePercentile {
        trial.validate()?;
        run_monte_carlo_select(&trial, charger, percentile_used, cancel)?
    } else {
        run_engine_cancellable(&trial, charger, cancel)?
    };

    let salvage = result.derived.total_packs as f64 * trial.pack.second_life_salvage_value;
    let dcf = build_dcf_table(
        &result.months,
        &trial.finance,
        trial.simulation.discount_rate_annual,
        salvage,
    );

    match &result.monte_carlo {
        Some(mc) => {
            let (ncf, be) = if confidence_pct >= 90.0 {
                (mc.ncf_p10, mc.break_even_p10)
            } else if confidence_pct >= 50.0 {
                (mc.ncf_p50, mc.break_even_p50)
            } else {
                (mc.ncf_p90, mc.break_even_p90)
            };
            Ok((Some(dcf.npv), Some(ncf), be))
        }
        None => Ok((
            Some(dcf.npv),
            Some(result.summary.total_net_cash_flow),
            result.summary.break_even_month,
        )),
    }
}

fn check_target(
    target_metric: TargetMetric,
    npv: Option<f64>,
    ncf: Option<f64>,
    be_month: Option<u32>,
    break_even_target: Option<u32>,
) -> bool {
    match target_metric {
        TargetMetric::PositiveNpv => npv.is_some_and(|v| v > 0.0),
        TargetMetric::PositiveNcf => ncf.is_some_and(|v| v > 0.0),
        TargetMetric::BreakEvenWithin => match (be_month, break_even_target) {
            (Some(be), Some(target)) => be <= target,
            _ => false,
        },
    }
}

//! Stochastic monthly engine and Monte-Carlo orchestration.
//!
//! Wires the three stochastic trackers into the monthly loop:
//!   demand → degradation.step(cycles) → reliability.step()
//!   → revenue − OpEx − CapEx = net cash flow
//!
//! and routes `run_engine` between the static and stochastic engines.
//!
//! Monte-Carlo runs are embarrassingly parallel: run i uses seed
//! `base_seed + i` and owns its RNG and result containers outright, so the
//! fan-out goes through rayon and aggregation is order-independent. The
//! representative result is the run whose total net cash flow sits closest
//! to the selected percentile (P50 unless a pilot-sizing policy asks
//! otherwise), re-run from its own seed.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::cashflow::{compute_initial_capex, run_static_simulation};
use crate::charger_tco::compute_charger_tco;
use crate::config::{ChargerVariant, EngineKind, Scenario};
use crate::cost_per_cycle::compute_cpc_waterfall;
use crate::degradation::DegradationTracker;
use crate::demand::generate_monthly_demand;
use crate::derived::compute_derived_params;
use crate::error::{CancelToken, SimError};
use crate::pack_tco::compute_pack_tco;
use crate::reliability::ChargerReliabilityTracker;
use crate::results::{
    MonteCarloSummary, MonthlySnapshot, RunSummary, SimulationResult,
};
use crate::util::{percentile, round2, round4, round6};

/// Seed selected (and reported) when the scenario leaves `random_seed` unset.
pub const DEFAULT_SEED: u64 = 42;

/// Run the engine selected by `scenario.simulation.engine`.
///
/// - static → deterministic monthly loop
/// - stochastic, monte_carlo_runs = 1 → one seeded stochastic run
/// - stochastic, monte_carlo_runs > 1 → Monte-Carlo aggregate with the
///   representative run attached
pub fn run_engine(
    scenario: &Scenario,
    charger: &ChargerVariant,
) -> Result<SimulationResult, SimError> {
    run_engine_cancellable(scenario, charger, &CancelToken::new())
}

pub fn run_engine_cancellable(
    scenario: &Scenario,
    charger: &ChargerVariant,
    cancel: &CancelToken,
) -> Result<SimulationResult, SimError> {
    scenario.validate()?;

    match scenario.simulation.engine {
        EngineKind::Static => Ok(run_static_simulation(scenario, charger)),
        EngineKind::Stochastic => {
            if scenario.simulation.monte_carlo_runs > 1 {
                run_monte_carlo_select(scenario, charger, 50.0, cancel)
            } else {
                if cancel.is_cancelled() {
                    return Err(SimError::Cancelled);
                }
                let seed = scenario.simulation.random_seed.unwrap_or(DEFAULT_SEED);
                Ok(run_single_stochastic(scenario, charger, seed))
            }
        }
    }
}

/// Monte-Carlo evaluation with the representative run chosen as the one
/// closest to the NCF P50.
pub fn run_monte_carlo(
    scenario: &Scenario,
    charger: &ChargerVariant,
    cancel: &CancelToken,
) -> Result<SimulationResult, SimError> {
    run_monte_carlo_select(scenario, charger, 50.0, cancel)
}

/// Monte-Carlo evaluation selecting the run closest to the given NCF
/// percentile as the representative (pilot sizing uses this for its
/// confidence-percentile NPV policy).
pub fn run_monte_carlo_select(
    scenario: &Scenario,
    charger: &ChargerVariant,
    select_percentile: f64,
    cancel: &CancelToken,
) -> Result<SimulationResult, SimError> {
    let base_seed = scenario.simulation.random_seed.unwrap_or(DEFAULT_SEED);
    let num_runs = scenario.simulation.monte_carlo_runs;

    let summaries: Vec<Option<RunSummary>> = (0..num_runs)
        .into_par_iter()
        .map(|i| {
            if cancel.is_cancelled() {
                return None;
            }
            let result = run_single_stochastic(scenario, charger, base_seed + i as u64);
            Some(result.summary)
        })
        .collect();

    if cancel.is_cancelled() {
        return Err(SimError::Cancelled);
    }
    let summaries: Vec<RunSummary> = summaries.into_iter().flatten().collect();

    let mc = build_monte_carlo_summary(&summaries);

    // Pick the run whose NCF is closest to the selected percentile and
    // re-run it in full from its own seed.
    let ncfs: Vec<f64> = summaries.iter().map(|s| s.total_net_cash_flow).collect();
    let target = percentile(&ncfs, select_percentile);
    let selected_idx = ncfs
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            (*a - target)
                .abs()
                .partial_cmp(&(*b - target).abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i)
        .unwrap_or(0);

    let mut representative =
        run_single_stochastic(scenario, charger, base_seed + selected_idx as u64);
    representative.monte_carlo = Some(mc);
    Ok(representative)
}

fn build_monte_carlo_summary(summaries: &[RunSummary]) -> MonteCarloSummary {
    let ncfs: Vec<f64> = summaries.iter().map(|s| s.total_net_cash_flow).collect();
    let cpcs: Vec<f64> = summaries.iter().map(|s| s.avg_cost_per_cycle).collect();
    let retired: Vec<f64> = summaries
        .iter()
        .map(|s| s.total_packs_retired.unwrap_or(0) as f64)
        .collect();
    let failures: Vec<f64> = summaries
        .iter()
        .map(|s| s.total_charger_failures.unwrap_or(0) as f64)
        .collect();
    let fts: Vec<f64> = summaries
        .iter()
        .map(|s| s.total_failure_to_serve.unwrap_or(0) as f64)
        .collect();
    let be_months: Vec<f64> = summaries
        .iter()
        .filter_map(|s| s.break_even_month.map(|m| m as f64))
        .collect();

    let be_pct = |p: f64| -> Option<u32> {
        if be_months.is_empty() {
            None
        } else {
            Some(percentile(&be_months, p) as u32)
        }
    };

    MonteCarloSummary {
        num_runs: summaries.len() as u32,
        ncf_p10: round2(percentile(&ncfs, 10.0)),
        ncf_p50: round2(percentile(&ncfs, 50.0)),
        ncf_p90: round2(percentile(&ncfs, 90.0)),
        break_even_p10: be_pct(10.0),
        break_even_p50: be_pct(50.0),
        break_even_p90: be_pct(90.0),
        cpc_p10: round4(percentile(&cpcs, 10.0)),
        cpc_p50: round4(percentile(&cpcs, 50.0)),
        cpc_p90: round4(percentile(&cpcs, 90.0)),
        avg_packs_retired: round2(crate::util::mean(&retired)),
        max_packs_retired: retired.iter().fold(0.0f64, |a, &b| a.max(b)) as u32,
        avg_charger_failures: round2(crate::util::mean(&failures)),
        avg_failure_to_serve: round2(crate::util::mean(&fts)),
        max_failure_to_serve: fts.iter().fold(0.0f64, |a, &b| a.max(b)) as u64,
    }
}

/// Execute one stochastic simulation run. Bit-stable for a fixed
/// (scenario, charger, seed).
pub fn run_single_stochastic(
    scenario: &Scenario,
    charger: &ChargerVariant,
    seed: u64,
) -> SimulationResult {
    let v = &scenario.vehicle;
    let p = &scenario.pack;
    let st = &scenario.station;
    let op = &scenario.opex;
    let rev = &scenario.revenue;
    let ch = &scenario.chaos;
    let sim = &scenario.simulation;

    let mut rng = StdRng::seed_from_u64(seed);

    // Deterministic setup, identical across runs.
    let derived = compute_derived_params(v, p, charger, st, ch, rev);
    let tco = compute_charger_tco(charger, &derived, v, rev, sim, st);
    let total_initial_capex = compute_initial_capex(scenario, charger, &derived);
    let initial_packs = derived.total_packs;
    let ptco = compute_pack_tco(p, &derived, v, rev, sim, st, initial_packs);
    let cpc = compute_cpc_waterfall(&derived, p, charger, op, ch, st, &tco, &ptco);

    let mut degradation = DegradationTracker::new(p, ch, true);
    degradation.add_cohort(initial_packs, 1);

    let mut reliability =
        ChargerReliabilityTracker::new(charger, derived.total_docks, st.operating_hours_per_day);

    let cycles_per_hour = if st.operating_hours_per_day > 0.0 {
        derived.cycles_per_day_per_dock / st.operating_hours_per_day
    } else {
        0.0
    };
    let energy_per_cycle_kwh = if charger.charging_efficiency_pct > 0.0 {
        p.nominal_capacity_kwh / charger.charging_efficiency_pct
    } else {
        0.0
    };

    let mut months: Vec<MonthlySnapshot> = Vec::with_capacity(sim.horizon_months as usize);
    let mut cohort_history = Vec::with_capacity(sim.horizon_months as usize);

    let mut cumulative_cf = 0.0;
    let mut break_even_month: Option<u32> = None;

    let mut total_revenue = 0.0;
    let mut total_opex_sum = 0.0;
    let mut total_capex_sum = total_initial_capex;
    let mut total_cycles_all: u64 = 0;
    let mut total_cpc_weighted = 0.0;

    let mut total_packs_retired = 0u32;
    let mut total_charger_failures = 0u32;
    let mut total_replacement_capex = 0.0;
    let mut total_salvage_credit = 0.0;
    let mut total_failure_to_serve = 0u64;

    for m in 1..=sim.horizon_months {
        let fleet_size = rev.initial_fleet_size + rev.monthly_fleet_additions * (m - 1);

        // 1. Stochastic demand.
        let (swap_visits, total_cycles) =
            generate_monthly_demand(&scenario.demand, &derived, fleet_size, m, v.packs_per_vehicle, &mut rng);

        // 2. Battery degradation → lumpy replacement CapEx.
        let deg = degradation.step(m, total_cycles);
        let replacement_capex = deg.packs_retired as f64 * p.unit_cost;
        let salvage_credit = deg.packs_retired as f64 * p.second_life_salvage_value;
        let net_replacement_cost = replacement_capex - salvage_credit;

        // 3. Charger reliability.
        let rel = reliability.step(&mut rng);

        // 4. Revenue — per VISIT (per vehicle).
        let monthly_revenue = swap_visits as f64 * rev.price_per_swap;

        // 5. OpEx; charger repairs are operational per-event costs here.
        let station_opex = (op.rent_per_month_per_station
            + op.auxiliary_power_per_month
            + op.preventive_maintenance_per_month_per_station
            + op.corrective_maintenance_per_month_per_station
            + op.insurance_per_month_per_station
            + op.logistics_per_month_per_station)
            * st.num_stations as f64;
        let electricity_cost =
            total_cycles as f64 * energy_per_cycle_kwh * op.electricity_tariff_per_kwh;
        let labor_cost = total_cycles as f64 * op.pack_handling_labor_per_swap;
        let overhead = op.overhead_per_month;
        let sabotage_cost =
            ch.sabotage_pct_per_month * degradation.active_pack_count() as f64 * p.unit_cost;

        let monthly_opex = station_opex
            + electricity_cost
            + labor_cost
            + overhead
            + sabotage_cost
            + rel.repair_cost;

        // 6. CapEx: initial outlay, growth packs, lumpy pack replacement,
        // charger full replacements.
        let mut capex_this_month = 0.0;
        if m == 1 {
            capex_this_month = total_initial_capex;
        }
        if m > 1 && rev.monthly_fleet_additions > 0 {
            let new_packs = v.packs_per_vehicle * rev.monthly_fleet_additions;
            capex_this_month += new_packs as f64 * p.unit_cost;
            degradation.add_cohort(new_packs, m);
        }
        capex_this_month += net_replacement_cost;
        capex_this_month += rel.replacement_cost;

        // 7. Net cash flow.
        let net_cf = monthly_revenue - monthly_opex - capex_this_month;
        cumulative_cf += net_cf;
        if break_even_month.is_none() && cumulative_cf >= 0.0 && m > 1 {
            break_even_month = Some(m);
        }

        // Capacity diagnostic: demand above what the surviving dock-hours
        // could charge. Revenue is not capped; this feeds the failure-to-serve
        // aggregates.
        let capacity_cycles = cycles_per_hour * rel.available_dock_hours;
        let unserved_cycles = (total_cycles as f64 - capacity_cycles).max(0.0);
        let failure_to_serve = if v.packs_per_vehicle > 0 {
            (unserved_cycles / v.packs_per_vehicle as f64).round() as u64
        } else {
            0
        };
        let utilization = if capacity_cycles > 0.0 {
            total_cycles as f64 / capacity_cycles
        } else if total_cycles > 0 {
            1.0
        } else {
            0.0
        };
        let queue_util = utilization.min(0.95);
        let avg_wait_minutes =
            v.swap_time_minutes * (1.0 + queue_util * queue_util / (1.0 - queue_util));

        total_revenue += monthly_revenue;
        total_opex_sum += monthly_opex;
        if m > 1 {
            total_capex_sum += capex_this_month;
        }
        total_cycles_all += total_cycles;
        total_cpc_weighted += cpc.total * total_cycles as f64;
        total_packs_retired += deg.packs_retired;
        total_charger_failures += rel.failures;
        total_replacement_capex += replacement_capex;
        total_salvage_credit += salvage_credit;
        total_failure_to_serve += failure_to_serve;

        cohort_history.push(deg.cohort_snapshots.clone());

        months.push(MonthlySnapshot {
            month: m,
            fleet_size,
            swap_visits,
            total_cycles,
            revenue: round2(monthly_revenue),
            opex_total: round2(monthly_opex),
            capex_this_month: round2(capex_this_month),
            net_cash_flow: round2(net_cf),
            cumulative_cash_flow: round2(cumulative_cf),
            cost_per_cycle: cpc.clone(),
            avg_soh: Some(deg.avg_soh),
            packs_retired_this_month: Some(deg.packs_retired),
            packs_replaced_this_month: Some(deg.packs_replaced),
            replacement_capex_this_month: Some(round2(net_replacement_cost)),
            salvage_credit_this_month: Some(round2(salvage_credit)),
            charger_failures_this_month: Some(rel.failures),
            failure_to_serve_count: Some(failure_to_serve),
            avg_wait_minutes: Some(round2(avg_wait_minutes)),
        });
    }

    let avg_cpc = if total_cycles_all > 0 {
        total_cpc_weighted / total_cycles_all as f64
    } else {
        0.0
    };
    let mean_soh_at_end = months.last().and_then(|m| m.avg_soh).map(round6);

    let summary = RunSummary {
        charger_variant_name: charger.name.clone(),
        total_revenue: round2(total_revenue),
        total_opex: round2(total_opex_sum),
        total_capex: round2(total_capex_sum),
        total_net_cash_flow: round2(total_revenue - total_opex_sum - total_capex_sum),
        avg_cost_per_cycle: round4(avg_cpc),
        break_even_month,
        total_packs_retired: Some(total_packs_retired),
        total_charger_failures: Some(total_charger_failures),
        mean_soh_at_end,
        total_replacement_capex: Some(round2(total_replacement_capex)),
        total_salvage_credit: Some(round2(total_salvage_credit)),
        total_failure_to_serve: Some(total_failure_to_serve),
    };

    SimulationResult {
        scenario_id: "default".to_string(),
        charger_variant_id: charger.name.clone(),
        engine: EngineKind::Stochastic,
        seed: Some(seed),
        months,
        summary,
        derived,
        cpc_waterfall: cpc,
        charger_tco: tco,
        pack_tco: ptco,
        cohort_history: Some(cohort_history),
        monte_carlo: None,
        dcf: None,
        debt: None,
        dscr: None,
        statements: None,
    }
}

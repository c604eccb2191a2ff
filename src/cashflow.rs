//! Static monthly engine — deterministic 30-day months.
//!
//! Key distinction, kept throughout the crate:
//!   - swap_visit = one vehicle arrives, ALL its packs are swapped.
//!     Revenue is per visit.
//!   - cycle = one pack charge-discharge. Costs (electricity, labor,
//!     degradation) are per cycle.
//!   - total_cycles = swap_visits × packs_per_vehicle
//!
//! Charger and pack failure costs are spread uniformly over the horizon in
//! this engine; the stochastic engine books them as they arise, so the two
//! are comparable in totals only, not month-by-month.

use crate::charger_tco::compute_charger_tco;
use crate::config::{ChargerVariant, EngineKind, Scenario};
use crate::cost_per_cycle::compute_cpc_waterfall;
use crate::derived::compute_derived_params;
use crate::pack_tco::compute_pack_tco;
use crate::results::{DerivedParams, MonthlySnapshot, RunSummary, SimulationResult};
use crate::util::{round2, round4};

/// Initial CapEx at month 1: station fixed costs + software + chargers for
/// every dock + the full initial pack inventory.
pub fn compute_initial_capex(
    scenario: &Scenario,
    charger: &ChargerVariant,
    derived: &DerivedParams,
) -> f64 {
    let st = &scenario.station;
    let per_station_capex =
        st.cabinet_cost + st.site_prep_cost + st.grid_connection_cost + st.security_deposit;
    let station_capex = per_station_capex * st.num_stations as f64 + st.software_cost;
    let charger_capex = charger.purchase_cost_per_slot * derived.total_docks as f64;
    let pack_capex = derived.total_packs as f64 * scenario.pack.unit_cost;
    station_capex + charger_capex + pack_capex
}

/// Run one deterministic simulation for a specific charger variant.
pub fn run_static_simulation(scenario: &Scenario, charger: &ChargerVariant) -> SimulationResult {
    let v = &scenario.vehicle;
    let p = &scenario.pack;
    let st = &scenario.station;
    let op = &scenario.opex;
    let rev = &scenario.revenue;
    let ch = &scenario.chaos;
    let sim = &scenario.simulation;

    let derived = compute_derived_params(v, p, charger, st, ch, rev);
    let tco = compute_charger_tco(charger, &derived, v, rev, sim, st);

    let total_initial_capex = compute_initial_capex(scenario, charger, &derived);
    let initial_packs = derived.total_packs;

    let ptco = compute_pack_tco(p, &derived, v, rev, sim, st, initial_packs);
    let cpc = compute_cpc_waterfall(&derived, p, charger, op, ch, st, &tco, &ptco);

    let mut months: Vec<MonthlySnapshot> = Vec::with_capacity(sim.horizon_months as usize);
    let mut cumulative_cf = 0.0;
    let mut break_even_month: Option<u32> = None;

    let mut total_revenue = 0.0;
    let mut total_opex_sum = 0.0;
    let mut total_capex_sum = total_initial_capex;
    let mut total_cycles_all: u64 = 0;
    let mut total_cpc_weighted = 0.0;

    let energy_per_cycle_kwh = if charger.charging_efficiency_pct > 0.0 {
        p.nominal_capacity_kwh / charger.charging_efficiency_pct
    } else {
        0.0
    };

    for m in 1..=sim.horizon_months {
        let fleet_size = rev.initial_fleet_size + rev.monthly_fleet_additions * (m - 1);

        let visits_per_day = derived.swap_visits_per_vehicle_per_day * fleet_size as f64;
        let swap_visits = (visits_per_day * 30.0).round() as u64;
        let total_cycles = swap_visits * v.packs_per_vehicle as u64;

        // Revenue is per VISIT (per vehicle), never per pack.
        let monthly_revenue = swap_visits as f64 * rev.price_per_swap;

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
        let sabotage_cost = ch.sabotage_pct_per_month * initial_packs as f64 * p.unit_cost;

        let monthly_opex =
            station_opex + electricity_cost + labor_cost + overhead + sabotage_cost;

        let mut capex_this_month = 0.0;
        if m == 1 {
            capex_this_month = total_initial_capex;
        }

        // Packs for fleet growth.
        if m > 1 && rev.monthly_fleet_additions > 0 {
            let new_packs = v.packs_per_vehicle * rev.monthly_fleet_additions;
            capex_this_month += new_packs as f64 * p.unit_cost;
        }

        // Fleet-level failure costs spread evenly across the horizon.
        if tco.expected_failures_over_horizon > 0.0 && sim.horizon_months > 0 {
            capex_this_month += (tco.total_repair_cost + tco.total_replacement_cost)
                / sim.horizon_months as f64;
        }
        if ptco.expected_failures > 0.0 && sim.horizon_months > 0 {
            capex_this_month += (ptco.total_repair_cost + ptco.total_replacement_cost)
                / sim.horizon_months as f64;
        }

        let net_cf = monthly_revenue - monthly_opex - capex_this_month;
        cumulative_cf += net_cf;

        if break_even_month.is_none() && cumulative_cf >= 0.0 && m > 1 {
            break_even_month = Some(m);
        }

        total_revenue += monthly_revenue;
        total_opex_sum += monthly_opex;
        if m > 1 {
            total_capex_sum += capex_this_month;
        }
        total_cycles_all += total_cycles;
        total_cpc_weighted += cpc.total * total_cycles as f64;

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
            avg_soh: None,
            packs_retired_this_month: None,
            packs_replaced_this_month: None,
            replacement_capex_this_month: None,
            salvage_credit_this_month: None,
            charger_failures_this_month: None,
            failure_to_serve_count: None,
            avg_wait_minutes: None,
        });
    }

    let avg_cpc = if total_cycles_all > 0 {
        total_cpc_weighted / total_cycles_all as f64
    } else {
        0.0
    };

    let summary = RunSummary {
        charger_variant_name: charger.name.clone(),
        total_revenue: round2(total_revenue),
        total_opex: round2(total_opex_sum),
        total_capex: round2(total_capex_sum),
        total_net_cash_flow: round2(total_revenue - total_opex_sum - total_capex_sum),
        avg_cost_per_cycle: round4(avg_cpc),
        break_even_month,
        total_packs_retired: None,
        total_charger_failures: None,
        mean_soh_at_end: None,
        total_replacement_capex: None,
        total_salvage_credit: None,
        total_failure_to_serve: None,
    };

    SimulationResult {
        scenario_id: "default".to_string(),
        charger_variant_id: charger.name.clone(),
        engine: EngineKind::Static,
        seed: None,
        months,
        summary,
        derived,
        cpc_waterfall: cpc,
        charger_tco: tco,
        pack_tco: ptco,
        cohort_history: None,
        monte_carlo: None,
        dcf: None,
        debt: None,
        dscr: None,
        statements: None,
    }
}

//! Charger TCO — fleet-level deterministic expected-value calculation.
//!
//! MTBF is a population statistic. It does not predict when a single charger
//! breaks; it describes the average failure rate across the fleet. Applying
//! it per-unit underestimates replacements whenever per-unit expected
//! failures are below one while the fleet total is large, so every metric
//! here is computed at the fleet level:
//!
//!   fleet_operating_hours = hrs/day × 365 × years × total_docks
//!   expected_failures     = fleet_operating_hours / MTBF
//!   replacements          = floor(expected_failures / threshold)

use crate::config::{ChargerVariant, RevenueConfig, SimulationConfig, StationConfig, VehicleConfig};
use crate::results::{ChargerTCOBreakdown, DerivedParams};
use crate::util::{round2, round4, round6};

pub fn compute_charger_tco(
    charger: &ChargerVariant,
    derived: &DerivedParams,
    vehicle: &VehicleConfig,
    revenue: &RevenueConfig,
    simulation: &SimulationConfig,
    station: &StationConfig,
) -> ChargerTCOBreakdown {
    let horizon_years = simulation.horizon_months as f64 / 12.0;
    let total_docks = derived.total_docks;

    let scheduled_hours_per_year_per_dock = station.operating_hours_per_day * 365.0;
    let fleet_operating_hours =
        scheduled_hours_per_year_per_dock * horizon_years * total_docks as f64;

    let expected_failures = if charger.mtbf_hours > 0.0 {
        fleet_operating_hours / charger.mtbf_hours
    } else {
        0.0
    };

    let availability = if charger.mtbf_hours + charger.mttr_hours > 0.0 {
        charger.mtbf_hours / (charger.mtbf_hours + charger.mttr_hours)
    } else {
        1.0
    };

    let total_repair_cost = expected_failures * charger.repair_cost_per_event;

    // After every `replacement_threshold` failures across the fleet, one unit
    // is fully replaced.
    let num_replacements = if charger.replacement_threshold > 0 {
        (expected_failures / charger.replacement_threshold as f64).floor() as u32
    } else {
        0
    };
    let total_replacement_cost = num_replacements as f64 * charger.full_replacement_cost;

    let total_downtime_hours = expected_failures * charger.mttr_hours;

    let cycles_per_hour = if station.operating_hours_per_day > 0.0 {
        derived.cycles_per_day_per_dock / station.operating_hours_per_day
    } else {
        0.0
    };
    // Revenue attributable to one cycle = price per visit / packs per visit.
    let revenue_per_cycle = if vehicle.packs_per_vehicle > 0 {
        revenue.price_per_swap / vehicle.packs_per_vehicle as f64
    } else {
        0.0
    };
    let lost_revenue = total_downtime_hours * cycles_per_hour * revenue_per_cycle;

    let fleet_purchase_cost = charger.purchase_cost_per_slot * total_docks as f64;
    let fleet_spare_cost = charger.spare_inventory_cost * station.num_stations as f64;

    let total_tco = fleet_purchase_cost
        + total_repair_cost
        + total_replacement_cost
        + lost_revenue
        + fleet_spare_cost;

    let fleet_uptime_hours = fleet_operating_hours - total_downtime_hours;
    let fleet_cycles_served = if fleet_uptime_hours > 0.0 {
        cycles_per_hour * fleet_uptime_hours
    } else {
        0.0
    };

    let cost_per_cycle = if fleet_cycles_served > 0.0 {
        total_tco / fleet_cycles_served
    } else {
        0.0
    };

    ChargerTCOBreakdown {
        total_docks,
        purchase_cost: round2(fleet_purchase_cost),
        scheduled_hours_per_year_per_dock: round2(scheduled_hours_per_year_per_dock),
        fleet_operating_hours: round2(fleet_operating_hours),
        availability: round6(availability),
        expected_failures_over_horizon: round2(expected_failures),
        total_repair_cost: round2(total_repair_cost),
        num_replacements,
        total_replacement_cost: round2(total_replacement_cost),
        total_downtime_hours: round2(total_downtime_hours),
        lost_revenue_from_downtime: round2(lost_revenue),
        spare_inventory_cost: round2(fleet_spare_cost),
        total_tco: round2(total_tco),
        cycles_served_over_horizon: round2(fleet_cycles_served),
        cost_per_cycle: round4(cost_per_cycle),
    }
}

//! Battery pack failure TCO — fleet-level, same skeleton as the charger TCO.
//!
//! Covers *random* failures only (BMS faults, cell swelling, connector and
//! handling damage). Cycle degradation is modelled separately; pack purchase
//! is amortized into the CPC battery component, so it is excluded here to
//! avoid double counting.

use crate::config::{PackSpec, RevenueConfig, SimulationConfig, StationConfig, VehicleConfig};
use crate::results::{DerivedParams, PackTCOBreakdown};
use crate::util::{round2, round4, round6};

/// `total_packs` is the full inventory: packs on vehicles plus packs in docks.
pub fn compute_pack_tco(
    pack: &PackSpec,
    derived: &DerivedParams,
    vehicle: &VehicleConfig,
    revenue: &RevenueConfig,
    simulation: &SimulationConfig,
    station: &StationConfig,
    total_packs: u32,
) -> PackTCOBreakdown {
    let horizon_years = simulation.horizon_months as f64 / 12.0;

    // Packs are in service during station operating hours — on vehicles, in
    // chargers, or in the swap queue.
    let hours_per_year_per_pack = station.operating_hours_per_day * 365.0;
    let fleet_operating_hours = hours_per_year_per_pack * horizon_years * total_packs as f64;

    let expected_failures = if pack.mtbf_hours > 0.0 {
        fleet_operating_hours / pack.mtbf_hours
    } else {
        0.0
    };

    let availability = if pack.mtbf_hours + pack.mttr_hours > 0.0 {
        pack.mtbf_hours / (pack.mtbf_hours + pack.mttr_hours)
    } else {
        1.0
    };

    let total_repair_cost = expected_failures * pack.repair_cost_per_event;

    let num_replacements = if pack.replacement_threshold > 0 {
        (expected_failures / pack.replacement_threshold as f64).floor() as u32
    } else {
        0
    };
    let total_replacement_cost = num_replacements as f64 * pack.full_replacement_cost;

    let total_downtime_hours = expected_failures * pack.mttr_hours;

    // Each failed pack effectively idles one dock slot for MTTR hours.
    let cycles_per_hour = if station.operating_hours_per_day > 0.0 {
        derived.cycles_per_day_per_dock / station.operating_hours_per_day
    } else {
        0.0
    };
    let revenue_per_cycle = if vehicle.packs_per_vehicle > 0 {
        revenue.price_per_swap / vehicle.packs_per_vehicle as f64
    } else {
        0.0
    };
    let lost_revenue = total_downtime_hours * cycles_per_hour * revenue_per_cycle;

    let fleet_spare_cost = pack.spare_packs_cost_per_station * station.num_stations as f64;

    let total_failure_tco =
        total_repair_cost + total_replacement_cost + lost_revenue + fleet_spare_cost;

    let fleet_uptime_hours = fleet_operating_hours - total_downtime_hours;
    let fleet_cycles = if fleet_uptime_hours > 0.0 {
        cycles_per_hour * fleet_uptime_hours
    } else {
        0.0
    };

    let failure_cost_per_cycle = if fleet_cycles > 0.0 {
        total_failure_tco / fleet_cycles
    } else {
        0.0
    };

    PackTCOBreakdown {
        total_packs,
        fleet_operating_hours: round2(fleet_operating_hours),
        availability: round6(availability),
        expected_failures: round2(expected_failures),
        total_repair_cost: round2(total_repair_cost),
        num_replacements,
        total_replacement_cost: round2(total_replacement_cost),
        total_downtime_hours: round2(total_downtime_hours),
        lost_revenue_from_downtime: round2(lost_revenue),
        spare_inventory_cost: round2(fleet_spare_cost),
        total_failure_tco: round2(total_failure_tco),
        failure_cost_per_cycle: round4(failure_cost_per_cycle),
    }
}

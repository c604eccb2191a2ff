//! Derived operational parameters — pure arithmetic from scenario inputs.

use crate::config::{
    ChaosConfig, ChargerVariant, PackSpec, RevenueConfig, StationConfig, VehicleConfig,
};
use crate::results::DerivedParams;
use crate::util::{round2, round4};

/// Sentinel lifetime when the degradation rate rounds to zero.
const LIFETIME_CYCLES_SENTINEL: u32 = 999_999;

/// Compute all derived operational parameters from raw inputs.
/// Every division guards its denominator: degenerate inputs yield 0 (or the
/// lifetime sentinel / +∞ charge time) instead of NaN.
pub fn compute_derived_params(
    vehicle: &VehicleConfig,
    pack: &PackSpec,
    charger: &ChargerVariant,
    station: &StationConfig,
    chaos: &ChaosConfig,
    revenue: &RevenueConfig,
) -> DerivedParams {
    // Driver swaps at the range-anxiety buffer SoC (e.g. 20%), not at 0%.
    let energy_per_pack_kwh = vehicle.pack_capacity_kwh * (1.0 - vehicle.range_anxiety_buffer_pct);

    // A swap VISIT exchanges every pack on the vehicle.
    let energy_per_visit_kwh = vehicle.packs_per_vehicle as f64 * energy_per_pack_kwh;
    let total_energy_per_vehicle_kwh =
        vehicle.packs_per_vehicle as f64 * vehicle.pack_capacity_kwh;

    let daily_energy_need_wh = vehicle.avg_daily_km * vehicle.energy_consumption_wh_per_km;

    let energy_per_visit_wh = energy_per_visit_kwh * 1_000.0;
    let swap_visits_per_vehicle_per_day = if energy_per_visit_wh > 0.0 {
        daily_energy_need_wh / energy_per_visit_wh
    } else {
        0.0
    };

    let rated_power_kw = charger.rated_power_w / 1_000.0;
    let charge_time_minutes = if rated_power_kw > 0.0 && charger.charging_efficiency_pct > 0.0 {
        (vehicle.pack_capacity_kwh / (rated_power_kw * charger.charging_efficiency_pct)) * 60.0
    } else {
        f64::INFINITY
    };

    let effective_c_rate = if vehicle.pack_capacity_kwh > 0.0 {
        rated_power_kw / vehicle.pack_capacity_kwh
    } else {
        0.0
    };

    // Throughput ceiling of one dock.
    let cycles_per_day_per_dock = if charge_time_minutes > 0.0 && charge_time_minutes.is_finite() {
        (station.operating_hours_per_day * 60.0) / charge_time_minutes
    } else {
        0.0
    };

    let beta_fraction = pack.cycle_degradation_rate_pct / 100.0;
    let effective_beta = beta_fraction * chaos.aggressiveness_index;
    let soh_budget = 1.0 - pack.retirement_soh_pct;
    let pack_lifetime_cycles = if effective_beta > 0.0 {
        (soh_budget / effective_beta).floor() as u32
    } else {
        LIFETIME_CYCLES_SENTINEL
    };

    let total_docks = station.num_stations * station.docks_per_station;
    let cycles_per_month_per_station =
        cycles_per_day_per_dock * station.docks_per_station as f64 * 30.0;
    let total_network_cycles_per_month =
        cycles_per_month_per_station * station.num_stations as f64;

    // Packs on vehicles ride with the fleet; packs in docks sit charging at
    // stations — those ARE the float, not an addition to it.
    let packs_on_vehicles = vehicle.packs_per_vehicle * revenue.initial_fleet_size;
    let packs_in_docks = total_docks;
    let total_packs = packs_on_vehicles + packs_in_docks;

    DerivedParams {
        energy_per_swap_cycle_per_pack_kwh: round4(energy_per_pack_kwh),
        energy_per_swap_cycle_per_vehicle_kwh: round4(energy_per_visit_kwh),
        total_energy_per_vehicle_kwh: round4(total_energy_per_vehicle_kwh),
        daily_energy_need_wh: round2(daily_energy_need_wh),
        swap_visits_per_vehicle_per_day: round4(swap_visits_per_vehicle_per_day),
        charge_time_minutes: if charge_time_minutes.is_finite() {
            round2(charge_time_minutes)
        } else {
            charge_time_minutes
        },
        effective_c_rate: round4(effective_c_rate),
        cycles_per_day_per_dock: round2(cycles_per_day_per_dock),
        pack_lifetime_cycles,
        total_docks,
        cycles_per_month_per_station: round2(cycles_per_month_per_station),
        total_network_cycles_per_month: round2(total_network_cycles_per_month),
        initial_fleet_size: revenue.initial_fleet_size,
        packs_on_vehicles,
        packs_in_docks,
        total_packs,
    }
}

/// Nine-component cost-per-cycle waterfall.
use approx::assert_relative_eq;

use swapnet_sim::charger_tco::compute_charger_tco;
use swapnet_sim::config::{
    ChaosConfig, ChargerVariant, OpExConfig, PackSpec, RevenueConfig, SimulationConfig,
    StationConfig, VehicleConfig,
};
use swapnet_sim::cost_per_cycle::compute_cpc_waterfall;
use swapnet_sim::derived::compute_derived_params;
use swapnet_sim::pack_tco::compute_pack_tco;
use swapnet_sim::results::{CostPerCycleWaterfall, DerivedParams};

fn build_waterfall() -> (CostPerCycleWaterfall, DerivedParams, f64) {
    let vehicle = VehicleConfig::default();
    let pack = PackSpec::default();
    let charger = ChargerVariant::default();
    let station = StationConfig {
        num_stations: 5,
        docks_per_station: 8,
        operating_hours_per_day: 18.0,
        ..StationConfig::default()
    };
    let opex = OpExConfig::default();
    let chaos = ChaosConfig::default();
    let revenue = RevenueConfig::default();
    let simulation = SimulationConfig::default();

    let derived = compute_derived_params(&vehicle, &pack, &charger, &station, &chaos, &revenue);
    let charger_tco =
        compute_charger_tco(&charger, &derived, &vehicle, &revenue, &simulation, &station);
    let pack_tco = compute_pack_tco(
        &pack,
        &derived,
        &vehicle,
        &revenue,
        &simulation,
        &station,
        derived.total_packs,
    );
    let cpc = compute_cpc_waterfall(
        &derived, &pack, &charger, &opex, &chaos, &station, &charger_tco, &pack_tco,
    );
    (cpc, derived, pack_tco.failure_cost_per_cycle)
}

#[test]
fn total_matches_component_sum() {
    let (cpc, _, _) = build_waterfall();
    assert!(
        (cpc.total - cpc.component_sum()).abs() <= 0.01,
        "total {} vs sum {}",
        cpc.total,
        cpc.component_sum()
    );
}

#[test]
fn battery_is_degradation_plus_failures() {
    let (cpc, derived, failure_cpc) = build_waterfall();
    let pack = PackSpec::default();
    let degradation =
        (pack.unit_cost - pack.second_life_salvage_value) / derived.pack_lifetime_cycles as f64;
    assert_relative_eq!(cpc.battery, degradation + failure_cpc, epsilon = 0.001);
}

#[test]
fn electricity_uses_wall_energy() {
    let (cpc, _, _) = build_waterfall();
    let pack = PackSpec::default();
    let charger = ChargerVariant::default();
    let opex = OpExConfig::default();
    let expected = pack.nominal_capacity_kwh / charger.charging_efficiency_pct
        * opex.electricity_tariff_per_kwh;
    assert_relative_eq!(cpc.electricity, expected, epsilon = 0.001);
}

#[test]
fn station_costs_spread_over_station_cycles() {
    let (cpc, derived, _) = build_waterfall();
    let opex = OpExConfig::default();
    assert_relative_eq!(
        cpc.real_estate,
        opex.rent_per_month_per_station / derived.cycles_per_month_per_station,
        epsilon = 0.001
    );
    assert_relative_eq!(
        cpc.maintenance,
        (opex.preventive_maintenance_per_month_per_station
            + opex.corrective_maintenance_per_month_per_station)
            / derived.cycles_per_month_per_station,
        epsilon = 0.001
    );
    assert_relative_eq!(
        cpc.overhead,
        opex.overhead_per_month / derived.total_network_cycles_per_month,
        epsilon = 0.001
    );
}

#[test]
fn sabotage_uses_docks_as_pack_proxy() {
    let (cpc, derived, _) = build_waterfall();
    let pack = PackSpec::default();
    let chaos = ChaosConfig::default();
    let expected = chaos.sabotage_pct_per_month * 8.0 * pack.unit_cost
        / derived.cycles_per_month_per_station;
    assert_relative_eq!(cpc.sabotage, expected, epsilon = 0.001);
}

#[test]
fn degenerate_network_yields_zero_waterfall() {
    // A network with no cycle throughput attributes no cost. Constructed
    // directly because validation forbids the degenerate inputs.
    let derived = DerivedParams {
        energy_per_swap_cycle_per_pack_kwh: 0.0,
        energy_per_swap_cycle_per_vehicle_kwh: 0.0,
        total_energy_per_vehicle_kwh: 0.0,
        daily_energy_need_wh: 0.0,
        swap_visits_per_vehicle_per_day: 0.0,
        charge_time_minutes: f64::INFINITY,
        effective_c_rate: 0.0,
        cycles_per_day_per_dock: 0.0,
        pack_lifetime_cycles: 0,
        total_docks: 0,
        cycles_per_month_per_station: 0.0,
        total_network_cycles_per_month: 0.0,
        initial_fleet_size: 0,
        packs_on_vehicles: 0,
        packs_in_docks: 0,
        total_packs: 0,
    };
    let vehicle = VehicleConfig::default();
    let pack = PackSpec::default();
    let charger = ChargerVariant::default();
    let station = StationConfig::default();
    let revenue = RevenueConfig::default();
    let simulation = SimulationConfig::default();
    let charger_tco =
        compute_charger_tco(&charger, &derived, &vehicle, &revenue, &simulation, &station);
    let pack_tco =
        compute_pack_tco(&pack, &derived, &vehicle, &revenue, &simulation, &station, 0);

    let cpc = compute_cpc_waterfall(
        &derived,
        &pack,
        &charger,
        &OpExConfig::default(),
        &ChaosConfig::default(),
        &station,
        &charger_tco,
        &pack_tco,
    );
    assert_eq!(cpc.total, 0.0);
    assert_eq!(cpc.component_sum(), 0.0);
}

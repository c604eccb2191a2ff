/// Pack failure TCO: same fleet-level skeleton as the charger TCO but sized
/// by total packs and with purchase excluded (it lives in the degradation
/// component of the waterfall).
use approx::assert_relative_eq;

use swapnet_sim::config::{
    ChaosConfig, ChargerVariant, PackSpec, RevenueConfig, SimulationConfig, StationConfig,
    VehicleConfig,
};
use swapnet_sim::derived::compute_derived_params;
use swapnet_sim::pack_tco::compute_pack_tco;
use swapnet_sim::results::PackTCOBreakdown;

fn compute(pack: &PackSpec) -> PackTCOBreakdown {
    let vehicle = VehicleConfig::default();
    let charger = ChargerVariant::default();
    let station = StationConfig {
        num_stations: 5,
        docks_per_station: 8,
        operating_hours_per_day: 18.0,
        ..StationConfig::default()
    };
    let revenue = RevenueConfig {
        initial_fleet_size: 200,
        ..RevenueConfig::default()
    };
    let simulation = SimulationConfig {
        horizon_months: 60,
        ..SimulationConfig::default()
    };
    let derived =
        compute_derived_params(&vehicle, pack, &charger, &station, &ChaosConfig::default(), &revenue);
    compute_pack_tco(
        pack,
        &derived,
        &vehicle,
        &revenue,
        &simulation,
        &station,
        derived.total_packs,
    )
}

#[test]
fn sized_by_total_pack_inventory() {
    let tco = compute(&PackSpec::default());
    // 200 vehicles × 2 packs + 40 docks
    assert_eq!(tco.total_packs, 440);
    // 18 × 365 × 5 × 440
    assert_relative_eq!(tco.fleet_operating_hours, 14_454_000.0, epsilon = 1e-6);
}

#[test]
fn failure_tco_excludes_purchase() {
    let pack = PackSpec {
        mtbf_hours: 50_000.0,
        mttr_hours: 4.0,
        repair_cost_per_event: 2_000.0,
        replacement_threshold: 3,
        full_replacement_cost: 15_000.0,
        spare_packs_cost_per_station: 30_000.0,
        ..PackSpec::default()
    };
    let tco = compute(&pack);

    let reconstructed = tco.total_repair_cost
        + tco.total_replacement_cost
        + tco.lost_revenue_from_downtime
        + tco.spare_inventory_cost;
    assert!(
        (tco.total_failure_tco - reconstructed).abs() <= 1.0,
        "failure TCO {} vs components {}",
        tco.total_failure_tco,
        reconstructed
    );
    // No purchase term anywhere: failure TCO stays below what adding the
    // pack fleet purchase would produce.
    assert!(tco.total_failure_tco < 440.0 * pack.unit_cost);
}

#[test]
fn expected_failures_follow_mtbf() {
    let tco = compute(&PackSpec::default());
    assert_relative_eq!(
        tco.expected_failures,
        14_454_000.0 / 50_000.0,
        epsilon = 0.01
    );
    assert_relative_eq!(tco.availability, 50_000.0 / 50_004.0, epsilon = 1e-6);
}

#[test]
fn failure_cost_per_cycle_feeds_battery_component() {
    let tco = compute(&PackSpec::default());
    assert!(tco.total_failure_tco > 0.0);
    assert!(tco.failure_cost_per_cycle > 0.0);
}

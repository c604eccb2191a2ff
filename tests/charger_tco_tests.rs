/// Fleet-level charger TCO. MTBF is a population statistic: the per-dock
/// failure expectation can be far below 1 while the fleet still racks up
/// dozens of replacements over the horizon.
use approx::assert_relative_eq;

use swapnet_sim::charger_tco::compute_charger_tco;
use swapnet_sim::config::{
    ChaosConfig, ChargerVariant, PackSpec, RevenueConfig, SimulationConfig, StationConfig,
    VehicleConfig,
};
use swapnet_sim::derived::compute_derived_params;
use swapnet_sim::results::ChargerTCOBreakdown;

struct TcoSetup {
    vehicle: VehicleConfig,
    charger: ChargerVariant,
    station: StationConfig,
    revenue: RevenueConfig,
    simulation: SimulationConfig,
}

impl TcoSetup {
    fn compute(&self) -> ChargerTCOBreakdown {
        let derived = compute_derived_params(
            &self.vehicle,
            &PackSpec::default(),
            &self.charger,
            &self.station,
            &ChaosConfig::default(),
            &self.revenue,
        );
        compute_charger_tco(
            &self.charger,
            &derived,
            &self.vehicle,
            &self.revenue,
            &self.simulation,
            &self.station,
        )
    }
}

fn small_network() -> TcoSetup {
    TcoSetup {
        vehicle: VehicleConfig {
            packs_per_vehicle: 2,
            pack_capacity_kwh: 1.28,
            avg_daily_km: 100.0,
            energy_consumption_wh_per_km: 30.0,
            range_anxiety_buffer_pct: 0.20,
            ..VehicleConfig::default()
        },
        charger: ChargerVariant {
            rated_power_w: 1_000.0,
            charging_efficiency_pct: 0.90,
            mtbf_hours: 8_000.0,
            mttr_hours: 24.0,
            replacement_threshold: 3,
            ..ChargerVariant::default()
        },
        station: StationConfig {
            num_stations: 5,
            docks_per_station: 8,
            operating_hours_per_day: 18.0,
            ..StationConfig::default()
        },
        revenue: RevenueConfig {
            initial_fleet_size: 200,
            ..RevenueConfig::default()
        },
        simulation: SimulationConfig {
            horizon_months: 60,
            ..SimulationConfig::default()
        },
    }
}

#[test]
fn fleet_level_failure_arithmetic() {
    let tco = small_network().compute();

    // 18 h × 365 d × 5 y × 40 docks
    assert_relative_eq!(tco.fleet_operating_hours, 1_314_000.0, epsilon = 1e-6);
    assert_relative_eq!(tco.expected_failures_over_horizon, 164.25, epsilon = 1e-9);
    assert_eq!(tco.num_replacements, 54);
    assert_relative_eq!(tco.availability, 8_000.0 / 8_024.0, epsilon = 1e-6);
    assert_relative_eq!(tco.total_downtime_hours, 164.25 * 24.0, epsilon = 1e-6);
}

#[test]
fn total_tco_identity() {
    let tco = small_network().compute();
    let reconstructed = tco.purchase_cost
        + tco.total_repair_cost
        + tco.total_replacement_cost
        + tco.lost_revenue_from_downtime
        + tco.spare_inventory_cost;
    assert!(
        (tco.total_tco - reconstructed).abs() <= 1.0,
        "total {} vs components {}",
        tco.total_tco,
        reconstructed
    );
}

#[test]
fn fleet_vs_per_dock_divergence() {
    // 250 docks, 21 h/day, MTBF 80k over 60 months: each dock expects only
    // ~0.479 failures (naive per-dock replacements = 0), but the fleet
    // expectation is ~119.8 failures and 39 replacements.
    let mut setup = small_network();
    setup.station = StationConfig {
        num_stations: 5,
        docks_per_station: 50,
        operating_hours_per_day: 21.0,
        ..StationConfig::default()
    };
    setup.charger.mtbf_hours = 80_000.0;
    let tco = setup.compute();

    let per_dock_failures = tco.expected_failures_over_horizon / tco.total_docks as f64;
    assert!(per_dock_failures < 0.5);
    assert_eq!((per_dock_failures / 3.0).floor() as u32, 0);
    assert_eq!(tco.num_replacements, 39);
}

#[test]
fn higher_mtbf_strictly_improves() {
    let base = small_network().compute();

    let mut better = small_network();
    better.charger.mtbf_hours = 16_000.0;
    let better = better.compute();

    assert!(better.expected_failures_over_horizon < base.expected_failures_over_horizon);
    assert!(better.cost_per_cycle < base.cost_per_cycle);
    assert!(better.availability > base.availability);
}

#[test]
fn purchase_scales_with_docks() {
    let tco = small_network().compute();
    assert_relative_eq!(
        tco.purchase_cost,
        small_network().charger.purchase_cost_per_slot * 40.0,
        epsilon = 1e-9
    );
}

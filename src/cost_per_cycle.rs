//! Fully-loaded cost per cycle — the nine-component waterfall.
//!
//! Each component is some monthly cost ÷ monthly cycles, or an asset cost ÷
//! lifetime cycles. Battery = degradation + random-failure cost.

use crate::config::{ChaosConfig, ChargerVariant, OpExConfig, PackSpec, StationConfig};
use crate::results::{
    ChargerTCOBreakdown, CostPerCycleWaterfall, DerivedParams, PackTCOBreakdown,
};
use crate::util::round4;

pub fn compute_cpc_waterfall(
    derived: &DerivedParams,
    pack: &PackSpec,
    charger: &ChargerVariant,
    opex: &OpExConfig,
    chaos: &ChaosConfig,
    station: &StationConfig,
    charger_tco: &ChargerTCOBreakdown,
    pack_tco: &PackTCOBreakdown,
) -> CostPerCycleWaterfall {
    let cycles_per_month = derived.cycles_per_month_per_station;
    let total_cycles_per_month = derived.total_network_cycles_per_month;

    // Degenerate network: no cycles, no cost attribution.
    if total_cycles_per_month <= 0.0 {
        return CostPerCycleWaterfall::zero();
    }

    // 1. Battery: degradation amortization + random-failure cost per cycle.
    let degradation = if derived.pack_lifetime_cycles > 0 {
        (pack.unit_cost - pack.second_life_salvage_value) / derived.pack_lifetime_cycles as f64
    } else {
        0.0
    };
    let battery = degradation + pack_tco.failure_cost_per_cycle;

    // 2. Charger: straight from the fleet TCO model.
    let charger_cpc = charger_tco.cost_per_cycle;

    // 3. Electricity: wall energy drawn to refill one pack.
    let energy_drawn_kwh = if charger.charging_efficiency_pct > 0.0 {
        pack.nominal_capacity_kwh / charger.charging_efficiency_pct
    } else {
        0.0
    };
    let electricity = energy_drawn_kwh * opex.electricity_tariff_per_kwh;

    let per_station = |monthly_cost: f64| {
        if cycles_per_month > 0.0 {
            monthly_cost / cycles_per_month
        } else {
            0.0
        }
    };

    // 4–6, 8: fixed monthly station costs spread over that station's cycles.
    let real_estate = per_station(opex.rent_per_month_per_station);
    let maintenance = per_station(
        opex.preventive_maintenance_per_month_per_station
            + opex.corrective_maintenance_per_month_per_station,
    );
    let insurance = per_station(opex.insurance_per_month_per_station);
    let logistics = per_station(opex.logistics_per_month_per_station);

    // 7. Sabotage: expected monthly pack-loss value per station, with
    // docks_per_station standing in for the packs present at a station in
    // steady state. (The monthly engines use the live pack count instead.)
    let sabotage_monthly_loss_per_station =
        chaos.sabotage_pct_per_month * station.docks_per_station as f64 * pack.unit_cost;
    let sabotage = per_station(sabotage_monthly_loss_per_station);

    // 9. Overhead: network-wide, spread over all network cycles.
    let overhead = opex.overhead_per_month / total_cycles_per_month;

    let total = battery
        + charger_cpc
        + electricity
        + real_estate
        + maintenance
        + insurance
        + sabotage
        + logistics
        + overhead;

    CostPerCycleWaterfall {
        battery: round4(battery),
        charger: round4(charger_cpc),
        electricity: round4(electricity),
        real_estate: round4(real_estate),
        maintenance: round4(maintenance),
        insurance: round4(insurance),
        sabotage: round4(sabotage),
        logistics: round4(logistics),
        overhead: round4(overhead),
        total: round4(total),
    }
}

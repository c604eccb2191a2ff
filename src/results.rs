//! Result types — the contract between the engines, the financial overlay,
//! and the serving boundary. Field names are stable; stochastic-only fields
//! are `Option`s and serialize as `null` in static-engine results.

use serde::{Deserialize, Serialize};

use crate::config::EngineKind;

/// Operational constants computed once from vehicle + pack + charger +
/// station inputs. Lifetime = one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedParams {
    /// Energy a driver actually uses from one pack before swapping
    /// = pack_capacity × (1 − range_anxiety_buffer).
    pub energy_per_swap_cycle_per_pack_kwh: f64,
    /// Energy refilled per swap visit = packs_per_vehicle × per-pack energy.
    pub energy_per_swap_cycle_per_vehicle_kwh: f64,
    /// Nameplate total: packs_per_vehicle × pack_capacity.
    pub total_energy_per_vehicle_kwh: f64,
    /// avg_daily_km × Wh/km.
    pub daily_energy_need_wh: f64,
    /// One visit = all packs swapped.
    pub swap_visits_per_vehicle_per_day: f64,
    pub charge_time_minutes: f64,
    pub effective_c_rate: f64,
    pub cycles_per_day_per_dock: f64,
    pub pack_lifetime_cycles: u32,
    pub total_docks: u32,
    pub cycles_per_month_per_station: f64,
    pub total_network_cycles_per_month: f64,
    pub initial_fleet_size: u32,
    /// fleet × packs_per_vehicle — packs riding with vehicles.
    pub packs_on_vehicles: u32,
    /// = total_docks. The packs charging in docks ARE the float inventory,
    /// not an addition to it.
    pub packs_in_docks: u32,
    /// packs_on_vehicles + packs_in_docks.
    pub total_packs: u32,
}

/// Fleet-level charger TCO over the horizon. MTBF is a population statistic:
/// every failure/repair/downtime figure is computed across total_docks, never
/// per slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargerTCOBreakdown {
    pub total_docks: u32,
    /// total_docks × cost_per_slot.
    pub purchase_cost: f64,
    pub scheduled_hours_per_year_per_dock: f64,
    /// hrs/day × 365 × years × total_docks.
    pub fleet_operating_hours: f64,
    /// MTBF / (MTBF + MTTR).
    pub availability: f64,
    /// fleet_operating_hours / MTBF.
    pub expected_failures_over_horizon: f64,
    pub total_repair_cost: f64,
    /// floor(failures / replacement_threshold).
    pub num_replacements: u32,
    pub total_replacement_cost: f64,
    /// failures × MTTR.
    pub total_downtime_hours: f64,
    pub lost_revenue_from_downtime: f64,
    pub spare_inventory_cost: f64,
    pub total_tco: f64,
    /// Scheduled minus downtime, in cycles.
    pub cycles_served_over_horizon: f64,
    pub cost_per_cycle: f64,
}

/// Fleet-level pack *failure* TCO — random failures only, separate from
/// cycle degradation. Purchase is excluded here; it is amortized into the
/// battery degradation component of the CPC waterfall.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackTCOBreakdown {
    pub total_packs: u32,
    pub fleet_operating_hours: f64,
    pub availability: f64,
    pub expected_failures: f64,
    pub total_repair_cost: f64,
    pub num_replacements: u32,
    pub total_replacement_cost: f64,
    pub total_downtime_hours: f64,
    pub lost_revenue_from_downtime: f64,
    pub spare_inventory_cost: f64,
    /// Repair + replacement + lost revenue + spares (no purchase).
    pub total_failure_tco: f64,
    /// Added to the degradation cost to form the CPC battery component.
    pub failure_cost_per_cycle: f64,
}

/// The nine-component cost-per-cycle breakdown, each in currency per cycle.
/// Battery = degradation + random-failure costs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostPerCycleWaterfall {
    pub battery: f64,
    pub charger: f64,
    pub electricity: f64,
    pub real_estate: f64,
    pub maintenance: f64,
    pub insurance: f64,
    pub sabotage: f64,
    pub logistics: f64,
    pub overhead: f64,
    pub total: f64,
}

impl CostPerCycleWaterfall {
    pub fn zero() -> Self {
        CostPerCycleWaterfall {
            battery: 0.0,
            charger: 0.0,
            electricity: 0.0,
            real_estate: 0.0,
            maintenance: 0.0,
            insurance: 0.0,
            sabotage: 0.0,
            logistics: 0.0,
            overhead: 0.0,
            total: 0.0,
        }
    }

    /// Sum of the nine components (not the stored total).
    pub fn component_sum(&self) -> f64 {
        self.battery
            + self.charger
            + self.electricity
            + self.real_estate
            + self.maintenance
            + self.insurance
            + self.sabotage
            + self.logistics
            + self.overhead
    }
}

/// Identity of a batch of packs born together. Created on fleet entry,
/// degraded each month, retired exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortStatus {
    pub cohort_id: u64,
    pub born_month: u32,
    pub pack_count: u32,
    pub current_soh: f64,
    pub cumulative_cycles: u64,
    pub is_retired: bool,
    pub retired_month: Option<u32>,
}

/// One month of simulated operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySnapshot {
    pub month: u32,
    pub fleet_size: u32,
    /// Vehicle visits to stations (1 visit = all packs swapped).
    pub swap_visits: u64,
    /// Pack charge-discharge cycles = swap_visits × packs_per_vehicle.
    pub total_cycles: u64,
    pub revenue: f64,
    pub opex_total: f64,
    pub capex_this_month: f64,
    pub net_cash_flow: f64,
    pub cumulative_cash_flow: f64,
    /// Steady-state reference waterfall — identical every month.
    pub cost_per_cycle: CostPerCycleWaterfall,

    // Stochastic-engine fields; null in static results.
    pub avg_soh: Option<f64>,
    pub packs_retired_this_month: Option<u32>,
    pub packs_replaced_this_month: Option<u32>,
    /// Net lumpy replacement CapEx (gross − salvage). Zero most months,
    /// a spike in retirement months.
    pub replacement_capex_this_month: Option<f64>,
    pub salvage_credit_this_month: Option<f64>,
    pub charger_failures_this_month: Option<u32>,
    /// Swap visits demand exceeded capacity by (diagnostic; revenue not capped).
    pub failure_to_serve_count: Option<u64>,
    pub avg_wait_minutes: Option<f64>,
}

/// Aggregated KPIs for one full run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub charger_variant_name: String,
    pub total_revenue: f64,
    pub total_opex: f64,
    pub total_capex: f64,
    pub total_net_cash_flow: f64,
    pub avg_cost_per_cycle: f64,
    /// None if the run never breaks even.
    pub break_even_month: Option<u32>,

    // Stochastic-only aggregates.
    pub total_packs_retired: Option<u32>,
    pub total_charger_failures: Option<u32>,
    pub mean_soh_at_end: Option<f64>,
    /// Gross replacement CapEx (before salvage credit).
    pub total_replacement_capex: Option<f64>,
    pub total_salvage_credit: Option<f64>,
    pub total_failure_to_serve: Option<u64>,
}

/// P10/P50/P90 aggregate over N seeded stochastic runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloSummary {
    pub num_runs: u32,
    pub ncf_p10: f64,
    pub ncf_p50: f64,
    pub ncf_p90: f64,
    /// Percentiles over runs that break even; None when no run does.
    pub break_even_p10: Option<u32>,
    pub break_even_p50: Option<u32>,
    pub break_even_p90: Option<u32>,
    pub cpc_p10: f64,
    pub cpc_p50: f64,
    pub cpc_p90: f64,
    pub avg_packs_retired: f64,
    pub max_packs_retired: u32,
    pub avg_charger_failures: f64,
    pub avg_failure_to_serve: f64,
    pub max_failure_to_serve: u64,
}

/// Complete output of one engine run (one vehicle + pack + charger combo).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub scenario_id: String,
    pub charger_variant_id: String,
    pub engine: EngineKind,
    /// The seed actually used (reported even when the scenario left it unset).
    pub seed: Option<u64>,
    pub months: Vec<MonthlySnapshot>,
    pub summary: RunSummary,
    pub derived: DerivedParams,
    pub cpc_waterfall: CostPerCycleWaterfall,
    pub charger_tco: ChargerTCOBreakdown,
    pub pack_tco: PackTCOBreakdown,
    /// Per-month cohort snapshots (stochastic engine only).
    pub cohort_history: Option<Vec<Vec<CohortStatus>>>,
    pub monte_carlo: Option<MonteCarloSummary>,

    // Optional financial overlays, attached by the caller.
    pub dcf: Option<crate::dcf::DCFResult>,
    pub debt: Option<crate::dscr::DebtSchedule>,
    pub dscr: Option<crate::dscr::DSCRResult>,
    pub statements: Option<crate::statements::FinancialStatements>,
}

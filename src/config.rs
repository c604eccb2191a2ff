//! Scenario configuration — the immutable input bundle for one run.
//!
//! Every sub-config is a plain struct of scalars with declared ranges.
//! `Scenario::validate` checks every range at construction time and reports
//! the first violation with its dotted path; it never defers a range error
//! to runtime arithmetic.

use serde::{Deserialize, Serialize};

use crate::error::SimError;

fn check(
    cond: bool,
    path: &str,
    value: impl std::fmt::Display,
    constraint: &str,
) -> Result<(), SimError> {
    if cond {
        Ok(())
    } else {
        Err(SimError::validation(path, value, constraint))
    }
}

/// One vehicle configuration, fixed per simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    pub name: String,
    /// Number of swappable packs carried (1–4).
    pub packs_per_vehicle: u32,
    /// Capacity of each pack (kWh).
    pub pack_capacity_kwh: f64,
    /// Expected daily distance traveled (km).
    pub avg_daily_km: f64,
    /// Vehicle efficiency (Wh/km).
    pub energy_consumption_wh_per_km: f64,
    /// Time for one pack swap (minutes).
    pub swap_time_minutes: f64,
    /// SoC at which the driver swaps (0.20 = swap at 20%). A behavioural
    /// assumption, not a hard limit.
    pub range_anxiety_buffer_pct: f64,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        VehicleConfig {
            name: "Heavy 2W".to_string(),
            packs_per_vehicle: 2,
            pack_capacity_kwh: 1.28,
            avg_daily_km: 150.0,
            energy_consumption_wh_per_km: 30.0,
            swap_time_minutes: 0.5,
            range_anxiety_buffer_pct: 0.20,
        }
    }
}

impl VehicleConfig {
    pub fn validate(&self) -> Result<(), SimError> {
        check(
            (1..=4).contains(&self.packs_per_vehicle),
            "vehicle.packs_per_vehicle",
            self.packs_per_vehicle,
            "1..=4",
        )?;
        check(self.pack_capacity_kwh > 0.0, "vehicle.pack_capacity_kwh", self.pack_capacity_kwh, "> 0")?;
        check(self.avg_daily_km > 0.0, "vehicle.avg_daily_km", self.avg_daily_km, "> 0")?;
        check(
            self.energy_consumption_wh_per_km > 0.0,
            "vehicle.energy_consumption_wh_per_km",
            self.energy_consumption_wh_per_km,
            "> 0",
        )?;
        check(self.swap_time_minutes > 0.0, "vehicle.swap_time_minutes", self.swap_time_minutes, "> 0")?;
        check(
            (0.0..=1.0).contains(&self.range_anxiety_buffer_pct),
            "vehicle.range_anxiety_buffer_pct",
            self.range_anxiety_buffer_pct,
            "0..=1",
        )
    }
}

/// One battery pack variant. Degradation model plus the random-failure model
/// (BMS faults, cell swelling, connector damage — separate from degradation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackSpec {
    pub name: String,
    /// Nameplate energy (kWh).
    pub nominal_capacity_kwh: f64,
    /// Cell chemistry tag (LFP, NMC, ...).
    pub chemistry: String,
    /// Purchase price per pack.
    pub unit_cost: f64,
    /// β — SOH loss per cycle (%); 0.05 means 0.05% per cycle.
    pub cycle_degradation_rate_pct: f64,
    /// SOH loss per month when idle (%).
    pub calendar_aging_rate_pct_per_month: f64,
    /// Typical depth of discharge per cycle (0–1].
    pub depth_of_discharge_pct: f64,
    /// SOH at which the pack exits the network.
    pub retirement_soh_pct: f64,
    /// Second-life resale value at retirement.
    pub second_life_salvage_value: f64,
    /// Degradation multiplier for aggressive duty profiles.
    pub aggressiveness_multiplier: f64,
    /// Mean time between random failures (hours) — population-scale, applied
    /// to total pack fleet operating hours.
    pub mtbf_hours: f64,
    /// Mean time to repair (hours).
    pub mttr_hours: f64,
    /// Parts + labor per failure event.
    pub repair_cost_per_event: f64,
    /// After this many repairs the pack is fully replaced.
    pub replacement_threshold: u32,
    pub full_replacement_cost: f64,
    /// Capital tied up in spare packs per station.
    pub spare_packs_cost_per_station: f64,
}

impl Default for PackSpec {
    fn default() -> Self {
        PackSpec {
            name: "1.28 kWh LFP".to_string(),
            nominal_capacity_kwh: 1.28,
            chemistry: "LFP".to_string(),
            unit_cost: 18_000.0,
            cycle_degradation_rate_pct: 0.01,
            calendar_aging_rate_pct_per_month: 0.15,
            depth_of_discharge_pct: 0.95,
            retirement_soh_pct: 0.70,
            second_life_salvage_value: 6_000.0,
            aggressiveness_multiplier: 1.0,
            mtbf_hours: 50_000.0,
            mttr_hours: 4.0,
            repair_cost_per_event: 2_000.0,
            replacement_threshold: 3,
            full_replacement_cost: 15_000.0,
            spare_packs_cost_per_station: 30_000.0,
        }
    }
}

impl PackSpec {
    pub fn validate(&self) -> Result<(), SimError> {
        check(self.nominal_capacity_kwh > 0.0, "pack.nominal_capacity_kwh", self.nominal_capacity_kwh, "> 0")?;
        check(self.unit_cost >= 0.0, "pack.unit_cost", self.unit_cost, ">= 0")?;
        check(
            self.cycle_degradation_rate_pct > 0.0,
            "pack.cycle_degradation_rate_pct",
            self.cycle_degradation_rate_pct,
            "> 0",
        )?;
        check(
            self.calendar_aging_rate_pct_per_month >= 0.0,
            "pack.calendar_aging_rate_pct_per_month",
            self.calendar_aging_rate_pct_per_month,
            ">= 0",
        )?;
        check(
            self.depth_of_discharge_pct > 0.0 && self.depth_of_discharge_pct <= 1.0,
            "pack.depth_of_discharge_pct",
            self.depth_of_discharge_pct,
            "(0, 1]",
        )?;
        check(
            self.retirement_soh_pct > 0.0 && self.retirement_soh_pct <= 1.0,
            "pack.retirement_soh_pct",
            self.retirement_soh_pct,
            "(0, 1]",
        )?;
        check(
            self.second_life_salvage_value >= 0.0,
            "pack.second_life_salvage_value",
            self.second_life_salvage_value,
            ">= 0",
        )?;
        check(
            self.aggressiveness_multiplier >= 0.1,
            "pack.aggressiveness_multiplier",
            self.aggressiveness_multiplier,
            ">= 0.1",
        )?;
        check(self.mtbf_hours > 0.0, "pack.mtbf_hours", self.mtbf_hours, "> 0")?;
        check(self.mttr_hours > 0.0, "pack.mttr_hours", self.mttr_hours, "> 0")?;
        check(self.repair_cost_per_event >= 0.0, "pack.repair_cost_per_event", self.repair_cost_per_event, ">= 0")?;
        check(self.replacement_threshold >= 1, "pack.replacement_threshold", self.replacement_threshold, ">= 1")?;
        check(self.full_replacement_cost >= 0.0, "pack.full_replacement_cost", self.full_replacement_cost, ">= 0")?;
        check(
            self.spare_packs_cost_per_station >= 0.0,
            "pack.spare_packs_cost_per_station",
            self.spare_packs_cost_per_station,
            ">= 0",
        )
    }
}

/// Failure-time distribution for the stochastic charger model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureDistribution {
    /// Constant hazard rate (memoryless, standard MTBF).
    Exponential,
    /// Shape-dependent hazard: β<1 infant mortality, β=1 exponential, β>1 wear-out.
    Weibull,
}

/// One charger option. The simulator compares across variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChargerVariant {
    pub name: String,
    /// Unit CapEx per slot.
    pub purchase_cost_per_slot: f64,
    /// Charging power per slot (W).
    pub rated_power_w: f64,
    /// Wall-to-pack efficiency (0–1].
    pub charging_efficiency_pct: f64,
    /// Mean time between failures (hours) — population-scale. Expected fleet
    /// failures = (hrs/day × 365 × years × total_docks) / MTBF.
    pub mtbf_hours: f64,
    pub mttr_hours: f64,
    pub repair_cost_per_event: f64,
    /// Replace the unit after this many repairs.
    pub replacement_threshold: u32,
    pub full_replacement_cost: f64,
    /// Capital tied up in spares.
    pub spare_inventory_cost: f64,
    pub failure_distribution: FailureDistribution,
    /// Weibull shape β. Only used when failure_distribution = weibull.
    pub weibull_shape: f64,
}

impl Default for ChargerVariant {
    fn default() -> Self {
        ChargerVariant {
            name: "Budget-1.5kW".to_string(),
            purchase_cost_per_slot: 15_000.0,
            rated_power_w: 1_500.0,
            charging_efficiency_pct: 0.97,
            mtbf_hours: 80_000.0,
            mttr_hours: 24.0,
            repair_cost_per_event: 1_000.0,
            replacement_threshold: 3,
            full_replacement_cost: 9_500.0,
            spare_inventory_cost: 10_000.0,
            failure_distribution: FailureDistribution::Exponential,
            weibull_shape: 1.0,
        }
    }
}

impl ChargerVariant {
    pub fn validate(&self, prefix: &str) -> Result<(), SimError> {
        let p = |field: &str| format!("{prefix}.{field}");
        check(self.purchase_cost_per_slot >= 0.0, &p("purchase_cost_per_slot"), self.purchase_cost_per_slot, ">= 0")?;
        check(self.rated_power_w > 0.0, &p("rated_power_w"), self.rated_power_w, "> 0")?;
        check(
            self.charging_efficiency_pct > 0.0 && self.charging_efficiency_pct <= 1.0,
            &p("charging_efficiency_pct"),
            self.charging_efficiency_pct,
            "(0, 1]",
        )?;
        check(self.mtbf_hours > 0.0, &p("mtbf_hours"), self.mtbf_hours, "> 0")?;
        check(self.mttr_hours > 0.0, &p("mttr_hours"), self.mttr_hours, "> 0")?;
        check(self.repair_cost_per_event >= 0.0, &p("repair_cost_per_event"), self.repair_cost_per_event, ">= 0")?;
        check(self.replacement_threshold >= 1, &p("replacement_threshold"), self.replacement_threshold, ">= 1")?;
        check(self.full_replacement_cost >= 0.0, &p("full_replacement_cost"), self.full_replacement_cost, ">= 0")?;
        check(self.spare_inventory_cost >= 0.0, &p("spare_inventory_cost"), self.spare_inventory_cost, ">= 0")?;
        check(self.weibull_shape > 0.0, &p("weibull_shape"), self.weibull_shape, "> 0")
    }
}

/// Station-level infrastructure inputs and network sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    /// Physical housing, cooling, HMI.
    pub cabinet_cost: f64,
    /// Civil works, earthing, pads.
    pub site_prep_cost: f64,
    /// Transformer, cabling.
    pub grid_connection_cost: f64,
    /// One-time station-management software cost (network-wide).
    pub software_cost: f64,
    /// Real-estate deposit.
    pub security_deposit: f64,
    pub num_stations: u32,
    pub docks_per_station: u32,
    pub operating_hours_per_day: f64,
}

impl Default for StationConfig {
    fn default() -> Self {
        StationConfig {
            cabinet_cost: 50_000.0,
            site_prep_cost: 30_000.0,
            grid_connection_cost: 500_000.0,
            software_cost: 100_000.0,
            security_deposit: 20_000.0,
            num_stations: 5,
            docks_per_station: 50,
            operating_hours_per_day: 21.0,
        }
    }
}

impl StationConfig {
    pub fn validate(&self) -> Result<(), SimError> {
        check(self.cabinet_cost >= 0.0, "station.cabinet_cost", self.cabinet_cost, ">= 0")?;
        check(self.site_prep_cost >= 0.0, "station.site_prep_cost", self.site_prep_cost, ">= 0")?;
        check(self.grid_connection_cost >= 0.0, "station.grid_connection_cost", self.grid_connection_cost, ">= 0")?;
        check(self.software_cost >= 0.0, "station.software_cost", self.software_cost, ">= 0")?;
        check(self.security_deposit >= 0.0, "station.security_deposit", self.security_deposit, ">= 0")?;
        check(self.num_stations >= 1, "station.num_stations", self.num_stations, ">= 1")?;
        check(self.docks_per_station >= 1, "station.docks_per_station", self.docks_per_station, ">= 1")?;
        check(
            self.operating_hours_per_day > 0.0 && self.operating_hours_per_day <= 24.0,
            "station.operating_hours_per_day",
            self.operating_hours_per_day,
            "(0, 24]",
        )
    }
}

/// Monthly operating cost inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpExConfig {
    /// Blended tariff per kWh.
    pub electricity_tariff_per_kwh: f64,
    /// Cooling + standby per station.
    pub auxiliary_power_per_month: f64,
    pub rent_per_month_per_station: f64,
    pub preventive_maintenance_per_month_per_station: f64,
    pub corrective_maintenance_per_month_per_station: f64,
    pub insurance_per_month_per_station: f64,
    /// Battery rebalancing cost per station.
    pub logistics_per_month_per_station: f64,
    /// Labor cost per pack swapped (per cycle).
    pub pack_handling_labor_per_swap: f64,
    /// Network-wide admin + software.
    pub overhead_per_month: f64,
}

impl Default for OpExConfig {
    fn default() -> Self {
        OpExConfig {
            electricity_tariff_per_kwh: 6.50,
            auxiliary_power_per_month: 2_000.0,
            rent_per_month_per_station: 15_000.0,
            preventive_maintenance_per_month_per_station: 3_000.0,
            corrective_maintenance_per_month_per_station: 1_000.0,
            insurance_per_month_per_station: 2_000.0,
            logistics_per_month_per_station: 5_000.0,
            pack_handling_labor_per_swap: 2.0,
            overhead_per_month: 20_000.0,
        }
    }
}

impl OpExConfig {
    pub fn validate(&self) -> Result<(), SimError> {
        let fields: [(&str, f64); 9] = [
            ("opex.electricity_tariff_per_kwh", self.electricity_tariff_per_kwh),
            ("opex.auxiliary_power_per_month", self.auxiliary_power_per_month),
            ("opex.rent_per_month_per_station", self.rent_per_month_per_station),
            (
                "opex.preventive_maintenance_per_month_per_station",
                self.preventive_maintenance_per_month_per_station,
            ),
            (
                "opex.corrective_maintenance_per_month_per_station",
                self.corrective_maintenance_per_month_per_station,
            ),
            ("opex.insurance_per_month_per_station", self.insurance_per_month_per_station),
            ("opex.logistics_per_month_per_station", self.logistics_per_month_per_station),
            ("opex.pack_handling_labor_per_swap", self.pack_handling_labor_per_swap),
            ("opex.overhead_per_month", self.overhead_per_month),
        ];
        for (path, value) in fields {
            check(value >= 0.0, path, value, ">= 0")?;
        }
        Ok(())
    }
}

/// Revenue model inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevenueConfig {
    /// Gross price per swap VISIT (per vehicle, not per pack). A 2-pack
    /// vehicle pays this once per visit.
    pub price_per_swap: f64,
    /// Vehicles at month 1.
    pub initial_fleet_size: u32,
    /// New vehicles added each month.
    pub monthly_fleet_additions: u32,
}

impl Default for RevenueConfig {
    fn default() -> Self {
        RevenueConfig {
            price_per_swap: 80.0,
            initial_fleet_size: 200,
            monthly_fleet_additions: 0,
        }
    }
}

impl RevenueConfig {
    pub fn validate(&self) -> Result<(), SimError> {
        check(self.price_per_swap >= 0.0, "revenue.price_per_swap", self.price_per_swap, ">= 0")?;
        check(self.initial_fleet_size >= 1, "revenue.initial_fleet_size", self.initial_fleet_size, ">= 1")
    }
}

/// Risk inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChaosConfig {
    /// Monthly rate of pack loss (theft/vandalism), 0.005 = 0.5%.
    pub sabotage_pct_per_month: f64,
    /// Driver-behaviour multiplier on degradation.
    pub aggressiveness_index: f64,
    /// Charging power de-rating (1.0 = no throttling).
    pub thermal_throttling_factor: f64,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        ChaosConfig {
            sabotage_pct_per_month: 0.005,
            aggressiveness_index: 1.0,
            thermal_throttling_factor: 1.0,
        }
    }
}

impl ChaosConfig {
    pub fn validate(&self) -> Result<(), SimError> {
        check(
            (0.0..=1.0).contains(&self.sabotage_pct_per_month),
            "chaos.sabotage_pct_per_month",
            self.sabotage_pct_per_month,
            "0..=1",
        )?;
        check(
            self.aggressiveness_index >= 0.1,
            "chaos.aggressiveness_index",
            self.aggressiveness_index,
            ">= 0.1",
        )?;
        check(
            (0.1..=2.0).contains(&self.thermal_throttling_factor),
            "chaos.thermal_throttling_factor",
            self.thermal_throttling_factor,
            "0.1..=2",
        )
    }
}

/// Demand distribution for the stochastic engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandDistribution {
    /// Variance = mean, integer-valued; `volatility` is ignored.
    Poisson,
    /// Heavier tails with CoV = `volatility`.
    Gamma,
    /// Two-peak normal mixture (e.g. personal vs commercial riders).
    Bimodal,
}

/// Stochastic demand shaping. Ignored entirely by the static engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemandConfig {
    pub distribution: DemandDistribution,
    /// Coefficient of variation for the gamma distribution. 0 = deterministic.
    pub volatility: f64,
    /// Multiplier on weekend demand (0.6 = 40% drop).
    pub weekend_factor: f64,
    /// Amplitude of the 12-month sinusoidal swing (0.2 = ±20%).
    pub seasonal_amplitude: f64,
    /// Relative weight of the first bimodal peak.
    pub bimodal_peak_ratio: f64,
    /// Separation between bimodal peaks in units of mean demand.
    pub bimodal_peak_separation: f64,
    /// Standard deviation of each bimodal peak as a ratio of the mean.
    pub bimodal_std_ratio: f64,
}

impl Default for DemandConfig {
    fn default() -> Self {
        DemandConfig {
            distribution: DemandDistribution::Poisson,
            volatility: 0.15,
            weekend_factor: 0.6,
            seasonal_amplitude: 0.0,
            bimodal_peak_ratio: 0.6,
            bimodal_peak_separation: 0.5,
            bimodal_std_ratio: 0.15,
        }
    }
}

impl DemandConfig {
    pub fn validate(&self) -> Result<(), SimError> {
        check((0.0..=2.0).contains(&self.volatility), "demand.volatility", self.volatility, "0..=2")?;
        check(
            (0.0..=2.0).contains(&self.weekend_factor),
            "demand.weekend_factor",
            self.weekend_factor,
            "0..=2",
        )?;
        check(
            (0.0..=1.0).contains(&self.seasonal_amplitude),
            "demand.seasonal_amplitude",
            self.seasonal_amplitude,
            "0..=1",
        )?;
        check(
            (0.1..=0.9).contains(&self.bimodal_peak_ratio),
            "demand.bimodal_peak_ratio",
            self.bimodal_peak_ratio,
            "0.1..=0.9",
        )?;
        check(
            (0.1..=2.0).contains(&self.bimodal_peak_separation),
            "demand.bimodal_peak_separation",
            self.bimodal_peak_separation,
            "0.1..=2",
        )?;
        check(
            (0.05..=0.5).contains(&self.bimodal_std_ratio),
            "demand.bimodal_std_ratio",
            self.bimodal_std_ratio,
            "0.05..=0.5",
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepreciationMethod {
    StraightLine,
    /// Written-down value (declining balance).
    Wdv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalValueMethod {
    /// Battery second-life + charger residual at horizon end.
    Salvage,
    /// Perpetuity: NCF × (1+g) / (r−g).
    GordonGrowth,
    None,
}

/// Debt structure, depreciation, tax, and terminal-value assumptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinanceConfig {
    /// Portion of initial CapEx funded by debt (0 = all equity).
    pub debt_pct_of_capex: f64,
    pub interest_rate_annual: f64,
    pub loan_tenor_months: u32,
    /// Interest-only period before principal repayment starts.
    pub grace_period_months: u32,
    pub depreciation_method: DepreciationMethod,
    /// Accounting useful life of battery + charger assets.
    pub asset_useful_life_months: u32,
    /// Annual WDV rate (only used when method = wdv).
    pub wdv_rate_annual: f64,
    pub tax_rate: f64,
    pub terminal_value_method: TerminalValueMethod,
    /// g in NCF × (1+g)/(r−g); ignored unless method = gordon_growth.
    pub terminal_growth_rate: f64,
    /// Months with DSCR below this are covenant breaches.
    pub dscr_covenant_threshold: f64,
}

impl Default for FinanceConfig {
    fn default() -> Self {
        FinanceConfig {
            debt_pct_of_capex: 0.70,
            interest_rate_annual: 0.12,
            loan_tenor_months: 60,
            grace_period_months: 6,
            depreciation_method: DepreciationMethod::StraightLine,
            asset_useful_life_months: 60,
            wdv_rate_annual: 0.25,
            tax_rate: 0.25,
            terminal_value_method: TerminalValueMethod::Salvage,
            terminal_growth_rate: 0.02,
            dscr_covenant_threshold: 1.20,
        }
    }
}

impl FinanceConfig {
    pub fn validate(&self) -> Result<(), SimError> {
        check(
            (0.0..=1.0).contains(&self.debt_pct_of_capex),
            "finance.debt_pct_of_capex",
            self.debt_pct_of_capex,
            "0..=1",
        )?;
        check(
            (0.0..=0.5).contains(&self.interest_rate_annual),
            "finance.interest_rate_annual",
            self.interest_rate_annual,
            "0..=0.5",
        )?;
        check(
            (1..=360).contains(&self.loan_tenor_months),
            "finance.loan_tenor_months",
            self.loan_tenor_months,
            "1..=360",
        )?;
        check(
            (1..=360).contains(&self.asset_useful_life_months),
            "finance.asset_useful_life_months",
            self.asset_useful_life_months,
            "1..=360",
        )?;
        check(
            (0.0..=1.0).contains(&self.wdv_rate_annual),
            "finance.wdv_rate_annual",
            self.wdv_rate_annual,
            "0..=1",
        )?;
        check((0.0..=0.6).contains(&self.tax_rate), "finance.tax_rate", self.tax_rate, "0..=0.6")?;
        check(
            (0.0..=0.1).contains(&self.terminal_growth_rate),
            "finance.terminal_growth_rate",
            self.terminal_growth_rate,
            "0..=0.1",
        )?;
        check(
            self.dscr_covenant_threshold >= 0.0,
            "finance.dscr_covenant_threshold",
            self.dscr_covenant_threshold,
            ">= 0",
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Deterministic monthly loop with uniformly-spread failure costs.
    Static,
    /// Noisy demand, cohort degradation, per-dock failures; optional Monte Carlo.
    Stochastic,
}

/// Run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub horizon_months: u32,
    pub discount_rate_annual: f64,
    pub engine: EngineKind,
    /// RNG seed for reproducible stochastic runs. None selects the default
    /// seed, which is reported in the result.
    pub random_seed: Option<u64>,
    /// Monte-Carlo iterations when engine = stochastic. Ignored in static mode.
    pub monte_carlo_runs: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            horizon_months: 60,
            discount_rate_annual: 0.12,
            engine: EngineKind::Static,
            random_seed: None,
            monte_carlo_runs: 100,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), SimError> {
        check(self.horizon_months >= 1, "simulation.horizon_months", self.horizon_months, ">= 1")?;
        check(
            self.discount_rate_annual >= 0.0,
            "simulation.discount_rate_annual",
            self.discount_rate_annual,
            ">= 0",
        )?;
        check(
            (1..=10_000).contains(&self.monte_carlo_runs),
            "simulation.monte_carlo_runs",
            self.monte_carlo_runs,
            "1..=10000",
        )
    }
}

/// Complete input bundle for one simulation run. Immutable once validated;
/// cloning yields an independent deep copy for sweeps and optimizer trials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub vehicle: VehicleConfig,
    pub pack: PackSpec,
    pub charger_variants: Vec<ChargerVariant>,
    pub station: StationConfig,
    pub opex: OpExConfig,
    pub revenue: RevenueConfig,
    pub chaos: ChaosConfig,
    pub demand: DemandConfig,
    pub finance: FinanceConfig,
    pub simulation: SimulationConfig,
}

impl Default for Scenario {
    fn default() -> Self {
        Scenario {
            vehicle: VehicleConfig::default(),
            pack: PackSpec::default(),
            charger_variants: vec![ChargerVariant::default()],
            station: StationConfig::default(),
            opex: OpExConfig::default(),
            revenue: RevenueConfig::default(),
            chaos: ChaosConfig::default(),
            demand: DemandConfig::default(),
            finance: FinanceConfig::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl Scenario {
    /// Validate every field range. Returns the first violation with its
    /// dotted path and offending value.
    pub fn validate(&self) -> Result<(), SimError> {
        self.vehicle.validate()?;
        self.pack.validate()?;
        for (i, charger) in self.charger_variants.iter().enumerate() {
            charger.validate(&format!("charger_variants[{i}]"))?;
        }
        self.station.validate()?;
        self.opex.validate()?;
        self.revenue.validate()?;
        self.chaos.validate()?;
        self.demand.validate()?;
        self.finance.validate()?;
        self.simulation.validate()
    }

    /// Parse and validate a scenario from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Scenario, SimError> {
        let mut scenario: Scenario = toml::from_str(text)?;
        if scenario.charger_variants.is_empty() {
            scenario.charger_variants.push(ChargerVariant::default());
        }
        scenario.validate()?;
        Ok(scenario)
    }

    /// Load a scenario from a TOML file.
    pub fn from_toml_path(path: &std::path::Path) -> Result<Scenario, SimError> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }
}

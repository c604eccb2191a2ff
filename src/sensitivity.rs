//! One-at-a-time sensitivity analysis (tornado chart).
//!
//! Each sweep deep-copies the scenario, overrides one parameter via its
//! dotted path, forces the static engine for speed, and measures the NPV at
//! the low and high ends. Bars come back sorted by total swing.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{ChargerVariant, EngineKind, Scenario};
use crate::dcf::build_dcf_table;
use crate::error::{CancelToken, SimError};
use crate::orchestrator::run_engine_cancellable;
use crate::util::{round2, round4};

/// One parameter sweep: vary `path` by `low_pct`/`high_pct` around its base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepSpec {
    pub name: String,
    /// Dotted path into the scenario (or `charger.*` for the variant).
    pub path: String,
    pub low_pct: f64,
    pub high_pct: f64,
}

impl SweepSpec {
    fn new(name: &str, path: &str, low_pct: f64, high_pct: f64) -> Self {
        SweepSpec {
            name: name.to_string(),
            path: path.to_string(),
            low_pct,
            high_pct,
        }
    }
}

/// One bar in the tornado chart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TornadoBar {
    pub param_name: String,
    pub param_path: String,
    pub base_value: f64,
    pub low_value: f64,
    pub high_value: f64,
    pub npv_at_low: f64,
    pub npv_at_high: f64,
    /// |npv_at_high − npv_at_low| — the full swing width.
    pub delta_npv: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityResult {
    pub base_npv: f64,
    /// Sorted by delta_npv, largest swing first.
    pub bars: Vec<TornadoBar>,
}

pub fn default_sweeps() -> Vec<SweepSpec> {
    vec![
        SweepSpec::new("Pack unit cost", "pack.unit_cost", -0.15, 0.15),
        SweepSpec::new("Charger MTBF", "charger.mtbf_hours", -0.20, 0.20),
        SweepSpec::new("Electricity tariff", "opex.electricity_tariff_per_kwh", -0.10, 0.10),
        SweepSpec::new("Swap price", "revenue.price_per_swap", -0.10, 0.10),
        SweepSpec::new("Degradation rate", "pack.cycle_degradation_rate_pct", -0.20, 0.20),
        SweepSpec::new("Initial fleet size", "revenue.initial_fleet_size", -0.25, 0.25),
    ]
}

/// Read a sweepable parameter by dotted path. None for unknown paths.
pub(crate) fn get_param(scenario: &Scenario, charger: &ChargerVariant, path: &str) -> Option<f64> {
    Some(match path {
        "pack.unit_cost" => scenario.pack.unit_cost,
        "pack.cycle_degradation_rate_pct" => scenario.pack.cycle_degradation_rate_pct,
        "pack.calendar_aging_rate_pct_per_month" => {
            scenario.pack.calendar_aging_rate_pct_per_month
        }
        "pack.second_life_salvage_value" => scenario.pack.second_life_salvage_value,
        "pack.mtbf_hours" => scenario.pack.mtbf_hours,
        "charger.mtbf_hours" => charger.mtbf_hours,
        "charger.purchase_cost_per_slot" => charger.purchase_cost_per_slot,
        "charger.mttr_hours" => charger.mttr_hours,
        "opex.electricity_tariff_per_kwh" => scenario.opex.electricity_tariff_per_kwh,
        "opex.rent_per_month_per_station" => scenario.opex.rent_per_month_per_station,
        "opex.overhead_per_month" => scenario.opex.overhead_per_month,
        "revenue.price_per_swap" => scenario.revenue.price_per_swap,
        "revenue.initial_fleet_size" => scenario.revenue.initial_fleet_size as f64,
        "revenue.monthly_fleet_additions" => scenario.revenue.monthly_fleet_additions as f64,
        "chaos.sabotage_pct_per_month" => scenario.chaos.sabotage_pct_per_month,
        "chaos.aggressiveness_index" => scenario.chaos.aggressiveness_index,
        _ => return None,
    })
}

/// Write a sweepable parameter by dotted path. Integer-typed fields are
/// rounded (and floored at their minimum) first. Unknown paths are ignored.
pub(crate) fn apply_param(
    scenario: &mut Scenario,
    charger: &mut ChargerVariant,
    path: &str,
    value: f64,
) {
    match path {
        "pack.unit_cost" => scenario.pack.unit_cost = value,
        "pack.cycle_degradation_rate_pct" => scenario.pack.cycle_degradation_rate_pct = value,
        "pack.calendar_aging_rate_pct_per_month" => {
            scenario.pack.calendar_aging_rate_pct_per_month = value
        }
        "pack.second_life_salvage_value" => scenario.pack.second_life_salvage_value = value,
        "pack.mtbf_hours" => scenario.pack.mtbf_hours = value,
        "charger.mtbf_hours" => charger.mtbf_hours = value,
        "charger.purchase_cost_per_slot" => charger.purchase_cost_per_slot = value,
        "charger.mttr_hours" => charger.mttr_hours = value,
        "opex.electricity_tariff_per_kwh" => scenario.opex.electricity_tariff_per_kwh = value,
        "opex.rent_per_month_per_station" => scenario.opex.rent_per_month_per_station = value,
        "opex.overhead_per_month" => scenario.opex.overhead_per_month = value,
        "revenue.price_per_swap" => scenario.revenue.price_per_swap = value,
        "revenue.initial_fleet_size" => {
            scenario.revenue.initial_fleet_size = value.round().max(1.0) as u32
        }
        "revenue.monthly_fleet_additions" => {
            scenario.revenue.monthly_fleet_additions = value.round().max(0.0) as u32
        }
        "chaos.sabotage_pct_per_month" => scenario.chaos.sabotage_pct_per_month = value,
        "chaos.aggressiveness_index" => scenario.chaos.aggressiveness_index = value,
        _ => {}
    }
}

/// Run the engine and compute the NPV (salvage terminal base = full pack
/// inventory at second-life value).
fn run_npv(
    scenario: &Scenario,
    charger: &ChargerVariant,
    cancel: &CancelToken,
) -> Result<f64, SimError> {
    let result = run_engine_cancellable(scenario, charger, cancel)?;
    let salvage = result.derived.total_packs as f64 * scenario.pack.second_life_salvage_value;
    let dcf = build_dcf_table(
        &result.months,
        &scenario.finance,
        scenario.simulation.discount_rate_annual,
        salvage,
    );
    Ok(dcf.npv)
}

/// Run the tornado analysis for one charger variant. `sweeps` = None uses
/// the default set. Sweeps evaluate in parallel; each owns its scenario copy.
pub fn run_sensitivity(
    scenario: &Scenario,
    charger: &ChargerVariant,
    sweeps: Option<&[SweepSpec]>,
    cancel: &CancelToken,
) -> Result<SensitivityResult, SimError> {
    let default;
    let sweeps = match sweeps {
        Some(s) => s,
        None => {
            default = default_sweeps();
            default.as_slice()
        }
    };

    // Sensitivity always runs the static engine: monotone, fast, and free of
    // seed noise that would pollute the bars.
    let mut base_scenario = scenario.clone();
    base_scenario.simulation.engine = EngineKind::Static;
    base_scenario.simulation.monte_carlo_runs = 1;

    let base_npv = run_npv(&base_scenario, charger, cancel)?;

    let bars: Vec<Option<Result<TornadoBar, SimError>>> = sweeps
        .par_iter()
        .map(|sweep| {
            if cancel.is_cancelled() {
                return None;
            }
            let base_val = get_param(&base_scenario, charger, &sweep.path)?;
            let low_val = base_val * (1.0 + sweep.low_pct);
            let high_val = base_val * (1.0 + sweep.high_pct);

            let eval = |value: f64| -> Result<f64, SimError> {
                let mut trial = base_scenario.clone();
                let mut trial_charger = charger.clone();
                apply_param(&mut trial, &mut trial_charger, &sweep.path, value);
                run_npv(&trial, &trial_charger, cancel)
            };

            let npv_low = match eval(low_val) {
                Ok(v) => v,
                Err(e) => return Some(Err(e)),
            };
            let npv_high = match eval(high_val) {
                Ok(v) => v,
                Err(e) => return Some(Err(e)),
            };

            Some(Ok(TornadoBar {
                param_name: sweep.name.clone(),
                param_path: sweep.path.clone(),
                base_value: round4(base_val),
                low_value: round4(low_val),
                high_value: round4(high_val),
                npv_at_low: round2(npv_low),
                npv_at_high: round2(npv_high),
                delta_npv: round2((npv_high - npv_low).abs()),
            }))
        })
        .collect();

    if cancel.is_cancelled() {
        return Err(SimError::Cancelled);
    }

    let mut out = Vec::new();
    for bar in bars.into_iter().flatten() {
        out.push(bar?);
    }
    out.sort_by(|a, b| {
        b.delta_npv
            .partial_cmp(&a.delta_npv)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Ok(SensitivityResult {
        base_npv: round2(base_npv),
        bars: out,
    })
}

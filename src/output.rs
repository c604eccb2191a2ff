//! File outputs: monthly snapshot CSV, result JSON, scenario TOML snapshot,
//! tornado CSV, debt schedule CSV.

use std::path::Path;

use crate::config::Scenario;
use crate::dscr::DebtSchedule;
use crate::error::SimError;
use crate::results::SimulationResult;
use crate::sensitivity::SensitivityResult;

fn ensure_parent(path: &Path) -> Result<(), SimError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Export the monthly snapshots to CSV.
pub fn save_months_csv(result: &SimulationResult, path: &Path) -> Result<(), SimError> {
    ensure_parent(path)?;
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record([
        "month",
        "fleet_size",
        "swap_visits",
        "total_cycles",
        "revenue",
        "opex_total",
        "capex_this_month",
        "net_cash_flow",
        "cumulative_cash_flow",
        "avg_soh",
        "packs_retired",
        "packs_replaced",
        "replacement_capex",
        "salvage_credit",
        "charger_failures",
        "failure_to_serve",
        "avg_wait_minutes",
    ])?;

    let opt_f64 = |v: Option<f64>| v.map(|x| format!("{x:.2}")).unwrap_or_default();
    let opt_soh = |v: Option<f64>| v.map(|x| format!("{x:.6}")).unwrap_or_default();
    let opt_u32 = |v: Option<u32>| v.map(|x| x.to_string()).unwrap_or_default();
    let opt_u64 = |v: Option<u64>| v.map(|x| x.to_string()).unwrap_or_default();

    for m in &result.months {
        wtr.write_record(&[
            m.month.to_string(),
            m.fleet_size.to_string(),
            m.swap_visits.to_string(),
            m.total_cycles.to_string(),
            format!("{:.2}", m.revenue),
            format!("{:.2}", m.opex_total),
            format!("{:.2}", m.capex_this_month),
            format!("{:.2}", m.net_cash_flow),
            format!("{:.2}", m.cumulative_cash_flow),
            opt_soh(m.avg_soh),
            opt_u32(m.packs_retired_this_month),
            opt_u32(m.packs_replaced_this_month),
            opt_f64(m.replacement_capex_this_month),
            opt_f64(m.salvage_credit_this_month),
            opt_u32(m.charger_failures_this_month),
            opt_u64(m.failure_to_serve_count),
            opt_f64(m.avg_wait_minutes),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Save the full result envelope as pretty JSON.
pub fn save_result_json(result: &SimulationResult, path: &Path) -> Result<(), SimError> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(result)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Snapshot the scenario configuration to TOML.
pub fn save_scenario_toml(scenario: &Scenario, path: &Path) -> Result<(), SimError> {
    ensure_parent(path)?;
    let text = toml::to_string_pretty(scenario)?;
    std::fs::write(path, text)?;
    Ok(())
}

/// Save tornado bars to CSV, sorted as computed (largest swing first).
pub fn save_tornado_csv(sensitivity: &SensitivityResult, path: &Path) -> Result<(), SimError> {
    ensure_parent(path)?;
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record([
        "param_name",
        "param_path",
        "base_value",
        "low_value",
        "high_value",
        "npv_at_low",
        "npv_at_high",
        "delta_npv",
    ])?;
    for bar in &sensitivity.bars {
        wtr.write_record(&[
            bar.param_name.clone(),
            bar.param_path.clone(),
            format!("{:.4}", bar.base_value),
            format!("{:.4}", bar.low_value),
            format!("{:.4}", bar.high_value),
            format!("{:.2}", bar.npv_at_low),
            format!("{:.2}", bar.npv_at_high),
            format!("{:.2}", bar.delta_npv),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Save the debt amortization schedule to CSV.
pub fn save_debt_csv(debt: &DebtSchedule, path: &Path) -> Result<(), SimError> {
    ensure_parent(path)?;
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record([
        "month",
        "opening_balance",
        "interest",
        "principal",
        "emi",
        "closing_balance",
    ])?;
    for row in &debt.rows {
        wtr.write_record(&[
            row.month.to_string(),
            format!("{:.2}", row.opening_balance),
            format!("{:.2}", row.interest),
            format!("{:.2}", row.principal),
            format!("{:.2}", row.emi),
            format!("{:.2}", row.closing_balance),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Save all outputs for one run to a directory.
pub fn save_all(
    result: &SimulationResult,
    scenario: &Scenario,
    output_dir: &Path,
) -> Result<(), SimError> {
    std::fs::create_dir_all(output_dir)?;
    save_months_csv(result, &output_dir.join("months.csv"))?;
    save_result_json(result, &output_dir.join("result.json"))?;
    save_scenario_toml(scenario, &output_dir.join("scenario.toml"))?;
    if let Some(debt) = &result.debt {
        save_debt_csv(debt, &output_dir.join("debt_schedule.csv"))?;
    }
    Ok(())
}

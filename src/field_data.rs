//! Field-data integration: CSV ingestion, variance analysis, parameter
//! auto-tuning, and charger recommendation alerts.
//!
//! The ground-truth loop:
//!   field CSV → FieldDataSet → variance report → auto-tune → re-run → alert

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{ChaosConfig, ChargerVariant, EngineKind, PackSpec, Scenario, StationConfig};
use crate::dcf::build_dcf_table;
use crate::error::SimError;
use crate::orchestrator::run_engine;
use crate::sensitivity::apply_param;
use crate::util::{median, round2, round4, round6};

// ── Ingested records ────────────────────────────────────────────────────

/// One row of BMS telemetry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BMSRecord {
    pub pack_id: String,
    /// 1-indexed month relative to deployment start.
    pub month: u32,
    /// Measured state-of-health (0–1).
    pub soh: f64,
    pub cumulative_cycles: u64,
    pub temperature_avg_c: Option<f64>,
}

/// One row of a charger failure log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargerFailureRecord {
    pub dock_id: String,
    /// None = variant unknown (single-variant fleet).
    pub charger_variant_name: Option<String>,
    pub failure_month: u32,
    pub downtime_hours: f64,
    pub repair_cost: Option<f64>,
    pub was_replaced: bool,
}

/// All ingested field data for one analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldDataSet {
    pub bms_records: Vec<BMSRecord>,
    pub charger_failure_records: Vec<ChargerFailureRecord>,
}

impl FieldDataSet {
    pub fn num_unique_packs(&self) -> usize {
        self.bms_records
            .iter()
            .map(|r| r.pack_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn num_unique_docks(&self) -> usize {
        self.charger_failure_records
            .iter()
            .map(|r| r.dock_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn max_month(&self) -> u32 {
        let bms_max = self.bms_records.iter().map(|r| r.month).max().unwrap_or(0);
        let chg_max = self
            .charger_failure_records
            .iter()
            .map(|r| r.failure_month)
            .max()
            .unwrap_or(0);
        bms_max.max(chg_max)
    }
}

// ── CSV ingestion ───────────────────────────────────────────────────────

fn column_index(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim() == name)
}

fn field<'a>(record: &'a csv::StringRecord, idx: Option<usize>) -> Option<&'a str> {
    let value = record.get(idx?)?.trim();
    if value.is_empty() || value == "NA" || value == "null" {
        None
    } else {
        Some(value)
    }
}

/// Parse BMS telemetry CSV. Required columns (order-free): pack_id, month,
/// soh, cumulative_cycles. Optional: temperature_avg_c. Malformed rows are
/// silently skipped.
pub fn ingest_bms_csv<R: Read>(source: R) -> Result<Vec<BMSRecord>, SimError> {
    let mut reader = csv::Reader::from_reader(source);
    let headers = reader.headers()?.clone();
    let idx_pack = column_index(&headers, "pack_id");
    let idx_month = column_index(&headers, "month");
    let idx_soh = column_index(&headers, "soh");
    let idx_cycles = column_index(&headers, "cumulative_cycles");
    let idx_temp = column_index(&headers, "temperature_avg_c");

    let mut records = Vec::new();
    for row in reader.records() {
        let row = match row {
            Ok(r) => r,
            Err(_) => continue,
        };
        let parsed = (|| -> Option<BMSRecord> {
            let pack_id = field(&row, idx_pack)?.to_string();
            let month: u32 = field(&row, idx_month)?.parse().ok()?;
            let soh: f64 = field(&row, idx_soh)?.parse().ok()?;
            let cumulative_cycles: u64 = field(&row, idx_cycles)?.parse().ok()?;
            if month < 1 || !(0.0..=1.0).contains(&soh) {
                return None;
            }
            let temperature_avg_c = field(&row, idx_temp).and_then(|v| v.parse().ok());
            Some(BMSRecord {
                pack_id,
                month,
                soh,
                cumulative_cycles,
                temperature_avg_c,
            })
        })();
        if let Some(rec) = parsed {
            records.push(rec);
        }
    }
    Ok(records)
}

pub fn ingest_bms_csv_str(text: &str) -> Result<Vec<BMSRecord>, SimError> {
    ingest_bms_csv(text.as_bytes())
}

pub fn ingest_bms_csv_path(path: &Path) -> Result<Vec<BMSRecord>, SimError> {
    ingest_bms_csv(std::fs::File::open(path)?)
}

/// Parse a charger failure log CSV. Required columns: dock_id,
/// failure_month, downtime_hours. Optional: charger_variant_name,
/// repair_cost, was_replaced (truthy: "true", "1", "yes").
pub fn ingest_charger_csv<R: Read>(source: R) -> Result<Vec<ChargerFailureRecord>, SimError> {
    let mut reader = csv::Reader::from_reader(source);
    let headers = reader.headers()?.clone();
    let idx_dock = column_index(&headers, "dock_id");
    let idx_variant = column_index(&headers, "charger_variant_name");
    let idx_month = column_index(&headers, "failure_month");
    let idx_down = column_index(&headers, "downtime_hours");
    let idx_cost = column_index(&headers, "repair_cost");
    let idx_replaced = column_index(&headers, "was_replaced");

    let mut records = Vec::new();
    for row in reader.records() {
        let row = match row {
            Ok(r) => r,
            Err(_) => continue,
        };
        let parsed = (|| -> Option<ChargerFailureRecord> {
            let dock_id = field(&row, idx_dock)?.to_string();
            let failure_month: u32 = field(&row, idx_month)?.parse().ok()?;
            let downtime_hours: f64 = field(&row, idx_down)?.parse().ok()?;
            if failure_month < 1 || downtime_hours < 0.0 {
                return None;
            }
            let charger_variant_name = field(&row, idx_variant).map(str::to_string);
            let repair_cost = field(&row, idx_cost).and_then(|v| v.parse().ok());
            let was_replaced = field(&row, idx_replaced)
                .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
                .unwrap_or(false);
            Some(ChargerFailureRecord {
                dock_id,
                charger_variant_name,
                failure_month,
                downtime_hours,
                repair_cost,
                was_replaced,
            })
        })();
        if let Some(rec) = parsed {
            records.push(rec);
        }
    }
    Ok(records)
}

pub fn ingest_charger_csv_str(text: &str) -> Result<Vec<ChargerFailureRecord>, SimError> {
    ingest_charger_csv(text.as_bytes())
}

pub fn ingest_charger_csv_path(path: &Path) -> Result<Vec<ChargerFailureRecord>, SimError> {
    ingest_charger_csv(std::fs::File::open(path)?)
}

// ── Variance analysis ───────────────────────────────────────────────────

/// Projected vs actual SOH for one month of field data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradationVariance {
    pub month: u32,
    pub projected_avg_soh: f64,
    pub actual_avg_soh: f64,
    /// (actual − projected) / projected × 100. Negative = degrading faster.
    pub variance_pct: f64,
    pub num_packs_sampled: usize,
}

/// Projected vs actual MTBF for one charger variant (None = aggregate).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MTBFVariance {
    pub charger_variant_name: Option<String>,
    pub projected_mtbf_hours: f64,
    pub actual_mtbf_hours: f64,
    /// Negative = failing more often than spec.
    pub variance_pct: f64,
    pub total_operating_hours: f64,
    pub total_failures: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VarianceReport {
    pub degradation_monthly: Vec<DegradationVariance>,
    pub mtbf_variance: Vec<MTBFVariance>,
    pub overall_soh_drift_pct: Option<f64>,
    pub overall_mtbf_drift_pct: Option<f64>,
}

/// Compare model projections against field observations.
pub fn compute_variance_report(
    field_data: &FieldDataSet,
    pack: &PackSpec,
    charger: &ChargerVariant,
    chaos: Option<&ChaosConfig>,
    station: Option<&StationConfig>,
) -> VarianceReport {
    let degradation_monthly = degradation_variance(field_data, pack, chaos);
    let mtbf_variance = mtbf_variance(field_data, charger, station);

    let overall_soh_drift_pct = if degradation_monthly.is_empty() {
        None
    } else {
        let avg = degradation_monthly.iter().map(|d| d.variance_pct).sum::<f64>()
            / degradation_monthly.len() as f64;
        Some(round4(avg))
    };
    let overall_mtbf_drift_pct = if mtbf_variance.is_empty() {
        None
    } else {
        let avg =
            mtbf_variance.iter().map(|m| m.variance_pct).sum::<f64>() / mtbf_variance.len() as f64;
        Some(round4(avg))
    };

    VarianceReport {
        degradation_monthly,
        mtbf_variance,
        overall_soh_drift_pct,
        overall_mtbf_drift_pct,
    }
}

fn degradation_variance(
    field_data: &FieldDataSet,
    pack: &PackSpec,
    chaos: Option<&ChaosConfig>,
) -> Vec<DegradationVariance> {
    if field_data.bms_records.is_empty() {
        return Vec::new();
    }

    let aggressiveness = chaos.map(|c| c.aggressiveness_index).unwrap_or(1.0);
    let beta_per_cycle = (pack.cycle_degradation_rate_pct / 100.0) * aggressiveness;
    let calendar_per_month = pack.calendar_aging_rate_pct_per_month / 100.0;

    let mut by_month: BTreeMap<u32, Vec<&BMSRecord>> = BTreeMap::new();
    for rec in &field_data.bms_records {
        by_month.entry(rec.month).or_default().push(rec);
    }

    by_month
        .into_iter()
        .map(|(month, records)| {
            let n = records.len() as f64;
            let actual_avg_soh = records.iter().map(|r| r.soh).sum::<f64>() / n;
            let avg_cycles =
                records.iter().map(|r| r.cumulative_cycles as f64).sum::<f64>() / n;

            // Model projection: SOH = 1 − β·cycles − calendar·months.
            let projected = (1.0 - beta_per_cycle * avg_cycles - calendar_per_month * month as f64)
                .max(0.0);
            let variance_pct = if projected > 0.0 {
                (actual_avg_soh - projected) / projected * 100.0
            } else {
                0.0
            };

            DegradationVariance {
                month,
                projected_avg_soh: round6(projected),
                actual_avg_soh: round6(actual_avg_soh),
                variance_pct: round4(variance_pct),
                num_packs_sampled: records.len(),
            }
        })
        .collect()
}

fn mtbf_variance(
    field_data: &FieldDataSet,
    charger: &ChargerVariant,
    station: Option<&StationConfig>,
) -> Vec<MTBFVariance> {
    if field_data.charger_failure_records.is_empty() {
        return Vec::new();
    }

    let mut by_variant: BTreeMap<Option<String>, Vec<&ChargerFailureRecord>> = BTreeMap::new();
    for rec in &field_data.charger_failure_records {
        by_variant
            .entry(rec.charger_variant_name.clone())
            .or_default()
            .push(rec);
    }

    let operating_hours_per_day = station.map(|s| s.operating_hours_per_day).unwrap_or(18.0);

    by_variant
        .into_iter()
        .filter(|(_, failures)| !failures.is_empty())
        .map(|(variant_name, failures)| {
            let total_failures = failures.len();
            let max_month = failures.iter().map(|f| f.failure_month).max().unwrap_or(0);
            let unique_docks = failures
                .iter()
                .map(|f| f.dock_id.as_str())
                .collect::<HashSet<_>>()
                .len();

            let total_operating_hours =
                unique_docks as f64 * operating_hours_per_day * 30.0 * max_month as f64;
            let actual_mtbf = total_operating_hours / total_failures as f64;

            let projected = charger.mtbf_hours;
            let variance_pct = if projected > 0.0 {
                (actual_mtbf - projected) / projected * 100.0
            } else {
                0.0
            };

            MTBFVariance {
                charger_variant_name: variant_name,
                projected_mtbf_hours: projected,
                actual_mtbf_hours: round2(actual_mtbf),
                variance_pct: round4(variance_pct),
                total_operating_hours: round2(total_operating_hours),
                total_failures,
            }
        })
        .collect()
}

// ── Auto-tuning ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TunedParameter {
    /// Dotted path into the scenario (e.g. "pack.cycle_degradation_rate_pct").
    pub param_path: String,
    pub original_value: f64,
    pub tuned_value: f64,
    pub change_pct: f64,
    /// Sample-size confidence (0–1).
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutoTuneResult {
    pub parameters: Vec<TunedParameter>,
    pub data_months_used: u32,
    pub num_packs_used: usize,
    pub num_failure_events_used: usize,
}

/// Full-confidence sample sizes: 50 packs for SOH, 10 failures for MTBF.
const FULL_CONFIDENCE_PACKS: f64 = 50.0;
const FULL_CONFIDENCE_FAILURES: f64 = 10.0;

/// Estimate β (cycle degradation rate, %) from field SOH trajectories:
/// β = (1 − soh − calendar·months) / cycles / aggressiveness, median across
/// records with cycles > 0.
pub fn estimate_degradation_rate(
    field_data: &FieldDataSet,
    pack: &PackSpec,
    chaos: Option<&ChaosConfig>,
) -> Option<f64> {
    let aggressiveness = chaos.map(|c| c.aggressiveness_index).unwrap_or(1.0);
    let calendar_per_month = pack.calendar_aging_rate_pct_per_month / 100.0;

    let betas: Vec<f64> = field_data
        .bms_records
        .iter()
        .filter(|r| r.cumulative_cycles > 0)
        .map(|rec| {
            let calendar_loss = calendar_per_month * rec.month as f64;
            let cycling_loss = (1.0 - rec.soh - calendar_loss).max(0.0);
            let beta_eff = cycling_loss / rec.cumulative_cycles as f64;
            let beta_raw = if aggressiveness > 0.0 {
                beta_eff / aggressiveness
            } else {
                beta_eff
            };
            beta_raw * 100.0
        })
        .collect();

    if betas.is_empty() {
        None
    } else {
        Some(median(&betas))
    }
}

/// Estimate the calendar aging rate (%/month) from low-cycle packs
/// (< 50 cumulative cycles), where cycling barely contributes.
pub fn estimate_calendar_aging(field_data: &FieldDataSet) -> Option<f64> {
    let low_cycle: Vec<&BMSRecord> = field_data
        .bms_records
        .iter()
        .filter(|r| r.cumulative_cycles < 50 && r.month > 0)
        .collect();
    if low_cycle.len() < 3 {
        return None;
    }

    let rates: Vec<f64> = low_cycle
        .iter()
        .filter(|r| r.soh < 1.0)
        .map(|r| (1.0 - r.soh) / r.month as f64 * 100.0)
        .collect();

    if rates.is_empty() {
        None
    } else {
        Some(median(&rates))
    }
}

/// Estimate actual MTBF (hours) from the failure log:
/// unique docks × hours/day × 30 × observed months ÷ total failures.
pub fn estimate_charger_mtbf(
    field_data: &FieldDataSet,
    station: Option<&StationConfig>,
) -> Option<f64> {
    let failures = &field_data.charger_failure_records;
    if failures.is_empty() {
        return None;
    }

    let operating_hours_per_day = station.map(|s| s.operating_hours_per_day).unwrap_or(18.0);
    let max_month = failures.iter().map(|f| f.failure_month).max().unwrap_or(0);
    let unique_docks = failures
        .iter()
        .map(|f| f.dock_id.as_str())
        .collect::<HashSet<_>>()
        .len();

    let total_operating_hours =
        unique_docks as f64 * operating_hours_per_day * 30.0 * max_month as f64;
    Some(total_operating_hours / failures.len() as f64)
}

/// Adjust model parameters from field observations. A dimension whose
/// confidence falls below `min_confidence` emits no tuned parameter — this
/// is insufficient data, not an error.
pub fn auto_tune_parameters(
    field_data: &FieldDataSet,
    scenario: &Scenario,
    charger: &ChargerVariant,
    min_confidence: f64,
) -> AutoTuneResult {
    let mut tuned = Vec::new();

    let soh_confidence =
        (field_data.num_unique_packs() as f64 / FULL_CONFIDENCE_PACKS).min(1.0);

    if let Some(beta) = estimate_degradation_rate(field_data, &scenario.pack, Some(&scenario.chaos))
    {
        if soh_confidence >= min_confidence {
            let original = scenario.pack.cycle_degradation_rate_pct;
            tuned.push(tuned_parameter(
                "pack.cycle_degradation_rate_pct",
                original,
                round6(beta),
                soh_confidence,
            ));
        }
    }

    if let Some(mtbf) = estimate_charger_mtbf(field_data, Some(&scenario.station)) {
        let confidence = (field_data.charger_failure_records.len() as f64
            / FULL_CONFIDENCE_FAILURES)
            .min(1.0);
        if confidence >= min_confidence {
            tuned.push(tuned_parameter(
                "charger.mtbf_hours",
                charger.mtbf_hours,
                round2(mtbf),
                confidence,
            ));
        }
    }

    if let Some(calendar) = estimate_calendar_aging(field_data) {
        if soh_confidence >= min_confidence {
            let original = scenario.pack.calendar_aging_rate_pct_per_month;
            tuned.push(tuned_parameter(
                "pack.calendar_aging_rate_pct_per_month",
                original,
                round6(calendar),
                soh_confidence,
            ));
        }
    }

    AutoTuneResult {
        parameters: tuned,
        data_months_used: field_data.max_month(),
        num_packs_used: field_data.num_unique_packs(),
        num_failure_events_used: field_data.charger_failure_records.len(),
    }
}

fn tuned_parameter(path: &str, original: f64, tuned: f64, confidence: f64) -> TunedParameter {
    let change_pct = if original > 0.0 {
        (tuned - original) / original * 100.0
    } else {
        0.0
    };
    TunedParameter {
        param_path: path.to_string(),
        original_value: original,
        tuned_value: tuned,
        change_pct: round2(change_pct),
        confidence: round2(confidence),
    }
}

/// Apply tuned parameters onto copies of the scenario and charger.
pub fn apply_tuned_parameters(
    scenario: &Scenario,
    charger: &ChargerVariant,
    tune_result: &AutoTuneResult,
) -> (Scenario, ChargerVariant) {
    let mut tuned_scenario = scenario.clone();
    let mut tuned_charger = charger.clone();
    for param in &tune_result.parameters {
        apply_param(
            &mut tuned_scenario,
            &mut tuned_charger,
            &param.param_path,
            param.tuned_value,
        );
    }
    (tuned_scenario, tuned_charger)
}

// ── Recommendation alerts ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    MtbfDrift,
    CostOverrun,
    RankingChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// Raised when field data materially changes a charger recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargerRecommendationAlert {
    pub alert_type: AlertKind,
    pub severity: AlertSeverity,
    pub message: String,
    pub affected_charger: String,
    pub original_npv: Option<f64>,
    pub revised_npv: Option<f64>,
    pub npv_delta: Option<f64>,
}

/// Re-run each variant with its field-tuned parameters and alert when the
/// NPV moves by at least `threshold_pct`, or when the best-NPV variant
/// changes outright.
pub fn check_charger_recommendation(
    scenario: &Scenario,
    charger_variants: &[ChargerVariant],
    auto_tune_results: &HashMap<String, AutoTuneResult>,
    original_npvs: &HashMap<String, f64>,
    threshold_pct: f64,
) -> Result<Vec<ChargerRecommendationAlert>, SimError> {
    let mut alerts = Vec::new();

    for charger in charger_variants {
        let tune_result = match auto_tune_results.get(&charger.name) {
            Some(t) if !t.parameters.is_empty() => t,
            _ => continue,
        };

        let (mut tuned_scenario, tuned_charger) =
            apply_tuned_parameters(scenario, charger, tune_result);
        // Static engine for the re-run: the alert compares expected values.
        tuned_scenario.simulation.engine = EngineKind::Static;

        let result = run_engine(&tuned_scenario, &tuned_charger)?;
        let salvage =
            result.derived.total_packs as f64 * tuned_scenario.pack.second_life_salvage_value;
        let dcf = build_dcf_table(
            &result.months,
            &tuned_scenario.finance,
            tuned_scenario.simulation.discount_rate_annual,
            salvage,
        );
        let revised_npv = dcf.npv;

        let original_npv = original_npvs.get(&charger.name).copied().unwrap_or(0.0);
        let npv_delta = revised_npv - original_npv;
        let change_pct = if original_npv != 0.0 {
            (npv_delta / original_npv * 100.0).abs()
        } else {
            0.0
        };

        if change_pct >= threshold_pct {
            let severity = if change_pct >= 30.0 {
                AlertSeverity::Critical
            } else if change_pct >= 15.0 {
                AlertSeverity::Warning
            } else {
                AlertSeverity::Info
            };

            let direction = if npv_delta < 0.0 { "worse" } else { "better" };
            let param_changes: Vec<String> = tune_result
                .parameters
                .iter()
                .map(|p| {
                    format!(
                        "{}: {:.4} -> {:.4} ({:+.1}%)",
                        p.param_path, p.original_value, p.tuned_value, p.change_pct
                    )
                })
                .collect();
            let signed_change_pct = if original_npv != 0.0 {
                npv_delta / original_npv * 100.0
            } else {
                0.0
            };
            let message = format!(
                "Field data shows {} performing {} than spec. NPV changed by {:.0} ({:+.1}%). Parameter changes: {}",
                charger.name,
                direction,
                npv_delta,
                signed_change_pct,
                param_changes.join(", "),
            );

            let alert_type = if tune_result
                .parameters
                .iter()
                .any(|p| p.param_path.contains("mtbf"))
            {
                AlertKind::MtbfDrift
            } else {
                AlertKind::CostOverrun
            };

            alerts.push(ChargerRecommendationAlert {
                alert_type,
                severity,
                message,
                affected_charger: charger.name.clone(),
                original_npv: Some(round2(original_npv)),
                revised_npv: Some(round2(revised_npv)),
                npv_delta: Some(round2(npv_delta)),
            });
        }
    }

    // Did the argmax-NPV variant change once revised NPVs are in?
    if original_npvs.len() >= 2 && !alerts.is_empty() {
        let orig_best = original_npvs
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(name, _)| name.clone());

        let mut revised: HashMap<String, f64> = original_npvs.clone();
        for alert in &alerts {
            if let Some(npv) = alert.revised_npv {
                revised.insert(alert.affected_charger.clone(), npv);
            }
        }
        let new_best = revised
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(name, _)| name.clone());

        if let (Some(orig), Some(new)) = (orig_best, new_best) {
            if orig != new {
                alerts.push(ChargerRecommendationAlert {
                    alert_type: AlertKind::RankingChange,
                    severity: AlertSeverity::Critical,
                    message: format!(
                        "Charger recommendation changed. Original best: {orig}. Field-data-adjusted best: {new}.",
                    ),
                    affected_charger: new,
                    original_npv: None,
                    revised_npv: None,
                    npv_delta: None,
                });
            }
        }
    }

    Ok(alerts)
}

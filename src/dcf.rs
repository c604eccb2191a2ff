//! DCF engine — NPV, IRR, terminal value, discounted payback.
//!
//! Transforms monthly net cash flows into investor-grade valuation metrics:
//!   NPV = Σ CF_t / (1 + r_m)^t + PV(terminal value)
//!   r_m = (1 + r_annual)^(1/12) − 1
//!   IRR = annual rate where NPV = 0, by bisection
//!   Discounted payback = first month t > 1 where cumulative PV ≥ 0

use serde::{Deserialize, Serialize};

use crate::config::{FinanceConfig, TerminalValueMethod};
use crate::results::MonthlySnapshot;
use crate::util::{round2, round4, round6};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyDCFRow {
    pub month: u32,
    pub discount_factor: f64,
    pub nominal_net_cf: f64,
    pub pv_net_cf: f64,
    pub cumulative_pv: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DCFResult {
    pub npv: f64,
    /// None when the cash flows never change sign.
    pub irr: Option<f64>,
    pub discounted_payback_month: Option<u32>,
    /// Present value of the terminal value.
    pub terminal_value: f64,
    /// True when Gordon growth was requested but r ≤ g forced the salvage
    /// fallback.
    pub gordon_fallback: bool,
    pub monthly_dcf: Vec<MonthlyDCFRow>,
    pub undiscounted_total: f64,
}

fn monthly_rate(annual_rate: f64) -> f64 {
    (1.0 + annual_rate).powf(1.0 / 12.0) - 1.0
}

/// NPV of monthly cash flows (index 0 = month 1).
pub fn compute_npv(cash_flows: &[f64], annual_rate: f64) -> f64 {
    if cash_flows.is_empty() {
        return 0.0;
    }
    let r_m = monthly_rate(annual_rate);
    cash_flows
        .iter()
        .enumerate()
        .map(|(i, cf)| cf / (1.0 + r_m).powi(i as i32 + 1))
        .sum()
}

/// Annual IRR via bisection in [−50%, 1000%]. None when all flows share a
/// sign (no crossover) — absence of an IRR is a result, not an error.
pub fn compute_irr(cash_flows: &[f64]) -> Option<f64> {
    const MAX_ITER: usize = 200;
    const TOL: f64 = 1e-8;

    if cash_flows.len() < 2 {
        return None;
    }
    let has_positive = cash_flows.iter().any(|&cf| cf > 0.0);
    let has_negative = cash_flows.iter().any(|&cf| cf < 0.0);
    if !(has_positive && has_negative) {
        return None;
    }

    let mut low = -0.50;
    let mut high = 10.0;
    let mut mid = (low + high) / 2.0;

    for _ in 0..MAX_ITER {
        mid = (low + high) / 2.0;
        let npv_mid = compute_npv(cash_flows, mid);
        if npv_mid.abs() < TOL {
            return Some(mid);
        }
        let npv_low = compute_npv(cash_flows, low);
        if npv_low * npv_mid < 0.0 {
            high = mid;
        } else {
            low = mid;
        }
        if high - low < TOL {
            return Some(mid);
        }
    }
    Some(mid)
}

/// Terminal value at horizon end, already discounted to present. Returns
/// (pv, gordon_fallback).
pub fn compute_terminal_value(
    config: &FinanceConfig,
    last_year_ncf: f64,
    total_salvage: f64,
    annual_discount_rate: f64,
    horizon_months: u32,
) -> (f64, bool) {
    if config.terminal_value_method == TerminalValueMethod::None {
        return (0.0, false);
    }

    let r_m = monthly_rate(annual_discount_rate);
    let discount_to_present = 1.0 / (1.0 + r_m).powi(horizon_months as i32);

    match config.terminal_value_method {
        TerminalValueMethod::Salvage => (total_salvage * discount_to_present, false),
        TerminalValueMethod::GordonGrowth => {
            let r = annual_discount_rate;
            let g = config.terminal_growth_rate;
            if r <= g {
                // Perpetuity undefined; fall back to salvage.
                (total_salvage * discount_to_present, true)
            } else {
                let perpetuity = last_year_ncf * (1.0 + g) / (r - g);
                (perpetuity * discount_to_present, false)
            }
        }
        TerminalValueMethod::None => (0.0, false),
    }
}

/// First month t > 1 where cumulative PV(CF) ≥ 0; None if never.
pub fn compute_discounted_payback(cash_flows: &[f64], annual_rate: f64) -> Option<u32> {
    let r_m = monthly_rate(annual_rate);
    let mut cumulative_pv = 0.0;
    for (i, cf) in cash_flows.iter().enumerate() {
        let t = i as u32 + 1;
        cumulative_pv += cf / (1.0 + r_m).powi(t as i32);
        if cumulative_pv >= 0.0 && t > 1 {
            return Some(t);
        }
    }
    None
}

/// Build the full DCF analysis from monthly snapshots.
/// `total_salvage` is the salvage value of all assets at horizon end.
pub fn build_dcf_table(
    months: &[MonthlySnapshot],
    finance_cfg: &FinanceConfig,
    annual_discount_rate: f64,
    total_salvage: f64,
) -> DCFResult {
    let cash_flows: Vec<f64> = months.iter().map(|m| m.net_cash_flow).collect();
    let horizon = cash_flows.len() as u32;
    let r_m = monthly_rate(annual_discount_rate);

    let mut dcf_rows = Vec::with_capacity(cash_flows.len());
    let mut cumulative_pv = 0.0;
    for (i, &cf) in cash_flows.iter().enumerate() {
        let t = i as u32 + 1;
        let df = 1.0 / (1.0 + r_m).powi(t as i32);
        let pv = cf * df;
        cumulative_pv += pv;
        dcf_rows.push(MonthlyDCFRow {
            month: t,
            discount_factor: round6(df),
            nominal_net_cf: round2(cf),
            pv_net_cf: round2(pv),
            cumulative_pv: round2(cumulative_pv),
        });
    }

    let last_year_ncf: f64 = if horizon >= 12 {
        cash_flows[cash_flows.len() - 12..].iter().sum()
    } else {
        cash_flows.iter().sum()
    };
    let (tv, gordon_fallback) = compute_terminal_value(
        finance_cfg,
        last_year_ncf,
        total_salvage,
        annual_discount_rate,
        horizon,
    );

    let npv = cumulative_pv + tv;

    // IRR sees the terminal value un-discounted, added onto the final flow.
    let mut irr_flows = cash_flows.clone();
    if tv > 0.0 {
        if let Some(last) = irr_flows.last_mut() {
            *last += tv * (1.0 + r_m).powi(horizon as i32);
        }
    }
    let irr = compute_irr(&irr_flows);

    let payback = compute_discounted_payback(&cash_flows, annual_discount_rate);

    DCFResult {
        npv: round2(npv),
        irr: irr.map(round4),
        discounted_payback_month: payback,
        terminal_value: round2(tv),
        gordon_fallback,
        monthly_dcf: dcf_rows,
        undiscounted_total: round2(cash_flows.iter().sum()),
    }
}

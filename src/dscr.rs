//! Debt schedule and Debt Service Coverage Ratio.
//!
//!   loan = total_initial_capex × debt_pct_of_capex
//!   EMI  = P × r × (1+r)^n / ((1+r)^n − 1), n = tenor − grace
//!   DSCR = (Revenue − OpEx) / (Interest + Principal)
//!
//! Grace-period months are interest-only. Months without debt service report
//! an infinite DSCR and are excluded from the statistics.

use serde::{Deserialize, Serialize};

use crate::config::FinanceConfig;
use crate::results::MonthlySnapshot;
use crate::util::{round2, round4, round6};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtScheduleRow {
    pub month: u32,
    pub opening_balance: f64,
    pub interest: f64,
    pub principal: f64,
    pub emi: f64,
    pub closing_balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtSchedule {
    pub loan_amount: f64,
    pub monthly_rate: f64,
    pub rows: Vec<DebtScheduleRow>,
    pub total_interest_paid: f64,
    pub total_principal_paid: f64,
}

impl DebtSchedule {
    pub fn empty() -> Self {
        DebtSchedule {
            loan_amount: 0.0,
            monthly_rate: 0.0,
            rows: Vec::new(),
            total_interest_paid: 0.0,
            total_principal_paid: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DSCRResult {
    /// Per-month DSCR; infinity where no debt service is due.
    pub monthly_dscr: Vec<f64>,
    /// Average over finite months.
    pub avg_dscr: f64,
    pub min_dscr: f64,
    pub min_dscr_month: u32,
    /// Months where DSCR fell below the covenant threshold.
    pub breach_months: Vec<u32>,
    pub covenant_threshold: f64,
    /// remaining_asset_value / closing balance at horizon, when provided.
    pub asset_cover_ratio: Option<f64>,
}

/// Month-by-month amortization schedule for min(tenor, horizon) months.
/// A zero loan yields an empty schedule.
pub fn build_debt_schedule(
    total_initial_capex: f64,
    finance_cfg: &FinanceConfig,
    horizon_months: u32,
) -> DebtSchedule {
    let loan = total_initial_capex * finance_cfg.debt_pct_of_capex;
    if loan <= 0.0 {
        return DebtSchedule::empty();
    }

    let monthly_rate = finance_cfg.interest_rate_annual / 12.0;
    let grace = finance_cfg.grace_period_months;
    let tenor = finance_cfg.loan_tenor_months;
    let amort_months = tenor.saturating_sub(grace);

    let emi = if monthly_rate > 0.0 && amort_months > 0 {
        let factor = (1.0 + monthly_rate).powi(amort_months as i32);
        loan * monthly_rate * factor / (factor - 1.0)
    } else if amort_months > 0 {
        loan / amort_months as f64
    } else {
        0.0
    };

    let mut rows = Vec::new();
    let mut balance = loan;
    let mut total_interest = 0.0;
    let mut total_principal = 0.0;
    let num_months = tenor.min(horizon_months);

    for m in 1..=num_months {
        let interest = balance * monthly_rate;
        let (principal, payment) = if m <= grace {
            (0.0, interest)
        } else {
            // Never amortize past the outstanding balance.
            let principal = (emi - interest).min(balance);
            (principal, interest + principal)
        };
        let closing = (balance - principal).max(0.0);

        rows.push(DebtScheduleRow {
            month: m,
            opening_balance: round2(balance),
            interest: round2(interest),
            principal: round2(principal),
            emi: round2(payment),
            closing_balance: round2(closing),
        });

        total_interest += interest;
        total_principal += principal;
        balance = closing;
    }

    DebtSchedule {
        loan_amount: round2(loan),
        monthly_rate: round6(monthly_rate),
        rows,
        total_interest_paid: round2(total_interest),
        total_principal_paid: round2(total_principal),
    }
}

/// Monthly DSCR from engine snapshots and the debt schedule.
/// NOI = revenue − OpEx, before CapEx and debt service.
pub fn compute_dscr(
    months: &[MonthlySnapshot],
    debt: &DebtSchedule,
    finance_cfg: &FinanceConfig,
    remaining_asset_value: Option<f64>,
) -> DSCRResult {
    if debt.loan_amount <= 0.0 || debt.rows.is_empty() {
        return DSCRResult {
            monthly_dscr: Vec::new(),
            avg_dscr: f64::INFINITY,
            min_dscr: f64::INFINITY,
            min_dscr_month: 0,
            breach_months: Vec::new(),
            covenant_threshold: finance_cfg.dscr_covenant_threshold,
            asset_cover_ratio: None,
        };
    }

    let mut monthly_dscr = Vec::with_capacity(months.len());
    let mut breach_months = Vec::new();

    for snap in months {
        let noi = snap.revenue - snap.opex_total;
        let debt_row = debt.rows.iter().find(|r| r.month == snap.month);
        let dscr_val = match debt_row {
            Some(row) if row.emi > 0.0 => round4(noi / row.emi),
            _ => f64::INFINITY,
        };
        if dscr_val.is_finite() && dscr_val < finance_cfg.dscr_covenant_threshold {
            breach_months.push(snap.month);
        }
        monthly_dscr.push(dscr_val);
    }

    let finite: Vec<f64> = monthly_dscr.iter().copied().filter(|d| d.is_finite()).collect();
    let (avg, min_val, min_month) = if finite.is_empty() {
        (f64::INFINITY, f64::INFINITY, 0)
    } else {
        let avg = finite.iter().sum::<f64>() / finite.len() as f64;
        let min_val = finite.iter().copied().fold(f64::INFINITY, f64::min);
        let min_month = monthly_dscr
            .iter()
            .position(|&d| d == min_val)
            .map(|i| i as u32 + 1)
            .unwrap_or(0);
        (avg, min_val, min_month)
    };

    let asset_cover_ratio = remaining_asset_value.and_then(|value| {
        let last_balance = debt.rows.last().map(|r| r.closing_balance).unwrap_or(0.0);
        if last_balance > 0.0 {
            Some(round4(value / last_balance))
        } else {
            None
        }
    });

    DSCRResult {
        monthly_dscr,
        avg_dscr: if avg.is_finite() { round4(avg) } else { avg },
        min_dscr: if min_val.is_finite() { round4(min_val) } else { min_val },
        min_dscr_month: min_month,
        breach_months,
        covenant_threshold: finance_cfg.dscr_covenant_threshold,
        asset_cover_ratio,
    }
}

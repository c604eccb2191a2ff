//! Financial statements — monthly P&L and cash-flow statement.
//!
//! P&L: Revenue → gross profit → EBITDA → EBIT → EBT → net income, with
//! depreciation per the configured method and tax on positive EBT only.
//! Cash flow: operating + investing + financing, with the loan drawdown in
//! month 1 and EMI outflows thereafter.

use serde::{Deserialize, Serialize};

use crate::config::{ChargerVariant, DepreciationMethod, FinanceConfig, OpExConfig, PackSpec};
use crate::dscr::DebtSchedule;
use crate::results::MonthlySnapshot;
use crate::util::round2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPnL {
    pub month: u32,
    pub revenue: f64,
    pub electricity_cost: f64,
    pub labor_cost: f64,
    pub gross_profit: f64,
    pub station_opex: f64,
    pub ebitda: f64,
    pub depreciation: f64,
    pub ebit: f64,
    pub interest: f64,
    pub ebt: f64,
    pub tax: f64,
    pub net_income: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyCashFlowStatement {
    pub month: u32,
    pub operating_cf: f64,
    pub investing_cf: f64,
    pub financing_cf: f64,
    pub net_cf: f64,
    pub cumulative_cf: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialStatements {
    pub pnl: Vec<MonthlyPnL>,
    pub cash_flow: Vec<MonthlyCashFlowStatement>,
}

/// Straight-line: asset base / useful life, zero once fully depreciated.
/// WDV: annual rate / 12 × current book value.
fn monthly_depreciation(
    total_depreciable_assets: f64,
    finance_cfg: &FinanceConfig,
    month: u32,
    book_value: f64,
) -> f64 {
    if month > finance_cfg.asset_useful_life_months {
        return 0.0;
    }
    match finance_cfg.depreciation_method {
        DepreciationMethod::StraightLine => {
            total_depreciable_assets / finance_cfg.asset_useful_life_months as f64
        }
        DepreciationMethod::Wdv => book_value * finance_cfg.wdv_rate_annual / 12.0,
    }
}

#[allow(clippy::too_many_arguments)]
pub fn build_financial_statements(
    months: &[MonthlySnapshot],
    debt: &DebtSchedule,
    finance_cfg: &FinanceConfig,
    opex_cfg: &OpExConfig,
    pack: &PackSpec,
    charger: &ChargerVariant,
    total_initial_capex: f64,
) -> FinancialStatements {
    let mut pnl_list = Vec::with_capacity(months.len());
    let mut cf_list = Vec::with_capacity(months.len());

    let mut cumulative_cf = 0.0;
    let mut book_value = total_initial_capex;

    let eff = if charger.charging_efficiency_pct > 0.0 {
        charger.charging_efficiency_pct
    } else {
        0.90
    };
    let energy_per_cycle_kwh = pack.nominal_capacity_kwh / eff;

    for snap in months {
        let m = snap.month;
        let revenue = snap.revenue;

        // Variable costs, decomposed out of total OpEx; the remainder is
        // station-level fixed cost (kept non-negative against rounding).
        let electricity =
            snap.total_cycles as f64 * energy_per_cycle_kwh * opex_cfg.electricity_tariff_per_kwh;
        let labor = snap.total_cycles as f64 * opex_cfg.pack_handling_labor_per_swap;
        let station_opex = (snap.opex_total - electricity - labor).max(0.0);

        let gross_profit = revenue - electricity - labor;
        let ebitda = gross_profit - station_opex;

        let mut depreciation = monthly_depreciation(total_initial_capex, finance_cfg, m, book_value);
        depreciation = depreciation.min(book_value);
        book_value = (book_value - depreciation).max(0.0);

        let ebit = ebitda - depreciation;

        let debt_row = debt.rows.iter().find(|r| r.month == m);
        let interest = debt_row.map(|r| r.interest).unwrap_or(0.0);

        let ebt = ebit - interest;
        let tax = ebt.max(0.0) * finance_cfg.tax_rate;
        let net_income = ebt - tax;

        pnl_list.push(MonthlyPnL {
            month: m,
            revenue: round2(revenue),
            electricity_cost: round2(electricity),
            labor_cost: round2(labor),
            gross_profit: round2(gross_profit),
            station_opex: round2(station_opex),
            ebitda: round2(ebitda),
            depreciation: round2(depreciation),
            ebit: round2(ebit),
            interest: round2(interest),
            ebt: round2(ebt),
            tax: round2(tax),
            net_income: round2(net_income),
        });

        // Cash flow statement: depreciation is non-cash and excluded.
        let operating_cf = revenue - snap.opex_total;
        let investing_cf = -snap.capex_this_month;
        let mut financing_cf = if m == 1 { debt.loan_amount } else { 0.0 };
        if let Some(row) = debt_row {
            financing_cf -= row.emi;
        }

        let net_cf = operating_cf + investing_cf + financing_cf;
        cumulative_cf += net_cf;

        cf_list.push(MonthlyCashFlowStatement {
            month: m,
            operating_cf: round2(operating_cf),
            investing_cf: round2(investing_cf),
            financing_cf: round2(financing_cf),
            net_cf: round2(net_cf),
            cumulative_cf: round2(cumulative_cf),
        });
    }

    FinancialStatements {
        pnl: pnl_list,
        cash_flow: cf_list,
    }
}

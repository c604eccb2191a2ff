/// Debt schedule amortization and DSCR covenant tracking.
use approx::assert_relative_eq;

use swapnet_sim::config::FinanceConfig;
use swapnet_sim::dscr::{build_debt_schedule, compute_dscr};
use swapnet_sim::results::{CostPerCycleWaterfall, MonthlySnapshot};

fn snapshot(month: u32, revenue: f64, opex: f64) -> MonthlySnapshot {
    MonthlySnapshot {
        month,
        fleet_size: 0,
        swap_visits: 0,
        total_cycles: 0,
        revenue,
        opex_total: opex,
        capex_this_month: 0.0,
        net_cash_flow: revenue - opex,
        cumulative_cash_flow: 0.0,
        cost_per_cycle: CostPerCycleWaterfall::zero(),
        avg_soh: None,
        packs_retired_this_month: None,
        packs_replaced_this_month: None,
        replacement_capex_this_month: None,
        salvage_credit_this_month: None,
        charger_failures_this_month: None,
        failure_to_serve_count: None,
        avg_wait_minutes: None,
    }
}

fn finance(debt_pct: f64, grace: u32, tenor: u32) -> FinanceConfig {
    FinanceConfig {
        debt_pct_of_capex: debt_pct,
        interest_rate_annual: 0.12,
        loan_tenor_months: tenor,
        grace_period_months: grace,
        dscr_covenant_threshold: 1.20,
        ..FinanceConfig::default()
    }
}

#[test]
fn loan_sizing_and_grace_period() {
    let schedule = build_debt_schedule(1_000_000.0, &finance(0.70, 6, 60), 60);

    assert_relative_eq!(schedule.loan_amount, 700_000.0, epsilon = 1e-6);
    assert_relative_eq!(schedule.monthly_rate, 0.01, epsilon = 1e-9);
    assert_eq!(schedule.rows.len(), 60);

    // Grace months: interest-only, balance flat.
    for row in &schedule.rows[..6] {
        assert_eq!(row.principal, 0.0);
        assert_relative_eq!(row.interest, 7_000.0, epsilon = 0.01);
        assert_relative_eq!(row.emi, row.interest, epsilon = 1e-9);
        assert_relative_eq!(row.closing_balance, 700_000.0, epsilon = 0.01);
    }

    // Amortization months: principal kicks in.
    assert!(schedule.rows[6].principal > 0.0);
}

#[test]
fn emi_amortizes_to_zero_at_tenor() {
    let schedule = build_debt_schedule(1_000_000.0, &finance(0.70, 6, 60), 60);
    let last = schedule.rows.last().unwrap();
    assert!(
        last.closing_balance.abs() < 1.0,
        "residual balance {}",
        last.closing_balance
    );
    assert_relative_eq!(
        schedule.total_principal_paid,
        schedule.loan_amount,
        epsilon = 1.0
    );
}

#[test]
fn row_identities_hold() {
    let schedule = build_debt_schedule(2_000_000.0, &finance(0.60, 3, 48), 48);
    let mut prev_closing = schedule.loan_amount;
    for row in &schedule.rows {
        assert_relative_eq!(row.opening_balance, prev_closing, epsilon = 0.02);
        assert_relative_eq!(row.emi, row.interest + row.principal, epsilon = 0.02);
        assert_relative_eq!(
            row.closing_balance,
            row.opening_balance - row.principal,
            epsilon = 0.02
        );
        prev_closing = row.closing_balance;
    }
}

#[test]
fn schedule_truncates_at_horizon() {
    let schedule = build_debt_schedule(1_000_000.0, &finance(0.70, 0, 120), 36);
    assert_eq!(schedule.rows.len(), 36);
    assert!(schedule.rows.last().unwrap().closing_balance > 0.0);
}

#[test]
fn zero_debt_yields_empty_schedule() {
    let schedule = build_debt_schedule(1_000_000.0, &finance(0.0, 6, 60), 60);
    assert_eq!(schedule.loan_amount, 0.0);
    assert!(schedule.rows.is_empty());

    // DSCR degenerates to all-infinite with no breaches.
    let months: Vec<MonthlySnapshot> =
        (1..=12).map(|m| snapshot(m, 100_000.0, 40_000.0)).collect();
    let dscr = compute_dscr(&months, &schedule, &finance(0.0, 6, 60), None);
    assert!(dscr.monthly_dscr.is_empty());
    assert!(dscr.avg_dscr.is_infinite());
    assert!(dscr.breach_months.is_empty());
}

#[test]
fn dscr_is_noi_over_debt_service() {
    let cfg = finance(0.70, 0, 60);
    let schedule = build_debt_schedule(1_000_000.0, &cfg, 60);
    let months: Vec<MonthlySnapshot> =
        (1..=60).map(|m| snapshot(m, 100_000.0, 40_000.0)).collect();

    let dscr = compute_dscr(&months, &schedule, &cfg, None);
    assert_eq!(dscr.monthly_dscr.len(), 60);

    let emi = schedule.rows[0].emi;
    assert_relative_eq!(dscr.monthly_dscr[0], 60_000.0 / emi, epsilon = 0.001);
    assert!(dscr.min_dscr.is_finite());
    assert!(dscr.min_dscr <= dscr.avg_dscr);
    assert!(dscr.min_dscr_month >= 1);
}

#[test]
fn covenant_breaches_are_listed() {
    let cfg = finance(0.70, 0, 60);
    let schedule = build_debt_schedule(1_000_000.0, &cfg, 60);
    let emi = schedule.rows[0].emi;

    // NOI pinned just below covenant × EMI for the first 3 months.
    let breach_noi = cfg.dscr_covenant_threshold * emi - 1.0;
    let months: Vec<MonthlySnapshot> = (1..=12)
        .map(|m| {
            if m <= 3 {
                snapshot(m, breach_noi, 0.0)
            } else {
                snapshot(m, 10.0 * emi, 0.0)
            }
        })
        .collect();

    let dscr = compute_dscr(&months, &schedule, &cfg, None);
    assert_eq!(dscr.breach_months, vec![1, 2, 3]);
}

#[test]
fn months_past_tenor_report_infinite_dscr() {
    let cfg = finance(0.70, 0, 12);
    let schedule = build_debt_schedule(500_000.0, &cfg, 24);
    assert_eq!(schedule.rows.len(), 12);

    let months: Vec<MonthlySnapshot> =
        (1..=24).map(|m| snapshot(m, 100_000.0, 40_000.0)).collect();
    let dscr = compute_dscr(&months, &schedule, &cfg, None);

    assert!(dscr.monthly_dscr[11].is_finite());
    assert!(dscr.monthly_dscr[12].is_infinite());
    // Infinite months stay out of the statistics.
    assert!(dscr.avg_dscr.is_finite());
}

#[test]
fn asset_cover_ratio_against_closing_balance() {
    let cfg = finance(0.70, 0, 120);
    let schedule = build_debt_schedule(1_000_000.0, &cfg, 36);
    let months: Vec<MonthlySnapshot> =
        (1..=36).map(|m| snapshot(m, 100_000.0, 40_000.0)).collect();

    let dscr = compute_dscr(&months, &schedule, &cfg, Some(400_000.0));
    let closing = schedule.rows.last().unwrap().closing_balance;
    let acr = dscr.asset_cover_ratio.expect("balance outstanding");
    assert_relative_eq!(acr, 400_000.0 / closing, epsilon = 0.001);
}

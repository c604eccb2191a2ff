/// DCF valuation: discounting, IRR root-finding, terminal value methods,
/// and discounted payback.
use approx::assert_relative_eq;

use swapnet_sim::config::{FinanceConfig, TerminalValueMethod};
use swapnet_sim::dcf::{
    build_dcf_table, compute_discounted_payback, compute_irr, compute_npv, compute_terminal_value,
};
use swapnet_sim::results::{CostPerCycleWaterfall, MonthlySnapshot};

fn snapshot(month: u32, net_cf: f64) -> MonthlySnapshot {
    MonthlySnapshot {
        month,
        fleet_size: 0,
        swap_visits: 0,
        total_cycles: 0,
        revenue: 0.0,
        opex_total: 0.0,
        capex_this_month: 0.0,
        net_cash_flow: net_cf,
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

/// −500k in month 1, +20k for the remaining 59 months.
fn reference_months() -> Vec<MonthlySnapshot> {
    let mut months = vec![snapshot(1, -500_000.0)];
    for m in 2..=60 {
        months.push(snapshot(m, 20_000.0));
    }
    months
}

#[test]
fn monthly_rate_is_compounded_not_divided() {
    // One flow of 1 a year out: discounting must use (1+r)^(1/12)−1, so the
    // 12-month discount factor equals exactly 1/(1+r_annual).
    let flows = vec![0.0; 11].into_iter().chain([1.0]).collect::<Vec<_>>();
    let npv = compute_npv(&flows, 0.12);
    assert_relative_eq!(npv, 1.0 / 1.12, epsilon = 1e-9);
}

#[test]
fn irr_satisfies_npv_root() {
    let flows: Vec<f64> = reference_months().iter().map(|m| m.net_cash_flow).collect();
    let irr = compute_irr(&flows).expect("sign change exists");
    let npv_at_irr = compute_npv(&flows, irr);
    // Bisection stops on a 1e-8 rate interval; on a ~1M cash-flow base the
    // residual NPV stays well under a cent.
    assert!(npv_at_irr.abs() < 0.01, "NPV at IRR = {npv_at_irr}");
}

#[test]
fn irr_is_none_without_sign_change() {
    assert!(compute_irr(&[100.0, 200.0, 300.0]).is_none());
    assert!(compute_irr(&[-100.0, -200.0]).is_none());
    assert!(compute_irr(&[5.0]).is_none());
}

#[test]
fn terminal_value_methods() {
    let mut cfg = FinanceConfig::default();

    cfg.terminal_value_method = TerminalValueMethod::None;
    let (tv, fallback) = compute_terminal_value(&cfg, 240_000.0, 300_000.0, 0.12, 60);
    assert_eq!(tv, 0.0);
    assert!(!fallback);

    cfg.terminal_value_method = TerminalValueMethod::Salvage;
    let (tv, fallback) = compute_terminal_value(&cfg, 240_000.0, 300_000.0, 0.12, 60);
    // 300k discounted 60 months at 12% annual = 300k / 1.12^5.
    assert_relative_eq!(tv, 300_000.0 / 1.12_f64.powi(5), epsilon = 1.0);
    assert!(!fallback);

    cfg.terminal_value_method = TerminalValueMethod::GordonGrowth;
    cfg.terminal_growth_rate = 0.02;
    let (tv, fallback) = compute_terminal_value(&cfg, 240_000.0, 300_000.0, 0.12, 60);
    let expected = 240_000.0 * 1.02 / (0.12 - 0.02) / 1.12_f64.powi(5);
    assert_relative_eq!(tv, expected, epsilon = 1.0);
    assert!(!fallback);
}

#[test]
fn gordon_growth_falls_back_to_salvage_when_rate_too_low() {
    let cfg = FinanceConfig {
        terminal_value_method: TerminalValueMethod::GordonGrowth,
        terminal_growth_rate: 0.05,
        ..FinanceConfig::default()
    };
    // r = 0.03 ≤ g = 0.05: perpetuity undefined.
    let (tv, fallback) = compute_terminal_value(&cfg, 240_000.0, 300_000.0, 0.03, 60);
    assert!(fallback);
    assert_relative_eq!(tv, 300_000.0 / 1.03_f64.powi(5), epsilon = 1.0);

    let months = reference_months();
    let dcf = build_dcf_table(&months, &cfg, 0.03, 300_000.0);
    assert!(dcf.gordon_fallback);
}

#[test]
fn discounted_payback_requires_second_month() {
    // Positive from month 1: the payback month must still be > 1.
    let payback = compute_discounted_payback(&[50.0, 1.0, 1.0], 0.12);
    assert_eq!(payback, Some(2));

    // Never recovering: None, not an error.
    assert_eq!(compute_discounted_payback(&[-100.0, 1.0, 1.0], 0.12), None);
}

#[test]
fn salvage_terminal_value_raises_npv() {
    let months = reference_months();
    let mut cfg = FinanceConfig::default();

    cfg.terminal_value_method = TerminalValueMethod::None;
    let bare = build_dcf_table(&months, &cfg, 0.12, 0.0);

    cfg.terminal_value_method = TerminalValueMethod::Salvage;
    let with_salvage = build_dcf_table(&months, &cfg, 0.12, 200_000.0);

    assert!(with_salvage.npv > bare.npv);
    assert_relative_eq!(
        with_salvage.npv - bare.npv,
        with_salvage.terminal_value,
        epsilon = 0.02
    );
}

#[test]
fn dcf_rows_carry_running_present_value() {
    let months = reference_months();
    let cfg = FinanceConfig {
        terminal_value_method: TerminalValueMethod::None,
        ..FinanceConfig::default()
    };
    let dcf = build_dcf_table(&months, &cfg, 0.12, 0.0);

    assert_eq!(dcf.monthly_dcf.len(), 60);
    let mut running = 0.0;
    for row in &dcf.monthly_dcf {
        running += row.pv_net_cf;
        assert!((row.cumulative_pv - running).abs() <= 0.01 * row.month as f64);
        running = row.cumulative_pv;
        assert!(row.discount_factor <= 1.0 && row.discount_factor > 0.0);
    }
    assert_relative_eq!(
        dcf.undiscounted_total,
        -500_000.0 + 59.0 * 20_000.0,
        epsilon = 0.01
    );
}

#[test]
fn irr_with_terminal_value_on_final_flow() {
    let months = reference_months();
    let cfg = FinanceConfig {
        terminal_value_method: TerminalValueMethod::Salvage,
        ..FinanceConfig::default()
    };
    let dcf = build_dcf_table(&months, &cfg, 0.12, 200_000.0);
    let irr = dcf.irr.expect("flows change sign");

    // Reconstruct the IRR flows: nominal cash flows with the undiscounted
    // terminal value on the last month.
    let r_m = 1.12_f64.powf(1.0 / 12.0) - 1.0;
    let mut flows: Vec<f64> = months.iter().map(|m| m.net_cash_flow).collect();
    *flows.last_mut().unwrap() += dcf.terminal_value * (1.0 + r_m).powi(60);
    let npv_at_irr = compute_npv(&flows, irr);
    // IRR is rounded to 4 decimals in the result; re-check at that precision.
    assert!(npv_at_irr.abs() < 500.0, "NPV at rounded IRR = {npv_at_irr}");
}

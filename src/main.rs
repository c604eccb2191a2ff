use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::PathBuf;

use swapnet_sim::cashflow::compute_initial_capex;
use swapnet_sim::charger_npv::{compute_charger_npv, rank_charger_variants};
use swapnet_sim::config::Scenario;
use swapnet_sim::dcf::build_dcf_table;
use swapnet_sim::dscr::{build_debt_schedule, compute_dscr};
use swapnet_sim::error::{CancelToken, SimError};
use swapnet_sim::field_data::{
    auto_tune_parameters, check_charger_recommendation, compute_variance_report,
    ingest_bms_csv_path, ingest_charger_csv_path, FieldDataSet,
};
use swapnet_sim::optimizer::{find_minimum_fleet_size, NpvPolicy, TargetMetric};
use swapnet_sim::orchestrator::run_engine;
use swapnet_sim::output;
use swapnet_sim::results::SimulationResult;
use swapnet_sim::sensitivity::run_sensitivity;
use swapnet_sim::statements::build_financial_statements;

#[derive(Parser)]
#[command(
    name = "swapnet-sim",
    about = "Digital-twin and financial simulator for battery-swap networks"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one simulation (engine per scenario config) with financial overlay
    Run {
        /// Scenario TOML file (defaults to the built-in reference scenario)
        #[arg(long)]
        scenario: Option<String>,

        /// Charger variant index within the scenario
        #[arg(long, default_value = "0")]
        variant: usize,

        /// Override the RNG seed
        #[arg(long)]
        seed: Option<u64>,

        /// Output directory
        #[arg(long, default_value = "output/run")]
        output_dir: String,
    },

    /// Compare all charger variants by discounted TCO and NPV
    Compare {
        #[arg(long)]
        scenario: Option<String>,

        #[arg(long, default_value = "output/compare")]
        output_dir: String,
    },

    /// One-at-a-time sensitivity analysis (tornado chart)
    Sensitivity {
        #[arg(long)]
        scenario: Option<String>,

        #[arg(long, default_value = "0")]
        variant: usize,

        /// Output CSV for the tornado bars
        #[arg(long, default_value = "output/tornado.csv")]
        output: String,
    },

    /// Binary-search the minimum fleet size for a financial target
    Pilot {
        #[arg(long)]
        scenario: Option<String>,

        #[arg(long, default_value = "0")]
        variant: usize,

        /// Target: positive_ncf, positive_npv, or break_even_within
        #[arg(long, default_value = "positive_npv")]
        target: String,

        /// Confidence percent (90 tests the P10 outcome)
        #[arg(long, default_value = "50")]
        confidence: f64,

        #[arg(long, default_value = "10")]
        min_fleet: u32,

        #[arg(long, default_value = "2000")]
        max_fleet: u32,

        #[arg(long, default_value = "30")]
        max_iterations: u32,

        /// Break-even target in months (break_even_within only)
        #[arg(long)]
        break_even_target: Option<u32>,

        /// NPV source for Monte-Carlo runs: representative or confidence_percentile
        #[arg(long, default_value = "representative")]
        npv_policy: String,
    },

    /// Variance report: model projections vs field telemetry
    Variance {
        #[arg(long)]
        scenario: Option<String>,

        #[arg(long, default_value = "0")]
        variant: usize,

        /// BMS telemetry CSV
        #[arg(long)]
        bms: Option<String>,

        /// Charger failure log CSV
        #[arg(long)]
        failures: Option<String>,

        #[arg(long, default_value = "output/variance.json")]
        output: String,
    },

    /// Auto-tune model parameters from field data
    Tune {
        #[arg(long)]
        scenario: Option<String>,

        #[arg(long, default_value = "0")]
        variant: usize,

        #[arg(long)]
        bms: Option<String>,

        #[arg(long)]
        failures: Option<String>,

        /// Reject tuned parameters below this confidence (0–1)
        #[arg(long, default_value = "0.5")]
        min_confidence: f64,

        /// NPV change percent that triggers a recommendation alert
        #[arg(long, default_value = "10")]
        alert_threshold_pct: f64,
    },
}

fn load_scenario(path: &Option<String>) -> Result<Scenario, SimError> {
    match path {
        Some(p) => Scenario::from_toml_path(&PathBuf::from(p)),
        None => {
            let scenario = Scenario::default();
            scenario.validate()?;
            Ok(scenario)
        }
    }
}

fn load_field_data(
    bms: &Option<String>,
    failures: &Option<String>,
) -> Result<FieldDataSet, SimError> {
    let mut data = FieldDataSet::default();
    if let Some(path) = bms {
        data.bms_records = ingest_bms_csv_path(&PathBuf::from(path))?;
    }
    if let Some(path) = failures {
        data.charger_failure_records = ingest_charger_csv_path(&PathBuf::from(path))?;
    }
    Ok(data)
}

/// Run the engine and attach DCF, debt schedule, DSCR, and statements.
fn run_with_financials(
    scenario: &Scenario,
    variant: usize,
) -> Result<SimulationResult, SimError> {
    let charger = scenario
        .charger_variants
        .get(variant)
        .ok_or_else(|| {
            SimError::validation(
                "charger_variants",
                variant,
                "an index within the configured variants",
            )
        })?;

    let mut result = run_engine(scenario, charger)?;

    let initial_capex = compute_initial_capex(scenario, charger, &result.derived);
    let salvage =
        result.derived.total_packs as f64 * scenario.pack.second_life_salvage_value;

    let dcf = build_dcf_table(
        &result.months,
        &scenario.finance,
        scenario.simulation.discount_rate_annual,
        salvage,
    );
    let debt = build_debt_schedule(initial_capex, &scenario.finance, scenario.simulation.horizon_months);
    let dscr = compute_dscr(&result.months, &debt, &scenario.finance, Some(salvage));
    let statements = build_financial_statements(
        &result.months,
        &debt,
        &scenario.finance,
        &scenario.opex,
        &scenario.pack,
        charger,
        initial_capex,
    );

    result.dcf = Some(dcf);
    result.debt = Some(debt);
    result.dscr = Some(dscr);
    result.statements = Some(statements);
    Ok(result)
}

fn npv_for_variant(scenario: &Scenario, variant: usize) -> Result<f64, SimError> {
    let result = run_with_financials(scenario, variant)?;
    Ok(result.dcf.as_ref().map(|d| d.npv).unwrap_or(0.0))
}

fn print_run_summary(result: &SimulationResult) {
    let s = &result.summary;
    println!("\n  Variant: {}", s.charger_variant_name);
    if let Some(seed) = result.seed {
        println!("  Seed: {seed}");
    }
    println!("  Revenue:        {:>16.2}", s.total_revenue);
    println!("  OpEx:           {:>16.2}", s.total_opex);
    println!("  CapEx:          {:>16.2}", s.total_capex);
    println!("  Net cash flow:  {:>16.2}", s.total_net_cash_flow);
    println!("  Avg cost/cycle: {:>16.4}", s.avg_cost_per_cycle);
    match s.break_even_month {
        Some(m) => println!("  Break-even:     month {m}"),
        None => println!("  Break-even:     never"),
    }
    if let Some(dcf) = &result.dcf {
        println!("  NPV:            {:>16.2}", dcf.npv);
        match dcf.irr {
            Some(irr) => println!("  IRR:            {:>15.2}%", irr * 100.0),
            None => println!("  IRR:            n/a"),
        }
        match dcf.discounted_payback_month {
            Some(m) => println!("  Disc. payback:  month {m}"),
            None => println!("  Disc. payback:  never"),
        }
    }
    if let Some(dscr) = &result.dscr {
        if dscr.min_dscr.is_finite() {
            println!(
                "  DSCR:           avg {:.2}, min {:.2} (month {}), breaches: {}",
                dscr.avg_dscr,
                dscr.min_dscr,
                dscr.min_dscr_month,
                dscr.breach_months.len()
            );
        }
    }
    if let Some(mc) = &result.monte_carlo {
        println!(
            "  Monte Carlo:    {} runs, NCF P10/P50/P90 = {:.0} / {:.0} / {:.0}",
            mc.num_runs, mc.ncf_p10, mc.ncf_p50, mc.ncf_p90
        );
    }
}

fn main() {
    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Run {
            scenario,
            variant,
            seed,
            output_dir,
        } => cmd_run(&scenario, variant, seed, &output_dir),
        Commands::Compare {
            scenario,
            output_dir,
        } => cmd_compare(&scenario, &output_dir),
        Commands::Sensitivity {
            scenario,
            variant,
            output,
        } => cmd_sensitivity(&scenario, variant, &output),
        Commands::Pilot {
            scenario,
            variant,
            target,
            confidence,
            min_fleet,
            max_fleet,
            max_iterations,
            break_even_target,
            npv_policy,
        } => cmd_pilot(
            &scenario,
            variant,
            &target,
            confidence,
            min_fleet,
            max_fleet,
            max_iterations,
            break_even_target,
            &npv_policy,
        ),
        Commands::Variance {
            scenario,
            variant,
            bms,
            failures,
            output,
        } => cmd_variance(&scenario, variant, &bms, &failures, &output),
        Commands::Tune {
            scenario,
            variant,
            bms,
            failures,
            min_confidence,
            alert_threshold_pct,
        } => cmd_tune(
            &scenario,
            variant,
            &bms,
            &failures,
            min_confidence,
            alert_threshold_pct,
        ),
    };

    if let Err(e) = outcome {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn cmd_run(
    scenario_path: &Option<String>,
    variant: usize,
    seed: Option<u64>,
    output_dir: &str,
) -> Result<(), SimError> {
    let mut scenario = load_scenario(scenario_path)?;
    if seed.is_some() {
        scenario.simulation.random_seed = seed;
    }

    println!(
        "Running {:?} engine, {} months, variant {}",
        scenario.simulation.engine, scenario.simulation.horizon_months, variant
    );

    let result = run_with_financials(&scenario, variant)?;
    print_run_summary(&result);

    let dir = PathBuf::from(output_dir);
    output::save_all(&result, &scenario, &dir)?;
    println!("\nSaved outputs to {}", dir.display());
    Ok(())
}

fn cmd_compare(scenario_path: &Option<String>, output_dir: &str) -> Result<(), SimError> {
    let scenario = load_scenario(scenario_path)?;
    let n = scenario.charger_variants.len();
    println!("Comparing {n} charger variant(s)...");

    let bar = ProgressBar::new(n as u64);
    bar.set_style(
        ProgressStyle::with_template("  [{bar:30}] {pos}/{len} {msg}")
            .expect("static template")
            .progress_chars("=> "),
    );

    let mut npv_results = Vec::new();
    for (i, charger) in scenario.charger_variants.iter().enumerate() {
        bar.set_message(charger.name.clone());
        let result = run_with_financials(&scenario, i)?;
        npv_results.push(compute_charger_npv(charger, &result.charger_tco, &scenario.simulation));

        let dir = PathBuf::from(output_dir).join(&charger.name);
        output::save_all(&result, &scenario, &dir)?;
        bar.inc(1);
    }
    bar.finish_and_clear();

    rank_charger_variants(&mut npv_results);

    println!(
        "\n  {:<20} {:>14} {:>14} {:>12}",
        "Variant", "TCO", "NPV of TCO", "Disc. CPC"
    );
    println!("  {}", "-".repeat(64));
    for r in &npv_results {
        println!(
            "  {:<20} {:>14.2} {:>14.2} {:>12.4}",
            r.charger_name, r.undiscounted_tco, r.npv_tco, r.discounted_cpc
        );
    }
    println!("\nBest by discounted cost per cycle: {}", npv_results[0].charger_name);
    Ok(())
}

fn cmd_sensitivity(
    scenario_path: &Option<String>,
    variant: usize,
    output: &str,
) -> Result<(), SimError> {
    let scenario = load_scenario(scenario_path)?;
    let charger = scenario.charger_variants.get(variant).ok_or_else(|| {
        SimError::validation("charger_variants", variant, "an index within the configured variants")
    })?;

    println!("Running tornado sensitivity for {}...", charger.name);
    let result = run_sensitivity(&scenario, charger, None, &CancelToken::new())?;

    println!("\n  Base NPV: {:.2}\n", result.base_npv);
    println!("  {:<22} {:>14} {:>14} {:>14}", "Parameter", "NPV low", "NPV high", "Swing");
    println!("  {}", "-".repeat(68));
    for bar in &result.bars {
        println!(
            "  {:<22} {:>14.2} {:>14.2} {:>14.2}",
            bar.param_name, bar.npv_at_low, bar.npv_at_high, bar.delta_npv
        );
    }

    let out_path = PathBuf::from(output);
    output::save_tornado_csv(&result, &out_path)?;
    println!("\nSaved tornado bars to {}", out_path.display());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_pilot(
    scenario_path: &Option<String>,
    variant: usize,
    target: &str,
    confidence: f64,
    min_fleet: u32,
    max_fleet: u32,
    max_iterations: u32,
    break_even_target: Option<u32>,
    npv_policy: &str,
) -> Result<(), SimError> {
    let scenario = load_scenario(scenario_path)?;
    let charger = scenario.charger_variants.get(variant).ok_or_else(|| {
        SimError::validation("charger_variants", variant, "an index within the configured variants")
    })?;

    let target_metric = match target {
        "positive_ncf" => TargetMetric::PositiveNcf,
        "positive_npv" => TargetMetric::PositiveNpv,
        "break_even_within" => TargetMetric::BreakEvenWithin,
        other => {
            return Err(SimError::validation(
                "target",
                other,
                "positive_ncf | positive_npv | break_even_within",
            ))
        }
    };
    let policy = match npv_policy {
        "representative" => NpvPolicy::Representative,
        "confidence_percentile" => NpvPolicy::ConfidencePercentile,
        other => {
            return Err(SimError::validation(
                "npv_policy",
                other,
                "representative | confidence_percentile",
            ))
        }
    };

    println!(
        "Pilot sizing: target {target}, confidence {confidence}%, fleet {min_fleet}..{max_fleet}"
    );

    let result = find_minimum_fleet_size(
        &scenario,
        charger,
        target_metric,
        confidence,
        min_fleet,
        max_fleet,
        max_iterations,
        break_even_target,
        policy,
        &CancelToken::new(),
    )?;

    println!("\n  Search log:");
    for entry in &result.search_log {
        println!(
            "    fleet {:>6}  npv {:>14}  ncf {:>14}  be {:>5}  {}",
            entry.fleet_size,
            entry.npv.map(|v| format!("{v:.0}")).unwrap_or_else(|| "-".into()),
            entry.ncf.map(|v| format!("{v:.0}")).unwrap_or_else(|| "-".into()),
            entry
                .break_even_month
                .map(|m| m.to_string())
                .unwrap_or_else(|| "-".into()),
            if entry.passed { "PASS" } else { "fail" },
        );
    }

    if result.achieved {
        println!(
            "\nMinimum fleet: {} vehicles ({} iterations)",
            result.recommended_fleet_size, result.search_iterations
        );
        if let Some(npv) = result.best_npv {
            println!("NPV at that scale: {npv:.2}");
        }
    } else {
        println!(
            "\nTarget not achievable within bounds; best effort = {} vehicles",
            result.recommended_fleet_size
        );
    }
    Ok(())
}

fn cmd_variance(
    scenario_path: &Option<String>,
    variant: usize,
    bms: &Option<String>,
    failures: &Option<String>,
    output: &str,
) -> Result<(), SimError> {
    let scenario = load_scenario(scenario_path)?;
    let charger = scenario.charger_variants.get(variant).ok_or_else(|| {
        SimError::validation("charger_variants", variant, "an index within the configured variants")
    })?;

    let field_data = load_field_data(bms, failures)?;
    println!(
        "Field data: {} BMS rows ({} packs), {} failure events ({} docks)",
        field_data.bms_records.len(),
        field_data.num_unique_packs(),
        field_data.charger_failure_records.len(),
        field_data.num_unique_docks(),
    );

    let report = compute_variance_report(
        &field_data,
        &scenario.pack,
        charger,
        Some(&scenario.chaos),
        Some(&scenario.station),
    );

    for d in &report.degradation_monthly {
        println!(
            "  month {:>3}: projected SOH {:.4}, actual {:.4} ({:+.2}%, {} packs)",
            d.month, d.projected_avg_soh, d.actual_avg_soh, d.variance_pct, d.num_packs_sampled
        );
    }
    for m in &report.mtbf_variance {
        println!(
            "  MTBF [{}]: spec {:.0} h, actual {:.0} h ({:+.2}%)",
            m.charger_variant_name.as_deref().unwrap_or("aggregate"),
            m.projected_mtbf_hours,
            m.actual_mtbf_hours,
            m.variance_pct
        );
    }
    if let Some(drift) = report.overall_soh_drift_pct {
        println!("  Overall SOH drift: {drift:+.2}%");
    }
    if let Some(drift) = report.overall_mtbf_drift_pct {
        println!("  Overall MTBF drift: {drift:+.2}%");
    }

    let out_path = PathBuf::from(output);
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&out_path, serde_json::to_string_pretty(&report)?)?;
    println!("\nSaved variance report to {}", out_path.display());
    Ok(())
}

fn cmd_tune(
    scenario_path: &Option<String>,
    variant: usize,
    bms: &Option<String>,
    failures: &Option<String>,
    min_confidence: f64,
    alert_threshold_pct: f64,
) -> Result<(), SimError> {
    let scenario = load_scenario(scenario_path)?;
    let charger = scenario.charger_variants.get(variant).ok_or_else(|| {
        SimError::validation("charger_variants", variant, "an index within the configured variants")
    })?;

    let field_data = load_field_data(bms, failures)?;
    let tune = auto_tune_parameters(&field_data, &scenario, charger, min_confidence);

    println!(
        "Auto-tune over {} months of data ({} packs, {} failure events):",
        tune.data_months_used, tune.num_packs_used, tune.num_failure_events_used
    );
    if tune.parameters.is_empty() {
        println!("  No parameter cleared the {min_confidence:.2} confidence floor.");
        return Ok(());
    }
    for p in &tune.parameters {
        println!(
            "  {:<40} {:.6} -> {:.6} ({:+.1}%, confidence {:.2})",
            p.param_path, p.original_value, p.tuned_value, p.change_pct, p.confidence
        );
    }

    // With multiple variants, check whether the tuned numbers move the ranking.
    if scenario.charger_variants.len() >= 2 {
        let mut original_npvs = HashMap::new();
        let mut tune_results = HashMap::new();
        for (i, variant_cfg) in scenario.charger_variants.iter().enumerate() {
            let mut static_scenario = scenario.clone();
            static_scenario.simulation.engine = swapnet_sim::config::EngineKind::Static;
            original_npvs.insert(variant_cfg.name.clone(), npv_for_variant(&static_scenario, i)?);
            tune_results.insert(
                variant_cfg.name.clone(),
                auto_tune_parameters(&field_data, &scenario, variant_cfg, min_confidence),
            );
        }

        let alerts = check_charger_recommendation(
            &scenario,
            &scenario.charger_variants,
            &tune_results,
            &original_npvs,
            alert_threshold_pct,
        )?;

        if alerts.is_empty() {
            println!("\nNo material NPV shift from field data.");
        } else {
            println!("\nAlerts:");
            for alert in &alerts {
                println!("  [{:?}] {}", alert.severity, alert.message);
            }
        }
    }
    Ok(())
}

//! Charger reliability — stochastic month-by-month failure simulation.
//!
//! The stochastic counterpart of the deterministic fleet TCO. Each dock's
//! age is tracked independently so the Weibull hazard is computed against
//! the right operating history:
//!
//!   exponential (β = 1): constant hazard λ = 1 / MTBF — identical long-run
//!   to the fleet-level expected-value formula, sampled stochastically.
//!
//!   weibull (β ≠ 1): h(t) = (β/η)(t/η)^(β−1); β < 1 infant mortality,
//!   β > 1 wear-out. Scale η = MTBF / Γ(1 + 1/β).
//!
//! Per month, failures per dock ~ Poisson(ΔH) with
//!   ΔH = (t_end/η)^β − (t_start/η)^β, clamped to [0, 100].
//!
//! A dock whose cumulative failures reach the replacement threshold gets a
//! fresh unit in place: age and failure count reset to zero.

use rand::rngs::StdRng;

use crate::config::{ChargerVariant, FailureDistribution};
use crate::demand::sample_poisson;
use crate::util::round2;

/// Average days per month (365.25 / 12) for the hour budget.
const DAYS_PER_MONTH: f64 = 30.4375;

/// Lanczos approximation of Γ(x) for the Weibull scale (g = 7, n = 9,
/// accurate to ~1e-13 over the range a shape parameter can reach).
fn gamma_fn(x: f64) -> f64 {
    const G: f64 = 7.0;
    const COEFFS: [f64; 9] = [
        0.999_999_999_999_809_93,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_13,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];
    if x < 0.5 {
        // Reflection formula.
        std::f64::consts::PI / ((std::f64::consts::PI * x).sin() * gamma_fn(1.0 - x))
    } else {
        let x = x - 1.0;
        let mut a = COEFFS[0];
        let t = x + G + 0.5;
        for (i, &c) in COEFFS.iter().enumerate().skip(1) {
            a += c / (x + i as f64);
        }
        (2.0 * std::f64::consts::PI).sqrt() * t.powf(x + 0.5) * (-t).exp() * a
    }
}

/// Output of one month's charger reliability step.
#[derive(Debug, Clone)]
pub struct ReliabilityStepResult {
    /// Charger failures across the fleet this month.
    pub failures: u32,
    /// Full replacements (cumulative failures hit the threshold).
    pub replacements: u32,
    /// failures × repair_cost_per_event.
    pub repair_cost: f64,
    /// replacements × full_replacement_cost.
    pub replacement_cost: f64,
    /// failures × MTTR.
    pub downtime_hours: f64,
    /// total dock-hours − downtime, clamped ≥ 0.
    pub available_dock_hours: f64,
}

/// Per-dock charger age and failure state for one stochastic run.
#[derive(Debug)]
pub struct ChargerReliabilityTracker {
    repair_cost_per_event: f64,
    full_replacement_cost: f64,
    mttr_hours: f64,
    replacement_threshold: u32,
    hours_per_month: f64,
    beta: f64,
    eta: f64,
    age_hours: Vec<f64>,
    cumulative_failures: Vec<u32>,
}

impl ChargerReliabilityTracker {
    pub fn new(charger: &ChargerVariant, total_docks: u32, operating_hours_per_day: f64) -> Self {
        let beta = match charger.failure_distribution {
            FailureDistribution::Exponential => 1.0,
            FailureDistribution::Weibull => charger.weibull_shape,
        };
        let eta = charger.mtbf_hours / gamma_fn(1.0 + 1.0 / beta);
        ChargerReliabilityTracker {
            repair_cost_per_event: charger.repair_cost_per_event,
            full_replacement_cost: charger.full_replacement_cost,
            mttr_hours: charger.mttr_hours,
            replacement_threshold: charger.replacement_threshold,
            hours_per_month: operating_hours_per_day * DAYS_PER_MONTH,
            beta,
            eta,
            age_hours: vec![0.0; total_docks as usize],
            cumulative_failures: vec![0; total_docks as usize],
        }
    }

    pub fn total_docks(&self) -> usize {
        self.age_hours.len()
    }

    /// Average charger age across all docks (hours).
    pub fn avg_dock_age_hours(&self) -> f64 {
        if self.age_hours.is_empty() {
            return 0.0;
        }
        self.age_hours.iter().sum::<f64>() / self.age_hours.len() as f64
    }

    /// Simulate one month of charger operation.
    pub fn step(&mut self, rng: &mut StdRng) -> ReliabilityStepResult {
        let total_docks = self.age_hours.len();
        if total_docks == 0 {
            return ReliabilityStepResult {
                failures: 0,
                replacements: 0,
                repair_cost: 0.0,
                replacement_cost: 0.0,
                downtime_hours: 0.0,
                available_dock_hours: 0.0,
            };
        }

        let h = self.hours_per_month;
        let mut total_failures = 0u32;
        let mut num_replacements = 0u32;

        for dock in 0..total_docks {
            let t_start = self.age_hours[dock];
            let t_end = t_start + h;

            // Incremental cumulative hazard over the month, clamped for
            // numerical safety before the Poisson draw.
            let delta_h = ((t_end / self.eta).powf(self.beta)
                - (t_start / self.eta).powf(self.beta))
            .clamp(0.0, 100.0);

            let failures = sample_poisson(delta_h, rng) as u32;
            total_failures += failures;
            self.cumulative_failures[dock] += failures;

            if self.cumulative_failures[dock] >= self.replacement_threshold {
                // Fresh unit in place: age and failure count restart.
                num_replacements += 1;
                self.age_hours[dock] = 0.0;
                self.cumulative_failures[dock] = 0;
            } else {
                self.age_hours[dock] += h;
            }
        }

        let repair_cost = total_failures as f64 * self.repair_cost_per_event;
        let replacement_cost = num_replacements as f64 * self.full_replacement_cost;
        let downtime_hours = total_failures as f64 * self.mttr_hours;
        let total_dock_hours = total_docks as f64 * h;
        let available_dock_hours = (total_dock_hours - downtime_hours).max(0.0);

        ReliabilityStepResult {
            failures: total_failures,
            replacements: num_replacements,
            repair_cost: round2(repair_cost),
            replacement_cost: round2(replacement_cost),
            downtime_hours: round2(downtime_hours),
            available_dock_hours: round2(available_dock_hours),
        }
    }
}

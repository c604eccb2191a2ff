//! Stochastic demand generator.
//!
//! Produces 30 non-negative integer daily swap-visit counts for one month:
//! deterministic baseline × seasonal sinusoid × weekend factor, then a draw
//! from the configured distribution. With neutral noise parameters
//! (volatility 0, weekend factor 1, seasonal amplitude 0) the monthly total
//! matches the static engine.

use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Gamma, Normal, Poisson};

use crate::config::{DemandConfig, DemandDistribution};
use crate::results::DerivedParams;

/// Fixed 30-day month used by both engines.
pub const DAYS_PER_MONTH: usize = 30;

/// Generate the 30 daily swap-visit counts for one month.
/// `month` is 1-indexed; month 3 is the seasonal peak, month 9 the trough.
pub fn generate_daily_demand(
    demand: &DemandConfig,
    derived: &DerivedParams,
    fleet_size: u32,
    month: u32,
    rng: &mut StdRng,
) -> [u64; DAYS_PER_MONTH] {
    let base_daily_visits = derived.swap_visits_per_vehicle_per_day * fleet_size as f64;

    let seasonal_factor = 1.0
        + demand.seasonal_amplitude
            * (2.0 * std::f64::consts::PI * month as f64 / 12.0).sin();
    let adjusted_base = base_daily_visits * seasonal_factor;

    // Month starts on a Monday; days 5 and 6 of each 7-day week are weekend.
    let mut daily_means = [0.0f64; DAYS_PER_MONTH];
    for (d, mean) in daily_means.iter_mut().enumerate() {
        *mean = if matches!(d % 7, 5 | 6) {
            adjusted_base * demand.weekend_factor
        } else {
            adjusted_base
        };
    }

    let mut daily_visits = [0u64; DAYS_PER_MONTH];
    match demand.distribution {
        DemandDistribution::Poisson => {
            // Variance = mean; `volatility` is ignored.
            for (d, &mean) in daily_means.iter().enumerate() {
                daily_visits[d] = sample_poisson(mean.max(0.0), rng);
            }
        }
        DemandDistribution::Gamma => {
            if demand.volatility <= 0.0 {
                // Zero noise: deterministic rounding.
                for (d, &mean) in daily_means.iter().enumerate() {
                    daily_visits[d] = mean.max(0.0).round() as u64;
                }
            } else {
                // mean = shape × scale, CoV = 1/√shape  →  shape = 1/CoV²,
                // scale = mean × CoV².
                let cov2 = demand.volatility * demand.volatility;
                let shape = 1.0 / cov2;
                for (d, &mean) in daily_means.iter().enumerate() {
                    let scale = (mean.max(0.0) * cov2).max(1e-10);
                    let gamma = Gamma::new(shape, scale).expect("gamma params checked");
                    let draw: f64 = gamma.sample(rng);
                    daily_visits[d] = draw.round().max(0.0) as u64;
                }
            }
        }
        DemandDistribution::Bimodal => {
            // Mean-preserving two-peak normal mixture: with weight w the day
            // draws around the low peak, otherwise around the high peak.
            let w = demand.bimodal_peak_ratio;
            for (d, &mean) in daily_means.iter().enumerate() {
                let mean = mean.max(0.0);
                let low_mean = mean - demand.bimodal_peak_separation * mean * (1.0 - w);
                let high_mean = mean + demand.bimodal_peak_separation * mean * w;
                let std = (demand.bimodal_std_ratio * mean).max(1e-10);
                let peak_mean = if rng.gen::<f64>() < w { low_mean } else { high_mean };
                let normal = Normal::new(peak_mean, std).expect("normal params checked");
                let draw: f64 = normal.sample(rng);
                daily_visits[d] = draw.round().max(0.0) as u64;
            }
        }
    }

    daily_visits
}

/// Total swap visits and cycles for one month.
pub fn generate_monthly_demand(
    demand: &DemandConfig,
    derived: &DerivedParams,
    fleet_size: u32,
    month: u32,
    packs_per_vehicle: u32,
    rng: &mut StdRng,
) -> (u64, u64) {
    let daily = generate_daily_demand(demand, derived, fleet_size, month, rng);
    let swap_visits: u64 = daily.iter().sum();
    let total_cycles = swap_visits * packs_per_vehicle as u64;
    (swap_visits, total_cycles)
}

/// Poisson draw that tolerates a zero rate (Poisson::new rejects λ = 0).
pub(crate) fn sample_poisson(lambda: f64, rng: &mut StdRng) -> u64 {
    if lambda <= 0.0 {
        return 0;
    }
    let poisson = Poisson::new(lambda).expect("positive lambda");
    let draw: f64 = poisson.sample(rng);
    draw as u64
}

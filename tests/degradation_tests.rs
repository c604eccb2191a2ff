/// Cohort degradation tracker: lumpy retirements, auto-replacement, and the
/// cohort lifecycle guarantees.
use approx::assert_relative_eq;

use swapnet_sim::config::{ChaosConfig, PackSpec};
use swapnet_sim::degradation::DegradationTracker;

fn pack(beta_pct: f64, calendar_pct: f64, retirement: f64) -> PackSpec {
    PackSpec {
        cycle_degradation_rate_pct: beta_pct,
        calendar_aging_rate_pct_per_month: calendar_pct,
        retirement_soh_pct: retirement,
        ..PackSpec::default()
    }
}

#[test]
fn lumpy_retirement_at_month_three() {
    // β = 0.10%/cycle, no calendar aging, retire at 0.70. 100 packs doing
    // 10 000 fleet cycles/month → 100 cycles/pack → 0.10 SOH loss/month.
    // 1.0 → 0.9 → 0.8 → 0.7: the whole cohort retires in month 3 and the
    // months around it book zero replacement CapEx.
    let mut tracker = DegradationTracker::new(&pack(0.10, 0.0, 0.70), &ChaosConfig::default(), true);
    tracker.add_cohort(100, 1);

    let mut retired_by_month = Vec::new();
    for month in 1..=5 {
        let result = tracker.step(month, 10_000);
        retired_by_month.push(result.packs_retired);
    }

    assert_eq!(retired_by_month, vec![0, 0, 100, 0, 0]);
}

#[test]
fn auto_replace_births_fresh_cohort() {
    let mut tracker = DegradationTracker::new(&pack(0.10, 0.0, 0.70), &ChaosConfig::default(), true);
    tracker.add_cohort(100, 1);

    let mut retirement = None;
    for month in 1..=3 {
        let result = tracker.step(month, 10_000);
        if result.packs_retired > 0 {
            retirement = Some(result);
        }
    }
    let result = retirement.expect("cohort should retire in month 3");
    assert_eq!(result.packs_retired, 100);
    assert_eq!(result.packs_replaced, 100);
    assert_eq!(result.active_pack_count, 100);
    // Replacement cohort enters at full health.
    assert_relative_eq!(result.avg_soh, 1.0, epsilon = 1e-9);

    let fresh = result
        .cohort_snapshots
        .iter()
        .find(|c| c.born_month == 3)
        .expect("replacement cohort born in month 3");
    assert!(!fresh.is_retired);
    assert_eq!(fresh.pack_count, 100);
}

#[test]
fn no_auto_replace_drains_the_fleet() {
    let mut tracker =
        DegradationTracker::new(&pack(0.10, 0.0, 0.70), &ChaosConfig::default(), false);
    tracker.add_cohort(100, 1);

    for month in 1..=3 {
        tracker.step(month, 10_000);
    }
    assert_eq!(tracker.active_pack_count(), 0);

    // With nothing active, a step is a no-op with zero output.
    let result = tracker.step(4, 10_000);
    assert_eq!(result.packs_retired, 0);
    assert_eq!(result.active_pack_count, 0);
    assert_eq!(result.avg_soh, 0.0);
}

#[test]
fn cohorts_never_unretire_and_cycles_never_decrease() {
    let mut tracker = DegradationTracker::new(&pack(0.05, 0.1, 0.70), &ChaosConfig::default(), true);
    tracker.add_cohort(60, 1);
    tracker.add_cohort(40, 1);

    let mut prev: Vec<(u64, u64, bool, f64)> = Vec::new();
    for month in 1..=24 {
        let result = tracker.step(month, 8_000);
        for snap in &result.cohort_snapshots {
            if let Some((_, prev_cycles, prev_retired, prev_soh)) =
                prev.iter().find(|(id, _, _, _)| *id == snap.cohort_id).copied()
            {
                assert!(snap.cumulative_cycles >= prev_cycles, "cycles regressed");
                if prev_retired {
                    assert!(snap.is_retired, "cohort {} resurrected", snap.cohort_id);
                } else if !snap.is_retired {
                    assert!(snap.current_soh <= prev_soh + 1e-12, "SOH rose while active");
                }
            }
            if let Some(retired_month) = snap.retired_month {
                assert!(retired_month >= snap.born_month);
            }
        }
        prev = result
            .cohort_snapshots
            .iter()
            .map(|c| (c.cohort_id, c.cumulative_cycles, c.is_retired, c.current_soh))
            .collect();
    }
}

#[test]
fn epsilon_absorbs_float_drift_at_the_threshold() {
    // 1.0 − 0.1 × 3 lands at 0.7000000000000001 in IEEE-754; the retirement
    // compare must still fire.
    let mut tracker = DegradationTracker::new(&pack(0.10, 0.0, 0.70), &ChaosConfig::default(), false);
    tracker.add_cohort(1, 1);
    tracker.step(1, 100);
    tracker.step(2, 100);
    let result = tracker.step(3, 100);
    assert_eq!(result.packs_retired, 1);
}

#[test]
fn calendar_aging_retires_idle_packs() {
    // No cycling at all: 1%/month calendar aging alone reaches 0.70 at
    // month 30.
    let mut tracker = DegradationTracker::new(&pack(0.10, 1.0, 0.70), &ChaosConfig::default(), false);
    tracker.add_cohort(10, 1);

    let mut retired_month = None;
    for month in 1..=36 {
        let result = tracker.step(month, 0);
        if result.packs_retired > 0 {
            retired_month = Some(month);
            break;
        }
    }
    assert_eq!(retired_month, Some(30));
}

#[test]
fn avg_soh_is_pack_weighted() {
    let mut tracker = DegradationTracker::new(&pack(0.10, 0.0, 0.50), &ChaosConfig::default(), false);
    tracker.add_cohort(90, 1);
    // Month 1: 10 000 cycles over 90 packs → ~111 cycles/pack.
    tracker.step(1, 10_000);
    let soh_old = tracker.avg_soh();

    // A fresh cohort of 10 shifts the weighted average up by its share.
    tracker.add_cohort(10, 2);
    let blended = tracker.avg_soh();
    assert_relative_eq!(blended, (soh_old * 90.0 + 1.0 * 10.0) / 100.0, epsilon = 1e-9);
}

#[test]
fn aggressiveness_accelerates_retirement() {
    let chaos = ChaosConfig {
        aggressiveness_index: 2.0,
        ..ChaosConfig::default()
    };
    let mut aggressive = DegradationTracker::new(&pack(0.10, 0.0, 0.70), &chaos, false);
    aggressive.add_cohort(100, 1);

    // 0.2 SOH/month: retires in month 2 instead of month 3.
    aggressive.step(1, 10_000);
    let result = aggressive.step(2, 10_000);
    assert_eq!(result.packs_retired, 100);
}

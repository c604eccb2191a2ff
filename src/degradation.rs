//! Battery degradation cohort tracker.
//!
//! Tracks cohorts of packs that entered service together:
//!   1. SOH degrades each month from cycling + calendar aging
//!   2. SOH ≤ retirement threshold → the cohort retires → lumpy CapEx event
//!   3. A replacement cohort is born (SOH = 1.0) in the same month
//!
//! The lumpy CapEx contract is what separates this engine from the
//! uniformly-amortized static one: most months the replacement line is zero,
//! then an entire cohort retires at once and the month shows
//! `packs_retired × unit_cost` out, `packs_retired × salvage` back.
//!
//! SOH model per active cohort per month:
//!   soh_loss_cycling  = (β / 100) × aggressiveness × cycles_per_pack
//!   soh_loss_calendar = calendar_rate_pct / 100
//!   retire when        soh ≤ retirement_soh + 1e-9

use crate::config::{ChaosConfig, PackSpec};
use crate::results::CohortStatus;
use crate::util::round6;

/// Epsilon on the retirement compare — repeated f64 subtraction leaves
/// 1.0 − 0.1 × 3 at 0.7000000000000001, not 0.7.
const SOH_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone)]
struct Cohort {
    cohort_id: u64,
    born_month: u32,
    pack_count: u32,
    current_soh: f64,
    cumulative_cycles: u64,
    is_retired: bool,
    retired_month: Option<u32>,
}

impl Cohort {
    fn to_snapshot(&self) -> CohortStatus {
        CohortStatus {
            cohort_id: self.cohort_id,
            born_month: self.born_month,
            pack_count: self.pack_count,
            current_soh: round6(self.current_soh),
            cumulative_cycles: self.cumulative_cycles,
            is_retired: self.is_retired,
            retired_month: self.retired_month,
        }
    }
}

/// Output of one month's degradation step.
#[derive(Debug, Clone)]
pub struct DegradationStepResult {
    /// Packs that hit the retirement threshold this month.
    pub packs_retired: u32,
    /// Fresh packs added to replace them (= packs_retired with auto-replace).
    pub packs_replaced: u32,
    /// Active (non-retired) packs after this step.
    pub active_pack_count: u32,
    /// Pack-count-weighted average SOH of active packs; 0.0 if none.
    pub avg_soh: f64,
    /// State of every cohort (active + retired) at month end.
    pub cohort_snapshots: Vec<CohortStatus>,
}

/// Owns the cohort store for one stochastic run. Cohorts are append-only and
/// keyed by a monotonic id; retired cohorts are marked in place and never
/// reused.
#[derive(Debug)]
pub struct DegradationTracker {
    beta_per_cycle: f64,
    calendar_per_month: f64,
    retirement_soh: f64,
    auto_replace: bool,
    cohorts: Vec<Cohort>,
    next_id: u64,
}

impl DegradationTracker {
    pub fn new(pack: &PackSpec, chaos: &ChaosConfig, auto_replace: bool) -> Self {
        DegradationTracker {
            beta_per_cycle: (pack.cycle_degradation_rate_pct / 100.0) * chaos.aggressiveness_index,
            calendar_per_month: pack.calendar_aging_rate_pct_per_month / 100.0,
            retirement_soh: pack.retirement_soh_pct,
            auto_replace,
            cohorts: Vec::new(),
            next_id: 0,
        }
    }

    /// Register a new cohort of packs. Returns the assigned cohort id.
    pub fn add_cohort(&mut self, pack_count: u32, born_month: u32) -> u64 {
        let cid = self.next_id;
        self.next_id += 1;
        self.cohorts.push(Cohort {
            cohort_id: cid,
            born_month,
            pack_count,
            current_soh: 1.0,
            cumulative_cycles: 0,
            is_retired: false,
            retired_month: None,
        });
        cid
    }

    /// Total packs across all non-retired cohorts.
    pub fn active_pack_count(&self) -> u32 {
        self.cohorts
            .iter()
            .filter(|c| !c.is_retired)
            .map(|c| c.pack_count)
            .sum()
    }

    /// Pack-count-weighted average SOH of active cohorts.
    pub fn avg_soh(&self) -> f64 {
        let mut total_packs = 0u32;
        let mut weighted = 0.0;
        for c in self.cohorts.iter().filter(|c| !c.is_retired) {
            total_packs += c.pack_count;
            weighted += c.current_soh * c.pack_count as f64;
        }
        if total_packs > 0 {
            weighted / total_packs as f64
        } else {
            0.0
        }
    }

    pub fn cohort_count(&self) -> usize {
        self.cohorts.len()
    }

    /// Current state of every cohort, active and retired.
    pub fn snapshots(&self) -> Vec<CohortStatus> {
        self.cohorts.iter().map(Cohort::to_snapshot).collect()
    }

    /// Advance one month: degrade SOH, mark retirements, auto-replace.
    /// `total_fleet_cycles` is allocated uniformly across active packs.
    pub fn step(&mut self, month: u32, total_fleet_cycles: u64) -> DegradationStepResult {
        let active_packs = self.active_pack_count();
        if active_packs == 0 {
            return DegradationStepResult {
                packs_retired: 0,
                packs_replaced: 0,
                active_pack_count: 0,
                avg_soh: 0.0,
                cohort_snapshots: self.snapshots(),
            };
        }

        let cycles_per_pack = total_fleet_cycles as f64 / active_packs as f64;
        let soh_loss = self.beta_per_cycle * cycles_per_pack + self.calendar_per_month;

        let mut packs_retired = 0u32;
        let mut retired_counts: Vec<u32> = Vec::new();

        for cohort in self.cohorts.iter_mut().filter(|c| !c.is_retired) {
            cohort.current_soh -= soh_loss;
            cohort.cumulative_cycles += cycles_per_pack.round() as u64;

            if cohort.current_soh <= self.retirement_soh + SOH_EPSILON {
                cohort.is_retired = true;
                cohort.retired_month = Some(month);
                packs_retired += cohort.pack_count;
                retired_counts.push(cohort.pack_count);
            }
        }

        let mut packs_replaced = 0u32;
        if self.auto_replace && packs_retired > 0 {
            for count in retired_counts {
                self.add_cohort(count, month);
                packs_replaced += count;
            }
        }

        DegradationStepResult {
            packs_retired,
            packs_replaced,
            active_pack_count: self.active_pack_count(),
            avg_soh: round6(self.avg_soh()),
            cohort_snapshots: self.snapshots(),
        }
    }
}

//! Discounted charger TCO — comparable NPV ranking across variants.
//!
//! Purchase and spares land at t = 0 (no discounting); repairs,
//! replacements, lost revenue, and cycles served are spread uniformly over
//! the horizon and discounted monthly. The discounted CPC divides the NPV
//! of the TCO by the present value of cycles served.

use serde::{Deserialize, Serialize};

use crate::config::{ChargerVariant, SimulationConfig};
use crate::results::ChargerTCOBreakdown;
use crate::util::{round2, round4};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargerNPVResult {
    pub charger_name: String,
    pub undiscounted_tco: f64,
    pub pv_purchase: f64,
    pub pv_repairs: f64,
    pub pv_replacements: f64,
    pub pv_lost_revenue: f64,
    pub pv_spares: f64,
    pub npv_tco: f64,
    /// npv_tco / PV of cycles served.
    pub discounted_cpc: f64,
    /// Running discounted CPC at each month.
    pub monthly_discounted_cpc: Vec<f64>,
}

pub fn compute_charger_npv(
    charger: &ChargerVariant,
    tco: &ChargerTCOBreakdown,
    sim: &SimulationConfig,
) -> ChargerNPVResult {
    let horizon = sim.horizon_months;
    let r_monthly = (1.0 + sim.discount_rate_annual).powf(1.0 / 12.0) - 1.0;

    let pv_purchase = tco.purchase_cost;
    let pv_spares = tco.spare_inventory_cost;

    let (monthly_repair, monthly_replace, monthly_lost_rev, monthly_cycles) = if horizon > 0 {
        let h = horizon as f64;
        (
            tco.total_repair_cost / h,
            tco.total_replacement_cost / h,
            tco.lost_revenue_from_downtime / h,
            tco.cycles_served_over_horizon / h,
        )
    } else {
        (0.0, 0.0, 0.0, 0.0)
    };

    let mut pv_repairs = 0.0;
    let mut pv_replacements = 0.0;
    let mut pv_lost_revenue = 0.0;
    let mut pv_cycles = 0.0;
    let mut running_pv_tco = pv_purchase + pv_spares;
    let mut running_pv_cycles = 0.0;
    let mut monthly_dcpc = Vec::with_capacity(horizon as usize);

    for t in 1..=horizon {
        let df = 1.0 / (1.0 + r_monthly).powi(t as i32);
        pv_repairs += monthly_repair * df;
        pv_replacements += monthly_replace * df;
        pv_lost_revenue += monthly_lost_rev * df;
        pv_cycles += monthly_cycles * df;

        running_pv_tco += (monthly_repair + monthly_replace + monthly_lost_rev) * df;
        running_pv_cycles += monthly_cycles * df;

        let dcpc = if running_pv_cycles > 0.0 {
            running_pv_tco / running_pv_cycles
        } else {
            0.0
        };
        monthly_dcpc.push(round4(dcpc));
    }

    let npv_tco = pv_purchase + pv_repairs + pv_replacements + pv_lost_revenue + pv_spares;
    let discounted_cpc = if pv_cycles > 0.0 { npv_tco / pv_cycles } else { 0.0 };

    ChargerNPVResult {
        charger_name: charger.name.clone(),
        undiscounted_tco: round2(tco.total_tco),
        pv_purchase: round2(pv_purchase),
        pv_repairs: round2(pv_repairs),
        pv_replacements: round2(pv_replacements),
        pv_lost_revenue: round2(pv_lost_revenue),
        pv_spares: round2(pv_spares),
        npv_tco: round2(npv_tco),
        discounted_cpc: round4(discounted_cpc),
        monthly_discounted_cpc: monthly_dcpc,
    }
}

/// Rank variants by discounted CPC, cheapest first.
pub fn rank_charger_variants(results: &mut Vec<ChargerNPVResult>) {
    results.sort_by(|a, b| {
        a.discounted_cpc
            .partial_cmp(&b.discounted_cpc)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

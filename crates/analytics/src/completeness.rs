//! Completeness masking — which cycles of which cohorts are old enough
//! to be fully observable.
//!
//! A cohort spans a whole calendar month, so a cycle only counts as
//! observable once the *last* customer to join could have reached it.
//! The cutoff is rounded per [`CutoffPolicy`] before the comparison;
//! month-end rounding is the conservative default the rest of the
//! pipeline is calibrated against.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use subpulse_core::config::CutoffPolicy;
use subpulse_core::types::{CohortMonth, ShippingCycle};

use crate::schedule;

/// Cohort month → largest cycle number with fully-landed data. Derived
/// on every call, never stored.
pub type CompletenessMask = BTreeMap<CohortMonth, u32>;

/// Last calendar day of the month containing `d`.
fn month_end(d: NaiveDate) -> NaiveDate {
    let (y, m) = if d.month() == 12 {
        (d.year() + 1, 1)
    } else {
        (d.year(), d.month() + 1)
    };
    NaiveDate::from_ymd_opt(y, m, 1).expect("valid month") - chrono::Duration::days(1)
}

fn effective_cutoff(cutoff: NaiveDate, policy: CutoffPolicy) -> NaiveDate {
    match policy {
        CutoffPolicy::MonthEnd => month_end(cutoff),
        CutoffPolicy::Exact => cutoff,
    }
}

/// Largest cycle number N such that cycle N's scheduled ship date falls
/// on or before the (policy-rounded) cutoff. 0 when even cycle 1 is
/// still in the future for this cohort.
pub fn max_eligible_cycle(
    month: CohortMonth,
    cycle: ShippingCycle,
    max_cycles: u32,
    cutoff: NaiveDate,
    policy: CutoffPolicy,
) -> u32 {
    let cutoff = effective_cutoff(cutoff, policy);
    schedule::ship_dates(month, cycle, max_cycles)
        .iter()
        .take_while(|d| **d <= cutoff)
        .count() as u32
}

/// Build the mask for a set of cohort months. Duplicate months collapse
/// to a single entry.
pub fn mask_for_months(
    months: &[CohortMonth],
    cycle: ShippingCycle,
    max_cycles: u32,
    cutoff: NaiveDate,
    policy: CutoffPolicy,
) -> CompletenessMask {
    let mut mask = CompletenessMask::new();
    for &month in months {
        mask.entry(month)
            .or_insert_with(|| max_eligible_cycle(month, cycle, max_cycles, cutoff, policy));
    }
    mask
}

/// Per-cycle eligibility flags for one cohort month
/// (`flags[0]` = cycle 1). Unlike [`max_eligible_cycle`] this does not
/// stop at the first ineligible cycle, so non-monotone schedules from
/// degenerate interval configs are reported cycle by cycle.
pub fn cycle_eligibility(
    month: CohortMonth,
    cycle: ShippingCycle,
    max_cycles: u32,
    cutoff: NaiveDate,
    policy: CutoffPolicy,
) -> Vec<bool> {
    let cutoff = effective_cutoff(cutoff, policy);
    schedule::ship_dates(month, cycle, max_cycles)
        .iter()
        .map(|d| *d <= cutoff)
        .collect()
}

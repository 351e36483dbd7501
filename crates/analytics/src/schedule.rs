//! Expected shipping dates per repeat-purchase cycle.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use subpulse_core::types::{CohortMonth, ShippingCycle};

/// Expected ship dates for one cohort month, one date per cycle
/// (`dates[0]` = cycle 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingScheduleRow {
    pub cohort_month: CohortMonth,
    pub dates: Vec<NaiveDate>,
}

/// Earliest date each cycle could ship for a cohort.
///
/// Cycle 1 ships on the first day of the month after the cohort month —
/// the latest bound for "every member has entered". Cycle 2 follows after
/// `first_interval_days`, each later cycle after `repeat_interval_days`.
/// Intervals are taken as given; zero or negative values are legal and
/// simply produce non-advancing dates.
pub fn ship_dates(month: CohortMonth, cycle: ShippingCycle, cycles: u32) -> Vec<NaiveDate> {
    let mut dates = Vec::with_capacity(cycles as usize);
    let mut date = month.next_month_start();
    for n in 1..=cycles {
        if n == 2 {
            date += chrono::Duration::days(cycle.first_interval_days);
        } else if n > 2 {
            date += chrono::Duration::days(cycle.repeat_interval_days);
        }
        dates.push(date);
    }
    dates
}

/// Display table of expected ship dates, one row per cohort month.
pub fn shipping_schedule(
    months: &[CohortMonth],
    cycle: ShippingCycle,
    cycles: u32,
) -> Vec<ShippingScheduleRow> {
    months
        .iter()
        .map(|&cohort_month| ShippingScheduleRow {
            cohort_month,
            dates: ship_dates(cohort_month, cycle, cycles),
        })
        .collect()
}

//! LTV projection — extends an observed aggregate retention curve to a
//! fixed day horizon with a survival-rate chain.
//!
//! Cycles past the observed range are filled from the caller's forecast
//! overrides when present, otherwise by carrying the last resolved rate
//! and order value forward. Zero or negative continuation rates are
//! propagated untouched; the chain simply collapses toward zero.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use subpulse_core::types::{ProjectedEntry, RetentionEntry, ShippingCycle};

use crate::round1;

/// Upper bound on projected cycles, reached only by degenerate interval
/// configs (repeat interval ≤ 0 never advances the calendar).
const HORIZON_CYCLE_CAP: u32 = 500;

/// Forecast overrides collected from the dashboard's editable projection
/// table, keyed by cycle number. Entries beyond the horizon are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectionOverrides {
    #[serde(default)]
    pub continuation_rate_pct: BTreeMap<u32, f64>,
    #[serde(default)]
    pub avg_order_value: BTreeMap<u32, f64>,
}

/// How many cycles fit inside the horizon: cycle 1 occupies day 0,
/// cycle 2 lands after `first_interval_days`, and every further cycle
/// adds `repeat_interval_days`; counting stops once the cumulative days
/// pass the horizon.
pub fn max_cycles_within(cycle: ShippingCycle, horizon_days: i64) -> u32 {
    if horizon_days <= 0 {
        return 0;
    }
    let mut days = cycle.first_interval_days;
    let mut count = 1u32;
    if days > horizon_days {
        return count;
    }
    count += 1;
    while count < HORIZON_CYCLE_CAP {
        days += cycle.repeat_interval_days;
        if days > horizon_days || cycle.repeat_interval_days <= 0 {
            break;
        }
        count += 1;
    }
    count
}

/// Project the aggregate curve forward to the horizon.
///
/// Per cycle the continuation rate and average order value resolve in
/// priority order: the observed table, then the override maps, then
/// carry-forward of the last resolved value (observed *or* projected).
/// Anything not taken from the observed table is flagged `is_projected`.
/// `base` is the cohort pool's day-0 size, used for the displayed head
/// counts; an empty table or zero base yields an empty projection.
pub fn project(
    observed: &[RetentionEntry],
    base: u64,
    cycle: ShippingCycle,
    horizon_days: i64,
    overrides: &ProjectionOverrides,
) -> Vec<ProjectedEntry> {
    if observed.is_empty() || base == 0 {
        return Vec::new();
    }

    let horizon = max_cycles_within(cycle, horizon_days);
    let by_cycle: BTreeMap<u32, &RetentionEntry> =
        observed.iter().map(|e| (e.cycle_number, e)).collect();

    let mut entries = Vec::with_capacity(horizon as usize);
    let mut carry_rate: Option<f64> = None;
    let mut carry_aov = 0.0;
    let mut prev_survival = 100.0;
    let mut cumulative_ltv = 0.0;

    for n in 1..=horizon {
        let observed_entry = by_cycle
            .get(&n)
            .and_then(|e| e.continuation_rate_pct.map(|r| (r, e.avg_order_value)));

        let (rate, aov, is_projected) = match observed_entry {
            Some((rate, aov)) => (rate, aov.unwrap_or(0.0), false),
            None => {
                let rate = overrides
                    .continuation_rate_pct
                    .get(&n)
                    .copied()
                    .or(carry_rate)
                    .unwrap_or(0.0);
                let aov = overrides
                    .avg_order_value
                    .get(&n)
                    .copied()
                    .unwrap_or(carry_aov);
                (rate, aov, true)
            }
        };
        carry_rate = Some(rate);
        carry_aov = aov;

        // The first cycle's continuation rate *is* its survival rate;
        // after that the chain is multiplicative.
        let survival = if n == 1 {
            rate
        } else {
            prev_survival * rate / 100.0
        };
        cumulative_ltv += survival / 100.0 * aov;

        entries.push(ProjectedEntry {
            cycle_number: n,
            retained_count: (base as f64 * survival / 100.0) as u64,
            survival_rate_pct: round1(survival),
            continuation_rate_pct: round1(rate),
            avg_order_value: aov.round(),
            ltv_to_date: cumulative_ltv.round(),
            is_projected,
        });
        prev_survival = survival;
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    const THIRTY: ShippingCycle = ShippingCycle {
        first_interval_days: 30,
        repeat_interval_days: 30,
    };

    fn entry(
        cycle_number: u32,
        retained: u64,
        continuation: f64,
        aov: f64,
    ) -> RetentionEntry {
        RetentionEntry {
            cycle_number,
            retained_count: retained,
            survival_rate_pct: 0.0,
            continuation_rate_pct: Some(continuation),
            avg_order_value: Some(aov),
            cycle_revenue: 0.0,
            cumulative_revenue: 0.0,
            ltv_to_date: 0.0,
        }
    }

    #[test]
    fn test_one_year_at_thirty_day_cadence_is_thirteen_cycles() {
        assert_eq!(max_cycles_within(THIRTY, 365), 13);
        assert_eq!(max_cycles_within(THIRTY, 29), 1);
        assert_eq!(max_cycles_within(THIRTY, 30), 2);
        assert_eq!(max_cycles_within(THIRTY, 0), 0);
    }

    #[test]
    fn test_degenerate_repeat_interval_is_capped() {
        let zero = ShippingCycle {
            first_interval_days: 0,
            repeat_interval_days: 0,
        };
        assert_eq!(max_cycles_within(zero, 365), 2);
    }

    #[test]
    fn test_projection_fills_beyond_the_observed_range() {
        let observed = vec![entry(1, 100, 100.0, 5_000.0), entry(2, 60, 60.0, 5_000.0)];
        let table = project(&observed, 100, THIRTY, 365, &ProjectionOverrides::default());

        assert_eq!(table.len(), 13);
        assert!(!table[0].is_projected);
        assert!(!table[1].is_projected);
        assert!(table[2].is_projected);

        // Carried-forward 60% continuation keeps halving-ish the chain.
        assert_eq!(table[2].continuation_rate_pct, 60.0);
        assert_eq!(table[2].survival_rate_pct, 36.0);
    }

    #[test]
    fn test_overrides_beat_carry_forward_and_feed_it() {
        let observed = vec![entry(1, 100, 100.0, 5_000.0)];
        let mut overrides = ProjectionOverrides::default();
        overrides.continuation_rate_pct.insert(2, 50.0);
        overrides.avg_order_value.insert(2, 4_000.0);
        // An override far past the horizon must be ignored.
        overrides.continuation_rate_pct.insert(99, 10.0);

        let table = project(&observed, 100, THIRTY, 365, &overrides);
        assert_eq!(table[1].continuation_rate_pct, 50.0);
        assert_eq!(table[1].avg_order_value, 4_000.0);

        // Cycle 3 has no override: it carries the *projected* cycle-2
        // values forward, not the last observed ones.
        assert_eq!(table[2].continuation_rate_pct, 50.0);
        assert_eq!(table[2].avg_order_value, 4_000.0);
        assert_eq!(table.len(), 13);
    }

    #[test]
    fn test_full_continuation_keeps_survival_flat() {
        let observed = vec![entry(1, 100, 100.0, 1_000.0)];
        let mut overrides = ProjectionOverrides::default();
        for n in 2..=13 {
            overrides.continuation_rate_pct.insert(n, 100.0);
        }

        let table = project(&observed, 100, THIRTY, 365, &overrides);
        for row in &table {
            assert_eq!(row.survival_rate_pct, table[0].survival_rate_pct);
        }
    }

    #[test]
    fn test_ltv_is_additive_cycle_by_cycle() {
        let observed = vec![
            entry(1, 100, 100.0, 5_000.0),
            entry(2, 40, 40.0, 4_500.0),
            entry(3, 20, 50.0, 4_500.0),
        ];
        let table = project(&observed, 100, THIRTY, 365, &ProjectionOverrides::default());

        let mut expected = 0.0;
        let mut survival = 100.0;
        for (i, row) in table.iter().enumerate() {
            let rate = row.continuation_rate_pct;
            survival = if i == 0 { rate } else { survival * rate / 100.0 };
            expected += survival / 100.0 * row.avg_order_value;
            assert_eq!(row.ltv_to_date, expected.round());
        }
    }

    #[test]
    fn test_zero_rates_collapse_without_clamping() {
        let observed = vec![entry(1, 100, 100.0, 5_000.0), entry(2, 0, 0.0, 0.0)];
        let table = project(&observed, 100, THIRTY, 365, &ProjectionOverrides::default());

        // Once the chain hits zero it stays there; nothing substitutes a
        // floor rate.
        assert_eq!(table[1].survival_rate_pct, 0.0);
        assert!(table[2..].iter().all(|r| r.survival_rate_pct == 0.0));
        assert!(table[2..].iter().all(|r| r.ltv_to_date == table[1].ltv_to_date));
    }

    #[test]
    fn test_empty_inputs_yield_empty_projection() {
        assert!(project(&[], 100, THIRTY, 365, &ProjectionOverrides::default()).is_empty());
        let observed = vec![entry(1, 100, 100.0, 5_000.0)];
        assert!(project(&observed, 0, THIRTY, 365, &ProjectionOverrides::default()).is_empty());
    }
}

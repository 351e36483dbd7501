//! CSV rendering of the display tables.
//!
//! Plain numbers only — no currency symbols, percent signs, or locale
//! formatting; that belongs to the presentation layer. Pending and
//! no-data cells render as empty fields so spreadsheets keep them
//! distinct from measured zeros.

use std::fmt::Write;

use subpulse_core::types::{CohortRetentionRow, CycleCell, ProjectedEntry, RetentionEntry};

fn opt(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

/// Per-cohort retention table: one row per cohort month, a retained
/// count and survival-rate column pair per cycle.
pub fn retention_table_csv(rows: &[CohortRetentionRow]) -> String {
    let cycles = rows.iter().map(|r| r.cells.len()).max().unwrap_or(0);

    let mut out = String::from("cohort_month,total_new_customers");
    for n in 1..=cycles {
        let _ = write!(out, ",retained_{n},survival_rate_{n}");
    }
    out.push('\n');

    for row in rows {
        let _ = write!(out, "{},{}", row.cohort_month, row.total_new_customers);
        for i in 0..cycles {
            match row.cells.get(i) {
                Some(CycleCell::Observed {
                    retained,
                    survival_rate_pct,
                }) => {
                    let _ = write!(out, ",{retained},{survival_rate_pct}");
                }
                _ => out.push_str(",,"),
            }
        }
        out.push('\n');
    }
    out
}

/// Cross-cohort aggregate table.
pub fn aggregate_csv(entries: &[RetentionEntry]) -> String {
    let mut out = String::from(
        "cycle_number,retained_count,survival_rate_pct,continuation_rate_pct,\
         avg_order_value,cycle_revenue,cumulative_revenue,ltv_to_date\n",
    );
    for e in entries {
        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{},{}",
            e.cycle_number,
            e.retained_count,
            e.survival_rate_pct,
            opt(e.continuation_rate_pct),
            opt(e.avg_order_value),
            e.cycle_revenue,
            e.cumulative_revenue,
            e.ltv_to_date,
        );
    }
    out
}

/// LTV projection table; the trailing column flags forecast rows.
pub fn projection_csv(entries: &[ProjectedEntry]) -> String {
    let mut out = String::from(
        "cycle_number,retained_count,survival_rate_pct,continuation_rate_pct,\
         avg_order_value,ltv_to_date,is_projected\n",
    );
    for e in entries {
        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{}",
            e.cycle_number,
            e.retained_count,
            e.survival_rate_pct,
            e.continuation_rate_pct,
            e.avg_order_value,
            e.ltv_to_date,
            e.is_projected,
        );
    }
    out
}

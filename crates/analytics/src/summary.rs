//! Headline KPI summaries for the dashboard metric row.

use serde::{Deserialize, Serialize};

use subpulse_core::types::CohortSourceRow;

use crate::round1;

/// KPIs over the month-by-month cohort table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonthlySummary {
    pub total_new_customers: u64,
    /// Mean cycle-2 retention across cohorts, in percent.
    pub avg_cycle2_retention_pct: f64,
    /// Final-cycle retention of the most recent cohort, in percent.
    pub latest_final_cycle_retention_pct: f64,
}

/// KPIs over the merged all-cohorts row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateSummary {
    pub total_new_customers: u64,
    pub cycle2_retention_pct: f64,
    /// Cumulative revenue per day-0 customer over the reporting window.
    pub ltv_at_window: f64,
}

/// Summarize the monthly cohort rows. `final_cycle` is the cycle the
/// "long-run retention" KPI reads (typically the configured window, 12).
pub fn monthly_summary(rows: &[CohortSourceRow], final_cycle: u32) -> MonthlySummary {
    if rows.is_empty() {
        return MonthlySummary::default();
    }

    let total_new_customers: u64 = rows.iter().map(|r| r.total_new_customers).sum();

    let rates: Vec<f64> = rows
        .iter()
        .filter(|r| r.total_new_customers > 0)
        .map(|r| r.retained_at(2) as f64 / r.total_new_customers as f64 * 100.0)
        .collect();
    let avg_cycle2 = if rates.is_empty() {
        0.0
    } else {
        rates.iter().sum::<f64>() / rates.len() as f64
    };

    let latest_final = rows
        .iter()
        .max_by_key(|r| r.cohort_month)
        .filter(|r| r.total_new_customers > 0)
        .map(|r| r.retained_at(final_cycle) as f64 / r.total_new_customers as f64 * 100.0)
        .unwrap_or(0.0);

    MonthlySummary {
        total_new_customers,
        avg_cycle2_retention_pct: round1(avg_cycle2),
        latest_final_cycle_retention_pct: round1(latest_final),
    }
}

/// Summarize a single merged warehouse row across `max_cycles` cycles.
pub fn aggregate_summary(row: &CohortSourceRow, max_cycles: u32) -> AggregateSummary {
    let total = row.total_new_customers;
    if total == 0 {
        return AggregateSummary::default();
    }

    let cycle2 = row.retained_at(2) as f64 / total as f64 * 100.0;
    let cumulative: f64 = (1..=max_cycles).map(|n| row.revenue_at(n)).sum();

    AggregateSummary {
        total_new_customers: total,
        cycle2_retention_pct: round1(cycle2),
        ltv_at_window: (cumulative / total as f64).round(),
    }
}

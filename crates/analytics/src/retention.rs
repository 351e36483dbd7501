//! Retention aggregation — per-cohort tables, heatmap matrices, and the
//! cross-cohort aggregate with completeness masking.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use subpulse_core::types::{
    CohortRetentionRow, CohortSourceRow, CycleCell, RetentionEntry, RetentionMatrixRow,
};

use crate::completeness::CompletenessMask;
use crate::round1;

/// Highest cycle number any of the rows carries data for, capped at the
/// configured window. Iterating past this would only report zeros for
/// columns the warehouse never delivered.
fn reported_cycles(rows: &[CohortSourceRow], max_cycles: u32) -> u32 {
    rows.iter()
        .map(|r| r.cycle_count())
        .max()
        .unwrap_or(0)
        .min(max_cycles)
}

// ─── Per-Cohort Table & Matrix ──────────────────────────────────────────────

/// Month-by-cycle retention table. With a mask, cycles beyond a cohort's
/// eligible horizon come back as [`CycleCell::Pending`] rather than a
/// numeric rate; a cohort absent from the mask is treated as fully
/// observable.
pub fn retention_table(
    rows: &[CohortSourceRow],
    max_cycles: u32,
    mask: Option<&CompletenessMask>,
) -> Vec<CohortRetentionRow> {
    let cycles = reported_cycles(rows, max_cycles);

    rows.iter()
        .map(|row| {
            let limit = mask
                .map(|m| m.get(&row.cohort_month).copied().unwrap_or(max_cycles))
                .unwrap_or(max_cycles);
            let total = row.total_new_customers as f64;

            let cells = (1..=cycles)
                .map(|n| {
                    if n > limit {
                        CycleCell::Pending
                    } else {
                        let retained = row.retained_at(n);
                        let survival_rate_pct = if total > 0.0 {
                            round1(retained as f64 / total * 100.0)
                        } else {
                            0.0
                        };
                        CycleCell::Observed {
                            retained,
                            survival_rate_pct,
                        }
                    }
                })
                .collect();

            CohortRetentionRow {
                cohort_month: row.cohort_month,
                total_new_customers: row.total_new_customers,
                cells,
            }
        })
        .collect()
}

/// Heatmap matrix: rows per cohort month, survival rate per cycle,
/// `None` where the cycle is masked.
pub fn rate_matrix(
    rows: &[CohortSourceRow],
    max_cycles: u32,
    mask: Option<&CompletenessMask>,
) -> Vec<RetentionMatrixRow> {
    retention_table(rows, max_cycles, mask)
        .into_iter()
        .map(|row| RetentionMatrixRow {
            cohort_month: row.cohort_month,
            rates: row.cells.iter().map(|c| c.survival_rate()).collect(),
        })
        .collect()
}

// ─── Cross-Cohort Aggregate ─────────────────────────────────────────────────

/// Merge cohorts into one retention curve, cycle by cycle, only ever
/// combining cohorts whose data for that cycle is complete.
///
/// For each cycle N the pool is the cohorts with `max_eligible_cycle ≥ N`
/// (a cohort absent from the mask is excluded). Survival uses the pool's
/// summed day-0 base; continuation uses the *same* pool's cycle N−1
/// count, so the ratio stays internally consistent as the pool shrinks.
/// Iteration stops at the first cycle with no eligible pool, an empty
/// base, or (beyond cycle 1) zero retained customers.
pub fn aggregate_table(
    rows: &[CohortSourceRow],
    max_cycles: u32,
    mask: &CompletenessMask,
) -> Vec<RetentionEntry> {
    let cycles = reported_cycles(rows, max_cycles);
    let mut entries = Vec::new();
    let mut cumulative_revenue = 0.0;

    for n in 1..=cycles {
        let eligible: Vec<&CohortSourceRow> = rows
            .iter()
            .filter(|r| mask.get(&r.cohort_month).copied().unwrap_or(0) >= n)
            .collect();
        if eligible.is_empty() {
            break;
        }

        let base: u64 = eligible.iter().map(|r| r.total_new_customers).sum();
        if base == 0 {
            break;
        }

        let retained: u64 = eligible.iter().map(|r| r.retained_at(n)).sum();
        if retained == 0 && n > 1 {
            break;
        }

        let prev_retained: u64 = if n == 1 {
            base
        } else {
            eligible.iter().map(|r| r.retained_at(n - 1)).sum()
        };
        let revenue: f64 = eligible.iter().map(|r| r.revenue_at(n)).sum();
        cumulative_revenue += revenue;

        entries.push(build_entry(
            n,
            retained,
            base,
            prev_retained,
            revenue,
            cumulative_revenue,
        ));
    }

    entries
}

/// Aggregate curve from a single pre-merged warehouse row (no masking —
/// the caller has already decided every cycle is comparable).
pub fn aggregate_table_unmasked(row: &CohortSourceRow, max_cycles: u32) -> Vec<RetentionEntry> {
    if row.total_new_customers == 0 {
        return Vec::new();
    }

    let cycles = row.cycle_count().min(max_cycles);
    let base = row.total_new_customers;
    let mut entries = Vec::new();
    let mut cumulative_revenue = 0.0;
    let mut prev_retained = base;

    for n in 1..=cycles {
        let retained = row.retained_at(n);
        if retained == 0 && n > 1 {
            break;
        }
        let revenue = row.revenue_at(n);
        cumulative_revenue += revenue;

        entries.push(build_entry(
            n,
            retained,
            base,
            prev_retained,
            revenue,
            cumulative_revenue,
        ));
        prev_retained = retained;
    }

    entries
}

fn build_entry(
    cycle_number: u32,
    retained: u64,
    base: u64,
    prev_retained: u64,
    revenue: f64,
    cumulative_revenue: f64,
) -> RetentionEntry {
    let survival_rate_pct = round1(retained as f64 / base as f64 * 100.0);
    let continuation_rate_pct = if prev_retained > 0 {
        Some(round1(retained as f64 / prev_retained as f64 * 100.0))
    } else {
        None
    };
    let avg_order_value = if retained > 0 {
        Some((revenue / retained as f64).round())
    } else {
        None
    };

    RetentionEntry {
        cycle_number,
        retained_count: retained,
        survival_rate_pct,
        continuation_rate_pct,
        avg_order_value,
        cycle_revenue: revenue.round(),
        cumulative_revenue: cumulative_revenue.round(),
        ltv_to_date: (cumulative_revenue / base as f64).round(),
    }
}

// ─── Drill-Down Grouping ────────────────────────────────────────────────────

fn group_by_dimension<'a>(
    rows: &'a [CohortSourceRow],
) -> BTreeMap<String, Vec<&'a CohortSourceRow>> {
    let mut groups: BTreeMap<String, Vec<&CohortSourceRow>> = BTreeMap::new();
    for row in rows {
        if let Some(dim) = &row.dimension {
            groups.entry(dim.clone()).or_default().push(row);
        }
    }
    groups
}

/// Per-dimension retention tables (product name, ad group, category, …).
/// Rows without a dimension value are skipped.
pub fn drilldown_tables(
    rows: &[CohortSourceRow],
    max_cycles: u32,
) -> BTreeMap<String, Vec<CohortRetentionRow>> {
    group_by_dimension(rows)
        .into_iter()
        .map(|(dim, group)| {
            let owned: Vec<CohortSourceRow> = group.into_iter().cloned().collect();
            (dim, retention_table(&owned, max_cycles, None))
        })
        .collect()
}

/// Per-dimension heatmap matrices.
pub fn drilldown_matrices(
    rows: &[CohortSourceRow],
    max_cycles: u32,
) -> BTreeMap<String, Vec<RetentionMatrixRow>> {
    group_by_dimension(rows)
        .into_iter()
        .map(|(dim, group)| {
            let owned: Vec<CohortSourceRow> = group.into_iter().cloned().collect();
            (dim, rate_matrix(&owned, max_cycles, None))
        })
        .collect()
}

// ─── Dimension Summaries ────────────────────────────────────────────────────

/// One cycle column of a transposed dimension summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryColumn {
    pub cycle_number: u32,
    pub continuation_rate_pct: Option<f64>,
    pub survival_rate_pct: f64,
    pub retained_count: u64,
}

/// Transposed all-months summary for one drill-down value: continuation,
/// survival, and head count per cycle (`columns[0]` = cycle 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionSummary {
    pub dimension: String,
    pub columns: Vec<SummaryColumn>,
}

/// Build the summary for `dimension`. With a mask, each cycle merges
/// only the cohort months complete for it (and a month missing from the
/// mask is excluded); without one, all months merge everywhere. Returns
/// `None` when the dimension has no rows or no measurable base.
pub fn dimension_summary(
    rows: &[CohortSourceRow],
    dimension: &str,
    max_cycles: u32,
    mask: Option<&CompletenessMask>,
) -> Option<DimensionSummary> {
    let group: Vec<&CohortSourceRow> = rows
        .iter()
        .filter(|r| r.dimension.as_deref() == Some(dimension))
        .collect();
    if group.is_empty() {
        return None;
    }

    let cycles = group
        .iter()
        .map(|r| r.cycle_count())
        .max()
        .unwrap_or(0)
        .min(max_cycles);
    let mut columns = Vec::new();

    for n in 1..=cycles {
        let pool: Vec<&CohortSourceRow> = match mask {
            Some(m) => group
                .iter()
                .filter(|r| m.get(&r.cohort_month).copied().unwrap_or(0) >= n)
                .copied()
                .collect(),
            None => group.clone(),
        };
        if pool.is_empty() {
            break;
        }

        let base: u64 = pool.iter().map(|r| r.total_new_customers).sum();
        if base == 0 {
            break;
        }
        let retained: u64 = pool.iter().map(|r| r.retained_at(n)).sum();
        if retained == 0 && n > 1 {
            break;
        }

        let survival_rate_pct = round1(retained as f64 / base as f64 * 100.0);
        let continuation_rate_pct = if n == 1 {
            Some(survival_rate_pct)
        } else {
            let prev: u64 = pool.iter().map(|r| r.retained_at(n - 1)).sum();
            (prev > 0).then(|| round1(retained as f64 / prev as f64 * 100.0))
        };

        columns.push(SummaryColumn {
            cycle_number: n,
            continuation_rate_pct,
            survival_rate_pct,
            retained_count: retained,
        });
    }

    if columns.is_empty() {
        return None;
    }
    Some(DimensionSummary {
        dimension: dimension.to_string(),
        columns,
    })
}

/// Drop summary columns the *latest* cohort month cannot vouch for yet.
/// Used on the default product screen, where one summary stands in for
/// all months and the newest month bounds what is safe to show.
pub fn truncate_to_complete(summary: DimensionSummary, max_complete: u32) -> DimensionSummary {
    DimensionSummary {
        dimension: summary.dimension,
        columns: summary
            .columns
            .into_iter()
            .filter(|c| c.cycle_number <= max_complete)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use subpulse_core::types::CohortMonth;

    fn month(s: &str) -> CohortMonth {
        s.parse().unwrap()
    }

    fn row(m: &str, total: u64, retained: &[u64]) -> CohortSourceRow {
        let mut r = CohortSourceRow::new(month(m), total);
        r.retained = retained.to_vec();
        r
    }

    fn two_cohorts() -> (Vec<CohortSourceRow>, CompletenessMask) {
        // Cohort A observable through cycle 3, cohort B through cycle 2.
        let rows = vec![
            row("2024-01", 100, &[100, 40, 20]),
            row("2024-02", 50, &[50, 25, 0]),
        ];
        let mut mask = CompletenessMask::new();
        mask.insert(month("2024-01"), 3);
        mask.insert(month("2024-02"), 2);
        (rows, mask)
    }

    #[test]
    fn test_aggregate_restricts_each_cycle_to_complete_cohorts() {
        let (rows, mask) = two_cohorts();
        let table = aggregate_table(&rows, 12, &mask);

        assert_eq!(table.len(), 3);

        // Cycle 1: both cohorts, 150/150.
        assert_eq!(table[0].retained_count, 150);
        assert_eq!(table[0].survival_rate_pct, 100.0);
        assert_eq!(table[0].continuation_rate_pct, Some(100.0));

        // Cycle 2: both cohorts, 65/150.
        assert_eq!(table[1].retained_count, 65);
        assert_eq!(table[1].survival_rate_pct, 43.3);
        assert_eq!(table[1].continuation_rate_pct, Some(43.3));

        // Cycle 3: only cohort A (B is not complete yet), 20/100,
        // continuation against A's own cycle-2 count.
        assert_eq!(table[2].retained_count, 20);
        assert_eq!(table[2].survival_rate_pct, 20.0);
        assert_eq!(table[2].continuation_rate_pct, Some(50.0));
    }

    #[test]
    fn test_aggregate_ltv_accumulates_revenue_over_the_eligible_base() {
        let mut a = row("2024-01", 100, &[100, 40]);
        a.revenue = vec![500_000.0, 200_000.0];
        let mut mask = CompletenessMask::new();
        mask.insert(month("2024-01"), 2);

        let table = aggregate_table(&[a], 12, &mask);
        assert_eq!(table[0].avg_order_value, Some(5_000.0));
        assert_eq!(table[0].ltv_to_date, 5_000.0);
        assert_eq!(table[1].avg_order_value, Some(5_000.0));
        assert_eq!(table[1].cumulative_revenue, 700_000.0);
        assert_eq!(table[1].ltv_to_date, 7_000.0);
    }

    #[test]
    fn test_aggregate_stops_at_first_fully_pending_cycle() {
        let rows = vec![row("2024-03", 80, &[80, 30, 10])];
        let mut mask = CompletenessMask::new();
        mask.insert(month("2024-03"), 1);

        let table = aggregate_table(&rows, 12, &mask);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_aggregate_reports_cycle_one_even_when_zero() {
        let rows = vec![row("2024-01", 10, &[0, 0])];
        let mut mask = CompletenessMask::new();
        mask.insert(month("2024-01"), 2);

        let table = aggregate_table(&rows, 12, &mask);
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].retained_count, 0);
        assert_eq!(table[0].survival_rate_pct, 0.0);
        // No completed orders: average price is unknowable, not zero.
        assert_eq!(table[0].avg_order_value, None);
    }

    #[test]
    fn test_masked_cells_are_pending_not_zero() {
        let (rows, mask) = two_cohorts();
        let table = retention_table(&rows, 12, Some(&mask));

        // Cohort B, cycle 3 is beyond its eligible horizon.
        assert!(table[1].cells[2].is_pending());
        // Every cell at or below the horizon is numeric.
        assert!(table[0].cells.iter().all(|c| !c.is_pending()));
        assert_eq!(
            table[0].cells[1],
            CycleCell::Observed {
                retained: 40,
                survival_rate_pct: 40.0
            }
        );
    }

    #[test]
    fn test_matrix_mirrors_the_table_mask() {
        let (rows, mask) = two_cohorts();
        let matrix = rate_matrix(&rows, 12, Some(&mask));

        assert_eq!(matrix[0].rates, vec![Some(100.0), Some(40.0), Some(20.0)]);
        assert_eq!(matrix[1].rates, vec![Some(100.0), Some(50.0), None]);
    }

    #[test]
    fn test_unmasked_aggregate_from_merged_row() {
        let mut merged = row("2024-01", 200, &[200, 90, 30]);
        merged.revenue = vec![1_000_000.0, 450_000.0, 150_000.0];

        let table = aggregate_table_unmasked(&merged, 12);
        assert_eq!(table.len(), 3);
        assert_eq!(table[1].continuation_rate_pct, Some(45.0));
        assert_eq!(table[2].continuation_rate_pct, Some(33.3));
        assert_eq!(table[2].ltv_to_date, 8_000.0);

        let empty = aggregate_table_unmasked(&row("2024-01", 0, &[0]), 12);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_drilldowns_group_by_dimension_value() {
        let rows = vec![
            row("2024-01", 100, &[100, 40]).with_dimension("herbal-tea"),
            row("2024-01", 60, &[60, 30]).with_dimension("green-tea"),
            row("2024-02", 20, &[20, 5]).with_dimension("herbal-tea"),
            row("2024-02", 10, &[10, 2]),
        ];

        let tables = drilldown_tables(&rows, 12);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables["herbal-tea"].len(), 2);
        assert_eq!(tables["green-tea"].len(), 1);
    }

    #[test]
    fn test_dimension_summary_masked_pool_shrinks_per_cycle() {
        let rows = vec![
            row("2024-01", 100, &[100, 40, 20]).with_dimension("herbal-tea"),
            row("2024-02", 50, &[50, 25, 0]).with_dimension("herbal-tea"),
        ];
        let mut mask = CompletenessMask::new();
        mask.insert(month("2024-01"), 3);
        mask.insert(month("2024-02"), 2);

        let summary = dimension_summary(&rows, "herbal-tea", 12, Some(&mask)).unwrap();
        assert_eq!(summary.columns.len(), 3);
        assert_eq!(summary.columns[0].continuation_rate_pct, Some(100.0));
        assert_eq!(summary.columns[1].survival_rate_pct, 43.3);
        assert_eq!(summary.columns[2].continuation_rate_pct, Some(50.0));
        assert_eq!(summary.columns[2].retained_count, 20);

        assert!(dimension_summary(&rows, "missing", 12, None).is_none());
    }

    #[test]
    fn test_truncate_to_complete_drops_trailing_columns() {
        let rows = vec![row("2024-01", 100, &[100, 40, 20]).with_dimension("herbal-tea")];
        let summary = dimension_summary(&rows, "herbal-tea", 12, None).unwrap();

        let masked = truncate_to_complete(summary, 1);
        assert_eq!(masked.columns.len(), 1);
        assert_eq!(masked.columns[0].cycle_number, 1);
    }
}

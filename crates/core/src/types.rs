//! Shared domain types for the cohort/LTV computation core.
//!
//! Everything here is plain data: the analytics crate consumes these as
//! immutable inputs and returns them as ordered, display-ready tables.
//! Keyed collections use `BTreeMap` so identical inputs always serialize
//! identically, which the surrounding system relies on for memoization.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::AnalyticsError;

// ─── Cohort Key ─────────────────────────────────────────────────────────────

/// A cohort's calendar month. Parses from and renders as `YYYY-MM`, the
/// key format the warehouse layer emits.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct CohortMonth {
    year: i32,
    month: u32,
}

impl CohortMonth {
    pub fn new(year: i32, month: u32) -> Result<Self, AnalyticsError> {
        if !(1..=12).contains(&month) {
            return Err(AnalyticsError::InvalidCohortKey(format!(
                "{year}-{month}"
            )));
        }
        Ok(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// First day of the month after the cohort month. Cohort entries occur
    /// throughout the cohort month, so this is the earliest date by which
    /// every member has fully entered — cycle 1 of the shipping schedule.
    pub fn next_month_start(&self) -> NaiveDate {
        let (y, m) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        // month validated at construction
        NaiveDate::from_ymd_opt(y, m, 1).expect("valid month")
    }

    /// Last calendar day of the cohort month.
    pub fn last_day(&self) -> NaiveDate {
        self.next_month_start() - chrono::Duration::days(1)
    }
}

impl fmt::Display for CohortMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for CohortMonth {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AnalyticsError::InvalidCohortKey(s.to_string());
        let (y, m) = s.split_once('-').ok_or_else(invalid)?;
        let year: i32 = y.parse().map_err(|_| invalid())?;
        let month: u32 = m.parse().map_err(|_| invalid())?;
        Self::new(year, month)
    }
}

impl TryFrom<String> for CohortMonth {
    type Error = AnalyticsError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<CohortMonth> for String {
    fn from(m: CohortMonth) -> Self {
        m.to_string()
    }
}

// ─── Shipping Cycle ─────────────────────────────────────────────────────────

/// Two-phase shipping cadence of a subscription product: days from cohort
/// entry to the 2nd cycle, then days between each later cycle. Values are
/// taken as given; zero means an immediate repeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingCycle {
    #[serde(default = "default_interval_days")]
    pub first_interval_days: i64,
    #[serde(default = "default_interval_days")]
    pub repeat_interval_days: i64,
}

fn default_interval_days() -> i64 {
    30
}

impl Default for ShippingCycle {
    fn default() -> Self {
        Self {
            first_interval_days: default_interval_days(),
            repeat_interval_days: default_interval_days(),
        }
    }
}

// ─── Raw Cohort Rows ────────────────────────────────────────────────────────

/// One pre-aggregated warehouse row: a cohort month (optionally split by a
/// drill-down dimension such as product name or ad group) with its day-0
/// size and per-cycle retained counts / revenue sums.
///
/// Cycle vectors are 1-based conceptually: `retained[0]` is cycle 1. Short
/// vectors read as zero beyond their length — a missing warehouse column is
/// data that does not exist yet, not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortSourceRow {
    pub cohort_month: CohortMonth,
    #[serde(default)]
    pub dimension: Option<String>,
    pub total_new_customers: u64,
    #[serde(default)]
    pub retained: Vec<u64>,
    #[serde(default)]
    pub revenue: Vec<f64>,
}

impl CohortSourceRow {
    pub fn new(cohort_month: CohortMonth, total_new_customers: u64) -> Self {
        Self {
            cohort_month,
            dimension: None,
            total_new_customers,
            retained: Vec::new(),
            revenue: Vec::new(),
        }
    }

    /// Retained count for a 1-based cycle number; 0 when absent.
    pub fn retained_at(&self, cycle: u32) -> u64 {
        cycle
            .checked_sub(1)
            .and_then(|i| self.retained.get(i as usize).copied())
            .unwrap_or(0)
    }

    /// Revenue for a 1-based cycle number; 0 when absent.
    pub fn revenue_at(&self, cycle: u32) -> f64 {
        cycle
            .checked_sub(1)
            .and_then(|i| self.revenue.get(i as usize).copied())
            .unwrap_or(0.0)
    }

    /// Number of cycles this row carries any data for.
    pub fn cycle_count(&self) -> u32 {
        self.retained.len().max(self.revenue.len()) as u32
    }

    /// Lenient constructor for feeds that deliver loosely typed cells:
    /// nulls, NaNs, and negative values coerce to zero so a partially
    /// broken extract still yields a report.
    pub fn from_raw(
        cohort_month: CohortMonth,
        total_new_customers: Option<f64>,
        retained: &[Option<f64>],
        revenue: &[Option<f64>],
    ) -> Self {
        fn clean_count(v: Option<f64>, coerced: &mut u32) -> u64 {
            match v {
                Some(x) if x.is_finite() && x >= 0.0 => x as u64,
                None => 0,
                _ => {
                    *coerced += 1;
                    0
                }
            }
        }

        let mut coerced = 0u32;
        let total = clean_count(total_new_customers, &mut coerced);
        let retained: Vec<u64> = retained
            .iter()
            .map(|v| clean_count(*v, &mut coerced))
            .collect();
        let revenue: Vec<f64> = revenue
            .iter()
            .map(|v| match v {
                Some(x) if x.is_finite() && *x >= 0.0 => *x,
                Some(_) => {
                    coerced += 1;
                    0.0
                }
                None => 0.0,
            })
            .collect();

        if coerced > 0 {
            warn!(
                cohort = %cohort_month,
                cells = coerced,
                "coerced malformed cohort cells to zero"
            );
        }

        Self {
            cohort_month,
            dimension: None,
            total_new_customers: total,
            retained,
            revenue,
        }
    }

    pub fn with_dimension(mut self, dimension: impl Into<String>) -> Self {
        self.dimension = Some(dimension.into());
        self
    }
}

// ─── Retention Cells & Entries ──────────────────────────────────────────────

/// One cell of the per-cohort retention table. `Pending` marks cycles the
/// cohort has not had enough calendar time to complete — deliberately not
/// a numeric zero, so "nobody continued" and "too early to know" stay
/// distinguishable downstream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum CycleCell {
    Observed { retained: u64, survival_rate_pct: f64 },
    Pending,
}

impl CycleCell {
    pub fn is_pending(&self) -> bool {
        matches!(self, CycleCell::Pending)
    }

    pub fn survival_rate(&self) -> Option<f64> {
        match self {
            CycleCell::Observed {
                survival_rate_pct, ..
            } => Some(*survival_rate_pct),
            CycleCell::Pending => None,
        }
    }
}

/// Per-cohort retention table row: day-0 size plus one cell per cycle
/// (`cells[0]` = cycle 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortRetentionRow {
    pub cohort_month: CohortMonth,
    pub total_new_customers: u64,
    pub cells: Vec<CycleCell>,
}

/// Heatmap row: survival rate per cycle, `None` where the cycle is not
/// yet observable for this cohort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionMatrixRow {
    pub cohort_month: CohortMonth,
    pub rates: Vec<Option<f64>>,
}

/// One cycle of the cross-cohort aggregate table. Rates carry one decimal,
/// currency figures are whole units. `continuation_rate_pct` and
/// `avg_order_value` are `None` when their denominator was zero — a
/// sentinel, never a measured 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionEntry {
    pub cycle_number: u32,
    pub retained_count: u64,
    pub survival_rate_pct: f64,
    pub continuation_rate_pct: Option<f64>,
    pub avg_order_value: Option<f64>,
    pub cycle_revenue: f64,
    pub cumulative_revenue: f64,
    pub ltv_to_date: f64,
}

/// One cycle of an LTV projection. Identical shape to [`RetentionEntry`]
/// where observed; beyond the observed horizon the values come from
/// override maps or carry-forward and `is_projected` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectedEntry {
    pub cycle_number: u32,
    pub retained_count: u64,
    pub survival_rate_pct: f64,
    pub continuation_rate_pct: f64,
    pub avg_order_value: f64,
    pub ltv_to_date: f64,
    pub is_projected: bool,
}

// ─── Tiers ──────────────────────────────────────────────────────────────────

/// A labeled revenue bucket. `sort_order` is the bucket index in the
/// ascending boundary list, so displays stay ordered regardless of how
/// the label strings collate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierAssignment {
    pub label: String,
    pub sort_order: usize,
}

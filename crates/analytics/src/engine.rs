//! Engine facade — holds the loaded configuration (cycle master, tier
//! boundaries, reporting window) and fronts the pure computation
//! modules so callers never juggle per-product settings themselves.

use chrono::NaiveDate;
use tracing::{debug, info};

use subpulse_core::config::AnalyticsConfig;
use subpulse_core::error::AnalyticsResult;
use subpulse_core::types::{
    CohortMonth, CohortRetentionRow, CohortSourceRow, ProjectedEntry, RetentionEntry,
    RetentionMatrixRow, ShippingCycle, TierAssignment,
};

use crate::completeness::{self, CompletenessMask};
use crate::ltv::{self, ProjectionOverrides};
use crate::retention::{self, DimensionSummary};
use crate::schedule::{self, ShippingScheduleRow};
use crate::summary::{self, AggregateSummary, MonthlySummary};
use crate::tier::{self, CustomerValueRecord, TierCycleCount, TierStatusCount};
use crate::upsell::{self, FirstCycleRecord, UpsellRate};

/// Stateless computation over immutable inputs; the only thing held here
/// is configuration, so one engine can serve concurrent dashboards.
pub struct AnalyticsEngine {
    config: AnalyticsConfig,
}

impl AnalyticsEngine {
    pub fn new(config: &AnalyticsConfig) -> Self {
        info!(
            max_cycles = config.max_cycles,
            horizon_days = config.ltv_horizon_days,
            tiers = config.tiers.boundaries.len(),
            "Analytics engine initialized"
        );
        Self {
            config: config.clone(),
        }
    }

    /// Build an engine from `SUBPULSE__*` environment variables.
    pub fn from_env() -> AnalyticsResult<Self> {
        Ok(Self::new(&AnalyticsConfig::load()?))
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    fn cycle_for(&self, product: Option<&str>) -> ShippingCycle {
        self.config.cycles.cycle_for(product)
    }

    fn months_of(rows: &[CohortSourceRow]) -> Vec<CohortMonth> {
        rows.iter().map(|r| r.cohort_month).collect()
    }

    // ─── Schedules & Masks ──────────────────────────────────────────────────

    /// Expected ship date table for the given cohort months.
    pub fn shipping_schedule(
        &self,
        months: &[CohortMonth],
        product: Option<&str>,
    ) -> Vec<ShippingScheduleRow> {
        schedule::shipping_schedule(months, self.cycle_for(product), self.config.max_cycles)
    }

    /// Completeness mask for the given cohort months at a cutoff date.
    pub fn completeness_mask(
        &self,
        months: &[CohortMonth],
        product: Option<&str>,
        cutoff: NaiveDate,
    ) -> CompletenessMask {
        completeness::mask_for_months(
            months,
            self.cycle_for(product),
            self.config.max_cycles,
            cutoff,
            self.config.cutoff_policy,
        )
    }

    // ─── Retention ──────────────────────────────────────────────────────────

    /// Month-by-cycle retention table; masked when a cutoff is supplied.
    pub fn retention_table(
        &self,
        rows: &[CohortSourceRow],
        product: Option<&str>,
        cutoff: Option<NaiveDate>,
    ) -> Vec<CohortRetentionRow> {
        let mask = cutoff.map(|c| self.completeness_mask(&Self::months_of(rows), product, c));
        let table = retention::retention_table(rows, self.config.max_cycles, mask.as_ref());

        metrics::counter!("cohort.tables_built").increment(1);
        debug!(cohorts = table.len(), masked = mask.is_some(), "retention table built");
        table
    }

    /// Heatmap matrix; masked cells are `None` when a cutoff is supplied.
    pub fn rate_matrix(
        &self,
        rows: &[CohortSourceRow],
        product: Option<&str>,
        cutoff: Option<NaiveDate>,
    ) -> Vec<RetentionMatrixRow> {
        let mask = cutoff.map(|c| self.completeness_mask(&Self::months_of(rows), product, c));
        metrics::counter!("cohort.matrices_built").increment(1);
        retention::rate_matrix(rows, self.config.max_cycles, mask.as_ref())
    }

    /// Cross-cohort aggregate, combining only cycle-complete cohorts.
    pub fn aggregate_table(
        &self,
        rows: &[CohortSourceRow],
        product: Option<&str>,
        cutoff: NaiveDate,
    ) -> Vec<RetentionEntry> {
        let mask = self.completeness_mask(&Self::months_of(rows), product, cutoff);
        let table = retention::aggregate_table(rows, self.config.max_cycles, &mask);

        metrics::counter!("cohort.aggregates_built").increment(1);
        debug!(cycles = table.len(), "aggregate retention table built");
        table
    }

    /// Aggregate curve from a warehouse row that was merged upstream.
    pub fn aggregate_table_unmasked(&self, row: &CohortSourceRow) -> Vec<RetentionEntry> {
        metrics::counter!("cohort.aggregates_built").increment(1);
        retention::aggregate_table_unmasked(row, self.config.max_cycles)
    }

    /// Per-dimension retention tables, keyed by dimension value.
    pub fn drilldown_tables(
        &self,
        rows: &[CohortSourceRow],
    ) -> std::collections::BTreeMap<String, Vec<CohortRetentionRow>> {
        retention::drilldown_tables(rows, self.config.max_cycles)
    }

    /// Per-dimension heatmap matrices, keyed by dimension value.
    pub fn drilldown_matrices(
        &self,
        rows: &[CohortSourceRow],
    ) -> std::collections::BTreeMap<String, Vec<RetentionMatrixRow>> {
        retention::drilldown_matrices(rows, self.config.max_cycles)
    }

    /// Transposed all-months summary for one drill-down value. With a
    /// cutoff, each cycle merges only the cohort months complete for it,
    /// using the dimension value's own shipping cycle.
    pub fn dimension_summary(
        &self,
        rows: &[CohortSourceRow],
        dimension: &str,
        cutoff: Option<NaiveDate>,
    ) -> Option<DimensionSummary> {
        let mask =
            cutoff.map(|c| self.completeness_mask(&Self::months_of(rows), Some(dimension), c));
        retention::dimension_summary(rows, dimension, self.config.max_cycles, mask.as_ref())
    }

    /// Trim a dimension summary to what the newest cohort month can
    /// vouch for at the cutoff.
    pub fn truncate_summary_to_latest(
        &self,
        summary: DimensionSummary,
        months: &[CohortMonth],
        product: Option<&str>,
        cutoff: NaiveDate,
    ) -> DimensionSummary {
        let latest_complete = months
            .iter()
            .max()
            .map(|&latest| {
                completeness::max_eligible_cycle(
                    latest,
                    self.cycle_for(product),
                    self.config.max_cycles,
                    cutoff,
                    self.config.cutoff_policy,
                )
            })
            .unwrap_or(0);
        retention::truncate_to_complete(summary, latest_complete)
    }

    // ─── Projection ─────────────────────────────────────────────────────────

    /// Project an observed aggregate curve to the configured horizon.
    /// `base` is the day-0 pool size behind the observed table.
    pub fn project_ltv(
        &self,
        observed: &[RetentionEntry],
        base: u64,
        product: Option<&str>,
        overrides: &ProjectionOverrides,
    ) -> Vec<ProjectedEntry> {
        let table = ltv::project(
            observed,
            base,
            self.cycle_for(product),
            self.config.ltv_horizon_days,
            overrides,
        );

        metrics::counter!("ltv.projections_built").increment(1);
        debug!(
            cycles = table.len(),
            projected = table.iter().filter(|e| e.is_projected).count(),
            "ltv projection built"
        );
        table
    }

    // ─── Upsell ─────────────────────────────────────────────────────────────

    /// Conversion from an entry product to its configured upsell target,
    /// over the entry product's own first-cycle activity window.
    pub fn upsell_rate(
        &self,
        records: &[FirstCycleRecord],
        entry_product: &str,
        explicit_start: Option<NaiveDate>,
        explicit_end: Option<NaiveDate>,
    ) -> Option<UpsellRate> {
        let target = self.config.upsell.target_for(entry_product)?;
        let to = target.upsell_product.clone()?;
        self.windowed_rate(records, entry_product, &to, explicit_start, explicit_end)
    }

    /// Second-stage conversion: upsell product → its follow-on product.
    pub fn second_upsell_rate(
        &self,
        records: &[FirstCycleRecord],
        entry_product: &str,
        explicit_start: Option<NaiveDate>,
        explicit_end: Option<NaiveDate>,
    ) -> Option<UpsellRate> {
        let target = self.config.upsell.target_for(entry_product)?;
        let from = target.upsell_product.clone()?;
        let to = target.second_upsell_product.clone()?;
        self.windowed_rate(records, &from, &to, explicit_start, explicit_end)
    }

    fn windowed_rate(
        &self,
        records: &[FirstCycleRecord],
        from: &str,
        to: &str,
        explicit_start: Option<NaiveDate>,
        explicit_end: Option<NaiveDate>,
    ) -> Option<UpsellRate> {
        let from = vec![from.to_string()];
        let to = vec![to.to_string()];
        let rate = upsell::upsell_rate(records, &to, &from, &from, explicit_start, explicit_end);

        metrics::counter!("upsell.rates_computed").increment(1);
        rate
    }

    // ─── Tiers & Summaries ──────────────────────────────────────────────────

    /// Tier bucket for one customer's lifetime revenue.
    pub fn classify_tier(&self, lifetime_revenue: f64) -> TierAssignment {
        tier::classify(lifetime_revenue, &self.config.tiers.boundaries)
    }

    /// Customer counts per tier × latest subscription status.
    pub fn tier_status_distribution(
        &self,
        customers: &[CustomerValueRecord],
    ) -> Vec<TierStatusCount> {
        tier::status_distribution(customers, &self.config.tiers.boundaries)
    }

    /// Customer counts per tier × max completed cycle.
    pub fn tier_cycle_distribution(
        &self,
        customers: &[CustomerValueRecord],
    ) -> Vec<TierCycleCount> {
        tier::cycle_distribution(customers, &self.config.tiers.boundaries)
    }

    /// Headline KPIs over monthly cohort rows.
    pub fn monthly_summary(&self, rows: &[CohortSourceRow]) -> MonthlySummary {
        summary::monthly_summary(rows, self.config.max_cycles)
    }

    /// Headline KPIs over the merged all-cohorts row.
    pub fn aggregate_summary(&self, row: &CohortSourceRow) -> AggregateSummary {
        summary::aggregate_summary(row, self.config.max_cycles)
    }
}

use serde::Deserialize;

use crate::types::ShippingCycle;

/// Root analytics configuration. Loaded from environment variables with
/// the prefix `SUBPULSE__`; every section has working defaults so an
/// empty environment still yields a usable engine.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsConfig {
    /// Longest repeat-purchase cycle any table reports on.
    #[serde(default = "default_max_cycles")]
    pub max_cycles: u32,
    /// LTV projection horizon in days.
    #[serde(default = "default_ltv_horizon_days")]
    pub ltv_horizon_days: i64,
    #[serde(default)]
    pub cutoff_policy: CutoffPolicy,
    #[serde(default)]
    pub cycles: CycleMasterConfig,
    #[serde(default)]
    pub tiers: TierConfig,
    #[serde(default)]
    pub upsell: UpsellMasterConfig,
}

fn default_max_cycles() -> u32 {
    12
}
fn default_ltv_horizon_days() -> i64 {
    365
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            max_cycles: default_max_cycles(),
            ltv_horizon_days: default_ltv_horizon_days(),
            cutoff_policy: CutoffPolicy::default(),
            cycles: CycleMasterConfig::default(),
            tiers: TierConfig::default(),
            upsell: UpsellMasterConfig::default(),
        }
    }
}

/// How the data-cutoff date is rounded before eligibility checks.
///
/// `MonthEnd` is the conservative default: the cutoff is pushed to the
/// last day of its month, matching the month-granular cohort keys. KPI
/// stability downstream depends on this; `Exact` is the tunable
/// alternative for callers that want per-day precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutoffPolicy {
    #[default]
    MonthEnd,
    Exact,
}

// ─── Shipping Cycle Master ──────────────────────────────────────────────────

/// Per-product shipping cadences with a global fallback.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CycleMasterConfig {
    #[serde(default)]
    pub default: ShippingCycle,
    #[serde(default)]
    pub products: Vec<ProductCycle>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductCycle {
    pub name: String,
    #[serde(flatten)]
    pub cycle: ShippingCycle,
}

impl CycleMasterConfig {
    /// Cycle for a product, falling back to the global default when the
    /// product has no explicit override (or no product was given).
    pub fn cycle_for(&self, product: Option<&str>) -> ShippingCycle {
        product
            .and_then(|name| {
                self.products
                    .iter()
                    .find(|p| p.name == name)
                    .map(|p| p.cycle)
            })
            .unwrap_or(self.default)
    }
}

// ─── Tier Master ────────────────────────────────────────────────────────────

/// Ascending revenue boundaries generating the buckets
/// `[0, b1], (b1, b2], …, (bn, ∞)`.
#[derive(Debug, Clone, Deserialize)]
pub struct TierConfig {
    #[serde(default = "default_tier_boundaries")]
    pub boundaries: Vec<u64>,
}

fn default_tier_boundaries() -> Vec<u64> {
    vec![5_000, 10_000, 30_000, 100_000]
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            boundaries: default_tier_boundaries(),
        }
    }
}

// ─── Upsell Master ──────────────────────────────────────────────────────────

/// Which product(s) count as the upsell destination for a given entry
/// product, including the optional second-stage upsell.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpsellMasterConfig {
    #[serde(default)]
    pub targets: Vec<UpsellTarget>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpsellTarget {
    pub product: String,
    #[serde(default)]
    pub upsell_product: Option<String>,
    #[serde(default)]
    pub second_upsell_product: Option<String>,
}

impl UpsellMasterConfig {
    pub fn target_for(&self, product: &str) -> Option<&UpsellTarget> {
        self.targets.iter().find(|t| t.product == product)
    }
}

impl AnalyticsConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("SUBPULSE")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}

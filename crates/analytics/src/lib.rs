//! Cohort retention, LTV projection, and revenue-tier analytics.
//!
//! Pure, deterministic computation over pre-aggregated warehouse rows:
//! completeness masking, retention/continuation tables, survival-chain
//! LTV projection, upsell conversion, and tier classification. No I/O —
//! the warehouse and UI layers live elsewhere.

pub mod completeness;
pub mod engine;
pub mod export;
pub mod ltv;
pub mod retention;
pub mod schedule;
pub mod summary;
pub mod tier;
pub mod upsell;

pub use completeness::CompletenessMask;
pub use engine::AnalyticsEngine;

/// Rates are reported to one decimal place throughout.
pub(crate) fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

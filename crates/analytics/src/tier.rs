//! Revenue tiers — classify customers by cumulative completed revenue
//! against a configurable ascending boundary list, and aggregate tier
//! distributions for the tier dashboard.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use subpulse_core::types::TierAssignment;

const UNKNOWN_STATUS: &str = "unknown";

/// One customer's lifetime position: total shipped-and-paid revenue,
/// their latest subscription status, and the highest cycle they ever
/// completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerValueRecord {
    pub customer_id: String,
    pub lifetime_revenue: f64,
    #[serde(default)]
    pub subscription_status: Option<String>,
    #[serde(default)]
    pub max_completed_cycle: u32,
}

/// Customer count for one tier × subscription status combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierStatusCount {
    pub tier: TierAssignment,
    pub subscription_status: String,
    pub customer_count: u64,
}

/// Customer count for one tier × max completed cycle combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierCycleCount {
    pub tier: TierAssignment,
    pub cycle_number: u32,
    pub customer_count: u64,
}

/// The bucket at `index` in the ladder `[0, b1], (b1, b2], …, (bn, ∞)`.
fn bucket(index: usize, boundaries: &[u64]) -> TierAssignment {
    let lower = if index == 0 {
        0
    } else {
        boundaries[index - 1] + 1
    };
    let label = match boundaries.get(index) {
        Some(upper) => format!("{lower}-{upper}"),
        None => format!("{lower}+"),
    };
    TierAssignment {
        label,
        sort_order: index,
    }
}

/// Classify cumulative revenue into its tier. The first bucket covers
/// `[0, b1]`, each next one `(b_i, b_{i+1}]`, and everything above the
/// last boundary lands in the open-ended top bucket. `sort_order` is the
/// bucket index, so displays stay ordered however the labels collate.
pub fn classify(lifetime_revenue: f64, boundaries: &[u64]) -> TierAssignment {
    for (index, upper) in boundaries.iter().enumerate() {
        if lifetime_revenue <= *upper as f64 {
            return bucket(index, boundaries);
        }
    }
    bucket(boundaries.len(), boundaries)
}

/// Customer counts per tier × latest subscription status, ordered by
/// tier then status. Missing statuses group under `"unknown"`.
pub fn status_distribution(
    customers: &[CustomerValueRecord],
    boundaries: &[u64],
) -> Vec<TierStatusCount> {
    let mut counts: BTreeMap<(usize, String), u64> = BTreeMap::new();
    for customer in customers {
        let tier = classify(customer.lifetime_revenue, boundaries);
        let status = customer
            .subscription_status
            .clone()
            .unwrap_or_else(|| UNKNOWN_STATUS.to_string());
        *counts.entry((tier.sort_order, status)).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .map(|((index, status), customer_count)| TierStatusCount {
            tier: bucket(index, boundaries),
            subscription_status: status,
            customer_count,
        })
        .collect()
}

/// Customer counts per tier × max completed cycle, ordered by tier then
/// cycle.
pub fn cycle_distribution(
    customers: &[CustomerValueRecord],
    boundaries: &[u64],
) -> Vec<TierCycleCount> {
    let mut counts: BTreeMap<(usize, u32), u64> = BTreeMap::new();
    for customer in customers {
        let tier = classify(customer.lifetime_revenue, boundaries);
        *counts
            .entry((tier.sort_order, customer.max_completed_cycle))
            .or_insert(0) += 1;
    }

    counts
        .into_iter()
        .map(|((index, cycle_number), customer_count)| TierCycleCount {
            tier: bucket(index, boundaries),
            cycle_number,
            customer_count,
        })
        .collect()
}

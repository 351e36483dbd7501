//! Upsell conversion — how many customers who completed a first cycle of
//! one product line also completed a first cycle of another.
//!
//! The comparison window is auto-detected from a reference product set's
//! first-cycle activity and optionally clamped by explicit bounds, so
//! both sides of the ratio are counted over the same stretch of calendar.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::round1;

/// One fully shipped-and-paid first cycle: the product it belongs to and
/// the date it completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirstCycleRecord {
    pub product: String,
    pub completed_on: NaiveDate,
}

/// Inclusive activity window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Windowed conversion result. `rate_pct` is `None` — "no data", never a
/// measured 0% — when the denominator is empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsellRate {
    pub window: DateWindow,
    pub denominator_count: u64,
    pub numerator_count: u64,
    pub rate_pct: Option<f64>,
}

/// `[min, max]` of the reference products' first-cycle dates, or `None`
/// when the reference set saw no activity at all.
pub fn detect_window(records: &[FirstCycleRecord], reference: &[String]) -> Option<DateWindow> {
    let mut dates = records
        .iter()
        .filter(|r| reference.iter().any(|p| p == &r.product))
        .map(|r| r.completed_on);

    let first = dates.next()?;
    let (start, end) = dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
    Some(DateWindow { start, end })
}

/// Intersect a detected window with optional explicit bounds
/// (greatest lower bound, least upper bound).
pub fn clamp_window(
    detected: DateWindow,
    explicit_start: Option<NaiveDate>,
    explicit_end: Option<NaiveDate>,
) -> DateWindow {
    DateWindow {
        start: explicit_start.map_or(detected.start, |s| s.max(detected.start)),
        end: explicit_end.map_or(detected.end, |e| e.min(detected.end)),
    }
}

/// Conversion rate from `denominator` products to `numerator` products,
/// counted over the reference-detected window. `None` when no window can
/// be detected at all.
pub fn upsell_rate(
    records: &[FirstCycleRecord],
    numerator: &[String],
    denominator: &[String],
    reference: &[String],
    explicit_start: Option<NaiveDate>,
    explicit_end: Option<NaiveDate>,
) -> Option<UpsellRate> {
    let window = clamp_window(
        detect_window(records, reference)?,
        explicit_start,
        explicit_end,
    );

    let count_in = |products: &[String]| -> u64 {
        records
            .iter()
            .filter(|r| r.completed_on >= window.start && r.completed_on <= window.end)
            .filter(|r| products.iter().any(|p| p == &r.product))
            .count() as u64
    };

    let denominator_count = count_in(denominator);
    let numerator_count = count_in(numerator);

    Some(UpsellRate {
        window,
        denominator_count,
        numerator_count,
        rate_pct: rate_from_counts(numerator_count, denominator_count),
    })
}

/// The bare ratio for callers that already hold windowed counts.
pub fn rate_from_counts(numerator_count: u64, denominator_count: u64) -> Option<f64> {
    if denominator_count == 0 {
        return None;
    }
    Some(round1(
        numerator_count as f64 / denominator_count as f64 * 100.0,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(product: &str, y: i32, m: u32, d: u32) -> FirstCycleRecord {
        FirstCycleRecord {
            product: product.to_string(),
            completed_on: date(y, m, d),
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_rate_from_counts() {
        assert_eq!(rate_from_counts(20, 80), Some(25.0));
        assert_eq!(rate_from_counts(1, 3), Some(33.3));
        // Zero denominator is "no data", not 0%.
        assert_eq!(rate_from_counts(0, 0), None);
        assert_eq!(rate_from_counts(5, 0), None);
    }

    #[test]
    fn test_window_spans_reference_activity() {
        let records = vec![
            record("starter", 2024, 1, 5),
            record("starter", 2024, 3, 20),
            record("premium", 2024, 6, 1),
        ];
        let window = detect_window(&records, &names(&["starter"])).unwrap();
        assert_eq!(window.start, date(2024, 1, 5));
        assert_eq!(window.end, date(2024, 3, 20));

        assert!(detect_window(&records, &names(&["unknown"])).is_none());
    }

    #[test]
    fn test_explicit_bounds_intersect_the_detected_window() {
        let detected = DateWindow {
            start: date(2024, 1, 5),
            end: date(2024, 3, 20),
        };
        let clamped = clamp_window(detected, Some(date(2024, 2, 1)), Some(date(2024, 12, 31)));
        assert_eq!(clamped.start, date(2024, 2, 1));
        assert_eq!(clamped.end, date(2024, 3, 20));
    }

    #[test]
    fn test_upsell_rate_counts_only_inside_the_window() {
        let mut records = Vec::new();
        for day in 1..=8 {
            records.push(record("starter", 2024, 1, day));
        }
        records.push(record("premium", 2024, 1, 3));
        records.push(record("premium", 2024, 1, 6));
        // Outside the starter window — must not count.
        records.push(record("premium", 2024, 2, 15));

        let rate = upsell_rate(
            &records,
            &names(&["premium"]),
            &names(&["starter"]),
            &names(&["starter"]),
            None,
            None,
        )
        .unwrap();

        assert_eq!(rate.denominator_count, 8);
        assert_eq!(rate.numerator_count, 2);
        assert_eq!(rate.rate_pct, Some(25.0));
    }

    #[test]
    fn test_no_reference_activity_means_no_rate() {
        let records = vec![record("premium", 2024, 1, 3)];
        let rate = upsell_rate(
            &records,
            &names(&["premium"]),
            &names(&["starter"]),
            &names(&["starter"]),
            None,
            None,
        );
        assert!(rate.is_none());
    }
}

//! Property tests for the numeric decisions: retention boundary, free-space
//! rounding, threshold comparison and field range checks.

use std::time::{Duration, SystemTime};

use proptest::prelude::*;
use serde_json::json;

use collector_cleaner::core::validation::{exclusive_percent, positive_u32};
use collector_cleaner::monitor::disk_space::is_below_threshold;
use collector_cleaner::platform::pal::free_pct_rounded;
use collector_cleaner::scanner::retention::{entry_age, is_expired};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Expired exactly when strictly older than the window.
    #[test]
    fn expiry_is_strictly_greater_than_retention(
        age_secs in 0u64..10_000_000,
        keep_days in 1u64..100,
    ) {
        let retention = Duration::from_secs(keep_days * 86_400);
        let age = Duration::from_secs(age_secs);
        prop_assert_eq!(is_expired(age, retention), age_secs > keep_days * 86_400);
        prop_assert!(!is_expired(retention, retention));
    }

    /// Timestamps ahead of the clock never make an entry eligible.
    #[test]
    fn future_timestamps_have_zero_age(ahead_secs in 1u64..10_000_000) {
        let now = SystemTime::now();
        let created = now + Duration::from_secs(ahead_secs);
        prop_assert_eq!(entry_age(created, now), Duration::ZERO);
    }

    /// The rounded percentage is within half a point of the exact ratio.
    #[test]
    fn free_pct_is_nearest_integer(total in 1u64..u64::MAX, numerator in 0u64..=1_000_000) {
        let available =
            u64::try_from(u128::from(total) * u128::from(numerator) / 1_000_000).unwrap();
        let pct = free_pct_rounded(available, total).unwrap();
        prop_assert!(pct <= 100);
        let exact_x2 = u128::from(available) * 200;
        let pct_x2 = u128::from(pct) * 2 * u128::from(total);
        prop_assert!(exact_x2.abs_diff(pct_x2) <= u128::from(total));
    }

    #[test]
    fn free_pct_is_monotone_in_available(
        total in 1u64..1_000_000_000,
        a in 0u64..1_000_000_000,
        b in 0u64..1_000_000_000,
    ) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(free_pct_rounded(lo, total).unwrap() <= free_pct_rounded(hi, total).unwrap());
    }

    #[test]
    fn threshold_comparison_is_strict(free in 0u8..=100, threshold in 1u8..=99) {
        prop_assert_eq!(is_below_threshold(free, threshold), free < threshold);
    }

    #[test]
    fn percent_field_accepts_only_one_to_ninety_nine(value in any::<i64>()) {
        let raw = json!(value);
        let outcome = exclusive_percent(Some(&raw));
        prop_assert_eq!(outcome.is_accepted(), (1..=99).contains(&value));
    }

    #[test]
    fn positive_field_accepts_only_u32_range(value in any::<i64>()) {
        let raw = json!(value);
        let outcome = positive_u32(Some(&raw));
        prop_assert_eq!(outcome.is_accepted(), value >= 1 && value <= i64::from(u32::MAX));
    }
}

#[test]
fn rounding_ties_go_to_even() {
    assert_eq!(free_pct_rounded(125, 1000), Some(12));
    assert_eq!(free_pct_rounded(135, 1000), Some(14));
    assert_eq!(free_pct_rounded(19, 100), Some(19));
    assert_eq!(free_pct_rounded(0, 0), None);
}

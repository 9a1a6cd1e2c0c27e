use chrono::{DateTime, Utc};

use super::ResourceKind;

/// Age bucket derived from days since the last observed activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UsageCategory {
    UpTo3Months,
    ThreeToSixMonths,
    SixToTwelveMonths,
    TwelveToTwentyFourMonths,
    Over24Months,
    NoData,
}

/// Inclusive upper bounds in days, checked in order.
pub const THRESHOLDS: &[(i64, UsageCategory)] = &[
    (90, UsageCategory::UpTo3Months),
    (180, UsageCategory::ThreeToSixMonths),
    (365, UsageCategory::SixToTwelveMonths),
    (730, UsageCategory::TwelveToTwentyFourMonths),
];

impl UsageCategory {
    pub const ALL: [UsageCategory; 6] = [
        UsageCategory::UpTo3Months,
        UsageCategory::ThreeToSixMonths,
        UsageCategory::SixToTwelveMonths,
        UsageCategory::TwelveToTwentyFourMonths,
        UsageCategory::Over24Months,
        UsageCategory::NoData,
    ];

    /// Report label. Roles without activity read "Never used", everything else "No data".
    pub fn label_for(self, kind: ResourceKind) -> &'static str {
        match self {
            UsageCategory::UpTo3Months => "0-3 months",
            UsageCategory::ThreeToSixMonths => "3-6 months",
            UsageCategory::SixToTwelveMonths => "6-12 months",
            UsageCategory::TwelveToTwentyFourMonths => "12-24 months",
            UsageCategory::Over24Months => "Over 24 months",
            UsageCategory::NoData => match kind {
                ResourceKind::Role => "Never used",
                _ => "No data",
            },
        }
    }
}

pub fn categorize(days: i64) -> UsageCategory {
    let days = days.max(0);
    THRESHOLDS
        .iter()
        .find(|(bound, _)| days <= *bound)
        .map(|(_, category)| *category)
        .unwrap_or(UsageCategory::Over24Months)
}

/// Whole days elapsed, truncated. Never negative.
pub fn days_since(ts: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - ts).num_days().max(0)
}

/// Days and category for an optional activity timestamp.
pub fn assess(ts: Option<DateTime<Utc>>, now: DateTime<Utc>) -> (Option<i64>, UsageCategory) {
    match ts {
        Some(ts) => {
            let days = days_since(ts, now);
            (Some(days), categorize(days))
        }
        None => (None, UsageCategory::NoData),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn boundaries() {
        assert_eq!(categorize(0), UsageCategory::UpTo3Months);
        assert_eq!(categorize(90), UsageCategory::UpTo3Months);
        assert_eq!(categorize(91), UsageCategory::ThreeToSixMonths);
        assert_eq!(categorize(180), UsageCategory::ThreeToSixMonths);
        assert_eq!(categorize(181), UsageCategory::SixToTwelveMonths);
        assert_eq!(categorize(365), UsageCategory::SixToTwelveMonths);
        assert_eq!(categorize(366), UsageCategory::TwelveToTwentyFourMonths);
        assert_eq!(categorize(730), UsageCategory::TwelveToTwentyFourMonths);
        assert_eq!(categorize(731), UsageCategory::Over24Months);
        assert_eq!(categorize(10_000), UsageCategory::Over24Months);
    }

    #[test]
    fn negative_days_clamp_to_first_bucket() {
        assert_eq!(categorize(-5), UsageCategory::UpTo3Months);
    }

    #[test]
    fn monotonic_over_range() {
        let mut previous = categorize(0);
        for days in 1..1000 {
            let current = categorize(days);
            assert!(current >= previous, "category went backwards at {}", days);
            previous = current;
        }
    }

    #[test]
    fn six_distinct_labels() {
        let labels: std::collections::HashSet<_> = UsageCategory::ALL
            .iter()
            .map(|c| c.label_for(ResourceKind::Function))
            .collect();
        assert_eq!(labels.len(), 6);
        assert_eq!(
            UsageCategory::NoData.label_for(ResourceKind::Role),
            "Never used"
        );
        assert_eq!(
            UsageCategory::NoData.label_for(ResourceKind::NetworkInterface),
            "No data"
        );
    }

    #[test]
    fn days_since_truncates() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(days_since(now - Duration::hours(47), now), 1);
        assert_eq!(days_since(now - Duration::days(91), now), 91);
        assert_eq!(days_since(now + Duration::days(2), now), 0);
    }

    #[test]
    fn assess_without_timestamp_is_no_data() {
        let now = Utc::now();
        assert_eq!(assess(None, now), (None, UsageCategory::NoData));
        assert_eq!(
            assess(Some(now - Duration::days(200)), now),
            (Some(200), UsageCategory::SixToTwelveMonths)
        );
    }
}

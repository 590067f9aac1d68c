//! Expiry status classification
//!
//! Pure functions: the reference time is always passed in, never read from a clock.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use std::fmt;

/// Items expiring within this many days (inclusive) are flagged as nearing expiry
pub const NEARING_WINDOW_DAYS: i64 = 7;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Expiry urgency of an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryStatus {
    Expired,
    Nearing,
    Normal,
}

impl ExpiryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpiryStatus::Expired => "expired",
            ExpiryStatus::Nearing => "nearing",
            ExpiryStatus::Normal => "normal",
        }
    }
}

impl fmt::Display for ExpiryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Whole days until `expiry_date` (taken at midnight), rounded up
///
/// Anything later on the expiry day itself still counts as 0.
pub fn days_until(expiry_date: NaiveDate, now: NaiveDateTime) -> i64 {
    let expiry = expiry_date.and_time(NaiveTime::MIN);
    let seconds = (expiry - now).num_seconds();
    // ceil(seconds / day) for either sign
    -(-seconds).div_euclid(SECONDS_PER_DAY)
}

/// Classify an expiry date relative to `now`
pub fn classify(expiry_date: NaiveDate, now: NaiveDateTime) -> ExpiryStatus {
    let days = days_until(expiry_date, now);
    if days < 0 {
        ExpiryStatus::Expired
    } else if days <= NEARING_WINDOW_DAYS {
        ExpiryStatus::Nearing
    } else {
        ExpiryStatus::Normal
    }
}

/// Classify against a calendar day, treating `today` as its midnight
pub fn classify_on(expiry_date: NaiveDate, today: NaiveDate) -> ExpiryStatus {
    classify(expiry_date, today.and_time(NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(day: NaiveDate, h: u32, min: u32) -> NaiveDateTime {
        day.and_hms_opt(h, min, 0).unwrap()
    }

    #[test]
    fn expiring_today_is_nearing() {
        let today = date(2025, 1, 10);
        assert_eq!(classify_on(today, today), ExpiryStatus::Nearing);
        assert_eq!(classify(today, at(today, 18, 30)), ExpiryStatus::Nearing);
    }

    #[test]
    fn yesterday_is_expired() {
        let today = date(2025, 1, 10);
        let yesterday = today - Duration::days(1);
        assert_eq!(classify_on(yesterday, today), ExpiryStatus::Expired);
        assert_eq!(classify(yesterday, at(today, 9, 0)), ExpiryStatus::Expired);
    }

    #[test]
    fn seven_days_out_is_nearing() {
        let today = date(2025, 1, 10);
        assert_eq!(
            classify_on(today + Duration::days(7), today),
            ExpiryStatus::Nearing
        );
        assert_eq!(
            classify(today + Duration::days(7), at(today, 12, 0)),
            ExpiryStatus::Nearing
        );
    }

    #[test]
    fn eight_days_out_is_normal() {
        let today = date(2025, 1, 10);
        assert_eq!(
            classify_on(today + Duration::days(8), today),
            ExpiryStatus::Normal
        );
        assert_eq!(
            classify(today + Duration::days(8), at(today, 23, 59)),
            ExpiryStatus::Normal
        );
    }

    #[test]
    fn days_until_rounds_up() {
        let today = date(2025, 1, 10);
        assert_eq!(days_until(today, at(today, 0, 0)), 0);
        assert_eq!(days_until(today, at(today, 15, 0)), 0);
        assert_eq!(days_until(today + Duration::days(1), at(today, 15, 0)), 1);
        assert_eq!(days_until(today - Duration::days(1), at(today, 15, 0)), -1);
        assert_eq!(days_until(today - Duration::days(30), today.and_time(NaiveTime::MIN)), -30);
    }

    #[test]
    fn crosses_month_and_year_boundaries() {
        assert_eq!(days_until(date(2025, 1, 1), at(date(2024, 12, 31), 8, 0)), 1);
        // 2024 is a leap year
        assert_eq!(classify_on(date(2024, 2, 29), date(2024, 2, 22)), ExpiryStatus::Nearing);
        assert_eq!(classify_on(date(2024, 3, 1), date(2024, 2, 22)), ExpiryStatus::Normal);
    }

    #[test]
    fn classification_is_repeatable() {
        let expiry = date(2025, 6, 1);
        let now = at(date(2025, 5, 28), 7, 45);
        let first = classify(expiry, now);
        for _ in 0..10 {
            assert_eq!(classify(expiry, now), first);
        }
    }
}

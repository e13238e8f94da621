//! Pure duration and grace-window arithmetic used by the rule engine (C4).
//!
//! Nothing here touches the database or the clock — every function takes its
//! timestamps as arguments so the cascade in `anpr-domain-rules` stays
//! deterministic and unit-testable without mocking time.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Site-configured grace periods, in minutes. Defaults per the spec are
/// `{10, 10, 15}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GracePeriods {
    pub entry_minutes: i64,
    pub exit_minutes: i64,
    pub overstay_minutes: i64,
}

impl Default for GracePeriods {
    fn default() -> Self {
        Self {
            entry_minutes: 10,
            exit_minutes: 10,
            overstay_minutes: 15,
        }
    }
}

/// Whole minutes between `start` and `end`, floored. Callers must ensure
/// `end >= start`; this function does not validate ordering.
pub fn duration_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_seconds() / 60
}

/// `startTime + entryGrace` from the spec's rule cascade.
pub fn mandatory_start(start: DateTime<Utc>, grace: &GracePeriods) -> DateTime<Utc> {
    start + Duration::minutes(grace.entry_minutes)
}

/// `endTime - exitGrace` from the spec's rule cascade.
pub fn mandatory_end(end: DateTime<Utc>, grace: &GracePeriods) -> DateTime<Utc> {
    end - Duration::minutes(grace.exit_minutes)
}

/// True when a session's total duration fits inside the combined
/// entry+exit grace window (the "short stay" / "within grace" clause).
pub fn within_short_stay_grace(duration_minutes: i64, grace: &GracePeriods) -> bool {
    duration_minutes <= grace.entry_minutes + grace.exit_minutes
}

/// Minutes a payment's expiry fell short of `mandatory_end`. Negative or
/// zero means the payment actually covered the mandatory window.
pub fn overstay_minutes(mandatory_end: DateTime<Utc>, payment_expiry: DateTime<Utc>) -> i64 {
    (mandatory_end - payment_expiry).num_seconds() / 60
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, hour, minute, 0).unwrap()
    }

    #[test]
    fn duration_floors_to_whole_minutes() {
        let start = ts(10, 0);
        let end = start + Duration::seconds(90 * 60 + 59);
        assert_eq!(duration_minutes(start, end), 90);
    }

    #[test]
    fn exact_grace_boundary_counts_as_within_grace() {
        let grace = GracePeriods::default();
        assert!(within_short_stay_grace(
            grace.entry_minutes + grace.exit_minutes,
            &grace
        ));
        assert!(!within_short_stay_grace(
            grace.entry_minutes + grace.exit_minutes + 1,
            &grace
        ));
    }

    #[test]
    fn overstay_is_zero_at_exact_boundary() {
        let grace = GracePeriods::default();
        let end = ts(12, 0);
        let mandatory_end = mandatory_end(end, &grace);
        let expiry = mandatory_end;
        assert_eq!(overstay_minutes(mandatory_end, expiry), 0);
    }
}

//! Calendar and billing-cycle date arithmetic.
//!
//! Everything here works on calendar dates only, so time of day never
//! influences a day count. Callers must guard against zero-length cycles
//! before computing per-day rates; `cycle_length_days` returns an error for
//! exactly that reason.

use chrono::{Datelike, NaiveDate};

use crate::error::{ServiceError, ServiceResult};
use crate::types::{BillingCycle, Subscription};

/// Whole days between two dates, always >= 0.
pub fn days_between(a: NaiveDate, b: NaiveDate) -> i64 {
    (b - a).num_days().abs()
}

/// Days from `date` to the last day of its month.
pub fn days_remaining_in_month(date: NaiveDate) -> i64 {
    days_between(date, last_day_of_month(date))
}

fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    // First of next month always exists, as does its predecessor.
    NaiveDate::from_ymd_opt(year, month, 1)
        .expect("valid date")
        .pred_opt()
        .expect("valid date")
}

/// Current billing cycle as persisted on the subscription.
pub fn billing_cycle_of(subscription: &Subscription) -> BillingCycle {
    BillingCycle {
        start: subscription.current_period_start,
        end: subscription.current_period_end,
    }
}

/// Cycle length in days, rejecting zero/negative cycles so no caller ever
/// divides by zero or prorates over an inverted period.
pub fn cycle_length_days(cycle: &BillingCycle) -> ServiceResult<i64> {
    let days = (cycle.end - cycle.start).num_days();
    if days <= 0 {
        return Err(ServiceError::InvalidBillingCycle(format!(
            "cycle {} -> {} has non-positive length",
            cycle.start, cycle.end
        )));
    }
    Ok(days)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_days_between_is_absolute() {
        assert_eq!(days_between(d(2025, 6, 1), d(2025, 6, 16)), 15);
        assert_eq!(days_between(d(2025, 6, 16), d(2025, 6, 1)), 15);
        assert_eq!(days_between(d(2025, 6, 1), d(2025, 6, 1)), 0);
    }

    #[test]
    fn test_days_between_across_month_boundary() {
        assert_eq!(days_between(d(2025, 1, 31), d(2025, 2, 1)), 1);
        assert_eq!(days_between(d(2024, 2, 28), d(2024, 3, 1)), 2); // leap year
    }

    #[test]
    fn test_days_remaining_in_month() {
        assert_eq!(days_remaining_in_month(d(2025, 6, 15)), 15); // June has 30 days
        assert_eq!(days_remaining_in_month(d(2025, 6, 30)), 0);
        assert_eq!(days_remaining_in_month(d(2025, 12, 1)), 30);
        assert_eq!(days_remaining_in_month(d(2024, 2, 1)), 28); // leap February
    }

    #[test]
    fn test_cycle_length_rejects_zero_and_negative() {
        let zero = BillingCycle { start: d(2025, 6, 1), end: d(2025, 6, 1) };
        assert!(matches!(
            cycle_length_days(&zero),
            Err(ServiceError::InvalidBillingCycle(_))
        ));

        let inverted = BillingCycle { start: d(2025, 6, 10), end: d(2025, 6, 1) };
        assert!(cycle_length_days(&inverted).is_err());

        let ok = BillingCycle { start: d(2025, 6, 1), end: d(2025, 7, 1) };
        assert_eq!(cycle_length_days(&ok).unwrap(), 30);
    }
}

//! Recurrence date arithmetic
//!
//! Pure calendar math for advancing a recurring template's due date. No
//! state, no I/O.

use chrono::{Days, Months, NaiveDate};

use crate::models::RecurringInterval;

/// Compute the next occurrence date after `date` for the given interval.
///
/// DAILY adds one day, WEEKLY seven days, MONTHLY one calendar month, and
/// YEARLY one year. Month and year arithmetic clamp to the last day of the
/// target month (Jan 31 + 1 month = Feb 28, or Feb 29 in leap years). The
/// clamping policy is deliberate: a rent template created on the 31st should
/// fire in February, not silently roll into March.
pub fn next_date(date: NaiveDate, interval: RecurringInterval) -> NaiveDate {
    match interval {
        RecurringInterval::Daily => date + Days::new(1),
        RecurringInterval::Weekly => date + Days::new(7),
        RecurringInterval::Monthly => date + Months::new(1),
        RecurringInterval::Yearly => date + Months::new(12),
    }
}

//! Month arithmetic for backups and reports. Months are 1-based.

use crate::error::AppError;
use chrono::{Datelike, Months, NaiveDate};

pub fn last_day_of_month(year: i32, month: u32) -> Result<NaiveDate, AppError> {
    let last = if month == 12 {
        NaiveDate::from_ymd_opt(year, 12, 31)
    } else {
        NaiveDate::from_ymd_opt(year, month, 1)
            .and_then(|first| first.checked_add_months(Months::new(1)))
            .and_then(|next| next.pred_opt())
    };
    last.ok_or_else(|| AppError::Validation(format!("invalid month {}-{}", year, month)))
}

/// `(since, until)`: the last day of the previous month (exclusive) and the last day of
/// the month (inclusive).
pub fn month_window(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), AppError> {
    let until = last_day_of_month(year, month)?;
    let since = until
        .with_day(1)
        .and_then(|first| first.pred_opt())
        .ok_or_else(|| AppError::Validation(format!("month {}-{} has no previous month", year, month)))?;
    Ok((since, until))
}

/// Date of the backup that anchors the month containing `day`: the last day of the month before.
pub fn backup_anchor(day: NaiveDate) -> NaiveDate {
    day.with_day(1).and_then(|first| first.pred_opt()).unwrap_or(day)
}

/// Inclusive upper bound for timestamps falling on or before `day`.
pub fn end_of_day(day: NaiveDate) -> String {
    format!("{}T23:59:59.999999Z", day.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn month_ends() {
        assert_eq!(last_day_of_month(2024, 2).unwrap(), d(2024, 2, 29));
        assert_eq!(last_day_of_month(2026, 12).unwrap(), d(2026, 12, 31));
        assert!(last_day_of_month(2026, 13).is_err());
        assert!(last_day_of_month(2026, 0).is_err());
    }

    #[test]
    fn calendar_bounds_are_errors_not_panics() {
        assert_eq!(last_day_of_month(NaiveDate::MAX.year(), 12).unwrap(), NaiveDate::MAX);
        assert!(last_day_of_month(i32::MAX, 12).is_err());
        assert!(month_window(NaiveDate::MIN.year(), 1).is_err());
    }

    #[test]
    fn window_spans_previous_month_end_to_month_end() {
        assert_eq!(month_window(2026, 1).unwrap(), (d(2025, 12, 31), d(2026, 1, 31)));
        assert_eq!(month_window(2026, 3).unwrap(), (d(2026, 2, 28), d(2026, 3, 31)));
    }

    #[test]
    fn anchor_is_previous_month_end() {
        assert_eq!(backup_anchor(d(2026, 10, 19)), d(2026, 9, 30));
        assert_eq!(backup_anchor(d(2026, 1, 1)), d(2025, 12, 31));
    }
}

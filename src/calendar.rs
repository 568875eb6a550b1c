//! Calendar helpers for the day-by-day sync loop
//!
//! Working days are Monday to Friday. There is no holiday calendar.

use chrono::{Datelike, Days, NaiveDate, Utc, Weekday};

/// Iterate the dates of `[start, end)` in ascending order
pub fn date_range(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start
        .iter_days()
        .take_while(move |date| *date < end)
}

/// Whether `date` falls on Monday to Friday
pub fn is_working_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// The date reached by stepping back `n` working days from `date`
///
/// `date` itself is never counted. `n == 0` returns `date` unchanged.
///
/// ```
/// use chrono::NaiveDate;
/// use slack_history_sync::calendar::working_days_before;
///
/// // Saturday 2020-04-11, one working day back is Friday 2020-04-10
/// let sat = NaiveDate::from_ymd_opt(2020, 4, 11).unwrap();
/// assert_eq!(
///     working_days_before(sat, 1),
///     NaiveDate::from_ymd_opt(2020, 4, 10).unwrap()
/// );
/// ```
pub fn working_days_before(date: NaiveDate, n: u32) -> NaiveDate {
    let mut current = date;
    let mut remaining = n;
    while remaining > 0 {
        current = match current.checked_sub_days(Days::new(1)) {
            Some(previous) => previous,
            None => return current,
        };
        if is_working_day(current) {
            remaining -= 1;
        }
    }
    current
}

/// Today's date in UTC, the clock all sync windows are expressed in
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

/// The day after `date`
pub fn next_day(date: NaiveDate) -> NaiveDate {
    date.succ_opt().unwrap_or(date)
}

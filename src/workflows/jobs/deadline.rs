//! Offer-window arithmetic. Deadlines land at the end of a working day;
//! Saturdays and Sundays are skipped, never counted.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};

/// Offer window applied when the form leaves the deadline blank.
pub const DEFAULT_OFFER_WINDOW_DAYS: u32 = 2;

/// End of the day `working_days` working days after `from`.
pub fn offer_deadline(from: DateTime<Utc>, working_days: u32) -> DateTime<Utc> {
    let mut date = from.date_naive();
    let mut remaining = working_days;
    while remaining > 0 {
        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
        if !is_weekend(date) {
            remaining -= 1;
        }
    }
    end_of_day(date)
}

/// Working days strictly between the two instants' calendar dates.
pub fn working_days_between(from: DateTime<Utc>, until: DateTime<Utc>) -> u32 {
    let mut date = from.date_naive();
    let target = until.date_naive();
    let mut days = 0;
    while date < target {
        if !is_weekend(date) {
            days += 1;
        }
        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
    }
    days
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    let close = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default();
    Utc.from_utc_datetime(&date.and_time(close))
}

#[derive(Debug, thiserror::Error)]
#[error("{0:?} is not a dd-mm-yyyy date")]
pub struct InvalidCompactDate(String);

/// The compact `dd-mm-yyyy` form schedule dates are stored in.
pub fn format_compact(date: NaiveDate) -> String {
    date.format("%d-%m-%Y").to_string()
}

pub fn parse_compact(raw: &str) -> Result<NaiveDate, InvalidCompactDate> {
    NaiveDate::parse_from_str(raw, "%d-%m-%Y")
        .map_err(|_| InvalidCompactDate(raw.to_string()))
}

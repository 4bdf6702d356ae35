use chrono::{DateTime, NaiveDate};

use crate::error::AppError;

/// Normalize an external date string to day granularity.
///
/// Rows arrive from different sources at different precisions: plain
/// `YYYY-MM-DD` columns, RFC 3339 timestamps, and timezone-shifted payloads.
/// Everything is reduced to a calendar day here, at the boundary; the core
/// never compares raw timestamps or ISO string prefixes.
pub fn parse_day(value: &str) -> Result<NaiveDate, AppError> {
    let trimmed = value.trim();
    if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(parsed);
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.date_naive());
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, "%m/%d/%Y") {
        return Ok(parsed);
    }
    Err(AppError::BadRequest(format!(
        "Invalid date '{trimmed}'. Expected YYYY-MM-DD."
    )))
}

pub fn parse_day_opt(value: &str) -> Option<NaiveDate> {
    parse_day(value).ok()
}

/// Inclusive day count of `[start, end]`. A single-day span counts as 1.
pub fn day_count_inclusive(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days() + 1
}

/// Walk each day of `[start, end]` inclusive.
pub fn iter_days(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    std::iter::successors(Some(start), move |day| {
        if *day >= end {
            None
        } else {
            day.succ_opt()
        }
    })
}

/// Minutes between two `HH:MM` wall-clock times on the same reference day,
/// with midnight wraparound (end before start means the span crosses 00:00).
pub fn duration_minutes(start_time: &str, end_time: &str) -> Option<i64> {
    let start = parse_wall_clock(start_time)?;
    let end = parse_wall_clock(end_time)?;
    let mut minutes = end - start;
    if minutes < 0 {
        minutes += 24 * 60;
    }
    Some(minutes)
}

/// Minutes since midnight for an `HH:MM` or `HH:MM:SS` string.
fn parse_wall_clock(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    let time = chrono::NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| chrono::NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .ok()?;
    use chrono::Timelike;
    Some(i64::from(time.hour()) * 60 + i64::from(time.minute()))
}

pub fn is_valid_wall_clock(raw: &str) -> bool {
    parse_wall_clock(raw).is_some()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{day_count_inclusive, duration_minutes, is_valid_wall_clock, iter_days, parse_day};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_plain_and_timestamped_dates_to_the_same_day() {
        assert_eq!(parse_day("2026-01-10").unwrap(), day(2026, 1, 10));
        assert_eq!(
            parse_day("2026-01-10T00:00:00+00:00").unwrap(),
            day(2026, 1, 10)
        );
        assert_eq!(
            parse_day("2026-01-10T23:30:00-03:00").unwrap(),
            day(2026, 1, 10)
        );
        assert!(parse_day("not-a-date").is_err());
    }

    #[test]
    fn inclusive_day_count() {
        assert_eq!(day_count_inclusive(day(2026, 1, 10), day(2026, 1, 10)), 1);
        assert_eq!(day_count_inclusive(day(2026, 1, 10), day(2026, 1, 13)), 4);
    }

    #[test]
    fn walks_days_inclusive() {
        let days: Vec<_> = iter_days(day(2026, 1, 30), day(2026, 2, 2)).collect();
        assert_eq!(
            days,
            vec![
                day(2026, 1, 30),
                day(2026, 1, 31),
                day(2026, 2, 1),
                day(2026, 2, 2)
            ]
        );
    }

    #[test]
    fn duration_handles_midnight_wraparound() {
        assert_eq!(duration_minutes("09:00", "13:30"), Some(270));
        // 23:00 -> 02:00 is 3 hours, not negative
        assert_eq!(duration_minutes("23:00", "02:00"), Some(180));
        assert_eq!(duration_minutes("10:00", "10:00"), Some(0));
        assert_eq!(duration_minutes("10:00", "bad"), None);
    }

    #[test]
    fn wall_clock_validation() {
        assert!(is_valid_wall_clock("08:15"));
        assert!(is_valid_wall_clock("08:15:30"));
        assert!(!is_valid_wall_clock("25:00"));
        assert!(!is_valid_wall_clock("8pm"));
    }
}

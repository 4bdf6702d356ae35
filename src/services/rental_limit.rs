use serde::Serialize;
use serde_json::Value;

use crate::services::calendar::DateRange;
use crate::services::dates::{day_count_inclusive, parse_day_opt};

/// IRC §280A(g) caps tax-free rental use at 14 days per property per year.
pub const RENTAL_DAY_CAP: i64 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RentalDayUsage {
    /// Days already consumed by the address's events, per the mode rules.
    pub days_used: i64,
    /// Inclusive day count of the candidate range.
    pub candidate_days: i64,
    pub exceeds_limit: bool,
}

/// Inclusive day span of a persisted event row, when its dates parse.
pub fn event_day_span(row: &Value) -> Option<i64> {
    let obj = row.as_object()?;
    let start = parse_day_opt(obj.get("start_date")?.as_str()?)?;
    let end = parse_day_opt(obj.get("end_date")?.as_str()?)?;
    if end < start {
        return None;
    }
    Some(day_count_inclusive(start, end))
}

/// Evaluate the 14-day annual cap for a candidate range.
///
/// `other_events` are the address's persisted events; when editing,
/// `editing_event_id` excludes the event under edit from the sibling sum and
/// its own current span is added back, since it still counts against the
/// address. Only create mode can exceed the limit: an already-existing
/// booking is an immutable legal record and edits never block on the cap.
pub fn evaluate_usage(
    other_events: &[Value],
    editing_event_id: Option<&str>,
    candidate: DateRange,
) -> RentalDayUsage {
    let mode = if editing_event_id.is_some() {
        FormMode::Edit
    } else {
        FormMode::Create
    };

    let mut days_used = 0i64;
    let mut editing_span = 0i64;
    for event in other_events {
        let event_id = event
            .as_object()
            .and_then(|obj| obj.get("id"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let span = event_day_span(event).unwrap_or(0);
        if Some(event_id) == editing_event_id {
            editing_span = span;
            continue;
        }
        days_used += span;
    }
    if mode == FormMode::Edit {
        days_used += editing_span;
    }

    let candidate_days = candidate.day_count();
    let exceeds_limit =
        mode == FormMode::Create && days_used + candidate_days > RENTAL_DAY_CAP;

    RentalDayUsage {
        days_used,
        candidate_days,
        exceeds_limit,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::{evaluate_usage, event_day_span, RENTAL_DAY_CAP};
    use crate::services::calendar::DateRange;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, d).unwrap()
    }

    fn event(id: &str, start: &str, end: &str) -> serde_json::Value {
        json!({ "id": id, "start_date": start, "end_date": end })
    }

    #[test]
    fn event_span_is_inclusive() {
        assert_eq!(
            event_day_span(&event("a", "2026-01-10", "2026-01-12")),
            Some(3)
        );
        assert_eq!(
            event_day_span(&event("a", "2026-01-10", "2026-01-10")),
            Some(1)
        );
        assert_eq!(event_day_span(&event("a", "bad", "2026-01-10")), None);
    }

    #[test]
    fn create_mode_blocks_past_the_cap() {
        // 12 days used by other events, 3 candidate days -> 15 > 14.
        let events = vec![
            event("a", "2026-02-01", "2026-02-07"), // 7 days
            event("b", "2026-03-01", "2026-03-05"), // 5 days
        ];
        let usage = evaluate_usage(&events, None, DateRange::closed(day(4, 1), day(4, 3)));
        assert_eq!(usage.days_used, 12);
        assert_eq!(usage.candidate_days, 3);
        assert!(usage.exceeds_limit);
    }

    #[test]
    fn create_mode_allows_exactly_fourteen() {
        let events = vec![event("a", "2026-02-01", "2026-02-11")]; // 11 days
        let usage = evaluate_usage(&events, None, DateRange::closed(day(4, 1), day(4, 3)));
        assert_eq!(usage.days_used + usage.candidate_days, RENTAL_DAY_CAP);
        assert!(!usage.exceeds_limit);
    }

    #[test]
    fn edit_mode_never_blocks() {
        // Same totals as the blocking create case, but editing event "c".
        let events = vec![
            event("a", "2026-02-01", "2026-02-07"),
            event("b", "2026-03-01", "2026-03-05"),
            event("c", "2026-04-01", "2026-04-03"),
        ];
        let usage = evaluate_usage(
            &events,
            Some("c"),
            DateRange::closed(day(4, 1), day(4, 3)),
        );
        // The edited event's own span still counts toward usage.
        assert_eq!(usage.days_used, 15);
        assert!(!usage.exceeds_limit);
    }

    #[test]
    fn edit_mode_excludes_the_edited_event_from_the_sibling_sum() {
        let events = vec![
            event("a", "2026-02-01", "2026-02-04"), // 4 days
            event("c", "2026-04-01", "2026-04-02"), // 2 days, under edit
        ];
        let usage = evaluate_usage(
            &events,
            Some("c"),
            DateRange::closed(day(4, 1), day(4, 5)),
        );
        // 4 sibling days + the edited event's own 2 days
        assert_eq!(usage.days_used, 6);
        assert!(!usage.exceeds_limit);
    }
}

use chrono::NaiveDate;
use serde::Serialize;

use crate::services::dates::iter_days;

/// A day-granularity range. `to: None` is an in-progress pick that covers
/// only its `from` day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn single(day: NaiveDate) -> Self {
        Self { from: day, to: None }
    }

    /// Closed range with `from <= to` enforced by swapping when needed.
    pub fn closed(a: NaiveDate, b: NaiveDate) -> Self {
        if b < a {
            Self { from: b, to: Some(a) }
        } else {
            Self { from: a, to: Some(b) }
        }
    }

    pub fn end(&self) -> NaiveDate {
        self.to.unwrap_or(self.from)
    }

    pub fn day_count(&self) -> i64 {
        (self.end() - self.from).num_days() + 1
    }

    pub fn is_open(&self) -> bool {
        self.to.is_none()
    }
}

/// Occupied span of a sibling event for the same rental address.
pub type BookedRange = DateRange;

/// True when `date` falls within any booked `[from, to]` inclusive, or
/// equals an unterminated `from`.
pub fn is_date_booked(date: NaiveDate, booked: &[BookedRange]) -> bool {
    booked.iter().any(|range| match range.to {
        Some(to) => date >= range.from && date <= to,
        None => date == range.from,
    })
}

/// Walks each day of `[from, to]` inclusive, short-circuiting on the first
/// booked day.
pub fn range_contains_booked_dates(
    from: NaiveDate,
    to: NaiveDate,
    booked: &[BookedRange],
) -> bool {
    iter_days(from, to).any(|day| is_date_booked(day, booked))
}

/// Longest contiguous unbooked run inside `[from, to]`, or `None` when no
/// day is free. Ties go to the first run encountered left-to-right; that
/// tie-break is part of the contract.
pub fn find_available_range(
    from: NaiveDate,
    to: NaiveDate,
    booked: &[BookedRange],
) -> Option<DateRange> {
    let mut best: Option<(NaiveDate, NaiveDate)> = None;
    let mut run_start: Option<NaiveDate> = None;
    let mut run_end = from;

    for day in iter_days(from, to) {
        if is_date_booked(day, booked) {
            if let Some(start) = run_start.take() {
                best = longer_run(best, (start, run_end));
            }
        } else {
            if run_start.is_none() {
                run_start = Some(day);
            }
            run_end = day;
        }
    }
    if let Some(start) = run_start {
        best = longer_run(best, (start, run_end));
    }

    best.map(|(start, end)| DateRange {
        from: start,
        to: Some(end),
    })
}

fn longer_run(
    best: Option<(NaiveDate, NaiveDate)>,
    candidate: (NaiveDate, NaiveDate),
) -> Option<(NaiveDate, NaiveDate)> {
    match best {
        // Strictly-greater keeps the first-found run on ties.
        Some((from, to)) if (candidate.1 - candidate.0) > (to - from) => Some(candidate),
        Some(existing) => Some(existing),
        None => Some(candidate),
    }
}

/// Symmetric membership test for UI highlighting of a possibly unordered,
/// possibly half-open pick. Does not consult booking state.
pub fn is_date_in_range(date: NaiveDate, selection: &DateRange) -> bool {
    match selection.to {
        Some(to) => {
            let (low, high) = if to < selection.from {
                (to, selection.from)
            } else {
                (selection.from, to)
            };
            date >= low && date <= high
        }
        None => date == selection.from,
    }
}

/// Occupied spans from persisted sibling event rows. Only booked events
/// block the calendar; drafts and the event under edit do not.
pub fn booked_ranges_from_rows(
    rows: &[serde_json::Value],
    exclude_event_id: Option<&str>,
) -> Vec<BookedRange> {
    use crate::services::dates::parse_day_opt;
    rows.iter()
        .filter_map(|row| {
            let obj = row.as_object()?;
            let status = obj.get("status")?.as_str()?;
            if status != "booked" {
                return None;
            }
            let id = obj.get("id").and_then(serde_json::Value::as_str);
            if id.is_some() && id == exclude_event_id {
                return None;
            }
            let from = parse_day_opt(obj.get("start_date")?.as_str()?)?;
            let to = obj
                .get("end_date")
                .and_then(serde_json::Value::as_str)
                .and_then(parse_day_opt);
            Some(DateRange { from, to })
        })
        .collect()
}

/// Result of a calendar click: the new selection plus whether the engine
/// substituted a free sub-range for the user's literal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClickOutcome {
    pub selection: DateRange,
    pub was_adjusted: bool,
}

/// Two-click range picker.
///
/// A first click (no open pick, or a completed pick present) starts a fresh
/// `{from, to: None}`. The second click closes the range; if the closed span
/// contains any booked day the longest free sub-range is substituted and
/// flagged, and when nothing in the span is free the selection collapses to
/// a fresh single-day start at the clicked date.
pub fn select_day(
    current: Option<DateRange>,
    clicked: NaiveDate,
    booked: &[BookedRange],
) -> ClickOutcome {
    let open_from = match current {
        Some(range) if range.is_open() => range.from,
        _ => {
            return ClickOutcome {
                selection: DateRange::single(clicked),
                was_adjusted: false,
            }
        }
    };

    let normalized = DateRange::closed(open_from, clicked);
    if !range_contains_booked_dates(normalized.from, normalized.end(), booked) {
        return ClickOutcome {
            selection: normalized,
            was_adjusted: false,
        };
    }

    match find_available_range(normalized.from, normalized.end(), booked) {
        Some(substitute) => ClickOutcome {
            selection: substitute,
            was_adjusted: true,
        },
        None => ClickOutcome {
            selection: DateRange::single(clicked),
            was_adjusted: true,
        },
    }
}

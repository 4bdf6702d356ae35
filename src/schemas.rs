use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppError;
use crate::services::dates::{duration_minutes, is_valid_wall_clock, parse_day};
use crate::services::draft::EventAction;

pub fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|errors| AppError::UnprocessableEntity(format!("Validation failed: {errors}")))
}

fn default_limit_100() -> i64 {
    100
}
fn default_false() -> bool {
    false
}
fn default_draft_action() -> String {
    "draft".to_string()
}

// ── Rental addresses ────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CreateAddressInput {
    #[validate(length(min = 1, max = 255))]
    pub nickname: String,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    #[serde(default)]
    pub avarage_value: f64,
    #[serde(default = "default_false")]
    pub is_custom_plan: bool,
    #[serde(default = "default_false")]
    pub is_home_office_deduction: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpdateAddressInput {
    pub nickname: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub avarage_value: Option<f64>,
    pub is_custom_plan: Option<bool>,
    pub is_home_office_deduction: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct AddressPath {
    pub address_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddressesQuery {
    #[serde(default = "default_limit_100")]
    pub limit: i64,
}

// ── Events ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct EventPath {
    pub event_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventsQuery {
    pub address_id: Option<String>,
    pub status: Option<String>,
    #[serde(default = "default_limit_100")]
    pub limit: i64,
}

/// Full event form payload. The same shape serves both tiers; which rules
/// apply is decided by `current_action` (`draft`/`template` vs
/// `book`/`update`).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SaveEventInput {
    pub rental_address_id: String,
    #[serde(default = "default_draft_action")]
    pub current_action: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    pub people_count: Option<i64>,
    #[serde(default)]
    pub excluded_areas: String,
    #[serde(default = "default_false")]
    pub manual_valuation: bool,
    pub daily_rate: Option<f64>,
    #[serde(default = "default_false")]
    pub money_paid_to_personnel: bool,
    /// Names of pending local uploads; only their count matters here.
    #[serde(default)]
    pub upload_documents: Vec<String>,
}

impl SaveEventInput {
    pub fn action(&self) -> Result<EventAction, AppError> {
        EventAction::from_str(&self.current_action).ok_or_else(|| {
            AppError::BadRequest(format!(
                "Unknown action '{}'. Expected book, update, draft or template.",
                self.current_action
            ))
        })
    }
}

// ── Availability / pricing queries ──────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityQuery {
    pub start: String,
    pub end: String,
    /// Event to ignore when loading booked ranges (edit mode).
    pub exclude_event_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PricingQuery {
    pub start: Option<String>,
    pub end: Option<String>,
    #[serde(default = "default_limit_100")]
    pub limit: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteQuery {
    pub start: String,
    pub end: String,
    #[serde(default = "default_false")]
    pub manual_valuation: bool,
    pub daily_rate: Option<f64>,
    pub exclude_event_id: Option<String>,
}

// ── Two-tier event submission validation ────────────────────────────

const MIN_DURATION_MINUTES: i64 = 270;

/// Validate the form for its declared action. Draft and template saves get
/// the lenient tier (structural checks on present fields only); book and
/// update get the strict tier. Cross-field rules apply to both tiers
/// whenever the participating fields are present.
///
/// Failures come back as one message per known field slot; there is no
/// generic schema-root error channel.
pub fn validate_event_submission(
    input: &SaveEventInput,
    persisted_document_count: usize,
) -> Result<(), BTreeMap<String, String>> {
    let action = EventAction::from_str(&input.current_action).unwrap_or(EventAction::Draft);
    let mut errors = BTreeMap::new();

    if action.is_strict() {
        strict_field_checks(input, &mut errors);
    } else {
        lenient_field_checks(input, &mut errors);
    }
    cross_field_checks(input, persisted_document_count, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn strict_field_checks(input: &SaveEventInput, errors: &mut BTreeMap<String, String>) {
    let title_len = input.title.trim().chars().count();
    if !(5..=50).contains(&title_len) {
        put(errors, "title", "Title must be between 5 and 50 characters.");
    }

    match input.start_date.as_deref() {
        Some(raw) if parse_day(raw).is_ok() => {}
        Some(_) => put(errors, "start_date", "Start date is not a valid date."),
        None => put(errors, "start_date", "Start date is required."),
    }
    match input.end_date.as_deref() {
        Some(raw) if parse_day(raw).is_ok() => {}
        Some(_) => put(errors, "end_date", "End date is not a valid date."),
        None => put(errors, "end_date", "End date is required."),
    }

    if !is_valid_wall_clock(&input.start_time) {
        put(errors, "start_time", "Start time must be a valid HH:MM time.");
    }
    if !is_valid_wall_clock(&input.end_time) {
        put(errors, "end_time", "End time must be a valid HH:MM time.");
    }

    match input.people_count {
        Some(count) if count >= 0 => {}
        Some(_) => put(errors, "people_count", "Attendee count cannot be negative."),
        None => put(errors, "people_count", "Attendee count is required."),
    }

    let description_len = input.description.trim().chars().count();
    if !(10..=1000).contains(&description_len) {
        put(
            errors,
            "description",
            "Description must be between 10 and 1000 characters.",
        );
    }

    if input.excluded_areas.trim().chars().count() < 3 {
        put(
            errors,
            "excluded_areas",
            "Excluded areas must be at least 3 characters.",
        );
    }
}

fn lenient_field_checks(input: &SaveEventInput, errors: &mut BTreeMap<String, String>) {
    if !input.start_time.trim().is_empty() && !is_valid_wall_clock(&input.start_time) {
        put(errors, "start_time", "Start time must be a valid HH:MM time.");
    }
    if !input.end_time.trim().is_empty() && !is_valid_wall_clock(&input.end_time) {
        put(errors, "end_time", "End time must be a valid HH:MM time.");
    }
    if let Some(count) = input.people_count {
        if count < 0 {
            put(errors, "people_count", "Attendee count cannot be negative.");
        }
    }
    if let Some(raw) = input.start_date.as_deref() {
        if parse_day(raw).is_err() {
            put(errors, "start_date", "Start date is not a valid date.");
        }
    }
    if let Some(raw) = input.end_date.as_deref() {
        if parse_day(raw).is_err() {
            put(errors, "end_date", "End date is not a valid date.");
        }
    }
}

fn cross_field_checks(
    input: &SaveEventInput,
    persisted_document_count: usize,
    errors: &mut BTreeMap<String, String>,
) {
    // Date ordering, at day granularity only.
    if let (Some(start_raw), Some(end_raw)) = (input.start_date.as_deref(), input.end_date.as_deref())
    {
        if let (Ok(start), Ok(end)) = (parse_day(start_raw), parse_day(end_raw)) {
            if end < start {
                put(errors, "end_date", "End date cannot be before start date.");
            }
        }
    }

    // Manual valuation requires evidence; the message lands on the pending
    // uploads slot.
    if input.manual_valuation
        && input.upload_documents.is_empty()
        && persisted_document_count == 0
    {
        put(
            errors,
            "upload_documents",
            "Manual valuation requires at least one supporting document.",
        );
    }

    // Minimum duration, wraparound-aware.
    if is_valid_wall_clock(&input.start_time) && is_valid_wall_clock(&input.end_time) {
        if let Some(minutes) = duration_minutes(&input.start_time, &input.end_time) {
            if minutes < MIN_DURATION_MINUTES {
                put(errors, "end_time", "Event must run at least 4.5 hours.");
            }
        }
    }
}

fn put(errors: &mut BTreeMap<String, String>, field: &str, message: &str) {
    errors
        .entry(field.to_string())
        .or_insert_with(|| message.to_string());
}

// ── JSON helpers ────────────────────────────────────────────────────

pub fn clamp_limit_in_range(limit: i64, low: i64, high: i64) -> i64 {
    limit.clamp(low, high)
}

pub fn serialize_to_map<T: Serialize>(input: &T) -> serde_json::Map<String, serde_json::Value> {
    match serde_json::to_value(input) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    }
}

pub fn remove_nulls(
    map: serde_json::Map<String, serde_json::Value>,
) -> serde_json::Map<String, serde_json::Value> {
    map.into_iter()
        .filter(|(_, value)| !value.is_null())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{remove_nulls, validate_event_submission, SaveEventInput};

    fn bookable() -> SaveEventInput {
        SaveEventInput {
            rental_address_id: "550e8400-e29b-41d4-a716-446655440000".to_string(),
            current_action: "book".to_string(),
            title: "Quarterly planning offsite".to_string(),
            description: "Full-day strategy session with the leadership team.".to_string(),
            start_date: Some("2026-05-04".to_string()),
            end_date: Some("2026-05-05".to_string()),
            start_time: "09:00".to_string(),
            end_time: "16:00".to_string(),
            people_count: Some(6),
            excluded_areas: "Garage and master bedroom".to_string(),
            manual_valuation: false,
            daily_rate: None,
            money_paid_to_personnel: true,
            upload_documents: Vec::new(),
        }
    }

    #[test]
    fn valid_booking_passes_strict_tier() {
        assert!(validate_event_submission(&bookable(), 0).is_ok());
    }

    #[test]
    fn strict_tier_rejects_short_description() {
        let mut input = bookable();
        input.description = "Too short".to_string(); // 9 chars
        let errors = validate_event_submission(&input, 0).unwrap_err();
        assert!(errors.contains_key("description"));
    }

    #[test]
    fn draft_tier_accepts_empty_description_and_dates() {
        let mut input = bookable();
        input.current_action = "draft".to_string();
        input.description = String::new();
        input.title = String::new();
        input.start_date = None;
        input.end_date = None;
        input.start_time = String::new();
        input.end_time = String::new();
        input.people_count = None;
        input.excluded_areas = String::new();
        assert!(validate_event_submission(&input, 0).is_ok());
    }

    #[test]
    fn draft_tier_still_rejects_malformed_times() {
        let mut input = bookable();
        input.current_action = "draft".to_string();
        input.start_time = "9am".to_string();
        let errors = validate_event_submission(&input, 0).unwrap_err();
        assert!(errors.contains_key("start_time"));
    }

    #[test]
    fn end_before_start_is_rejected_in_both_tiers() {
        for action in ["book", "draft"] {
            let mut input = bookable();
            input.current_action = action.to_string();
            input.start_date = Some("2026-05-05".to_string());
            input.end_date = Some("2026-05-04".to_string());
            let errors = validate_event_submission(&input, 0).unwrap_err();
            assert!(errors.contains_key("end_date"), "action {action}");
        }
    }

    #[test]
    fn manual_valuation_without_documents_fails_on_upload_slot() {
        let mut input = bookable();
        input.manual_valuation = true;
        input.upload_documents = Vec::new();
        let errors = validate_event_submission(&input, 0).unwrap_err();
        assert_eq!(
            errors.get("upload_documents").map(String::as_str),
            Some("Manual valuation requires at least one supporting document.")
        );

        // a persisted document satisfies the rule
        assert!(validate_event_submission(&input, 1).is_ok());
        // so does a pending upload
        input.upload_documents = vec!["appraisal.pdf".to_string()];
        assert!(validate_event_submission(&input, 0).is_ok());
    }

    #[test]
    fn short_duration_is_rejected_with_wraparound_awareness() {
        let mut input = bookable();
        input.start_time = "23:00".to_string();
        input.end_time = "02:00".to_string(); // 3 hours
        let errors = validate_event_submission(&input, 0).unwrap_err();
        assert!(errors.contains_key("end_time"));

        input.start_time = "22:00".to_string();
        input.end_time = "03:00".to_string(); // 5 hours
        assert!(validate_event_submission(&input, 0).is_ok());
    }

    #[test]
    fn title_bounds_are_enforced() {
        let mut input = bookable();
        input.title = "Tiny".to_string();
        assert!(validate_event_submission(&input, 0).is_err());
        input.title = "x".repeat(51);
        assert!(validate_event_submission(&input, 0).is_err());
        input.title = "x".repeat(50);
        assert!(validate_event_submission(&input, 0).is_ok());
    }

    #[test]
    fn remove_nulls_drops_null_entries() {
        let map = serde_json::json!({ "a": 1, "b": null })
            .as_object()
            .cloned()
            .unwrap();
        let cleaned = remove_nulls(map);
        assert!(cleaned.contains_key("a"));
        assert!(!cleaned.contains_key("b"));
    }
}

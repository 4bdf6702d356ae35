use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Map, Value};
use sqlx::PgPool;

use crate::{
    auth::require_user_id,
    error::{AppError, AppResult},
    ownership::{assert_address_owner, assert_event_owner},
    repository::table_service::{create_row, delete_row, list_rows, update_row},
    routes::pricing::{load_address_events, load_pricing_table, property_plan},
    schemas::{
        clamp_limit_in_range, validate_event_submission, EventPath, EventsQuery, SaveEventInput,
    },
    services::audit::write_audit_log,
    services::calendar::DateRange,
    services::defensibility::{DefensibilityScore, ScoreInputs},
    services::dates::{parse_day, parse_day_opt},
    services::draft::EventAction,
    services::rental_limit::{evaluate_usage, RentalDayUsage, RENTAL_DAY_CAP},
    services::valuation::{reconcile, Reconciliation},
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/events",
            axum::routing::get(list_events).post(create_event),
        )
        .route(
            "/events/{event_id}",
            axum::routing::get(get_event)
                .patch(update_event)
                .delete(delete_event),
        )
        .route(
            "/events/{event_id}/defensibility",
            axum::routing::get(get_defensibility),
        )
}

async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let pool = db_pool(&state)?;

    let mut filters = Map::new();
    filters.insert("user_id".to_string(), Value::String(user_id));
    if let Some(address_id) = query.address_id.as_deref() {
        filters.insert(
            "rental_address_id".to_string(),
            Value::String(address_id.to_string()),
        );
    }
    if let Some(status) = query.status.as_deref() {
        filters.insert("status".to_string(), Value::String(status.to_string()));
    }

    let rows = list_rows(
        pool,
        "events",
        Some(&filters),
        clamp_limit_in_range(query.limit, 1, 1000),
        0,
        "created_at",
        false,
    )
    .await?;
    Ok(Json(json!({ "data": rows })))
}

/// Create an event in the tier its action demands. Booking enforces the
/// overlap and 14-day checks and re-derives the rental amount server-side;
/// drafts and templates persist whatever passed the lenient tier.
async fn create_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SaveEventInput>,
) -> AppResult<impl IntoResponse> {
    let user_id = require_user_id(&state, &headers).await?;
    let action = payload.action()?;
    let pool = db_pool(&state)?;

    let address = assert_address_owner(pool, &payload.rental_address_id, &user_id).await?;
    validate_event_submission(&payload, 0).map_err(AppError::ValidationFailed)?;

    let range = candidate_range(&payload)?;

    if action.is_strict() {
        // Strict validation guarantees both dates parse.
        let range = range.ok_or_else(|| {
            AppError::BadRequest("Event dates are required for booking.".to_string())
        })?;
        let siblings = load_address_events(pool, &payload.rental_address_id).await?;
        if let Some(conflict) = find_conflicting_event(&siblings, range, None) {
            return Err(booking_conflict(conflict));
        }
        let usage = evaluate_usage(&siblings, None, range);
        if usage.exceeds_limit {
            return Err(over_cap(&usage));
        }
    }

    let quote = match range {
        Some(range) => Some(
            reconcile(
                range,
                &property_plan(&address),
                &load_pricing_table(pool, &payload.rental_address_id, range).await?,
                payload.manual_valuation,
                payload.daily_rate,
            ),
        ),
        None => None,
    };
    if action.is_strict() {
        ensure_quote_is_bookable(quote.as_ref())?;
    }

    let mut record = event_record(&payload, action, quote.as_ref())?;
    record.insert("user_id".to_string(), Value::String(user_id.clone()));

    let created = create_row(pool, "events", &record).await?;
    let event_id = value_str(&created, "id");

    let score = if action.is_strict() {
        Some(save_defensibility_score(pool, &event_id, &payload, payload.upload_documents.len()).await?)
    } else {
        None
    };

    write_audit_log(
        state.db_pool.as_ref(),
        Some(&user_id),
        "create",
        "events",
        Some(&event_id),
        None,
        Some(created.clone()),
    )
    .await;

    Ok((
        axum::http::StatusCode::CREATED,
        Json(json!({
            "data": created,
            "defensibility": score,
            "warning": quote.and_then(|result| result.warning)
        })),
    ))
}

async fn get_event(
    State(state): State<AppState>,
    Path(path): Path<EventPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let pool = db_pool(&state)?;
    let event = assert_event_owner(pool, &path.event_id, &user_id).await?;
    let documents = load_event_documents(pool, &path.event_id).await?;
    Ok(Json(json!({ "data": event, "documents": documents })))
}

/// Edit an event. The overlap check ignores the event's own current dates.
/// The 14-day cap never blocks edits of an already-booked row, since that
/// booking already counts against the address either way; promoting a draft
/// or template to a booking is cap-checked like a new booking.
async fn update_event(
    State(state): State<AppState>,
    Path(path): Path<EventPath>,
    headers: HeaderMap,
    Json(payload): Json<SaveEventInput>,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let action = payload.action()?;
    let pool = db_pool(&state)?;

    let existing = assert_event_owner(pool, &path.event_id, &user_id).await?;
    let address = assert_address_owner(pool, &payload.rental_address_id, &user_id).await?;

    let persisted_documents = load_event_documents(pool, &path.event_id).await?.len();
    validate_event_submission(&payload, persisted_documents)
        .map_err(AppError::ValidationFailed)?;

    let range = candidate_range(&payload)?;
    let mut usage = None;

    if action.is_strict() {
        let range = range.ok_or_else(|| {
            AppError::BadRequest("Event dates are required for booking.".to_string())
        })?;
        let siblings = load_address_events(pool, &payload.rental_address_id).await?;
        if let Some(conflict) = find_conflicting_event(&siblings, range, Some(&path.event_id)) {
            return Err(booking_conflict(conflict));
        }
        // Promoting a draft is a new booking for cap purposes: the row was
        // never in the booked-sibling sum, so it gets create-mode semantics.
        let evaluated = evaluate_usage(
            &siblings,
            editing_exclusion(&existing, &path.event_id),
            range,
        );
        if evaluated.exceeds_limit {
            return Err(over_cap(&evaluated));
        }
        usage = Some(evaluated);
    }

    let quote = match range {
        Some(range) => Some(
            reconcile(
                range,
                &property_plan(&address),
                &load_pricing_table(pool, &payload.rental_address_id, range).await?,
                payload.manual_valuation,
                payload.daily_rate,
            ),
        ),
        None => None,
    };
    if action.is_strict() {
        ensure_quote_is_bookable(quote.as_ref())?;
    }

    let patch = event_record(&payload, action, quote.as_ref())?;
    let updated = update_row(pool, "events", &path.event_id, &patch, "id").await?;

    let score = if action.is_strict() {
        let pending = payload.upload_documents.len() + persisted_documents;
        Some(save_defensibility_score(pool, &path.event_id, &payload, pending).await?)
    } else {
        None
    };

    write_audit_log(
        state.db_pool.as_ref(),
        Some(&user_id),
        "update",
        "events",
        Some(&path.event_id),
        Some(existing),
        Some(updated.clone()),
    )
    .await;

    Ok(Json(json!({
        "data": updated,
        "defensibility": score,
        "warning": quote.and_then(|result| result.warning),
        "usage": usage
    })))
}

async fn delete_event(
    State(state): State<AppState>,
    Path(path): Path<EventPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let pool = db_pool(&state)?;
    assert_event_owner(pool, &path.event_id, &user_id).await?;

    let deleted = delete_row(pool, "events", &path.event_id, "id").await?;

    write_audit_log(
        state.db_pool.as_ref(),
        Some(&user_id),
        "delete",
        "events",
        Some(&path.event_id),
        Some(deleted.clone()),
        None,
    )
    .await;

    Ok(Json(json!({ "success": true, "data": deleted })))
}

/// Live defensibility view of a persisted event, recomputed from the stored
/// fields and the current document count.
async fn get_defensibility(
    State(state): State<AppState>,
    Path(path): Path<EventPath>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let pool = db_pool(&state)?;
    let event = assert_event_owner(pool, &path.event_id, &user_id).await?;
    let document_count = load_event_documents(pool, &path.event_id).await?.len();

    let description = value_str(&event, "description");
    let start_time = value_str(&event, "start_time");
    let end_time = value_str(&event, "end_time");
    let inputs = ScoreInputs {
        description: &description,
        people_count: event
            .as_object()
            .and_then(|obj| obj.get("people_count"))
            .and_then(Value::as_i64),
        start_time: &start_time,
        end_time: &end_time,
        manual_valuation: value_bool(&event, "manual_valuation"),
        document_count,
        money_paid_to_personnel: value_bool(&event, "money_paid_to_personnel"),
    };
    let score = DefensibilityScore::evaluate(&inputs);

    Ok(Json(json!({ "data": score, "document_count": document_count })))
}

// ── helpers ─────────────────────────────────────────────────────────

/// Normalized candidate range from the form's date strings. `None` when
/// either date is absent; a malformed date is a hard error here because the
/// tier validation already vetted format.
fn candidate_range(input: &SaveEventInput) -> AppResult<Option<DateRange>> {
    let (Some(start_raw), Some(end_raw)) = (input.start_date.as_deref(), input.end_date.as_deref())
    else {
        return Ok(None);
    };
    let start = parse_day(start_raw)?;
    let end = parse_day(end_raw)?;
    Ok(Some(DateRange::closed(start, end)))
}

/// First booked sibling whose inclusive span overlaps the candidate range.
fn find_conflicting_event<'a>(
    siblings: &'a [Value],
    range: DateRange,
    exclude_event_id: Option<&str>,
) -> Option<&'a Value> {
    siblings.iter().find(|event| {
        let obj = match event.as_object() {
            Some(obj) => obj,
            None => return false,
        };
        let id = obj.get("id").and_then(Value::as_str);
        if id.is_some() && id == exclude_event_id {
            return false;
        }
        let Some(other_start) = obj
            .get("start_date")
            .and_then(Value::as_str)
            .and_then(parse_day_opt)
        else {
            return false;
        };
        let other_end = obj
            .get("end_date")
            .and_then(Value::as_str)
            .and_then(parse_day_opt)
            .unwrap_or(other_start);
        range.from <= other_end && range.end() >= other_start
    })
}

fn over_cap(usage: &RentalDayUsage) -> AppError {
    AppError::UnprocessableEntity(format!(
        "Booking would exceed the {RENTAL_DAY_CAP}-day annual rental limit ({} days used, {} requested).",
        usage.days_used, usage.candidate_days
    ))
}

/// Edit-mode cap semantics apply only to rows that are already booked. A
/// draft or template promoted to a booking was never in the booked-sibling
/// sum, so it is evaluated as a new booking.
fn editing_exclusion<'a>(existing: &Value, event_id: &'a str) -> Option<&'a str> {
    (value_str(existing, "status") == "booked").then_some(event_id)
}

/// A pricing gap is blocking for book and update: the fallback flips the
/// event to manual valuation, which needs a rate and documents the payload
/// never carried through validation.
fn ensure_quote_is_bookable(quote: Option<&Reconciliation>) -> AppResult<()> {
    match quote {
        Some(quote) if quote.warning.is_some() => Err(AppError::UnprocessableEntity(
            "Market pricing is missing for part of the selected dates. Provide a manual daily \
             rate and supporting documents."
                .to_string(),
        )),
        _ => Ok(()),
    }
}

fn booking_conflict(event: &Value) -> AppError {
    AppError::BookingConflict {
        message: "Event dates overlap an existing booking.".to_string(),
        details: json!({
            "conflictingEvent": {
                "id": value_str(event, "id"),
                "title": value_str(event, "title"),
                "start_date": value_str(event, "start_date"),
                "end_date": value_str(event, "end_date"),
            }
        }),
    }
}

fn status_for_action(action: EventAction) -> &'static str {
    match action {
        EventAction::Book | EventAction::Update => "booked",
        EventAction::Template => "template",
        EventAction::Draft => "draft",
    }
}

/// Persisted shape of the form. Amounts always come from the server-side
/// reconciliation, never from the client payload.
fn event_record(
    input: &SaveEventInput,
    action: EventAction,
    quote: Option<&Reconciliation>,
) -> AppResult<Map<String, Value>> {
    let mut record = Map::new();
    record.insert(
        "rental_address_id".to_string(),
        Value::String(input.rental_address_id.clone()),
    );
    record.insert("status".to_string(), json!(status_for_action(action)));
    record.insert("title".to_string(), json!(input.title.trim()));
    record.insert("description".to_string(), json!(input.description.trim()));
    if let Some(raw) = input.start_date.as_deref() {
        record.insert("start_date".to_string(), json!(parse_day(raw)?));
    }
    if let Some(raw) = input.end_date.as_deref() {
        record.insert("end_date".to_string(), json!(parse_day(raw)?));
    }
    record.insert("start_time".to_string(), json!(input.start_time));
    record.insert("end_time".to_string(), json!(input.end_time));
    if let Some(count) = input.people_count {
        record.insert("people_count".to_string(), json!(count));
    }
    record.insert(
        "excluded_areas".to_string(),
        json!(input.excluded_areas.trim()),
    );
    if let Some(rate) = input.daily_rate {
        record.insert("daily_rate".to_string(), json!(rate));
    }
    record.insert(
        "money_paid_to_personnel".to_string(),
        json!(input.money_paid_to_personnel),
    );

    match quote {
        Some(quote) => {
            record.insert("manual_valuation".to_string(), json!(quote.manual_valuation));
            record.insert("rental_amount".to_string(), json!(quote.rental_amount));
            record.insert(
                "daily_amounts".to_string(),
                serde_json::to_value(&quote.daily_amounts)
                    .map_err(|error| AppError::Internal(error.to_string()))?,
            );
        }
        None => {
            record.insert("manual_valuation".to_string(), json!(input.manual_valuation));
            record.insert("rental_amount".to_string(), json!(0.0));
            record.insert("daily_amounts".to_string(), json!([]));
        }
    }

    Ok(record)
}

/// Persist the score snapshot for a booked or updated event, replacing any
/// prior snapshot for the same event.
async fn save_defensibility_score(
    pool: &PgPool,
    event_id: &str,
    input: &SaveEventInput,
    document_count: usize,
) -> AppResult<DefensibilityScore> {
    let inputs = ScoreInputs {
        description: &input.description,
        people_count: input.people_count,
        start_time: &input.start_time,
        end_time: &input.end_time,
        manual_valuation: input.manual_valuation,
        document_count,
        money_paid_to_personnel: input.money_paid_to_personnel,
    };
    let score = DefensibilityScore::evaluate(&inputs);

    let mut record = match serde_json::to_value(score) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    record.insert("event_id".to_string(), Value::String(event_id.to_string()));

    let mut filters = Map::new();
    filters.insert("event_id".to_string(), Value::String(event_id.to_string()));
    let existing = list_rows(
        pool,
        "defensibility_scores",
        Some(&filters),
        1,
        0,
        "created_at",
        false,
    )
    .await?;

    match existing.first().map(|row| value_str(row, "id")) {
        Some(score_id) if !score_id.is_empty() => {
            update_row(pool, "defensibility_scores", &score_id, &record, "id").await?;
        }
        _ => {
            create_row(pool, "defensibility_scores", &record).await?;
        }
    }

    Ok(score)
}

async fn load_event_documents(pool: &PgPool, event_id: &str) -> AppResult<Vec<Value>> {
    let mut filters = Map::new();
    filters.insert("event_id".to_string(), Value::String(event_id.to_string()));
    list_rows(
        pool,
        "event_documents",
        Some(&filters),
        1000,
        0,
        "created_at",
        true,
    )
    .await
}

fn db_pool(state: &AppState) -> AppResult<&sqlx::PgPool> {
    state.db_pool.as_ref().ok_or_else(|| {
        AppError::Dependency(
            "Supabase database is not configured. Set SUPABASE_DB_URL or DATABASE_URL.".to_string(),
        )
    })
}

fn value_str(row: &Value, key: &str) -> String {
    row.as_object()
        .and_then(|obj| obj.get(key))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_default()
}

fn value_bool(row: &Value, key: &str) -> bool {
    row.as_object()
        .and_then(|obj| obj.get(key))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::{
        booking_conflict, candidate_range, editing_exclusion, ensure_quote_is_bookable,
        event_record, find_conflicting_event,
    };
    use crate::error::AppError;
    use crate::schemas::SaveEventInput;
    use crate::services::calendar::DateRange;
    use crate::services::draft::EventAction;
    use crate::services::rental_limit::evaluate_usage;
    use crate::services::valuation::{reconcile, PropertyPlan};

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, d).unwrap()
    }

    fn sibling(id: &str, start: &str, end: &str) -> serde_json::Value {
        json!({
            "id": id,
            "title": "Board retreat",
            "start_date": start,
            "end_date": end,
            "status": "booked"
        })
    }

    fn input() -> SaveEventInput {
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
    fn overlap_detection_is_inclusive_at_both_edges() {
        let siblings = vec![sibling("a", "2026-05-05", "2026-05-08")];
        // candidate ends on the sibling's first day
        let hit = find_conflicting_event(&siblings, DateRange::closed(day(5, 3), day(5, 5)), None);
        assert!(hit.is_some());
        // candidate starts on the sibling's last day
        let hit = find_conflicting_event(&siblings, DateRange::closed(day(5, 8), day(5, 10)), None);
        assert!(hit.is_some());
        // adjacent without touching
        let miss = find_conflicting_event(&siblings, DateRange::closed(day(5, 9), day(5, 10)), None);
        assert!(miss.is_none());
    }

    #[test]
    fn edit_mode_ignores_the_events_own_booking() {
        let siblings = vec![sibling("a", "2026-05-05", "2026-05-08")];
        let range = DateRange::closed(day(5, 5), day(5, 6));
        assert!(find_conflicting_event(&siblings, range, Some("a")).is_none());
        assert!(find_conflicting_event(&siblings, range, Some("b")).is_some());
    }

    #[test]
    fn conflict_error_carries_the_conflicting_event() {
        let event = sibling("abc", "2026-05-05", "2026-05-08");
        match booking_conflict(&event) {
            AppError::BookingConflict { details, .. } => {
                assert_eq!(details["conflictingEvent"]["id"], "abc");
                assert_eq!(details["conflictingEvent"]["start_date"], "2026-05-05");
            }
            other => panic!("expected BookingConflict, got {other:?}"),
        }
    }

    #[test]
    fn candidate_range_requires_both_dates() {
        let mut payload = input();
        payload.end_date = None;
        assert!(candidate_range(&payload).unwrap().is_none());

        payload.end_date = Some("2026-05-05".to_string());
        let range = candidate_range(&payload).unwrap().unwrap();
        assert_eq!(range.from, day(5, 4));
        assert_eq!(range.end(), day(5, 5));
    }

    #[test]
    fn record_normalizes_dates_and_trims_text() {
        let mut payload = input();
        payload.title = "  Quarterly planning offsite  ".to_string();
        payload.start_date = Some("05/04/2026".to_string());
        let record = event_record(&payload, EventAction::Book, None).unwrap();
        assert_eq!(record["title"], "Quarterly planning offsite");
        assert_eq!(record["start_date"], "2026-05-04");
        assert_eq!(record["status"], "booked");
        assert_eq!(record["rental_amount"], 0.0);
    }

    #[test]
    fn draft_record_keeps_draft_status() {
        let record = event_record(&input(), EventAction::Draft, None).unwrap();
        assert_eq!(record["status"], "draft");
    }

    #[test]
    fn pricing_gap_blocks_a_booking_write() {
        // Market mode with an empty pricing table hits the gap fallback.
        let plan = PropertyPlan::default();
        let gapped = reconcile(DateRange::closed(day(7, 1), day(7, 3)), &plan, &[], false, None);
        assert!(gapped.warning.is_some());
        assert!(matches!(
            ensure_quote_is_bookable(Some(&gapped)),
            Err(AppError::UnprocessableEntity(_))
        ));

        // A clean custom-plan quote passes.
        let flat = PropertyPlan {
            avarage_value: 200.0,
            is_custom_plan: true,
        };
        let clean = reconcile(DateRange::closed(day(7, 1), day(7, 3)), &flat, &[], false, None);
        assert!(ensure_quote_is_bookable(Some(&clean)).is_ok());
        assert!(ensure_quote_is_bookable(None).is_ok());
    }

    #[test]
    fn promoting_a_draft_is_cap_checked_as_a_new_booking() {
        // 12 booked days already on the address; the 3-day row under edit is
        // still a draft, so it is absent from the booked siblings.
        let siblings = vec![
            sibling("a", "2026-02-01", "2026-02-07"), // 7 days
            sibling("b", "2026-03-01", "2026-03-05"), // 5 days
        ];
        let range = DateRange::closed(day(4, 1), day(4, 3));

        let draft_row = json!({ "id": "c", "status": "draft" });
        let usage = evaluate_usage(&siblings, editing_exclusion(&draft_row, "c"), range);
        assert!(usage.exceeds_limit);

        // The same edit on an already-booked row keeps edit semantics.
        let booked_row = json!({ "id": "c", "status": "booked" });
        let usage = evaluate_usage(&siblings, editing_exclusion(&booked_row, "c"), range);
        assert!(!usage.exceeds_limit);
    }
}

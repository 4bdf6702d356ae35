use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Map, Value};

use crate::{
    auth::require_user_id,
    error::{AppError, AppResult},
    ownership::assert_address_owner,
    repository::table_service::list_rows,
    schemas::{AddressPath, AvailabilityQuery},
    services::calendar::{booked_ranges_from_rows, find_available_range, is_date_booked},
    services::dates::{iter_days, parse_day},
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route(
        "/addresses/{address_id}/availability",
        axum::routing::get(get_availability),
    )
}

/// Booked-day view of an address for a window of the calendar, plus the
/// longest free run inside the window when the window itself is not fully
/// free. Edit flows pass `exclude_event_id` so the event's own booking does
/// not block its new dates.
async fn get_availability(
    State(state): State<AppState>,
    Path(path): Path<AddressPath>,
    Query(query): Query<AvailabilityQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let pool = db_pool(&state)?;
    assert_address_owner(pool, &path.address_id, &user_id).await?;

    let start = parse_day(&query.start)?;
    let end = parse_day(&query.end)?;
    if end < start {
        return Err(AppError::BadRequest(
            "end must not be before start".to_string(),
        ));
    }

    let mut filters = Map::new();
    filters.insert(
        "rental_address_id".to_string(),
        Value::String(path.address_id.clone()),
    );
    let rows = list_rows(pool, "events", Some(&filters), 1000, 0, "start_date", true).await?;
    let booked = booked_ranges_from_rows(&rows, query.exclude_event_id.as_deref());

    let days: Vec<Value> = iter_days(start, end)
        .map(|day| {
            json!({
                "date": day,
                "booked": is_date_booked(day, &booked)
            })
        })
        .collect();

    let any_booked = days
        .iter()
        .any(|entry| entry["booked"].as_bool().unwrap_or(false));
    let suggestion = if any_booked {
        find_available_range(start, end, &booked).map(|free| {
            json!({
                "start_date": free.from,
                "end_date": free.end(),
                "was_adjusted": true
            })
        })
    } else {
        Some(json!({
            "start_date": start,
            "end_date": end,
            "was_adjusted": false
        }))
    };

    Ok(Json(json!({
        "data": {
            "days": days,
            "booked_ranges": booked
                .iter()
                .map(|range| json!({
                    "start_date": range.from,
                    "end_date": range.end()
                }))
                .collect::<Vec<Value>>(),
            "available_range": suggestion
        }
    })))
}

fn db_pool(state: &AppState) -> AppResult<&sqlx::PgPool> {
    state.db_pool.as_ref().ok_or_else(|| {
        AppError::Dependency(
            "Supabase database is not configured. Set SUPABASE_DB_URL or DATABASE_URL.".to_string(),
        )
    })
}

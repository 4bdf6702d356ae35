use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Map, Value};
use sqlx::PgPool;

use crate::{
    auth::require_user_id,
    error::{AppError, AppResult},
    ownership::assert_address_owner,
    repository::table_service::list_rows,
    schemas::{clamp_limit_in_range, AddressPath, PricingQuery, QuoteQuery},
    services::calendar::DateRange,
    services::dates::parse_day,
    services::pricing::pricing_table_from_rows,
    services::rental_limit::evaluate_usage,
    services::valuation::{reconcile, PropertyPlan},
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route(
            "/addresses/{address_id}/pricing",
            axum::routing::get(list_pricing),
        )
        .route(
            "/addresses/{address_id}/quote",
            axum::routing::get(get_quote),
        )
}

/// Raw `daily_pricing` rows for an address, optionally bounded by day.
async fn list_pricing(
    State(state): State<AppState>,
    Path(path): Path<AddressPath>,
    Query(query): Query<PricingQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let pool = db_pool(&state)?;
    assert_address_owner(pool, &path.address_id, &user_id).await?;

    let mut filters = Map::new();
    filters.insert(
        "rental_address_id".to_string(),
        Value::String(path.address_id.clone()),
    );
    if let Some(raw) = query.start.as_deref() {
        let start = parse_day(raw)?;
        filters.insert("date__gte".to_string(), json!(start));
    }
    if let Some(raw) = query.end.as_deref() {
        let end = parse_day(raw)?;
        filters.insert("date__lte".to_string(), json!(end));
    }

    let rows = list_rows(
        pool,
        "daily_pricing",
        Some(&filters),
        clamp_limit_in_range(query.limit, 1, 1000),
        0,
        "date",
        true,
    )
    .await?;
    Ok(Json(json!({ "data": rows })))
}

/// Server-side price quote for a candidate range: rental amount, per-day
/// lines, and 14-day usage, computed the same way a booking write computes
/// them. Never persists anything.
async fn get_quote(
    State(state): State<AppState>,
    Path(path): Path<AddressPath>,
    Query(query): Query<QuoteQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&state, &headers).await?;
    let pool = db_pool(&state)?;
    let address = assert_address_owner(pool, &path.address_id, &user_id).await?;

    let start = parse_day(&query.start)?;
    let end = parse_day(&query.end)?;
    if end < start {
        return Err(AppError::BadRequest(
            "end must not be before start".to_string(),
        ));
    }
    let range = DateRange::closed(start, end);

    let plan = property_plan(&address);
    let pricing = load_pricing_table(pool, &path.address_id, range).await?;
    let quote = reconcile(
        range,
        &plan,
        &pricing,
        query.manual_valuation,
        query.daily_rate,
    );

    let siblings = load_address_events(pool, &path.address_id).await?;
    let usage = evaluate_usage(&siblings, query.exclude_event_id.as_deref(), range);

    Ok(Json(json!({
        "data": {
            "manual_valuation": quote.manual_valuation,
            "rental_amount": quote.rental_amount,
            "daily_amounts": quote.daily_amounts,
            "warning": quote.warning,
            "days_used": usage.days_used,
            "candidate_days": usage.candidate_days,
            "exceeds_limit": usage.exceeds_limit
        }
    })))
}

pub fn property_plan(address: &Value) -> PropertyPlan {
    let obj = address.as_object();
    PropertyPlan {
        avarage_value: obj
            .and_then(|map| map.get("avarage_value"))
            .and_then(Value::as_f64)
            .unwrap_or(0.0),
        is_custom_plan: obj
            .and_then(|map| map.get("is_custom_plan"))
            .and_then(Value::as_bool)
            .unwrap_or(false),
    }
}

pub async fn load_pricing_table(
    pool: &PgPool,
    address_id: &str,
    range: DateRange,
) -> AppResult<Vec<crate::services::pricing::PricingDay>> {
    let mut filters = Map::new();
    filters.insert(
        "rental_address_id".to_string(),
        Value::String(address_id.to_string()),
    );
    filters.insert("date__gte".to_string(), json!(range.from));
    filters.insert("date__lte".to_string(), json!(range.end()));
    let rows = list_rows(pool, "daily_pricing", Some(&filters), 1000, 0, "date", true).await?;
    Ok(pricing_table_from_rows(&rows))
}

pub async fn load_address_events(pool: &PgPool, address_id: &str) -> AppResult<Vec<Value>> {
    let mut filters = Map::new();
    filters.insert(
        "rental_address_id".to_string(),
        Value::String(address_id.to_string()),
    );
    filters.insert("status".to_string(), Value::String("booked".to_string()));
    list_rows(pool, "events", Some(&filters), 1000, 0, "start_date", true).await
}

fn db_pool(state: &AppState) -> AppResult<&sqlx::PgPool> {
    state.db_pool.as_ref().ok_or_else(|| {
        AppError::Dependency(
            "Supabase database is not configured. Set SUPABASE_DB_URL or DATABASE_URL.".to_string(),
        )
    })
}

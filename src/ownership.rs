use serde_json::Value;
use sqlx::PgPool;

use crate::error::AppError;
use crate::repository::table_service::get_row;

/// Load a rental address and require that it belongs to the user. Records
/// are user-scoped; there is no shared-tenant membership model here.
pub async fn assert_address_owner(
    pool: &PgPool,
    address_id: &str,
    user_id: &str,
) -> Result<Value, AppError> {
    let address = get_row(pool, "rental_addresses", address_id, "id").await?;
    assert_owner_field(&address, user_id)?;
    Ok(address)
}

pub async fn assert_event_owner(
    pool: &PgPool,
    event_id: &str,
    user_id: &str,
) -> Result<Value, AppError> {
    let event = get_row(pool, "events", event_id, "id").await?;
    assert_owner_field(&event, user_id)?;
    Ok(event)
}

fn assert_owner_field(record: &Value, user_id: &str) -> Result<(), AppError> {
    let owner = record
        .as_object()
        .and_then(|obj| obj.get("user_id"))
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if owner == user_id {
        return Ok(());
    }
    Err(AppError::Forbidden(
        "Forbidden: this record belongs to another user.".to_string(),
    ))
}

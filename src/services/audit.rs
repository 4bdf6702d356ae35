use serde_json::{Map, Value};
use sqlx::PgPool;

use crate::repository::table_service::create_row;

/// Best-effort audit trail. Failures are logged and swallowed; an audit miss
/// must never fail the request that triggered it.
#[allow(clippy::too_many_arguments)]
pub async fn write_audit_log(
    pool: Option<&PgPool>,
    user_id: Option<&str>,
    action: &str,
    entity_table: &str,
    entity_id: Option<&str>,
    before: Option<Value>,
    after: Option<Value>,
) {
    let Some(pool) = pool else {
        return;
    };

    let mut record = Map::new();
    if let Some(user_id) = user_id {
        record.insert("user_id".to_string(), Value::String(user_id.to_string()));
    }
    record.insert("action".to_string(), Value::String(action.to_string()));
    record.insert(
        "entity_table".to_string(),
        Value::String(entity_table.to_string()),
    );
    if let Some(entity_id) = entity_id {
        record.insert(
            "entity_id".to_string(),
            Value::String(entity_id.to_string()),
        );
    }
    if let Some(before) = before {
        record.insert("before".to_string(), before);
    }
    if let Some(after) = after {
        record.insert("after".to_string(), after);
    }

    if let Err(error) = create_row(pool, "audit_logs", &record).await {
        tracing::warn!(error = %error, action, entity_table, "Audit log write failed");
    }
}

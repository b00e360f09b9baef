use diesel::prelude::*;
use log::error;
use serde_json::Value;

use crate::models::activity::{Action, EntityType, NewActivity};
use crate::schema::activity_logs;

/// Appends one row to the activity log. Failures are logged and swallowed:
/// the trail is an audit aid, not part of any request contract.
pub fn record(
    conn: &mut PgConnection,
    entity: EntityType,
    entity_id: i32,
    action: Action,
    performed_by: i32,
    description: Option<String>,
    metadata: Option<Value>,
) {
    let row = NewActivity {
        entity_type: entity.as_str().to_string(),
        entity_id,
        action: action.as_str().to_string(),
        description,
        performed_by,
        metadata,
    };
    if let Err(err) = diesel::insert_into(activity_logs::table)
        .values(&row)
        .execute(conn)
    {
        error!(
            "Failed to record {} activity for {} {}: {}",
            row.action, row.entity_type, row.entity_id, err
        );
    }
}

use diesel::prelude::*;
use serde_json::Value;

use crate::schema::activity_logs;

#[derive(Debug, Clone, Copy)]
pub enum EntityType {
    Task,
    Comment,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Task => "task",
            EntityType::Comment => "comment",
        }
    }
}

/// The action vocabulary matches the `activity_logs_action_check` constraint.
#[derive(Debug, Clone, Copy)]
pub enum Action {
    Created,
    Updated,
    Deleted,
    Assigned,
    Commented,
    StatusChanged,
    PriorityChanged,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Created => "created",
            Action::Updated => "updated",
            Action::Deleted => "deleted",
            Action::Assigned => "assigned",
            Action::Commented => "commented",
            Action::StatusChanged => "status_changed",
            Action::PriorityChanged => "priority_changed",
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = activity_logs)]
pub struct NewActivity {
    pub entity_type: String,
    pub entity_id: i32,
    pub action: String,
    pub description: Option<String>,
    pub performed_by: i32,
    pub metadata: Option<Value>,
}

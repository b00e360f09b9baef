use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::models::comment::CommentResponse;
use crate::models::user::{PublicUser, User};
use crate::schema::{task_assignees, tasks};

/// Workflow stage of a task. Canonical wire form is lowercase with
/// underscores (`in_progress`); the legacy space form is accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Todo,
    InProgress,
    Completed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Todo => "todo",
            Stage::InProgress => "in_progress",
            Stage::Completed => "completed",
        }
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(' ', "_").as_str() {
            "todo" => Ok(Stage::Todo),
            "in_progress" => Ok(Stage::InProgress),
            "completed" => Ok(Stage::Completed),
            other => Err(format!("Unknown stage '{}'", other)),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Stage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Stage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Task priority. The accepted set is the union of the two historical
/// variants of the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Low,
    Normal,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            other => Err(format!("Unknown priority '{}'", other)),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Priority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Associations)]
#[diesel(belongs_to(User, foreign_key = created_by))]
#[diesel(table_name = tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Task {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    pub priority: String,
    pub stage: String,
    pub created_by: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = tasks)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    pub priority: String,
    pub stage: String,
    pub created_by: i32,
}

/// Partial update; `None` fields are left untouched. `updated_at` is
/// maintained by the database trigger.
#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = tasks)]
pub struct TaskChangeset {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    pub priority: Option<String>,
    pub stage: Option<String>,
}

impl TaskChangeset {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.date.is_none()
            && self.priority.is_none()
            && self.stage.is_none()
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = task_assignees)]
pub struct NewAssignee {
    pub task_id: i32,
    pub user_id: i32,
}

/// The client-facing task shape.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    pub id: i32,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    pub priority: String,
    pub stage: String,
    pub team: Vec<PublicUser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<PublicUser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<CommentResponse>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskResponse {
    pub fn from_parts(task: Task, team: Vec<PublicUser>, created_by: Option<PublicUser>) -> Self {
        TaskResponse {
            id: task.id,
            title: task.title,
            description: task.description,
            date: task.date,
            priority: task.priority,
            stage: task.stage,
            team,
            created_by,
            comments: None,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

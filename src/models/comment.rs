use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

use crate::models::task::Task;
use crate::models::user::{PublicUser, User};
use crate::schema::comments;

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Associations)]
#[diesel(belongs_to(Task, foreign_key = task_id))]
#[diesel(belongs_to(User, foreign_key = author_id))]
#[diesel(table_name = comments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Comment {
    pub id: i32,
    pub text: String,
    pub task_id: i32,
    pub author_id: i32,
    pub parent_comment_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = comments)]
pub struct NewComment {
    pub text: String,
    pub task_id: i32,
    pub author_id: i32,
    pub parent_comment_id: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: i32,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<PublicUser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommentResponse {
    pub fn from_row(comment: Comment, author: Option<PublicUser>) -> Self {
        CommentResponse {
            id: comment.id,
            text: comment.text,
            author,
            parent_id: comment.parent_comment_id,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}

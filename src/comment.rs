use actix_web::{web, HttpRequest, HttpResponse};
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::json;

use crate::activity;
use crate::app_state::AppState;
use crate::auth::current_user;
use crate::error::ApiError;
use crate::models::activity::{Action, EntityType};
use crate::models::comment::{Comment, CommentResponse, NewComment};
use crate::models::user::PublicUser;
use crate::schema::{comments, tasks, users};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    #[serde(default)]
    pub text: String,
    pub parent_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

fn ensure_task_exists(conn: &mut PgConnection, task_id: i32) -> Result<(), ApiError> {
    let found = tasks::table
        .find(task_id)
        .select(tasks::id)
        .first::<i32>(conn)
        .optional()?;
    if found.is_none() {
        return Err(ApiError::NotFound(format!(
            "Task with ID {} not found",
            task_id
        )));
    }
    Ok(())
}

/// POST /api/task/comment/{id}
pub async fn add_comment(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<i32>,
    payload: web::Json<CreateCommentRequest>,
) -> Result<HttpResponse, ApiError> {
    let author = current_user(&req)?;
    let task_id = path.into_inner();
    let payload = payload.into_inner();
    if payload.text.trim().is_empty() {
        return Err(ApiError::Validation("Comment text is required".to_string()));
    }

    let pool = data.pool.clone();
    let comment = web::block(move || -> Result<CommentResponse, ApiError> {
        let mut conn = pool.get()?;
        ensure_task_exists(&mut conn, task_id)?;

        // A reply must stay within the thread of the task it targets.
        if let Some(parent_id) = payload.parent_id {
            let parent_task = comments::table
                .find(parent_id)
                .select(comments::task_id)
                .first::<i32>(&mut conn)
                .optional()?;
            match parent_task {
                Some(id) if id == task_id => {}
                Some(_) => {
                    return Err(ApiError::Validation(
                        "Parent comment belongs to a different task".to_string(),
                    ))
                }
                None => {
                    return Err(ApiError::Validation("Parent comment not found".to_string()))
                }
            }
        }

        let new_comment = NewComment {
            text: payload.text.trim().to_string(),
            task_id,
            author_id: author,
            parent_comment_id: payload.parent_id,
        };
        let comment: Comment = diesel::insert_into(comments::table)
            .values(&new_comment)
            .returning(Comment::as_returning())
            .get_result(&mut conn)?;

        activity::record(
            &mut conn,
            EntityType::Comment,
            comment.id,
            Action::Commented,
            author,
            None,
            Some(json!({ "taskId": task_id })),
        );

        let author_row = users::table
            .find(author)
            .select((users::id, users::name, users::email, users::role))
            .first::<PublicUser>(&mut conn)
            .optional()?;
        Ok(CommentResponse::from_row(comment, author_row))
    })
    .await??;

    Ok(HttpResponse::Created().json(json!({ "status": true, "comment": comment })))
}

/// GET /api/task/{id}/comments — paginated, oldest first.
pub async fn list_comments(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<i32>,
    query: web::Query<PaginationQuery>,
) -> Result<HttpResponse, ApiError> {
    current_user(&req)?;
    let task_id = path.into_inner();
    let query = query.into_inner();
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(10).clamp(1, 100);

    let pool = data.pool.clone();
    let (list, total) = web::block(move || -> Result<(Vec<CommentResponse>, i64), ApiError> {
        let mut conn = pool.get()?;
        ensure_task_exists(&mut conn, task_id)?;

        let total = comments::table
            .filter(comments::task_id.eq(task_id))
            .count()
            .get_result::<i64>(&mut conn)?;

        let rows = comments::table
            .inner_join(users::table)
            .filter(comments::task_id.eq(task_id))
            .order(comments::created_at.asc())
            .offset((page - 1) * limit)
            .limit(limit)
            .select((
                Comment::as_select(),
                (users::id, users::name, users::email, users::role),
            ))
            .load::<(Comment, PublicUser)>(&mut conn)?;

        let list = rows
            .into_iter()
            .map(|(comment, author)| CommentResponse::from_row(comment, Some(author)))
            .collect();
        Ok((list, total))
    })
    .await??;

    Ok(HttpResponse::Ok().json(json!({
        "status": true,
        "comments": list,
        "total": total
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_request_parses_parent_id() {
        let req: CreateCommentRequest =
            serde_json::from_str(r#"{ "text": "looks good", "parentId": 4 }"#).unwrap();
        assert_eq!(req.text, "looks good");
        assert_eq!(req.parent_id, Some(4));
    }

    #[test]
    fn missing_text_defaults_to_empty() {
        let req: CreateCommentRequest = serde_json::from_str(r#"{}"#).unwrap();
        assert!(req.text.trim().is_empty());
    }
}

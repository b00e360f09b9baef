use std::collections::HashMap;

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, NaiveDate};
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Deserializer};
use serde_json::json;

use crate::activity;
use crate::app_state::AppState;
use crate::auth::current_user;
use crate::error::ApiError;
use crate::models::activity::{Action, EntityType};
use crate::models::comment::{Comment, CommentResponse};
use crate::models::task::{
    NewAssignee, NewTask, Priority, Stage, Task, TaskChangeset, TaskResponse,
};
use crate::models::user::PublicUser;
use crate::schema::{comments, task_assignees, tasks, users};

/// A team entry as the client sends it: a user object. Members are matched
/// by id when present, by email otherwise.
#[derive(Debug, Deserialize)]
pub struct TeamMemberInput {
    pub id: Option<i32>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    pub stage: Option<Stage>,
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "parse_date")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub team: Vec<TeamMemberInput>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub stage: Option<Stage>,
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "parse_date")]
    pub date: Option<NaiveDate>,
    pub team: Option<Vec<TeamMemberInput>>,
}

#[derive(Debug, Deserialize)]
pub struct StageQuery {
    pub stage: Option<Stage>,
}

/// Accepts a bare date (`2024-12-31`) or a full RFC 3339 timestamp, which
/// is what the browser date picker posts.
fn parse_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => {
            let s = s.trim();
            if let Ok(date) = s.parse::<NaiveDate>() {
                return Ok(Some(date));
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Ok(Some(dt.date_naive()));
            }
            Err(serde::de::Error::custom(format!("Invalid date '{}'", s)))
        }
    }
}

fn team_for_tasks(
    conn: &mut PgConnection,
    task_ids: &[i32],
) -> Result<HashMap<i32, Vec<PublicUser>>, ApiError> {
    if task_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = task_assignees::table
        .inner_join(users::table)
        .filter(task_assignees::task_id.eq_any(task_ids))
        .order(task_assignees::assigned_at.asc())
        .select((
            task_assignees::task_id,
            (users::id, users::name, users::email, users::role),
        ))
        .load::<(i32, PublicUser)>(conn)?;

    let mut map: HashMap<i32, Vec<PublicUser>> = HashMap::new();
    for (task_id, user) in rows {
        map.entry(task_id).or_default().push(user);
    }
    Ok(map)
}

fn creators_for_tasks(
    conn: &mut PgConnection,
    task_list: &[Task],
) -> Result<HashMap<i32, PublicUser>, ApiError> {
    let mut ids: Vec<i32> = task_list.iter().map(|t| t.created_by).collect();
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = users::table
        .filter(users::id.eq_any(&ids))
        .select((users::id, users::name, users::email, users::role))
        .load::<PublicUser>(conn)?;
    Ok(rows.into_iter().map(|u| (u.id, u)).collect())
}

/// Joins tasks with their team and creator into response shapes.
fn task_responses(
    conn: &mut PgConnection,
    task_list: Vec<Task>,
) -> Result<Vec<TaskResponse>, ApiError> {
    let ids: Vec<i32> = task_list.iter().map(|t| t.id).collect();
    let mut teams = team_for_tasks(conn, &ids)?;
    let creators = creators_for_tasks(conn, &task_list)?;

    Ok(task_list
        .into_iter()
        .map(|task| {
            let team = teams.remove(&task.id).unwrap_or_default();
            let created_by = creators.get(&task.created_by).cloned();
            TaskResponse::from_parts(task, team, created_by)
        })
        .collect())
}

/// Resolves team inputs to user ids, deduplicated, preserving order.
fn resolve_team(
    conn: &mut PgConnection,
    members: &[TeamMemberInput],
) -> Result<Vec<i32>, ApiError> {
    let mut ids = Vec::with_capacity(members.len());
    for member in members {
        let found = if let Some(id) = member.id {
            users::table
                .find(id)
                .select(users::id)
                .first::<i32>(conn)
                .optional()?
        } else if let Some(email) = &member.email {
            users::table
                .filter(users::email.eq(email.trim().to_lowercase()))
                .select(users::id)
                .first::<i32>(conn)
                .optional()?
        } else {
            return Err(ApiError::Validation(
                "Team members need an id or an email".to_string(),
            ));
        };
        match found {
            Some(id) => {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            None => {
                let label = member
                    .email
                    .clone()
                    .unwrap_or_else(|| member.id.map(|id| id.to_string()).unwrap_or_default());
                return Err(ApiError::Validation(format!(
                    "Team member '{}' not found",
                    label
                )));
            }
        }
    }
    Ok(ids)
}

fn replace_assignees(
    conn: &mut PgConnection,
    task_id: i32,
    user_ids: &[i32],
) -> Result<(), ApiError> {
    diesel::delete(task_assignees::table.filter(task_assignees::task_id.eq(task_id)))
        .execute(conn)?;
    let rows: Vec<NewAssignee> = user_ids
        .iter()
        .map(|&user_id| NewAssignee { task_id, user_id })
        .collect();
    if !rows.is_empty() {
        diesel::insert_into(task_assignees::table)
            .values(&rows)
            .execute(conn)?;
    }
    Ok(())
}

/// GET /api/task/ — all tasks, newest first, optional ?stage= filter.
pub async fn list_tasks(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<StageQuery>,
) -> Result<HttpResponse, ApiError> {
    current_user(&req)?;
    let stage = query.into_inner().stage;

    let pool = data.pool.clone();
    let list = web::block(move || -> Result<Vec<TaskResponse>, ApiError> {
        let mut conn = pool.get()?;
        let mut query = tasks::table.select(Task::as_select()).into_boxed();
        if let Some(stage) = stage {
            query = query.filter(tasks::stage.eq(stage.as_str()));
        }
        let task_list = query.order(tasks::id.desc()).load(&mut conn)?;
        task_responses(&mut conn, task_list)
    })
    .await??;

    Ok(HttpResponse::Ok().json(json!({ "status": true, "tasks": list })))
}

/// GET /api/task/user/{email} — tasks whose team contains the given user.
pub async fn user_tasks(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<StageQuery>,
) -> Result<HttpResponse, ApiError> {
    current_user(&req)?;
    let email = path.into_inner().trim().to_lowercase();
    let stage = query.into_inner().stage;

    let pool = data.pool.clone();
    let list = web::block(move || -> Result<Vec<TaskResponse>, ApiError> {
        let mut conn = pool.get()?;
        let mut query = tasks::table
            .inner_join(task_assignees::table.inner_join(users::table))
            .filter(users::email.eq(&email))
            .select(Task::as_select())
            .into_boxed();
        if let Some(stage) = stage {
            query = query.filter(tasks::stage.eq(stage.as_str()));
        }
        let task_list = query.order(tasks::id.desc()).load(&mut conn)?;
        task_responses(&mut conn, task_list)
    })
    .await??;

    Ok(HttpResponse::Ok().json(json!({ "status": true, "tasks": list })))
}

/// GET /api/task/{id} — one task with creator, team, and its comment thread.
pub async fn get_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    current_user(&req)?;
    let task_id = path.into_inner();

    let pool = data.pool.clone();
    let task = web::block(move || -> Result<TaskResponse, ApiError> {
        let mut conn = pool.get()?;
        let task = tasks::table
            .find(task_id)
            .select(Task::as_select())
            .first(&mut conn)
            .optional()?
            .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

        let comment_rows = comments::table
            .inner_join(users::table)
            .filter(comments::task_id.eq(task_id))
            .order(comments::created_at.asc())
            .select((
                Comment::as_select(),
                (users::id, users::name, users::email, users::role),
            ))
            .load::<(Comment, PublicUser)>(&mut conn)?;

        let mut response = task_responses(&mut conn, vec![task])?
            .pop()
            .ok_or(ApiError::Internal)?;
        response.comments = Some(
            comment_rows
                .into_iter()
                .map(|(comment, author)| CommentResponse::from_row(comment, Some(author)))
                .collect(),
        );
        Ok(response)
    })
    .await??;

    Ok(HttpResponse::Ok().json(json!({ "status": true, "task": task })))
}

/// POST /api/task/create
pub async fn create_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<CreateTaskRequest>,
) -> Result<HttpResponse, ApiError> {
    let creator = current_user(&req)?;
    let payload = payload.into_inner();
    if payload.title.trim().is_empty() {
        return Err(ApiError::Validation("Title is required".to_string()));
    }

    let pool = data.pool.clone();
    let task = web::block(move || -> Result<TaskResponse, ApiError> {
        let mut conn = pool.get()?;
        let task = conn.transaction::<Task, ApiError, _>(|conn| {
            let new_task = NewTask {
                title: payload.title.trim().to_string(),
                description: payload.description.clone(),
                date: payload.date,
                priority: payload.priority.unwrap_or(Priority::Normal).to_string(),
                stage: payload.stage.unwrap_or(Stage::Todo).to_string(),
                created_by: creator,
            };
            let task: Task = diesel::insert_into(tasks::table)
                .values(&new_task)
                .returning(Task::as_returning())
                .get_result(conn)?;

            let member_ids = resolve_team(conn, &payload.team)?;
            replace_assignees(conn, task.id, &member_ids)?;
            Ok(task)
        })?;

        activity::record(
            &mut conn,
            EntityType::Task,
            task.id,
            Action::Created,
            creator,
            Some(format!("Created task '{}'", task.title)),
            None,
        );

        task_responses(&mut conn, vec![task])?
            .pop()
            .ok_or(ApiError::Internal)
    })
    .await??;

    info!("Task {} created by user {}", task.id, creator);
    Ok(HttpResponse::Created().json(json!({
        "status": true,
        "task": task,
        "message": "Task created successfully."
    })))
}

/// PUT /api/task/update/{id}
pub async fn update_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<i32>,
    payload: web::Json<UpdateTaskRequest>,
) -> Result<HttpResponse, ApiError> {
    let editor = current_user(&req)?;
    let task_id = path.into_inner();
    let payload = payload.into_inner();

    let changeset = TaskChangeset {
        title: payload.title.as_ref().map(|t| t.trim().to_string()),
        description: payload.description.clone(),
        date: payload.date,
        priority: payload.priority.map(|p| p.to_string()),
        stage: payload.stage.map(|s| s.to_string()),
    };
    if let Some(title) = &changeset.title {
        if title.is_empty() {
            return Err(ApiError::Validation("Title cannot be empty".to_string()));
        }
    }
    if changeset.is_empty() && payload.team.is_none() {
        return Err(ApiError::Validation("No fields to update".to_string()));
    }

    let stage_changed = changeset.stage.is_some();
    let priority_changed = changeset.priority.is_some();
    let team_changed = payload.team.is_some();
    let other_changed =
        changeset.title.is_some() || changeset.description.is_some() || changeset.date.is_some();

    let pool = data.pool.clone();
    let task = web::block(move || -> Result<TaskResponse, ApiError> {
        let mut conn = pool.get()?;
        let task = conn.transaction::<Task, ApiError, _>(|conn| {
            let task: Task = if changeset.is_empty() {
                tasks::table
                    .find(task_id)
                    .select(Task::as_select())
                    .first(conn)
                    .optional()?
            } else {
                diesel::update(tasks::table.find(task_id))
                    .set(&changeset)
                    .returning(Task::as_returning())
                    .get_result(conn)
                    .optional()?
            }
            .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

            if let Some(members) = &payload.team {
                let member_ids = resolve_team(conn, members)?;
                replace_assignees(conn, task.id, &member_ids)?;
            }
            Ok(task)
        })?;

        if stage_changed {
            activity::record(
                &mut conn,
                EntityType::Task,
                task.id,
                Action::StatusChanged,
                editor,
                Some(format!("Stage set to '{}'", task.stage)),
                None,
            );
        }
        if priority_changed {
            activity::record(
                &mut conn,
                EntityType::Task,
                task.id,
                Action::PriorityChanged,
                editor,
                Some(format!("Priority set to '{}'", task.priority)),
                None,
            );
        }
        if team_changed {
            activity::record(
                &mut conn,
                EntityType::Task,
                task.id,
                Action::Assigned,
                editor,
                Some("Team updated".to_string()),
                None,
            );
        }
        if other_changed {
            activity::record(
                &mut conn,
                EntityType::Task,
                task.id,
                Action::Updated,
                editor,
                None,
                None,
            );
        }

        task_responses(&mut conn, vec![task])?
            .pop()
            .ok_or(ApiError::Internal)
    })
    .await??;

    Ok(HttpResponse::Ok().json(json!({
        "status": true,
        "task": task,
        "message": "Task updated successfully."
    })))
}

/// DELETE /api/task/{id} — comments and assignments go with it (FK cascade).
pub async fn delete_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    let task_id = path.into_inner();

    let pool = data.pool.clone();
    web::block(move || -> Result<(), ApiError> {
        let mut conn = pool.get()?;
        let deleted = diesel::delete(tasks::table.find(task_id)).execute(&mut conn)?;
        if deleted == 0 {
            return Err(ApiError::NotFound("Task not found".to_string()));
        }
        activity::record(
            &mut conn,
            EntityType::Task,
            task_id,
            Action::Deleted,
            caller,
            None,
            None,
        );
        Ok(())
    })
    .await??;

    info!("Task {} deleted by user {}", task_id, caller);
    Ok(HttpResponse::Ok().json(json!({
        "status": true,
        "message": "Task deleted successfully."
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_parses_stage_and_priority_variants() {
        let req: CreateTaskRequest = serde_json::from_str(
            r#"{ "title": "Ship it", "stage": "In Progress", "priority": "HIGH" }"#,
        )
        .unwrap();
        assert_eq!(req.stage, Some(Stage::InProgress));
        assert_eq!(req.priority, Some(Priority::High));
    }

    #[test]
    fn create_request_rejects_unknown_stage() {
        let result = serde_json::from_str::<CreateTaskRequest>(
            r#"{ "title": "Ship it", "stage": "archived" }"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn date_parser_accepts_both_client_formats() {
        let req: CreateTaskRequest =
            serde_json::from_str(r#"{ "title": "t", "date": "2026-02-28" }"#).unwrap();
        assert_eq!(
            req.date,
            Some(NaiveDate::from_ymd_opt(2026, 2, 28).unwrap())
        );

        let req: CreateTaskRequest =
            serde_json::from_str(r#"{ "title": "t", "date": "2026-02-28T10:30:00Z" }"#).unwrap();
        assert_eq!(
            req.date,
            Some(NaiveDate::from_ymd_opt(2026, 2, 28).unwrap())
        );

        let req: CreateTaskRequest =
            serde_json::from_str(r#"{ "title": "t", "date": "" }"#).unwrap();
        assert_eq!(req.date, None);
    }

    #[test]
    fn date_parser_rejects_garbage() {
        let result =
            serde_json::from_str::<CreateTaskRequest>(r#"{ "title": "t", "date": "tomorrow" }"#);
        assert!(result.is_err());
    }

    #[test]
    fn empty_changeset_is_detected() {
        let changeset = TaskChangeset::default();
        assert!(changeset.is_empty());

        let changeset = TaskChangeset {
            stage: Some(Stage::Completed.to_string()),
            ..Default::default()
        };
        assert!(!changeset.is_empty());
    }

    #[test]
    fn team_input_accepts_full_user_objects() {
        let members: Vec<TeamMemberInput> = serde_json::from_str(
            r#"[{ "id": 3, "name": "Ada", "email": "ada@example.com", "role": "member" }]"#,
        )
        .unwrap();
        assert_eq!(members[0].id, Some(3));
        assert_eq!(members[0].email.as_deref(), Some("ada@example.com"));
    }
}

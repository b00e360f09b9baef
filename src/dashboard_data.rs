use actix_web::{web, HttpRequest, HttpResponse};
use diesel::dsl::count_star;
use diesel::prelude::*;
use serde::Serialize;
use serde_json::json;

use crate::app_state::AppState;
use crate::auth::current_user;
use crate::error::ApiError;
use crate::schema::tasks;

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageCounts {
    pub todo: i64,
    pub in_progress: i64,
    pub completed: i64,
}

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct PriorityCounts {
    pub low: i64,
    pub normal: i64,
    pub medium: i64,
    pub high: i64,
    pub urgent: i64,
}

fn stage_counts(rows: &[(String, i64)]) -> StageCounts {
    let mut counts = StageCounts::default();
    for (stage, n) in rows {
        match stage.as_str() {
            "todo" => counts.todo += n,
            "in_progress" => counts.in_progress += n,
            "completed" => counts.completed += n,
            _ => {}
        }
    }
    counts
}

fn priority_counts(rows: &[(String, i64)]) -> PriorityCounts {
    let mut counts = PriorityCounts::default();
    for (priority, n) in rows {
        match priority.as_str() {
            "low" => counts.low += n,
            "normal" => counts.normal += n,
            "medium" => counts.medium += n,
            "high" => counts.high += n,
            "urgent" => counts.urgent += n,
            _ => {}
        }
    }
    counts
}

/// GET /api/task/stats — the dashboard header numbers: totals per stage,
/// plus the priority spread of tasks that are still open.
pub async fn task_stats(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    current_user(&req)?;

    let pool = data.pool.clone();
    let (stage_rows, priority_rows) =
        web::block(move || -> Result<(Vec<(String, i64)>, Vec<(String, i64)>), ApiError> {
            let mut conn = pool.get()?;
            let stage_rows = tasks::table
                .group_by(tasks::stage)
                .select((tasks::stage, count_star()))
                .load::<(String, i64)>(&mut conn)?;
            let priority_rows = tasks::table
                .filter(tasks::stage.ne("completed"))
                .group_by(tasks::priority)
                .select((tasks::priority, count_star()))
                .load::<(String, i64)>(&mut conn)?;
            Ok((stage_rows, priority_rows))
        })
        .await??;

    let by_stage = stage_counts(&stage_rows);
    let total = by_stage.todo + by_stage.in_progress + by_stage.completed;

    Ok(HttpResponse::Ok().json(json!({
        "status": true,
        "stats": {
            "totalTasks": total,
            "byStage": by_stage,
            "byPriority": priority_counts(&priority_rows),
        }
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_counts_fills_known_buckets() {
        let rows = vec![
            ("todo".to_string(), 3),
            ("in_progress".to_string(), 2),
            ("completed".to_string(), 5),
        ];
        assert_eq!(
            stage_counts(&rows),
            StageCounts {
                todo: 3,
                in_progress: 2,
                completed: 5,
            }
        );
    }

    #[test]
    fn unknown_buckets_are_ignored() {
        let rows = vec![("archived".to_string(), 9), ("todo".to_string(), 1)];
        let counts = stage_counts(&rows);
        assert_eq!(counts.todo, 1);
        assert_eq!(counts.in_progress, 0);

        let rows = vec![("critical".to_string(), 4), ("high".to_string(), 2)];
        let counts = priority_counts(&rows);
        assert_eq!(counts.high, 2);
        assert_eq!(counts.low + counts.normal + counts.medium + counts.urgent, 0);
    }

    #[test]
    fn empty_input_yields_zeroes() {
        assert_eq!(stage_counts(&[]), StageCounts::default());
        assert_eq!(priority_counts(&[]), PriorityCounts::default());
    }
}

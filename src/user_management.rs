use actix_web::{web, HttpRequest, HttpResponse};
use diesel::prelude::*;
use serde_json::json;

use crate::app_state::AppState;
use crate::auth::current_user;
use crate::error::ApiError;
use crate::models::user::PublicUser;
use crate::schema::users;

/// GET /api/user/get-all-users
pub async fn get_all_users(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    current_user(&req)?;

    let pool = data.pool.clone();
    let list = web::block(move || -> Result<Vec<PublicUser>, ApiError> {
        let mut conn = pool.get()?;
        let list = users::table
            .select((users::id, users::name, users::email, users::role))
            .order(users::name.asc())
            .load::<PublicUser>(&mut conn)?;
        Ok(list)
    })
    .await??;

    Ok(HttpResponse::Ok().json(json!({ "status": true, "users": list })))
}

/// GET /api/user/get-users — every user except the caller, for assignment
/// pickers.
pub async fn get_users(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;

    let pool = data.pool.clone();
    let list = web::block(move || -> Result<Vec<PublicUser>, ApiError> {
        let mut conn = pool.get()?;
        let list = users::table
            .filter(users::id.ne(caller))
            .select((users::id, users::name, users::email, users::role))
            .order(users::name.asc())
            .load::<PublicUser>(&mut conn)?;
        Ok(list)
    })
    .await??;

    Ok(HttpResponse::Ok().json(json!({ "status": true, "users": list })))
}

// src/main.rs

mod activity;
mod app_state;
mod auth;
mod comment;
mod config;
mod dashboard_data;
mod db;
mod error;
mod models;
mod schema;
mod task;
mod user_management;

use std::future::{ready, Future, Ready};
use std::pin::Pin;
use std::task::{Context, Poll};

use actix_cors::Cors;
use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http,
    middleware::Logger,
    web, App, Error, HttpMessage, HttpServer, ResponseError,
};
use env_logger::Env;
use log::info;

use crate::app_state::AppState;
use crate::auth::{login, logout, register, AuthUser, TOKEN_COOKIE};
use crate::comment::{add_comment, list_comments};
use crate::dashboard_data::task_stats;
use crate::error::ApiError;
use crate::task::{create_task, delete_task, get_task, list_tasks, update_task, user_tasks};
use crate::user_management::{get_all_users, get_users};

/// Validates the `token` cookie (with `Bearer` header fallback) and stashes
/// the caller's id in request extensions. Requests without a token pass
/// through; handlers that need one reject via `auth::current_user`.
#[derive(Debug, Clone)]
pub struct Authentication {
    secret: String,
}

impl Authentication {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = AuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddleware {
            service,
            secret: self.secret.clone(),
        }))
    }
}

pub struct AuthMiddleware<S> {
    service: S,
    secret: String,
}

impl<S, B> Service<ServiceRequest> for AuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let token = req
            .cookie(TOKEN_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .or_else(|| {
                req.headers()
                    .get(http::header::AUTHORIZATION)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.strip_prefix("Bearer "))
                    .map(|value| value.trim().to_string())
            });

        if let Some(token) = token {
            match auth::validate_jwt(&token, &self.secret) {
                Ok(claims) => {
                    req.extensions_mut().insert(AuthUser(claims.user_id));
                }
                Err(e) => {
                    let (req_parts, _payload) = req.into_parts();
                    let resp = ApiError::Unauthorized(format!("Invalid token: {}", e))
                        .error_response()
                        .map_into_boxed_body();
                    let srv_resp = ServiceResponse::new(req_parts, resp);
                    return Box::pin(async move { Ok(srv_resp) });
                }
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_boxed_body())
        })
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = config::Config::from_env();
    let pool = db::create_pool(&config.database_url)
        .expect("Failed to create database connection pool");
    db::run_migrations(&pool)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    let bind_addr = (config.host.clone(), config.port);
    info!("Server running at http://{}:{}", config.host, config.port);
    info!("Allowed CORS origin: {}", config.frontend_origin);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&config.frontend_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                http::header::CONTENT_TYPE,
                http::header::ACCEPT,
                http::header::AUTHORIZATION,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .wrap(Authentication::new(config.jwt_secret.clone()))
            .app_data(web::Data::new(AppState {
                pool: pool.clone(),
                config: config.clone(),
            }))
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                ApiError::Validation(err.to_string()).into()
            }))
            .app_data(web::PathConfig::default().error_handler(|err, _req| {
                ApiError::Validation(err.to_string()).into()
            }))
            .app_data(web::QueryConfig::default().error_handler(|err, _req| {
                ApiError::Validation(err.to_string()).into()
            }))
            .service(
                web::scope("/api")
                    .service(
                        web::scope("/user")
                            .route("/register", web::post().to(register))
                            .route("/login", web::post().to(login))
                            .route("/logout", web::post().to(logout))
                            .route("/get-all-users", web::get().to(get_all_users))
                            .route("/get-users", web::get().to(get_users)),
                    )
                    .service(
                        web::scope("/task")
                            .route("", web::get().to(list_tasks))
                            .route("/", web::get().to(list_tasks))
                            .route("/stats", web::get().to(task_stats))
                            .route("/user/{email}", web::get().to(user_tasks))
                            .route("/create", web::post().to(create_task))
                            .route("/update/{id}", web::put().to(update_task))
                            .route("/comment/{id}", web::post().to(add_comment))
                            .route("/{id}/comments", web::get().to(list_comments))
                            .route("/{id}", web::get().to(get_task))
                            .route("/{id}", web::delete().to(delete_task)),
                    ),
            )
    })
    .bind(bind_addr)?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::cookie::Cookie;
    use actix_web::{test, HttpRequest, HttpResponse};

    use crate::auth::{create_jwt, current_user};

    async fn whoami(req: HttpRequest) -> Result<HttpResponse, ApiError> {
        let user_id = current_user(&req)?;
        Ok(HttpResponse::Ok().json(serde_json::json!({ "status": true, "userId": user_id })))
    }

    #[actix_web::test]
    async fn cookie_token_reaches_the_handler() {
        let app = test::init_service(
            App::new()
                .wrap(Authentication::new("test-secret"))
                .route("/whoami", web::get().to(whoami)),
        )
        .await;

        let token = create_jwt(9, "test-secret", 1).unwrap();
        let req = test::TestRequest::get()
            .uri("/whoami")
            .cookie(Cookie::new(TOKEN_COOKIE, token))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["userId"], 9);
    }

    #[actix_web::test]
    async fn bearer_token_is_accepted_as_fallback() {
        let app = test::init_service(
            App::new()
                .wrap(Authentication::new("test-secret"))
                .route("/whoami", web::get().to(whoami)),
        )
        .await;

        let token = create_jwt(4, "test-secret", 1).unwrap();
        let req = test::TestRequest::get()
            .uri("/whoami")
            .insert_header((http::header::AUTHORIZATION, format!("Bearer {}", token)))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["userId"], 4);
    }

    #[actix_web::test]
    async fn invalid_token_is_rejected_with_the_envelope() {
        let app = test::init_service(
            App::new()
                .wrap(Authentication::new("test-secret"))
                .route("/whoami", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/whoami")
            .cookie(Cookie::new(TOKEN_COOKIE, "not-a-jwt"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), http::StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], false);
    }

    #[actix_web::test]
    async fn missing_token_is_rejected_by_the_guard() {
        let app = test::init_service(
            App::new()
                .wrap(Authentication::new("test-secret"))
                .route("/whoami", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get().uri("/whoami").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), http::StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn token_from_a_different_secret_is_rejected() {
        let app = test::init_service(
            App::new()
                .wrap(Authentication::new("test-secret"))
                .route("/whoami", web::get().to(whoami)),
        )
        .await;

        let token = create_jwt(9, "other-secret", 1).unwrap();
        let req = test::TestRequest::get()
            .uri("/whoami")
            .cookie(Cookie::new(TOKEN_COOKIE, token))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), http::StatusCode::UNAUTHORIZED);
    }
}

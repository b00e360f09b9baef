use actix_web::cookie::time::Duration as CookieDuration;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use diesel::prelude::*;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::app_state::AppState;
use crate::config::Config;
use crate::error::ApiError;
use crate::models::user::{NewUser, User, UserResponse};
use crate::schema::users;

pub const TOKEN_COOKIE: &str = "token";

const ROLES: [&str; 3] = ["admin", "manager", "member"];

/// JWT payload. The wire field is `userId` to match the client contract.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: i32,
    pub exp: usize,
}

/// The authenticated caller, inserted into request extensions by the
/// middleware in `main.rs`.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub i32);

/// Reads the authenticated user id, or fails with the 401 the original
/// guard produced.
pub fn current_user(req: &HttpRequest) -> Result<i32, ApiError> {
    req.extensions()
        .get::<AuthUser>()
        .map(|user| user.0)
        .ok_or_else(|| ApiError::Unauthorized("Not authorized. Try login again.".to_string()))
}

pub fn create_jwt(
    user_id: i32,
    secret: &str,
    expires_hours: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = Utc::now() + Duration::hours(expires_hours);
    let claims = Claims {
        user_id,
        exp: expiration.timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
}

pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

fn auth_cookie(config: &Config, token: &str) -> Cookie<'static> {
    Cookie::build(TOKEN_COOKIE, token.to_string())
        .path("/")
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(if config.cookie_secure {
            SameSite::None
        } else {
            SameSite::Lax
        })
        .max_age(CookieDuration::hours(config.jwt_expires_hours))
        .finish()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub avatar_url: Option<String>,
    pub role: Option<String>,
}

impl RegisterRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().len() < 2 {
            return Err(ApiError::Validation(
                "Name must be at least 2 characters".to_string(),
            ));
        }
        if !self.email.contains('@') {
            return Err(ApiError::Validation(
                "A valid email address is required".to_string(),
            ));
        }
        if self.password.len() < 6 {
            return Err(ApiError::Validation(
                "Password must be at least 6 characters".to_string(),
            ));
        }
        if let Some(role) = &self.role {
            if !ROLES.contains(&role.as_str()) {
                return Err(ApiError::Validation(format!("Unknown role '{}'", role)));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// POST /api/user/register
pub async fn register(
    data: web::Data<AppState>,
    payload: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    payload.validate()?;

    let pool = data.pool.clone();
    let user = web::block(move || -> Result<User, ApiError> {
        let mut conn = pool.get()?;

        let email = payload.email.trim().to_lowercase();
        let existing = users::table
            .filter(users::email.eq(&email))
            .select(User::as_select())
            .first(&mut conn)
            .optional()?;
        if existing.is_some() {
            return Err(ApiError::Conflict(
                "User with this email already exists".to_string(),
            ));
        }

        let hashed = hash(&payload.password, DEFAULT_COST)?;
        let new_user = NewUser {
            name: payload.name.trim().to_string(),
            email,
            password: hashed,
            avatar_url: payload.avatar_url,
            role: payload.role.unwrap_or_else(|| "member".to_string()),
        };
        let user = diesel::insert_into(users::table)
            .values(&new_user)
            .returning(User::as_returning())
            .get_result(&mut conn)?;
        Ok(user)
    })
    .await??;

    let token = create_jwt(user.id, &data.config.jwt_secret, data.config.jwt_expires_hours)
        .map_err(|e| {
            error!("Failed to sign JWT: {}", e);
            ApiError::Internal
        })?;
    info!("Registered user {} ({})", user.id, user.email);

    Ok(HttpResponse::Created()
        .cookie(auth_cookie(&data.config, &token))
        .json(json!({ "status": true, "user": UserResponse::from(user) })))
}

/// POST /api/user/login
pub async fn login(
    data: web::Data<AppState>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let LoginRequest { email, password } = payload.into_inner();
    if email.trim().is_empty() || password.is_empty() {
        return Err(ApiError::Validation(
            "Email and password are required".to_string(),
        ));
    }

    let pool = data.pool.clone();
    let user = web::block(move || -> Result<User, ApiError> {
        let mut conn = pool.get()?;
        let user = users::table
            .filter(users::email.eq(email.trim().to_lowercase()))
            .select(User::as_select())
            .first(&mut conn)
            .optional()?
            .ok_or_else(|| ApiError::Unauthorized("Invalid email or password.".to_string()))?;

        if !user.is_active {
            return Err(ApiError::Unauthorized("Account is deactivated.".to_string()));
        }
        if !verify(&password, &user.password)? {
            return Err(ApiError::Unauthorized("Invalid email or password.".to_string()));
        }
        Ok(user)
    })
    .await??;

    let token = create_jwt(user.id, &data.config.jwt_secret, data.config.jwt_expires_hours)
        .map_err(|e| {
            error!("Failed to sign JWT: {}", e);
            ApiError::Internal
        })?;

    Ok(HttpResponse::Ok()
        .cookie(auth_cookie(&data.config, &token))
        .json(json!({ "status": true, "user": UserResponse::from(user) })))
}

/// POST /api/user/logout
pub async fn logout() -> HttpResponse {
    let mut cookie = Cookie::build(TOKEN_COOKIE, "")
        .path("/")
        .http_only(true)
        .finish();
    cookie.make_removal();

    HttpResponse::Ok()
        .cookie(cookie)
        .json(json!({ "status": true, "message": "Logout successful" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jwt_round_trip() {
        let token = create_jwt(42, "test-secret", 24).unwrap();
        let claims = validate_jwt(&token, "test-secret").unwrap();
        assert_eq!(claims.user_id, 42);
    }

    #[test]
    fn jwt_rejects_wrong_secret() {
        let token = create_jwt(42, "test-secret", 24).unwrap();
        assert!(validate_jwt(&token, "other-secret").is_err());
    }

    #[test]
    fn jwt_rejects_expired_token() {
        let token = create_jwt(42, "test-secret", -2).unwrap();
        let err = validate_jwt(&token, "test-secret").unwrap_err();
        assert!(matches!(
            err.kind(),
            jsonwebtoken::errors::ErrorKind::ExpiredSignature
        ));
    }

    #[test]
    fn claims_serialize_with_the_user_id_wire_name() {
        let claims = Claims {
            user_id: 7,
            exp: 1_900_000_000,
        };
        let value = serde_json::to_value(&claims).unwrap();
        assert_eq!(value["userId"], 7);
    }

    #[test]
    fn password_hash_round_trip() {
        let hashed = hash("hunter22", 4).unwrap();
        assert!(verify("hunter22", &hashed).unwrap());
        assert!(!verify("hunter23", &hashed).unwrap());
    }

    fn valid_register() -> RegisterRequest {
        RegisterRequest {
            name: "John Doe".to_string(),
            email: "john@example.com".to_string(),
            password: "password123".to_string(),
            avatar_url: None,
            role: None,
        }
    }

    #[test]
    fn register_validation_accepts_a_complete_payload() {
        assert!(valid_register().validate().is_ok());
    }

    #[test]
    fn register_validation_rejects_bad_fields() {
        let mut req = valid_register();
        req.name = "J".to_string();
        assert!(req.validate().is_err());

        let mut req = valid_register();
        req.email = "not-an-email".to_string();
        assert!(req.validate().is_err());

        let mut req = valid_register();
        req.password = "short".to_string();
        assert!(req.validate().is_err());

        let mut req = valid_register();
        req.role = Some("superuser".to_string());
        assert!(req.validate().is_err());
    }
}

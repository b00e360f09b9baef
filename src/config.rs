use std::env;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expires_hours: i64,
    pub frontend_origin: String,
    pub host: String,
    pub port: u16,
    /// Mirrors the original deployment switch: secure + SameSite=None in
    /// production, SameSite=Lax over plain HTTP in development.
    pub cookie_secure: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            jwt_expires_hours: env::var("JWT_EXPIRES_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .unwrap_or(24),
            frontend_origin: env::var("FRONTEND_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            cookie_secure: env::var("COOKIE_SECURE")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_applies_defaults() {
        env::set_var("DATABASE_URL", "postgres://localhost/taskboard_test");
        env::set_var("JWT_SECRET", "test-secret");
        env::remove_var("JWT_EXPIRES_HOURS");
        env::remove_var("FRONTEND_ORIGIN");
        env::remove_var("HOST");
        env::remove_var("PORT");
        env::remove_var("COOKIE_SECURE");

        let config = Config::from_env();
        assert_eq!(config.jwt_expires_hours, 24);
        assert_eq!(config.frontend_origin, "http://localhost:3000");
        assert_eq!(config.port, 8080);
        assert!(!config.cookie_secure);
    }
}

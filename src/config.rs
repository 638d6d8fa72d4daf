// src/config.rs

use std::env;
use dotenvy::dotenv;

use crate::error::AppError;

/// Minutes granted per question when computing an attendee's time budget.
pub const DEFAULT_MINUTES_PER_QUESTION: i64 = 5;

/// Length of the join code attached to every class session.
pub const JOIN_CODE_LENGTH: usize = 8;

const DEFAULT_JWT_EXPIRATION: u64 = 60 * 60 * 24;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: String,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub admin_email: Option<String>,
    pub minutes_per_question: i64,
    pub mail: MailConfig,
}

/// Outbound mail settings. Without an API key codes are only logged.
#[derive(Debug, Clone, Default)]
pub struct MailConfig {
    pub resend_api_key: Option<String>,
    pub from_address: String,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET")?;

        let jwt_expiration = parsed("JWT_EXPIRATION_SECONDS", DEFAULT_JWT_EXPIRATION)?;

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let minutes_per_question =
            parsed("QUIZ_MINUTES_PER_QUESTION", DEFAULT_MINUTES_PER_QUESTION)?;
        if minutes_per_question <= 0 {
            return Err(AppError::InternalServerError(
                "QUIZ_MINUTES_PER_QUESTION must be positive".to_string(),
            ));
        }

        let mail = MailConfig {
            resend_api_key: optional("RESEND_API_KEY"),
            from_address: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "Quiz Portal <noreply@quiz-portal.local>".to_string()),
        };

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            bind_addr,
            admin_username: optional("ADMIN_USERNAME"),
            admin_password: optional("ADMIN_PASSWORD"),
            admin_email: optional("ADMIN_EMAIL"),
            minutes_per_question,
            mail,
        })
    }
}

fn required(key: &str) -> Result<String, AppError> {
    env::var(key).map_err(|_| AppError::InternalServerError(format!("{key} must be set")))
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::InternalServerError(format!("{key} has an invalid value"))),
        Err(_) => Ok(default),
    }
}

// src/models/admin.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'admins' table: dashboard principals, separate from attendees.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Admin {
    pub id: i64,
    pub username: String,
    pub email: String,

    /// Argon2 password hash.
    #[serde(skip)]
    pub password: String,

    pub created_at: DateTime<Utc>,
}

/// DTO for admin login.
#[derive(Debug, Deserialize, Validate)]
pub struct AdminLoginRequest {
    #[validate(length(min = 1, max = 100))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// DTO for an admin creating another admin.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateAdminRequest {
    #[validate(length(
        min = 3,
        max = 100,
        message = "Username length must be between 3 and 100 characters."
    ))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(
        min = 8,
        max = 128,
        message = "Password length must be between 8 and 128 characters."
    ))]
    pub password: String,
}

/// Counts shown on the dashboard landing page.
#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub sessions_total: i64,
    pub sessions_active: i64,
    pub sessions_upcoming: i64,
    pub sessions_past: i64,
    pub attendees: i64,
    pub questions: i64,
    pub responses: i64,
    pub reviews: i64,
}

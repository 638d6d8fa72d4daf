// src/handlers/feedback.rs

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::SqlitePool;

use crate::{
    config::Config,
    error::AppError,
    models::review::SubmitFeedbackRequest,
    services::feedback,
    utils::jwt::{ROLE_ATTENDEE, optional_claims},
};

/// Accepts feedback from anyone. A valid attendee token attributes it.
pub async fn submit_feedback(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    headers: HeaderMap,
    Json(payload): Json<SubmitFeedbackRequest>,
) -> Result<impl IntoResponse, AppError> {
    let attendee_id = match optional_claims(&headers, &config.jwt_secret)? {
        Some(claims) if claims.role == ROLE_ATTENDEE => Some(claims.attendee()?.attendee_id),
        _ => None,
    };

    let review = feedback::submit_feedback(&pool, attendee_id, &payload, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

// src/handlers/sessions.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::session::{
        ClassSession, PublicSessionView, SendCodeRequest, SessionStatus, SessionView,
        VerifyCodeRequest,
    },
    notify::NotificationGateway,
    services::registry,
};

/// Lists every session with its status. Join codes are left out; registered
/// participants can have theirs emailed, new ones get it from the teacher.
pub async fn list_sessions(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let now = Utc::now();
    let sessions = registry::list_sessions(&pool).await?;
    Ok(Json(public_views(sessions, now)))
}

pub async fn list_active(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let now = Utc::now();
    let sessions = registry::list_by_status(&pool, SessionStatus::Active, now).await?;
    Ok(Json(public_views(sessions, now)))
}

pub async fn list_upcoming(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let now = Utc::now();
    let sessions = registry::list_by_status(&pool, SessionStatus::Upcoming, now).await?;
    Ok(Json(public_views(sessions, now)))
}

pub async fn get_session(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let session = registry::get_session(&pool, id).await?;
    Ok(Json(PublicSessionView::from(SessionView::at(session, Utc::now()))))
}

/// Checks a code the participant typed before they fill in the join form.
pub async fn verify_code(
    State(pool): State<SqlitePool>,
    Json(payload): Json<VerifyCodeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let now = Utc::now();
    let session =
        registry::verify_code(&pool, &payload.session_code, payload.expected_session_id, now)
            .await?;
    Ok(Json(json!({
        "valid": true,
        "session": SessionView::at(session, now),
    })))
}

/// Emails the session code to a registered participant's address.
pub async fn send_code(
    State(pool): State<SqlitePool>,
    State(notifier): State<Arc<dyn NotificationGateway>>,
    Path(id): Path<i64>,
    Json(payload): Json<SendCodeRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let sent =
        registry::request_code(&pool, notifier.as_ref(), id, payload.email.trim(), Utc::now())
            .await?;
    Ok(Json(json!({ "sent": sent })))
}

fn public_views(sessions: Vec<ClassSession>, now: DateTime<Utc>) -> Vec<PublicSessionView> {
    sessions
        .into_iter()
        .map(|s| PublicSessionView::from(SessionView::at(s, now)))
        .collect()
}

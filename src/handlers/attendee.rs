// src/handlers/attendee.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};
use chrono::Utc;
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::{attendee::MeResponse, session::SessionView},
    services::{attendance, identity, ledger, registry},
    utils::jwt::Claims,
};

/// Returns the logged-in attendee's profile and the session their token is bound to.
pub async fn me(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let principal = claims.attendee()?;
    let attendee = identity::get_attendee(&pool, principal.attendee_id).await?;

    let current_session = match registry::get_session(&pool, principal.session_id).await {
        Ok(session) => Some(SessionView::at(session, Utc::now())),
        Err(AppError::NotFound(_)) => None,
        Err(e) => return Err(e),
    };

    Ok(Json(MeResponse {
        attendee,
        current_session,
    }))
}

/// Lists the sessions the attendee has joined.
pub async fn attendance(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let principal = claims.attendee()?;
    let history = attendance::attendance_history(&pool, principal.attendee_id).await?;
    Ok(Json(history))
}

/// Lists the attendee's own answers in their current session.
pub async fn responses(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let principal = claims.attendee()?;
    let mut answers =
        ledger::attendee_responses(&pool, principal.attendee_id, Some(principal.session_id))
            .await?;
    // The answer key stays hidden from participants.
    for answer in &mut answers {
        answer.correct_option = None;
        answer.is_correct = None;
    }
    Ok(Json(answers))
}

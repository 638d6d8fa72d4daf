// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::{
        admin::CreateAdminRequest,
        question::{CreateQuestionRequest, UpdateQuestionRequest},
        review::ReviewFilter,
        session::{CreateSessionRequest, SessionView, UpdateSessionRequest},
    },
    services::{attendance, feedback, identity, ledger, progress, questions, registry},
    state::AppState,
};

/// Lists all sessions with their codes and attendance/question counts.
/// Admin only.
pub async fn list_sessions(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let sessions = registry::list_sessions_with_counts(&pool, Utc::now()).await?;
    Ok(Json(sessions))
}

/// Creates a session; its join code is generated server-side.
/// Admin only.
pub async fn create_session(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let now = Utc::now();
    let session = registry::create_session(&pool, &payload, now).await?;
    Ok((StatusCode::CREATED, Json(SessionView::at(session, now))))
}

pub async fn get_session(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let session = registry::get_session(&pool, id).await?;
    Ok(Json(SessionView::at(session, Utc::now())))
}

/// Edits a session. Moving `end_time` later re-opens an expired session.
/// Admin only.
pub async fn update_session(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = registry::update_session(&pool, id, &payload).await?;
    Ok(Json(SessionView::at(session, Utc::now())))
}

pub async fn delete_session(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    registry::delete_session(&pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Lists a session's questions including answer keys.
pub async fn list_questions(
    State(pool): State<SqlitePool>,
    Path(session_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let list = questions::list_questions(&pool, session_id).await?;
    Ok(Json(list))
}

pub async fn create_question(
    State(pool): State<SqlitePool>,
    Path(session_id): Path<i64>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let question = questions::add_question(&pool, session_id, &payload, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

pub async fn update_question(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let question = questions::update_question(&pool, id, &payload).await?;
    Ok(Json(question))
}

pub async fn delete_question(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    questions::delete_question(&pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_attendees(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let attendees = attendance::list_attendees(&pool).await?;
    Ok(Json(attendees))
}

/// Deletes an attendee along with their attendance, progress and responses.
/// Admin only.
pub async fn delete_attendee(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    attendance::delete_attendee(&pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn session_roster(
    State(pool): State<SqlitePool>,
    Path(session_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let roster = attendance::session_roster(&pool, session_id).await?;
    Ok(Json(roster))
}

/// Lists every response in a session, scored against the current answer key.
pub async fn session_responses(
    State(pool): State<SqlitePool>,
    Path(session_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    registry::get_session(&pool, session_id).await?;
    let responses = ledger::session_responses(&pool, session_id).await?;
    Ok(Json(responses))
}

pub async fn session_scores(
    State(pool): State<SqlitePool>,
    Path(session_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    registry::get_session(&pool, session_id).await?;
    let scores = ledger::session_scores(&pool, session_id).await?;
    Ok(Json(scores))
}

/// Emails the join code to everyone who has joined the session.
/// Admin only.
pub async fn send_codes(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let report =
        registry::send_codes_to_roster(&state.pool, state.notifier.as_ref(), session_id).await?;
    Ok(Json(report))
}

pub async fn progress_stats(
    State(pool): State<SqlitePool>,
    Path((session_id, attendee_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let stats = progress::progress_stats(&pool, attendee_id, session_id).await?;
    Ok(Json(stats))
}

/// Re-checks completion after questions were edited or removed.
/// Admin only.
pub async fn refresh_progress(
    State(pool): State<SqlitePool>,
    Path((session_id, attendee_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let stats = progress::refresh_completion(&pool, attendee_id, session_id, Utc::now()).await?;
    Ok(Json(stats))
}

pub async fn list_reviews(
    State(pool): State<SqlitePool>,
    Query(filter): Query<ReviewFilter>,
) -> Result<impl IntoResponse, AppError> {
    let reviews = feedback::list_reviews(&pool, &filter).await?;
    Ok(Json(reviews))
}

pub async fn dashboard_stats(
    State(pool): State<SqlitePool>,
) -> Result<impl IntoResponse, AppError> {
    let stats = feedback::dashboard_stats(&pool, Utc::now()).await?;
    Ok(Json(stats))
}

pub async fn list_admins(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let admins = identity::list_admins(&pool).await?;
    Ok(Json(admins))
}

/// Creates another dashboard admin.
/// Admin only.
pub async fn create_admin(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateAdminRequest>,
) -> Result<impl IntoResponse, AppError> {
    let admin = identity::create_admin(&pool, &payload, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": admin.id, "username": admin.username }))))
}

// src/handlers/quiz.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};
use chrono::Utc;

use crate::{
    error::AppError,
    models::progress::SubmitAnswersRequest,
    services::progress,
    state::AppState,
    utils::jwt::Claims,
};

/// Opens the quiz for the attendee's current session.
///
/// The first call starts the clock. Returns the unanswered questions (without
/// answer keys) and the remaining time, or the completion view once the quiz
/// is over.
pub async fn get_state(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let principal = claims.attendee()?;
    let quiz =
        progress::get_quiz_state(&state.pool, &state.policy(), principal, Utc::now()).await?;
    Ok(Json(quiz))
}

/// Submits answers for the attendee's current session.
///
/// Answers to questions already on record are skipped, never overwritten.
pub async fn submit(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SubmitAnswersRequest>,
) -> Result<impl IntoResponse, AppError> {
    let principal = claims.attendee()?;
    let outcome = progress::submit_answers(
        &state.pool,
        &state.policy(),
        principal,
        &payload.answers,
        Utc::now(),
    )
    .await?;
    Ok(Json(outcome))
}

// src/handlers/auth.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use sqlx::SqlitePool;

use crate::{
    config::Config,
    error::AppError,
    models::{
        admin::AdminLoginRequest,
        attendee::{CheckParticipantRequest, JoinSessionRequest},
    },
    services::identity,
    state::AppState,
};

/// Registers a new participant or logs in a returning one, joining them to a session.
///
/// Returns 201 Created for a new registration and 200 OK for a login,
/// with a bearer token bound to the joined session.
pub async fn join(
    State(state): State<AppState>,
    Json(payload): Json<JoinSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let joined = identity::register_or_login(&state, &payload, Utc::now()).await?;
    let status = if joined.is_new {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(joined)))
}

/// Looks up a returning participant by email or phone so the form can be pre-filled.
pub async fn check_participant(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CheckParticipantRequest>,
) -> Result<impl IntoResponse, AppError> {
    let lookup = identity::check_participant(&pool, &payload).await?;
    Ok(Json(lookup))
}

/// Authenticates a dashboard admin and returns a JWT token.
pub async fn admin_login(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Json(payload): Json<AdminLoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let login = identity::admin_login(&pool, &config, &payload).await?;
    Ok(Json(login))
}

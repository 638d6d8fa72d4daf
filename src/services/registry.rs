// src/services/registry.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use validator::Validate;

use crate::{
    error::{AppError, is_unique_violation},
    models::session::{
        AdminSessionView, ClassSession, CreateSessionRequest, SessionStatus, SessionView,
        UpdateSessionRequest,
    },
    notify::NotificationGateway,
    services::identity::{self, Identifier},
    utils::code::{generate_join_code, normalize_code},
};

const SESSION_COLUMNS: &str =
    "id, title, teacher, start_time, end_time, session_code, created_at";

/// Rejects windows that do not open strictly before they close.
fn check_window_order(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), AppError> {
    if start >= end {
        return Err(AppError::Validation(
            "end_time: must be later than start_time".to_string(),
        ));
    }
    Ok(())
}

/// Fails unless the session's window contains `now`.
pub fn ensure_open(session: &ClassSession, now: DateTime<Utc>) -> Result<(), AppError> {
    match session.status(now) {
        SessionStatus::Active => Ok(()),
        SessionStatus::Upcoming => Err(AppError::SessionClosed(
            "This session has not started yet.".to_string(),
        )),
        SessionStatus::Expired => Err(AppError::SessionClosed(
            "This session has already ended.".to_string(),
        )),
    }
}

async fn code_exists(pool: &SqlitePool, code: &str) -> Result<bool, AppError> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM class_sessions WHERE session_code = ?)")
            .bind(code)
            .fetch_one(pool)
            .await?;
    Ok(exists)
}

/// Creates a session with a freshly generated, unused join code.
///
/// Keeps drawing codes until one is free; a UNIQUE violation from a concurrent
/// insert of the same code is treated as another collision.
pub async fn create_session(
    pool: &SqlitePool,
    req: &CreateSessionRequest,
    now: DateTime<Utc>,
) -> Result<ClassSession, AppError> {
    req.validate()?;
    check_window_order(req.start_time, req.end_time)?;

    loop {
        let code = generate_join_code(&mut rand::rng());
        if code_exists(pool, &code).await? {
            tracing::debug!("Join code collision on {}, drawing again", code);
            continue;
        }

        let result = sqlx::query(
            r#"
            INSERT INTO class_sessions (title, teacher, start_time, end_time, session_code, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(req.title.trim())
        .bind(req.teacher.trim())
        .bind(req.start_time)
        .bind(req.end_time)
        .bind(&code)
        .bind(now)
        .execute(pool)
        .await;

        match result {
            Ok(done) => {
                let session = get_session(pool, done.last_insert_rowid()).await?;
                tracing::info!("Created session {} with code {}", session.id, session.session_code);
                return Ok(session);
            }
            Err(e) if is_unique_violation(&e) => continue,
            Err(e) => {
                tracing::error!("Failed to create session: {:?}", e);
                return Err(e.into());
            }
        }
    }
}

/// Edits a session. The join code is immutable; moving `end_time` later extends the session.
pub async fn update_session(
    pool: &SqlitePool,
    id: i64,
    req: &UpdateSessionRequest,
) -> Result<ClassSession, AppError> {
    req.validate()?;
    let current = get_session(pool, id).await?;

    let title = req.title.as_deref().map(str::trim).unwrap_or(&current.title);
    let teacher = req.teacher.as_deref().map(str::trim).unwrap_or(&current.teacher);
    let start_time = req.start_time.unwrap_or(current.start_time);
    let end_time = req.end_time.unwrap_or(current.end_time);
    check_window_order(start_time, end_time)?;

    sqlx::query(
        "UPDATE class_sessions SET title = ?, teacher = ?, start_time = ?, end_time = ? WHERE id = ?",
    )
    .bind(title)
    .bind(teacher)
    .bind(start_time)
    .bind(end_time)
    .bind(id)
    .execute(pool)
    .await?;

    get_session(pool, id).await
}

pub async fn delete_session(pool: &SqlitePool, id: i64) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM class_sessions WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Session not found".to_string()));
    }
    Ok(())
}

pub async fn get_session(pool: &SqlitePool, id: i64) -> Result<ClassSession, AppError> {
    sqlx::query_as::<_, ClassSession>(&format!(
        "SELECT {SESSION_COLUMNS} FROM class_sessions WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Session not found".to_string()))
}

/// Resolves a join code, compared case-insensitively.
pub async fn lookup_by_code(pool: &SqlitePool, raw_code: &str) -> Result<ClassSession, AppError> {
    let code = normalize_code(raw_code);
    if code.is_empty() {
        return Err(AppError::Validation("session_code: required".to_string()));
    }

    sqlx::query_as::<_, ClassSession>(&format!(
        "SELECT {SESSION_COLUMNS} FROM class_sessions WHERE session_code = ?"
    ))
    .bind(&code)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Invalid session code".to_string()))
}

/// Resolves a code a participant typed for the session they picked.
///
/// A code belonging to another session gets its own error instead of a
/// generic "invalid code", so the participant knows to re-check the session.
pub async fn verify_code(
    pool: &SqlitePool,
    raw_code: &str,
    expected_session_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<ClassSession, AppError> {
    let session = lookup_by_code(pool, raw_code).await?;

    if let Some(expected) = expected_session_id {
        if expected != session.id {
            return Err(AppError::WrongSession(
                "This code is for a different session.".to_string(),
            ));
        }
    }

    ensure_open(&session, now)?;
    Ok(session)
}

pub async fn list_sessions(pool: &SqlitePool) -> Result<Vec<ClassSession>, AppError> {
    let sessions = sqlx::query_as::<_, ClassSession>(&format!(
        "SELECT {SESSION_COLUMNS} FROM class_sessions ORDER BY start_time DESC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(sessions)
}

/// Sessions whose status at `now` is `status`.
pub async fn list_by_status(
    pool: &SqlitePool,
    status: SessionStatus,
    now: DateTime<Utc>,
) -> Result<Vec<ClassSession>, AppError> {
    let sessions = list_sessions(pool).await?;
    Ok(sessions
        .into_iter()
        .filter(|s| s.status(now) == status)
        .collect())
}

#[derive(FromRow)]
struct SessionWithCounts {
    #[sqlx(flatten)]
    session: ClassSession,
    attendee_count: i64,
    question_count: i64,
}

pub async fn list_sessions_with_counts(
    pool: &SqlitePool,
    now: DateTime<Utc>,
) -> Result<Vec<AdminSessionView>, AppError> {
    let rows = sqlx::query_as::<_, SessionWithCounts>(
        r#"
        SELECT
            s.id, s.title, s.teacher, s.start_time, s.end_time, s.session_code, s.created_at,
            (SELECT COUNT(*) FROM session_attendance a WHERE a.class_session_id = s.id) AS attendee_count,
            (SELECT COUNT(*) FROM questions q WHERE q.class_session_id = s.id) AS question_count
        FROM class_sessions s
        ORDER BY s.start_time DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| AdminSessionView {
            view: SessionView::at(r.session, now),
            attendee_count: r.attendee_count,
            question_count: r.question_count,
        })
        .collect())
}

/// Emails a session's code to a registered participant on request.
///
/// Returns whether the gateway reported delivery; a failure is logged only.
pub async fn request_code(
    pool: &SqlitePool,
    notifier: &dyn NotificationGateway,
    session_id: i64,
    email: &str,
    now: DateTime<Utc>,
) -> Result<bool, AppError> {
    let session = get_session(pool, session_id).await?;
    if session.status(now) == SessionStatus::Expired {
        return Err(AppError::SessionClosed(
            "This session has already ended.".to_string(),
        ));
    }

    // Codes only go to registered participants, at the address on file.
    let identifier = Identifier::Email(email.trim().to_lowercase());
    let Some(attendee) = identity::find_attendee(pool, &identifier).await? else {
        return Err(AppError::NotFound(
            "No participant found with that email address.".to_string(),
        ));
    };

    let sent = notifier.send_code(&attendee.email, &session).await;
    if !sent {
        tracing::warn!(
            "Could not deliver code for session {} to attendee {}",
            session.id,
            attendee.id
        );
    }
    Ok(sent)
}

#[derive(Debug, Serialize)]
pub struct BulkSendReport {
    pub sent: usize,
    pub failed: usize,
}

/// Emails the code to every attendee who has joined the session.
pub async fn send_codes_to_roster(
    pool: &SqlitePool,
    notifier: &dyn NotificationGateway,
    session_id: i64,
) -> Result<BulkSendReport, AppError> {
    let session = get_session(pool, session_id).await?;
    let emails: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT a.email
        FROM session_attendance sa
        JOIN attendees a ON a.id = sa.attendee_id
        WHERE sa.class_session_id = ?
        ORDER BY a.id
        "#,
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    let mut report = BulkSendReport { sent: 0, failed: 0 };
    for email in &emails {
        if notifier.send_code(email, &session).await {
            report.sent += 1;
        } else {
            tracing::warn!("Could not deliver code for session {} to {}", session.id, email);
            report.failed += 1;
        }
    }
    tracing::info!(
        "Sent codes for session {}: {} delivered, {} failed",
        session.id,
        report.sent,
        report.failed
    );
    Ok(report)
}

// src/services/attendance.rs

use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::{
        attendance::{AttendanceHistoryEntry, SessionRosterEntry},
        attendee::Attendee,
    },
    services::registry,
};

/// Sessions an attendee has joined, most recent first.
pub async fn attendance_history(
    pool: &SqlitePool,
    attendee_id: i64,
) -> Result<Vec<AttendanceHistoryEntry>, AppError> {
    let entries = sqlx::query_as::<_, AttendanceHistoryEntry>(
        r#"
        SELECT sa.class_session_id, s.title, s.teacher, s.session_code, sa.joined_at, sa.has_submitted
        FROM session_attendance sa
        JOIN class_sessions s ON s.id = sa.class_session_id
        WHERE sa.attendee_id = ?
        ORDER BY sa.joined_at DESC
        "#,
    )
    .bind(attendee_id)
    .fetch_all(pool)
    .await?;
    Ok(entries)
}

/// Everyone who has joined a session.
pub async fn session_roster(
    pool: &SqlitePool,
    session_id: i64,
) -> Result<Vec<SessionRosterEntry>, AppError> {
    registry::get_session(pool, session_id).await?;
    let roster = sqlx::query_as::<_, SessionRosterEntry>(
        r#"
        SELECT a.id AS attendee_id, a.name, a.email, a.phone, sa.joined_at, sa.has_submitted
        FROM session_attendance sa
        JOIN attendees a ON a.id = sa.attendee_id
        WHERE sa.class_session_id = ?
        ORDER BY sa.joined_at
        "#,
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;
    Ok(roster)
}

pub async fn list_attendees(pool: &SqlitePool) -> Result<Vec<Attendee>, AppError> {
    let attendees = sqlx::query_as::<_, Attendee>(
        r#"
        SELECT id, name, phone, email, age, place, class_session_id, has_submitted,
               quiz_started_at, password, created_at, updated_at
        FROM attendees
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(attendees)
}

/// Removes an attendee with their attendance, progress and responses.
/// Their feedback is kept without attribution.
pub async fn delete_attendee(pool: &SqlitePool, id: i64) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM attendees WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Attendee not found".to_string()));
    }
    tracing::info!("Deleted attendee {}", id);
    Ok(())
}

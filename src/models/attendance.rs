// src/models/attendance.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Represents the 'session_attendance' table: one row per (attendee, session) ever joined.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SessionAttendance {
    pub id: i64,
    pub attendee_id: i64,
    pub class_session_id: i64,
    pub joined_at: DateTime<Utc>,
    pub has_submitted: bool,
}

/// Attendance joined with session details, for an attendee's history.
#[derive(Debug, Serialize, FromRow)]
pub struct AttendanceHistoryEntry {
    pub class_session_id: i64,
    pub title: String,
    pub teacher: String,
    pub session_code: String,
    pub joined_at: DateTime<Utc>,
    pub has_submitted: bool,
}

/// Attendance joined with attendee details, for an admin's session roster.
#[derive(Debug, Serialize, FromRow)]
pub struct SessionRosterEntry {
    pub attendee_id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub joined_at: DateTime<Utc>,
    pub has_submitted: bool,
}

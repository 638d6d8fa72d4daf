// src/models/session.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'class_sessions' table in the database.
/// A scheduled, time-boxed quiz window with a unique join code.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ClassSession {
    pub id: i64,
    pub title: String,
    pub teacher: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,

    /// Eight uppercase alphanumeric characters, assigned once at creation.
    pub session_code: String,

    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Upcoming,
    Active,
    Expired,
}

impl ClassSession {
    /// Both window boundaries are inclusive.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now && now <= self.end_time
    }

    pub fn status(&self, now: DateTime<Utc>) -> SessionStatus {
        if now < self.start_time {
            SessionStatus::Upcoming
        } else if now > self.end_time {
            SessionStatus::Expired
        } else {
            SessionStatus::Active
        }
    }
}

/// Session as presented to clients, with its status derived at `now`.
#[derive(Debug, Serialize)]
pub struct SessionView {
    #[serde(flatten)]
    pub session: ClassSession,
    pub status: SessionStatus,
    pub is_active: bool,
    pub time_until_start: i64,
    pub time_until_end: i64,
}

impl SessionView {
    pub fn at(session: ClassSession, now: DateTime<Utc>) -> Self {
        let time_until_start = (session.start_time - now).num_seconds().max(0);
        let time_until_end = (session.end_time - now).num_seconds().max(0);
        Self {
            status: session.status(now),
            is_active: session.is_active(now),
            time_until_start,
            time_until_end,
            session,
        }
    }
}

/// Session as listed to anyone, without its join code.
#[derive(Debug, Serialize)]
pub struct PublicSessionView {
    pub id: i64,
    pub title: String,
    pub teacher: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: SessionStatus,
    pub is_active: bool,
    pub time_until_start: i64,
    pub time_until_end: i64,
}

impl From<SessionView> for PublicSessionView {
    fn from(v: SessionView) -> Self {
        Self {
            id: v.session.id,
            title: v.session.title,
            teacher: v.session.teacher,
            start_time: v.session.start_time,
            end_time: v.session.end_time,
            status: v.status,
            is_active: v.is_active,
            time_until_start: v.time_until_start,
            time_until_end: v.time_until_end,
        }
    }
}

/// Session row with attendance and question counts for the admin dashboard.
#[derive(Debug, Serialize)]
pub struct AdminSessionView {
    #[serde(flatten)]
    pub view: SessionView,
    pub attendee_count: i64,
    pub question_count: i64,
}

/// DTO for creating a new session.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSessionRequest {
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[validate(length(min = 1, max = 100))]
    pub teacher: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// DTO for editing a session. The join code cannot be changed.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateSessionRequest {
    #[validate(length(min = 1, max = 100))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub teacher: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// DTO for checking a join code before logging in.
#[derive(Debug, Deserialize)]
pub struct VerifyCodeRequest {
    pub session_code: String,
    pub expected_session_id: Option<i64>,
}

/// DTO for asking the portal to email a session's join code.
#[derive(Debug, Deserialize, Validate)]
pub struct SendCodeRequest {
    #[validate(email)]
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn session() -> ClassSession {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        ClassSession {
            id: 1,
            title: "Networks".to_string(),
            teacher: "Ada".to_string(),
            start_time: start,
            end_time: start + Duration::hours(2),
            session_code: "ABCD1234".to_string(),
            created_at: start - Duration::days(1),
        }
    }

    #[test]
    fn test_status_boundaries_are_inclusive() {
        let s = session();
        assert_eq!(s.status(s.start_time), SessionStatus::Active);
        assert_eq!(s.status(s.end_time), SessionStatus::Active);
        assert!(s.is_active(s.start_time));
        assert!(s.is_active(s.end_time));
    }

    #[test]
    fn test_status_outside_window() {
        let s = session();
        let before = s.start_time - Duration::seconds(1);
        let after = s.end_time + Duration::seconds(1);
        assert_eq!(s.status(before), SessionStatus::Upcoming);
        assert_eq!(s.status(after), SessionStatus::Expired);
        assert!(!s.is_active(before));
        assert!(!s.is_active(after));
    }

    #[test]
    fn test_view_countdowns_floor_at_zero() {
        let s = session();
        let now = s.start_time + Duration::minutes(30);
        let view = SessionView::at(s, now);
        assert_eq!(view.time_until_start, 0);
        assert_eq!(view.time_until_end, 90 * 60);
        assert!(view.is_active);
    }
}

// src/models/attendee.rs

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::session::SessionView;

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{10}$").expect("phone pattern is valid"));

/// Represents the 'attendees' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Attendee {
    pub id: i64,
    pub name: String,

    /// Exactly ten digits.
    pub phone: String,

    pub email: String,
    pub age: Option<i64>,
    pub place: String,

    /// The session the attendee most recently joined.
    pub class_session_id: Option<i64>,

    pub has_submitted: bool,
    pub quiz_started_at: Option<DateTime<Utc>>,

    /// Stored credential in any supported encoding; empty means none.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile fields returned for registration form auto-fill.
#[derive(Debug, Clone, Serialize)]
pub struct AttendeeProfile {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub age: Option<i64>,
    pub place: String,
}

impl From<&Attendee> for AttendeeProfile {
    fn from(a: &Attendee) -> Self {
        Self {
            name: a.name.clone(),
            email: a.email.clone(),
            phone: a.phone.clone(),
            age: a.age,
            place: a.place.clone(),
        }
    }
}

/// DTO for the participant auto-fill check.
#[derive(Debug, Deserialize)]
pub struct CheckParticipantRequest {
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ParticipantLookup {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<AttendeeProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Profile supplied by a participant joining for the first time.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegistrationProfile {
    #[validate(length(min = 1, max = 100, message = "Name is required."))]
    pub name: String,
    #[validate(custom(function = validate_phone))]
    pub phone: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[validate(range(min = 1, max = 150))]
    pub age: Option<i64>,
    #[validate(length(max = 100))]
    pub place: Option<String>,
}

/// DTO for registering or logging into a session.
#[derive(Debug, Deserialize, Validate)]
pub struct JoinSessionRequest {
    /// Email or ten-digit phone number.
    #[validate(length(min = 1, max = 254))]
    pub identifier: String,
    #[validate(length(max = 128))]
    pub password: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub session_code: String,
    /// The session the participant picked; guards against codes for other sessions.
    pub expected_session_id: Option<i64>,
    /// Required only when no participant matches `identifier`.
    pub registration: Option<RegistrationProfile>,
}

/// Result of a successful join: the attendee, the session and a bearer token.
#[derive(Debug, Serialize)]
pub struct JoinResponse {
    pub token: String,
    #[serde(rename = "type")]
    pub token_type: &'static str,
    pub attendee: Attendee,
    pub session: SessionView,
    pub is_new: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_sent: Option<bool>,
}

/// Attendee's own profile with the current session resolved.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub attendee: Attendee,
    pub current_session: Option<SessionView>,
}

pub fn validate_phone(phone: &str) -> Result<(), validator::ValidationError> {
    if PHONE_RE.is_match(phone) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("phone")
            .with_message("Phone number must be exactly 10 digits.".into()))
    }
}

// src/models/review.rs

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'reviews' table. Append-only feedback, optionally anonymous.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub attendee_id: Option<i64>,
    pub content: String,
    pub feedback_type: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    #[default]
    General,
    Review,
    /// Feedback given from the quiz page itself.
    Quiz,
}

impl FeedbackType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackType::General => "general",
            FeedbackType::Review => "review",
            FeedbackType::Quiz => "quiz",
        }
    }
}

impl fmt::Display for FeedbackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// DTO for submitting feedback.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitFeedbackRequest {
    #[validate(length(
        min = 1,
        max = 5000,
        message = "Feedback must be between 1 and 5000 characters"
    ))]
    pub content: String,
    #[serde(default)]
    pub feedback_type: FeedbackType,
}

/// Review with the author's name and email, for the admin listing.
#[derive(Debug, Serialize, FromRow)]
pub struct ReviewResponse {
    pub id: i64,
    pub attendee_id: Option<i64>,
    pub attendee_name: Option<String>,
    pub attendee_email: Option<String>,
    pub content: String,
    pub feedback_type: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewFilter {
    pub feedback_type: Option<FeedbackType>,
}

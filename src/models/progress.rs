// src/models/progress.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::{question::PublicQuestion, response::AnswerValue};

/// Represents the 'quiz_progress' table: cached per-(attendee, session) state.
///
/// `is_fully_completed` is a memoized hint; answered and unanswered sets are
/// always recomputed from the responses table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QuizProgress {
    pub id: i64,
    pub attendee_id: i64,
    pub class_session_id: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub last_answered_at: Option<DateTime<Utc>>,
    pub is_fully_completed: bool,
    pub completion_reason: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl QuizProgress {
    pub fn reason(&self) -> Option<CompletionReason> {
        match self.completion_reason.as_deref() {
            Some("answered") => Some(CompletionReason::Answered),
            Some("timed_out") => Some(CompletionReason::TimedOut),
            _ => None,
        }
    }

    /// Terminal status recorded on this row, if any.
    pub fn terminal_status(&self) -> Option<QuizStatus> {
        if !self.is_fully_completed {
            return None;
        }
        Some(match self.reason() {
            Some(CompletionReason::TimedOut) => QuizStatus::Expired,
            _ => QuizStatus::Completed,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizStatus {
    NotStarted,
    InProgress,
    Completed,
    Expired,
}

impl QuizStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, QuizStatus::Completed | QuizStatus::Expired)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionReason {
    Answered,
    TimedOut,
}

impl CompletionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionReason::Answered => "answered",
            CompletionReason::TimedOut => "timed_out",
        }
    }
}

/// What the attendee sees when opening the quiz.
#[derive(Debug, Serialize)]
pub struct QuizState {
    pub session_id: i64,
    pub status: QuizStatus,
    /// Always empty once the status is terminal.
    pub unanswered_questions: Vec<PublicQuestion>,
    pub answered_count: i64,
    pub total_questions: i64,
    pub remaining_seconds: i64,
    pub started_at: Option<DateTime<Utc>>,
}

/// DTO for submitting answers.
/// Key: Question ID, Value: selected option (1-4) or free text.
#[derive(Debug, Deserialize)]
pub struct SubmitAnswersRequest {
    pub answers: HashMap<i64, AnswerValue>,
}

#[derive(Debug, Serialize)]
pub struct SubmitOutcome {
    pub saved_count: i64,
    /// Submitted questions that already had an answer on record.
    pub skipped_count: i64,
    pub status: QuizStatus,
    pub unanswered_count: i64,
    pub remaining_seconds: i64,
}

/// Admin view of one attendee's progress through one session.
#[derive(Debug, Serialize)]
pub struct ProgressStats {
    pub attendee_id: i64,
    pub session_id: i64,
    pub status: QuizStatus,
    pub total_questions: i64,
    pub answered: i64,
    pub unanswered: i64,
    pub correct: i64,
    pub percentage: f64,
    pub is_fully_completed: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub last_answered_at: Option<DateTime<Utc>>,
}

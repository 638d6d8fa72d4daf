// src/models/response.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{
    error::AppError,
    models::question::{Question, QuestionKind},
};

/// Represents the 'responses' table: one answer by one attendee to one question.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizResponse {
    pub id: i64,
    pub attendee_id: i64,
    pub question_id: i64,
    pub selected_option: Option<i64>,
    pub text_response: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Raw submitted value. Form posts send choices as strings, JSON clients as numbers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Number(i64),
    Text(String),
}

impl AnswerValue {
    pub fn is_blank(&self) -> bool {
        matches!(self, AnswerValue::Text(s) if s.trim().is_empty())
    }
}

/// An answer checked against its question's type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Choice(i64),
    Text(String),
}

impl Answer {
    /// Interprets `value` for `question`.
    ///
    /// Blank values yield `Ok(None)` so unanswered fields are skipped rather than rejected.
    pub fn interpret(question: &Question, value: &AnswerValue) -> Result<Option<Answer>, AppError> {
        let field = format!("question_{}", question.id);
        match question.kind()? {
            QuestionKind::MultipleChoice => {
                let selected = match value {
                    AnswerValue::Number(n) => *n,
                    AnswerValue::Text(s) if s.trim().is_empty() => return Ok(None),
                    AnswerValue::Text(s) => s.trim().parse::<i64>().map_err(|_| {
                        AppError::Validation(format!("{field}: choose one of the options"))
                    })?,
                };
                if !(1..=4).contains(&selected) {
                    return Err(AppError::Validation(format!(
                        "{field}: selected option must be between 1 and 4"
                    )));
                }
                Ok(Some(Answer::Choice(selected)))
            }
            QuestionKind::TextResponse => match value {
                AnswerValue::Text(s) if s.trim().is_empty() => Ok(None),
                AnswerValue::Text(s) => Ok(Some(Answer::Text(s.trim().to_string()))),
                AnswerValue::Number(n) => Ok(Some(Answer::Text(n.to_string()))),
            },
        }
    }
}

/// Response joined with its attendee and question; `is_correct` is computed on read.
#[derive(Debug, Serialize)]
pub struct ResponseDetail {
    pub id: i64,
    pub attendee_id: i64,
    pub attendee_name: String,
    pub question_id: i64,
    pub question_text: String,
    pub question_type: String,
    pub selected_option: Option<i64>,
    pub text_response: Option<String>,
    pub correct_option: Option<i64>,
    /// `None` for text responses, which have no notion of correctness.
    pub is_correct: Option<bool>,
    pub created_at: DateTime<Utc>,
}

/// Flat row used to build a `ResponseDetail`.
#[derive(Debug, FromRow)]
pub(crate) struct ResponseRow {
    pub id: i64,
    pub attendee_id: i64,
    pub attendee_name: String,
    pub question_id: i64,
    pub question_text: String,
    pub question_type: String,
    pub selected_option: Option<i64>,
    pub text_response: Option<String>,
    pub correct_option: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl From<ResponseRow> for ResponseDetail {
    fn from(row: ResponseRow) -> Self {
        let is_correct = match row.question_type.as_str() {
            "multiple_choice" => Some(
                row.selected_option.is_some() && row.selected_option == row.correct_option,
            ),
            _ => None,
        };
        Self {
            id: row.id,
            attendee_id: row.attendee_id,
            attendee_name: row.attendee_name,
            question_id: row.question_id,
            question_text: row.question_text,
            question_type: row.question_type,
            selected_option: row.selected_option,
            text_response: row.text_response,
            correct_option: row.correct_option,
            is_correct,
            created_at: row.created_at,
        }
    }
}

/// Per-attendee totals for one session.
#[derive(Debug, Serialize)]
pub struct AttendeeScore {
    pub attendee_id: i64,
    pub attendee_name: String,
    pub answered: i64,
    pub correct: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn question(kind: QuestionKind) -> Question {
        let mc = kind == QuestionKind::MultipleChoice;
        Question {
            id: 7,
            class_session_id: 1,
            text: "Pick one".to_string(),
            question_type: kind.as_str().to_string(),
            option1: mc.then(|| "a".to_string()),
            option2: mc.then(|| "b".to_string()),
            option3: mc.then(|| "c".to_string()),
            option4: mc.then(|| "d".to_string()),
            correct_option: mc.then_some(3),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_choice_accepts_numbers_and_numeric_strings() {
        let q = question(QuestionKind::MultipleChoice);
        assert_eq!(
            Answer::interpret(&q, &AnswerValue::Number(2)).unwrap(),
            Some(Answer::Choice(2))
        );
        assert_eq!(
            Answer::interpret(&q, &AnswerValue::Text(" 4 ".into())).unwrap(),
            Some(Answer::Choice(4))
        );
    }

    #[test]
    fn test_choice_rejects_out_of_range() {
        let q = question(QuestionKind::MultipleChoice);
        assert!(Answer::interpret(&q, &AnswerValue::Number(5)).is_err());
        assert!(Answer::interpret(&q, &AnswerValue::Number(0)).is_err());
        assert!(Answer::interpret(&q, &AnswerValue::Text("b".into())).is_err());
    }

    #[test]
    fn test_blank_values_are_skipped() {
        let mc = question(QuestionKind::MultipleChoice);
        let text = question(QuestionKind::TextResponse);
        assert_eq!(Answer::interpret(&mc, &AnswerValue::Text("".into())).unwrap(), None);
        assert_eq!(Answer::interpret(&text, &AnswerValue::Text("   ".into())).unwrap(), None);
    }

    #[test]
    fn test_text_answers_are_trimmed() {
        let q = question(QuestionKind::TextResponse);
        assert_eq!(
            Answer::interpret(&q, &AnswerValue::Text("  fine \n".into())).unwrap(),
            Some(Answer::Text("fine".to_string()))
        );
    }

    #[test]
    fn test_correctness_follows_current_key() {
        let row = ResponseRow {
            id: 1,
            attendee_id: 1,
            attendee_name: "Lin".into(),
            question_id: 7,
            question_text: "Pick one".into(),
            question_type: "multiple_choice".into(),
            selected_option: Some(3),
            text_response: None,
            correct_option: Some(3),
            created_at: Utc::now(),
        };
        assert_eq!(ResponseDetail::from(row).is_correct, Some(true));
    }
}

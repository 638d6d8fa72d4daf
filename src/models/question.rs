// src/models/question.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::Validate;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice,
    TextResponse,
}

impl QuestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice => "multiple_choice",
            QuestionKind::TextResponse => "text_response",
        }
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "multiple_choice" => Ok(QuestionKind::MultipleChoice),
            "text_response" => Ok(QuestionKind::TextResponse),
            other => Err(AppError::InternalServerError(format!(
                "unknown question type '{other}'"
            ))),
        }
    }
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub class_session_id: i64,

    /// The text content of the question.
    pub text: String,

    /// 'multiple_choice' or 'text_response'.
    pub question_type: String,

    // Only populated for multiple choice questions.
    pub option1: Option<String>,
    pub option2: Option<String>,
    pub option3: Option<String>,
    pub option4: Option<String>,

    /// 1-based index of the correct option, multiple choice only.
    pub correct_option: Option<i64>,

    pub created_at: DateTime<Utc>,
}

impl Question {
    pub fn kind(&self) -> Result<QuestionKind, AppError> {
        self.question_type.parse()
    }

    pub fn options(&self) -> Vec<String> {
        [&self.option1, &self.option2, &self.option3, &self.option4]
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    }

    /// Correctness is derived against the current answer key, never stored.
    pub fn is_correct(&self, selected_option: i64) -> bool {
        self.correct_option == Some(selected_option)
    }
}

/// DTO for sending question to client (excludes the answer key).
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub question_type: String,
    pub text: String,
    pub options: Vec<String>,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id,
            question_type: q.question_type.clone(),
            text: q.text.clone(),
            options: q.options(),
        }
    }
}

/// DTO for creating a new question.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 1000))]
    pub text: String,
    pub question_type: QuestionKind,
    #[validate(custom(function = validate_options))]
    pub options: Option<Vec<String>>,
    #[validate(range(min = 1, max = 4))]
    pub correct_option: Option<i64>,
}

impl CreateQuestionRequest {
    /// Checks that the fields present match the question type.
    pub fn check_shape(&self) -> Result<(), AppError> {
        check_shape(
            self.question_type,
            self.options.as_deref(),
            self.correct_option,
        )
    }
}

/// DTO for updating a question. Fields are optional; the type is fixed.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    #[validate(length(min = 1, max = 1000))]
    pub text: Option<String>,
    #[validate(custom(function = validate_options))]
    pub options: Option<Vec<String>>,
    #[validate(range(min = 1, max = 4))]
    pub correct_option: Option<i64>,
}

pub(crate) fn check_shape(
    kind: QuestionKind,
    options: Option<&[String]>,
    correct_option: Option<i64>,
) -> Result<(), AppError> {
    match kind {
        QuestionKind::MultipleChoice => {
            if options.map(|o| o.len()) != Some(4) {
                return Err(AppError::Validation(
                    "options: multiple choice questions need exactly 4 options".to_string(),
                ));
            }
            if correct_option.is_none() {
                return Err(AppError::Validation(
                    "correct_option: required for multiple choice questions".to_string(),
                ));
            }
        }
        QuestionKind::TextResponse => {
            if options.is_some_and(|o| !o.is_empty()) || correct_option.is_some() {
                return Err(AppError::Validation(
                    "options: text questions take no options or correct option".to_string(),
                ));
            }
        }
    }
    Ok(())
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    for opt in options {
        if opt.trim().is_empty() {
            return Err(validator::ValidationError::new("option_cannot_be_empty"));
        }
        if opt.len() > 255 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn four() -> Vec<String> {
        vec!["A".into(), "B".into(), "C".into(), "D".into()]
    }

    #[test]
    fn test_multiple_choice_shape() {
        assert!(check_shape(QuestionKind::MultipleChoice, Some(&four()), Some(2)).is_ok());
        assert!(check_shape(QuestionKind::MultipleChoice, Some(&four()[..3]), Some(2)).is_err());
        assert!(check_shape(QuestionKind::MultipleChoice, Some(&four()), None).is_err());
        assert!(check_shape(QuestionKind::MultipleChoice, None, Some(1)).is_err());
    }

    #[test]
    fn test_text_response_shape() {
        assert!(check_shape(QuestionKind::TextResponse, None, None).is_ok());
        assert!(check_shape(QuestionKind::TextResponse, Some(&[]), None).is_ok());
        assert!(check_shape(QuestionKind::TextResponse, Some(&four()), None).is_err());
        assert!(check_shape(QuestionKind::TextResponse, None, Some(1)).is_err());
    }

    #[test]
    fn test_kind_round_trips_through_column_value() {
        assert_eq!(
            "multiple_choice".parse::<QuestionKind>().unwrap(),
            QuestionKind::MultipleChoice
        );
        assert!("essay".parse::<QuestionKind>().is_err());
    }
}

// src/services/questions.rs

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::question::{
        CreateQuestionRequest, Question, QuestionKind, UpdateQuestionRequest, check_shape,
    },
    services::registry,
};

const QUESTION_COLUMNS: &str = "id, class_session_id, text, question_type, option1, option2, \
     option3, option4, correct_option, created_at";

pub async fn list_questions(pool: &SqlitePool, session_id: i64) -> Result<Vec<Question>, AppError> {
    registry::get_session(pool, session_id).await?;
    let questions = sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE class_session_id = ? ORDER BY id"
    ))
    .bind(session_id)
    .fetch_all(pool)
    .await?;
    Ok(questions)
}

pub async fn get_question(pool: &SqlitePool, id: i64) -> Result<Question, AppError> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Question not found".to_string()))
}

fn option_at(options: Option<&[String]>, index: usize) -> Option<&str> {
    options.and_then(|o| o.get(index)).map(|s| s.trim())
}

/// Adds a question to a session. Allowed at any time, including mid-quiz.
pub async fn add_question(
    pool: &SqlitePool,
    session_id: i64,
    req: &CreateQuestionRequest,
    now: DateTime<Utc>,
) -> Result<Question, AppError> {
    req.validate()?;
    req.check_shape()?;
    registry::get_session(pool, session_id).await?;

    let options = req.options.as_deref();
    let result = sqlx::query(
        r#"
        INSERT INTO questions
            (class_session_id, text, question_type, option1, option2, option3, option4, correct_option, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(session_id)
    .bind(req.text.trim())
    .bind(req.question_type.as_str())
    .bind(option_at(options, 0))
    .bind(option_at(options, 1))
    .bind(option_at(options, 2))
    .bind(option_at(options, 3))
    .bind(req.correct_option)
    .bind(now)
    .execute(pool)
    .await?;

    let question = get_question(pool, result.last_insert_rowid()).await?;
    tracing::info!("Added question {} to session {}", question.id, session_id);
    Ok(question)
}

/// Edits a question in place. Its type is fixed; a changed answer key
/// re-scores existing responses on the next read.
pub async fn update_question(
    pool: &SqlitePool,
    id: i64,
    req: &UpdateQuestionRequest,
) -> Result<Question, AppError> {
    req.validate()?;
    let current = get_question(pool, id).await?;
    let kind = current.kind()?;

    let current_options = current.options();
    let options: Option<&[String]> = match (&req.options, kind) {
        (Some(new), _) => Some(new.as_slice()),
        (None, QuestionKind::MultipleChoice) => Some(current_options.as_slice()),
        (None, QuestionKind::TextResponse) => None,
    };
    let correct_option = req.correct_option.or(current.correct_option);
    check_shape(kind, options, correct_option)?;

    let text = req.text.as_deref().map(str::trim).unwrap_or(&current.text);

    sqlx::query(
        r#"
        UPDATE questions
        SET text = ?, option1 = ?, option2 = ?, option3 = ?, option4 = ?, correct_option = ?
        WHERE id = ?
        "#,
    )
    .bind(text)
    .bind(option_at(options, 0))
    .bind(option_at(options, 1))
    .bind(option_at(options, 2))
    .bind(option_at(options, 3))
    .bind(correct_option)
    .bind(id)
    .execute(pool)
    .await?;

    get_question(pool, id).await
}

/// Deletes a question and, through the cascade, every response to it.
pub async fn delete_question(pool: &SqlitePool, id: i64) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM questions WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }
    tracing::info!("Deleted question {}", id);
    Ok(())
}

// src/services/ledger.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    error::AppError,
    models::response::{Answer, AttendeeScore, QuizResponse, ResponseDetail, ResponseRow},
};

/// Result of offering an answer to the ledger.
#[derive(Debug)]
pub enum RecordOutcome {
    Recorded(QuizResponse),
    /// An answer to this question is already on record; it was left untouched.
    Duplicate,
}

/// Records an answer unless one already exists for (attendee, question).
///
/// Responses are append-only: the first answer wins and later ones are
/// reported as duplicates, including under concurrent submission.
pub async fn record(
    conn: &mut SqliteConnection,
    attendee_id: i64,
    question_id: i64,
    answer: &Answer,
    now: DateTime<Utc>,
) -> Result<RecordOutcome, AppError> {
    let (selected_option, text_response) = match answer {
        Answer::Choice(option) => (Some(*option), None),
        Answer::Text(text) => (None, Some(text.as_str())),
    };

    let result = sqlx::query(
        r#"
        INSERT INTO responses (attendee_id, question_id, selected_option, text_response, created_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(attendee_id, question_id) DO NOTHING
        "#,
    )
    .bind(attendee_id)
    .bind(question_id)
    .bind(selected_option)
    .bind(text_response)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        tracing::debug!(
            "Attendee {} already answered question {}, keeping the first answer",
            attendee_id,
            question_id
        );
        return Ok(RecordOutcome::Duplicate);
    }

    Ok(RecordOutcome::Recorded(QuizResponse {
        id: result.last_insert_rowid(),
        attendee_id,
        question_id,
        selected_option,
        text_response: text_response.map(str::to_owned),
        created_at: now,
    }))
}

const DETAIL_SELECT: &str = r#"
    SELECT
        r.id, r.attendee_id, a.name AS attendee_name,
        r.question_id, q.text AS question_text, q.question_type,
        r.selected_option, r.text_response, q.correct_option, r.created_at
    FROM responses r
    JOIN attendees a ON a.id = r.attendee_id
    JOIN questions q ON q.id = r.question_id
"#;

/// Every response to the session's current questions, with correctness.
pub async fn session_responses(
    pool: &SqlitePool,
    session_id: i64,
) -> Result<Vec<ResponseDetail>, AppError> {
    let rows = sqlx::query_as::<_, ResponseRow>(&format!(
        "{DETAIL_SELECT} WHERE q.class_session_id = ? ORDER BY r.attendee_id, q.id"
    ))
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(ResponseDetail::from).collect())
}

/// One attendee's responses, optionally limited to a single session.
pub async fn attendee_responses(
    pool: &SqlitePool,
    attendee_id: i64,
    session_id: Option<i64>,
) -> Result<Vec<ResponseDetail>, AppError> {
    let rows = sqlx::query_as::<_, ResponseRow>(&format!(
        "{DETAIL_SELECT} WHERE r.attendee_id = ? AND (? IS NULL OR q.class_session_id = ?) ORDER BY r.created_at, q.id"
    ))
    .bind(attendee_id)
    .bind(session_id)
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(ResponseDetail::from).collect())
}

/// Answered and correct counts per attendee, scored against the current key.
pub async fn session_scores(
    pool: &SqlitePool,
    session_id: i64,
) -> Result<Vec<AttendeeScore>, AppError> {
    let details = session_responses(pool, session_id).await?;

    let mut scores: BTreeMap<i64, AttendeeScore> = BTreeMap::new();
    for detail in details {
        let score = scores
            .entry(detail.attendee_id)
            .or_insert_with(|| AttendeeScore {
                attendee_id: detail.attendee_id,
                attendee_name: detail.attendee_name.clone(),
                answered: 0,
                correct: 0,
            });
        score.answered += 1;
        if detail.is_correct == Some(true) {
            score.correct += 1;
        }
    }

    let mut scores: Vec<AttendeeScore> = scores.into_values().collect();
    scores.sort_by(|a, b| b.correct.cmp(&a.correct).then(a.attendee_id.cmp(&b.attendee_id)));
    Ok(scores)
}

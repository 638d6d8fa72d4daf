// src/services/progress.rs

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    config::DEFAULT_MINUTES_PER_QUESTION,
    error::AppError,
    models::{
        progress::{
            CompletionReason, ProgressStats, QuizProgress, QuizState, QuizStatus, SubmitOutcome,
        },
        question::{PublicQuestion, Question},
        response::{Answer, AnswerValue},
        session::{ClassSession, SessionStatus},
    },
    services::{
        ledger::{self, RecordOutcome},
        registry,
    },
    utils::jwt::AttendeePrincipal,
};

/// Time allowance for a quiz, scaled by its current question count.
#[derive(Debug, Clone, Copy)]
pub struct QuizPolicy {
    pub minutes_per_question: i64,
}

impl Default for QuizPolicy {
    fn default() -> Self {
        Self {
            minutes_per_question: DEFAULT_MINUTES_PER_QUESTION,
        }
    }
}

impl QuizPolicy {
    pub fn budget_seconds(&self, total_questions: i64) -> i64 {
        total_questions.max(0) * self.minutes_per_question * 60
    }

    /// Seconds left on a clock started at `started_at`, never negative.
    ///
    /// The budget follows the live question count, so adding a question
    /// mid-quiz extends the time and removing one shortens it.
    pub fn remaining_seconds(
        &self,
        total_questions: i64,
        started_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> i64 {
        let elapsed = (now - started_at).num_seconds().max(0);
        (self.budget_seconds(total_questions) - elapsed).max(0)
    }
}

/// The session's current questions and the attendee's answers to them.
///
/// Rebuilt from the ledger on every call; responses to deleted questions
/// disappear with them and never count.
struct Snapshot {
    questions: Vec<Question>,
    /// question_id -> selected option (None for text answers)
    answers: HashMap<i64, Option<i64>>,
}

impl Snapshot {
    fn total(&self) -> i64 {
        self.questions.len() as i64
    }

    fn is_answered(&self, question_id: i64) -> bool {
        self.answers.contains_key(&question_id)
    }

    fn answered_count(&self) -> i64 {
        self.answers.len() as i64
    }

    fn unanswered(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter().filter(|q| !self.is_answered(q.id))
    }

    fn correct_count(&self) -> i64 {
        self.questions
            .iter()
            .filter(|q| {
                self.answers
                    .get(&q.id)
                    .copied()
                    .flatten()
                    .is_some_and(|selected| q.is_correct(selected))
            })
            .count() as i64
    }
}

async fn load_snapshot(
    conn: &mut SqliteConnection,
    attendee_id: i64,
    session_id: i64,
) -> Result<Snapshot, AppError> {
    let questions = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, class_session_id, text, question_type, option1, option2, option3, option4,
               correct_option, created_at
        FROM questions
        WHERE class_session_id = ?
        ORDER BY id
        "#,
    )
    .bind(session_id)
    .fetch_all(&mut *conn)
    .await?;

    let answers: Vec<(i64, Option<i64>)> = sqlx::query_as(
        r#"
        SELECT r.question_id, r.selected_option
        FROM responses r
        JOIN questions q ON q.id = r.question_id
        WHERE r.attendee_id = ? AND q.class_session_id = ?
        "#,
    )
    .bind(attendee_id)
    .bind(session_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Snapshot {
        questions,
        answers: answers.into_iter().collect(),
    })
}

const PROGRESS_COLUMNS: &str = "id, attendee_id, class_session_id, started_at, last_answered_at, \
     is_fully_completed, completion_reason, completed_at";

async fn find_progress(
    conn: &mut SqliteConnection,
    attendee_id: i64,
    session_id: i64,
) -> Result<Option<QuizProgress>, AppError> {
    let progress = sqlx::query_as::<_, QuizProgress>(&format!(
        "SELECT {PROGRESS_COLUMNS} FROM quiz_progress WHERE attendee_id = ? AND class_session_id = ?"
    ))
    .bind(attendee_id)
    .bind(session_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(progress)
}

/// Fetches the progress record, creating an unstarted one on first access.
///
/// Only attendees who joined the session get a record. This is the first
/// statement of every engine transaction, so the write lock is taken before
/// anything is read and concurrent submissions queue behind each other.
async fn enrolled_progress(
    conn: &mut SqliteConnection,
    attendee_id: i64,
    session_id: i64,
) -> Result<QuizProgress, AppError> {
    sqlx::query(
        r#"
        INSERT INTO quiz_progress (attendee_id, class_session_id, is_fully_completed)
        SELECT ?, ?, 0
        WHERE EXISTS (
            SELECT 1 FROM session_attendance WHERE attendee_id = ? AND class_session_id = ?
        )
        ON CONFLICT(attendee_id, class_session_id) DO NOTHING
        "#,
    )
    .bind(attendee_id)
    .bind(session_id)
    .bind(attendee_id)
    .bind(session_id)
    .execute(&mut *conn)
    .await?;

    find_progress(conn, attendee_id, session_id)
        .await?
        .ok_or_else(|| AppError::Forbidden("You have not joined this session.".to_string()))
}

/// Starts the clock once; a clock that is already running is never reset.
async fn start_clock(
    conn: &mut SqliteConnection,
    progress: &QuizProgress,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, AppError> {
    let started = sqlx::query(
        "UPDATE quiz_progress SET started_at = ? WHERE id = ? AND started_at IS NULL",
    )
    .bind(now)
    .bind(progress.id)
    .execute(&mut *conn)
    .await?;

    if started.rows_affected() == 1 {
        sqlx::query(
            "UPDATE attendees SET quiz_started_at = ?, updated_at = ? \
             WHERE id = ? AND class_session_id = ?",
        )
        .bind(now)
        .bind(now)
        .bind(progress.attendee_id)
        .bind(progress.class_session_id)
        .execute(&mut *conn)
        .await?;
    }

    let started_at: Option<DateTime<Utc>> =
        sqlx::query_scalar("SELECT started_at FROM quiz_progress WHERE id = ?")
            .bind(progress.id)
            .fetch_one(&mut *conn)
            .await?;

    tracing::info!(
        "Attendee {} started the quiz for session {}",
        progress.attendee_id,
        progress.class_session_id
    );
    Ok(started_at.unwrap_or(now))
}

/// Moves the record into its terminal state. Completion is never undone.
async fn mark_completed(
    conn: &mut SqliteConnection,
    progress: &QuizProgress,
    reason: CompletionReason,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE quiz_progress
        SET is_fully_completed = 1, completion_reason = ?, completed_at = ?
        WHERE id = ? AND is_fully_completed = 0
        "#,
    )
    .bind(reason.as_str())
    .bind(now)
    .bind(progress.id)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        "UPDATE session_attendance SET has_submitted = 1 WHERE attendee_id = ? AND class_session_id = ?",
    )
    .bind(progress.attendee_id)
    .bind(progress.class_session_id)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        "UPDATE attendees SET has_submitted = 1, updated_at = ? WHERE id = ? AND class_session_id = ?",
    )
    .bind(now)
    .bind(progress.attendee_id)
    .bind(progress.class_session_id)
    .execute(&mut *conn)
    .await?;

    tracing::info!(
        "Quiz for attendee {} in session {} completed ({})",
        progress.attendee_id,
        progress.class_session_id,
        reason.as_str()
    );
    Ok(())
}

struct Evaluation {
    status: QuizStatus,
    remaining_seconds: i64,
    started_at: Option<DateTime<Utc>>,
}

impl Evaluation {
    fn idle(status: QuizStatus, started_at: Option<DateTime<Utc>>) -> Self {
        Self {
            status,
            remaining_seconds: 0,
            started_at,
        }
    }
}

/// Applies every transition due at `now` to a non-terminal record.
async fn advance(
    conn: &mut SqliteConnection,
    policy: &QuizPolicy,
    session: &ClassSession,
    progress: &QuizProgress,
    snapshot: &Snapshot,
    now: DateTime<Utc>,
) -> Result<Evaluation, AppError> {
    match session.status(now) {
        SessionStatus::Active => {}
        SessionStatus::Upcoming => {
            return Err(AppError::SessionClosed(
                "This quiz has not started yet.".to_string(),
            ));
        }
        SessionStatus::Expired => {
            if progress.started_at.is_none() {
                return Err(AppError::SessionClosed(
                    "This session has already ended.".to_string(),
                ));
            }
            mark_completed(conn, progress, CompletionReason::TimedOut, now).await?;
            return Ok(Evaluation::idle(QuizStatus::Expired, progress.started_at));
        }
    }

    // Nothing to time yet.
    if snapshot.questions.is_empty() && progress.started_at.is_none() {
        return Ok(Evaluation::idle(QuizStatus::NotStarted, None));
    }

    let started_at = match progress.started_at {
        Some(t) => t,
        None => start_clock(conn, progress, now).await?,
    };

    if snapshot.unanswered().next().is_none() {
        mark_completed(conn, progress, CompletionReason::Answered, now).await?;
        return Ok(Evaluation::idle(QuizStatus::Completed, Some(started_at)));
    }

    let remaining_seconds = policy.remaining_seconds(snapshot.total(), started_at, now);
    if remaining_seconds == 0 {
        mark_completed(conn, progress, CompletionReason::TimedOut, now).await?;
        return Ok(Evaluation::idle(QuizStatus::Expired, Some(started_at)));
    }

    Ok(Evaluation {
        status: QuizStatus::InProgress,
        remaining_seconds,
        started_at: Some(started_at),
    })
}

/// Returns what the attendee should see now, starting the clock on first view.
pub async fn get_quiz_state(
    pool: &SqlitePool,
    policy: &QuizPolicy,
    principal: AttendeePrincipal,
    now: DateTime<Utc>,
) -> Result<QuizState, AppError> {
    let AttendeePrincipal {
        attendee_id,
        session_id,
    } = principal;
    let session = registry::get_session(pool, session_id).await?;

    let mut tx = pool.begin().await?;
    let progress = enrolled_progress(&mut tx, attendee_id, session_id).await?;
    let snapshot = load_snapshot(&mut tx, attendee_id, session_id).await?;

    let evaluation = match progress.terminal_status() {
        Some(status) => Evaluation::idle(status, progress.started_at),
        None => advance(&mut tx, policy, &session, &progress, &snapshot, now).await?,
    };
    tx.commit().await?;

    let unanswered_questions = if evaluation.status.is_terminal() {
        Vec::new()
    } else {
        snapshot.unanswered().map(PublicQuestion::from).collect()
    };

    Ok(QuizState {
        session_id,
        status: evaluation.status,
        unanswered_questions,
        answered_count: snapshot.answered_count(),
        total_questions: snapshot.total(),
        remaining_seconds: evaluation.remaining_seconds,
        started_at: evaluation.started_at,
    })
}

/// Outcome for a submission that arrives after the quiz has closed.
///
/// Resending answers that are all already on record is treated as a retry
/// and succeeds without saving anything; anything new is rejected.
fn closed_submission(
    status: QuizStatus,
    snapshot: &Snapshot,
    offered: &[i64],
) -> Result<SubmitOutcome, AppError> {
    let is_retry = !offered.is_empty() && offered.iter().all(|id| snapshot.is_answered(*id));
    if !is_retry {
        let message = match status {
            QuizStatus::Expired => "Time is up for this quiz. Your saved answers have been kept.",
            _ => "You have already completed this quiz.",
        };
        return Err(AppError::AlreadyCompleted(message.to_string()));
    }

    Ok(SubmitOutcome {
        saved_count: 0,
        skipped_count: offered.len() as i64,
        status,
        unanswered_count: snapshot.unanswered().count() as i64,
        remaining_seconds: 0,
    })
}

/// Records a batch of answers for the attendee's current session.
///
/// Only keys naming the session's current questions are considered. Each
/// answer is saved at most once; answers already on record are skipped.
pub async fn submit_answers(
    pool: &SqlitePool,
    policy: &QuizPolicy,
    principal: AttendeePrincipal,
    answers: &HashMap<i64, AnswerValue>,
    now: DateTime<Utc>,
) -> Result<SubmitOutcome, AppError> {
    let AttendeePrincipal {
        attendee_id,
        session_id,
    } = principal;
    let session = registry::get_session(pool, session_id).await?;

    let mut tx = pool.begin().await?;
    let progress = enrolled_progress(&mut tx, attendee_id, session_id).await?;
    let snapshot = load_snapshot(&mut tx, attendee_id, session_id).await?;

    // Session questions the attendee put a value against, before any checks.
    let offered: Vec<i64> = snapshot
        .questions
        .iter()
        .filter(|q| answers.get(&q.id).is_some_and(|v| !v.is_blank()))
        .map(|q| q.id)
        .collect();

    let known: HashSet<i64> = snapshot.questions.iter().map(|q| q.id).collect();
    let foreign = answers.keys().filter(|id| !known.contains(id)).count();
    if foreign > 0 {
        tracing::debug!(
            "Ignoring {} answers for questions outside session {}",
            foreign,
            session_id
        );
    }

    if let Some(status) = progress.terminal_status() {
        return closed_submission(status, &snapshot, &offered);
    }

    if snapshot.questions.is_empty() {
        return Err(AppError::BadRequest(
            "This session has no questions yet.".to_string(),
        ));
    }

    let evaluation = advance(&mut tx, policy, &session, &progress, &snapshot, now).await?;
    if evaluation.status.is_terminal() {
        // Persist the transition even though the submission itself is refused.
        tx.commit().await?;
        return closed_submission(evaluation.status, &snapshot, &offered);
    }

    let mut submitted: Vec<(&Question, Answer)> = Vec::new();
    for question in &snapshot.questions {
        if let Some(value) = answers.get(&question.id) {
            if let Some(answer) = Answer::interpret(question, value)? {
                submitted.push((question, answer));
            }
        }
    }
    if submitted.is_empty() {
        return Err(AppError::Validation(
            "answers: Please answer at least one question before submitting.".to_string(),
        ));
    }

    let mut answered: HashSet<i64> = snapshot.answers.keys().copied().collect();
    let mut saved_count = 0;
    let mut skipped_count = 0;
    for (question, answer) in &submitted {
        match ledger::record(&mut tx, attendee_id, question.id, answer, now).await? {
            RecordOutcome::Recorded(_) => {
                saved_count += 1;
                answered.insert(question.id);
            }
            RecordOutcome::Duplicate => skipped_count += 1,
        }
    }

    if saved_count > 0 {
        sqlx::query("UPDATE quiz_progress SET last_answered_at = ? WHERE id = ?")
            .bind(now)
            .bind(progress.id)
            .execute(&mut *tx)
            .await?;
    }

    let unanswered_count = snapshot
        .questions
        .iter()
        .filter(|q| !answered.contains(&q.id))
        .count() as i64;

    let (status, remaining_seconds) = if unanswered_count == 0 {
        mark_completed(&mut tx, &progress, CompletionReason::Answered, now).await?;
        (QuizStatus::Completed, 0)
    } else {
        (QuizStatus::InProgress, evaluation.remaining_seconds)
    };

    tx.commit().await?;

    tracing::info!(
        "Attendee {} submitted to session {}: {} saved, {} skipped",
        attendee_id,
        session_id,
        saved_count,
        skipped_count
    );

    Ok(SubmitOutcome {
        saved_count,
        skipped_count,
        status,
        unanswered_count,
        remaining_seconds,
    })
}

fn stats_from(
    attendee_id: i64,
    session_id: i64,
    progress: Option<&QuizProgress>,
    snapshot: &Snapshot,
) -> ProgressStats {
    let status = match progress {
        Some(p) => p.terminal_status().unwrap_or(if p.started_at.is_some() {
            QuizStatus::InProgress
        } else {
            QuizStatus::NotStarted
        }),
        None => QuizStatus::NotStarted,
    };

    let total = snapshot.total();
    let answered = snapshot.answered_count();
    let percentage = if total > 0 {
        answered as f64 * 100.0 / total as f64
    } else {
        0.0
    };

    ProgressStats {
        attendee_id,
        session_id,
        status,
        total_questions: total,
        answered,
        unanswered: total - answered,
        correct: snapshot.correct_count(),
        percentage,
        is_fully_completed: progress.is_some_and(|p| p.is_fully_completed),
        started_at: progress.and_then(|p| p.started_at),
        last_answered_at: progress.and_then(|p| p.last_answered_at),
    }
}

/// Admin read of one attendee's progress. Makes no transitions.
pub async fn progress_stats(
    pool: &SqlitePool,
    attendee_id: i64,
    session_id: i64,
) -> Result<ProgressStats, AppError> {
    registry::get_session(pool, session_id).await?;

    let mut conn = pool.acquire().await?;
    let progress = find_progress(&mut conn, attendee_id, session_id).await?;
    let snapshot = load_snapshot(&mut conn, attendee_id, session_id).await?;

    Ok(stats_from(attendee_id, session_id, progress.as_ref(), &snapshot))
}

/// Re-derives the completion flag after question edits.
///
/// A started quiz with no unanswered questions left is completed; a
/// completed record is never reopened.
pub async fn refresh_completion(
    pool: &SqlitePool,
    attendee_id: i64,
    session_id: i64,
    now: DateTime<Utc>,
) -> Result<ProgressStats, AppError> {
    registry::get_session(pool, session_id).await?;

    let mut tx = pool.begin().await?;
    let Some(progress) = find_progress(&mut tx, attendee_id, session_id).await? else {
        return Err(AppError::NotFound("No quiz progress for this attendee".to_string()));
    };
    let snapshot = load_snapshot(&mut tx, attendee_id, session_id).await?;

    let progress = if !progress.is_fully_completed
        && progress.started_at.is_some()
        && snapshot.unanswered().next().is_none()
    {
        mark_completed(&mut tx, &progress, CompletionReason::Answered, now).await?;
        find_progress(&mut tx, attendee_id, session_id)
            .await?
            .unwrap_or(progress)
    } else {
        progress
    };
    tx.commit().await?;

    Ok(stats_from(attendee_id, session_id, Some(&progress), &snapshot))
}

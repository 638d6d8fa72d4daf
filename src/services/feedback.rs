// src/services/feedback.rs

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        admin::DashboardStats,
        review::{Review, ReviewFilter, ReviewResponse, SubmitFeedbackRequest},
        session::SessionStatus,
    },
    services::registry,
    utils::html::clean_html,
};

/// Stores a piece of feedback, attributed when the author is known.
pub async fn submit_feedback(
    pool: &SqlitePool,
    attendee_id: Option<i64>,
    req: &SubmitFeedbackRequest,
    now: DateTime<Utc>,
) -> Result<Review, AppError> {
    req.validate()?;

    let content = clean_html(req.content.trim());
    if content.trim().is_empty() {
        return Err(AppError::Validation(
            "content: Feedback cannot be empty".to_string(),
        ));
    }

    // A token can outlive its attendee; such feedback is stored anonymously.
    let attendee_id = match attendee_id {
        Some(id) => {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM attendees WHERE id = ?)")
                    .bind(id)
                    .fetch_one(pool)
                    .await?;
            exists.then_some(id)
        }
        None => None,
    };

    let result = sqlx::query(
        "INSERT INTO reviews (attendee_id, content, feedback_type, submitted_at) VALUES (?, ?, ?, ?)",
    )
    .bind(attendee_id)
    .bind(&content)
    .bind(req.feedback_type.as_str())
    .bind(now)
    .execute(pool)
    .await?;

    let review = Review {
        id: result.last_insert_rowid(),
        attendee_id,
        content,
        feedback_type: req.feedback_type.as_str().to_string(),
        submitted_at: now,
    };
    tracing::info!("Feedback {} received ({})", review.id, review.feedback_type);
    Ok(review)
}

pub async fn list_reviews(
    pool: &SqlitePool,
    filter: &ReviewFilter,
) -> Result<Vec<ReviewResponse>, AppError> {
    let feedback_type = filter.feedback_type.map(|t| t.as_str());
    let reviews = sqlx::query_as::<_, ReviewResponse>(
        r#"
        SELECT r.id, r.attendee_id, a.name AS attendee_name, a.email AS attendee_email,
               r.content, r.feedback_type, r.submitted_at
        FROM reviews r
        LEFT JOIN attendees a ON a.id = r.attendee_id
        WHERE (? IS NULL OR r.feedback_type = ?)
        ORDER BY r.submitted_at DESC, r.id DESC
        "#,
    )
    .bind(feedback_type)
    .bind(feedback_type)
    .fetch_all(pool)
    .await?;
    Ok(reviews)
}

async fn count(pool: &SqlitePool, table: &str) -> Result<i64, AppError> {
    let n: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await?;
    Ok(n)
}

/// Headline numbers for the admin dashboard.
pub async fn dashboard_stats(
    pool: &SqlitePool,
    now: DateTime<Utc>,
) -> Result<DashboardStats, AppError> {
    let sessions = registry::list_sessions(pool).await?;
    let with_status = |status: SessionStatus| {
        sessions.iter().filter(|s| s.status(now) == status).count() as i64
    };

    Ok(DashboardStats {
        sessions_total: sessions.len() as i64,
        sessions_active: with_status(SessionStatus::Active),
        sessions_upcoming: with_status(SessionStatus::Upcoming),
        sessions_past: with_status(SessionStatus::Expired),
        attendees: count(pool, "attendees").await?,
        questions: count(pool, "questions").await?,
        responses: count(pool, "responses").await?,
        reviews: count(pool, "reviews").await?,
    })
}

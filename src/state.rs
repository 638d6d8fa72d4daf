use std::sync::Arc;

use crate::{config::Config, notify::NotificationGateway, services::progress::QuizPolicy};
use axum::extract::FromRef;
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub notifier: Arc<dyn NotificationGateway>,
}

impl AppState {
    pub fn policy(&self) -> QuizPolicy {
        QuizPolicy {
            minutes_per_question: self.config.minutes_per_question,
        }
    }
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<dyn NotificationGateway> {
    fn from_ref(state: &AppState) -> Self {
        state.notifier.clone()
    }
}

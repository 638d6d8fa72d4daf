// tests/common/mod.rs
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use quiz_portal::{
    config::{Config, DEFAULT_MINUTES_PER_QUESTION, MailConfig},
    db,
    models::{
        attendee::{JoinResponse, JoinSessionRequest, RegistrationProfile},
        question::{CreateQuestionRequest, Question, QuestionKind},
        session::{ClassSession, CreateSessionRequest},
    },
    notify::NotificationGateway,
    routes,
    services::{identity, questions, registry},
    state::AppState,
    utils::jwt::AttendeePrincipal,
};
use sqlx::SqlitePool;

pub const JWT_SECRET: &str = "test_secret_for_integration_tests";

/// Gateway that remembers every code it was asked to send.
#[derive(Default)]
pub struct RecordingGateway {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail: AtomicBool,
}

impl RecordingGateway {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: AtomicBool::new(true),
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationGateway for RecordingGateway {
    async fn send_code(&self, recipient_email: &str, session: &ClassSession) -> bool {
        self.sent
            .lock()
            .unwrap()
            .push((recipient_email.to_string(), session.session_code.clone()));
        !self.fail.load(Ordering::SeqCst)
    }
}

/// A migrated throw-away database plus the state built on it.
pub struct TestContext {
    pub pool: SqlitePool,
    pub state: AppState,
    pub gateway: Arc<RecordingGateway>,
    path: PathBuf,
}

impl Drop for TestContext {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }
}

pub fn test_config(database_url: &str) -> Config {
    Config {
        database_url: database_url.to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        admin_username: None,
        admin_password: None,
        admin_email: None,
        minutes_per_question: DEFAULT_MINUTES_PER_QUESTION,
        mail: MailConfig::default(),
    }
}

pub async fn setup() -> TestContext {
    setup_with(RecordingGateway::default()).await
}

pub async fn setup_with(gateway: RecordingGateway) -> TestContext {
    let path = std::env::temp_dir().join(format!("quiz_portal_{}.db", uuid::Uuid::new_v4()));
    let database_url = format!("sqlite://{}?mode=rwc", path.display());

    let pool = db::connect(&database_url)
        .await
        .expect("Failed to open test database");
    db::migrate(&pool).await.expect("Failed to migrate database");

    let gateway = Arc::new(gateway);
    let state = AppState {
        pool: pool.clone(),
        config: test_config(&database_url),
        notifier: gateway.clone(),
    };

    TestContext {
        pool,
        state,
        gateway,
        path,
    }
}

/// Spawns the app on a random port. Returns the base URL and the context
/// backing it; keep the context alive for the duration of the test.
pub async fn spawn_app() -> (String, TestContext) {
    let ctx = setup().await;
    let app = routes::create_router(ctx.state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (address, ctx)
}

/// Fixed instant the scenario tests run around.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 1, 9, 0, 0).unwrap()
}

/// A session open from an hour before `t0` until two hours after it.
pub async fn open_session(pool: &SqlitePool) -> ClassSession {
    session_between(pool, t0() - Duration::hours(1), t0() + Duration::hours(2)).await
}

pub async fn session_between(
    pool: &SqlitePool,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> ClassSession {
    let req = CreateSessionRequest {
        title: "Thermodynamics".to_string(),
        teacher: "Dr. Rao".to_string(),
        start_time: start,
        end_time: end,
    };
    registry::create_session(pool, &req, start)
        .await
        .expect("Failed to create session")
}

pub async fn add_choice_question(pool: &SqlitePool, session_id: i64, correct: i64) -> Question {
    let req = CreateQuestionRequest {
        text: format!("Question {}", uuid::Uuid::new_v4()),
        question_type: QuestionKind::MultipleChoice,
        options: Some(vec![
            "A".to_string(),
            "B".to_string(),
            "C".to_string(),
            "D".to_string(),
        ]),
        correct_option: Some(correct),
    };
    questions::add_question(pool, session_id, &req, t0())
        .await
        .expect("Failed to add question")
}

pub async fn add_text_question(pool: &SqlitePool, session_id: i64) -> Question {
    let req = CreateQuestionRequest {
        text: "What did you learn today?".to_string(),
        question_type: QuestionKind::TextResponse,
        options: None,
        correct_option: None,
    };
    questions::add_question(pool, session_id, &req, t0())
        .await
        .expect("Failed to add question")
}

pub fn registration(email: &str, phone: &str) -> RegistrationProfile {
    RegistrationProfile {
        name: "Asha Verma".to_string(),
        phone: phone.to_string(),
        email: email.to_string(),
        age: Some(21),
        place: Some("Pune".to_string()),
    }
}

pub fn join_request(
    identifier: &str,
    password: Option<&str>,
    session: &ClassSession,
    registration: Option<RegistrationProfile>,
) -> JoinSessionRequest {
    JoinSessionRequest {
        identifier: identifier.to_string(),
        password: password.map(str::to_string),
        session_code: session.session_code.clone(),
        expected_session_id: Some(session.id),
        registration,
    }
}

/// Registers a fresh attendee into `session` at `t0` and returns their principal.
pub async fn join_new(ctx: &TestContext, session: &ClassSession) -> AttendeePrincipal {
    let email = format!("{}@example.com", &uuid::Uuid::new_v4().to_string()[..8]);
    let req = join_request(
        &email,
        Some("secret123"),
        session,
        Some(registration(&email, "9876543210")),
    );
    let joined: JoinResponse = identity::register_or_login(&ctx.state, &req, t0())
        .await
        .expect("Failed to join session");
    AttendeePrincipal {
        attendee_id: joined.attendee.id,
        session_id: session.id,
    }
}

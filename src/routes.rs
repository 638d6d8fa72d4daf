// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, attendee, auth, feedback, quiz, sessions},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, sessions, quiz, me, feedback, admin).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (pool, config, notification gateway).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_routes = Router::new()
        .route("/join", post(auth::join))
        .route("/check-participant", post(auth::check_participant))
        .route("/admin/login", post(auth::admin_login));

    let session_routes = Router::new()
        .route("/", get(sessions::list_sessions))
        .route("/active", get(sessions::list_active))
        .route("/upcoming", get(sessions::list_upcoming))
        .route("/verify-code", post(sessions::verify_code))
        .route("/{id}", get(sessions::get_session))
        .route("/{id}/send-code", post(sessions::send_code));

    let quiz_routes = Router::new()
        .route("/state", get(quiz::get_state))
        .route("/submit", post(quiz::submit))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let me_routes = Router::new()
        .route("/", get(attendee::me))
        .route("/attendance", get(attendee::attendance))
        .route("/responses", get(attendee::responses))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let admin_routes = Router::new()
        .route("/stats", get(admin::dashboard_stats))
        .route("/admins", get(admin::list_admins).post(admin::create_admin))
        .route(
            "/sessions",
            get(admin::list_sessions).post(admin::create_session),
        )
        .route(
            "/sessions/{id}",
            get(admin::get_session)
                .put(admin::update_session)
                .delete(admin::delete_session),
        )
        .route(
            "/sessions/{id}/questions",
            get(admin::list_questions).post(admin::create_question),
        )
        .route("/sessions/{id}/attendees", get(admin::session_roster))
        .route("/sessions/{id}/responses", get(admin::session_responses))
        .route("/sessions/{id}/scores", get(admin::session_scores))
        .route("/sessions/{id}/send-codes", post(admin::send_codes))
        .route(
            "/sessions/{id}/progress/{attendee_id}",
            get(admin::progress_stats),
        )
        .route(
            "/sessions/{id}/progress/{attendee_id}/refresh",
            post(admin::refresh_progress),
        )
        .route(
            "/questions/{id}",
            put(admin::update_question).delete(admin::delete_question),
        )
        .route("/attendees", get(admin::list_attendees))
        .route("/attendees/{id}", delete(admin::delete_attendee))
        .route("/reviews", get(admin::list_reviews))
        // Double middleware protection: Auth first, then Admin check
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
                .layer(middleware::from_fn(admin_middleware)),
        );

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/sessions", session_routes)
        .nest("/api/quiz", quiz_routes)
        .nest("/api/me", me_routes)
        .route("/api/feedback", post(feedback::submit_feedback))
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

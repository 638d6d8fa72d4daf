// tests/identity_tests.rs

mod common;

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::Duration;
use common::{
    RecordingGateway, join_request, open_session, registration, session_between, setup,
    setup_with, t0, test_config,
};
use quiz_portal::{
    error::AppError,
    models::{admin::AdminLoginRequest, attendee::CheckParticipantRequest},
    services::{attendance, identity, registry},
};
use sha1::Sha1;
use sha2::Sha256;
use sqlx::SqlitePool;

async fn insert_attendee(
    pool: &SqlitePool,
    email: &str,
    phone: &str,
    stored_password: &str,
) -> i64 {
    sqlx::query(
        r#"
        INSERT INTO attendees (name, phone, email, age, place, has_submitted, password, created_at, updated_at)
        VALUES ('Legacy User', ?, ?, NULL, '', 0, ?, ?, ?)
        "#,
    )
    .bind(phone)
    .bind(email)
    .bind(stored_password)
    .bind(t0())
    .bind(t0())
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid()
}

async fn stored_password(pool: &SqlitePool, id: i64) -> String {
    sqlx::query_scalar("SELECT password FROM attendees WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn plaintext_password_is_upgraded_on_login() {
    let ctx = setup().await;
    let session = open_session(&ctx.pool).await;
    let id = insert_attendee(&ctx.pool, "legacy@example.com", "9000000001", "abc123").await;

    let req = join_request("legacy@example.com", Some("abc123"), &session, None);
    let joined = identity::register_or_login(&ctx.state, &req, t0())
        .await
        .unwrap();
    assert_eq!(joined.attendee.id, id);
    assert!(!joined.is_new);

    let upgraded = stored_password(&ctx.pool, id).await;
    assert!(upgraded.starts_with("$argon2"));
    assert_ne!(upgraded, "abc123");

    // Still accepts the same password once hashed.
    identity::register_or_login(&ctx.state, &req, t0() + Duration::minutes(1))
        .await
        .unwrap();

    let wrong = join_request("legacy@example.com", Some("abc124"), &session, None);
    let result = identity::register_or_login(&ctx.state, &wrong, t0()).await;
    assert!(matches!(result, Err(AppError::AuthError(_))));
}

#[tokio::test]
async fn django_pbkdf2_password_verifies_and_upgrades() {
    let ctx = setup().await;
    let session = open_session(&ctx.pool).await;

    let mut digest = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(b"correct horse", b"s4ltS4lt", 1000, &mut digest);
    let encoded = format!("pbkdf2_sha256$1000$s4ltS4lt${}", STANDARD.encode(digest));
    let id = insert_attendee(&ctx.pool, "django@example.com", "9000000002", &encoded).await;

    let wrong = join_request("django@example.com", Some("battery staple"), &session, None);
    let result = identity::register_or_login(&ctx.state, &wrong, t0()).await;
    assert!(matches!(result, Err(AppError::AuthError(_))));
    assert_eq!(stored_password(&ctx.pool, id).await, encoded);

    let right = join_request("django@example.com", Some("correct horse"), &session, None);
    identity::register_or_login(&ctx.state, &right, t0())
        .await
        .unwrap();
    assert!(stored_password(&ctx.pool, id).await.starts_with("$argon2"));
}

#[tokio::test]
async fn django_pbkdf2_sha1_password_verifies_and_upgrades() {
    let ctx = setup().await;
    let session = open_session(&ctx.pool).await;

    let mut digest = [0u8; 20];
    pbkdf2::pbkdf2_hmac::<Sha1>(b"realpw", b"salt", 1000, &mut digest);
    let encoded = format!("pbkdf2_sha1$1000$salt${}", STANDARD.encode(digest));
    let id = insert_attendee(&ctx.pool, "sha1@example.com", "9000000004", &encoded).await;

    // The stored string itself is not a password.
    let replay = join_request("sha1@example.com", Some(&encoded), &session, None);
    let result = identity::register_or_login(&ctx.state, &replay, t0()).await;
    assert!(matches!(result, Err(AppError::AuthError(_))));
    assert_eq!(stored_password(&ctx.pool, id).await, encoded);

    let right = join_request("sha1@example.com", Some("realpw"), &session, None);
    identity::register_or_login(&ctx.state, &right, t0())
        .await
        .unwrap();
    assert!(stored_password(&ctx.pool, id).await.starts_with("$argon2"));
}

#[tokio::test]
async fn unsupported_hash_is_never_accepted_or_rewritten() {
    let ctx = setup().await;
    let session = open_session(&ctx.pool).await;
    let stored = "bcrypt_sha256$$2b$12$abcdefghijklmnopqrstuuNfO0l9eW1Zr8q7YQpXcM2ZxWcT8l6";
    let id = insert_attendee(&ctx.pool, "bcrypt@example.com", "9000000005", stored).await;

    for candidate in [stored, "", "anything"] {
        let req = join_request("bcrypt@example.com", Some(candidate), &session, None);
        let result = identity::register_or_login(&ctx.state, &req, t0()).await;
        assert!(matches!(result, Err(AppError::AuthError(_))));
    }
    assert_eq!(stored_password(&ctx.pool, id).await, stored);
}

#[tokio::test]
async fn failed_join_does_not_leave_a_registration_behind() {
    let ctx = setup().await;
    let session = open_session(&ctx.pool).await;
    sqlx::query(
        r#"
        CREATE TRIGGER refuse_attendance BEFORE INSERT ON session_attendance
        BEGIN
            SELECT RAISE(ABORT, 'attendance refused');
        END
        "#,
    )
    .execute(&ctx.pool)
    .await
    .unwrap();

    let req = join_request(
        "halfway@example.com",
        Some("secret123"),
        &session,
        Some(registration("halfway@example.com", "9000000006")),
    );
    let result = identity::register_or_login(&ctx.state, &req, t0()).await;
    assert!(matches!(result, Err(AppError::InternalServerError(_))));

    let registered: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM attendees")
        .fetch_one(&ctx.pool)
        .await
        .unwrap();
    assert_eq!(registered, 0);
    assert!(ctx.gateway.sent().is_empty());
}

#[tokio::test]
async fn attendee_without_password_logs_in_with_anything() {
    let ctx = setup().await;
    let session = open_session(&ctx.pool).await;
    let id = insert_attendee(&ctx.pool, "open@example.com", "9000000003", "").await;

    for password in [None, Some(""), Some("whatever")] {
        let req = join_request("open@example.com", password, &session, None);
        let joined = identity::register_or_login(&ctx.state, &req, t0())
            .await
            .unwrap();
        assert_eq!(joined.attendee.id, id);
    }
    assert_eq!(stored_password(&ctx.pool, id).await, "");
}

#[tokio::test]
async fn code_for_another_session_is_called_out() {
    let ctx = setup().await;
    let session_a = open_session(&ctx.pool).await;
    let session_b = open_session(&ctx.pool).await;

    let mut req = join_request(
        "asha@example.com",
        None,
        &session_a,
        Some(registration("asha@example.com", "9876543210")),
    );
    req.session_code = session_b.session_code.to_lowercase();

    let result = identity::register_or_login(&ctx.state, &req, t0()).await;
    assert!(matches!(result, Err(AppError::WrongSession(_))));

    let unknown = registry::verify_code(&ctx.pool, "ZZZZZZZZ", None, t0()).await;
    assert!(matches!(unknown, Err(AppError::NotFound(_))));

    let ok = registry::verify_code(&ctx.pool, &session_b.session_code, Some(session_b.id), t0())
        .await
        .unwrap();
    assert_eq!(ok.id, session_b.id);
}

#[tokio::test]
async fn unknown_participant_needs_registration() {
    let ctx = setup().await;
    let session = open_session(&ctx.pool).await;

    let req = join_request("nobody@example.com", Some("pw"), &session, None);
    let result = identity::register_or_login(&ctx.state, &req, t0()).await;
    assert!(matches!(result, Err(AppError::AuthError(_))));

    let bad_phone = join_request(
        "nobody@example.com",
        None,
        &session,
        Some(registration("nobody@example.com", "12345")),
    );
    let result = identity::register_or_login(&ctx.state, &bad_phone, t0()).await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn requested_codes_go_only_to_registered_participants() {
    let ctx = setup().await;
    let session = open_session(&ctx.pool).await;
    insert_attendee(&ctx.pool, "known@example.com", "9000000007", "").await;

    let stranger = registry::request_code(
        &ctx.pool,
        ctx.gateway.as_ref(),
        session.id,
        "stranger@example.com",
        t0(),
    )
    .await;
    assert!(matches!(stranger, Err(AppError::NotFound(_))));
    assert!(ctx.gateway.sent().is_empty());

    let sent = registry::request_code(
        &ctx.pool,
        ctx.gateway.as_ref(),
        session.id,
        " Known@Example.com ",
        t0(),
    )
    .await
    .unwrap();
    assert!(sent);
    assert_eq!(
        ctx.gateway.sent(),
        vec![("known@example.com".to_string(), session.session_code.clone())]
    );

    let ended = registry::request_code(
        &ctx.pool,
        ctx.gateway.as_ref(),
        session.id,
        "known@example.com",
        t0() + Duration::hours(3),
    )
    .await;
    assert!(matches!(ended, Err(AppError::SessionClosed(_))));
}

#[tokio::test]
async fn registration_sends_the_code_once() {
    let ctx = setup().await;
    let session = open_session(&ctx.pool).await;

    let req = join_request(
        "asha@example.com",
        Some("secret123"),
        &session,
        Some(registration("asha@example.com", "9876543210")),
    );
    let joined = identity::register_or_login(&ctx.state, &req, t0())
        .await
        .unwrap();
    assert!(joined.is_new);
    assert_eq!(joined.code_sent, Some(true));
    assert_eq!(joined.attendee.class_session_id, Some(session.id));

    let again = join_request("asha@example.com", Some("secret123"), &session, None);
    let returning = identity::register_or_login(&ctx.state, &again, t0())
        .await
        .unwrap();
    assert!(!returning.is_new);
    assert_eq!(returning.code_sent, None);

    let sent = ctx.gateway.sent();
    assert_eq!(sent, vec![("asha@example.com".to_string(), session.session_code.clone())]);
}

#[tokio::test]
async fn failed_delivery_does_not_fail_the_join() {
    let ctx = setup_with(RecordingGateway::failing()).await;
    let session = open_session(&ctx.pool).await;

    let req = join_request(
        "asha@example.com",
        None,
        &session,
        Some(registration("asha@example.com", "9876543210")),
    );
    let joined = identity::register_or_login(&ctx.state, &req, t0())
        .await
        .unwrap();
    assert!(joined.is_new);
    assert_eq!(joined.code_sent, Some(false));
    assert_eq!(ctx.gateway.sent().len(), 1);

    let history = attendance::attendance_history(&ctx.pool, joined.attendee.id)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn email_is_matched_case_insensitively() {
    let ctx = setup().await;
    let session = open_session(&ctx.pool).await;

    let req = join_request(
        "Asha@Example.com",
        Some("secret123"),
        &session,
        Some(registration("Asha@Example.com", "9876543210")),
    );
    let first = identity::register_or_login(&ctx.state, &req, t0())
        .await
        .unwrap();
    assert_eq!(first.attendee.email, "asha@example.com");

    let login = join_request("ASHA@example.COM", Some("secret123"), &session, None);
    let second = identity::register_or_login(&ctx.state, &login, t0())
        .await
        .unwrap();
    assert_eq!(second.attendee.id, first.attendee.id);

    // A different phone with the same email in another case is a duplicate.
    let clash = join_request(
        "1112223333",
        None,
        &session,
        Some(registration("asha@EXAMPLE.com", "1112223333")),
    );
    let result = identity::register_or_login(&ctx.state, &clash, t0()).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    let by_phone = join_request("9876543210", Some("secret123"), &session, None);
    let third = identity::register_or_login(&ctx.state, &by_phone, t0())
        .await
        .unwrap();
    assert_eq!(third.attendee.id, first.attendee.id);
}

#[tokio::test]
async fn joining_another_session_moves_the_current_pointer() {
    let ctx = setup().await;
    let session_a = open_session(&ctx.pool).await;
    let session_b = open_session(&ctx.pool).await;

    let register = join_request(
        "asha@example.com",
        None,
        &session_a,
        Some(registration("asha@example.com", "9876543210")),
    );
    identity::register_or_login(&ctx.state, &register, t0())
        .await
        .unwrap();

    let login = join_request("asha@example.com", None, &session_b, None);
    let joined = identity::register_or_login(&ctx.state, &login, t0() + Duration::minutes(5))
        .await
        .unwrap();
    assert_eq!(joined.attendee.class_session_id, Some(session_b.id));

    // Joining the same session twice keeps a single attendance record.
    identity::register_or_login(&ctx.state, &login, t0() + Duration::minutes(6))
        .await
        .unwrap();

    let history = attendance::attendance_history(&ctx.pool, joined.attendee.id)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn closed_sessions_cannot_be_joined() {
    let ctx = setup().await;
    let upcoming = session_between(&ctx.pool, t0() + Duration::hours(1), t0() + Duration::hours(2)).await;

    let req = join_request(
        "asha@example.com",
        None,
        &upcoming,
        Some(registration("asha@example.com", "9876543210")),
    );
    let early = identity::register_or_login(&ctx.state, &req, t0()).await;
    assert!(matches!(early, Err(AppError::SessionClosed(_))));

    let late = identity::register_or_login(&ctx.state, &req, t0() + Duration::hours(3)).await;
    assert!(matches!(late, Err(AppError::SessionClosed(_))));

    // The boundary instants themselves are inside the window.
    identity::register_or_login(&ctx.state, &req, t0() + Duration::hours(2))
        .await
        .unwrap();
}

#[tokio::test]
async fn participant_lookup_prefers_email_then_phone() {
    let ctx = setup().await;
    insert_attendee(&ctx.pool, "legacy@example.com", "9000000001", "").await;

    let by_email = identity::check_participant(
        &ctx.pool,
        &CheckParticipantRequest {
            email: Some("LEGACY@example.com".to_string()),
            phone: None,
        },
    )
    .await
    .unwrap();
    assert!(by_email.exists);

    let by_phone = identity::check_participant(
        &ctx.pool,
        &CheckParticipantRequest {
            email: Some("someone-else@example.com".to_string()),
            phone: Some("9000000001".to_string()),
        },
    )
    .await
    .unwrap();
    assert!(by_phone.exists);
    assert_eq!(by_phone.profile.unwrap().email, "legacy@example.com");

    let missing = identity::check_participant(
        &ctx.pool,
        &CheckParticipantRequest {
            email: Some("none@example.com".to_string()),
            phone: None,
        },
    )
    .await
    .unwrap();
    assert!(!missing.exists);
    assert!(missing.profile.is_none());
}

#[tokio::test]
async fn seeded_admin_can_log_in() {
    let ctx = setup().await;
    let mut config = test_config(&ctx.state.config.database_url);
    config.admin_username = Some("root".to_string());
    config.admin_password = Some("rootpassword".to_string());

    identity::seed_admin(&ctx.pool, &config, t0()).await.unwrap();
    // Seeding twice is a no-op.
    identity::seed_admin(&ctx.pool, &config, t0()).await.unwrap();
    assert_eq!(identity::list_admins(&ctx.pool).await.unwrap().len(), 1);

    let login = identity::admin_login(
        &ctx.pool,
        &config,
        &AdminLoginRequest {
            username: "root".to_string(),
            password: "rootpassword".to_string(),
        },
    )
    .await
    .unwrap();
    assert_eq!(login.admin.username, "root");
    assert!(!login.token.is_empty());

    let wrong = identity::admin_login(
        &ctx.pool,
        &config,
        &AdminLoginRequest {
            username: "root".to_string(),
            password: "nope-nope".to_string(),
        },
    )
    .await;
    assert!(matches!(wrong, Err(AppError::AuthError(_))));
}

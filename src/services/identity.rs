// src/services/identity.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use validator::Validate;

use crate::{
    config::Config,
    error::{AppError, is_unique_violation},
    models::{
        admin::{Admin, AdminLoginRequest, CreateAdminRequest},
        attendee::{
            Attendee, AttendeeProfile, CheckParticipantRequest, JoinResponse, JoinSessionRequest,
            ParticipantLookup, RegistrationProfile, validate_phone,
        },
        session::SessionView,
    },
    services::registry,
    state::AppState,
    utils::{
        hash::{Credential, hash_password},
        jwt::{sign_admin_jwt, sign_attendee_jwt},
    },
};

const ATTENDEE_COLUMNS: &str = "id, name, phone, email, age, place, class_session_id, \
     has_submitted, quiz_started_at, password, created_at, updated_at";

/// How a participant names themselves when joining.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    /// Lowercased email address.
    Email(String),
    /// Ten-digit phone number.
    Phone(String),
}

impl Identifier {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let raw = raw.trim();
        if raw.contains('@') {
            return Ok(Identifier::Email(raw.to_lowercase()));
        }
        if validate_phone(raw).is_ok() {
            return Ok(Identifier::Phone(raw.to_string()));
        }
        Err(AppError::Validation(
            "identifier: Enter an email address or a 10-digit phone number.".to_string(),
        ))
    }

    fn matches(&self, profile: &RegistrationProfile) -> bool {
        match self {
            Identifier::Email(email) => profile.email.trim().eq_ignore_ascii_case(email),
            Identifier::Phone(phone) => profile.phone.trim() == phone,
        }
    }
}

/// Finds an attendee by email (case-insensitive) or by phone.
pub async fn find_attendee(
    pool: &SqlitePool,
    identifier: &Identifier,
) -> Result<Option<Attendee>, AppError> {
    let attendee = match identifier {
        Identifier::Email(email) => {
            sqlx::query_as::<_, Attendee>(&format!(
                "SELECT {ATTENDEE_COLUMNS} FROM attendees WHERE email = ? COLLATE NOCASE"
            ))
            .bind(email)
            .fetch_optional(pool)
            .await?
        }
        Identifier::Phone(phone) => {
            sqlx::query_as::<_, Attendee>(&format!(
                "SELECT {ATTENDEE_COLUMNS} FROM attendees WHERE phone = ? ORDER BY id LIMIT 1"
            ))
            .bind(phone)
            .fetch_optional(pool)
            .await?
        }
    };
    Ok(attendee)
}

pub async fn get_attendee(pool: &SqlitePool, id: i64) -> Result<Attendee, AppError> {
    sqlx::query_as::<_, Attendee>(&format!(
        "SELECT {ATTENDEE_COLUMNS} FROM attendees WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Attendee not found".to_string()))
}

/// Looks up a returning participant for form auto-fill. Email wins over phone.
pub async fn check_participant(
    pool: &SqlitePool,
    req: &CheckParticipantRequest,
) -> Result<ParticipantLookup, AppError> {
    let email = req.email.as_deref().map(str::trim).filter(|e| !e.is_empty());
    let phone = req.phone.as_deref().map(str::trim).filter(|p| !p.is_empty());

    if email.is_none() && phone.is_none() {
        return Err(AppError::Validation(
            "email: Provide an email or a phone number.".to_string(),
        ));
    }

    let mut found = None;
    if let Some(email) = email {
        found = find_attendee(pool, &Identifier::Email(email.to_lowercase())).await?;
    }
    if found.is_none() {
        if let Some(phone) = phone {
            found = find_attendee(pool, &Identifier::Phone(phone.to_string())).await?;
        }
    }

    Ok(match found {
        Some(attendee) => ParticipantLookup {
            exists: true,
            profile: Some(AttendeeProfile::from(&attendee)),
            message: Some("Welcome back! Your details have been filled in.".to_string()),
        },
        None => ParticipantLookup {
            exists: false,
            profile: None,
            message: None,
        },
    })
}

/// Checks a candidate password against the attendee's stored credential.
///
/// A successful match against any non-Argon2 encoding rewrites the stored
/// credential as Argon2 before returning.
pub async fn authenticate_attendee(
    pool: &SqlitePool,
    attendee: &Attendee,
    candidate: &str,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let credential = Credential::parse(&attendee.password);
    if !credential.verify(candidate)? {
        tracing::warn!("Failed login for attendee {}", attendee.id);
        return Err(AppError::AuthError("Incorrect password.".to_string()));
    }

    if credential.needs_upgrade() {
        let hashed = hash_password(candidate)?;
        sqlx::query("UPDATE attendees SET password = ?, updated_at = ? WHERE id = ?")
            .bind(&hashed)
            .bind(now)
            .bind(attendee.id)
            .execute(pool)
            .await?;
        tracing::info!("Upgraded stored credential for attendee {} to Argon2", attendee.id);
    }
    Ok(())
}

/// Inserts a new attendee on `conn` and returns its id.
async fn create_attendee(
    conn: &mut SqliteConnection,
    profile: &RegistrationProfile,
    password: &str,
    now: DateTime<Utc>,
) -> Result<i64, AppError> {
    // Participants may register without a password.
    let stored = if password.is_empty() {
        String::new()
    } else {
        hash_password(password)?
    };
    let email = profile.email.trim().to_lowercase();

    let result = sqlx::query(
        r#"
        INSERT INTO attendees (name, phone, email, age, place, has_submitted, password, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, 0, ?, ?, ?)
        "#,
    )
    .bind(profile.name.trim())
    .bind(profile.phone.trim())
    .bind(&email)
    .bind(profile.age)
    .bind(profile.place.as_deref().map(str::trim).unwrap_or(""))
    .bind(&stored)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await;

    match result {
        Ok(done) => {
            let id = done.last_insert_rowid();
            tracing::info!("Registered attendee {} ({})", id, email);
            Ok(id)
        }
        Err(e) if is_unique_violation(&e) => Err(AppError::Conflict(format!(
            "A participant with email '{}' already exists.",
            email
        ))),
        Err(e) => {
            tracing::error!("Failed to register attendee: {:?}", e);
            Err(e.into())
        }
    }
}

enum Joiner<'a> {
    Existing(i64),
    New(&'a RegistrationProfile),
}

/// Registers a new participant or logs in an existing one, then joins them
/// to the session the code resolves to.
///
/// The code must be valid, match `expected_session_id` when given, and the
/// session must be open. New participants are sent the code by email after
/// the join is committed; a delivery failure does not fail the join.
pub async fn register_or_login(
    state: &AppState,
    req: &JoinSessionRequest,
    now: DateTime<Utc>,
) -> Result<JoinResponse, AppError> {
    req.validate()?;
    let pool = &state.pool;

    let session =
        registry::verify_code(pool, &req.session_code, req.expected_session_id, now).await?;
    let identifier = Identifier::parse(&req.identifier)?;
    let password = req.password.as_deref().unwrap_or("");

    let joiner = match find_attendee(pool, &identifier).await? {
        Some(existing) => {
            authenticate_attendee(pool, &existing, password, now).await?;
            Joiner::Existing(existing.id)
        }
        None => {
            let Some(profile) = req.registration.as_ref() else {
                return Err(AppError::AuthError(
                    "No participant found with that email or phone number.".to_string(),
                ));
            };
            profile.validate()?;
            if !identifier.matches(profile) {
                return Err(AppError::Validation(
                    "identifier: must match the email or phone in the registration.".to_string(),
                ));
            }
            Joiner::New(profile)
        }
    };

    // Registration and the join commit together.
    let mut tx = pool.begin().await?;
    let (attendee_id, is_new) = match joiner {
        Joiner::Existing(id) => (id, false),
        Joiner::New(profile) => (create_attendee(&mut tx, profile, password, now).await?, true),
    };

    sqlx::query(
        r#"
        INSERT INTO session_attendance (attendee_id, class_session_id, joined_at, has_submitted)
        VALUES (?, ?, ?, 0)
        ON CONFLICT(attendee_id, class_session_id) DO NOTHING
        "#,
    )
    .bind(attendee_id)
    .bind(session.id)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    // The attendee row mirrors the state of the session they are now in.
    sqlx::query(
        r#"
        UPDATE attendees
        SET class_session_id = ?,
            has_submitted = (
                SELECT has_submitted FROM session_attendance
                WHERE attendee_id = ? AND class_session_id = ?
            ),
            quiz_started_at = (
                SELECT started_at FROM quiz_progress
                WHERE attendee_id = ? AND class_session_id = ?
            ),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(session.id)
    .bind(attendee_id)
    .bind(session.id)
    .bind(attendee_id)
    .bind(session.id)
    .bind(now)
    .bind(attendee_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let attendee = get_attendee(pool, attendee_id).await?;
    let token = sign_attendee_jwt(
        attendee.id,
        session.id,
        &state.config.jwt_secret,
        state.config.jwt_expiration,
    )?;

    let code_sent = if is_new {
        let sent = state.notifier.send_code(&attendee.email, &session).await;
        if !sent {
            tracing::warn!(
                "Attendee {} joined session {} but the code email was not delivered",
                attendee.id,
                session.id
            );
        }
        Some(sent)
    } else {
        None
    };

    tracing::info!(
        "Attendee {} joined session {} (new: {})",
        attendee.id,
        session.id,
        is_new
    );

    Ok(JoinResponse {
        token,
        token_type: "Bearer",
        attendee,
        session: SessionView::at(session, now),
        is_new,
        code_sent,
    })
}

#[derive(Debug, Serialize)]
pub struct AdminLoginResponse {
    pub token: String,
    #[serde(rename = "type")]
    pub token_type: &'static str,
    pub admin: Admin,
}

const ADMIN_COLUMNS: &str = "id, username, email, password, created_at";

pub async fn admin_login(
    pool: &SqlitePool,
    config: &Config,
    req: &AdminLoginRequest,
) -> Result<AdminLoginResponse, AppError> {
    req.validate()?;

    let admin = sqlx::query_as::<_, Admin>(&format!(
        "SELECT {ADMIN_COLUMNS} FROM admins WHERE username = ?"
    ))
    .bind(req.username.trim())
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::AuthError("Invalid username or password".to_string()))?;

    let credential = Credential::parse(&admin.password);
    // An admin without a stored password can never sign in.
    if matches!(credential, Credential::Unset) || !credential.verify(&req.password)? {
        tracing::warn!("Failed admin login for '{}'", admin.username);
        return Err(AppError::AuthError("Invalid username or password".to_string()));
    }

    if credential.needs_upgrade() {
        let hashed = hash_password(&req.password)?;
        sqlx::query("UPDATE admins SET password = ? WHERE id = ?")
            .bind(&hashed)
            .bind(admin.id)
            .execute(pool)
            .await?;
        tracing::info!("Upgraded stored credential for admin {} to Argon2", admin.id);
    }

    let token = sign_admin_jwt(admin.id, &config.jwt_secret, config.jwt_expiration)?;
    tracing::info!("Admin '{}' logged in", admin.username);

    Ok(AdminLoginResponse {
        token,
        token_type: "Bearer",
        admin,
    })
}

pub async fn create_admin(
    pool: &SqlitePool,
    req: &CreateAdminRequest,
    now: DateTime<Utc>,
) -> Result<Admin, AppError> {
    req.validate()?;
    let hashed = hash_password(&req.password)?;

    let result = sqlx::query(
        "INSERT INTO admins (username, email, password, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(req.username.trim())
    .bind(req.email.trim().to_lowercase())
    .bind(&hashed)
    .bind(now)
    .execute(pool)
    .await;

    match result {
        Ok(done) => {
            let id = done.last_insert_rowid();
            tracing::info!("Created admin {} ('{}')", id, req.username.trim());
            sqlx::query_as::<_, Admin>(&format!(
                "SELECT {ADMIN_COLUMNS} FROM admins WHERE id = ?"
            ))
            .bind(id)
            .fetch_one(pool)
            .await
            .map_err(AppError::from)
        }
        Err(e) if is_unique_violation(&e) => Err(AppError::Conflict(format!(
            "Admin '{}' or that email already exists",
            req.username.trim()
        ))),
        Err(e) => Err(e.into()),
    }
}

pub async fn list_admins(pool: &SqlitePool) -> Result<Vec<Admin>, AppError> {
    let admins = sqlx::query_as::<_, Admin>(&format!(
        "SELECT {ADMIN_COLUMNS} FROM admins ORDER BY id"
    ))
    .fetch_all(pool)
    .await?;
    Ok(admins)
}

/// Creates the bootstrap admin from configuration when no admin exists yet.
pub async fn seed_admin(
    pool: &SqlitePool,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) else {
        return Ok(());
    };

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM admins")
        .fetch_one(pool)
        .await?;
    if count > 0 {
        return Ok(());
    }

    let email = config
        .admin_email
        .clone()
        .unwrap_or_else(|| format!("{}@quiz-portal.local", username));
    let req = CreateAdminRequest {
        username: username.clone(),
        email,
        password: password.clone(),
    };
    create_admin(pool, &req, now).await?;
    tracing::info!("Seeded initial admin '{}'", username);
    Ok(())
}

// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{config::Config, error::AppError};

pub const ROLE_ATTENDEE: &str = "attendee";
pub const ROLE_ADMIN: &str = "admin";

/// JWT Claims structure.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - Attendee ID or Admin ID (as string), depending on `role`.
    pub sub: String,
    /// 'attendee' or 'admin'.
    pub role: String,
    /// Session the attendee joined with this token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<i64>,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

/// An authenticated participant acting within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttendeePrincipal {
    pub attendee_id: i64,
    pub session_id: i64,
}

impl Claims {
    /// Resolves the claims to an attendee principal, rejecting admin tokens.
    pub fn attendee(&self) -> Result<AttendeePrincipal, AppError> {
        if self.role != ROLE_ATTENDEE {
            return Err(AppError::Forbidden("Attendee access only".to_string()));
        }
        let attendee_id = self
            .sub
            .parse::<i64>()
            .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;
        let session_id = self
            .sid
            .ok_or_else(|| AppError::AuthError("Token is not bound to a session".to_string()))?;
        Ok(AttendeePrincipal {
            attendee_id,
            session_id,
        })
    }

    pub fn admin_id(&self) -> Result<i64, AppError> {
        if self.role != ROLE_ADMIN {
            return Err(AppError::Forbidden("Admin access only".to_string()));
        }
        self.sub
            .parse::<i64>()
            .map_err(|_| AppError::AuthError("Invalid token".to_string()))
    }
}

fn sign(
    claims_without_exp: Claims,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    // Calculate expiration: current time + expiration_seconds
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs() as usize
        + expiration_seconds as usize;

    let claims = Claims {
        exp: expiration,
        ..claims_without_exp
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Signs a token for an attendee bound to the session they joined.
pub fn sign_attendee_jwt(
    attendee_id: i64,
    session_id: i64,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    sign(
        Claims {
            sub: attendee_id.to_string(),
            role: ROLE_ATTENDEE.to_owned(),
            sid: Some(session_id),
            exp: 0,
        },
        secret,
        expiration_seconds,
    )
}

/// Signs a token for a dashboard admin.
pub fn sign_admin_jwt(
    admin_id: i64,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    sign(
        Claims {
            sub: admin_id.to_string(),
            role: ROLE_ADMIN.to_owned(),
            sid: None,
            exp: 0,
        },
        secret,
        expiration_seconds,
    )
}

/// Verifies and decodes a JWT string.
///
/// Returns the `Claims` if valid, otherwise returns an `AppError`.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

    Ok(token_data.claims)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

/// Decodes the bearer token when one is present.
///
/// Used by endpoints that accept anonymous callers but attribute known ones.
pub fn optional_claims(headers: &HeaderMap, secret: &str) -> Result<Option<Claims>, AppError> {
    match bearer_token(headers) {
        Some(token) => verify_jwt(token, secret).map(Some),
        None => Ok(None),
    }
}

/// Axum Middleware: Authentication.
///
/// Intercepts requests, validates the 'Authorization: Bearer <token>' header.
/// If valid, injects `Claims` into the request extensions for handlers to use.
/// If invalid, returns 401 Unauthorized.
pub async fn auth_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = bearer_token(req.headers()).ok_or(StatusCode::UNAUTHORIZED)?;

    match verify_jwt(token, &config.jwt_secret) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            Ok(next.run(req).await)
        }
        Err(_) => Err(StatusCode::UNAUTHORIZED),
    }
}

/// Axum Middleware: Admin Authorization.
///
/// Must be used AFTER `auth_middleware`. Checks if the injected `Claims` has 'admin' role.
/// If not, returns 403 Forbidden.
pub async fn admin_middleware(req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if claims.role != ROLE_ADMIN {
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit_test_secret";

    #[test]
    fn test_attendee_token_round_trip() {
        let token = sign_attendee_jwt(12, 3, SECRET, 60).unwrap();
        let claims = verify_jwt(&token, SECRET).unwrap();
        assert_eq!(
            claims.attendee().unwrap(),
            AttendeePrincipal {
                attendee_id: 12,
                session_id: 3
            }
        );
        assert!(claims.admin_id().is_err());
    }

    #[test]
    fn test_admin_token_is_not_an_attendee() {
        let token = sign_admin_jwt(1, SECRET, 60).unwrap();
        let claims = verify_jwt(&token, SECRET).unwrap();
        assert_eq!(claims.admin_id().unwrap(), 1);
        assert!(matches!(claims.attendee(), Err(AppError::Forbidden(_))));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = sign_admin_jwt(1, SECRET, 60).unwrap();
        assert!(verify_jwt(&token, "other").is_err());
    }
}

// src/notify.rs

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::{config::MailConfig, models::session::ClassSession};

/// Delivers join codes to participants.
///
/// Delivery is best-effort: implementations report success as a bool and
/// callers never fail the surrounding operation because of it.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send_code(&self, recipient_email: &str, session: &ClassSession) -> bool;
}

/// Builds the gateway selected by the mail configuration.
pub fn from_config(mail: &MailConfig) -> Arc<dyn NotificationGateway> {
    match &mail.resend_api_key {
        Some(key) => Arc::new(ResendGateway::new(key.clone(), mail.from_address.clone())),
        None => {
            tracing::warn!("RESEND_API_KEY not set, session codes will only be logged");
            Arc::new(LogGateway)
        }
    }
}

/// Development gateway: writes the code to the log instead of sending mail.
#[derive(Debug, Default, Clone)]
pub struct LogGateway;

#[async_trait]
impl NotificationGateway for LogGateway {
    async fn send_code(&self, recipient_email: &str, session: &ClassSession) -> bool {
        tracing::info!(
            "session code for '{}' ({}) -> {}",
            session.title,
            session.session_code,
            recipient_email
        );
        true
    }
}

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: String,
    html: String,
    text: String,
}

/// Sends codes through the Resend HTTP API.
#[derive(Debug, Clone)]
pub struct ResendGateway {
    client: reqwest::Client,
    api_key: String,
    from: String,
    endpoint: String,
}

impl ResendGateway {
    pub fn new(api_key: String, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            from,
            endpoint: "https://api.resend.com/emails".to_string(),
        }
    }
}

#[async_trait]
impl NotificationGateway for ResendGateway {
    async fn send_code(&self, recipient_email: &str, session: &ClassSession) -> bool {
        let (subject, html, text) = compose_code_email(session);
        let body = SendEmailRequest {
            from: &self.from,
            to: vec![recipient_email],
            subject,
            html,
            text,
        };

        let resp = match self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                tracing::error!("Failed to reach mail API: {:?}", e);
                return false;
            }
        };

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            tracing::error!("Mail API error: {status} - {text}");
            return false;
        }

        tracing::info!("session code for session {} sent to {}", session.id, recipient_email);
        true
    }
}

/// Returns `(subject, html, plain text)` for a join-code email.
pub fn compose_code_email(session: &ClassSession) -> (String, String, String) {
    let subject = format!("Your Session Code for {}", session.title);
    let html = format!(
        r#"<h2>{title}</h2>
<p><strong>Teacher:</strong> {teacher}</p>
<p>Your session code is:</p>
<p style="font-size: 28px; letter-spacing: 4px; font-family: monospace;"><strong>{code}</strong></p>
<p>Enter this code on the Quiz Portal to join the session, then log in and start your quiz.</p>
<p>If you did not register for this quiz, you can ignore this email.</p>"#,
        title = ammonia::clean_text(&session.title),
        teacher = ammonia::clean_text(&session.teacher),
        code = session.session_code,
    );
    let text = format!(
        "Session: {}\nTeacher: {}\nYour session code: {}\n\nEnter this code on the Quiz Portal to join the session.",
        session.title, session.teacher, session.session_code
    );
    (subject, html, text)
}

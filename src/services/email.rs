// SPDX-License-Identifier: MIT

//! Outbound email over SMTP.
//!
//! When SMTP is not configured the mailer runs in log-only mode: sends are
//! recorded at info level and reported as success, which keeps local
//! development and tests free of a mail server.

use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;
use crate::error::AppError;

/// SMTP mailer.
#[derive(Clone)]
pub struct Mailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: String,
}

impl Mailer {
    /// Build a mailer from SMTP settings, or a log-only one when absent.
    pub fn new(smtp: Option<&SmtpConfig>) -> Result<Self, AppError> {
        let Some(smtp) = smtp else {
            tracing::info!("SMTP not configured, mailer running in log-only mode");
            return Ok(Self::disabled());
        };

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("SMTP transport error: {}", e)))?
            .port(smtp.port)
            .credentials(Credentials::new(
                smtp.username.clone(),
                smtp.password.clone(),
            ))
            .build();

        Ok(Self {
            transport: Some(transport),
            from: smtp.from.clone(),
        })
    }

    /// Log-only mailer for tests and unconfigured environments.
    pub fn disabled() -> Self {
        Self {
            transport: None,
            from: "\"Easy Homes\" <no-reply@localhost>".to_string(),
        }
    }

    /// Send a plain-text email.
    pub async fn send(&self, to: &str, subject: &str, text: &str) -> Result<(), AppError> {
        let Some(transport) = &self.transport else {
            tracing::info!(to, subject, "Email send (log-only mode)");
            return Ok(());
        };

        let message = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| AppError::Internal(anyhow::anyhow!("Bad from address: {}", e)))?,
            )
            .to(to
                .parse()
                .map_err(|_| AppError::BadRequest(format!("Invalid email address: {}", to)))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(text.to_string())
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Email build failed: {}", e)))?;

        transport
            .send(message)
            .await
            .map_err(|e| AppError::Upstream(format!("Email send failed: {}", e)))?;

        tracing::info!(to, subject, "Email sent");
        Ok(())
    }
}

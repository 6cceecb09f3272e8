// SPDX-License-Identifier: MIT

//! WhatsApp Business API client.
//!
//! All sends are best-effort from the caller's perspective: a disabled
//! toggle, missing credentials, or an unusable phone number skip the send
//! with a log line, and API failures surface as errors only so the
//! orchestrator can record the channel outcome.

use crate::config::WhatsAppConfig;
use crate::error::AppError;
use std::time::Duration;

const GRAPH_API_BASE: &str = "https://graph.facebook.com/v20.0";
const SEND_TIMEOUT: Duration = Duration::from_secs(15);

/// WhatsApp Business API client.
#[derive(Clone)]
pub struct WhatsAppClient {
    http: reqwest::Client,
    config: WhatsAppConfig,
}

impl WhatsAppClient {
    pub fn new(config: WhatsAppConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn credentials(&self) -> Option<(&str, &str)> {
        if !self.config.enabled {
            tracing::info!("WhatsApp disabled, skipping send");
            return None;
        }
        match (&self.config.access_token, &self.config.phone_number_id) {
            (Some(token), Some(phone_id)) => Some((token, phone_id)),
            _ => {
                tracing::warn!("WhatsApp credentials missing, skipping send");
                None
            }
        }
    }

    /// Send the approved site-visit confirmation template with the
    /// formatted preferred date as its body parameter.
    ///
    /// Returns `Ok(true)` when a message was sent, `Ok(false)` when the
    /// send was skipped (disabled, unconfigured, or bad recipient).
    pub async fn send_site_visit_template(
        &self,
        to_phone: &str,
        date_text: &str,
    ) -> Result<bool, AppError> {
        let Some((token, phone_id)) = self.credentials() else {
            return Ok(false);
        };
        let Some(to) = normalize_phone(to_phone) else {
            tracing::warn!("Invalid recipient phone, skipping WhatsApp send");
            return Ok(false);
        };

        let payload = serde_json::json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "template",
            "template": {
                "name": self.config.template_name,
                "language": { "code": "en" },
                "components": [{
                    "type": "body",
                    "parameters": [{ "type": "text", "text": date_text }]
                }]
            }
        });

        self.post_message(token, phone_id, &payload).await?;
        Ok(true)
    }

    /// Send a free-text message (only deliverable inside an open
    /// customer-service window).
    pub async fn send_text(&self, to_phone: &str, body: &str) -> Result<bool, AppError> {
        let Some((token, phone_id)) = self.credentials() else {
            return Ok(false);
        };
        let Some(to) = normalize_phone(to_phone) else {
            tracing::warn!("Invalid recipient phone, skipping WhatsApp send");
            return Ok(false);
        };

        let payload = serde_json::json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "text",
            "text": { "body": body }
        });

        self.post_message(token, phone_id, &payload).await?;
        Ok(true)
    }

    async fn post_message(
        &self,
        token: &str,
        phone_id: &str,
        payload: &serde_json::Value,
    ) -> Result<(), AppError> {
        let url = format!("{}/{}/messages", GRAPH_API_BASE, phone_id);
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(payload)
            .timeout(SEND_TIMEOUT)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("WhatsApp request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "WhatsApp API error {}: {}",
                status, body
            )));
        }

        tracing::info!("WhatsApp message sent");
        Ok(())
    }
}

/// Normalize a phone number for the Graph API: digits only, with a `91`
/// country code prefixed onto bare 10-digit (or 0-prefixed 11-digit)
/// Indian numbers. Returns `None` when no digits remain.
pub fn normalize_phone(phone: &str) -> Option<String> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    if digits.len() == 10 {
        return Some(format!("91{}", digits));
    }
    if digits.len() == 11 && digits.starts_with('0') {
        return Some(format!("91{}", &digits[1..]));
    }
    // Assume the country code is already present
    Some(digits)
}

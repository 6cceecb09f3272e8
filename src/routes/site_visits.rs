// SPDX-License-Identifier: MIT

//! Site-visit orchestration.
//!
//! A booking request is validated, persisted, and then fanned out to the
//! notification channels. Persistence is the only hard step: once the
//! record exists the request is accepted, and each downstream channel
//! (email, appointment booking, WhatsApp) reports its own outcome in the
//! response instead of failing the whole request.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::BookingsConfig;
use crate::error::{AppError, Result};
use crate::models::{normalize_transport_required, SiteVisit, SiteVisitStatus};
use crate::services::bookings;
use crate::AppState;

/// Project that requires a pickup address when no explicit scope is
/// configured.
const DEFAULT_PICKUP_SCOPE: &str = "kalpavruksha";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/site-visits", post(create_site_visit))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteVisitRequest {
    #[serde(default)]
    project: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    preferred_date: Option<String>,
    #[serde(default)]
    transport_required: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    pickup_address: Option<String>,
    #[serde(default)]
    pickup_mode: Option<String>,
    #[serde(default)]
    pickup_lat: Option<f64>,
    #[serde(default)]
    pickup_lng: Option<f64>,
}

/// Per-channel fan-out outcomes. `appointment_booked` is `null` when the
/// adapter was skipped (disabled or out-of-scope project).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelOutcomes {
    pub email_sent: bool,
    pub appointment_booked: Option<bool>,
    pub whatsapp_sent: bool,
}

#[derive(Serialize)]
pub struct SiteVisitResponse {
    success: bool,
    data: SiteVisit,
    channels: ChannelOutcomes,
}

/// Accept a booking request: validate, persist, then notify best-effort.
async fn create_site_visit(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SiteVisitRequest>,
) -> Result<(StatusCode, Json<SiteVisitResponse>)> {
    let name = body.name.as_deref().map(str::trim).unwrap_or("");
    let phone = body.phone.as_deref().map(str::trim).unwrap_or("");
    let preferred_date = body.preferred_date.as_deref().map(str::trim).unwrap_or("");
    if name.is_empty() || phone.is_empty() || preferred_date.is_empty() {
        return Err(AppError::BadRequest(
            "name, phone, preferredDate are required".to_string(),
        ));
    }

    let project = body
        .project
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or("Kalpavruksha")
        .to_string();

    let pickup_address = body
        .pickup_address
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string);
    if requires_pickup_address(&state.config.bookings, &project) && pickup_address.is_none() {
        return Err(AppError::BadRequest("pickupAddress is required".to_string()));
    }

    let email = body
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(str::to_string);

    let visit = SiteVisit {
        id: uuid::Uuid::new_v4().to_string(),
        project: project.clone(),
        name: name.to_string(),
        phone: phone.to_string(),
        email: email.clone(),
        preferred_date: preferred_date.to_string(),
        transport_required: normalize_transport_required(body.transport_required.as_deref())
            .to_string(),
        pickup_address,
        pickup_mode: body
            .pickup_mode
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or("manual")
            .to_string(),
        pickup_lat: body.pickup_lat,
        pickup_lng: body.pickup_lng,
        notes: body.notes.clone(),
        status: SiteVisitStatus::Requested,
        created_at: chrono::Utc::now().to_rfc3339(),
    };

    // Durability checkpoint: from here on the request is accepted.
    state.db.create_site_visit(&visit).await?;
    tracing::info!(visit_id = %visit.id, project = %visit.project, "Site visit persisted");

    let date_text = display_date(&state.config.bookings, &visit.preferred_date);

    let email_sent = send_confirmation_emails(&state, &visit, &date_text).await;

    let appointment_booked = match state.bookings.create_appointment(&visit).await {
        Ok(Some(_)) => Some(true),
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(visit_id = %visit.id, error = %e, "Appointment booking failed");
            Some(false)
        }
    };

    let whatsapp_sent = match state
        .whatsapp
        .send_site_visit_template(&visit.phone, &date_text)
        .await
    {
        Ok(sent) => sent,
        Err(e) => {
            tracing::warn!(visit_id = %visit.id, error = %e, "WhatsApp send failed");
            false
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(SiteVisitResponse {
            success: true,
            data: visit,
            channels: ChannelOutcomes {
                email_sent,
                appointment_booked,
                whatsapp_sent,
            },
        }),
    ))
}

/// Whether this project needs a physical pickup address: members of the
/// configured allow-list, or the default project when no list is set.
fn requires_pickup_address(config: &BookingsConfig, project: &str) -> bool {
    let normalized = project.trim().to_lowercase();
    match &config.projects {
        Some(list) => list.contains(&normalized),
        None => normalized == DEFAULT_PICKUP_SCOPE,
    }
}

/// Human-readable preferred date for notification text. Falls back to the
/// raw client string when it does not parse.
fn display_date(config: &BookingsConfig, preferred_date: &str) -> String {
    bookings::format_booking_datetime(preferred_date, config.timezone_offset.as_deref())
        .unwrap_or_else(|_| preferred_date.to_string())
}

/// Send requester and admin notification emails, isolated from the
/// response: failures are logged and reported through the channel outcome.
async fn send_confirmation_emails(state: &AppState, visit: &SiteVisit, date_text: &str) -> bool {
    let mut attempted = false;
    let mut all_sent = true;

    if let Some(to) = &visit.email {
        attempted = true;
        let user_msg = format!(
            "Hi {},\n\nWe received your site visit request for {}.\n\
             Preferred date/time: {}.\n\
             Our team will contact you shortly to confirm.\n\n- Easy Homes",
            visit.name, visit.project, date_text
        );
        if let Err(e) = state
            .mailer
            .send(
                to,
                &format!("We received your site visit request - {}", visit.project),
                &user_msg,
            )
            .await
        {
            tracing::warn!(visit_id = %visit.id, error = %e, "Requester email failed");
            all_sent = false;
        }
    }

    if let Some(admin) = &state.config.admin_email {
        attempted = true;
        let coordinates = match (visit.pickup_lat, visit.pickup_lng) {
            (Some(lat), Some(lng)) => format!("{}, {}", lat, lng),
            _ => "-".to_string(),
        };
        let admin_msg = format!(
            "New Site Visit Request\nProject: {}\nName: {}\nPhone: {}\nEmail: {}\n\
             Preferred: {}\nTransport Required: {}\nPickup Address: {}\n\
             Pickup Mode: {}\nPickup Coordinates: {}\nNotes: {}",
            visit.project,
            visit.name,
            visit.phone,
            visit.email.as_deref().unwrap_or("-"),
            date_text,
            visit.transport_required,
            visit.pickup_address.as_deref().unwrap_or("-"),
            visit.pickup_mode,
            coordinates,
            visit.notes.as_deref().unwrap_or("-"),
        );
        if let Err(e) = state
            .mailer
            .send(admin, &format!("New Site Visit - {}", visit.project), &admin_msg)
            .await
        {
            tracing::warn!(visit_id = %visit.id, error = %e, "Admin email failed");
            all_sent = false;
        }
    }

    attempted && all_sent
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pickup_scope_defaults_to_kalpavruksha() {
        let config = BookingsConfig::default();
        assert!(requires_pickup_address(&config, "Kalpavruksha"));
        assert!(requires_pickup_address(&config, " kalpavruksha "));
        assert!(!requires_pickup_address(&config, "Green Meadows"));
    }

    #[test]
    fn test_pickup_scope_follows_configured_list() {
        let config = BookingsConfig {
            projects: Some(vec!["green meadows".to_string()]),
            ..BookingsConfig::default()
        };
        assert!(requires_pickup_address(&config, "Green Meadows"));
        assert!(!requires_pickup_address(&config, "Kalpavruksha"));
    }

    #[test]
    fn test_display_date_falls_back_to_raw() {
        let config = BookingsConfig::default();
        assert_eq!(
            display_date(&config, "2026-03-05T14:30"),
            "05-Mar-2026 14:30:00"
        );
        assert_eq!(display_date(&config, "whenever works"), "whenever works");
    }
}

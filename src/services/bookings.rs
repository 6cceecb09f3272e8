// SPDX-License-Identifier: MIT

//! Zoho Bookings adapter.
//!
//! Maps a persisted site-visit request onto the Zoho Bookings appointment
//! API. Auth is either a static token or an OAuth refresh-token flow with
//! an in-memory single-slot token cache owned by the adapter instance.
//!
//! The adapter short-circuits to `Ok(None)` when disabled by configuration
//! or when the project is outside the allow-list; it never touches the
//! network in those cases.

use crate::config::BookingsConfig;
use crate::error::AppError;
use crate::models::SiteVisit;
use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::Mutex;

const REFRESH_TIMEOUT: StdDuration = StdDuration::from_secs(15);
const BOOKING_TIMEOUT: StdDuration = StdDuration::from_secs(20);

/// Margin before provider-declared expiry at which a cached token is
/// considered stale (60 seconds).
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

// ─── Token cache ─────────────────────────────────────────────────────────

/// An access token derived from the refresh flow.
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub access_token: String,
    pub api_domain: String,
    pub expires_at: DateTime<Utc>,
}

/// Single-slot token cache with a refresh-or-reuse method.
///
/// Owned by the adapter instance rather than living as a module global, so
/// tests can drive it with a fake clock and token source.
#[derive(Default)]
pub struct TokenCache {
    slot: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    /// Return the cached token if it is still valid at `now`, otherwise run
    /// `refresh` and cache its result. The lock serializes concurrent
    /// refreshes within this process.
    pub async fn get_or_refresh<F, Fut>(
        &self,
        now: DateTime<Utc>,
        refresh: F,
    ) -> Result<CachedToken, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<CachedToken, AppError>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(token) = slot.as_ref() {
            if now < token.expires_at {
                return Ok(token.clone());
            }
        }
        let token = refresh().await?;
        *slot = Some(token.clone());
        Ok(token)
    }
}

// ─── Adapter ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: Option<String>,
    api_domain: Option<String>,
    expires_in: Option<i64>,
}

/// Zoho Bookings API adapter.
#[derive(Clone)]
pub struct ZohoBookings {
    http: reqwest::Client,
    config: BookingsConfig,
    token_cache: Arc<TokenCache>,
}

impl ZohoBookings {
    pub fn new(config: BookingsConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            token_cache: Arc::new(TokenCache::default()),
        }
    }

    /// Create an appointment for a persisted site visit.
    ///
    /// Returns `Ok(None)` without any network call when the adapter is
    /// disabled or the project is outside the allow-list. A provider
    /// rejection is an error even when the HTTP call itself returned 200.
    pub async fn create_appointment(
        &self,
        visit: &SiteVisit,
    ) -> Result<Option<serde_json::Value>, AppError> {
        if !self.config.enabled {
            tracing::debug!("Zoho Bookings disabled, skipping appointment");
            return Ok(None);
        }
        if !self.config.project_allowed(&visit.project) {
            tracing::debug!(project = %visit.project, "Project outside Zoho Bookings scope, skipping");
            return Ok(None);
        }

        self.config
            .validate()
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

        let (access_token, api_domain) = self.access_token().await?;

        let from_time = format_booking_datetime(
            &visit.preferred_date,
            self.config.timezone_offset.as_deref(),
        )?;

        let customer_details = serde_json::json!({
            "name": visit.name.trim(),
            "phone_number": visit.phone.trim(),
            "email": visit.email.as_deref().map(str::trim),
        });

        let additional_fields = self.build_additional_fields(visit);
        let notes = build_notes(visit);

        // service_id is guaranteed by validate() above
        let service_id = self.config.service_id.clone().unwrap_or_default();
        let mut form = reqwest::multipart::Form::new()
            .text("service_id", service_id)
            .text("from_time", from_time.clone());

        if let Some(staff_id) = &self.config.staff_id {
            form = form.text("staff_id", staff_id.clone());
        } else if let Some(resource_id) = &self.config.resource_id {
            form = form.text("resource_id", resource_id.clone());
        } else if let Some(group_id) = &self.config.group_id {
            form = form.text("group_id", group_id.clone());
        }

        if let Some(timezone) = &self.config.timezone {
            form = form.text("timezone", timezone.clone());
        }

        form = form.text("customer_details", customer_details.to_string());
        if let Some(fields) = additional_fields {
            form = form.text("additional_fields", fields.to_string());
        }
        if let Some(notes) = notes {
            form = form.text("notes", notes);
        }

        let url = format!(
            "{}/bookings/v1/json/appointment",
            api_domain.trim_end_matches('/')
        );

        tracing::info!(url = %url, from_time = %from_time, "Creating Zoho appointment");

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Zoho-oauthtoken {}", access_token))
            .multipart(form)
            .timeout(BOOKING_TIMEOUT)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Zoho Bookings request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "Zoho Bookings HTTP {}: {}",
                status, body
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Zoho Bookings JSON parse error: {}", e)))?;

        classify_booking_response(&body)?;
        Ok(Some(body))
    }

    /// Resolve a usable (token, api_domain) pair: refresh flow with the
    /// cached token when configured, static token otherwise.
    async fn access_token(&self) -> Result<(String, String), AppError> {
        if self.config.has_refresh_flow() {
            let token = self
                .token_cache
                .get_or_refresh(Utc::now(), || self.refresh_access_token())
                .await?;
            return Ok((token.access_token, token.api_domain));
        }

        match (&self.config.access_token, &self.config.api_domain) {
            (Some(token), Some(domain)) => Ok((token.clone(), domain.clone())),
            _ => Err(AppError::Internal(anyhow::anyhow!(
                "Zoho access token unavailable: neither refresh flow nor static token configured"
            ))),
        }
    }

    /// Exchange the refresh token for a fresh access token.
    async fn refresh_access_token(&self) -> Result<CachedToken, AppError> {
        let accounts_url = self
            .config
            .accounts_url
            .as_deref()
            .unwrap_or_default()
            .trim_end_matches('/')
            .to_string();
        let url = format!("{}/oauth/v2/token", accounts_url);

        tracing::info!(url = %url, "Refreshing Zoho access token");

        let response = self
            .http
            .post(&url)
            .form(&[
                (
                    "refresh_token",
                    self.config.refresh_token.as_deref().unwrap_or_default(),
                ),
                (
                    "client_id",
                    self.config.client_id.as_deref().unwrap_or_default(),
                ),
                (
                    "client_secret",
                    self.config.client_secret.as_deref().unwrap_or_default(),
                ),
                ("grant_type", "refresh_token"),
            ])
            .timeout(REFRESH_TIMEOUT)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Zoho token refresh failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "Zoho token refresh HTTP {}: {}",
                status, body
            )));
        }

        let parsed: RefreshResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Zoho token response parse error: {}", e)))?;

        let access_token = parsed.access_token.ok_or_else(|| {
            AppError::Upstream("Zoho token refresh failed: access_token missing".to_string())
        })?;
        let api_domain = parsed
            .api_domain
            .or_else(|| self.config.api_domain.clone())
            .ok_or_else(|| {
                AppError::Upstream(
                    "Zoho token refresh failed: api_domain missing and not configured".to_string(),
                )
            })?;

        let expires_in = parsed.expires_in.unwrap_or(0);
        let ttl = (expires_in - TOKEN_EXPIRY_MARGIN_SECS).max(TOKEN_EXPIRY_MARGIN_SECS);

        Ok(CachedToken {
            access_token,
            api_domain,
            expires_at: Utc::now() + Duration::seconds(ttl),
        })
    }

    fn build_additional_fields(&self, visit: &SiteVisit) -> Option<serde_json::Value> {
        let mut fields = serde_json::Map::new();

        fields.insert(
            self.config.transport_field.clone(),
            serde_json::Value::String(visit.transport_required.clone()),
        );

        if visit.pickup_address.is_some() || visit.pickup_lat.is_some() || visit.pickup_lng.is_some()
        {
            let address = parse_pickup_address(
                visit.pickup_address.as_deref(),
                visit.pickup_lat,
                visit.pickup_lng,
            );
            fields.insert(
                self.config.pickup_field.clone(),
                serde_json::to_value(address).unwrap_or(serde_json::Value::Null),
            );
        }

        Some(serde_json::Value::Object(fields))
    }
}

// ─── Date formatting ─────────────────────────────────────────────────────

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Format a preferred date for the Zoho `from_time` field
/// (`DD-Mon-YYYY HH:MM:SS`).
///
/// Naive strings are treated as wall-clock in the provider's timezone and
/// formatted verbatim. Strings carrying an offset or `Z` are converted
/// through the configured display offset (UTC when unset) first.
pub fn format_booking_datetime(raw: &str, display_offset: Option<&str>) -> Result<String, AppError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(AppError::BadRequest(
            "preferredDate is required to create an appointment".to_string(),
        ));
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(naive.format("%d-%b-%Y %H:%M:%S").to_string());
        }
    }

    let parsed = DateTime::parse_from_rfc3339(value)
        .map_err(|_| AppError::BadRequest(format!("Invalid preferredDate: {}", raw)))?;

    let offset = display_offset
        .and_then(parse_utc_offset)
        .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());

    Ok(parsed
        .with_timezone(&offset)
        .format("%d-%b-%Y %H:%M:%S")
        .to_string())
}

/// Parse a `+05:30` / `-0800` style offset into a `FixedOffset`.
fn parse_utc_offset(raw: &str) -> Option<FixedOffset> {
    let raw = raw.trim();
    let (sign, rest) = match raw.chars().next()? {
        '+' => (1, &raw[1..]),
        '-' => (-1, &raw[1..]),
        _ => (1, raw),
    };
    let digits: String = rest.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 4 {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

// ─── Address decomposition ───────────────────────────────────────────────

/// Zoho Address custom-field payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressFields {
    pub addr_1: String,
    pub addr_2: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub postal: String,
}

impl AddressFields {
    fn placeholder(addr_1: String) -> Self {
        Self {
            addr_1,
            addr_2: String::new(),
            city: String::new(),
            state: String::new(),
            country: "India".to_string(),
            postal: String::new(),
        }
    }
}

/// Heuristically split a free-text pickup address into Zoho address
/// components. Best-effort enrichment: arbitrary input degrades to a
/// descriptive placeholder, never an error.
pub fn parse_pickup_address(
    address: Option<&str>,
    lat: Option<f64>,
    lng: Option<f64>,
) -> AddressFields {
    let raw = address.unwrap_or("").trim().to_string();
    let fallback = match (lat, lng) {
        (Some(lat), Some(lng)) => Some(format!("Selected location near {:.6}, {:.6}", lat, lng)),
        _ => None,
    };
    let text = if raw.is_empty() {
        fallback.unwrap_or_else(|| "Pickup address not provided".to_string())
    } else {
        raw
    };
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if text.to_lowercase().starts_with("selected location near") {
        return AddressFields::placeholder(text);
    }
    if is_coordinate_pair(&text) {
        return AddressFields::placeholder(format!("Selected location near {}", text));
    }

    let mut parts: Vec<String> = text
        .split(',')
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect();

    // Scan from the end for a 6-digit postal code.
    let mut postal = String::new();
    for index in (0..parts.len()).rev() {
        if let Some((code, remainder)) = extract_postal_code(&parts[index]) {
            postal = code;
            if remainder.is_empty() {
                parts.remove(index);
            } else {
                parts[index] = remainder;
            }
            break;
        }
    }

    let last_is_country = parts.last().is_some_and(|last| {
        let lower = last.to_lowercase();
        lower.contains("india") || lower.contains("bharat")
    });
    let country = if last_is_country {
        parts.pop().unwrap_or_default()
    } else {
        "India".to_string()
    };

    let state = if parts.len() >= 2 {
        parts.pop().unwrap_or_default()
    } else {
        String::new()
    };
    let city = if !parts.is_empty() {
        parts.pop().unwrap_or_default()
    } else {
        String::new()
    };
    let addr_1 = if !parts.is_empty() {
        parts.remove(0)
    } else {
        text.clone()
    };
    let addr_2 = parts.join(", ");

    AddressFields {
        addr_1,
        addr_2,
        city,
        state,
        country,
        postal,
    }
}

/// Whether the string is a bare `lat,lng` pair.
fn is_coordinate_pair(text: &str) -> bool {
    let parts: Vec<&str> = text.split(',').map(str::trim).collect();
    parts.len() == 2 && parts.iter().all(|p| p.parse::<f64>().is_ok())
}

/// Find a standalone 6-digit run in the segment; returns the code and the
/// segment with it removed.
fn extract_postal_code(segment: &str) -> Option<(String, String)> {
    let chars: Vec<char> = segment.chars().collect();
    let mut start = 0;
    while start < chars.len() {
        if !chars[start].is_ascii_digit() {
            start += 1;
            continue;
        }
        let mut end = start;
        while end < chars.len() && chars[end].is_ascii_digit() {
            end += 1;
        }
        if end - start == 6 {
            let code: String = chars[start..end].iter().collect();
            let remainder: String = chars[..start]
                .iter()
                .chain(chars[end..].iter())
                .collect::<String>()
                .trim()
                .to_string();
            return Some((code, remainder));
        }
        start = end;
    }
    None
}

// ─── Response classification ─────────────────────────────────────────────

const FAILURE_MARKERS: &[&str] = &[
    "slot not found",
    "not available",
    "mandatory",
    "invalid",
    "service not found",
    "error",
];

/// Markers whose presence means the provider actually created a booking.
fn looks_like_created_appointment(value: &serde_json::Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    ["booking_id", "summary_url", "customer_booking_start_time", "iso_start_time", "start_time"]
        .iter()
        .any(|key| match obj.get(*key) {
            None | Some(serde_json::Value::Null) => false,
            Some(serde_json::Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        })
}

/// Inspect a 200-class booking response and reject provider-reported
/// failures that hide behind a successful HTTP status.
fn classify_booking_response(body: &serde_json::Value) -> Result<(), AppError> {
    let response = body.get("response").unwrap_or(&serde_json::Value::Null);

    let status = response
        .get("status")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim()
        .to_lowercase();
    if !status.is_empty() && status != "success" {
        return Err(AppError::Upstream(format!(
            "Zoho Bookings response status: {}",
            status
        )));
    }

    let return_value = response
        .get("returnvalue")
        .unwrap_or(&serde_json::Value::Null);
    if return_value.is_null() {
        return Ok(());
    }

    if looks_like_created_appointment(return_value) {
        return Ok(());
    }

    let rv_status = return_value
        .get("status")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim()
        .to_lowercase();
    let message = return_value
        .get("message")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim()
        .to_lowercase();

    if rv_status == "failure" || rv_status == "error" {
        return Err(AppError::Upstream(if message.is_empty() {
            "Zoho Bookings rejected appointment payload".to_string()
        } else {
            message
        }));
    }

    if FAILURE_MARKERS.iter().any(|marker| message.contains(marker)) {
        return Err(AppError::Upstream(message));
    }

    Ok(())
}

/// Assemble the appointment notes block from the visit's auxiliary fields.
fn build_notes(visit: &SiteVisit) -> Option<String> {
    let mut lines = Vec::new();
    lines.push(format!("Project: {}", visit.project));
    lines.push(format!("Pickup mode: {}", visit.pickup_mode));
    if let (Some(lat), Some(lng)) = (visit.pickup_lat, visit.pickup_lng) {
        lines.push(format!("Pickup coordinates: {}, {}", lat, lng));
    }
    if let Some(notes) = &visit.notes {
        if !notes.trim().is_empty() {
            lines.push(format!("Notes: {}", notes));
        }
    }
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_naive_datetime_formats_as_wall_clock() {
        assert_eq!(
            format_booking_datetime("2026-03-05T14:30", None).unwrap(),
            "05-Mar-2026 14:30:00"
        );
        assert_eq!(
            format_booking_datetime("2026-03-05 09:05:07", None).unwrap(),
            "05-Mar-2026 09:05:07"
        );
    }

    #[test]
    fn test_offset_datetime_converts_through_display_offset() {
        // 09:00 UTC = 14:30 IST
        assert_eq!(
            format_booking_datetime("2026-03-05T09:00:00Z", Some("+05:30")).unwrap(),
            "05-Mar-2026 14:30:00"
        );
    }

    #[test]
    fn test_invalid_datetime_is_rejected() {
        assert!(format_booking_datetime("next tuesday", None).is_err());
        assert!(format_booking_datetime("", None).is_err());
    }

    #[test]
    fn test_parse_full_address() {
        let parsed = parse_pickup_address(
            Some("12 MG Road, Indiranagar, Bengaluru, Karnataka 560038, India"),
            None,
            None,
        );
        assert_eq!(parsed.addr_1, "12 MG Road");
        assert_eq!(parsed.addr_2, "Indiranagar");
        assert_eq!(parsed.city, "Bengaluru");
        assert_eq!(parsed.state, "Karnataka");
        assert_eq!(parsed.country, "India");
        assert_eq!(parsed.postal, "560038");
    }

    #[test]
    fn test_parse_coordinate_pair_degrades_to_placeholder() {
        let parsed = parse_pickup_address(Some("12.9716, 77.5946"), None, None);
        assert_eq!(parsed.addr_1, "Selected location near 12.9716, 77.5946");
        assert_eq!(parsed.country, "India");
        assert!(parsed.postal.is_empty());
    }

    #[test]
    fn test_parse_missing_address_uses_coordinates() {
        let parsed = parse_pickup_address(None, Some(12.9716), Some(77.5946));
        assert_eq!(parsed.addr_1, "Selected location near 12.971600, 77.594600");
    }

    #[test]
    fn test_parse_missing_everything() {
        let parsed = parse_pickup_address(None, None, None);
        assert_eq!(parsed.addr_1, "Pickup address not provided");
    }

    #[test]
    fn test_parse_never_panics_on_junk() {
        for junk in [",,,,", "1234567890", "🏠", "a,b", "  ", "560038"] {
            let _ = parse_pickup_address(Some(junk), None, None);
        }
    }

    #[test]
    fn test_classify_accepts_created_booking() {
        let body = serde_json::json!({
            "response": {
                "status": "success",
                "returnvalue": { "booking_id": "ZB-1", "start_time": "05-Mar-2026 14:30:00" }
            }
        });
        assert!(classify_booking_response(&body).is_ok());
    }

    #[test]
    fn test_classify_rejects_failure_status() {
        let body = serde_json::json!({
            "response": { "status": "failure", "returnvalue": {} }
        });
        assert!(classify_booking_response(&body).is_err());
    }

    #[test]
    fn test_classify_rejects_failure_payload_behind_http_200() {
        let body = serde_json::json!({
            "response": {
                "status": "success",
                "returnvalue": { "status": "failure", "message": "Slot not found" }
            }
        });
        assert!(classify_booking_response(&body).is_err());
    }

    #[test]
    fn test_classify_rejects_failure_like_message() {
        let body = serde_json::json!({
            "response": {
                "status": "success",
                "returnvalue": { "message": "from_time is mandatory" }
            }
        });
        assert!(classify_booking_response(&body).is_err());
    }

    #[tokio::test]
    async fn test_token_cache_reuses_until_expiry() {
        let cache = TokenCache::default();
        let now = Utc::now();

        let token = cache
            .get_or_refresh(now, || async {
                Ok(CachedToken {
                    access_token: "first".to_string(),
                    api_domain: "https://www.zohoapis.in".to_string(),
                    expires_at: now + Duration::seconds(3600),
                })
            })
            .await
            .unwrap();
        assert_eq!(token.access_token, "first");

        // Still valid: the refresh closure must not run.
        let token = cache
            .get_or_refresh(now + Duration::seconds(10), || async {
                panic!("refresh should not be called while token is valid")
            })
            .await
            .unwrap();
        assert_eq!(token.access_token, "first");

        // Past expiry: refreshed.
        let token = cache
            .get_or_refresh(now + Duration::seconds(3601), || async {
                Ok(CachedToken {
                    access_token: "second".to_string(),
                    api_domain: "https://www.zohoapis.in".to_string(),
                    expires_at: now + Duration::seconds(7200),
                })
            })
            .await
            .unwrap();
        assert_eq!(token.access_token, "second");
    }

    #[tokio::test]
    async fn test_disabled_adapter_short_circuits() {
        let adapter = ZohoBookings::new(BookingsConfig::default());
        let visit = crate::models::SiteVisit {
            id: "v1".to_string(),
            project: "Kalpavruksha".to_string(),
            name: "A".to_string(),
            phone: "9876543210".to_string(),
            email: None,
            preferred_date: "2026-03-05T14:30".to_string(),
            transport_required: "Yes".to_string(),
            pickup_address: None,
            pickup_mode: "manual".to_string(),
            pickup_lat: None,
            pickup_lng: None,
            notes: None,
            status: crate::models::SiteVisitStatus::Requested,
            created_at: Utc::now().to_rfc3339(),
        };
        let result = adapter.create_appointment(&visit).await.unwrap();
        assert!(result.is_none());
    }
}

// SPDX-License-Identifier: MIT

//! Application configuration loaded from environment variables.
//!
//! Everything is read once at startup; optional integrations (SMTP,
//! WhatsApp, Zoho Bookings, geocoding) stay disabled when their variables
//! are absent instead of failing the boot.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Frontend origin for CORS and reset-password links
    pub frontend_url: String,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Redis URL; cache stays disabled when unset
    pub redis_url: Option<String>,
    /// Admin address for site-visit notifications
    pub admin_email: Option<String>,
    /// SMTP transport settings; email is log-only when unset
    pub smtp: Option<SmtpConfig>,
    /// WhatsApp Business API settings
    pub whatsapp: WhatsAppConfig,
    /// Zoho Bookings settings
    pub bookings: BookingsConfig,
    /// Google Maps geocoding API key
    pub maps_api_key: Option<String>,
}

/// SMTP credentials for outbound mail.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// From address, e.g. `"Easy Homes" <no-reply@easyhomess.com>`
    pub from: String,
}

/// WhatsApp Business API settings.
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    pub enabled: bool,
    pub access_token: Option<String>,
    pub phone_number_id: Option<String>,
    /// Approved template name for site-visit confirmations
    pub template_name: String,
}

/// Zoho Bookings settings. Auth is either a static token + API domain or
/// an OAuth refresh-token flow; `validate()` enforces that one of the two
/// is complete before any appointment call.
#[derive(Debug, Clone, Default)]
pub struct BookingsConfig {
    pub enabled: bool,
    /// Lowercased project allow-list; also the pickup-address scope.
    /// `None` means all projects are allowed.
    pub projects: Option<Vec<String>>,
    pub service_id: Option<String>,
    pub staff_id: Option<String>,
    pub resource_id: Option<String>,
    pub group_id: Option<String>,
    /// IANA timezone label forwarded to Zoho (e.g. `Asia/Kolkata`)
    pub timezone: Option<String>,
    /// Fixed UTC offset (`+05:30`) used to render offset-carrying
    /// preferred dates as provider wall-clock time
    pub timezone_offset: Option<String>,
    // Static-token auth
    pub access_token: Option<String>,
    pub api_domain: Option<String>,
    // Refresh-token auth
    pub accounts_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    /// Custom field label for the pickup address on the booking form
    pub pickup_field: String,
    /// Custom field label for the transport-required flag
    pub transport_field: String,
}

impl BookingsConfig {
    pub fn has_static_token(&self) -> bool {
        self.access_token.is_some() && self.api_domain.is_some()
    }

    pub fn has_refresh_flow(&self) -> bool {
        self.accounts_url.is_some()
            && self.client_id.is_some()
            && self.client_secret.is_some()
            && self.refresh_token.is_some()
    }

    /// Check that the enabled adapter has enough configuration to book.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_id.is_none() {
            return Err(ConfigError::Missing("ZOHO_BOOKINGS_SERVICE_ID"));
        }
        if self.staff_id.is_none() && self.resource_id.is_none() && self.group_id.is_none() {
            return Err(ConfigError::Invalid(
                "Zoho Bookings requires one of ZOHO_BOOKINGS_STAFF_ID, \
                 ZOHO_BOOKINGS_RESOURCE_ID, or ZOHO_BOOKINGS_GROUP_ID",
            ));
        }
        if !self.has_static_token() && !self.has_refresh_flow() {
            return Err(ConfigError::Invalid(
                "Zoho Bookings auth config missing: set either \
                 ZOHO_BOOKINGS_ACCESS_TOKEN + ZOHO_BOOKINGS_API_DOMAIN, or \
                 ZOHO_ACCOUNTS_URL + ZOHO_BOOKINGS_CLIENT_ID + \
                 ZOHO_BOOKINGS_CLIENT_SECRET + ZOHO_BOOKINGS_REFRESH_TOKEN",
            ));
        }
        Ok(())
    }

    /// Whether the given project passes the allow-list.
    pub fn project_allowed(&self, project: &str) -> bool {
        match &self.projects {
            None => true,
            Some(list) => list.contains(&project.trim().to_lowercase()),
        }
    }
}

/// Truthy env flag: `true`, `1`, `yes`, `on` (case-insensitive).
fn env_flag(name: &str) -> bool {
    matches!(
        env::var(name).unwrap_or_default().trim().to_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let smtp = match env_opt("SMTP_HOST") {
            Some(host) => Some(SmtpConfig {
                host,
                port: env_opt("SMTP_PORT")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(587),
                username: env_opt("SMTP_USER").ok_or(ConfigError::Missing("SMTP_USER"))?,
                password: env_opt("SMTP_PASS").ok_or(ConfigError::Missing("SMTP_PASS"))?,
                from: env_opt("SMTP_FROM").ok_or(ConfigError::Missing("SMTP_FROM"))?,
            }),
            None => None,
        };

        let whatsapp = WhatsAppConfig {
            enabled: env_flag("WHATSAPP_ENABLED"),
            access_token: env_opt("WHATSAPP_ACCESS_TOKEN"),
            phone_number_id: env_opt("WHATSAPP_PHONE_NUMBER_ID"),
            template_name: env_opt("WHATSAPP_SITE_VISIT_TEMPLATE")
                .unwrap_or_else(|| "site_visit_confirmation".to_string()),
        };

        let bookings = BookingsConfig {
            enabled: env_flag("ZOHO_BOOKINGS_ENABLED"),
            projects: env_opt("ZOHO_BOOKINGS_PROJECTS").map(parse_project_list),
            service_id: env_opt("ZOHO_BOOKINGS_SERVICE_ID"),
            staff_id: env_opt("ZOHO_BOOKINGS_STAFF_ID"),
            resource_id: env_opt("ZOHO_BOOKINGS_RESOURCE_ID"),
            group_id: env_opt("ZOHO_BOOKINGS_GROUP_ID"),
            timezone: env_opt("ZOHO_BOOKINGS_TIMEZONE"),
            timezone_offset: env_opt("ZOHO_BOOKINGS_TZ_OFFSET"),
            access_token: env_opt("ZOHO_BOOKINGS_ACCESS_TOKEN"),
            api_domain: env_opt("ZOHO_BOOKINGS_API_DOMAIN"),
            accounts_url: env_opt("ZOHO_ACCOUNTS_URL"),
            client_id: env_opt("ZOHO_BOOKINGS_CLIENT_ID"),
            client_secret: env_opt("ZOHO_BOOKINGS_CLIENT_SECRET"),
            refresh_token: env_opt("ZOHO_BOOKINGS_REFRESH_TOKEN"),
            pickup_field: env_opt("ZOHO_BOOKINGS_PICKUP_ADDRESS_FIELD")
                .unwrap_or_else(|| "Pickup Address".to_string()),
            transport_field: env_opt("ZOHO_BOOKINGS_TRANSPORT_FIELD")
                .unwrap_or_else(|| "Need Transport".to_string()),
        };

        Ok(Self {
            port: env_opt("PORT").and_then(|v| v.parse().ok()).unwrap_or(5000),
            frontend_url: env_opt("FRONTEND_URL")
                .unwrap_or_else(|| "http://localhost:5173".to_string()),
            gcp_project_id: env_opt("GCP_PROJECT_ID")
                .unwrap_or_else(|| "local-dev".to_string()),
            jwt_signing_key: env_opt("JWT_SECRET")
                .ok_or(ConfigError::Missing("JWT_SECRET"))?
                .into_bytes(),
            redis_url: env_opt("REDIS_URL"),
            admin_email: env_opt("ADMIN_EMAIL"),
            smtp,
            whatsapp,
            bookings,
            maps_api_key: env_opt("GOOGLE_MAPS_API_KEY"),
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            port: 5000,
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            redis_url: None,
            admin_email: None,
            smtp: None,
            whatsapp: WhatsAppConfig {
                enabled: false,
                access_token: None,
                phone_number_id: None,
                template_name: "site_visit_confirmation".to_string(),
            },
            bookings: BookingsConfig {
                pickup_field: "Pickup Address".to_string(),
                transport_field: "Need Transport".to_string(),
                ..BookingsConfig::default()
            },
            maps_api_key: None,
        }
    }
}

fn parse_project_list(raw: String) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_lowercase())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("{0}")]
    Invalid(&'static str),
}

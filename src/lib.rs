// SPDX-License-Identifier: MIT

//! Easy Homes API: lead-capture backend for a real-estate frontend.
//!
//! Covers email/password + OTP authentication, social login, saved
//! listings, profile management, site-visit booking with fan-out to
//! email/WhatsApp/Zoho Bookings, and batch geocoding.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use cache::CacheStore;
use config::Config;
use db::FirestoreDb;
use services::bookings::ZohoBookings;
use services::email::Mailer;
use services::geocode::Geocoder;
use services::whatsapp::WhatsAppClient;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub cache: CacheStore,
    pub mailer: Mailer,
    pub whatsapp: WhatsAppClient,
    pub bookings: ZohoBookings,
    /// Absent when no geocoding API key is configured.
    pub geocoder: Option<Geocoder>,
}

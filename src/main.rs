// SPDX-License-Identifier: MIT

//! Easy Homes API Server
//!
//! Lead-capture backend: authentication (password + OTP + social),
//! saved listings, site-visit booking with email/WhatsApp/Zoho Bookings
//! fan-out, and geocoding.

use easyhomes_api::{
    cache::CacheStore,
    config::Config,
    db::FirestoreDb,
    services::{
        bookings::ZohoBookings, email::Mailer, geocode::Geocoder, whatsapp::WhatsAppClient,
    },
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Easy Homes API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .expect("Failed to connect to Firestore");

    // Connect the cache; Redis being down only disables caching
    let cache = match &config.redis_url {
        Some(url) => CacheStore::connect(url).await,
        None => {
            tracing::info!("REDIS_URL not set, cache disabled");
            CacheStore::disabled()
        }
    };

    let mailer = Mailer::new(config.smtp.as_ref()).expect("Failed to initialize mailer");
    let whatsapp = WhatsAppClient::new(config.whatsapp.clone());
    let bookings = ZohoBookings::new(config.bookings.clone());
    let geocoder = config
        .maps_api_key
        .clone()
        .map(|key| Geocoder::new(key, cache.clone()));

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        cache,
        mailer,
        whatsapp,
        bookings,
        geocoder,
    });

    // Build router
    let app = easyhomes_api::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("easyhomes_api=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}

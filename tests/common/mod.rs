// SPDX-License-Identifier: MIT

use easyhomes_api::cache::CacheStore;
use easyhomes_api::config::Config;
use easyhomes_api::db::FirestoreDb;
use easyhomes_api::middleware::auth::create_jwt;
use easyhomes_api::routes::create_router;
use easyhomes_api::services::{bookings::ZohoBookings, email::Mailer, whatsapp::WhatsAppClient};
use easyhomes_api::AppState;
use std::sync::Arc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Create a test app with the given database and cache; all outbound
/// channels stay disabled (log-only mailer, disabled WhatsApp/Zoho).
#[allow(dead_code)]
pub fn create_test_app_with(db: FirestoreDb, cache: CacheStore) -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();

    let state = Arc::new(AppState {
        whatsapp: WhatsAppClient::new(config.whatsapp.clone()),
        bookings: ZohoBookings::new(config.bookings.clone()),
        config,
        db,
        cache,
        mailer: Mailer::disabled(),
        geocoder: None,
    });

    (create_router(state.clone()), state)
}

/// Create a test app with the given database and no cache.
#[allow(dead_code)]
pub fn create_test_app_with_db(db: FirestoreDb) -> (axum::Router, Arc<AppState>) {
    create_test_app_with(db, CacheStore::disabled())
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_test_app_with_db(test_db_offline())
}

/// Mint a session token the app will accept.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: &str, email: &str, signing_key: &[u8]) -> String {
    create_jwt(user_id, email, signing_key).expect("Failed to create test JWT")
}

// SPDX-License-Identifier: MIT

//! Cache invalidation on mutating routes.
//!
//! These use the in-memory cache backend and run fully offline: the auth
//! middleware resolves the user from a seeded `user:<id>` entry, and the
//! favourites routes only touch Firestore when the set actually changes,
//! so an idempotent no-op mutation exercises the invalidation path with
//! the database mock untouched.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use easyhomes_api::cache::{self, CacheStore};
use easyhomes_api::models::User;
use easyhomes_api::services::password;
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;

fn seeded_user() -> User {
    let mut user = User::new_local(
        "Cached",
        "cached@example.com",
        password::hash_password("p1").unwrap(),
    );
    user.is_verified = true;
    user.favorites = vec!["MLS-1".to_string()];
    user
}

async fn seed(cache: &CacheStore, user: &User) {
    cache
        .set_json(&cache::user_key(&user.id), user, cache::USER_TTL)
        .await;
    cache
        .set_json(
            &cache::favourites_key(&user.id),
            &user.favorites,
            cache::FAVOURITES_TTL,
        )
        .await;
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    token: &str,
) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_cached_user_satisfies_auth_without_store() {
    let (app, state) =
        common::create_test_app_with(common::test_db_offline(), CacheStore::in_memory());
    let user = seeded_user();
    seed(&state.cache, &user).await;
    let token = common::create_test_jwt(&user.id, &user.email, &state.config.jwt_signing_key);

    let (status, body) = send(&app, "GET", "/api/profile", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], json!(user.email));
}

#[tokio::test]
async fn test_favourites_read_is_cache_first() {
    let (app, state) =
        common::create_test_app_with(common::test_db_offline(), CacheStore::in_memory());
    let user = seeded_user();
    seed(&state.cache, &user).await;
    let token = common::create_test_jwt(&user.id, &user.email, &state.config.jwt_signing_key);

    let (status, body) = send(&app, "GET", "/api/favourites", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!(["MLS-1"]));
}

#[tokio::test]
async fn test_favourites_mutation_invalidates_both_keys() {
    let (app, state) =
        common::create_test_app_with(common::test_db_offline(), CacheStore::in_memory());
    let user = seeded_user();
    seed(&state.cache, &user).await;
    let token = common::create_test_jwt(&user.id, &user.email, &state.config.jwt_signing_key);

    // Removing an id that is not saved is an idempotent no-op for the
    // store, but the route must still drop both cached projections
    // before responding.
    let (status, body) = send(&app, "DELETE", "/api/favourites/MLS-9", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!(["MLS-1"]));

    let cached_user: Option<User> = state.cache.get_json(&cache::user_key(&user.id)).await;
    assert!(cached_user.is_none(), "user:<id> must be invalidated");
    let cached_favourites: Option<Vec<String>> = state
        .cache
        .get_json(&cache::favourites_key(&user.id))
        .await;
    assert!(
        cached_favourites.is_none(),
        "favourites:<id> must be invalidated"
    );
}

// SPDX-License-Identifier: MIT

//! Saved-listing routes. All endpoints require a bearer token; the
//! authenticated user is injected by the auth middleware.

use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::{cache, AppState};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/favourites", get(get_favourites))
        .route("/api/favourites/{mls_number}", post(add_favourite))
        .route("/api/favourites/{mls_number}", delete(remove_favourite))
}

#[derive(Serialize)]
pub struct FavouritesResponse {
    success: bool,
    data: Vec<String>,
}

/// List saved MLS numbers, cache-first.
async fn get_favourites(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<FavouritesResponse>> {
    let key = cache::favourites_key(&auth.user.id);
    if let Some(hit) = state.cache.get_json::<Vec<String>>(&key).await {
        return Ok(Json(FavouritesResponse {
            success: true,
            data: hit,
        }));
    }

    let data = auth.user.favorites.clone();
    state
        .cache
        .set_json(&key, &data, cache::FAVOURITES_TTL)
        .await;
    Ok(Json(FavouritesResponse { success: true, data }))
}

/// Save a listing. Idempotent: re-adding a saved listing is a no-op.
async fn add_favourite(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(mls_number): Path<String>,
) -> Result<Json<FavouritesResponse>> {
    let mut user = auth.user;
    if !user.favorites.contains(&mls_number) {
        user.favorites.push(mls_number);
        user.updated_at = chrono::Utc::now().to_rfc3339();
        state.db.upsert_user(&user).await?;
    }
    invalidate(&state, &user.id).await;

    Ok(Json(FavouritesResponse {
        success: true,
        data: user.favorites,
    }))
}

/// Remove a listing. Idempotent: removing an absent listing is a no-op.
async fn remove_favourite(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(mls_number): Path<String>,
) -> Result<Json<FavouritesResponse>> {
    let mut user = auth.user;
    if user.favorites.contains(&mls_number) {
        user.favorites.retain(|saved| saved != &mls_number);
        user.updated_at = chrono::Utc::now().to_rfc3339();
        state.db.upsert_user(&user).await?;
    }
    invalidate(&state, &user.id).await;

    Ok(Json(FavouritesResponse {
        success: true,
        data: user.favorites,
    }))
}

/// Drop both cached projections of the user after a favorites write.
async fn invalidate(state: &AppState, user_id: &str) {
    state.cache.delete(&cache::favourites_key(user_id)).await;
    state.cache.delete(&cache::user_key(user_id)).await;
}

// SPDX-License-Identifier: MIT

//! Profile routes: read, partial update, password change. All endpoints
//! require a bearer token.

use axum::{
    extract::State,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::PublicUser;
use crate::services::password;
use crate::{cache, AppState};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/profile", get(get_profile))
        .route("/api/profile", put(update_profile))
        .route("/api/profile/password", post(change_password))
}

#[derive(Serialize)]
pub struct ProfileResponse {
    success: bool,
    user: PublicUser,
}

async fn get_profile(Extension(auth): Extension<AuthUser>) -> Json<ProfileResponse> {
    Json(ProfileResponse {
        success: true,
        user: auth.user.public(),
    })
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    name: Option<String>,
    email: Option<String>,
}

/// Partial profile update: absent or empty fields are left untouched.
/// A changed email must not collide with another account.
async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>> {
    let mut user = auth.user;

    if let Some(name) = body.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        user.name = name.to_string();
    }
    if let Some(email) = body
        .email
        .as_deref()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
    {
        if email != user.email {
            if state.db.find_user_by_email(&email).await?.is_some() {
                return Err(AppError::Conflict("Email already in use".to_string()));
            }
            user.email = email;
        }
    }

    user.updated_at = chrono::Utc::now().to_rfc3339();
    state.db.upsert_user(&user).await?;
    state.cache.delete(&cache::user_key(&user.id)).await;

    Ok(Json(ProfileResponse {
        success: true,
        user: user.public(),
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    current_password: String,
    new_password: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    success: bool,
    message: String,
}

/// Change the account password after re-checking the current one.
async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>> {
    let mut user = auth.user;

    let matches = user
        .password_hash
        .as_deref()
        .is_some_and(|hash| password::verify_password(&body.current_password, hash));
    if !matches {
        return Err(AppError::BadRequest("Current password invalid".to_string()));
    }
    if body.new_password.is_empty() {
        return Err(AppError::BadRequest("newPassword is required".to_string()));
    }

    user.password_hash = Some(password::hash_password(&body.new_password)?);
    user.updated_at = chrono::Utc::now().to_rfc3339();
    state.db.upsert_user(&user).await?;
    state.cache.delete(&cache::user_key(&user.id)).await;

    Ok(Json(MessageResponse {
        success: true,
        message: "Password updated".to_string(),
    }))
}

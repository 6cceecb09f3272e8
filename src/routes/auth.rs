// SPDX-License-Identifier: MIT

//! Email/password authentication routes: signup, login, OTP verification,
//! password reset.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::auth::create_jwt;
use crate::models::{AuthProvider, User};
use crate::services::{otp, password};
use crate::{cache, AppState};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/login", post(login))
        .route("/api/auth/send-otp", post(send_otp))
        .route("/api/auth/verify-otp", post(verify_otp))
        .route("/api/auth/forgot-password", post(forgot_password))
        .route("/api/auth/reset-password", post(reset_password))
        .route("/api/auth/logout", post(logout))
}

#[derive(Deserialize)]
pub struct SignupRequest {
    name: String,
    email: String,
    password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "needsVerification")]
    needs_verification: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl AuthResponse {
    fn message(message: &str) -> Self {
        Self {
            success: true,
            needs_verification: None,
            token: None,
            message: Some(message.to_string()),
        }
    }

    fn needs_verification(message: &str) -> Self {
        Self {
            success: true,
            needs_verification: Some(true),
            token: None,
            message: Some(message.to_string()),
        }
    }

    fn token(token: String) -> Self {
        Self {
            success: true,
            needs_verification: None,
            token: Some(token),
            message: None,
        }
    }
}

/// Create an unverified account and email a verification code.
async fn signup(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SignupRequest>,
) -> Result<Json<AuthResponse>> {
    let name = body.name.trim();
    let email = body.email.trim().to_lowercase();
    if name.is_empty() || email.is_empty() || body.password.is_empty() {
        return Err(AppError::BadRequest(
            "name, email, password are required".to_string(),
        ));
    }

    if state.db.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("Email already in use".to_string()));
    }

    let hash = password::hash_password(&body.password)?;
    let mut user = User::new_local(name, &email, hash);
    let code = otp::issue(&mut user);
    state.db.upsert_user(&user).await?;

    state
        .mailer
        .send(
            &email,
            "Verify your Easy Homes account",
            &format!(
                "Hi {}, your Easy Homes OTP is {}. It expires in 1 minute.",
                name, code
            ),
        )
        .await?;

    tracing::info!(user_id = %user.id, "Account created, verification pending");

    Ok(Json(AuthResponse::needs_verification(
        "Account created. Please verify via the code sent to your email.",
    )))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

/// Password login. Unverified accounts receive a fresh OTP instead of a
/// token.
async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let email = body.email.trim().to_lowercase();

    let mut user = state
        .db
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| AppError::NotFound("Email not found".to_string()))?;

    // Social-only accounts have no hash and can never pass this check.
    let matches = user
        .password_hash
        .as_deref()
        .is_some_and(|hash| password::verify_password(&body.password, hash));
    if !matches {
        return Err(AppError::Unauthorized);
    }

    if !user.is_verified {
        let code = otp::issue(&mut user);
        state.db.upsert_user(&user).await?;
        state
            .mailer
            .send(
                &email,
                "Your Easy Homes OTP",
                &format!("Your OTP code is {}. It expires in 1 minute.", code),
            )
            .await?;
        return Ok(Json(AuthResponse::needs_verification(
            "Account not verified. OTP sent to your email.",
        )));
    }

    let token = create_jwt(&user.id, &user.email, &state.config.jwt_signing_key)?;
    Ok(Json(AuthResponse::token(token)))
}

#[derive(Deserialize)]
pub struct SendOtpRequest {
    email: String,
}

/// Issue a verification code, provisioning a placeholder account when the
/// email is unknown. Succeeds either way so callers cannot enumerate
/// registered addresses.
async fn send_otp(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SendOtpRequest>,
) -> Result<Json<AuthResponse>> {
    let email = body.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(AppError::BadRequest("email is required".to_string()));
    }

    let mut user = match state.db.find_user_by_email(&email).await? {
        Some(user) => user,
        None => {
            // Placeholder local account: no password yet, unverified.
            let now = chrono::Utc::now().to_rfc3339();
            User {
                id: uuid::Uuid::new_v4().to_string(),
                name: String::new(),
                email: email.clone(),
                auth_provider: AuthProvider::Local,
                password_hash: None,
                is_verified: false,
                otp: None,
                otp_expires_at: None,
                reset_token_hash: None,
                reset_expires_at: None,
                favorites: Vec::new(),
                created_at: now.clone(),
                updated_at: now,
            }
        }
    };

    let code = otp::issue(&mut user);
    state.db.upsert_user(&user).await?;

    state
        .mailer
        .send(
            &email,
            "Your Easy Homes OTP",
            &format!("Your OTP code is {}. It expires in 1 minute.", code),
        )
        .await?;

    Ok(Json(AuthResponse::message("OTP sent")))
}

#[derive(Deserialize)]
pub struct VerifyOtpRequest {
    email: String,
    otp: String,
}

/// Check a submitted code; on success mark the account verified and issue
/// a session token.
async fn verify_otp(
    State(state): State<Arc<AppState>>,
    Json(body): Json<VerifyOtpRequest>,
) -> Result<Json<AuthResponse>> {
    let email = body.email.trim().to_lowercase();

    let mut user = state
        .db
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| {
            AppError::BadRequest("No OTP requested for this email".to_string())
        })?;

    match otp::check(&user, body.otp.trim()) {
        otp::OtpCheck::Valid => {}
        otp::OtpCheck::NotPending => {
            return Err(AppError::BadRequest(
                "No OTP requested for this email".to_string(),
            ));
        }
        otp::OtpCheck::Invalid => {
            return Err(AppError::BadRequest(
                "OTP is invalid or expired".to_string(),
            ));
        }
    }

    user.is_verified = true;
    user.otp = None;
    user.otp_expires_at = None;
    user.updated_at = chrono::Utc::now().to_rfc3339();
    state.db.upsert_user(&user).await?;
    state.cache.delete(&cache::user_key(&user.id)).await;

    let token = create_jwt(&user.id, &user.email, &state.config.jwt_signing_key)?;
    Ok(Json(AuthResponse::token(token)))
}

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    email: String,
}

/// Issue a single-use reset token and email the reset link. Only the
/// token's hash is stored.
async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ForgotPasswordRequest>,
) -> Result<Json<AuthResponse>> {
    let email = body.email.trim().to_lowercase();

    let mut user = state
        .db
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| AppError::NotFound("Email not found".to_string()))?;

    let token = password::generate_reset_token();
    user.reset_token_hash = Some(password::hash_reset_token(&token));
    user.reset_expires_at = Some(
        (chrono::Utc::now() + chrono::Duration::seconds(password::RESET_TTL_SECS)).to_rfc3339(),
    );
    user.updated_at = chrono::Utc::now().to_rfc3339();
    state.db.upsert_user(&user).await?;

    let reset_url = format!(
        "{}/reset-password?token={}&email={}",
        state.config.frontend_url,
        token,
        urlencoding::encode(&email)
    );
    state
        .mailer
        .send(
            &email,
            "Reset Your Easy Homes Password",
            &format!(
                "Click here to reset your password:\n\n{}\n\nThis link will expire in 1 hour.",
                reset_url
            ),
        )
        .await?;

    Ok(Json(AuthResponse::message(
        "Password reset link sent to your email.",
    )))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    token: String,
    email: String,
    new_password: String,
}

/// Complete a password reset with the emailed token.
async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<Json<AuthResponse>> {
    let email = body.email.trim().to_lowercase();

    let mut user = state
        .db
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| AppError::BadRequest("Token invalid or expired".to_string()))?;

    let submitted_hash = password::hash_reset_token(body.token.trim());
    let pending = user
        .reset_token_hash
        .as_deref()
        .is_some_and(|stored| stored == submitted_hash)
        && user
            .reset_expires_at
            .as_deref()
            .and_then(|raw| chrono::DateTime::parse_from_rfc3339(raw).ok())
            .is_some_and(|expires| chrono::Utc::now() < expires);
    if !pending {
        return Err(AppError::BadRequest("Token invalid or expired".to_string()));
    }

    user.password_hash = Some(password::hash_password(&body.new_password)?);
    user.reset_token_hash = None;
    user.reset_expires_at = None;
    user.updated_at = chrono::Utc::now().to_rfc3339();
    state.db.upsert_user(&user).await?;
    state.cache.delete(&cache::user_key(&user.id)).await;

    Ok(Json(AuthResponse::message("Password reset successful")))
}

/// Sessions are stateless bearer tokens; logout only exists so clients
/// have a uniform endpoint to call while discarding theirs.
async fn logout() -> Json<AuthResponse> {
    Json(AuthResponse::message("Logged out successfully"))
}

// SPDX-License-Identifier: MIT

//! User account model for storage and API.

use serde::{Deserialize, Serialize};

/// How the account authenticates. Social accounts carry no password hash
/// and can only ever be reached through the social-login bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Local,
    Social,
}

/// User account stored in Firestore.
///
/// `otp`/`otp_expires_at` are set and cleared together; at most one code is
/// pending per account. `reset_token_hash` holds only the SHA-256 of the
/// issued reset token, never the plaintext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Document ID (uuid v4)
    pub id: String,
    pub name: String,
    /// Unique across accounts
    pub email: String,
    pub auth_provider: AuthProvider,
    /// Argon2 hash; `None` for social-only accounts
    pub password_hash: Option<String>,
    /// Set true only by successful OTP verification
    pub is_verified: bool,
    pub otp: Option<String>,
    /// RFC3339 expiry of the pending OTP
    pub otp_expires_at: Option<String>,
    pub reset_token_hash: Option<String>,
    /// RFC3339 expiry of the pending reset token
    pub reset_expires_at: Option<String>,
    /// Saved MLS numbers, no duplicates
    pub favorites: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    /// Create a fresh local (password) account. Starts unverified.
    pub fn new_local(name: &str, email: &str, password_hash: String) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: email.to_string(),
            auth_provider: AuthProvider::Local,
            password_hash: Some(password_hash),
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

    /// Create an account from a social login. Verified from the start,
    /// no password set.
    pub fn new_social(name: &str, email: &str) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: email.to_string(),
            auth_provider: AuthProvider::Social,
            password_hash: None,
            is_verified: true,
            otp: None,
            otp_expires_at: None,
            reset_token_hash: None,
            reset_expires_at: None,
            favorites: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Sanitized projection returned by profile and social-login routes.
    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            is_verified: self.is_verified,
            favorites: self.favorites.clone(),
            created_at: self.created_at.clone(),
        }
    }
}

/// User projection with credential fields stripped.
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(rename = "isVerified")]
    pub is_verified: bool,
    pub favorites: Vec<String>,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

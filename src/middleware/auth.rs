// SPDX-License-Identifier: MIT

//! JWT authentication middleware with cache-first user resolution.

use crate::cache;
use crate::error::AppError;
use crate::models::User;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Session token lifetime (1 hour).
const TOKEN_TTL_SECS: usize = 60 * 60;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user document ID)
    pub sub: String,
    /// Email bound at issuance
    pub email: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Authenticated user record extracted from the bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
}

/// Middleware that requires a valid bearer token.
///
/// The subject is resolved cache-first: a `user:<id>` hit is trusted as-is
/// (staleness bounded by the TTL); on miss the record is loaded from
/// Firestore and the cache repopulated best-effort.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(h) if h.starts_with("Bearer ") => &h[7..],
        _ => return Err(AppError::Unauthorized),
    };

    let key = DecodingKey::from_secret(&state.config.jwt_signing_key);
    let validation = Validation::new(Algorithm::HS256);

    let token_data =
        decode::<Claims>(token, &key, &validation).map_err(|_| AppError::InvalidToken)?;
    let user_id = token_data.claims.sub;

    let cache_key = cache::user_key(&user_id);
    let user = match state.cache.get_json::<User>(&cache_key).await {
        Some(user) => user,
        None => {
            let user = state
                .db
                .get_user(&user_id)
                .await?
                .ok_or(AppError::InvalidToken)?;
            state
                .cache
                .set_json(&cache_key, &user, cache::USER_TTL)
                .await;
            user
        }
    };

    request.extensions_mut().insert(AuthUser { user });
    Ok(next.run(request).await)
}

/// Create a JWT for a user session.
pub fn create_jwt(user_id: &str, email: &str, signing_key: &[u8]) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        iat: now,
        exp: now + TOKEN_TTL_SECS,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwt_round_trip() {
        let key = b"test_jwt_key_32_bytes_minimum!!";
        let token = create_jwt("user-1", "a@x.com", key).unwrap();

        let decoded = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(key),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap();

        assert_eq!(decoded.claims.sub, "user-1");
        assert_eq!(decoded.claims.email, "a@x.com");
        assert_eq!(decoded.claims.exp - decoded.claims.iat, TOKEN_TTL_SECS);
    }

    #[test]
    fn test_jwt_rejects_wrong_key() {
        let token = create_jwt("user-1", "a@x.com", b"correct_key_here_32_bytes!!!!!!").unwrap();
        let result = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"wrong_key_here_32_bytes!!!!!!!!!"),
            &Validation::new(Algorithm::HS256),
        );
        assert!(result.is_err());
    }
}

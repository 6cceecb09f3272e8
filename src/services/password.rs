// SPDX-License-Identifier: MIT

//! Password hashing and reset-token handling.
//!
//! Passwords are stored as argon2id hashes. Reset tokens are 32 random
//! bytes, hex-encoded for the email link; only the SHA-256 of the token
//! ever reaches the user record.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use sha2::{Digest, Sha256};

use crate::error::AppError;

/// Reset-token lifetime (1 hour).
pub const RESET_TTL_SECS: i64 = 60 * 60;

/// Hash a password with argon2id and a fresh salt.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Password hashing failed: {}", e)))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored hash.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Generate a reset token: 32 random bytes, hex-encoded.
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
    hex::encode(bytes)
}

/// One-way hash of a reset token (SHA-256, hex).
pub fn hash_reset_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_round_trip() {
        let hash = hash_password("s3cret").unwrap();
        assert_ne!(hash, "s3cret");
        assert!(verify_password("s3cret", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn test_verify_tolerates_garbage_hash() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn test_reset_token_never_stored_in_plaintext() {
        let token = generate_reset_token();
        assert_eq!(token.len(), 64); // 32 bytes hex
        let stored = hash_reset_token(&token);
        assert_ne!(token, stored);
        assert_eq!(hash_reset_token(&token), stored);
    }

    #[test]
    fn test_reset_tokens_are_unique() {
        assert_ne!(generate_reset_token(), generate_reset_token());
    }
}

// SPDX-License-Identifier: MIT

//! One-time code issuance and verification.
//!
//! A user has at most one pending code; issuing a new one replaces it.
//! Codes are 6 decimal digits and expire 60 seconds after issuance.

use crate::models::User;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;

/// OTP lifetime after issuance.
pub const OTP_TTL_SECS: i64 = 60;

/// Generate a uniformly random 6-digit code in [100000, 999999].
pub fn generate_otp() -> String {
    let code: u32 = rand::thread_rng().gen_range(100_000..=999_999);
    code.to_string()
}

/// Attach a fresh code to the user record, replacing any pending one.
/// Returns the plaintext code for delivery.
pub fn issue(user: &mut User) -> String {
    let code = generate_otp();
    user.otp = Some(code.clone());
    user.otp_expires_at = Some((Utc::now() + Duration::seconds(OTP_TTL_SECS)).to_rfc3339());
    code
}

/// Outcome of checking a submitted code against the pending one.
#[derive(Debug, PartialEq, Eq)]
pub enum OtpCheck {
    /// Code matches and is unexpired
    Valid,
    /// No code pending for this account
    NotPending,
    /// Mismatch, or the pending code has expired
    Invalid,
}

/// Check a submitted code. Acceptance requires an exact match strictly
/// before the stored expiry. Clearing the fields is the caller's job.
pub fn check(user: &User, submitted: &str) -> OtpCheck {
    let (Some(pending), Some(expires_at)) = (&user.otp, &user.otp_expires_at) else {
        return OtpCheck::NotPending;
    };

    let expires_at = match DateTime::parse_from_rfc3339(expires_at) {
        Ok(dt) => dt.with_timezone(&Utc),
        Err(_) => return OtpCheck::Invalid,
    };

    if pending != submitted || Utc::now() >= expires_at {
        return OtpCheck::Invalid;
    }
    OtpCheck::Valid
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user() -> User {
        User::new_local("A", "a@x.com", "hash".to_string())
    }

    #[test]
    fn test_generated_codes_are_six_digits() {
        for _ in 0..500 {
            let code = generate_otp();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
            let n: u32 = code.parse().unwrap();
            assert!((100_000..=999_999).contains(&n));
        }
    }

    #[test]
    fn test_issue_replaces_pending_code() {
        let mut user = test_user();
        let first = issue(&mut user);
        let second = issue(&mut user);
        assert_eq!(user.otp.as_deref(), Some(second.as_str()));
        // The replaced code no longer verifies (unless the draw repeated).
        if first != second {
            assert_eq!(check(&user, &first), OtpCheck::Invalid);
        }
        assert_eq!(check(&user, &second), OtpCheck::Valid);
    }

    #[test]
    fn test_check_without_pending_code() {
        let user = test_user();
        assert_eq!(check(&user, "123456"), OtpCheck::NotPending);
    }

    #[test]
    fn test_check_rejects_mismatch() {
        let mut user = test_user();
        let code = issue(&mut user);
        let wrong = if code == "123456" { "654321" } else { "123456" };
        assert_eq!(check(&user, wrong), OtpCheck::Invalid);
    }

    #[test]
    fn test_check_rejects_expired_code() {
        let mut user = test_user();
        let code = issue(&mut user);
        user.otp_expires_at = Some((Utc::now() - Duration::seconds(1)).to_rfc3339());
        assert_eq!(check(&user, &code), OtpCheck::Invalid);
    }
}

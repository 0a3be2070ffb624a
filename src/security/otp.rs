// src/security/otp.rs - Time-windowed one-time codes
use std::collections::HashSet;
use std::sync::RwLock;

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use rand::{thread_rng, Rng};
use ring::hmac::{self, Key, HMAC_SHA256};

/// Digits in a generated code
const CODE_DIGITS: u32 = 6;

/// A code issued for one authentication attempt
#[derive(Clone, Debug)]
pub struct OneTimeCode {
    pub code: String,
    pub secret: String,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
}

/// Issues and validates per-attempt one-time codes.
///
/// Codes are derived from a fresh shared secret and the wall-clock window.
/// Validation tolerates one window of clock skew and consumes the secret
/// whatever the outcome.
pub struct OtpAuthority {
    window_secs: u64,
    used_secrets: RwLock<HashSet<String>>,
}

impl OtpAuthority {
    pub fn new(window_secs: u64) -> Self {
        OtpAuthority {
            window_secs: window_secs.max(1),
            used_secrets: RwLock::new(HashSet::new()),
        }
    }

    /// Generate a fresh secret and the code for the current window
    pub fn issue(&self) -> OneTimeCode {
        let mut secret_bytes = [0u8; 20];
        thread_rng().fill(&mut secret_bytes);
        let secret = general_purpose::STANDARD.encode(secret_bytes);

        let now = Utc::now();
        let window = now.timestamp() as u64 / self.window_secs;

        OneTimeCode {
            code: derive_code(&secret, window),
            secret,
            valid_from: now,
            valid_to: now + Duration::seconds(self.window_secs as i64),
        }
    }

    /// Validate a submitted code. Each secret works for exactly one call.
    pub fn validate(&self, secret: &str, submitted: &str) -> bool {
        self.validate_at(secret, submitted, Utc::now())
    }

    fn validate_at(&self, secret: &str, submitted: &str, now: DateTime<Utc>) -> bool {
        {
            // Consume the secret before looking at the code
            let mut used = self.used_secrets.write().unwrap();
            if !used.insert(secret.to_string()) {
                return false;
            }
        }

        let window = now.timestamp() as u64 / self.window_secs;
        [window.saturating_sub(1), window, window + 1]
            .iter()
            .any(|w| derive_code(secret, *w) == submitted)
    }
}

// HMAC-SHA256 over the window counter with dynamic truncation to 6 digits
fn derive_code(secret: &str, window: u64) -> String {
    let key = Key::new(HMAC_SHA256, secret.as_bytes());
    let tag = hmac::sign(&key, &window.to_be_bytes());
    let bytes = tag.as_ref();

    let offset = (bytes[bytes.len() - 1] & 0x0f) as usize;
    let binary = ((bytes[offset] as u32 & 0x7f) << 24)
        | ((bytes[offset + 1] as u32) << 16)
        | ((bytes[offset + 2] as u32) << 8)
        | bytes[offset + 3] as u32;

    format!("{:06}", binary % 10u32.pow(CODE_DIGITS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issued_code_validates() {
        let authority = OtpAuthority::new(300);
        let issued = authority.issue();
        assert_eq!(issued.code.len(), 6);
        assert!(issued.code.chars().all(|c| c.is_ascii_digit()));
        assert!(authority.validate(&issued.secret, &issued.code));
    }

    #[test]
    fn test_secret_is_single_use() {
        let authority = OtpAuthority::new(300);
        let issued = authority.issue();
        assert!(authority.validate(&issued.secret, &issued.code));
        // Second validation with the same secret must fail even with the
        // correct code
        assert!(!authority.validate(&issued.secret, &issued.code));
    }

    #[test]
    fn test_failed_validation_still_consumes_secret() {
        let authority = OtpAuthority::new(300);
        let issued = authority.issue();
        assert!(!authority.validate(&issued.secret, "badcode"));
        assert!(!authority.validate(&issued.secret, &issued.code));
    }

    #[test]
    fn test_adjacent_window_tolerated() {
        let authority = OtpAuthority::new(300);
        let now = Utc::now();
        let window = now.timestamp() as u64 / 300;

        // A code minted for the previous window is still accepted
        let stale = derive_code("some-secret", window - 1);
        assert!(authority.validate_at("some-secret", &stale, now));

        // Two windows back is not
        let expired = derive_code("other-secret", window - 2);
        assert!(!authority.validate_at("other-secret", &expired, now));
    }

    #[test]
    fn test_validity_interval_length() {
        let authority = OtpAuthority::new(300);
        let issued = authority.issue();
        assert_eq!(issued.valid_to - issued.valid_from, Duration::seconds(300));
    }

    #[test]
    fn test_derivation_is_deterministic() {
        assert_eq!(derive_code("secret", 42), derive_code("secret", 42));
        assert_ne!(derive_code("secret", 42), derive_code("secret", 43));
    }

    #[test]
    fn test_distinct_secrets_per_issue() {
        let authority = OtpAuthority::new(300);
        assert_ne!(authority.issue().secret, authority.issue().secret);
    }
}

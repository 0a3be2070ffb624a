// src/error.rs - Unified error types for the authentication engine
use std::fmt;

use thiserror::Error;

use crate::store::StoreError;

/// One independent authentication check
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Factor {
    Password,
    Biometric,
    Code,
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Factor::Password => f.write_str("password"),
            Factor::Biometric => f.write_str("typing"),
            Factor::Code => f.write_str("one-time code"),
        }
    }
}

/// Errors surfaced to callers of the register and login protocols
#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed input: role, email, or password shape
    #[error("{0}")]
    Validation(String),

    /// Unknown email or account id
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Role, email, and id do not belong together
    #[error("{0}")]
    Mismatch(String),

    /// Account is inside a temporary lock window
    #[error("account locked, try again in {remaining_secs} seconds")]
    LockedTemporary { remaining_secs: i64 },

    /// Terminal: too many completed lock cycles
    #[error("account permanently locked due to excessive failed attempts")]
    LockedPermanent,

    /// One factor failed; the lockout counter has already been advanced
    #[error("{factor} verification failed")]
    FactorFailed {
        factor: Factor,
        advisory: Option<String>,
    },

    /// The notification channel refused the message; no factor was evaluated
    #[error("notification delivery failed")]
    DeliveryFailed,

    /// Duplicate registration
    #[error("email already registered")]
    Conflict,

    /// Keystroke capture failed
    #[error("keystroke capture error: {0}")]
    Capture(#[from] std::io::Error),

    /// Storage backend failure
    #[error("store error: {0}")]
    Store(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => AuthError::Conflict,
            StoreError::NotFound(what) => AuthError::NotFound(what),
            StoreError::Backend(msg) => AuthError::Store(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_conversion() {
        assert!(matches!(
            AuthError::from(StoreError::Conflict),
            AuthError::Conflict
        ));
        assert!(matches!(
            AuthError::from(StoreError::NotFound("account")),
            AuthError::NotFound("account")
        ));
    }

    #[test]
    fn test_factor_display() {
        assert_eq!(Factor::Code.to_string(), "one-time code");
    }
}

// src/security/password.rs - Credential hashing and verification
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use log::error;
use thiserror::Error;

/// Credential hashing error
#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    Hash(String),

    #[error("Stored password hash is malformed: {0}")]
    MalformedHash(String),
}

/// Argon2id hashing for account credentials
pub struct PasswordService;

impl PasswordService {
    /// Hash a plaintext password with a fresh random salt
    pub fn hash(password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);

        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| {
                error!("Password hashing error: {}", e);
                PasswordError::Hash(e.to_string())
            })
    }

    /// Check a plaintext password against a stored hash
    pub fn matches(password: &str, hash: &str) -> Result<bool, PasswordError> {
        let parsed = PasswordHash::new(hash).map_err(|e| {
            error!("Password hash parsing error: {}", e);
            PasswordError::MalformedHash(e.to_string())
        })?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_match() {
        let hash = PasswordService::hash("Str0ng!pass").unwrap();
        assert!(PasswordService::matches("Str0ng!pass", &hash).unwrap());
    }

    #[test]
    fn test_wrong_password_rejected() {
        let hash = PasswordService::hash("Str0ng!pass").unwrap();
        assert!(!PasswordService::matches("Wr0ng!pass", &hash).unwrap());
    }

    #[test]
    fn test_malformed_hash() {
        assert!(matches!(
            PasswordService::matches("Str0ng!pass", "not-a-hash"),
            Err(PasswordError::MalformedHash(_))
        ));
    }
}

// src/store/mod.rs - Credential store capability
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{Account, AccountId, KeystrokeRecord, LockoutCounters, TypingProfile};

/// Storage failure surfaced to the engine
#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique-email constraint violation
    #[error("email already registered")]
    Conflict,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Persistence boundary for accounts, typing profiles, and keystroke audit.
///
/// Implementations must serialize lockout-counter updates per account:
/// `increment_failed_attempts` is one atomic read-modify-write, so concurrent
/// sessions cannot race past the lock thresholds.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn lookup_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    async fn lookup_by_id(&self, id: &str) -> Result<Option<Account>, StoreError>;

    /// Insert a new account; fails with `Conflict` on a duplicate email
    async fn insert_account(&self, account: Account) -> Result<(), StoreError>;

    /// Apply one failed factor check to the account's counters and return the
    /// updated values
    async fn increment_failed_attempts(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<LockoutCounters, StoreError>;

    /// Reset the per-cycle lockout state after a successful authentication
    async fn reset_failed_attempts(&self, email: &str) -> Result<(), StoreError>;

    async fn get_typing_profile(
        &self,
        account_id: &str,
    ) -> Result<Option<TypingProfile>, StoreError>;

    async fn upsert_typing_profile(
        &self,
        account_id: &str,
        profile: &TypingProfile,
    ) -> Result<(), StoreError>;

    /// Append captured keystrokes for audit and offline training
    async fn append_keystroke_audit(
        &self,
        account_id: &str,
        records: &[KeystrokeRecord],
    ) -> Result<(), StoreError>;

    /// All enrolled profiles, for the administrative model rebuild
    async fn list_typing_profiles(&self) -> Result<Vec<(AccountId, TypingProfile)>, StoreError>;
}

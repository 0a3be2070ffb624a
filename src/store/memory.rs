// src/store/memory.rs - In-memory credential store
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{CredentialStore, StoreError};
use crate::models::{Account, AccountId, KeystrokeRecord, LockoutCounters, TypingProfile};
use crate::security::lockout;

/// One persisted keystroke with its audit id
#[derive(Clone, Debug)]
pub struct AuditEntry {
    pub id: Uuid,
    pub account_id: AccountId,
    pub record: KeystrokeRecord,
}

/// Store keeping everything in process memory.
///
/// Backs a single interactive session and the test suite; durable backends
/// live behind the same trait.
pub struct InMemoryStore {
    accounts: Arc<RwLock<HashMap<AccountId, Account>>>,
    profiles: Arc<RwLock<HashMap<AccountId, TypingProfile>>>,
    keystrokes: Arc<RwLock<Vec<AuditEntry>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore {
            accounts: Arc::new(RwLock::new(HashMap::new())),
            profiles: Arc::new(RwLock::new(HashMap::new())),
            keystrokes: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Number of audit rows held for an account
    pub fn audit_len(&self, account_id: &str) -> usize {
        self.keystrokes
            .read()
            .unwrap()
            .iter()
            .filter(|entry| entry.account_id == account_id)
            .count()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for InMemoryStore {
    async fn lookup_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let accounts = self.accounts.read().unwrap();
        Ok(accounts.values().find(|a| a.email == email).cloned())
    }

    async fn lookup_by_id(&self, id: &str) -> Result<Option<Account>, StoreError> {
        Ok(self.accounts.read().unwrap().get(id).cloned())
    }

    async fn insert_account(&self, account: Account) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write().unwrap();
        if accounts.values().any(|a| a.email == account.email) {
            return Err(StoreError::Conflict);
        }
        accounts.insert(account.id.clone(), account);
        Ok(())
    }

    async fn increment_failed_attempts(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<LockoutCounters, StoreError> {
        // Single write lock: the transition is one atomic read-modify-write
        let mut accounts = self.accounts.write().unwrap();
        let account = accounts
            .values_mut()
            .find(|a| a.email == email)
            .ok_or(StoreError::NotFound("account"))?;

        let next = lockout::record_failure(account.lockout_counters(), now);
        account.failed_attempts = next.failed_attempts;
        account.lockout_until = next.lockout_until;
        account.lockout_cycles = next.lockout_cycles;
        Ok(next)
    }

    async fn reset_failed_attempts(&self, email: &str) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write().unwrap();
        let account = accounts
            .values_mut()
            .find(|a| a.email == email)
            .ok_or(StoreError::NotFound("account"))?;

        let cleared = lockout::clear_failures(account.lockout_counters());
        account.failed_attempts = cleared.failed_attempts;
        account.lockout_until = cleared.lockout_until;
        Ok(())
    }

    async fn get_typing_profile(
        &self,
        account_id: &str,
    ) -> Result<Option<TypingProfile>, StoreError> {
        Ok(self.profiles.read().unwrap().get(account_id).copied())
    }

    async fn upsert_typing_profile(
        &self,
        account_id: &str,
        profile: &TypingProfile,
    ) -> Result<(), StoreError> {
        self.profiles
            .write()
            .unwrap()
            .insert(account_id.to_string(), *profile);
        Ok(())
    }

    async fn append_keystroke_audit(
        &self,
        account_id: &str,
        records: &[KeystrokeRecord],
    ) -> Result<(), StoreError> {
        let mut keystrokes = self.keystrokes.write().unwrap();
        for record in records {
            keystrokes.push(AuditEntry {
                id: Uuid::new_v4(),
                account_id: account_id.to_string(),
                record: record.clone(),
            });
        }
        Ok(())
    }

    async fn list_typing_profiles(&self) -> Result<Vec<(AccountId, TypingProfile)>, StoreError> {
        Ok(self
            .profiles
            .read()
            .unwrap()
            .iter()
            .map(|(id, profile)| (id.clone(), *profile))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn account(id: &str, email: &str) -> Account {
        Account {
            id: id.to_string(),
            email: email.to_string(),
            name: "Test".to_string(),
            password_hash: "hash".to_string(),
            role: Role::Student,
            failed_attempts: 0,
            lockout_until: None,
            lockout_cycles: 0,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = InMemoryStore::new();
        store
            .insert_account(account("S111111", "a@example.com"))
            .await
            .unwrap();
        let result = store
            .insert_account(account("S222222", "a@example.com"))
            .await;
        assert!(matches!(result, Err(StoreError::Conflict)));
    }

    #[tokio::test]
    async fn test_increment_applies_lock_transitions() {
        let store = InMemoryStore::new();
        store
            .insert_account(account("S111111", "a@example.com"))
            .await
            .unwrap();

        let now = Utc::now();
        for _ in 0..2 {
            store
                .increment_failed_attempts("a@example.com", now)
                .await
                .unwrap();
        }
        let counters = store
            .increment_failed_attempts("a@example.com", now)
            .await
            .unwrap();
        assert_eq!(counters.failed_attempts, 3);
        assert!(counters.lockout_until.is_some());
    }

    #[tokio::test]
    async fn test_reset_keeps_cycles() {
        let store = InMemoryStore::new();
        store
            .insert_account(account("S111111", "a@example.com"))
            .await
            .unwrap();

        let now = Utc::now();
        for _ in 0..6 {
            store
                .increment_failed_attempts("a@example.com", now)
                .await
                .unwrap();
        }
        store.reset_failed_attempts("a@example.com").await.unwrap();

        let stored = store.lookup_by_id("S111111").await.unwrap().unwrap();
        assert_eq!(stored.failed_attempts, 0);
        assert_eq!(stored.lockout_until, None);
        assert_eq!(stored.lockout_cycles, 1);
    }

    #[tokio::test]
    async fn test_unknown_account_not_found() {
        let store = InMemoryStore::new();
        let result = store
            .increment_failed_attempts("ghost@example.com", Utc::now())
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_audit_append() {
        let store = InMemoryStore::new();
        let record = KeystrokeRecord {
            key: 'f',
            press_ms: 1000.0,
            release_ms: Some(1080.0),
            dwell_ms: Some(80.0),
            flight_ms: None,
        };
        store
            .append_keystroke_audit("S111111", &[record.clone(), record])
            .await
            .unwrap();
        assert_eq!(store.audit_len("S111111"), 2);
        assert_eq!(store.audit_len("S222222"), 0);
    }
}

// src/security/authentication.rs - Registration and login orchestration
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};

use crate::config::Settings;
use crate::error::{AuthError, Factor};
use crate::models::{Account, AccountId, FeatureVector, Role};
use crate::notify::Notifier;
use crate::security::capture::KeystrokeCapture;
use crate::security::features::{self, SampleSet};
use crate::security::lockout::{self, LockoutState};
use crate::security::otp::OtpAuthority;
use crate::security::password::PasswordService;
use crate::security::profile;
use crate::security::validation;
use crate::security::verifier::{self, KnnModel, TypingClassifier};
use crate::store::CredentialStore;
use crate::utils;

/// Policy knobs for the authentication protocols
#[derive(Clone, Debug)]
pub struct AuthPolicy {
    /// Capture rounds required at registration
    pub enroll_samples: u32,
    /// Capture rounds required at login
    pub login_samples: u32,
    /// Target phrase used when the caller does not supply one
    pub default_phrase: String,
    /// Validity window for one-time codes, in seconds
    pub otp_window_secs: u64,
    /// Path of the typing classifier artifact
    pub model_path: PathBuf,
}

impl From<&Settings> for AuthPolicy {
    fn from(settings: &Settings) -> Self {
        AuthPolicy {
            enroll_samples: settings.enroll_samples,
            login_samples: settings.login_samples,
            default_phrase: settings.target_phrase.clone(),
            otp_window_secs: settings.otp_window_secs,
            model_path: settings.model_path.clone(),
        }
    }
}

/// Sequences credential, typing, and one-time-code factors for registration
/// and login against an abstracted store.
///
/// One instance serves one logical session at a time; counter updates go
/// through the store as atomic read-modify-writes, so concurrent sessions
/// against the same account cannot race past the lock thresholds.
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    notifier: Arc<dyn Notifier>,
    otp: OtpAuthority,
    policy: AuthPolicy,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        notifier: Arc<dyn Notifier>,
        policy: AuthPolicy,
    ) -> Self {
        let otp = OtpAuthority::new(policy.otp_window_secs);
        AuthService {
            store,
            notifier,
            otp,
            policy,
        }
    }

    /// Create an account.
    ///
    /// Students enroll a typing profile up front; the one-time code is
    /// confirmed before anything is persisted, and the account row is written
    /// before the profile, so a duplicate email leaves no partial state.
    pub async fn register(
        &self,
        role_claim: &str,
        email: &str,
        name: &str,
        password: &str,
        target_phrase: Option<&str>,
        capture: &mut dyn KeystrokeCapture,
    ) -> Result<AccountId, AuthError> {
        let role =
            Role::parse(role_claim).ok_or_else(|| AuthError::Validation("Invalid role".into()))?;
        if !validation::valid_email(email) {
            return Err(AuthError::Validation("Invalid email format".into()));
        }
        if !validation::valid_password(password) {
            return Err(AuthError::Validation(validation::PASSWORD_POLICY.into()));
        }

        let account_id = utils::generate_account_id(role);
        let phrase = target_phrase.unwrap_or(&self.policy.default_phrase);

        let enrollment = match role {
            Role::Student => Some(self.enroll_typing(&account_id, phrase, capture)?),
            Role::Admin => None,
        };

        if !self
            .confirm_code(email, "Registration Token", capture)
            .await?
        {
            return Err(AuthError::FactorFailed {
                factor: Factor::Code,
                advisory: None,
            });
        }

        let password_hash =
            PasswordService::hash(password).map_err(|e| AuthError::Store(e.to_string()))?;
        let account = Account {
            id: account_id.clone(),
            email: email.to_string(),
            name: name.to_string(),
            password_hash,
            role,
            failed_attempts: 0,
            lockout_until: None,
            lockout_cycles: 0,
            created_at: Utc::now(),
        };

        // Account row first: a taken email aborts before any profile or audit
        // rows exist
        self.store.insert_account(account).await?;

        if let Some(sample_set) = enrollment {
            let enrolled = profile::merge(None, &sample_set.features, sample_set.samples);
            self.store
                .upsert_typing_profile(&account_id, &enrolled)
                .await?;
            self.store
                .append_keystroke_audit(&account_id, &sample_set.keystrokes)
                .await?;
        }

        info!("registered {} account {}", role, account_id);
        Ok(account_id)
    }

    // Capture enrollment rounds and enforce their completeness
    fn enroll_typing(
        &self,
        account_id: &str,
        phrase: &str,
        capture: &mut dyn KeystrokeCapture,
    ) -> Result<SampleSet, AuthError> {
        let needed = self.policy.enroll_samples;
        let sample_set = features::acquire(capture, phrase, needed)?;

        let min_keystrokes = needed as usize * phrase.chars().count();
        if sample_set.samples < needed || sample_set.keystrokes.len() < min_keystrokes {
            return Err(AuthError::Validation(format!(
                "Typing enrollment failed: need {} valid samples with at least {} keystrokes (got {} samples, {} keystrokes)",
                needed,
                min_keystrokes,
                sample_set.samples,
                sample_set.keystrokes.len()
            )));
        }

        // Every kept event must carry a dwell time, and a flight time except
        // for the final event of the stream
        let last = sample_set.keystrokes.len() - 1;
        for (i, record) in sample_set.keystrokes.iter().enumerate() {
            if record.dwell_ms.is_none() {
                return Err(AuthError::Validation(
                    "Typing enrollment failed: keystroke without dwell time".into(),
                ));
            }
            if record.flight_ms.is_none() && i != last {
                return Err(AuthError::Validation(
                    "Typing enrollment failed: keystroke without flight time".into(),
                ));
            }
        }

        info!(
            "captured {} enrollment samples for {}",
            sample_set.samples, account_id
        );
        Ok(sample_set)
    }

    /// Authenticate an account through every applicable factor.
    ///
    /// Any single factor failure short-circuits the rest; only after all
    /// factors pass are the lockout counters reset and the session's typing
    /// features merged into the stored profile.
    pub async fn login(
        &self,
        role_claim: &str,
        email: &str,
        account_id: &str,
        password: &str,
        capture: &mut dyn KeystrokeCapture,
    ) -> Result<Account, AuthError> {
        let role =
            Role::parse(role_claim).ok_or_else(|| AuthError::Validation("Invalid role".into()))?;
        if !validation::valid_email(email) {
            return Err(AuthError::Validation("Invalid email format".into()));
        }

        let by_email = self
            .store
            .lookup_by_email(email)
            .await?
            .ok_or(AuthError::NotFound("user"))?;
        if by_email.role != role {
            return Err(AuthError::Mismatch("Role does not match".into()));
        }

        let account = match self.store.lookup_by_id(account_id).await? {
            Some(account) if account.email == email => account,
            _ => {
                return Err(AuthError::Mismatch(
                    "Invalid user ID or email mismatch".into(),
                ))
            }
        };

        // Shape check only; the stored credential is compared further down
        if !validation::valid_password(password) {
            return Err(AuthError::Validation(validation::PASSWORD_POLICY.into()));
        }

        // Lock gate runs before any credential comparison
        match lockout::status(&account.lockout_counters(), Utc::now()) {
            LockoutState::LockedOut => return Err(AuthError::LockedPermanent),
            LockoutState::TempLocked { remaining_secs } => {
                return Err(AuthError::LockedTemporary { remaining_secs })
            }
            LockoutState::Open | LockoutState::Warning(_) => {}
        }

        let password_ok = PasswordService::matches(password, &account.password_hash)
            .map_err(|e| AuthError::Store(e.to_string()))?;
        if !password_ok {
            return Err(self.factor_failure(email, Factor::Password).await);
        }

        // Second factor: typing rhythm, students only
        let session_typing = match account.role {
            Role::Student => Some(self.verify_typing(&account, capture).await?),
            Role::Admin => None,
        };

        if !self.confirm_code(email, "Login Token", capture).await? {
            return Err(self.factor_failure(email, Factor::Code).await);
        }

        // Every factor passed
        self.store.reset_failed_attempts(email).await?;
        if let Some(sample_set) = session_typing {
            self.store
                .append_keystroke_audit(&account.id, &sample_set.keystrokes)
                .await?;
            let existing = self.store.get_typing_profile(&account.id).await?;
            let updated =
                profile::merge(existing.as_ref(), &sample_set.features, sample_set.samples);
            self.store
                .upsert_typing_profile(&account.id, &updated)
                .await?;
        }

        info!("login successful for {}", account.id);
        Ok(account)
    }

    // Acquire a fresh session sample and check it against the stored profile
    async fn verify_typing(
        &self,
        account: &Account,
        capture: &mut dyn KeystrokeCapture,
    ) -> Result<SampleSet, AuthError> {
        let stored = self
            .store
            .get_typing_profile(&account.id)
            .await?
            .ok_or(AuthError::NotFound("typing profile"))?;

        let needed = self.policy.login_samples;
        let sample_set = features::acquire(capture, &self.policy.default_phrase, needed)?;
        if sample_set.samples < needed || sample_set.keystrokes.len() < needed as usize {
            warn!(
                "typing acquisition incomplete for {}: {} of {} valid samples",
                account.id, sample_set.samples, needed
            );
            return Err(self.factor_failure(&account.email, Factor::Biometric).await);
        }

        let fresh = &sample_set.features;
        let report = verifier::check_thresholds(fresh, &stored.features());
        info!(
            "typing check for {}: dwell {:.2} vs {:.2} ({}), flight {:.2} vs {:.2} ({}), error {:.2} vs {:.2} ({})",
            account.id,
            fresh.avg_dwell,
            stored.avg_dwell,
            report.dwell_ok,
            fresh.avg_flight,
            stored.avg_flight,
            report.flight_ok,
            fresh.error_rate,
            stored.error_rate,
            report.error_ok
        );
        if !report.passed() {
            return Err(self.factor_failure(&account.email, Factor::Biometric).await);
        }

        // The classifier is optional: absence or failure to evaluate falls
        // back to the threshold result
        if let Some(model) = self.load_classifier() {
            match model.predict(fresh) {
                Ok(predicted) => {
                    let matched = predicted == account.id;
                    info!("classifier prediction: {} (match: {})", predicted, matched);
                    if !matched {
                        return Err(self
                            .factor_failure(&account.email, Factor::Biometric)
                            .await);
                    }
                }
                Err(e) => {
                    warn!("classifier check failed: {}; using threshold result only", e)
                }
            }
        }

        Ok(sample_set)
    }

    fn load_classifier(&self) -> Option<Box<dyn TypingClassifier>> {
        if !self.policy.model_path.exists() {
            return None;
        }
        match KnnModel::load(&self.policy.model_path) {
            Ok(model) => Some(Box::new(model)),
            Err(e) => {
                warn!(
                    "failed to load typing model: {}; using threshold result only",
                    e
                );
                None
            }
        }
    }

    // Issue, deliver, and prompt for one code. A refused delivery aborts the
    // attempt without evaluating the factor; Ok(false) means the submitted
    // code was wrong or expired.
    async fn confirm_code(
        &self,
        email: &str,
        subject: &str,
        capture: &mut dyn KeystrokeCapture,
    ) -> Result<bool, AuthError> {
        let issued = self.otp.issue();
        let body = format!(
            "Your one-time code (valid for {} minutes): {}",
            self.policy.otp_window_secs / 60,
            issued.code
        );
        if !self.notifier.deliver(email, subject, &body).await {
            return Err(AuthError::DeliveryFailed);
        }

        let submitted = capture.capture_line("Enter token: ")?;
        Ok(self.otp.validate(&issued.secret, submitted.text.trim()))
    }

    // Record one failed factor and build the caller-facing error
    async fn factor_failure(&self, email: &str, factor: Factor) -> AuthError {
        match self.store.increment_failed_attempts(email, Utc::now()).await {
            Ok(counters) => AuthError::FactorFailed {
                factor,
                advisory: lockout::advisory(counters.failed_attempts),
            },
            Err(e) => {
                warn!("failed to record {} factor failure: {}", factor, e);
                AuthError::FactorFailed {
                    factor,
                    advisory: None,
                }
            }
        }
    }

    /// Rebuild the nearest-neighbour typing model from every enrolled profile
    /// and persist it at the configured path. Administrative operation; the
    /// login path never writes the artifact.
    pub async fn train_classifier(&self) -> Result<usize, AuthError> {
        let profiles = self.store.list_typing_profiles().await?;
        let data: Vec<(AccountId, FeatureVector)> = profiles
            .iter()
            .map(|(id, profile)| (id.clone(), profile.features()))
            .collect();

        let model = KnnModel::fit(&data).map_err(|e| AuthError::Validation(e.to_string()))?;
        model
            .save(&self.policy.model_path)
            .map_err(|e| AuthError::Store(e.to_string()))?;

        info!("typing model rebuilt over {} profiles", model.len());
        Ok(model.len())
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// Define core types
pub type AccountId = String;

/// Role of an account holder
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Student,
}

impl Role {
    pub fn parse(input: &str) -> Option<Role> {
        match input.trim().to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "student" => Some(Role::Student),
            _ => None,
        }
    }

    /// Single-letter prefix used when generating account ids
    pub fn id_prefix(&self) -> char {
        match self {
            Role::Admin => 'A',
            Role::Student => 'S',
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Student => "student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User account
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
    pub failed_attempts: u32,
    pub lockout_until: Option<DateTime<Utc>>,
    pub lockout_cycles: u32,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn lockout_counters(&self) -> LockoutCounters {
        LockoutCounters {
            failed_attempts: self.failed_attempts,
            lockout_until: self.lockout_until,
            lockout_cycles: self.lockout_cycles,
        }
    }
}

// Lockout bookkeeping for one account
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutCounters {
    pub failed_attempts: u32,
    pub lockout_until: Option<DateTime<Utc>>,
    pub lockout_cycles: u32,
}

/// Behavioral summary of one typing session
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Average key hold duration in milliseconds
    pub avg_dwell: f64,
    /// Average release-to-next-press gap in milliseconds
    pub avg_flight: f64,
    /// Fraction of expected characters typed incorrectly, in [0, 1]
    pub error_rate: f64,
}

/// Stored typing profile, one per account
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TypingProfile {
    pub avg_dwell: f64,
    pub avg_flight: f64,
    pub error_rate: f64,
    pub sample_count: u32,
}

impl TypingProfile {
    pub fn from_features(features: &FeatureVector, sample_count: u32) -> Self {
        TypingProfile {
            avg_dwell: features.avg_dwell,
            avg_flight: features.avg_flight,
            error_rate: features.error_rate,
            sample_count,
        }
    }

    pub fn features(&self) -> FeatureVector {
        FeatureVector {
            avg_dwell: self.avg_dwell,
            avg_flight: self.avg_flight,
            error_rate: self.error_rate,
        }
    }
}

/// One captured keystroke, persisted for audit and offline training
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeystrokeRecord {
    pub key: char,
    pub press_ms: f64,
    pub release_ms: Option<f64>,
    pub dwell_ms: Option<f64>,
    pub flight_ms: Option<f64>,
}

// src/security/lockout.rs - Failed-attempt tracking and account lock policy
use chrono::{DateTime, Duration, Utc};

use crate::models::LockoutCounters;

/// Failed attempts that trigger a temporary lock
pub const TEMP_LOCK_THRESHOLD: u32 = 3;
/// Failed attempts that complete one lock cycle
pub const CYCLE_COMPLETION_THRESHOLD: u32 = 6;
/// Completed cycles after which the account is permanently denied
pub const PERMANENT_CYCLE_LIMIT: u32 = 2;
/// Length of a temporary lock, in seconds
pub const TEMP_LOCK_SECS: i64 = 30;

/// Lock status of an account at a point in time
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockoutState {
    /// Attempts allowed
    Open,
    /// One or two failures recorded, informational only
    Warning(u32),
    /// Inside a temporary lock window
    TempLocked { remaining_secs: i64 },
    /// Terminal: no further transitions accepted
    LockedOut,
}

/// Compute the lock status for the given counters.
///
/// The permanent check runs first so a permanently locked account never
/// reports a temporary window.
pub fn status(counters: &LockoutCounters, now: DateTime<Utc>) -> LockoutState {
    if counters.lockout_cycles >= PERMANENT_CYCLE_LIMIT {
        return LockoutState::LockedOut;
    }

    if let Some(until) = counters.lockout_until {
        if now < until {
            let remaining_secs = (until - now).num_seconds().max(1);
            return LockoutState::TempLocked { remaining_secs };
        }
    }

    match counters.failed_attempts {
        0 => LockoutState::Open,
        n if n < TEMP_LOCK_THRESHOLD => LockoutState::Warning(n),
        // Window expired; attempts resume and keep counting toward the cycle
        _ => LockoutState::Open,
    }
}

/// Advance the counters for one failed factor check.
///
/// The temporary lock is set when the count reaches exactly 3 and is not
/// refreshed by later failures in the same cycle; reaching exactly 6 marks
/// the cycle complete.
pub fn record_failure(counters: LockoutCounters, now: DateTime<Utc>) -> LockoutCounters {
    let mut next = counters;
    next.failed_attempts += 1;

    if next.failed_attempts == TEMP_LOCK_THRESHOLD {
        next.lockout_until = Some(now + Duration::seconds(TEMP_LOCK_SECS));
    }
    if next.failed_attempts == CYCLE_COMPLETION_THRESHOLD {
        next.lockout_cycles += 1;
    }

    next
}

/// Clear the per-cycle counters after a fully successful authentication.
/// Completed cycles are kept: a permanent lock is irreversible here.
pub fn clear_failures(counters: LockoutCounters) -> LockoutCounters {
    LockoutCounters {
        failed_attempts: 0,
        lockout_until: None,
        lockout_cycles: counters.lockout_cycles,
    }
}

/// Caller-facing advisory for the given cumulative failure count
pub fn advisory(failed_attempts: u32) -> Option<String> {
    match failed_attempts {
        1 => Some("Warning: 3 failed attempts will lock your account for 30 seconds.".to_string()),
        2 => Some("One more failed attempt will lock your account for 30 seconds.".to_string()),
        3 => Some("Account locked for 30 seconds due to 3 failed attempts.".to_string()),
        n if n > 3 => Some(format!(
            "{} attempts left before permanent lockout.",
            CYCLE_COMPLETION_THRESHOLD as i64 - n as i64
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failures(n: u32, now: DateTime<Utc>) -> LockoutCounters {
        let mut counters = LockoutCounters::default();
        for _ in 0..n {
            counters = record_failure(counters, now);
        }
        counters
    }

    #[test]
    fn test_third_failure_sets_temporary_lock() {
        let now = Utc::now();
        let counters = failures(3, now);
        assert_eq!(counters.failed_attempts, 3);
        assert_eq!(counters.lockout_until, Some(now + Duration::seconds(30)));
        assert_eq!(counters.lockout_cycles, 0);
    }

    #[test]
    fn test_later_failures_do_not_refresh_lock() {
        let now = Utc::now();
        let after_three = failures(3, now);
        let later = now + Duration::seconds(10);
        let after_four = record_failure(after_three, later);
        assert_eq!(after_four.lockout_until, after_three.lockout_until);
    }

    #[test]
    fn test_sixth_failure_completes_cycle() {
        let now = Utc::now();
        let counters = failures(6, now);
        assert_eq!(counters.lockout_cycles, 1);
        let counters = record_failure(counters, now);
        // Only the exact sixth failure increments the cycle counter
        assert_eq!(counters.lockout_cycles, 1);
    }

    #[test]
    fn test_status_progression() {
        let now = Utc::now();
        assert_eq!(status(&LockoutCounters::default(), now), LockoutState::Open);
        assert_eq!(status(&failures(1, now), now), LockoutState::Warning(1));
        assert_eq!(status(&failures(2, now), now), LockoutState::Warning(2));
        assert!(matches!(
            status(&failures(3, now), now),
            LockoutState::TempLocked { remaining_secs } if remaining_secs > 0
        ));
    }

    #[test]
    fn test_remaining_seconds_non_increasing() {
        let now = Utc::now();
        let counters = failures(3, now);
        let first = match status(&counters, now + Duration::seconds(5)) {
            LockoutState::TempLocked { remaining_secs } => remaining_secs,
            other => panic!("expected temp lock, got {:?}", other),
        };
        let second = match status(&counters, now + Duration::seconds(10)) {
            LockoutState::TempLocked { remaining_secs } => remaining_secs,
            other => panic!("expected temp lock, got {:?}", other),
        };
        assert!(first > 0 && second > 0);
        assert!(second <= first);
    }

    #[test]
    fn test_window_expiry_reopens_account() {
        let now = Utc::now();
        let counters = failures(3, now);
        let after_window = now + Duration::seconds(TEMP_LOCK_SECS + 1);
        assert_eq!(status(&counters, after_window), LockoutState::Open);
    }

    #[test]
    fn test_two_cycles_lock_out_permanently() {
        let now = Utc::now();
        let mut counters = failures(6, now);
        counters = clear_failures(counters);
        assert_eq!(counters.lockout_cycles, 1);
        counters = (0..6).fold(counters, |c, _| record_failure(c, now));
        assert_eq!(counters.lockout_cycles, 2);
        assert_eq!(status(&counters, now), LockoutState::LockedOut);
        // Permanent even after the temporary window would have passed
        let much_later = now + Duration::seconds(3600);
        assert_eq!(status(&counters, much_later), LockoutState::LockedOut);
    }

    #[test]
    fn test_clear_keeps_cycles() {
        let now = Utc::now();
        let counters = clear_failures(failures(6, now));
        assert_eq!(counters.failed_attempts, 0);
        assert_eq!(counters.lockout_until, None);
        assert_eq!(counters.lockout_cycles, 1);
    }

    #[test]
    fn test_advisory_ladder() {
        assert!(advisory(0).is_none());
        assert!(advisory(1).unwrap().starts_with("Warning"));
        assert!(advisory(2).unwrap().starts_with("One more"));
        assert!(advisory(3).unwrap().contains("locked for 30 seconds"));
        assert_eq!(
            advisory(4).unwrap(),
            "2 attempts left before permanent lockout."
        );
        assert_eq!(
            advisory(5).unwrap(),
            "1 attempts left before permanent lockout."
        );
    }
}

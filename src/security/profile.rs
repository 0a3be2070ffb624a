// src/security/profile.rs - Running-average profile maintenance
use crate::models::{FeatureVector, TypingProfile};

/// Merge a session's features into the stored profile.
///
/// Sample-count-weighted running mean; with no existing profile the fresh
/// vector is adopted verbatim. Call only after a fully successful
/// authentication so failed guesses cannot drift the enrollment.
pub fn merge(
    existing: Option<&TypingProfile>,
    fresh: &FeatureVector,
    new_samples: u32,
) -> TypingProfile {
    match existing {
        None => TypingProfile::from_features(fresh, new_samples),
        Some(profile) => {
            let old = profile.sample_count as f64;
            let new = new_samples as f64;
            let total = old + new;
            TypingProfile {
                avg_dwell: (profile.avg_dwell * old + fresh.avg_dwell * new) / total,
                avg_flight: (profile.avg_flight * old + fresh.avg_flight * new) / total,
                error_rate: (profile.error_rate * old + fresh.error_rate * new) / total,
                sample_count: profile.sample_count + new_samples,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(dwell: f64, flight: f64, error: f64) -> FeatureVector {
        FeatureVector {
            avg_dwell: dwell,
            avg_flight: flight,
            error_rate: error,
        }
    }

    #[test]
    fn test_first_merge_adopts_verbatim() {
        let fresh = vector(100.0, 80.0, 0.1);
        let profile = merge(None, &fresh, 5);
        assert_eq!(profile.avg_dwell, 100.0);
        assert_eq!(profile.avg_flight, 80.0);
        assert_eq!(profile.error_rate, 0.1);
        assert_eq!(profile.sample_count, 5);
    }

    #[test]
    fn test_weighted_merge() {
        let profile = merge(None, &vector(100.0, 80.0, 0.0), 5);
        let merged = merge(Some(&profile), &vector(140.0, 96.0, 0.8), 3);
        // (100*5 + 140*3) / 8 and (80*5 + 96*3) / 8
        assert!((merged.avg_dwell - 115.0).abs() < 1e-12);
        assert!((merged.avg_flight - 86.0).abs() < 1e-12);
        assert!((merged.error_rate - 0.3).abs() < 1e-12);
        assert_eq!(merged.sample_count, 8);
    }

    #[test]
    fn test_merge_order_insensitive() {
        let a = vector(100.0, 80.0, 0.1);
        let b = vector(130.0, 95.0, 0.2);

        let ab = merge(Some(&merge(None, &a, 5)), &b, 3);
        let ba = merge(Some(&merge(None, &b, 3)), &a, 5);

        assert!((ab.avg_dwell - ba.avg_dwell).abs() < 1e-9);
        assert!((ab.avg_flight - ba.avg_flight).abs() < 1e-9);
        assert!((ab.error_rate - ba.error_rate).abs() < 1e-9);
        assert_eq!(ab.sample_count, ba.sample_count);
    }

    #[test]
    fn test_sample_count_accumulates_uncapped() {
        let mut profile = merge(None, &vector(100.0, 80.0, 0.1), 5);
        for _ in 0..100 {
            profile = merge(Some(&profile), &vector(100.0, 80.0, 0.1), 3);
        }
        assert_eq!(profile.sample_count, 305);
    }
}

// src/security/verifier.rs - Typing verification: threshold test and optional classifier
use std::cmp::Ordering;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::{AccountId, FeatureVector};

/// Relative tolerance on dwell deviation
pub const DWELL_TOLERANCE: f64 = 0.3;
/// Relative tolerance on flight deviation
pub const FLIGHT_TOLERANCE: f64 = 0.3;
/// Absolute tolerance on error-rate deviation
pub const ERROR_TOLERANCE: f64 = 0.2;

/// Outcome of the per-feature threshold comparison
#[derive(Clone, Copy, Debug)]
pub struct ThresholdReport {
    pub dwell_ok: bool,
    pub flight_ok: bool,
    pub error_ok: bool,
}

impl ThresholdReport {
    /// All three features must be inside tolerance
    pub fn passed(&self) -> bool {
        self.dwell_ok && self.flight_ok && self.error_ok
    }
}

/// Compare a fresh vector against the enrolled profile
pub fn check_thresholds(fresh: &FeatureVector, stored: &FeatureVector) -> ThresholdReport {
    ThresholdReport {
        dwell_ok: (fresh.avg_dwell - stored.avg_dwell).abs() <= stored.avg_dwell * DWELL_TOLERANCE,
        flight_ok: (fresh.avg_flight - stored.avg_flight).abs()
            <= stored.avg_flight * FLIGHT_TOLERANCE,
        error_ok: (fresh.error_rate - stored.error_rate).abs() <= ERROR_TOLERANCE
            && (0.0..=1.0).contains(&fresh.error_rate),
    }
}

/// Identity prediction from typing features.
///
/// Optional capability: absence or failure of the model must never fail an
/// attempt on its own.
pub trait TypingClassifier: Send + Sync {
    fn predict(&self, features: &FeatureVector) -> Result<AccountId>;
}

#[derive(Debug, Serialize, Deserialize)]
struct ModelEntry {
    account_id: AccountId,
    features: FeatureVector,
}

/// Nearest-neighbour model over all enrolled profiles.
///
/// Rebuilt wholesale by the administrative retrain and persisted as a JSON
/// artifact; authentication only ever reads it.
#[derive(Debug, Serialize, Deserialize)]
pub struct KnnModel {
    entries: Vec<ModelEntry>,
}

impl KnnModel {
    /// Fit over the enrolled profiles. Needs at least two.
    pub fn fit(profiles: &[(AccountId, FeatureVector)]) -> Result<Self> {
        ensure!(
            profiles.len() >= 2,
            "need at least 2 enrolled profiles to train"
        );
        Ok(KnnModel {
            entries: profiles
                .iter()
                .map(|(account_id, features)| ModelEntry {
                    account_id: account_id.clone(),
                    features: *features,
                })
                .collect(),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open typing model {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file)).context("Failed to parse typing model")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to write typing model {}", path.display()))?;
        serde_json::to_writer_pretty(file, self).context("Failed to serialize typing model")
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn distance(a: &FeatureVector, b: &FeatureVector) -> f64 {
        let dd = a.avg_dwell - b.avg_dwell;
        let df = a.avg_flight - b.avg_flight;
        let de = a.error_rate - b.error_rate;
        (dd * dd + df * df + de * de).sqrt()
    }
}

impl TypingClassifier for KnnModel {
    /// Majority vote over the k = min(3, n) nearest entries, ties broken by
    /// proximity
    fn predict(&self, features: &FeatureVector) -> Result<AccountId> {
        ensure!(!self.entries.is_empty(), "typing model has no entries");

        let mut ranked: Vec<(f64, &AccountId)> = self
            .entries
            .iter()
            .map(|entry| (Self::distance(features, &entry.features), &entry.account_id))
            .collect();
        ranked.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

        let k = ranked.len().min(3);
        let mut tally: Vec<(&AccountId, usize, f64)> = Vec::new();
        for &(dist, id) in ranked.iter().take(k) {
            match tally.iter_mut().find(|entry| entry.0 == id) {
                Some(entry) => entry.1 += 1,
                None => tally.push((id, 1, dist)),
            }
        }
        tally.sort_by(|a, b| {
            b.1.cmp(&a.1)
                .then(a.2.partial_cmp(&b.2).unwrap_or(Ordering::Equal))
        });

        Ok(tally[0].0.clone())
    }
}

// src/security/features.rs - Behavioral feature extraction from capture rounds
use crate::models::{FeatureVector, KeystrokeRecord};
use crate::security::capture::{CapturedLine, KeyEvent, KeystrokeCapture};

/// Result of one acquisition: valid round count, aggregate features, and the
/// kept events as persistable records
#[derive(Clone, Debug)]
pub struct SampleSet {
    pub samples: u32,
    pub features: FeatureVector,
    pub keystrokes: Vec<KeystrokeRecord>,
}

/// Run `samples_needed` capture rounds against `phrase` and extract features
pub fn acquire(
    capture: &mut dyn KeystrokeCapture,
    phrase: &str,
    samples_needed: u32,
) -> std::io::Result<SampleSet> {
    let mut rounds = Vec::with_capacity(samples_needed as usize);
    for i in 0..samples_needed {
        rounds.push(capture.capture_line(&format!("{}. ", i + 1))?);
    }
    Ok(extract(&rounds, phrase, samples_needed))
}

/// Pure extraction over completed rounds. Deterministic for identical input.
///
/// A round is valid only when the typed text equals the phrase exactly and at
/// least phrase-length key events were captured; a valid round contributes
/// its first phrase-length events to the timing pool. Error counting is
/// position-wise mismatch plus length deficit, a deliberate approximation
/// kept compatible with enrolled data (no edit distance).
pub fn extract(rounds: &[CapturedLine], phrase: &str, samples_needed: u32) -> SampleSet {
    let phrase_len = phrase.chars().count();
    let mut kept: Vec<KeyEvent> = Vec::new();
    let mut valid_samples = 0u32;
    let mut total_errors = 0usize;

    for round in rounds {
        if round.text == phrase {
            if round.events.len() >= phrase_len {
                kept.extend(round.events.iter().take(phrase_len).copied());
                valid_samples += 1;
            } else {
                // Text matched but the event stream came up short: count the
                // whole round as missed
                total_errors += phrase_len;
            }
        } else {
            let mismatches = round
                .text
                .chars()
                .zip(phrase.chars())
                .filter(|(typed, expected)| typed != expected)
                .count();
            let deficit = phrase_len.saturating_sub(round.text.chars().count());
            total_errors += mismatches + deficit;
        }
    }

    let total_expected = phrase_len * samples_needed as usize;
    let error_rate = if total_expected > 0 {
        (total_errors as f64 / total_expected as f64).clamp(0.0, 1.0)
    } else {
        1.0
    };

    let dwells: Vec<f64> = kept
        .iter()
        .filter_map(|e| e.release_ms.map(|release| release - e.press_ms))
        .collect();

    // Flight spans the whole kept stream: the gap between the last key of one
    // round and the first key of the next counts as one flight, and only the
    // final event of the stream has none
    let flights: Vec<Option<f64>> = kept
        .iter()
        .enumerate()
        .map(|(i, e)| match (e.release_ms, kept.get(i + 1)) {
            (Some(release), Some(next)) => Some(next.press_ms - release),
            _ => None,
        })
        .collect();
    let flight_values: Vec<f64> = flights.iter().flatten().copied().collect();

    let features = FeatureVector {
        avg_dwell: mean(&dwells),
        avg_flight: mean(&flight_values),
        error_rate,
    };

    let keystrokes = kept
        .iter()
        .enumerate()
        .map(|(i, e)| KeystrokeRecord {
            key: e.key,
            press_ms: e.press_ms,
            release_ms: e.release_ms,
            dwell_ms: e.release_ms.map(|release| release - e.press_ms),
            flight_ms: flights[i],
        })
        .collect();

    SampleSet {
        samples: valid_samples,
        features,
        keystrokes,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::capture::ScriptedCapture;

    const PHRASE: &str = "fox";

    fn clean_rounds(count: usize) -> Vec<CapturedLine> {
        (0..count)
            .map(|i| ScriptedCapture::round(PHRASE, 1_000.0 + i as f64 * 5_000.0, 80.0, 120.0))
            .collect()
    }

    #[test]
    fn test_all_valid_rounds() {
        let set = extract(&clean_rounds(5), PHRASE, 5);
        assert_eq!(set.samples, 5);
        assert_eq!(set.features.error_rate, 0.0);
        assert_eq!(set.features.avg_dwell, 80.0);
        assert_eq!(set.keystrokes.len(), 15);
    }

    #[test]
    fn test_one_missed_round_raises_error_rate() {
        let mut rounds = clean_rounds(4);
        rounds.push(CapturedLine {
            text: String::new(),
            events: Vec::new(),
        });
        let set = extract(&rounds, PHRASE, 5);
        assert_eq!(set.samples, 4);
        // One fully missed round over 5 rounds of "fox": 3 / 15
        assert!((set.features.error_rate - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_positionwise_mismatch_and_deficit() {
        // "fax" has one mismatched position, "f" is two characters short
        let rounds = vec![
            CapturedLine {
                text: "fax".to_string(),
                events: Vec::new(),
            },
            CapturedLine {
                text: "f".to_string(),
                events: Vec::new(),
            },
        ];
        let set = extract(&rounds, PHRASE, 2);
        assert_eq!(set.samples, 0);
        assert!((set.features.error_rate - 3.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_matching_text_with_short_event_stream_is_missed() {
        let mut round = ScriptedCapture::round(PHRASE, 1_000.0, 80.0, 120.0);
        round.events.truncate(2);
        let set = extract(&[round], PHRASE, 1);
        assert_eq!(set.samples, 0);
        assert_eq!(set.features.error_rate, 1.0);
        assert!(set.keystrokes.is_empty());
    }

    #[test]
    fn test_no_valid_rounds_zeroes_timing() {
        let rounds = vec![CapturedLine {
            text: "wrong".to_string(),
            events: Vec::new(),
        }];
        let set = extract(&rounds, PHRASE, 1);
        assert_eq!(set.features.avg_dwell, 0.0);
        assert_eq!(set.features.avg_flight, 0.0);
    }

    #[test]
    fn test_flight_crosses_round_boundary() {
        let rounds = clean_rounds(2);
        let set = extract(&rounds, PHRASE, 2);
        // 6 kept events yield 5 flights: 4 in-round gaps of 120 ms and one
        // boundary gap between rounds
        let boundary = rounds[1].events[0].press_ms - rounds[0].events[2].release_ms.unwrap();
        let expected = (4.0 * 120.0 + boundary) / 5.0;
        assert!((set.features.avg_flight - expected).abs() < 1e-9);
        // Only the stream-final record lacks a flight time
        let without_flight = set
            .keystrokes
            .iter()
            .filter(|r| r.flight_ms.is_none())
            .count();
        assert_eq!(without_flight, 1);
        assert!(set.keystrokes.last().unwrap().flight_ms.is_none());
    }

    #[test]
    fn test_extraction_is_reproducible() {
        let rounds = clean_rounds(3);
        let a = extract(&rounds, PHRASE, 3);
        let b = extract(&rounds, PHRASE, 3);
        assert_eq!(a.features, b.features);
    }

    #[test]
    fn test_unreleased_key_excluded_from_dwell() {
        let mut rounds = clean_rounds(1);
        rounds[0].events[1].release_ms = None;
        let set = extract(&rounds, PHRASE, 1);
        // Two of three events still carry a dwell
        assert_eq!(set.features.avg_dwell, 80.0);
        assert!(set.keystrokes[1].dwell_ms.is_none());
        // The unreleased key has no flight either
        assert!(set.keystrokes[1].flight_ms.is_none());
    }

    #[test]
    fn test_acquire_runs_requested_rounds() {
        let mut capture = ScriptedCapture::new(clean_rounds(3));
        let set = acquire(&mut capture, PHRASE, 3).unwrap();
        assert_eq!(set.samples, 3);
    }
}

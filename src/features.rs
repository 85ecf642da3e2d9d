//! Pure, allocation-free feature extractors over a PCM buffer.
//!
//! Each function is defined over `&[i16]` only and produces the same `f64`
//! for the same input on every call - no hidden state, no RNG, no clock.

/// Root-mean-square energy. `0.0` for an empty buffer.
pub fn energy(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut sum_squares = 0.0_f64;
    for &s in samples {
        let v = s as f64;
        sum_squares += v * v;
    }
    (sum_squares / samples.len() as f64).sqrt()
}

/// Proportion of adjacent-sample sign flips. Sign of `0` counts as
/// non-negative. `0.0` when `samples.len() < 2`.
pub fn zero_crossing_rate(samples: &[i16]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let mut crossings = 0u64;
    for w in samples.windows(2) {
        let (prev, cur) = (w[0], w[1]);
        if (prev >= 0 && cur < 0) || (prev < 0 && cur >= 0) {
            crossings += 1;
        }
    }
    crossings as f64 / (samples.len() - 1) as f64
}

/// Magnitude-weighted index average - a cheap time-domain surrogate for a
/// true FFT spectral centroid. `0.0` when all samples are zero.
pub fn spectral_centroid(samples: &[i16]) -> f64 {
    let mut sum_magnitude = 0.0_f64;
    let mut weighted_sum = 0.0_f64;
    for (i, &s) in samples.iter().enumerate() {
        let magnitude = (s as f64).abs();
        sum_magnitude += magnitude;
        weighted_sum += magnitude * i as f64;
    }
    if sum_magnitude == 0.0 {
        return 0.0;
    }
    weighted_sum / sum_magnitude
}

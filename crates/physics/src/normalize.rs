//! Telemetry normalization.
//!
//! Maps a raw telemetry sample onto the bounded pressure cube [−1, 1]³.
//! The sign encodes direction: positive pressure means worse than the
//! baseline, negative means better.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::Baselines;
use crate::guard::safe_tanh;
use crate::vector::PressureVector;

/// One raw telemetry sample for a route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    /// Observed request latency, milliseconds.
    pub latency_ms: f64,
    /// Observed error rate in [0, 1].
    pub error_rate: f64,
    /// Observed resource saturation in [0, 1].
    pub saturation: f64,
}

impl Telemetry {
    pub fn new(latency_ms: f64, error_rate: f64, saturation: f64) -> Self {
        Self { latency_ms, error_rate, saturation }
    }
}

/// Normalize one component: `tanh(k · (raw − baseline) / baseline)`.
///
/// A non-positive baseline has nothing to deviate from and yields 0.
#[inline]
pub fn normalize_component(raw: f64, baseline: f64, tanh_scale: f64) -> f64 {
    if baseline <= 0.0 || !baseline.is_finite() {
        return 0.0;
    }
    safe_tanh(tanh_scale * (raw - baseline) / baseline)
}

/// Normalize a full sample against a route's baselines.
///
/// Invalid raw fields (non-finite, or rates outside [0, 1]) are coerced to
/// zero pressure with a warn per offending field; the tick proceeds.
///
/// A zero-valued field reads as silence for the window (no observations),
/// not as a deviation: it contributes zero pressure, without a warn.
pub fn normalize_sample(
    sample: &Telemetry,
    baselines: &Baselines,
    tanh_scale: f64,
) -> PressureVector {
    let latency = sanitize(sample.latency_ms, 0.0, f64::MAX, "latency_ms");
    let error = sanitize(sample.error_rate, 0.0, 1.0, "error_rate");
    let saturation = sanitize(sample.saturation, 0.0, 1.0, "saturation");

    PressureVector {
        latency: latency
            .map(|raw| normalize_component(raw, baselines.baseline_latency_ms, tanh_scale))
            .unwrap_or(0.0),
        error: error
            .map(|raw| normalize_component(raw, baselines.target_error_rate, tanh_scale))
            .unwrap_or(0.0),
        saturation: saturation
            .map(|raw| normalize_component(raw, baselines.baseline_saturation, tanh_scale))
            .unwrap_or(0.0),
    }
    .clamp_unit()
}

/// `Some(raw)` when the field carries a usable signal, `None` otherwise.
/// Only an *invalid* field warns; a zero field is ordinary silence.
fn sanitize(raw: f64, lo: f64, hi: f64, field: &'static str) -> Option<f64> {
    if !raw.is_finite() || raw < lo || raw > hi {
        warn!(field, raw, "invalid telemetry field coerced to zero pressure");
        return None;
    }
    if raw == 0.0 {
        return None;
    }
    Some(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baselines() -> Baselines {
        Baselines {
            baseline_latency_ms: 50.0,
            target_error_rate: 0.01,
            baseline_saturation: 0.8,
        }
    }

    #[test]
    fn test_at_baseline_is_zero_pressure() {
        assert_eq!(normalize_component(50.0, 50.0, 1.0), 0.0);
    }

    #[test]
    fn test_sign_encodes_direction() {
        assert!(normalize_component(100.0, 50.0, 1.0) > 0.0);
        assert!(normalize_component(25.0, 50.0, 1.0) < 0.0);
    }

    #[test]
    fn test_output_strictly_bounded() {
        let p = normalize_component(1e9, 50.0, 1.0);
        assert!(p <= 1.0 && p > 0.99);
        let n = normalize_component(0.0, 50.0, 4.0);
        assert!(n >= -1.0 && n < 0.0);
    }

    #[test]
    fn test_non_positive_baseline_yields_zero() {
        assert_eq!(normalize_component(100.0, 0.0, 1.0), 0.0);
        assert_eq!(normalize_component(100.0, -5.0, 1.0), 0.0);
    }

    #[test]
    fn test_sample_normalization() {
        let sample = Telemetry::new(100.0, 0.01, 0.4);
        let p = normalize_sample(&sample, &baselines(), 1.0);
        assert!(p.latency > 0.0);
        assert_eq!(p.error, 0.0);
        assert!(p.saturation < 0.0);
    }

    #[test]
    fn test_invalid_fields_coerced_to_zero() {
        let sample = Telemetry::new(f64::NAN, 1.7, -0.2);
        let p = normalize_sample(&sample, &baselines(), 1.0);
        assert_eq!(p, PressureVector::ZERO);
    }

    #[test]
    fn test_zero_fields_read_as_silence() {
        // A window with no traffic reports zeros; that is not a deviation
        // below baseline, it is the absence of a signal.
        let sample = Telemetry::new(0.0, 0.0, 0.0);
        let p = normalize_sample(&sample, &baselines(), 1.0);
        assert_eq!(p, PressureVector::ZERO);
    }
}

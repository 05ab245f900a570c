//! Pressure vector algebra.
//!
//! A `PressureVector` is the normalized deviation of (latency, error,
//! saturation) telemetry from a route's baselines, each component bounded
//! to [−1, 1]. All operations route through the numeric guards so the
//! algebra stays total.

use serde::{Deserialize, Serialize};

use crate::guard::{clamp_to_zero, safe_clamp, safe_divide};

/// Normalized (latency, error, saturation) deviation, each in [−1, 1].
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct PressureVector {
    pub latency: f64,
    pub error: f64,
    pub saturation: f64,
}

/// Per-component sensitivity weights, derived from SLO criticality.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityWeights {
    pub w_latency: f64,
    pub w_error: f64,
    pub w_saturation: f64,
}

impl PressureVector {
    pub const ZERO: PressureVector = PressureVector {
        latency: 0.0,
        error: 0.0,
        saturation: 0.0,
    };

    pub fn new(latency: f64, error: f64, saturation: f64) -> Self {
        Self { latency, error, saturation }
    }

    #[inline]
    pub fn add(&self, other: &PressureVector) -> PressureVector {
        PressureVector {
            latency: self.latency + other.latency,
            error: self.error + other.error,
            saturation: self.saturation + other.saturation,
        }
    }

    #[inline]
    pub fn subtract(&self, other: &PressureVector) -> PressureVector {
        PressureVector {
            latency: self.latency - other.latency,
            error: self.error - other.error,
            saturation: self.saturation - other.saturation,
        }
    }

    #[inline]
    pub fn scale(&self, factor: f64) -> PressureVector {
        PressureVector {
            latency: self.latency * factor,
            error: self.error * factor,
            saturation: self.saturation * factor,
        }
    }

    /// Component-wise division; a zero or unsafe divisor yields 0.
    #[inline]
    pub fn divide(&self, divisor: f64) -> PressureVector {
        PressureVector {
            latency: safe_divide(self.latency, divisor, 0.0),
            error: safe_divide(self.error, divisor, 0.0),
            saturation: safe_divide(self.saturation, divisor, 0.0),
        }
    }

    /// Euclidean magnitude.
    ///
    /// The squared sum passes through `clamp_to_zero` before the square
    /// root so that `magnitude(v)²` and `dot(v, v)` agree to within
    /// `PHYSICS_EPSILON` (no phantom energy).
    #[inline]
    pub fn magnitude(&self) -> f64 {
        clamp_to_zero(self.squared_sum()).sqrt()
    }

    /// Self dot product, with the same zero clamp as `magnitude`.
    #[inline]
    pub fn dot(&self, other: &PressureVector) -> f64 {
        clamp_to_zero(
            self.latency * other.latency
                + self.error * other.error
                + self.saturation * other.saturation,
        )
    }

    /// Component-wise product with the sensitivity weights.
    #[inline]
    pub fn hadamard(&self, weights: &SensitivityWeights) -> PressureVector {
        PressureVector {
            latency: self.latency * weights.w_latency,
            error: self.error * weights.w_error,
            saturation: self.saturation * weights.w_saturation,
        }
    }

    /// Sum of components.
    #[inline]
    pub fn sum(&self) -> f64 {
        self.latency + self.error + self.saturation
    }

    /// Weighted pressure term of the resistance law: Σ(P ⊙ W).
    #[inline]
    pub fn weighted_sum(&self, weights: &SensitivityWeights) -> f64 {
        self.hadamard(weights).sum()
    }

    /// Clamp each component into [−1, 1]; unsafe components land on 0.
    #[inline]
    pub fn clamp_unit(&self) -> PressureVector {
        PressureVector {
            latency: safe_clamp(self.latency, -1.0, 1.0),
            error: safe_clamp(self.error, -1.0, 1.0),
            saturation: safe_clamp(self.saturation, -1.0, 1.0),
        }
    }

    /// Magnitude of the positive components only (the check valve).
    ///
    /// Negative deviation means better-than-baseline; it is clamped to 0
    /// *before* squaring so that healthy telemetry can never register as
    /// stress. Silence is not trauma.
    #[inline]
    pub fn positive_stress_magnitude(&self) -> f64 {
        let lat = self.latency.max(0.0);
        let err = self.error.max(0.0);
        let sat = self.saturation.max(0.0);
        clamp_to_zero(lat * lat + err * err + sat * sat).sqrt()
    }

    #[inline]
    fn squared_sum(&self) -> f64 {
        self.latency * self.latency
            + self.error * self.error
            + self.saturation * self.saturation
    }
}

impl SensitivityWeights {
    pub fn new(w_latency: f64, w_error: f64, w_saturation: f64) -> Self {
        Self { w_latency, w_error, w_saturation }
    }
}

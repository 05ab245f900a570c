//! Resistance synthesis: Ohm's law of admission.

use crate::config::PhysicsConfig;
use crate::guard::{is_safe_number, MAX_SAFE_RESISTANCE};
use crate::vector::{PressureVector, SensitivityWeights};

/// ```text
/// R = base + Σ(P ⊙ W) + μ·M + S + κ·Δt_s
/// ```
///
/// The weighted pressure term is signed: better-than-baseline telemetry
/// pulls R toward the floor. R is clamped to
/// `[base_resistance, MAX_SAFE_RESISTANCE]`; an unsafe intermediate
/// collapses to the floor.
#[inline]
pub fn calculate_resistance(
    pressure: &PressureVector,
    momentum: f64,
    scar: f64,
    weights: &SensitivityWeights,
    config: &PhysicsConfig,
    delta_t_ms: f64,
) -> f64 {
    let staleness = config.staleness_factor * (delta_t_ms / 1_000.0);
    let total = config.base_resistance
        + pressure.weighted_sum(weights)
        + config.damping_factor * momentum
        + scar
        + staleness;

    if !is_safe_number(total) {
        return config.base_resistance;
    }
    total.clamp(config.base_resistance, MAX_SAFE_RESISTANCE)
}

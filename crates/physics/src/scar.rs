//! Scar tissue: exponentially decaying memory of traumatic ticks.

use crate::config::PhysicsConfig;
use crate::guard::{clamp_to_zero, safe_exp};
use crate::vector::PressureVector;

/// One scar update:
///
/// ```text
/// S(t) = S(t−1) · exp(−λ · Δt_s) + (‖P⁺‖ > P_crit ? σ · profile_mult : 0) + inflation
/// ```
///
/// `‖P⁺‖` is the positive stress magnitude — the check valve: only pressure
/// above baseline can wound. `inflation` carries the overrun penalty from a
/// failed or timed-out lease into this tick. The result is clamped to zero
/// below the epsilon band so scar cannot linger as a denormal.
#[inline]
pub fn update_scar(
    current_scar: f64,
    pressure: &PressureVector,
    delta_t_ms: f64,
    profile_scar_multiplier: f64,
    inflation: f64,
    config: &PhysicsConfig,
) -> f64 {
    let delta_t_s = delta_t_ms / 1_000.0;
    let decayed = current_scar * safe_exp(-config.decay_rate * delta_t_s, 0.0);

    let trauma = if pressure.positive_stress_magnitude() > config.critical_pressure {
        config.scar_factor * profile_scar_multiplier
    } else {
        0.0
    };

    clamp_to_zero(decayed + trauma + inflation.max(0.0)).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PhysicsConfig {
        PhysicsConfig { decay_rate: 1.0, scar_factor: 5.0, critical_pressure: 0.4, ..Default::default() }
    }

    #[test]
    fn test_decay_without_trauma() {
        let scar = update_scar(10.0, &PressureVector::ZERO, 1_000.0, 1.0, 0.0, &config());
        assert!((scar - 10.0 * (-1.0f64).exp()).abs() < 1e-9);
    }

    #[test]
    fn test_trauma_above_critical_pressure() {
        let pressure = PressureVector::new(0.5, 0.0, 0.0);
        let scar = update_scar(0.0, &pressure, 100.0, 1.0, 0.0, &config());
        assert_eq!(scar, 5.0);
    }

    #[test]
    fn test_profile_multiplier_scales_trauma() {
        let pressure = PressureVector::new(0.9, 0.0, 0.0);
        let heavy = update_scar(0.0, &pressure, 100.0, 0.5, 0.0, &config());
        let light = update_scar(0.0, &pressure, 100.0, 2.0, 0.0, &config());
        assert_eq!(heavy, 2.5);
        assert_eq!(light, 10.0);
    }

    #[test]
    fn test_negative_pressure_never_wounds() {
        let healthy = PressureVector::new(-1.0, -1.0, -1.0);
        let scar = update_scar(4.0, &healthy, 500.0, 1.0, 0.0, &config());
        assert!(scar < 4.0);
    }

    #[test]
    fn test_scar_decays_to_exact_zero() {
        // Long quiet stretch: decay must land on 0, not a denormal.
        let mut scar = 1.0;
        for _ in 0..100 {
            scar = update_scar(scar, &PressureVector::ZERO, 1_000.0, 1.0, 0.0, &config());
        }
        assert_eq!(scar, 0.0);
    }

    #[test]
    fn test_inflation_adds_once() {
        let scar = update_scar(0.0, &PressureVector::ZERO, 100.0, 1.0, 7.5, &config());
        assert_eq!(scar, 7.5);
    }
}

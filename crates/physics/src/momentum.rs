//! Momentum: magnitude of pressure change per unit time.

use crate::guard::{clamp_to_zero, safe_divide};
use crate::vector::PressureVector;

/// `M(t) = ‖P(t) − P(t−1)‖ / Δt_ms`, always ≥ 0.
///
/// A non-positive delta-t carries no rate information and yields 0.
#[inline]
pub fn update_momentum(
    previous_pressure: &PressureVector,
    pressure: &PressureVector,
    delta_t_ms: f64,
) -> f64 {
    if delta_t_ms <= 0.0 {
        return 0.0;
    }
    let change = pressure.subtract(previous_pressure).magnitude();
    clamp_to_zero(safe_divide(change, delta_t_ms, 0.0)).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_change_no_momentum() {
        let p = PressureVector::new(0.5, 0.2, 0.3);
        assert_eq!(update_momentum(&p, &p, 100.0), 0.0);
    }

    #[test]
    fn test_momentum_scales_inversely_with_time() {
        let prev = PressureVector::ZERO;
        let curr = PressureVector::new(0.6, 0.0, 0.0);
        let fast = update_momentum(&prev, &curr, 100.0);
        let slow = update_momentum(&prev, &curr, 1_000.0);
        assert!(fast > slow);
        assert!((fast - 0.006).abs() < 1e-12);
    }

    #[test]
    fn test_zero_delta_t_yields_zero() {
        let prev = PressureVector::ZERO;
        let curr = PressureVector::new(1.0, 0.0, 0.0);
        assert_eq!(update_momentum(&prev, &curr, 0.0), 0.0);
    }

    #[test]
    fn test_momentum_non_negative_for_any_direction() {
        let prev = PressureVector::new(0.9, 0.9, 0.9);
        let curr = PressureVector::new(-0.9, -0.9, -0.9);
        assert!(update_momentum(&prev, &curr, 50.0) > 0.0);
    }
}

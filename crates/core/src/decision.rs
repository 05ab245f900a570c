//! Admit/shed decisions and multi-route selection.

use rand::Rng;
use serde::{Deserialize, Serialize};

use atrion_physics::guard::safe_exp;
use atrion_physics::{OperationalMode, RouteState};

/// Default request priority when the caller supplies none.
pub const DEFAULT_VOLTAGE: f64 = 100.0;

/// Fraction of the break point at which the soft guard stops admitting.
const SOFT_BREAK_FRACTION: f64 = 0.8;

/// The engine's answer for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub allow: bool,
    pub resistance: f64,
    pub mode: OperationalMode,
    pub reason: String,
}

/// Admit iff the breaker is closed and the request's voltage strictly
/// exceeds the resistance. Equal voltage is rejected.
pub fn decide_flow(mode: OperationalMode, resistance: f64, voltage: f64) -> Decision {
    if mode == OperationalMode::CircuitBreaker {
        return Decision {
            allow: false,
            resistance,
            mode,
            reason: "Circuit breaker open".to_string(),
        };
    }
    if voltage > resistance {
        Decision { allow: true, resistance, mode, reason: "OK".to_string() }
    } else {
        Decision {
            allow: false,
            resistance,
            mode,
            reason: format!("Insufficient voltage: V={voltage} ≤ R={resistance}"),
        }
    }
}

/// Voltage-free guard: admit while the breaker is closed and resistance
/// stays under 80% of the break point.
pub fn soft_admit(mode: OperationalMode, resistance: f64, break_point: f64) -> bool {
    mode != OperationalMode::CircuitBreaker && resistance < SOFT_BREAK_FRACTION * break_point
}

/// Softmax route selection with temperature β.
///
/// `P(j) ∝ exp(−β·R_j)` over non-breaker routes; β = 0 is uniform, large β
/// is nearly deterministic toward the lowest resistance. Weights are
/// computed against the minimum resistance so large β cannot underflow
/// every candidate at once.
pub fn select_route<'a, R: Rng>(states: &'a [RouteState], beta: f64, rng: &mut R) -> Option<&'a str> {
    let candidates: Vec<(&str, f64)> = states
        .iter()
        .filter(|state| state.mode() != OperationalMode::CircuitBreaker)
        .map(|state| (state.route_id(), state.resistance()))
        .collect();
    if candidates.is_empty() {
        return None;
    }

    let min_resistance =
        candidates.iter().map(|(_, r)| *r).fold(f64::INFINITY, f64::min);
    let weights: Vec<f64> = candidates
        .iter()
        .map(|(_, r)| safe_exp(-beta * (r - min_resistance), 0.0))
        .collect();
    let total: f64 = weights.iter().sum();
    if !(total > 0.0) || !total.is_finite() {
        // Degenerate weights: fall back to the lowest-resistance route.
        return candidates
            .iter()
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(id, _)| *id);
    }

    let mut draw = rng.random::<f64>() * total;
    for ((id, _), weight) in candidates.iter().zip(&weights) {
        draw -= weight;
        if draw <= 0.0 {
            return Some(id);
        }
    }
    candidates.last().map(|(id, _)| *id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use atrion_physics::{OperationalState, PressureVector};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn operational(route_id: &str, resistance: f64) -> RouteState {
        RouteState::Operational(OperationalState {
            route_id: route_id.to_string(),
            pressure: PressureVector::ZERO,
            previous_pressure: PressureVector::ZERO,
            momentum: 0.0,
            scar_tissue: 0.0,
            resistance,
            tick_count: 1,
            last_updated_at: 0,
        })
    }

    fn breaker(route_id: &str) -> RouteState {
        RouteState::CircuitBreaker(atrion_physics::CircuitBreakerState {
            route_id: route_id.to_string(),
            pressure: PressureVector::ZERO,
            previous_pressure: PressureVector::ZERO,
            momentum: 0.0,
            scar_tissue: 0.0,
            resistance: 500.0,
            tick_count: 1,
            last_updated_at: 0,
            recovery_started_at: 0,
        })
    }

    #[test]
    fn test_equal_voltage_rejected() {
        let decision = decide_flow(OperationalMode::Operational, 100.0, 100.0);
        assert!(!decision.allow);
        assert!(decision.reason.starts_with("Insufficient voltage"));
    }

    #[test]
    fn test_breaker_rejects_any_voltage() {
        let decision = decide_flow(OperationalMode::CircuitBreaker, 10.0, 1e9);
        assert!(!decision.allow);
        assert_eq!(decision.reason, "Circuit breaker open");
    }

    #[test]
    fn test_strictly_higher_voltage_admits() {
        let decision = decide_flow(OperationalMode::Operational, 100.0, 100.001);
        assert!(decision.allow);
        assert_eq!(decision.reason, "OK");
    }

    #[test]
    fn test_soft_guard_threshold() {
        assert!(soft_admit(OperationalMode::Operational, 79.0, 100.0));
        assert!(!soft_admit(OperationalMode::Operational, 80.0, 100.0));
        assert!(!soft_admit(OperationalMode::CircuitBreaker, 1.0, 100.0));
    }

    #[test]
    fn test_select_excludes_breaker_routes() {
        let states = vec![breaker("down"), operational("up", 20.0)];
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..20 {
            assert_eq!(select_route(&states, 1.0, &mut rng), Some("up"));
        }
    }

    #[test]
    fn test_select_all_breakers_yields_none() {
        let states = vec![breaker("a"), breaker("b")];
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        assert_eq!(select_route(&states, 1.0, &mut rng), None);
    }

    #[test]
    fn test_select_is_deterministic_under_seed() {
        let states =
            vec![operational("a", 10.0), operational("b", 15.0), operational("c", 30.0)];
        let picks = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            (0..50).map(|_| select_route(&states, 0.2, &mut rng).unwrap().to_string()).collect::<Vec<_>>()
        };
        assert_eq!(picks(42), picks(42));
    }

    #[test]
    fn test_large_beta_is_greedy() {
        let states = vec![operational("low", 10.0), operational("high", 11.0)];
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..50 {
            assert_eq!(select_route(&states, 1_000.0, &mut rng), Some("low"));
        }
    }

    #[test]
    fn test_beta_zero_reaches_every_route() {
        let states = vec![operational("a", 10.0), operational("b", 1_000.0)];
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(select_route(&states, 0.0, &mut rng).unwrap());
        }
        assert_eq!(seen.len(), 2, "β = 0 must be uniform over candidates");
    }
}

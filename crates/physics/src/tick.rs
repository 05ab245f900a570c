//! The pure physics tick.
//!
//! `advance` is a pure function of (previous state, new pressure, weights,
//! config, caller-supplied clock reading, active thresholds). It reads no
//! wall clock, no randomness, no I/O; determinism of the whole engine rests
//! on this function, so everything ambient is an explicit input.

use crate::config::PhysicsConfig;
use crate::guard::safe_delta_t;
use crate::momentum::update_momentum;
use crate::resistance::calculate_resistance;
use crate::scar::update_scar;
use crate::state::{
    BootstrapState, CircuitBreakerState, ModeTransition, OperationalMode, OperationalState,
    RouteState,
};
use crate::tuner::Thresholds;
use crate::vector::{PressureVector, SensitivityWeights};

/// Inputs of one tick. Everything the physics needs, nothing ambient.
#[derive(Debug, Clone)]
pub struct TickInput<'a> {
    /// Normalized, sanitized pressure for this tick.
    pub pressure: PressureVector,
    pub weights: &'a SensitivityWeights,
    pub config: &'a PhysicsConfig,
    /// Caller-supplied clock reading, ms.
    pub now_ms: u64,
    /// Break/recovery pair to compare the new resistance against.
    pub thresholds: Thresholds,
    /// Scar multiplier of the route's active workload profile.
    pub profile_scar_multiplier: f64,
    /// Overrun penalty carried over from a failed or timed-out lease.
    pub scar_inflation: f64,
}

/// Result of one tick.
#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub state: RouteState,
    pub transition: Option<ModeTransition>,
    pub delta_t_ms: f64,
    pub pressure_magnitude: f64,
}

/// Advance a route's state by one tick.
pub fn advance(prev: &RouteState, input: &TickInput) -> TickOutcome {
    let pressure = input.pressure.clamp_unit();
    let delta_t_ms = safe_delta_t(input.now_ms, prev.last_updated_at(), input.config.min_delta_t_ms);
    // Monotone guard: a skewed clock never rolls the timestamp back.
    let updated_at = input.now_ms.max(prev.last_updated_at());

    match prev {
        RouteState::Bootstrap(s) if s.tick_count < input.config.bootstrap_ticks => {
            // Warm-up: record pressure and count; no physics emitted.
            let state = RouteState::Bootstrap(BootstrapState {
                route_id: s.route_id.clone(),
                pressure,
                scar_tissue: s.scar_tissue,
                resistance: s.resistance,
                tick_count: s.tick_count + 1,
                last_updated_at: updated_at,
            });
            TickOutcome {
                state,
                transition: None,
                delta_t_ms,
                pressure_magnitude: pressure.magnitude(),
            }
        }
        RouteState::Bootstrap(s) => {
            // Warm-up complete: first full tick, momentum starts at zero.
            let scar = update_scar(
                s.scar_tissue,
                &pressure,
                delta_t_ms,
                input.profile_scar_multiplier,
                input.scar_inflation,
                input.config,
            );
            let resistance =
                calculate_resistance(&pressure, 0.0, scar, input.weights, input.config, delta_t_ms);
            let state = RouteState::Operational(OperationalState {
                route_id: s.route_id.clone(),
                pressure,
                previous_pressure: s.pressure,
                momentum: 0.0,
                scar_tissue: scar,
                resistance,
                tick_count: s.tick_count + 1,
                last_updated_at: updated_at,
            });
            TickOutcome {
                state,
                transition: Some(ModeTransition {
                    from: OperationalMode::Bootstrap,
                    to: OperationalMode::Operational,
                }),
                delta_t_ms,
                pressure_magnitude: pressure.magnitude(),
            }
        }
        RouteState::Operational(s) => {
            let momentum = update_momentum(&s.pressure, &pressure, delta_t_ms);
            let scar = update_scar(
                s.scar_tissue,
                &pressure,
                delta_t_ms,
                input.profile_scar_multiplier,
                input.scar_inflation,
                input.config,
            );
            let resistance = calculate_resistance(
                &pressure,
                momentum,
                scar,
                input.weights,
                input.config,
                delta_t_ms,
            );

            if resistance >= input.thresholds.break_point {
                let state = RouteState::CircuitBreaker(CircuitBreakerState {
                    route_id: s.route_id.clone(),
                    pressure,
                    previous_pressure: s.pressure,
                    momentum,
                    scar_tissue: scar,
                    resistance,
                    tick_count: s.tick_count + 1,
                    last_updated_at: updated_at,
                    recovery_started_at: input.now_ms,
                });
                TickOutcome {
                    state,
                    transition: Some(ModeTransition {
                        from: OperationalMode::Operational,
                        to: OperationalMode::CircuitBreaker,
                    }),
                    delta_t_ms,
                    pressure_magnitude: pressure.magnitude(),
                }
            } else {
                let state = RouteState::Operational(OperationalState {
                    route_id: s.route_id.clone(),
                    pressure,
                    previous_pressure: s.pressure,
                    momentum,
                    scar_tissue: scar,
                    resistance,
                    tick_count: s.tick_count + 1,
                    last_updated_at: updated_at,
                });
                TickOutcome {
                    state,
                    transition: None,
                    delta_t_ms,
                    pressure_magnitude: pressure.magnitude(),
                }
            }
        }
        RouteState::CircuitBreaker(s) => {
            // Physics keeps updating while shed; only admission stops.
            let momentum = update_momentum(&s.pressure, &pressure, delta_t_ms);
            let scar = update_scar(
                s.scar_tissue,
                &pressure,
                delta_t_ms,
                input.profile_scar_multiplier,
                input.scar_inflation,
                input.config,
            );
            let resistance = calculate_resistance(
                &pressure,
                momentum,
                scar,
                input.weights,
                input.config,
                delta_t_ms,
            );

            // Hysteresis: either the resistance path or the healed path
            // (scar below one increment, pressure below critical) releases.
            let healed = scar < input.config.scar_factor
                && pressure.magnitude() < input.config.critical_pressure;
            if resistance < input.thresholds.recovery_point || healed {
                let state = RouteState::Operational(OperationalState {
                    route_id: s.route_id.clone(),
                    pressure,
                    previous_pressure: s.pressure,
                    momentum,
                    scar_tissue: scar,
                    resistance,
                    tick_count: s.tick_count + 1,
                    last_updated_at: updated_at,
                });
                TickOutcome {
                    state,
                    transition: Some(ModeTransition {
                        from: OperationalMode::CircuitBreaker,
                        to: OperationalMode::Operational,
                    }),
                    delta_t_ms,
                    pressure_magnitude: pressure.magnitude(),
                }
            } else {
                let state = RouteState::CircuitBreaker(CircuitBreakerState {
                    route_id: s.route_id.clone(),
                    pressure,
                    previous_pressure: s.pressure,
                    momentum,
                    scar_tissue: scar,
                    resistance,
                    tick_count: s.tick_count + 1,
                    last_updated_at: updated_at,
                    recovery_started_at: s.recovery_started_at,
                });
                TickOutcome {
                    state,
                    transition: None,
                    delta_t_ms,
                    pressure_magnitude: pressure.magnitude(),
                }
            }
        }
    }
}

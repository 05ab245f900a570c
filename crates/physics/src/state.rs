//! Route state machine variants and the cross-node projection.

use serde::{Deserialize, Serialize};

use crate::config::PhysicsConfig;
use crate::vector::PressureVector;

/// Discriminator of the route state machine.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationalMode {
    #[serde(rename = "BOOTSTRAP")]
    Bootstrap,
    #[serde(rename = "OPERATIONAL")]
    Operational,
    #[serde(rename = "CIRCUIT_BREAKER")]
    CircuitBreaker,
}

impl OperationalMode {
    /// Wire spelling, stable for interop.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationalMode::Bootstrap => "BOOTSTRAP",
            OperationalMode::Operational => "OPERATIONAL",
            OperationalMode::CircuitBreaker => "CIRCUIT_BREAKER",
        }
    }
}

/// A mode change observed during one tick.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeTransition {
    pub from: OperationalMode,
    pub to: OperationalMode,
}

/// Warm-up state: pressure and tick bookkeeping only, no physics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapState {
    pub route_id: String,
    pub pressure: PressureVector,
    pub scar_tissue: f64,
    pub resistance: f64,
    pub tick_count: u64,
    pub last_updated_at: u64,
}

/// Steady state with full physics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationalState {
    pub route_id: String,
    pub pressure: PressureVector,
    pub previous_pressure: PressureVector,
    pub momentum: f64,
    pub scar_tissue: f64,
    pub resistance: f64,
    pub tick_count: u64,
    pub last_updated_at: u64,
}

/// Tripped state; physics still updates while shed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    pub route_id: String,
    pub pressure: PressureVector,
    pub previous_pressure: PressureVector,
    pub momentum: f64,
    pub scar_tissue: f64,
    pub resistance: f64,
    pub tick_count: u64,
    pub last_updated_at: u64,
    pub recovery_started_at: u64,
}

/// Per-route state, discriminated by mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode")]
pub enum RouteState {
    #[serde(rename = "BOOTSTRAP")]
    Bootstrap(BootstrapState),
    #[serde(rename = "OPERATIONAL")]
    Operational(OperationalState),
    #[serde(rename = "CIRCUIT_BREAKER")]
    CircuitBreaker(CircuitBreakerState),
}

impl RouteState {
    /// Fresh route: Bootstrap at 1.2 × base resistance, zero scar.
    pub fn bootstrap(route_id: impl Into<String>, config: &PhysicsConfig, now_ms: u64) -> Self {
        RouteState::Bootstrap(BootstrapState {
            route_id: route_id.into(),
            pressure: PressureVector::ZERO,
            scar_tissue: 0.0,
            resistance: config.base_resistance * 1.2,
            tick_count: 0,
            last_updated_at: now_ms,
        })
    }

    pub fn mode(&self) -> OperationalMode {
        match self {
            RouteState::Bootstrap(_) => OperationalMode::Bootstrap,
            RouteState::Operational(_) => OperationalMode::Operational,
            RouteState::CircuitBreaker(_) => OperationalMode::CircuitBreaker,
        }
    }

    pub fn route_id(&self) -> &str {
        match self {
            RouteState::Bootstrap(s) => &s.route_id,
            RouteState::Operational(s) => &s.route_id,
            RouteState::CircuitBreaker(s) => &s.route_id,
        }
    }

    pub fn pressure(&self) -> PressureVector {
        match self {
            RouteState::Bootstrap(s) => s.pressure,
            RouteState::Operational(s) => s.pressure,
            RouteState::CircuitBreaker(s) => s.pressure,
        }
    }

    pub fn resistance(&self) -> f64 {
        match self {
            RouteState::Bootstrap(s) => s.resistance,
            RouteState::Operational(s) => s.resistance,
            RouteState::CircuitBreaker(s) => s.resistance,
        }
    }

    pub fn scar_tissue(&self) -> f64 {
        match self {
            RouteState::Bootstrap(s) => s.scar_tissue,
            RouteState::Operational(s) => s.scar_tissue,
            RouteState::CircuitBreaker(s) => s.scar_tissue,
        }
    }

    /// Momentum scalar; Bootstrap carries none.
    pub fn momentum(&self) -> Option<f64> {
        match self {
            RouteState::Bootstrap(_) => None,
            RouteState::Operational(s) => Some(s.momentum),
            RouteState::CircuitBreaker(s) => Some(s.momentum),
        }
    }

    pub fn tick_count(&self) -> u64 {
        match self {
            RouteState::Bootstrap(s) => s.tick_count,
            RouteState::Operational(s) => s.tick_count,
            RouteState::CircuitBreaker(s) => s.tick_count,
        }
    }

    pub fn last_updated_at(&self) -> u64 {
        match self {
            RouteState::Bootstrap(s) => s.last_updated_at,
            RouteState::Operational(s) => s.last_updated_at,
            RouteState::CircuitBreaker(s) => s.last_updated_at,
        }
    }

    /// The projection that crosses node boundaries.
    pub fn to_vector(&self) -> PhysicsVector {
        PhysicsVector {
            scar: self.scar_tissue(),
            momentum_scalar: self.momentum().unwrap_or(0.0),
            last_tick: self.tick_count(),
            resistance: self.resistance(),
        }
    }
}

/// Sync projection of a route's physics: the only cross-node data shape.
///
/// No wall-clock field by design; conflict resolution orders by
/// `last_tick` so clock skew between nodes cannot reorder writes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicsVector {
    pub scar: f64,
    pub momentum_scalar: f64,
    pub last_tick: u64,
    pub resistance: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_construction() {
        let config = PhysicsConfig::default();
        let state = RouteState::bootstrap("api", &config, 1_000);
        assert_eq!(state.mode(), OperationalMode::Bootstrap);
        assert_eq!(state.scar_tissue(), 0.0);
        assert!((state.resistance() - config.base_resistance * 1.2).abs() < 1e-12);
        assert_eq!(state.tick_count(), 0);
        assert_eq!(state.momentum(), None);
    }

    #[test]
    fn test_vector_wire_field_names() {
        let vector = PhysicsVector {
            scar: 1.5,
            momentum_scalar: 0.25,
            last_tick: 7,
            resistance: 12.0,
        };
        let json = serde_json::to_string(&vector).unwrap();
        assert!(json.contains("\"momentumScalar\""));
        assert!(json.contains("\"lastTick\""));
        assert!(json.contains("\"scar\""));
        assert!(json.contains("\"resistance\""));

        let back: PhysicsVector = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vector);
    }

    #[test]
    fn test_mode_wire_spelling() {
        assert_eq!(OperationalMode::CircuitBreaker.as_str(), "CIRCUIT_BREAKER");
        let json = serde_json::to_string(&OperationalMode::CircuitBreaker).unwrap();
        assert_eq!(json, "\"CIRCUIT_BREAKER\"");
    }
}

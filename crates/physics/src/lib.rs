//! Atrion physics kernel.
//!
//! Pure admission-control physics: telemetry normalization, momentum,
//! scar tissue, resistance synthesis, the route state machine, and the
//! EMA-learned break threshold.
//!
//! # Architecture
//!
//! ```text
//! Telemetry → [normalize] → PressureVector → [tick] → RouteState
//!                                              ↑↓
//!                                          [AutoTuner]
//! ```
//!
//! This crate is the purity boundary of the system: it performs no I/O,
//! reads no clock, and draws no randomness. Time enters only as an
//! explicit `now_ms` argument; everything here is deterministic and
//! replayable.

pub mod config;
pub mod guard;
pub mod momentum;
pub mod normalize;
pub mod profile;
pub mod resistance;
pub mod scar;
pub mod state;
pub mod tick;
pub mod tuner;
pub mod vector;

pub use config::{Baselines, ConfigError, Criticality, PhysicsConfig, SloSpec};
pub use normalize::{normalize_sample, Telemetry};
pub use profile::{HeartbeatSpec, ProfileSpec, WorkloadProfile};
pub use state::{
    BootstrapState, CircuitBreakerState, ModeTransition, OperationalMode, OperationalState,
    PhysicsVector, RouteState,
};
pub use tick::{advance, TickInput, TickOutcome};
pub use tuner::{AutoTuner, AutoTunerConfig, Thresholds};
pub use vector::{PressureVector, SensitivityWeights};

#[cfg(test)]
mod tests;

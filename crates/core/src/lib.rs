//! Atrion: adaptive admission control.
//!
//! Per-route request telemetry is normalized into a bounded pressure
//! vector and folded through a small physics model (momentum, scar
//! tissue, resistance). A request is admitted when its voltage exceeds
//! the route's resistance; a route whose resistance crosses the learned
//! break threshold opens its circuit breaker until it heals.
//!
//! # Architecture
//!
//! ```text
//! Telemetry → [normalize] → [physics tick] → Decision
//!                                 │
//!                    cache ← [StateManager] → provider (fire-and-forget)
//!                                 │
//!                            [Observer]
//! ```
//!
//! The pure math lives in `atrion-physics`; this crate adds the runtime:
//! the engine facade, route decisions, the state manager and provider
//! contract, task leases, observers, and the injected clock.

pub mod clock;
pub mod decision;
pub mod engine;
pub mod error;
pub mod lease;
pub mod observer;
pub mod provider;
pub mod store;

pub use clock::{Clock, SystemClock, TimerHandle, VirtualClock};
pub use decision::{decide_flow, soft_admit, Decision, DEFAULT_VOLTAGE};
pub use engine::{Engine, EngineOptions, RouteOptions};
pub use error::{EngineError, LeaseError, ProviderError};
pub use lease::{CancelSignal, LeaseOptions, LeaseOutcome, LeaseRegistry, TaskLease};
pub use observer::{
    CollectingObserver, CompositeObserver, EngineEvent, FilteringObserver, FlowSignal, Observer,
    SilentObserver,
};
pub use provider::{
    InMemoryProvider, StateProvider, Subscription, SyncEnvelope, DEFAULT_KEY_PREFIX,
    DEFAULT_SYNC_CHANNEL,
};

// The kernel's vocabulary is part of this crate's API surface.
pub use atrion_physics::{
    AutoTuner, AutoTunerConfig, Baselines, ConfigError, Criticality, OperationalMode,
    PhysicsConfig, PhysicsVector, PressureVector, RouteState, SensitivityWeights, SloSpec,
    Telemetry, WorkloadProfile,
};

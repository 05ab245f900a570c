//! Error taxonomy of the engine API.
//!
//! Only caller-contract violations and dependency failures surface as
//! errors. Provider I/O, telemetry sanitization, and clock skew recover
//! locally and are logged; they can never make `route()` fail.

use thiserror::Error;

/// Failures surfaced across the engine API boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine was used before `connect()`.
    #[error("engine is not connected")]
    NotConnected,

    /// An optional backend's dependency is unavailable.
    #[error("missing dependency: {0}")]
    MissingDependency(String),

    /// HEAVY and EXTREME workloads refuse to start without a way to stop.
    #[error("profile {profile} requires a cancellation signal")]
    MissingCancellationSignal { profile: &'static str },

    /// Engine construction rejected the supplied configuration.
    #[error(transparent)]
    Config(#[from] atrion_physics::ConfigError),

    /// A provider lifecycle call (`connect`/`disconnect`) failed.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// Failures of a state provider backend.
///
/// On the hot path these are logged and swallowed (the local cache stays
/// authoritative); they only surface from lifecycle calls.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider is not connected")]
    NotConnected,

    #[error("missing dependency: {0}")]
    MissingDependency(String),

    #[error("failed to parse stored vector: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("sync failed: {0}")]
    Sync(String),
}

/// Failures of lease operations after release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LeaseError {
    /// Heartbeat (or progress update) on a lease that already reached a
    /// terminal outcome.
    #[error("lease is no longer active")]
    NoLongerActive,
}

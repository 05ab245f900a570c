//! Physics constants and SLO-derived parameters.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::guard::safe_clamp;
use crate::vector::SensitivityWeights;

/// Tunable constants of the physics model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicsConfig {
    /// Floor of the resistance law (Ω).
    #[serde(default = "default_base_resistance")]
    pub base_resistance: f64,
    /// Scar-tissue exponential decay rate, per second.
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f64,
    /// Scar increment added on a traumatic tick.
    #[serde(default = "default_scar_factor")]
    pub scar_factor: f64,
    /// Weight of momentum in the resistance law.
    #[serde(default = "default_damping_factor")]
    pub damping_factor: f64,
    /// Trauma threshold on the positive stress magnitude, in (0, 1].
    #[serde(default = "default_critical_pressure")]
    pub critical_pressure: f64,
    /// Static break threshold multiplier: break = γ · base_resistance.
    #[serde(default = "default_break_multiplier")]
    pub break_multiplier: f64,
    /// Warm-up ticks before full physics engage.
    #[serde(default = "default_bootstrap_ticks")]
    pub bootstrap_ticks: u64,
    /// Floor applied to wall-clock deltas (ms).
    #[serde(default = "default_min_delta_t_ms")]
    pub min_delta_t_ms: f64,
    /// Steepness of the tanh telemetry normalization.
    #[serde(default = "default_tanh_scale")]
    pub tanh_scale: f64,
    /// Staleness penalty per second since the last update; 0 disables.
    #[serde(default)]
    pub staleness_factor: f64,
}

fn default_base_resistance() -> f64 {
    10.0
}
fn default_decay_rate() -> f64 {
    0.5
}
fn default_scar_factor() -> f64 {
    5.0
}
fn default_damping_factor() -> f64 {
    10.0
}
fn default_critical_pressure() -> f64 {
    0.5
}
fn default_break_multiplier() -> f64 {
    10.0
}
fn default_bootstrap_ticks() -> u64 {
    5
}
fn default_min_delta_t_ms() -> f64 {
    10.0
}
fn default_tanh_scale() -> f64 {
    1.0
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            base_resistance: default_base_resistance(),
            decay_rate: default_decay_rate(),
            scar_factor: default_scar_factor(),
            damping_factor: default_damping_factor(),
            critical_pressure: default_critical_pressure(),
            break_multiplier: default_break_multiplier(),
            bootstrap_ticks: default_bootstrap_ticks(),
            min_delta_t_ms: default_min_delta_t_ms(),
            tanh_scale: default_tanh_scale(),
            staleness_factor: 0.0,
        }
    }
}

/// Constraint violations detected by [`PhysicsConfig::validate`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{name} must be > 0, got {value}")]
    NonPositive { name: &'static str, value: f64 },
    #[error("{name} must be >= 0, got {value}")]
    Negative { name: &'static str, value: f64 },
    #[error("critical_pressure must be in (0, 1], got {0}")]
    CriticalPressureOutOfRange(f64),
    #[error("break_multiplier must be > 1, got {0}")]
    BreakMultiplierTooSmall(f64),
    #[error("bootstrap_ticks must be >= 1, got {0}")]
    BootstrapTicksZero(u64),
    #[error("baseline_latency_ms must be > 0, got {0}")]
    BaselineLatencyNonPositive(f64),
    #[error("target_error_rate must be in (0, 1], got {0}")]
    TargetErrorRateOutOfRange(f64),
    #[error("baseline_saturation must be in (0, 1], got {0}")]
    BaselineSaturationOutOfRange(f64),
}

impl PhysicsConfig {
    /// Check every constraint the model assumes; first violation wins.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("base_resistance", self.base_resistance),
            ("decay_rate", self.decay_rate),
            ("min_delta_t_ms", self.min_delta_t_ms),
            ("tanh_scale", self.tanh_scale),
        ];
        for (name, value) in positive {
            if !(value > 0.0) || !value.is_finite() {
                return Err(ConfigError::NonPositive { name, value });
            }
        }
        let non_negative = [
            ("scar_factor", self.scar_factor),
            ("damping_factor", self.damping_factor),
            ("staleness_factor", self.staleness_factor),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0) || !value.is_finite() {
                return Err(ConfigError::Negative { name, value });
            }
        }
        if !(self.critical_pressure > 0.0 && self.critical_pressure <= 1.0) {
            return Err(ConfigError::CriticalPressureOutOfRange(self.critical_pressure));
        }
        if !(self.break_multiplier > 1.0) {
            return Err(ConfigError::BreakMultiplierTooSmall(self.break_multiplier));
        }
        if self.bootstrap_ticks == 0 {
            return Err(ConfigError::BootstrapTicksZero(self.bootstrap_ticks));
        }
        Ok(())
    }

    /// Static break threshold: γ · base_resistance.
    #[inline]
    pub fn static_break_point(&self) -> f64 {
        self.break_multiplier * self.base_resistance
    }
}

/// Per-component criticality in [0, 10]; higher means the SLO cares more.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Criticality {
    pub latency: f64,
    pub error: f64,
    pub saturation: f64,
}

/// User-facing SLO declaration a route's expectations derive from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SloSpec {
    pub criticality: Criticality,
    #[serde(default = "default_baseline_latency_ms")]
    pub baseline_latency_ms: f64,
    #[serde(default = "default_target_error_rate")]
    pub target_error_rate: f64,
    #[serde(default = "default_baseline_saturation")]
    pub baseline_saturation: f64,
}

fn default_baseline_latency_ms() -> f64 {
    100.0
}
fn default_target_error_rate() -> f64 {
    0.01
}
fn default_baseline_saturation() -> f64 {
    0.8
}

impl Default for SloSpec {
    fn default() -> Self {
        Self {
            criticality: Criticality { latency: 5.0, error: 8.0, saturation: 3.0 },
            baseline_latency_ms: default_baseline_latency_ms(),
            target_error_rate: default_target_error_rate(),
            baseline_saturation: default_baseline_saturation(),
        }
    }
}

/// Baseline expectations a route's telemetry is normalized against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Baselines {
    pub baseline_latency_ms: f64,
    pub target_error_rate: f64,
    pub baseline_saturation: f64,
}

impl SloSpec {
    /// Derive sensitivity weights: w = ln(1 + c), c clamped to [0, 10].
    pub fn derive_weights(&self) -> SensitivityWeights {
        SensitivityWeights {
            w_latency: criticality_weight(self.criticality.latency),
            w_error: criticality_weight(self.criticality.error),
            w_saturation: criticality_weight(self.criticality.saturation),
        }
    }

    /// Baselines, validated once at derivation.
    pub fn derive_baselines(&self) -> Result<Baselines, ConfigError> {
        if !(self.baseline_latency_ms > 0.0) || !self.baseline_latency_ms.is_finite() {
            return Err(ConfigError::BaselineLatencyNonPositive(self.baseline_latency_ms));
        }
        if !(self.target_error_rate > 0.0 && self.target_error_rate <= 1.0) {
            return Err(ConfigError::TargetErrorRateOutOfRange(self.target_error_rate));
        }
        if !(self.baseline_saturation > 0.0 && self.baseline_saturation <= 1.0) {
            return Err(ConfigError::BaselineSaturationOutOfRange(self.baseline_saturation));
        }
        Ok(Baselines {
            baseline_latency_ms: self.baseline_latency_ms,
            target_error_rate: self.target_error_rate,
            baseline_saturation: self.baseline_saturation,
        })
    }
}

#[inline]
fn criticality_weight(c: f64) -> f64 {
    (1.0 + safe_clamp(c, 0.0, 10.0)).ln()
}

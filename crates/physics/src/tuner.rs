//! Adaptive break threshold: EMA mean/variance over observed resistance.
//!
//! The tuner turns the static break point `γ · base` into `μ + k·σ`,
//! learned from the route's own resistance stream. Until warm-up completes
//! it falls back to the static threshold, so a cold route behaves exactly
//! like an untuned one.

use serde::{Deserialize, Serialize};

use crate::config::PhysicsConfig;
use crate::guard::safe_clamp;

/// Tuner parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoTunerConfig {
    /// EMA window N; smoothing is α = 2 / (N + 1).
    #[serde(default = "default_window")]
    pub window: u64,
    /// Observations required before the dynamic threshold engages.
    #[serde(default = "default_warmup_ticks")]
    pub warmup_ticks: u64,
    /// k in break = μ + k·σ.
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f64,
    /// Lower clamp on the dynamic break point.
    #[serde(default = "default_min_floor")]
    pub min_floor: f64,
    /// Upper clamp on the dynamic break point.
    #[serde(default = "default_hard_ceiling")]
    pub hard_ceiling: f64,
    /// recovery = break · recovery_multiplier (floored at min_floor / 2).
    #[serde(default = "default_recovery_multiplier")]
    pub recovery_multiplier: f64,
}

fn default_window() -> u64 {
    100
}
fn default_warmup_ticks() -> u64 {
    50
}
fn default_sensitivity() -> f64 {
    3.0
}
fn default_min_floor() -> f64 {
    30.0
}
fn default_hard_ceiling() -> f64 {
    500.0
}
fn default_recovery_multiplier() -> f64 {
    0.5
}

impl Default for AutoTunerConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            warmup_ticks: default_warmup_ticks(),
            sensitivity: default_sensitivity(),
            min_floor: default_min_floor(),
            hard_ceiling: default_hard_ceiling(),
            recovery_multiplier: default_recovery_multiplier(),
        }
    }
}

/// Break/recovery pair active for one tick's comparisons.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub break_point: f64,
    pub recovery_point: f64,
}

impl Thresholds {
    /// Static thresholds: break = γ·base, recovery = break / 2.
    pub fn static_defaults(config: &PhysicsConfig) -> Self {
        let break_point = config.static_break_point();
        Thresholds { break_point, recovery_point: break_point / 2.0 }
    }
}

/// EMA accumulator over the resistance stream of a single route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoTuner {
    config: AutoTunerConfig,
    count: u64,
    mean: f64,
    variance: f64,
}

impl AutoTuner {
    pub fn new(config: AutoTunerConfig) -> Self {
        Self { config, count: 0, mean: 0.0, variance: 0.0 }
    }

    /// Feed one computed resistance.
    pub fn observe(&mut self, resistance: f64) {
        if !resistance.is_finite() {
            return;
        }
        self.count += 1;
        if self.count == 1 {
            self.mean = resistance;
            self.variance = 0.0;
            return;
        }
        let alpha = 2.0 / (self.config.window as f64 + 1.0);
        let delta = resistance - self.mean;
        self.mean += alpha * delta;
        self.variance = (1.0 - alpha) * (self.variance + alpha * delta * delta);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn std_dev(&self) -> f64 {
        self.variance.max(0.0).sqrt()
    }

    pub fn is_warmed_up(&self) -> bool {
        self.count >= self.config.warmup_ticks
    }

    /// Thresholds for the next comparison: dynamic once warmed up,
    /// static `γ · base` before that.
    pub fn thresholds(&self, config: &PhysicsConfig) -> Thresholds {
        if !self.is_warmed_up() {
            return Thresholds::static_defaults(config);
        }
        let raw = self.mean + self.config.sensitivity * self.std_dev();
        let break_point = safe_clamp(raw, self.config.min_floor, self.config.hard_ceiling);
        let recovery_point =
            (break_point * self.config.recovery_multiplier).max(self.config.min_floor / 2.0);
        Thresholds { break_point, recovery_point }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warmup_falls_back_to_static() {
        let physics = PhysicsConfig::default();
        let mut tuner = AutoTuner::new(AutoTunerConfig { warmup_ticks: 5, ..Default::default() });
        for _ in 0..4 {
            tuner.observe(12.0);
        }
        assert!(!tuner.is_warmed_up());
        let t = tuner.thresholds(&physics);
        assert_eq!(t.break_point, physics.static_break_point());
        assert_eq!(t.recovery_point, physics.static_break_point() / 2.0);
    }

    #[test]
    fn test_first_observation_seeds_mean() {
        let mut tuner = AutoTuner::new(AutoTunerConfig::default());
        tuner.observe(42.0);
        assert_eq!(tuner.mean(), 42.0);
        assert_eq!(tuner.std_dev(), 0.0);
    }

    #[test]
    fn test_constant_stream_collapses_variance() {
        let physics = PhysicsConfig::default();
        let mut tuner = AutoTuner::new(AutoTunerConfig { warmup_ticks: 10, ..Default::default() });
        for _ in 0..100 {
            tuner.observe(40.0);
        }
        assert!(tuner.std_dev() < 1e-9);
        let t = tuner.thresholds(&physics);
        // μ + k·σ collapses onto μ = 40, inside the [30, 500] clamp band.
        assert!((t.break_point - 40.0).abs() < 1e-6);
        assert!((t.recovery_point - 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_dynamic_break_clamped_to_floor_and_ceiling() {
        let physics = PhysicsConfig::default();
        let config = AutoTunerConfig { warmup_ticks: 1, ..Default::default() };

        let mut low = AutoTuner::new(config.clone());
        low.observe(1.0);
        assert_eq!(low.thresholds(&physics).break_point, config.min_floor);

        let mut high = AutoTuner::new(config.clone());
        high.observe(10_000.0);
        assert_eq!(high.thresholds(&physics).break_point, config.hard_ceiling);
    }

    #[test]
    fn test_variance_tracks_spread() {
        let mut tuner = AutoTuner::new(AutoTunerConfig { window: 20, ..Default::default() });
        for i in 0..200 {
            tuner.observe(if i % 2 == 0 { 10.0 } else { 30.0 });
        }
        // Alternating ±10 around 20: σ should sit near 10.
        assert!(tuner.std_dev() > 5.0 && tuner.std_dev() < 15.0);
    }

    #[test]
    fn test_non_finite_observation_ignored() {
        let mut tuner = AutoTuner::new(AutoTunerConfig::default());
        tuner.observe(f64::NAN);
        assert_eq!(tuner.count(), 0);
    }
}

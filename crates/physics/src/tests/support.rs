//! Shared harness for kernel test traces.

use crate::config::{Baselines, PhysicsConfig, SloSpec};
use crate::normalize::{normalize_sample, Telemetry};
use crate::state::RouteState;
use crate::tick::{advance, TickInput, TickOutcome};
use crate::tuner::{AutoTuner, Thresholds};
use crate::vector::SensitivityWeights;

/// Drives the pure kernel over a telemetry trace with a virtual clock.
pub struct Sim {
    pub config: PhysicsConfig,
    pub weights: SensitivityWeights,
    pub baselines: Baselines,
    pub state: RouteState,
    pub tuner: Option<AutoTuner>,
    pub now_ms: u64,
    pub step_ms: u64,
}

impl Sim {
    pub fn new(config: PhysicsConfig, slo: SloSpec, step_ms: u64) -> Self {
        let weights = slo.derive_weights();
        let baselines = slo.derive_baselines().expect("test SLO must be valid");
        let state = RouteState::bootstrap("route", &config, 0);
        Self { config, weights, baselines, state, tuner: None, now_ms: 0, step_ms }
    }

    /// Feed one sample; returns the completed tick.
    pub fn feed(&mut self, sample: &Telemetry) -> TickOutcome {
        self.now_ms += self.step_ms;
        let pressure = normalize_sample(sample, &self.baselines, self.config.tanh_scale);
        let thresholds = match &self.tuner {
            Some(tuner) => tuner.thresholds(&self.config),
            None => Thresholds::static_defaults(&self.config),
        };
        let outcome = advance(
            &self.state,
            &TickInput {
                pressure,
                weights: &self.weights,
                config: &self.config,
                now_ms: self.now_ms,
                thresholds,
                profile_scar_multiplier: 1.0,
                scar_inflation: 0.0,
            },
        );
        if !matches!(outcome.state, RouteState::Bootstrap(_)) {
            if let Some(tuner) = &mut self.tuner {
                tuner.observe(outcome.state.resistance());
            }
        }
        self.state = outcome.state.clone();
        outcome
    }
}

/// The SLO used across the scenario traces.
pub fn scenario_slo() -> SloSpec {
    SloSpec {
        criticality: crate::config::Criticality { latency: 5.0, error: 10.0, saturation: 5.0 },
        baseline_latency_ms: 50.0,
        target_error_rate: 0.01,
        baseline_saturation: 0.8,
    }
}

/// The physics constants used across the scenario traces.
pub fn scenario_config() -> PhysicsConfig {
    PhysicsConfig {
        base_resistance: 10.0,
        decay_rate: 1.0,
        scar_factor: 5.0,
        damping_factor: 20.0,
        critical_pressure: 0.4,
        break_multiplier: 10.0,
        bootstrap_ticks: 5,
        min_delta_t_ms: 10.0,
        tanh_scale: 1.0,
        staleness_factor: 0.0,
    }
}

//! The engine facade.
//!
//! Composes the pure kernel with the runtime concerns: per-route cache and
//! tuner, provider sync, lease accounting, observer dispatch. One engine
//! instance serializes all physics on its caller's context; the only
//! threads it owns are the sync worker and whatever the injected clock
//! runs timers on.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::warn;

use atrion_physics::{
    advance, normalize_sample, AutoTuner, AutoTunerConfig, Baselines, PhysicsConfig, RouteState,
    SensitivityWeights, SloSpec, Telemetry, Thresholds, TickInput, WorkloadProfile,
};

use crate::clock::{Clock, SystemClock};
use crate::decision::{decide_flow, select_route, Decision, DEFAULT_VOLTAGE};
use crate::error::{EngineError, ProviderError};
use crate::lease::{LeaseOptions, LeaseOutcome, LeaseRegistry, ReleaseHook, TaskLease};
use crate::observer::{EngineEvent, FlowSignal, Observer, SilentObserver};
use crate::provider::{StateProvider, Subscription};
use crate::store::{RouteEntry, StateManager};

/// Construction options. Everything has a default; a bare
/// `EngineOptions::default()` yields a standalone, tuner-enabled engine.
pub struct EngineOptions {
    pub physics: PhysicsConfig,
    pub slo: SloSpec,
    /// `None` disables the adaptive threshold (static break only).
    pub auto_tuner: Option<AutoTunerConfig>,
    pub state_provider: Option<Arc<dyn StateProvider>>,
    pub observer: Option<Arc<dyn Observer>>,
    /// Defaults to [`SystemClock`].
    pub clock: Option<Arc<dyn Clock>>,
    pub default_voltage: f64,
    /// Seed of the softmax selection RNG.
    pub selection_seed: u64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            physics: PhysicsConfig::default(),
            slo: SloSpec::default(),
            auto_tuner: Some(AutoTunerConfig::default()),
            state_provider: None,
            observer: None,
            clock: None,
            default_voltage: DEFAULT_VOLTAGE,
            selection_seed: 0,
        }
    }
}

/// Per-request options for `route`.
#[derive(Default, Clone, Copy)]
pub struct RouteOptions {
    /// Request priority; defaults to the engine's `default_voltage`.
    pub voltage: Option<f64>,
    /// Overrides the route's configured workload profile for this tick.
    pub profile: Option<WorkloadProfile>,
}

/// Adaptive admission-control engine.
pub struct Engine {
    physics: PhysicsConfig,
    weights: SensitivityWeights,
    baselines: Baselines,
    tuner_config: Option<AutoTunerConfig>,
    store: Arc<StateManager>,
    provider: Option<Arc<dyn StateProvider>>,
    observer: Arc<dyn Observer>,
    clock: Arc<dyn Clock>,
    default_voltage: f64,
    registry: Arc<LeaseRegistry>,
    penalties: Arc<Mutex<HashMap<String, f64>>>,
    profiles: Mutex<HashMap<String, WorkloadProfile>>,
    subscriptions: Mutex<HashMap<String, Option<Subscription>>>,
    connected: AtomicBool,
    selection_rng: Mutex<ChaCha8Rng>,
    lease_seq: AtomicU64,
}

impl Engine {
    pub fn new(options: EngineOptions) -> Result<Self, EngineError> {
        options.physics.validate()?;
        let weights = options.slo.derive_weights();
        let baselines = options.slo.derive_baselines()?;
        let provider = options.state_provider;
        Ok(Self {
            store: Arc::new(StateManager::new(provider.clone())),
            provider,
            physics: options.physics,
            weights,
            baselines,
            tuner_config: options.auto_tuner,
            observer: options.observer.unwrap_or_else(|| Arc::new(SilentObserver)),
            clock: options.clock.unwrap_or_else(|| Arc::new(SystemClock::new())),
            default_voltage: options.default_voltage,
            registry: Arc::new(LeaseRegistry::new()),
            penalties: Arc::new(Mutex::new(HashMap::new())),
            profiles: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(HashMap::new()),
            connected: AtomicBool::new(false),
            selection_rng: Mutex::new(ChaCha8Rng::seed_from_u64(options.selection_seed)),
            lease_seq: AtomicU64::new(0),
        })
    }

    /// Connect the provider (if any) and start the sync worker.
    pub fn connect(&self) -> Result<(), EngineError> {
        if let Some(provider) = &self.provider {
            provider.connect().map_err(|error| match error {
                ProviderError::MissingDependency(name) => EngineError::MissingDependency(name),
                other => EngineError::Provider(other),
            })?;
            self.store.start_worker();
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Flush cached state, stop the worker, disconnect the provider.
    pub fn disconnect(&self) -> Result<(), EngineError> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.subscriptions.lock().expect("subscriptions poisoned").clear();
        self.store.shutdown();
        if let Some(provider) = &self.provider {
            provider.disconnect().map_err(EngineError::Provider)?;
        }
        Ok(())
    }

    /// Write every cached route's vector to the provider.
    pub fn flush_to_provider(&self) {
        self.store.flush();
    }

    /// One admission decision: normalize, tick, decide, cache, emit.
    #[tracing::instrument(skip(self, sample, options), fields(route = route_id))]
    pub fn route(
        &self,
        route_id: &str,
        sample: &Telemetry,
        options: RouteOptions,
    ) -> Result<Decision, EngineError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(EngineError::NotConnected);
        }
        let now_ms = self.clock.now_ms();
        let pressure = normalize_sample(sample, &self.baselines, self.physics.tanh_scale);
        let voltage = sanitize_voltage(options.voltage.unwrap_or(self.default_voltage));
        let profile = options.profile.unwrap_or_else(|| self.route_profile(route_id));
        let scar_multiplier = profile.spec().scar_multiplier;
        let inflation = self
            .penalties
            .lock()
            .expect("penalty map poisoned")
            .remove(route_id)
            .unwrap_or(0.0);

        let physics = &self.physics;
        let weights = &self.weights;
        let tuner_config = &self.tuner_config;

        let (decision, event) = self.store.tick(
            route_id,
            || RouteEntry {
                state: RouteState::bootstrap(route_id, physics, now_ms),
                tuner: tuner_config.clone().map(AutoTuner::new),
            },
            |entry| {
                let thresholds = entry
                    .tuner
                    .as_ref()
                    .map(|tuner| tuner.thresholds(physics))
                    .unwrap_or_else(|| Thresholds::static_defaults(physics));
                let outcome = advance(
                    &entry.state,
                    &TickInput {
                        pressure,
                        weights,
                        config: physics,
                        now_ms,
                        thresholds,
                        profile_scar_multiplier: scar_multiplier,
                        scar_inflation: inflation,
                    },
                );
                entry.state = outcome.state;

                let mode = entry.state.mode();
                let resistance = entry.state.resistance();
                if mode != atrion_physics::OperationalMode::Bootstrap {
                    if let Some(tuner) = &mut entry.tuner {
                        tuner.observe(resistance);
                    }
                }

                let decision = decide_flow(mode, resistance, voltage);
                let signal = match mode {
                    atrion_physics::OperationalMode::Bootstrap => FlowSignal::Bootstrap,
                    _ if decision.allow => FlowSignal::Flow,
                    _ => FlowSignal::Shed,
                };
                let event = EngineEvent {
                    route_id: route_id.to_string(),
                    mode,
                    resistance,
                    momentum: entry.state.momentum(),
                    scar_tissue: entry.state.scar_tissue(),
                    decision: signal,
                    delta_t_ms: outcome.delta_t_ms,
                    timestamp_ms: now_ms,
                    pressure_magnitude: outcome.pressure_magnitude,
                    tick_count: entry.state.tick_count(),
                    mode_transition: outcome.transition,
                };
                (decision, event)
            },
        );

        self.ensure_subscription(route_id);
        // Dispatch after the state and cache writes have committed.
        self.observer.on_update(&event);
        Ok(decision)
    }

    pub fn get_state(&self, route_id: &str) -> Option<RouteState> {
        self.store.get_state(route_id)
    }

    pub fn get_routes(&self) -> Vec<String> {
        self.store.route_ids()
    }

    /// Clear a route everywhere: cache, tuner, penalties, provider.
    pub fn reset_route(&self, route_id: &str) {
        self.store.remove(route_id);
        self.penalties.lock().expect("penalty map poisoned").remove(route_id);
        self.profiles.lock().expect("profile map poisoned").remove(route_id);
        self.subscriptions.lock().expect("subscriptions poisoned").remove(route_id);
    }

    pub fn set_route_profile(&self, route_id: &str, profile: WorkloadProfile) {
        self.profiles.lock().expect("profile map poisoned").insert(route_id.to_string(), profile);
    }

    fn route_profile(&self, route_id: &str) -> WorkloadProfile {
        self.profiles
            .lock()
            .expect("profile map poisoned")
            .get(route_id)
            .copied()
            .unwrap_or_default()
    }

    /// Pick a route by softmax over resistance, excluding open breakers.
    pub fn select_route(&self, beta: f64) -> Option<String> {
        let states = self.store.snapshot_states();
        let mut rng = self.selection_rng.lock().expect("selection rng poisoned");
        select_route(&states, beta, &mut *rng).map(str::to_string)
    }

    /// Start a long-running task under a lease.
    ///
    /// HEAVY and EXTREME profiles refuse to start without a cancellation
    /// signal. On TimedOut or Failed release, the route's next tick
    /// inflates its scar by `scar_factor × scar_multiplier × overrun`.
    #[tracing::instrument(skip(self, options), fields(route = route_id))]
    pub fn start_task(
        &self,
        route_id: &str,
        options: LeaseOptions,
    ) -> Result<TaskLease, EngineError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(EngineError::NotConnected);
        }
        let profile = options.profile;
        let spec = profile.spec();
        if spec.requires_cancellation && options.cancellation_signal.is_none() {
            return Err(EngineError::MissingCancellationSignal { profile: profile.name() });
        }

        let id = format!("lease-{}", self.lease_seq.fetch_add(1, Ordering::SeqCst) + 1);
        let penalty_unit = self.physics.scar_factor * spec.scar_multiplier;
        let registry = Arc::clone(&self.registry);
        let penalties = Arc::clone(&self.penalties);
        let route = route_id.to_string();
        let lease_id = id.clone();
        let hook: ReleaseHook = Box::new(move |outcome| {
            registry.unregister(&lease_id);
            let overrun = match outcome {
                LeaseOutcome::TimedOut => 1.5,
                LeaseOutcome::Failed => 1.0,
                LeaseOutcome::Completed | LeaseOutcome::Aborted => 0.0,
            };
            if overrun > 0.0 {
                *penalties
                    .lock()
                    .expect("penalty map poisoned")
                    .entry(route)
                    .or_insert(0.0) += penalty_unit * overrun;
            }
        });

        let lease = TaskLease::create(
            id,
            route_id.to_string(),
            profile,
            Arc::clone(&self.clock),
            options,
            Some(hook),
        );
        self.registry.register(&lease);
        if !lease.is_active() {
            // Raced a zero-length timeout; the hook already ran.
            self.registry.unregister(lease.id());
        }
        Ok(lease)
    }

    pub fn get_active_task_count(&self, route_id: &str) -> usize {
        self.registry.active_count(route_id)
    }

    /// The per-engine lease registry (test teardown uses `clear_all`).
    pub fn lease_registry(&self) -> &LeaseRegistry {
        &self.registry
    }

    /// Subscribe once per route for remote updates; unsupported providers
    /// are remembered so the hot path never retries.
    fn ensure_subscription(&self, route_id: &str) {
        let Some(provider) = &self.provider else { return };
        let mut subscriptions = self.subscriptions.lock().expect("subscriptions poisoned");
        if subscriptions.contains_key(route_id) {
            return;
        }
        let store = Arc::clone(&self.store);
        let result = provider.subscribe(
            route_id,
            Arc::new(move |route, vector| {
                store.apply_remote(route, vector);
            }),
        );
        match result {
            Ok(subscription) => {
                subscriptions.insert(route_id.to_string(), Some(subscription));
            }
            Err(error) => {
                warn!(%error, route_id, "provider subscription unavailable");
                subscriptions.insert(route_id.to_string(), None);
            }
        }
    }
}

fn sanitize_voltage(voltage: f64) -> f64 {
    if !voltage.is_finite() {
        return DEFAULT_VOLTAGE;
    }
    voltage.max(0.0)
}

impl Drop for Engine {
    fn drop(&mut self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.store.shutdown();
        }
    }
}

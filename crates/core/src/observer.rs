//! Observer dispatch.
//!
//! Every completed physics update emits exactly one [`EngineEvent`].
//! Dispatch happens after the state transition and cache write have
//! committed, so an observer can neither throw back into the physics path
//! nor affect the resistance it is reporting on.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use atrion_physics::{ModeTransition, OperationalMode};

/// What the engine decided for the request that drove this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowSignal {
    #[serde(rename = "BOOTSTRAP")]
    Bootstrap,
    #[serde(rename = "FLOW")]
    Flow,
    #[serde(rename = "SHED")]
    Shed,
}

/// One completed physics update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineEvent {
    pub route_id: String,
    pub mode: OperationalMode,
    pub resistance: f64,
    /// Absent during Bootstrap.
    pub momentum: Option<f64>,
    pub scar_tissue: f64,
    pub decision: FlowSignal,
    pub delta_t_ms: f64,
    pub timestamp_ms: u64,
    pub pressure_magnitude: f64,
    pub tick_count: u64,
    pub mode_transition: Option<ModeTransition>,
}

/// Receives engine events. Implementations must not block.
pub trait Observer: Send + Sync {
    fn on_update(&self, event: &EngineEvent);
}

/// Fans an event out to every registered observer.
pub struct CompositeObserver {
    observers: SmallVec<[Arc<dyn Observer>; 4]>,
}

impl CompositeObserver {
    pub fn new(observers: impl IntoIterator<Item = Arc<dyn Observer>>) -> Self {
        Self { observers: observers.into_iter().collect() }
    }
}

impl Observer for CompositeObserver {
    fn on_update(&self, event: &EngineEvent) {
        for observer in &self.observers {
            observer.on_update(event);
        }
    }
}

/// Forwards only events matching a predicate.
pub struct FilteringObserver<P> {
    predicate: P,
    inner: Arc<dyn Observer>,
}

impl<P> FilteringObserver<P>
where
    P: Fn(&EngineEvent) -> bool + Send + Sync,
{
    pub fn new(predicate: P, inner: Arc<dyn Observer>) -> Self {
        Self { predicate, inner }
    }
}

impl<P> Observer for FilteringObserver<P>
where
    P: Fn(&EngineEvent) -> bool + Send + Sync,
{
    fn on_update(&self, event: &EngineEvent) {
        if (self.predicate)(event) {
            self.inner.on_update(event);
        }
    }
}

/// Appends every event to a list; for tests.
#[derive(Default)]
pub struct CollectingObserver {
    events: Mutex<Vec<EngineEvent>>,
}

impl CollectingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().expect("collector poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().expect("collector poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.events.lock().expect("collector poisoned").clear();
    }
}

impl Observer for CollectingObserver {
    fn on_update(&self, event: &EngineEvent) {
        self.events.lock().expect("collector poisoned").push(event.clone());
    }
}

/// Discards everything.
pub struct SilentObserver;

impl Observer for SilentObserver {
    fn on_update(&self, _event: &EngineEvent) {}
}

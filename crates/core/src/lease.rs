//! Task leases: time-boxed, heartbeat-maintained tokens for long-running
//! work.
//!
//! A lease is created Active and reaches exactly one terminal outcome.
//! Two timers guard it against the injected clock: the expiration timer at
//! `expires_at`, and (for profiles that demand liveness proof) a heartbeat
//! watchdog running every `2 × interval` that trips when the last
//! heartbeat is older than `3 × interval`. Expiry cancels the caller's
//! signal *before* the release hook runs, so by the time accounting sees
//! the timeout the work has already been told to stop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use atrion_physics::{ProfileSpec, WorkloadProfile};

use crate::clock::{Clock, TimerHandle};
use crate::error::LeaseError;

/// Terminal outcome of a lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaseOutcome {
    Completed,
    Failed,
    TimedOut,
    Aborted,
}

/// Cooperative cancellation signal shared between the lease and the work
/// it covers. The caller contract: treat it as truthful and stop promptly.
#[derive(Clone, Default)]
pub struct CancelSignal {
    cancelled: Arc<AtomicBool>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Invoked exactly once when the lease reaches its terminal outcome.
pub type ReleaseHook = Box<dyn FnOnce(LeaseOutcome) + Send>;

/// Options for starting a task.
#[derive(Default)]
pub struct LeaseOptions {
    pub profile: WorkloadProfile,
    /// Overrides the profile's `max_duration_ms`.
    pub timeout_ms: Option<u64>,
    pub cancellation_signal: Option<CancelSignal>,
    pub metadata: Option<serde_json::Value>,
}

struct LeaseCore {
    active: bool,
    outcome: Option<LeaseOutcome>,
    last_heartbeat_at: u64,
    progress: Option<f64>,
    timers: Vec<TimerHandle>,
    hook: Option<ReleaseHook>,
}

struct LeaseInner {
    id: String,
    route_id: String,
    profile: WorkloadProfile,
    spec: ProfileSpec,
    started_at: u64,
    expires_at: u64,
    clock: Arc<dyn Clock>,
    signal: Option<CancelSignal>,
    metadata: Option<serde_json::Value>,
    core: Mutex<LeaseCore>,
}

impl LeaseInner {
    /// Claim the single terminal transition. The winner gets the hook and
    /// the timers are cancelled under the same lock.
    fn transition(&self, outcome: LeaseOutcome) -> Option<Option<ReleaseHook>> {
        let mut core = self.core.lock().expect("lease core poisoned");
        if !core.active {
            return None;
        }
        core.active = false;
        core.outcome = Some(outcome);
        for timer in core.timers.drain(..) {
            timer.cancel();
        }
        Some(core.hook.take())
    }
}

/// Handle to a long-running task's lease. Cheap to clone; all clones see
/// the same lifecycle.
#[derive(Clone)]
pub struct TaskLease {
    inner: Arc<LeaseInner>,
}

impl TaskLease {
    /// Create and arm a lease. `hook` runs exactly once, on whichever path
    /// releases first.
    pub(crate) fn create(
        id: String,
        route_id: String,
        profile: WorkloadProfile,
        clock: Arc<dyn Clock>,
        options: LeaseOptions,
        hook: Option<ReleaseHook>,
    ) -> TaskLease {
        let spec = profile.spec();
        let started_at = clock.now_ms();
        let timeout_ms = options.timeout_ms.unwrap_or(spec.max_duration_ms);
        let inner = Arc::new(LeaseInner {
            id,
            route_id,
            profile,
            spec,
            started_at,
            expires_at: started_at.saturating_add(timeout_ms),
            clock,
            signal: options.cancellation_signal,
            metadata: options.metadata,
            core: Mutex::new(LeaseCore {
                active: true,
                outcome: None,
                last_heartbeat_at: started_at,
                progress: None,
                timers: Vec::new(),
                hook,
            }),
        });

        let lease = TaskLease { inner };
        lease.arm_expiration(timeout_ms);
        if let Some(heartbeat) = lease.inner.spec.heartbeat {
            arm_watchdog(&lease.inner, heartbeat.interval_ms);
        }
        lease
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn route_id(&self) -> &str {
        &self.inner.route_id
    }

    pub fn profile(&self) -> WorkloadProfile {
        self.inner.profile
    }

    pub fn started_at(&self) -> u64 {
        self.inner.started_at
    }

    pub fn expires_at(&self) -> u64 {
        self.inner.expires_at
    }

    pub fn metadata(&self) -> Option<&serde_json::Value> {
        self.inner.metadata.as_ref()
    }

    pub fn cancellation_signal(&self) -> Option<&CancelSignal> {
        self.inner.signal.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.inner.core.lock().expect("lease core poisoned").active
    }

    pub fn outcome(&self) -> Option<LeaseOutcome> {
        self.inner.core.lock().expect("lease core poisoned").outcome
    }

    pub fn progress(&self) -> Option<f64> {
        self.inner.core.lock().expect("lease core poisoned").progress
    }

    /// Milliseconds until expiry; 0 once released or expired.
    pub fn remaining_ms(&self) -> u64 {
        if !self.is_active() {
            return 0;
        }
        self.inner.expires_at.saturating_sub(self.inner.clock.now_ms())
    }

    /// Refresh liveness and optionally record progress in [0, 1].
    ///
    /// The only lease operation that fails: after release it has nothing
    /// to keep alive.
    pub fn heartbeat(&self, progress: Option<f64>) -> Result<(), LeaseError> {
        let mut core = self.inner.core.lock().expect("lease core poisoned");
        if !core.active {
            return Err(LeaseError::NoLongerActive);
        }
        core.last_heartbeat_at = self.inner.clock.now_ms();
        if let Some(progress) = progress {
            core.progress = Some(progress.clamp(0.0, 1.0));
        }
        Ok(())
    }

    /// Release with an explicit outcome. Idempotent: the second and later
    /// calls are no-ops and return false.
    pub fn release(&self, outcome: LeaseOutcome) -> bool {
        match self.inner.transition(outcome) {
            Some(hook) => {
                if let Some(hook) = hook {
                    hook(outcome);
                }
                true
            }
            None => false,
        }
    }

    /// Timer path: claim the transition, abort the signal, then run the
    /// hook. Loses quietly to a concurrent explicit release.
    fn expire(&self) {
        if let Some(hook) = self.inner.transition(LeaseOutcome::TimedOut) {
            if let Some(signal) = &self.inner.signal {
                signal.cancel();
            }
            if let Some(hook) = hook {
                hook(LeaseOutcome::TimedOut);
            }
        }
    }

    fn arm_expiration(&self, timeout_ms: u64) {
        let weak = Arc::downgrade(&self.inner);
        let handle = self.inner.clock.schedule(
            timeout_ms,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    TaskLease { inner }.expire();
                }
            }),
        );
        self.inner.core.lock().expect("lease core poisoned").timers.push(handle);
    }
}

fn arm_watchdog(inner: &Arc<LeaseInner>, interval_ms: u64) {
    let weak = Arc::downgrade(inner);
    let handle = inner.clock.schedule(
        2 * interval_ms,
        Box::new(move || {
            let Some(inner) = weak.upgrade() else { return };
            let lease = TaskLease { inner: Arc::clone(&inner) };
            if !lease.is_active() {
                return;
            }
            let last = inner.core.lock().expect("lease core poisoned").last_heartbeat_at;
            if inner.clock.now_ms().saturating_sub(last) > 3 * interval_ms {
                lease.expire();
            } else {
                arm_watchdog(&inner, interval_ms);
            }
        }),
    );
    inner.core.lock().expect("lease core poisoned").timers.push(handle);
}

// ============================================================================
// Registry
// ============================================================================

/// Per-engine map of live leases, for counting and teardown.
#[derive(Default)]
pub struct LeaseRegistry {
    leases: Mutex<HashMap<String, TaskLease>>,
}

impl LeaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, lease: &TaskLease) {
        self.leases
            .lock()
            .expect("lease registry poisoned")
            .insert(lease.id().to_string(), lease.clone());
    }

    pub fn unregister(&self, id: &str) -> Option<TaskLease> {
        self.leases.lock().expect("lease registry poisoned").remove(id)
    }

    /// Active leases for one route.
    pub fn active_count(&self, route_id: &str) -> usize {
        self.leases
            .lock()
            .expect("lease registry poisoned")
            .values()
            .filter(|lease| lease.route_id() == route_id && lease.is_active())
            .count()
    }

    pub fn len(&self) -> usize {
        self.leases.lock().expect("lease registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Abort and drop everything; test teardown.
    pub fn clear_all(&self) {
        let leases: Vec<TaskLease> =
            self.leases.lock().expect("lease registry poisoned").values().cloned().collect();
        for lease in leases {
            lease.release(LeaseOutcome::Aborted);
        }
        self.leases.lock().expect("lease registry poisoned").clear();
    }
}

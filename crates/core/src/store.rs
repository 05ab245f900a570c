//! Hot route-state cache and fire-and-forget provider sync.
//!
//! The cache is authoritative: reads never block on the provider, and a
//! provider failure can only ever cost freshness on *other* nodes, never
//! local correctness. Writes go through a bounded lock-free queue drained
//! by a background worker; when the queue is full the op is dropped with a
//! warning (a later flush still writes every cached route).

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_queue::ArrayQueue;
use tracing::warn;

use atrion_physics::{AutoTuner, PhysicsVector, RouteState};

use crate::provider::StateProvider;

const SYNC_QUEUE_CAPACITY: usize = 1024;

/// One pending provider write.
#[derive(Debug, Clone)]
pub enum SyncOp {
    Update { route_id: String, vector: PhysicsVector },
    Delete { route_id: String },
}

/// Result of enqueueing a sync op.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EnqueueResult {
    Ok,
    /// Queue above 80% capacity.
    HighWaterMark,
    /// Queue full; the op was dropped.
    Full,
}

/// Bounded lock-free queue between the hot path and the sync worker.
struct SyncQueue {
    queue: ArrayQueue<SyncOp>,
    high_water_mark: usize,
}

impl SyncQueue {
    fn new(capacity: usize) -> Self {
        Self { queue: ArrayQueue::new(capacity), high_water_mark: (capacity * 80) / 100 }
    }

    fn enqueue(&self, op: SyncOp) -> EnqueueResult {
        match self.queue.push(op) {
            Ok(()) => {
                if self.queue.len() >= self.high_water_mark {
                    EnqueueResult::HighWaterMark
                } else {
                    EnqueueResult::Ok
                }
            }
            Err(_) => EnqueueResult::Full,
        }
    }

    fn drain(&self) -> Vec<SyncOp> {
        let mut ops = Vec::new();
        while let Some(op) = self.queue.pop() {
            ops.push(op);
        }
        ops
    }
}

/// Everything the engine holds for one route.
pub struct RouteEntry {
    pub state: RouteState,
    pub tuner: Option<AutoTuner>,
}

struct WorkerShared {
    state: Mutex<bool>, // shutdown flag
    wake: Condvar,
}

struct SyncWorker {
    thread: JoinHandle<()>,
    shared: Arc<WorkerShared>,
}

/// Local cache of route state plus the sync pipeline to the provider.
pub struct StateManager {
    routes: Mutex<HashMap<String, RouteEntry>>,
    vectors: Mutex<HashMap<String, PhysicsVector>>,
    queue: Arc<SyncQueue>,
    provider: Option<Arc<dyn StateProvider>>,
    worker: Mutex<Option<SyncWorker>>,
}

impl StateManager {
    pub fn new(provider: Option<Arc<dyn StateProvider>>) -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            vectors: Mutex::new(HashMap::new()),
            queue: Arc::new(SyncQueue::new(SYNC_QUEUE_CAPACITY)),
            provider,
            worker: Mutex::new(None),
        }
    }

    /// Run one tick against a route's entry, creating it on first sight.
    ///
    /// After the closure returns, the entry's new vector is written to the
    /// local cache synchronously and a provider write is enqueued.
    pub fn tick<R>(
        &self,
        route_id: &str,
        make: impl FnOnce() -> RouteEntry,
        f: impl FnOnce(&mut RouteEntry) -> R,
    ) -> R {
        let (result, vector) = {
            let mut routes = self.routes.lock().expect("route cache poisoned");
            let entry = routes.entry(route_id.to_string()).or_insert_with(make);
            let result = f(entry);
            (result, entry.state.to_vector())
        };

        self.vectors.lock().expect("vector cache poisoned").insert(route_id.to_string(), vector);
        self.dispatch(SyncOp::Update { route_id: route_id.to_string(), vector });
        result
    }

    pub fn get_state(&self, route_id: &str) -> Option<RouteState> {
        self.routes.lock().expect("route cache poisoned").get(route_id).map(|e| e.state.clone())
    }

    /// Snapshot of (route, resistance, state) for every cached route.
    pub fn snapshot_states(&self) -> Vec<RouteState> {
        self.routes.lock().expect("route cache poisoned").values().map(|e| e.state.clone()).collect()
    }

    pub fn route_ids(&self) -> Vec<String> {
        self.routes.lock().expect("route cache poisoned").keys().cloned().collect()
    }

    pub fn get_vector(&self, route_id: &str) -> Option<PhysicsVector> {
        self.vectors.lock().expect("vector cache poisoned").get(route_id).copied()
    }

    /// Drop a route locally and enqueue the provider delete.
    pub fn remove(&self, route_id: &str) {
        self.routes.lock().expect("route cache poisoned").remove(route_id);
        self.vectors.lock().expect("vector cache poisoned").remove(route_id);
        self.dispatch(SyncOp::Delete { route_id: route_id.to_string() });
    }

    /// Merge a remote update: strictly newer ticks supersede, everything
    /// else is ignored. The full RouteState is untouched; remote truth
    /// only refreshes the shared projection.
    pub fn apply_remote(&self, route_id: &str, vector: &PhysicsVector) {
        let mut vectors = self.vectors.lock().expect("vector cache poisoned");
        match vectors.get(route_id) {
            Some(local) if local.last_tick >= vector.last_tick => {}
            _ => {
                vectors.insert(route_id.to_string(), *vector);
            }
        }
    }

    fn dispatch(&self, op: SyncOp) {
        if self.provider.is_none() {
            return;
        }
        match self.queue.enqueue(op) {
            EnqueueResult::Ok => {}
            EnqueueResult::HighWaterMark => {
                warn!("provider sync queue above high-water mark");
            }
            EnqueueResult::Full => {
                warn!("provider sync queue full; dropping op (flush will repair)");
            }
        }
        if let Some(worker) = self.worker.lock().expect("sync worker poisoned").as_ref() {
            worker.shared.wake.notify_one();
        }
    }

    /// Start the background drain loop. No-op without a provider.
    pub fn start_worker(&self) {
        let Some(provider) = self.provider.clone() else { return };
        let mut slot = self.worker.lock().expect("sync worker poisoned");
        if slot.is_some() {
            return;
        }
        let shared = Arc::new(WorkerShared { state: Mutex::new(false), wake: Condvar::new() });
        let queue = Arc::clone(&self.queue);
        let worker_shared = Arc::clone(&shared);
        let thread = std::thread::Builder::new()
            .name("atrion-sync".to_string())
            .spawn(move || {
                let mut shutdown = worker_shared.state.lock().expect("sync worker poisoned");
                loop {
                    let ops = queue.drain();
                    if !ops.is_empty() {
                        drop(shutdown);
                        apply_ops(provider.as_ref(), ops);
                        shutdown = worker_shared.state.lock().expect("sync worker poisoned");
                        continue;
                    }
                    if *shutdown {
                        return;
                    }
                    shutdown = worker_shared
                        .wake
                        .wait_timeout(shutdown, Duration::from_millis(100))
                        .expect("sync worker poisoned")
                        .0;
                }
            })
            .expect("failed to spawn sync worker");
        *slot = Some(SyncWorker { thread, shared });
    }

    /// Drain pending ops and write every cached route to the provider.
    pub fn flush(&self) {
        let Some(provider) = self.provider.as_deref() else { return };
        apply_ops(provider, self.queue.drain());
        let vectors: Vec<(String, PhysicsVector)> = {
            let cache = self.vectors.lock().expect("vector cache poisoned");
            cache.iter().map(|(k, v)| (k.clone(), *v)).collect()
        };
        for (route_id, vector) in vectors {
            if let Err(error) = provider.update_vector(&route_id, &vector) {
                warn!(%error, route_id, "flush write failed; local cache remains authoritative");
            }
        }
    }

    /// Flush, then stop the worker.
    pub fn shutdown(&self) {
        let worker = self.worker.lock().expect("sync worker poisoned").take();
        if let Some(worker) = worker {
            *worker.shared.state.lock().expect("sync worker poisoned") = true;
            worker.shared.wake.notify_one();
            let _ = worker.thread.join();
        }
        self.flush();
    }
}

fn apply_ops(provider: &dyn StateProvider, ops: Vec<SyncOp>) {
    for op in ops {
        let result = match &op {
            SyncOp::Update { route_id, vector } => provider.update_vector(route_id, vector),
            SyncOp::Delete { route_id } => provider.delete_vector(route_id),
        };
        if let Err(error) = result {
            warn!(%error, "background provider write failed");
        }
    }
}

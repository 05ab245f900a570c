//! State provider contract and the in-memory reference backend.
//!
//! A provider stores serialized copies of [`PhysicsVector`] and shares
//! them across nodes. It stores truth, it does not understand it: the only
//! conflict rule is last-write-wins on `lastTick`, and malformed payloads
//! are dropped rather than propagated.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::warn;

use atrion_physics::PhysicsVector;

use crate::error::ProviderError;

/// Default key layout: `<prefix><routeId>`.
pub const DEFAULT_KEY_PREFIX: &str = "atrion:state:";

/// Default broadcast channel for cross-node update pushes.
pub const DEFAULT_SYNC_CHANNEL: &str = "atrion:sync";

/// Payload carried on the broadcast channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEnvelope {
    pub route_id: String,
    pub vector: PhysicsVector,
}

/// Callback invoked with remote vector updates.
pub type UpdateCallback = Arc<dyn Fn(&str, &PhysicsVector) + Send + Sync>;

/// Unsubscribe guard; dropping it detaches the callback.
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self { unsubscribe: Some(Box::new(unsubscribe)) }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

/// Storage/sync abstraction for shared route state.
///
/// Implementations must tolerate concurrent writers: writes are ordered by
/// `last_tick` alone, and a write that loses that race is silently
/// ignored. `connect`/`disconnect` are idempotent.
pub trait StateProvider: Send + Sync {
    fn connect(&self) -> Result<(), ProviderError>;
    fn disconnect(&self) -> Result<(), ProviderError>;
    fn get_vector(&self, route_id: &str) -> Result<Option<PhysicsVector>, ProviderError>;
    fn update_vector(&self, route_id: &str, vector: &PhysicsVector) -> Result<(), ProviderError>;
    fn delete_vector(&self, route_id: &str) -> Result<(), ProviderError>;
    fn list_routes(&self) -> Result<Vec<String>, ProviderError>;

    /// Receive pushes of remote updates for one route. Optional.
    fn subscribe(
        &self,
        _route_id: &str,
        _callback: UpdateCallback,
    ) -> Result<Subscription, ProviderError> {
        Err(ProviderError::Sync("subscriptions not supported by this provider".to_string()))
    }
}

// ============================================================================
// In-memory provider
// ============================================================================

struct MemoryStore {
    /// Serialized vectors, keyed by `<prefix><routeId>`.
    entries: HashMap<String, String>,
    subscribers: HashMap<String, Vec<(u64, UpdateCallback)>>,
    next_subscriber: u64,
    connected: bool,
}

/// Reference provider: a process-local map of serialized vectors.
///
/// Cloned handles share the same store, which is how multi-writer
/// behavior is exercised in tests.
#[derive(Clone)]
pub struct InMemoryProvider {
    store: Arc<Mutex<MemoryStore>>,
    key_prefix: String,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::with_prefix(DEFAULT_KEY_PREFIX)
    }

    pub fn with_prefix(key_prefix: impl Into<String>) -> Self {
        Self {
            store: Arc::new(Mutex::new(MemoryStore {
                entries: HashMap::new(),
                subscribers: HashMap::new(),
                next_subscriber: 0,
                connected: false,
            })),
            key_prefix: key_prefix.into(),
        }
    }

    fn key(&self, route_id: &str) -> String {
        format!("{}{}", self.key_prefix, route_id)
    }

    pub fn is_connected(&self) -> bool {
        self.store.lock().expect("provider store poisoned").connected
    }

    fn parse(payload: &str) -> Option<PhysicsVector> {
        match serde_json::from_str::<PhysicsVector>(payload) {
            Ok(vector) => Some(vector),
            Err(error) => {
                warn!(%error, "ignoring malformed stored vector");
                None
            }
        }
    }
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl StateProvider for InMemoryProvider {
    fn connect(&self) -> Result<(), ProviderError> {
        self.store.lock().expect("provider store poisoned").connected = true;
        Ok(())
    }

    fn disconnect(&self) -> Result<(), ProviderError> {
        self.store.lock().expect("provider store poisoned").connected = false;
        Ok(())
    }

    fn get_vector(&self, route_id: &str) -> Result<Option<PhysicsVector>, ProviderError> {
        let store = self.store.lock().expect("provider store poisoned");
        // Format mismatch reads as a cold start for the route, not an error.
        Ok(store.entries.get(&self.key(route_id)).and_then(|payload| Self::parse(payload)))
    }

    fn update_vector(&self, route_id: &str, vector: &PhysicsVector) -> Result<(), ProviderError> {
        let payload = serde_json::to_string(vector)?;
        let callbacks = {
            let mut store = self.store.lock().expect("provider store poisoned");
            let key = self.key(route_id);
            // Last-write-wins on the engine tick, not wall clock: a stale
            // writer loses silently no matter when its write lands.
            if let Some(existing) = store.entries.get(&key).and_then(|p| Self::parse(p)) {
                if existing.last_tick >= vector.last_tick {
                    return Ok(());
                }
            }
            store.entries.insert(key, payload);
            store
                .subscribers
                .get(route_id)
                .map(|subs| subs.iter().map(|(_, cb)| Arc::clone(cb)).collect::<Vec<_>>())
                .unwrap_or_default()
        };
        // Notify outside the lock; a callback may read the provider back.
        for callback in callbacks {
            callback(route_id, vector);
        }
        Ok(())
    }

    fn delete_vector(&self, route_id: &str) -> Result<(), ProviderError> {
        let mut store = self.store.lock().expect("provider store poisoned");
        let key = self.key(route_id);
        store.entries.remove(&key);
        Ok(())
    }

    fn list_routes(&self) -> Result<Vec<String>, ProviderError> {
        let store = self.store.lock().expect("provider store poisoned");
        Ok(store
            .entries
            .keys()
            .filter_map(|key| key.strip_prefix(&self.key_prefix))
            .map(|route| route.to_string())
            .collect())
    }

    fn subscribe(
        &self,
        route_id: &str,
        callback: UpdateCallback,
    ) -> Result<Subscription, ProviderError> {
        let mut store = self.store.lock().expect("provider store poisoned");
        let id = store.next_subscriber;
        store.next_subscriber += 1;
        store.subscribers.entry(route_id.to_string()).or_default().push((id, callback));

        let weak = Arc::downgrade(&self.store);
        let route = route_id.to_string();
        Ok(Subscription::new(move || {
            if let Some(store) = weak.upgrade() {
                let mut store = store.lock().expect("provider store poisoned");
                if let Some(subs) = store.subscribers.get_mut(&route) {
                    subs.retain(|(sub_id, _)| *sub_id != id);
                }
            }
        }))
    }
}

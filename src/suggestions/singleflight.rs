//! Keyed singleflight: at most one in-flight computation per key, with every
//! concurrent caller for that key sharing its result.
//!
//! The computation is spawned onto the runtime rather than polled by the
//! caller that started it, so a caller abandoning its request does not
//! cancel work other callers are waiting on. The registry entry is removed
//! by a drop guard inside the spawned task, which runs on success, error,
//! panic, and runtime shutdown alike.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// The spawned task ended without producing a value (panicked or was cancelled).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("in-flight task did not complete: {0}")]
pub struct FlightAborted(pub String);

type SharedResult<V> = Shared<BoxFuture<'static, Result<V, FlightAborted>>>;

struct Flight<V: Clone> {
    id: u64,
    result: SharedResult<V>,
}

/// How a caller took part in a flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// This caller registered the flight and spawned the work.
    Leader,
    /// This caller joined a flight somebody else started.
    Follower,
}

/// Registry of in-flight computations. Clone-cheap (all `Arc`-wrapped internals).
pub struct Singleflight<K, V: Clone> {
    flights: Arc<DashMap<K, Flight<V>>>,
    next_id: Arc<AtomicU64>,
}

impl<K, V: Clone> Clone for Singleflight<K, V> {
    fn clone(&self) -> Self {
        Self {
            flights: Arc::clone(&self.flights),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<K, V> Default for Singleflight<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self {
            flights: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }
}

/// Removes a flight from the registry when the spawned task finishes or unwinds.
struct FlightGuard<K: Eq + Hash, V: Clone> {
    flights: Arc<DashMap<K, Flight<V>>>,
    key: Option<K>,
    id: u64,
}

impl<K: Eq + Hash, V: Clone> Drop for FlightGuard<K, V> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            // Only remove our own flight; a later one may already own the key.
            self.flights.remove_if(&key, |_, flight| flight.id == self.id);
        }
    }
}

impl<K, V> Singleflight<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the in-flight computation for `key`, or start `work` if there is none.
    ///
    /// The check-and-insert happens under the map's shard lock, so two
    /// concurrent callers for the same key can never both become leader.
    /// `work` is only invoked when this caller becomes the leader.
    pub async fn run<F, Fut>(&self, key: K, work: F) -> (Result<V, FlightAborted>, Role)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let (shared, role) = match self.flights.entry(key.clone()) {
            Entry::Occupied(occupied) => (occupied.get().result.clone(), Role::Follower),
            Entry::Vacant(vacant) => {
                // Nothing created here may touch `flights` on drop: `vacant`
                // holds the shard lock, so a panic in `work` or `spawn` would
                // otherwise deadlock the shard.
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let fut = work();
                let task_flights = Arc::clone(&self.flights);
                let task_key = key.clone();
                let handle = tokio::spawn(async move {
                    let _guard = FlightGuard {
                        flights: task_flights,
                        key: Some(task_key),
                        id,
                    };
                    fut.await
                });
                let flights = Arc::clone(&self.flights);
                let shared = async move {
                    handle.await.map_err(|e| {
                        // Covers a task cancelled before its first poll.
                        flights.remove_if(&key, |_, flight| flight.id == id);
                        FlightAborted(e.to_string())
                    })
                }
                .boxed()
                .shared();
                vacant.insert(Flight {
                    id,
                    result: shared.clone(),
                });
                (shared, Role::Leader)
            }
        };

        trace!(role = ?role, "awaiting singleflight result");
        (shared.await, role)
    }

    /// Whether a computation is currently registered for `key`.
    pub fn is_in_flight(&self, key: &K) -> bool {
        self.flights.contains_key(key)
    }

    /// Number of registered computations.
    pub fn len(&self) -> usize {
        self.flights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }
}

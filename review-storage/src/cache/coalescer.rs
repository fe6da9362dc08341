//! Keyed registry of in-flight shared futures.
//!
//! The first caller for a key registers the work and becomes its leader.
//! Callers arriving while it runs attach to the same shared future and get
//! a clone of its output. The entry is removed by the work itself once it
//! completes, or by the last waiter to drop out, so the next call after
//! that starts fresh.

use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};

struct InFlight<V> {
    /// Distinguishes this registration from a later one under the same key.
    id: u64,
    future: Shared<BoxFuture<'static, V>>,
    /// Callers currently awaiting `future`.
    waiters: usize,
}

/// Counters for one coalescing registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoalescerStats {
    /// Calls that started new upstream work.
    pub executions: u64,
    /// Calls that attached to work already in flight.
    pub coalesced: u64,
    /// Runs dropped because every waiter went away before completion.
    pub abandoned: u64,
    /// Failed cache fills; only counted by the cache-aside reader.
    pub fill_failures: u64,
}

/// Deduplicates concurrent calls by key.
///
/// Not a process-wide singleton: each instance is an independent registry.
pub struct Coalescer<K, V> {
    in_flight: Arc<DashMap<K, InFlight<V>>>,
    next_id: AtomicU64,
    executions: AtomicU64,
    coalesced: AtomicU64,
    abandoned: AtomicU64,
}

/// Held by each caller while it awaits a registration.
///
/// The last waiter to drop before the work completes removes the entry,
/// which drops the shared work with it.
struct Waiter<'a, K: Eq + Hash, V> {
    registry: &'a DashMap<K, InFlight<V>>,
    abandoned: &'a AtomicU64,
    key: Option<K>,
    id: u64,
}

impl<K: Eq + Hash, V> Drop for Waiter<'_, K, V> {
    fn drop(&mut self) {
        let Some(key) = self.key.take() else {
            return;
        };
        let removed = match self.registry.entry(key) {
            Entry::Occupied(mut entry) if entry.get().id == self.id => {
                let slot = entry.get_mut();
                slot.waiters = slot.waiters.saturating_sub(1);
                if slot.waiters == 0 {
                    Some(entry.remove())
                } else {
                    None
                }
            }
            _ => None,
        };
        if removed.is_some() {
            self.abandoned.fetch_add(1, Ordering::Relaxed);
        }
        // `removed` drops here, outside the shard lock.
    }
}

impl<K, V> Default for Coalescer<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Coalescer<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
            executions: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
            abandoned: AtomicU64::new(0),
        }
    }

    /// Run `make()` for `key` unless the same key is already in flight, in
    /// which case wait for that run instead.
    ///
    /// `make` is only invoked by the leader. The work is not spawned: it is
    /// driven by whichever callers are polling it. When every caller drops
    /// out before it completes, the work is dropped and its entry removed,
    /// so a later caller never joins it.
    pub async fn run<F, Fut>(&self, key: K, make: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let (id, future) = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(mut existing) => {
                self.coalesced.fetch_add(1, Ordering::Relaxed);
                let slot = existing.get_mut();
                slot.waiters += 1;
                (slot.id, slot.future.clone())
            }
            Entry::Vacant(slot) => {
                self.executions.fetch_add(1, Ordering::Relaxed);
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let registry = Arc::clone(&self.in_flight);
                let work_key = key.clone();
                let work = make();
                let future = async move {
                    let out = work.await;
                    registry.remove_if(&work_key, |_, entry| entry.id == id);
                    out
                }
                .boxed()
                .shared();
                slot.insert(InFlight {
                    id,
                    future: future.clone(),
                    waiters: 1,
                });
                (id, future)
            }
        };

        let _waiter = Waiter {
            registry: &self.in_flight,
            abandoned: &self.abandoned,
            key: Some(key),
            id,
        };
        future.await
    }

    /// Number of keys with work currently registered.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn stats(&self) -> CoalescerStats {
        CoalescerStats {
            executions: self.executions.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            fill_failures: 0,
        }
    }
}

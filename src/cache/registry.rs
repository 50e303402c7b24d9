use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::entity::Entity;
use crate::error::AbortReport;
use crate::lookup::Address;
use crate::normalize::UNKNOWN_STATUS;

/// Value stored per address.
#[derive(Debug, Clone)]
pub enum CacheEntry {
    /// A JSON:API resource, including error entities
    Entity(Arc<Entity>),
    /// Any other payload, e.g. a slug routing response
    Raw(Arc<JsonValue>),
}

impl CacheEntry {
    pub fn as_entity(&self) -> Option<&Arc<Entity>> {
        match self {
            CacheEntry::Entity(entity) => Some(entity),
            CacheEntry::Raw(_) => None,
        }
    }

    /// The error entity, if this entry is one.
    pub fn as_error(&self) -> Option<&Arc<Entity>> {
        self.as_entity().filter(|entity| entity.is_error())
    }

    pub fn is_error(&self) -> bool {
        self.as_error().is_some()
    }

    /// Payload as it would be written to a snapshot.
    pub fn to_object(&self) -> JsonValue {
        match self {
            CacheEntry::Entity(entity) => entity.to_object().clone(),
            CacheEntry::Raw(raw) => raw.as_ref().clone(),
        }
    }
}

/// Outcome shared by every caller joined onto one fetch.
pub type FetchOutcome = Result<CacheEntry, AbortReport>;

type InFlight = Shared<BoxFuture<'static, FetchOutcome>>;

#[derive(Default)]
struct Slots {
    resolved: HashMap<Address, CacheEntry>,
    in_flight: HashMap<Address, InFlight>,
}

/// Run-scoped resource cache with request coalescing.
///
/// Holds every resolved address for the lifetime of its resolver, never
/// evicting, plus one shared pending fetch per address that is currently
/// being produced. Checking the cache and registering a new fetch happen
/// under the same lock, so at most one producer ever runs per address.
///
/// Producers run on their own task and settle their slot when they finish,
/// even if every caller waiting on them has been dropped.
#[derive(Default)]
pub struct ResourceCache {
    slots: Arc<Mutex<Slots>>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolved value for an address.
    pub fn get(&self, address: &Address) -> Option<CacheEntry> {
        self.slots().resolved.get(address).cloned()
    }

    /// Store a resolved value, replacing any previous one.
    pub fn insert(&self, address: Address, entry: CacheEntry) {
        self.slots().resolved.insert(address, entry);
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.slots().resolved.contains_key(address)
    }

    /// Cached or currently being fetched.
    pub fn was_traversed(&self, address: &Address) -> bool {
        let slots = self.slots();
        slots.resolved.contains_key(address) || slots.in_flight.contains_key(address)
    }

    pub fn in_flight(&self) -> usize {
        self.slots().in_flight.len()
    }

    pub fn len(&self) -> usize {
        self.slots().resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots().resolved.is_empty()
    }

    /// Copy of every resolved entry.
    pub fn entries(&self) -> Vec<(Address, CacheEntry)> {
        self.slots()
            .resolved
            .iter()
            .map(|(address, entry)| (address.clone(), entry.clone()))
            .collect()
    }

    /// Return the cached value, join the pending fetch, or start `producer`.
    ///
    /// Successful outcomes are cached; failures only clear the in-flight slot
    /// so a later call may try again. Must be called within a Tokio runtime.
    pub async fn fetch_or_join<F, Fut>(&self, address: &Address, producer: F) -> FetchOutcome
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = FetchOutcome> + Send + 'static,
    {
        let pending = {
            let mut slots = self.slots();
            if let Some(entry) = slots.resolved.get(address) {
                return Ok(entry.clone());
            }
            match slots.in_flight.get(address) {
                Some(pending) => {
                    log::debug!("Joining in-flight fetch for {}", address);
                    pending.clone()
                }
                None => {
                    let pending = self.spawn_producer(address, producer());
                    slots.in_flight.insert(address.clone(), pending.clone());
                    pending
                }
            }
        };

        pending.await
    }

    /// Run `fetch` on its own task; the returned future only observes it.
    fn spawn_producer<Fut>(&self, address: &Address, fetch: Fut) -> InFlight
    where
        Fut: Future<Output = FetchOutcome> + Send + 'static,
    {
        let mut guard = SettleGuard {
            slots: self.slots.clone(),
            address: address.clone(),
            settled: false,
        };
        let task = tokio::spawn(async move {
            let outcome = fetch.await;
            guard.settle(&outcome);
            outcome
        });

        let endpoint = address.clone();
        async move {
            // The task only fails if the producer panicked; its guard has
            // already released the slot by then.
            task.await.unwrap_or_else(|err| {
                Err(AbortReport {
                    endpoint,
                    status: UNKNOWN_STATUS.to_string(),
                    title: format!("Fetch task failed: {}", err),
                    attempts: 0,
                })
            })
        }
        .boxed()
        .shared()
    }

    fn slots(&self) -> MutexGuard<'_, Slots> {
        lock(&self.slots)
    }
}

/// Releases an address's in-flight slot when its producer task ends.
struct SettleGuard {
    slots: Arc<Mutex<Slots>>,
    address: Address,
    settled: bool,
}

impl SettleGuard {
    fn settle(&mut self, outcome: &FetchOutcome) {
        self.settled = true;
        let mut slots = lock(&self.slots);
        slots.in_flight.remove(&self.address);
        if let Ok(entry) = outcome {
            slots
                .resolved
                .entry(self.address.clone())
                .or_insert_with(|| entry.clone());
        }
    }
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        // Once settled, the slot may already belong to a newer fetch.
        if !self.settled {
            lock(&self.slots).in_flight.remove(&self.address);
        }
    }
}

fn lock(slots: &Mutex<Slots>) -> MutexGuard<'_, Slots> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

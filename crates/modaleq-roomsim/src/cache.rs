//! Memoization of modal simulations.
//!
//! Moving a source or listener around in an interactive session repeats the
//! same simulations many times. [`ResponseCache`] keeps a bounded number of
//! responses keyed by the rounded simulation inputs; when it is full, the
//! oldest half of the entries is dropped in one go (this is not an LRU).
//!
//! [`ModalSimulator`] owns a cache behind a mutex so it can be shared between
//! threads.

use log::debug;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use crate::{Curve, Point3D, RoomDimensions, modal};

/// Default number of cached responses
pub const DEFAULT_CACHE_CAPACITY: usize = 50;

/// Snapshot of the cache content, for debugging
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub size: usize,
    pub keys: Vec<String>,
}

/// Cache key for one simulation request
///
/// Positions, dimensions and Q are rounded to 3 decimals, so requests that
/// differ by less than a millimetre share an entry.
pub fn cache_key(
    source: &Point3D,
    listener: &Point3D,
    room: &RoomDimensions,
    max_mode_order: u32,
    base_q: f64,
) -> String {
    format!(
        "{:.3},{:.3},{:.3}|{:.3},{:.3},{:.3}|{:.3},{:.3},{:.3}|{}|{:.3}",
        source.x,
        source.y,
        source.z,
        listener.x,
        listener.y,
        listener.z,
        room.length,
        room.width,
        room.height,
        max_mode_order,
        base_q
    )
}

/// Bounded map of simulated responses with bulk eviction
#[derive(Debug)]
pub struct ResponseCache {
    capacity: usize,
    entries: HashMap<String, Curve>,
    /// Keys in insertion order, oldest first
    order: VecDeque<String>,
}

impl ResponseCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached response for `key`, as an independent copy
    pub fn get(&self, key: &str) -> Option<Curve> {
        self.entries.get(key).cloned()
    }

    /// Store a response, evicting the oldest half first if the cache is full
    pub fn insert(&mut self, key: String, response: Curve) {
        if let Some(existing) = self.entries.get_mut(&key) {
            *existing = response;
            return;
        }

        if self.entries.len() >= self.capacity {
            self.evict_oldest_half();
        }

        self.order.push_back(key.clone());
        self.entries.insert(key, response);
    }

    fn evict_oldest_half(&mut self) {
        let to_drop = (self.entries.len() / 2).max(1);
        for _ in 0..to_drop {
            if let Some(key) = self.order.pop_front() {
                self.entries.remove(&key);
            }
        }
        debug!(
            "response cache full: evicted {} entries, {} kept",
            to_drop,
            self.entries.len()
        );
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    /// Current size and keys (insertion order)
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            keys: self.order.iter().cloned().collect(),
        }
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

/// Modal simulator with a shared response cache
#[derive(Debug, Default)]
pub struct ModalSimulator {
    cache: Mutex<ResponseCache>,
}

impl ModalSimulator {
    /// Simulator with a cache of [`DEFAULT_CACHE_CAPACITY`] entries
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: Mutex::new(ResponseCache::new(capacity)),
        }
    }

    /// Simulate the modal response, reusing a cached result when available
    ///
    /// See [`modal::simulate`] for the model. The returned curve is always an
    /// independent copy of the cached one.
    pub fn simulate(
        &self,
        source: &Point3D,
        listener: &Point3D,
        room: &RoomDimensions,
        max_mode_order: u32,
        base_q: f64,
    ) -> Curve {
        let key = cache_key(source, listener, room, max_mode_order, base_q);

        if let Some(hit) = self.lock().get(&key) {
            debug!("response cache hit: {}", key);
            return hit;
        }

        // Simulate without holding the lock
        let response = modal::simulate(source, listener, room, max_mode_order, base_q);
        self.lock().insert(key, response.clone());
        response
    }

    pub fn clear_cache(&self) {
        self.lock().clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.lock().stats()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ResponseCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

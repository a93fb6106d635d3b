//! # Sticky routing by key.
//!
//! ```text
//! select(item)
//!   ├─► key = key_fn(item)             (None → DispatchError::MissingKey)
//!   ├─► hash = DefaultHasher(key)      (value hash, stable within the process)
//!   └─► routes[hash]
//!         ├─ hit  ─► that worker
//!         └─ miss ─► inner.select(), remember the pick
//! ```
//!
//! The route map only grows, and it is read and written under one mutex so
//! two first-sight dispatches of the same key agree on a worker.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{Arc, Mutex};

use crate::balance::least_loaded::LeastLoaded;
use crate::balance::strategy::Strategy;
use crate::balance::worker::Worker;
use crate::error::DispatchError;

type KeyFn<T> = Box<dyn Fn(&T) -> Option<u64> + Send + Sync>;

/// Routes all items sharing a key to the worker that first received that key.
pub struct KeyGrouping<T> {
    key: KeyFn<T>,
    inner: Box<dyn Strategy<T>>,
    routes: Mutex<HashMap<u64, usize>>,
}

impl<T: Send + 'static> KeyGrouping<T> {
    /// Key grouping that places new keys on the least loaded worker.
    ///
    /// ```
    /// use taskloom::KeyGrouping;
    ///
    /// struct Order { customer: String }
    ///
    /// let strategy = KeyGrouping::new(|o: &Order| Some(o.customer.clone()));
    /// # let _ = strategy;
    /// ```
    pub fn new<K, F>(key: F) -> Self
    where
        K: Hash,
        F: Fn(&T) -> Option<K> + Send + Sync + 'static,
    {
        Self::with_inner(key, Box::new(LeastLoaded::new()))
    }

    /// Key grouping that places new keys with `inner`.
    pub fn with_inner<K, F>(key: F, inner: Box<dyn Strategy<T>>) -> Self
    where
        K: Hash,
        F: Fn(&T) -> Option<K> + Send + Sync + 'static,
    {
        Self {
            key: Box::new(move |item| key(item).map(|k| hash_key(&k))),
            inner,
            routes: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Send + 'static> Strategy<T> for KeyGrouping<T> {
    fn select(&self, pool: &[Arc<Worker<T>>], item: &T) -> Result<usize, DispatchError> {
        let hash = (self.key)(item).ok_or(DispatchError::MissingKey)?;

        let mut routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(&idx) = routes.get(&hash) {
            if idx < pool.len() {
                return Ok(idx);
            }
        }
        let idx = self.inner.select(pool, item)?;
        routes.insert(hash, idx);
        tracing::trace!(worker = idx, known = routes.len(), "new key routed");
        Ok(idx)
    }

    fn name(&self) -> &'static str {
        "key_grouping"
    }
}

fn hash_key<K: Hash>(key: &K) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

//! # Load balancer: strategy + pool + polling hand-off.
//!
//! ```text
//! dispatch(item)
//!   ├─► pool empty?                 ─► NoWorkers
//!   ├─► strategy.select(pool, item) ─► idx            (MissingKey for key grouping)
//!   ├─► while !pool[idx].can_receive():
//!   │       sleep(backoff.next(n))                     (cancel → Cancelled)
//!   └─► pool[idx].receive(item)                        (closed → WorkerClosed)
//! ```
//!
//! [`LoadBalancer::dispatch`] never returns an error: failures are logged,
//! published as `DispatchFailed`, and reported as `false`.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::balance::strategy::Strategy;
use crate::balance::worker::Worker;
use crate::error::DispatchError;
use crate::events::{Bus, Event, EventKind};
use crate::policies::BackoffPolicy;

/// Dispatches items onto a fixed worker pool using one strategy.
pub struct LoadBalancer<T> {
    name: Arc<str>,
    pool: Arc<[Arc<Worker<T>>]>,
    strategy: Box<dyn Strategy<T>>,
    backoff: BackoffPolicy,
    token: CancellationToken,
    bus: Bus,
}

impl<T: Send + 'static> LoadBalancer<T> {
    pub fn new(
        name: impl Into<Arc<str>>,
        pool: Arc<[Arc<Worker<T>>]>,
        strategy: Box<dyn Strategy<T>>,
        backoff: BackoffPolicy,
        token: CancellationToken,
        bus: Bus,
    ) -> Self {
        Self {
            name: name.into(),
            pool,
            strategy,
            backoff,
            token,
            bus,
        }
    }

    pub fn workers(&self) -> &[Arc<Worker<T>>] {
        &self.pool
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Index of the worker the strategy would pick for `item` right now.
    ///
    /// Advances stateful strategies exactly like a dispatch would.
    pub fn select(&self, item: &T) -> Result<usize, DispatchError> {
        if self.pool.is_empty() {
            return Err(DispatchError::NoWorkers);
        }
        self.strategy.select(&self.pool, item)
    }

    /// Hands `item` to a worker; `false` if it could not be delivered.
    pub async fn dispatch(&self, item: T) -> bool {
        match self.try_dispatch(item).await {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!(
                    balancer = %self.name,
                    strategy = self.strategy.name(),
                    error = %err,
                    "dispatch failed"
                );
                let mut ev = Event::new(EventKind::DispatchFailed)
                    .with_name(Arc::clone(&self.name))
                    .with_reason(err.to_string());
                if let DispatchError::WorkerClosed { worker } = err {
                    ev = ev.with_worker(worker);
                }
                self.bus.publish(ev);
                false
            }
        }
    }

    /// Hands `item` to a worker, returning the chosen index.
    pub async fn try_dispatch(&self, item: T) -> Result<usize, DispatchError> {
        let idx = self.select(&item)?;
        let worker = &self.pool[idx];

        let mut attempt = 0u32;
        while !worker.can_receive() {
            let delay = self.backoff.next(attempt);
            attempt = attempt.saturating_add(1);
            tokio::select! {
                _ = self.token.cancelled() => return Err(DispatchError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        worker.receive(item).await?;
        Ok(idx)
    }
}

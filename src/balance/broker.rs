//! # Load-balancing broker.
//!
//! Owns a fixed pool of [`Worker`]s and one [`LoadBalancer`]; `dispatch` is
//! the single entry point for producers.
//!
//! ```text
//! producers ──► broker.dispatch(item) ──► LoadBalancer ──► Worker[i].receive(item)
//!                                                               │
//!                                                         processor.process(item)
//! ```
//!
//! ## Lifecycle
//! - `build()` spawns every worker loop under a child of the broker token.
//! - `close()` stops intake on every worker.
//! - `wait_for_completion()` waits for every worker to drain.
//! - `shutdown()` is `close()` followed by `wait_for_completion()`.
//!
//! ## Example
//! ```rust
//! use taskloom::{LoadBalancingBroker, ProcessFn, ProcessorRef, StrategyKind};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let even: ProcessorRef<u64> = ProcessFn::arc(|n: u64| async move { n % 2 == 0 });
//! let broker = LoadBalancingBroker::builder(even)
//!     .workers(3)
//!     .capacity(16)
//!     .strategy(StrategyKind::RoundRobin.build())
//!     .build();
//!
//! for n in 0..9 {
//!     assert!(broker.dispatch(n).await);
//! }
//! broker.shutdown().await;
//! assert_eq!(broker.stats().iter().map(|s| s.processed()).sum::<u64>(), 9);
//! # }
//! ```

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::balance::balancer::LoadBalancer;
use crate::balance::stats::WorkerStatsSnapshot;
use crate::balance::strategy::{Strategy, StrategyKind};
use crate::balance::worker::{ProcessorRef, Worker};
use crate::config::Config;
use crate::error::DispatchError;
use crate::events::Bus;
use crate::policies::BackoffPolicy;

/// Fixed worker pool plus one selection strategy.
pub struct LoadBalancingBroker<T> {
    balancer: LoadBalancer<T>,
    token: CancellationToken,
}

impl<T: Send + 'static> LoadBalancingBroker<T> {
    /// Starts building a broker around `processor`.
    pub fn builder(processor: ProcessorRef<T>) -> BrokerBuilder<T> {
        BrokerBuilder::new(processor)
    }

    pub async fn dispatch(&self, item: T) -> bool {
        self.balancer.dispatch(item).await
    }

    pub async fn try_dispatch(&self, item: T) -> Result<usize, DispatchError> {
        self.balancer.try_dispatch(item).await
    }

    pub fn balancer(&self) -> &LoadBalancer<T> {
        &self.balancer
    }

    pub fn workers(&self) -> &[Arc<Worker<T>>] {
        self.balancer.workers()
    }

    /// One snapshot per worker, in pool order.
    pub fn stats(&self) -> Vec<WorkerStatsSnapshot> {
        self.workers().iter().map(|w| w.stats()).collect()
    }

    /// Items queued or in flight across the pool.
    pub fn pending(&self) -> usize {
        self.workers().iter().map(|w| w.depth()).sum()
    }

    /// Stops intake on every worker; pending dispatches report `Cancelled`.
    pub fn close(&self) {
        self.token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Waits for every worker to drain and exit.
    pub async fn wait_for_completion(&self) {
        for worker in self.workers() {
            worker.wait_for_completion().await;
        }
    }

    /// Closes the pool and waits for it to drain.
    pub async fn shutdown(&self) {
        self.close();
        self.wait_for_completion().await;
    }
}

/// Builder for [`LoadBalancingBroker`].
pub struct BrokerBuilder<T> {
    name: String,
    processor: ProcessorRef<T>,
    workers: usize,
    capacity: usize,
    strategy: Option<Box<dyn Strategy<T>>>,
    backoff: BackoffPolicy,
    token: Option<CancellationToken>,
    bus: Option<Bus>,
}

impl<T: Send + 'static> BrokerBuilder<T> {
    fn new(processor: ProcessorRef<T>) -> Self {
        let cfg = Config::default();
        Self {
            name: "broker".to_string(),
            processor,
            workers: 1,
            capacity: cfg.worker_capacity,
            strategy: None,
            backoff: cfg.dispatch_backoff,
            token: None,
            bus: None,
        }
    }

    /// Takes worker capacity and dispatch backoff from `cfg`.
    pub fn config(mut self, cfg: &Config) -> Self {
        self.capacity = cfg.worker_capacity;
        self.backoff = cfg.dispatch_backoff;
        self
    }

    /// Name used in logs and events.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Pool size (fixed after `build`).
    pub fn workers(mut self, n: usize) -> Self {
        self.workers = n;
        self
    }

    /// Per-worker capacity (`0` = unbounded).
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Selection strategy (default: round robin).
    pub fn strategy(mut self, strategy: Box<dyn Strategy<T>>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Parent token; the broker runs under a child of it.
    pub fn token(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Spawns the worker pool.
    pub fn build(self) -> LoadBalancingBroker<T> {
        let token = self
            .token
            .map(|parent| parent.child_token())
            .unwrap_or_default();

        let pool: Arc<[Arc<Worker<T>>]> = (0..self.workers)
            .map(|id| {
                Worker::spawn(
                    id,
                    self.capacity,
                    Arc::clone(&self.processor),
                    token.child_token(),
                )
            })
            .collect();

        let strategy = self
            .strategy
            .unwrap_or_else(|| StrategyKind::RoundRobin.build());

        LoadBalancingBroker {
            balancer: LoadBalancer::new(
                self.name,
                pool,
                strategy,
                self.backoff,
                token.clone(),
                self.bus.unwrap_or_default(),
            ),
            token,
        }
    }
}

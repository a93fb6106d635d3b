//! # Balanced service: buffered intake feeding a worker pool.
//!
//! ```text
//! enqueue(item) ──► intake (bounded: worker_batch_size)
//!                      │
//!                   feeder task
//!                      ├─► throttle (≥ propagation_delay between items)
//!                      └─► broker.dispatch(item) ──► Worker[i]
//!
//! run(ctx)
//!   ├─ build a fresh broker and intake, mark propagation pending
//!   ├─ every idle_time: Idle when disabled or intake and pool are empty, else Running
//!   └─ on cancel: close the intake; the feeder drains it, shuts the
//!      broker down, then clears the pending mark
//! ```
//!
//! ## Rules
//! - `enqueue` suspends while the intake holds `worker_batch_size` items.
//! - A disabled service refuses new items with `Disabled`; items already
//!   accepted still reach the pool.
//! - Items accepted by `enqueue` are dispatched even when the service stops.
//! - A new run is refused with `PropagationPending` until the previous
//!   feeder has finished.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::balance::{LoadBalancingBroker, ProcessorRef, Strategy, StrategyKind};
use crate::config::{Config, ServiceSettings};
use crate::error::{DispatchError, LifecycleError, TaskError};
use crate::service::context::ServiceContext;
use crate::service::work_loop::Service;
use crate::sync::Throttle;

type StrategyFactory<T> = Arc<dyn Fn() -> Box<dyn Strategy<T>> + Send + Sync>;

/// Service that spreads enqueued items over a broker pool.
pub struct BalancedService<T> {
    processor: ProcessorRef<T>,
    strategy: StrategyFactory<T>,
    workers: usize,
    capacity: usize,
    batch_size: usize,
    delay: Duration,
    idle: Duration,
    enabled: AtomicBool,
    intake: Mutex<Option<mpsc::Sender<T>>>,
    broker: Mutex<Option<Arc<LoadBalancingBroker<T>>>>,
    propagating: Arc<AtomicBool>,
}

impl<T: Send + 'static> BalancedService<T> {
    /// Pool size, batch size, delay, idle time and `enabled` come from `settings`.
    pub fn new(processor: ProcessorRef<T>, settings: &ServiceSettings) -> Self {
        Self {
            processor,
            strategy: Arc::new(|| StrategyKind::RoundRobin.build::<T>()),
            workers: settings.number_of_workers,
            capacity: Config::default().worker_capacity,
            batch_size: settings.batch_size_clamped(),
            delay: settings.propagation_delay(),
            idle: settings.idle_time(),
            enabled: AtomicBool::new(settings.enabled),
            intake: Mutex::new(None),
            broker: Mutex::new(None),
            propagating: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Strategy used by the broker of each run.
    pub fn with_strategy<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Strategy<T>> + Send + Sync + 'static,
    {
        self.strategy = Arc::new(factory);
        self
    }

    /// Per-worker capacity (`0` = unbounded).
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Hands `item` to the intake, waiting while it is full.
    pub async fn enqueue(&self, item: T) -> Result<(), DispatchError> {
        if !self.is_enabled() {
            return Err(DispatchError::Disabled);
        }
        let tx = self
            .intake
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(DispatchError::NotRunning)?;
        tx.send(item).await.map_err(|_| DispatchError::NotRunning)
    }

    /// Broker of the current (or last) run.
    pub fn broker(&self) -> Option<Arc<LoadBalancingBroker<T>>> {
        self.broker.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// True until the feeder of the last run has drained and shut the broker down.
    pub fn is_propagating(&self) -> bool {
        self.propagating.load(Ordering::Acquire)
    }

    fn spawn_feeder(&self, mut rx: mpsc::Receiver<T>, broker: Arc<LoadBalancingBroker<T>>) {
        let propagating = Arc::clone(&self.propagating);
        let mut throttle = Throttle::new(self.delay);
        tokio::spawn(async move {
            while let Some(item) = rx.recv().await {
                throttle.ready_uncancellable().await;
                broker.dispatch(item).await;
            }
            broker.shutdown().await;
            propagating.store(false, Ordering::Release);
        });
    }
}

#[async_trait]
impl<T: Send + 'static> Service for BalancedService<T> {
    async fn prepare(&self, ctx: &ServiceContext) -> Result<(), LifecycleError> {
        if self.is_propagating() {
            return Err(LifecycleError::PropagationPending {
                name: ctx.name().to_string(),
            });
        }
        Ok(())
    }

    async fn run(&self, ctx: ServiceContext) -> Result<(), TaskError> {
        let (tx, rx) = mpsc::channel::<T>(self.batch_size);
        let broker = Arc::new(
            LoadBalancingBroker::builder(Arc::clone(&self.processor))
                .name(ctx.name())
                .workers(self.workers)
                .capacity(self.capacity)
                .strategy((self.strategy)())
                .bus(ctx.bus().clone())
                .build(),
        );

        self.propagating.store(true, Ordering::Release);
        *self.broker.lock().unwrap_or_else(|e| e.into_inner()) = Some(Arc::clone(&broker));
        *self.intake.lock().unwrap_or_else(|e| e.into_inner()) = Some(tx.clone());
        self.spawn_feeder(rx, Arc::clone(&broker));

        loop {
            let drained = tx.capacity() == tx.max_capacity() && broker.pending() == 0;
            if drained || !self.is_enabled() {
                ctx.set_idle();
            } else {
                ctx.set_running();
            }
            tokio::select! {
                _ = ctx.cancelled() => break,
                _ = tokio::time::sleep(self.idle) => {}
            }
        }

        self.intake.lock().unwrap_or_else(|e| e.into_inner()).take();
        drop(tx);
        tracing::debug!(service = %ctx.name(), "intake closed, propagation draining");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use tokio::sync::Semaphore;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::balance::ProcessFn;
    use crate::events::Bus;
    use crate::service::status::ServiceStatus;
    use crate::service::task::ServiceTask;

    fn settings(workers: usize) -> ServiceSettings {
        ServiceSettings {
            name: "ingest".into(),
            number_of_workers: workers,
            worker_batch_size: 4,
            propagation_delay_ms: 0,
            idle_time_ms: 10,
            ..ServiceSettings::default()
        }
    }

    async fn wait_for(task: &ServiceTask, status: ServiceStatus) {
        while task.status() != status {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    #[tokio::test]
    async fn enqueue_before_start_is_rejected() {
        let svc = BalancedService::<u32>::new(ProcessFn::arc(|_n: u32| async { true }), &settings(1));
        assert_eq!(svc.enqueue(1).await, Err(DispatchError::NotRunning));
    }

    #[tokio::test]
    async fn disabled_service_idles_and_refuses_items() {
        let disabled = ServiceSettings {
            enabled: false,
            ..settings(1)
        };
        let svc = Arc::new(BalancedService::<u32>::new(
            ProcessFn::arc(|_n: u32| async { true }),
            &disabled,
        ));
        let task = Arc::new(ServiceTask::new("ingest", Arc::clone(&svc) as _, Bus::new(64)));
        let token = CancellationToken::new();
        let running = {
            let t = Arc::clone(&task);
            let tok = token.clone();
            tokio::spawn(async move { t.start(tok).await })
        };
        wait_for(&task, ServiceStatus::Idle).await;
        assert_eq!(svc.enqueue(1).await, Err(DispatchError::Disabled));

        svc.set_enabled(true);
        svc.enqueue(2).await.unwrap();

        token.cancel();
        running.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn enqueued_items_reach_every_worker() {
        let seen = Arc::new(AtomicUsize::new(0));
        let processor = {
            let seen = Arc::clone(&seen);
            ProcessFn::arc(move |_n: u32| {
                let seen = Arc::clone(&seen);
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    true
                }
            })
        };
        let svc = Arc::new(BalancedService::<u32>::new(processor, &settings(3)));
        let task = Arc::new(ServiceTask::new("ingest", Arc::clone(&svc) as _, Bus::new(64)));
        let token = CancellationToken::new();
        let running = {
            let t = Arc::clone(&task);
            let tok = token.clone();
            tokio::spawn(async move { t.start(tok).await })
        };
        wait_for(&task, ServiceStatus::Idle).await;

        for n in 0..9 {
            svc.enqueue(n).await.unwrap();
        }
        token.cancel();
        running.await.unwrap().unwrap();
        while svc.is_propagating() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        assert_eq!(seen.load(Ordering::SeqCst), 9);
        let stats = svc.broker().unwrap().stats();
        assert!(stats.iter().all(|s| s.processed() == 3));
    }

    #[tokio::test]
    async fn restart_while_draining_is_refused() {
        let gate = Arc::new(Semaphore::new(0));
        let processor = {
            let gate = Arc::clone(&gate);
            ProcessFn::arc(move |_n: u32| {
                let gate = Arc::clone(&gate);
                async move {
                    gate.acquire().await.map(|p| p.forget()).is_ok()
                }
            })
        };
        let svc = Arc::new(BalancedService::<u32>::new(processor, &settings(1)));
        let task = Arc::new(ServiceTask::new("ingest", Arc::clone(&svc) as _, Bus::new(64)));

        let token = CancellationToken::new();
        let running = {
            let t = Arc::clone(&task);
            let tok = token.clone();
            tokio::spawn(async move { t.start(tok).await })
        };
        wait_for(&task, ServiceStatus::Idle).await;
        svc.enqueue(1).await.unwrap();
        token.cancel();
        running.await.unwrap().unwrap();

        assert!(svc.is_propagating());
        assert_eq!(
            task.start(CancellationToken::new()).await,
            Err(LifecycleError::PropagationPending {
                name: "ingest".to_string()
            })
        );
        assert_eq!(task.status(), ServiceStatus::Stopped);

        gate.add_permits(1);
        while svc.is_propagating() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        let token = CancellationToken::new();
        let running = {
            let t = Arc::clone(&task);
            let tok = token.clone();
            tokio::spawn(async move { t.start(tok).await })
        };
        wait_for(&task, ServiceStatus::Idle).await;
        token.cancel();
        running.await.unwrap().unwrap();
    }
}

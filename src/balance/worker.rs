//! # Worker: one bounded, FIFO processing unit.
//!
//! ```text
//! receive(item)
//!   ├─► last_assigned = now
//!   ├─► acquire capacity slot        (suspends while `capacity` items are held)
//!   ├─► depth += 1, push onto FIFO
//!   ▼
//! worker loop (one spawned task)
//!   ├─► pop item
//!   ├─► processor.process(item)      (panic → counted as error)
//!   ├─► succeeded/errored += 1, timings updated
//!   ├─► depth -= 1
//!   └─► release slot                 (a blocked receive may proceed)
//! ```
//!
//! ## Rules
//! - Items are processed one at a time, in arrival order.
//! - The slot of an item is held until it has been processed and recorded, so
//!   `capacity` bounds queued plus in-flight items.
//! - `capacity = 0` means unbounded: `receive` never suspends.
//! - `close()` (or cancelling the worker's token) stops intake; items already
//!   queued are still processed before the loop exits.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::balance::stats::{WorkerStats, WorkerStatsSnapshot};
use crate::core::run_guarded;
use crate::error::DispatchError;

/// Caller-supplied work function of a worker pool.
///
/// Returns `true` when the item was handled successfully.
#[async_trait]
pub trait Process<T>: Send + Sync + 'static {
    async fn process(&self, item: T) -> bool;
}

/// Shared handle to a processor.
pub type ProcessorRef<T> = Arc<dyn Process<T>>;

/// Closure-backed [`Process`].
pub struct ProcessFn<F> {
    f: F,
}

impl<F> ProcessFn<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }

    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<T, F, Fut> Process<T> for ProcessFn<F>
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    async fn process(&self, item: T) -> bool {
        (self.f)(item).await
    }
}

struct Envelope<T> {
    item: T,
    slot: Option<OwnedSemaphorePermit>,
}

/// One concurrent execution unit of a broker pool.
pub struct Worker<T> {
    id: usize,
    capacity: usize,
    slots: Option<Arc<Semaphore>>,
    tx: mpsc::UnboundedSender<Envelope<T>>,
    stats: Arc<WorkerStats>,
    last_assigned: Mutex<Option<Instant>>,
    token: CancellationToken,
    handle: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> Worker<T> {
    /// Creates the worker and spawns its processing loop.
    ///
    /// The loop stops accepting items when `token` is cancelled.
    pub fn spawn(
        id: usize,
        capacity: usize,
        processor: ProcessorRef<T>,
        token: CancellationToken,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(WorkerStats::default());
        let handle = tokio::spawn(run_loop(
            id,
            rx,
            processor,
            Arc::clone(&stats),
            token.clone(),
        ));

        Arc::new(Self {
            id,
            capacity,
            slots: (capacity > 0).then(|| Arc::new(Semaphore::new(capacity))),
            tx,
            stats,
            last_assigned: Mutex::new(None),
            token,
            handle: tokio::sync::Mutex::new(Some(handle)),
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Configured capacity (`0` = unbounded).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items queued or in flight.
    pub fn depth(&self) -> usize {
        self.stats.depth()
    }

    /// True while the queue depth is below capacity.
    pub fn can_receive(&self) -> bool {
        self.capacity == 0 || self.depth() < self.capacity
    }

    /// Enqueues an item, suspending while the worker is at capacity.
    pub async fn receive(&self, item: T) -> Result<(), DispatchError> {
        *self
            .last_assigned
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());

        let slot = match &self.slots {
            Some(slots) => Some(
                Arc::clone(slots)
                    .acquire_owned()
                    .await
                    .map_err(|_| DispatchError::WorkerClosed { worker: self.id })?,
            ),
            None => None,
        };

        self.stats.enqueued();
        if self.tx.send(Envelope { item, slot }).is_err() {
            self.stats.dequeued();
            return Err(DispatchError::WorkerClosed { worker: self.id });
        }
        Ok(())
    }

    /// When this worker was last handed an item, `None` if never.
    pub fn last_assigned(&self) -> Option<Instant> {
        *self
            .last_assigned
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    pub fn stats(&self) -> WorkerStatsSnapshot {
        self.stats.snapshot()
    }

    /// Stops intake; queued items are still processed.
    pub fn close(&self) {
        self.token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Waits until the loop has drained its queue and exited.
    ///
    /// Returns immediately when another caller already awaited the loop.
    pub async fn wait_for_completion(&self) {
        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(worker = self.id, error = %e, "worker loop terminated abnormally");
            }
        }
    }
}

async fn run_loop<T: Send + 'static>(
    id: usize,
    mut rx: mpsc::UnboundedReceiver<Envelope<T>>,
    processor: ProcessorRef<T>,
    stats: Arc<WorkerStats>,
    token: CancellationToken,
) {
    let mut closing = false;
    loop {
        tokio::select! {
            envelope = rx.recv() => match envelope {
                Some(envelope) => process_one(id, envelope, processor.as_ref(), &stats).await,
                None => break,
            },
            _ = token.cancelled(), if !closing => {
                closing = true;
                rx.close();
            }
        }
    }
    tracing::debug!(worker = id, "worker drained");
}

async fn process_one<T: Send + 'static>(
    id: usize,
    envelope: Envelope<T>,
    processor: &dyn Process<T>,
    stats: &WorkerStats,
) {
    let Envelope { item, slot } = envelope;
    let started = Instant::now();
    let ok = match run_guarded(processor.process(item)).await {
        Ok(ok) => ok,
        Err(panic) => {
            tracing::warn!(worker = id, panic = %panic, "item processing panicked");
            false
        }
    };
    stats.record(started.elapsed(), ok);
    stats.dequeued();
    drop(slot);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn gated(gate: Arc<Semaphore>, seen: Arc<Mutex<Vec<u32>>>) -> ProcessorRef<u32> {
        ProcessFn::arc(move |item: u32| {
            let gate = Arc::clone(&gate);
            let seen = Arc::clone(&seen);
            async move {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
                seen.lock().unwrap().push(item);
                true
            }
        })
    }

    #[tokio::test]
    async fn receive_blocks_at_capacity_until_an_item_finishes() {
        let gate = Arc::new(Semaphore::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let worker = Worker::spawn(0, 2, gated(gate.clone(), seen.clone()), CancellationToken::new());

        worker.receive(1).await.unwrap();
        worker.receive(2).await.unwrap();
        assert!(!worker.can_receive());

        let w = Arc::clone(&worker);
        let mut third = tokio::spawn(async move { w.receive(3).await });
        assert!(
            tokio::time::timeout(Duration::from_millis(50), &mut third)
                .await
                .is_err(),
            "third receive completed while the worker was full"
        );

        gate.add_permits(1);
        third.await.unwrap().unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![1]);

        gate.add_permits(2);
        worker.close();
        worker.wait_for_completion().await;
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn zero_capacity_never_blocks() {
        let gate = Arc::new(Semaphore::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let worker = Worker::spawn(0, 0, gated(gate.clone(), seen.clone()), CancellationToken::new());

        for item in 0..500 {
            worker.receive(item).await.unwrap();
        }
        assert!(worker.can_receive());

        gate.add_permits(500);
        worker.close();
        worker.wait_for_completion().await;
        assert_eq!(seen.lock().unwrap().len(), 500);
    }

    #[tokio::test]
    async fn items_are_processed_in_arrival_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let processor: ProcessorRef<u32> = ProcessFn::arc(move |item: u32| {
            let s = Arc::clone(&s);
            async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                s.lock().unwrap().push(item);
                true
            }
        });
        let worker = Worker::spawn(0, 0, processor, CancellationToken::new());

        for item in 1..=3 {
            worker.receive(item).await.unwrap();
        }
        worker.close();
        worker.wait_for_completion().await;

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(worker.stats().succeeded, 3);
        assert_eq!(worker.depth(), 0);
    }

    #[tokio::test]
    async fn failures_and_panics_count_as_errors_and_the_loop_continues() {
        let processor: ProcessorRef<u32> = ProcessFn::arc(|item: u32| async move {
            match item {
                1 => false,
                2 => panic!("bad item"),
                _ => true,
            }
        });
        let worker = Worker::spawn(7, 0, processor, CancellationToken::new());

        for item in 1..=3 {
            worker.receive(item).await.unwrap();
        }
        worker.close();
        worker.wait_for_completion().await;

        let stats = worker.stats();
        assert_eq!(stats.errored, 2);
        assert_eq!(stats.succeeded, 1);
        assert!(stats.max.is_some());
    }

    #[tokio::test]
    async fn closed_worker_rejects_new_items() {
        let processor: ProcessorRef<u32> = ProcessFn::arc(|_item: u32| async { true });
        let worker = Worker::spawn(3, 0, processor, CancellationToken::new());

        worker.close();
        worker.wait_for_completion().await;

        assert_eq!(
            worker.receive(1).await,
            Err(DispatchError::WorkerClosed { worker: 3 })
        );
        assert_eq!(worker.depth(), 0);
        assert!(worker.last_assigned().is_some());
    }
}

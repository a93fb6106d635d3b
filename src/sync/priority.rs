//! # Prioritized multi-queue wait.
//!
//! A set of FIFO sources, each with a priority number, behind one wait point.
//!
//! ```text
//! next(timeout, token)
//!   loop:
//!     ├─► pop from the non-empty source with the lowest (priority, registration order)
//!     │       └─ found ─► Wake::Item
//!     ├─► token cancelled and every source empty ─► Wake::Cancelled
//!     └─► select (biased):
//!           ├─ token.cancelled()   ─► loop (drain what is left)
//!           ├─ notify.notified()   ─► loop
//!           └─ sleep_until(deadline) ─► Wake::Timeout
//! ```
//!
//! ## Rules
//! - Lower priority numbers win; equal priorities are served in registration order.
//! - Within one source, items come out in push order.
//! - After cancellation, queued items are still handed out; `Cancelled` is
//!   returned only once every source is empty.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Handle of one registered source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(usize);

/// Outcome of [`PrioritySources::next`].
#[derive(Debug, PartialEq, Eq)]
pub enum Wake<T> {
    /// An item from the highest-priority ready source.
    Item { source: SourceId, priority: u32, item: T },
    /// Nothing arrived within the timeout.
    Timeout,
    /// The token was cancelled and every source is drained.
    Cancelled,
}

struct Source<T> {
    priority: u32,
    items: VecDeque<T>,
}

/// Prioritized queues with a single wait point.
pub struct PrioritySources<T> {
    sources: Mutex<Vec<Source<T>>>,
    notify: Notify,
}

impl<T> Default for PrioritySources<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PrioritySources<T> {
    pub fn new() -> Self {
        Self {
            sources: Mutex::new(Vec::new()),
            notify: Notify::new(),
        }
    }

    /// Adds a source; lower `priority` numbers are served first.
    pub fn register(&self, priority: u32) -> SourceId {
        let mut sources = self.sources.lock().unwrap_or_else(|e| e.into_inner());
        sources.push(Source {
            priority,
            items: VecDeque::new(),
        });
        SourceId(sources.len() - 1)
    }

    /// Queues `item` on `source` and wakes one waiter.
    ///
    /// Items pushed to an unknown source are dropped and `false` is returned.
    pub fn push(&self, source: SourceId, item: T) -> bool {
        {
            let mut sources = self.sources.lock().unwrap_or_else(|e| e.into_inner());
            match sources.get_mut(source.0) {
                Some(src) => src.items.push_back(item),
                None => return false,
            }
        }
        self.notify.notify_one();
        true
    }

    /// Pops the next item without waiting.
    pub fn try_next(&self) -> Option<(SourceId, u32, T)> {
        let mut sources = self.sources.lock().unwrap_or_else(|e| e.into_inner());
        let idx = sources
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.items.is_empty())
            .min_by_key(|(idx, s)| (s.priority, *idx))
            .map(|(idx, _)| idx)?;
        let src = &mut sources[idx];
        let item = src.items.pop_front()?;
        Some((SourceId(idx), src.priority, item))
    }

    /// Waits for the next item, the timeout, or cancellation.
    pub async fn next(&self, timeout: Duration, token: &CancellationToken) -> Wake<T> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some((source, priority, item)) = self.try_next() {
                return Wake::Item {
                    source,
                    priority,
                    item,
                };
            }
            if token.is_cancelled() {
                return Wake::Cancelled;
            }
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep_until(deadline) => return Wake::Timeout,
            }
        }
    }

    /// Removes every queued item, in service order.
    pub fn drain(&self) -> Vec<T> {
        let mut out = Vec::new();
        while let Some((_, _, item)) = self.try_next() {
            out.push(item);
        }
        out
    }

    /// Total number of queued items.
    pub fn len(&self) -> usize {
        let sources = self.sources.lock().unwrap_or_else(|e| e.into_inner());
        sources.iter().map(|s| s.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn lower_priority_number_wins() {
        let sources = PrioritySources::new();
        let low = sources.register(5);
        let high = sources.register(1);
        sources.push(low, "bulk");
        sources.push(high, "urgent");

        let token = CancellationToken::new();
        let first = sources.next(Duration::from_millis(10), &token).await;
        assert_eq!(
            first,
            Wake::Item {
                source: high,
                priority: 1,
                item: "urgent"
            }
        );
        assert!(matches!(
            sources.next(Duration::from_millis(10), &token).await,
            Wake::Item { item: "bulk", .. }
        ));
    }

    #[tokio::test]
    async fn equal_priorities_follow_registration_order() {
        let sources = PrioritySources::new();
        let a = sources.register(2);
        let b = sources.register(2);
        sources.push(b, 2);
        sources.push(a, 1);
        sources.push(a, 3);

        assert_eq!(sources.drain(), vec![1, 3, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_sources_time_out() {
        let sources: PrioritySources<u8> = PrioritySources::new();
        sources.register(0);
        let token = CancellationToken::new();

        let wake = sources.next(Duration::from_secs(3), &token).await;
        assert_eq!(wake, Wake::Timeout);
    }

    #[tokio::test]
    async fn push_wakes_a_waiter() {
        let sources = Arc::new(PrioritySources::new());
        let id = sources.register(0);
        let token = CancellationToken::new();

        let waiter = {
            let sources = Arc::clone(&sources);
            let token = token.clone();
            tokio::spawn(async move { sources.next(Duration::from_secs(5), &token).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        sources.push(id, 42u32);

        assert!(matches!(waiter.await.unwrap(), Wake::Item { item: 42, .. }));
    }

    #[tokio::test]
    async fn cancellation_drains_before_exit() {
        let sources = PrioritySources::new();
        let id = sources.register(0);
        sources.push(id, 'x');
        let token = CancellationToken::new();
        token.cancel();

        assert!(matches!(
            sources.next(Duration::from_secs(5), &token).await,
            Wake::Item { item: 'x', .. }
        ));
        assert_eq!(
            sources.next(Duration::from_secs(5), &token).await,
            Wake::Cancelled
        );
    }
}

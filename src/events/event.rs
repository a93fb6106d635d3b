//! # Runtime events.
//!
//! [`EventKind`] classifies what happened, grouped by publisher:
//! - **Service lifecycle**: starting, started, stopping, stopped, failed loop
//! - **Dispatch**: an item could not be handed to a worker
//! - **Jobs**: loaded, merged, merge rejected, firing starting/completed/aborted/skipped
//! - **Host**: shutdown requested, all stopped within grace, grace exceeded
//! - **Subscribers**: overflow, panic
//!
//! Each kind maps to a fixed [`Severity`], so a log sink does not need to
//! know the kinds to pick a level.
//!
//! ## Ordering guarantees
//! Each event carries a global, monotonically increasing `seq`.
//!
//! ## Example
//! ```rust
//! use taskloom::{Event, EventKind, Severity};
//!
//! let ev = Event::new(EventKind::DispatchFailed)
//!     .with_name("ingest")
//!     .with_worker(2)
//!     .with_reason("worker 2 is closed");
//!
//! assert_eq!(ev.name.as_deref(), Some("ingest"));
//! assert_eq!(ev.worker, Some(2));
//! assert_eq!(ev.severity(), Severity::Warning);
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use uuid::Uuid;

use crate::scheduler::TaskResult;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Five-level severity attached to every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Debug,
    Information,
    Warning,
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Debug => "debug",
            Severity::Information => "information",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

/// Classification of runtime events.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked while handling an event.
    ///
    /// Sets `name` (subscriber) and `reason` (panic message).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets `name` (subscriber) and `reason`.
    SubscriberOverflow,

    // === Host events ===
    /// Shutdown requested (OS signal or caller trigger).
    ShutdownRequested,

    /// Every service stopped within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded.
    ///
    /// Sets `reason` (names of the stuck services).
    GraceExceeded,

    // === Service lifecycle ===
    /// Service entered `Starting`. Sets `name`.
    ServiceStarting,

    /// Work loop launched, service is `Running`. Sets `name`.
    ServiceStarted,

    /// Service entered `Stopping`. Sets `name`.
    ServiceStopping,

    /// Service reached `Stopped`. Sets `name`.
    ServiceStopped,

    /// Work loop returned an error or panicked.
    ///
    /// Sets `name`, `reason`, `correlation`.
    ServiceFailed,

    // === Dispatch ===
    /// Item could not be dispatched.
    ///
    /// Sets `name` (balancer), `reason`, and `worker` when one was selected.
    DispatchFailed,

    // === Jobs ===
    /// A new job was added to a scheduler. Sets `name` (job).
    JobLoaded,

    /// A reload was merged into an existing job. Sets `name` (job).
    JobMerged,

    /// A reload could not be merged; the existing job is kept.
    ///
    /// Sets `name` (job) and `reason`.
    JobMergeRejected,

    /// Trigger reached its due time and is about to run the work.
    ///
    /// Sets `name` (job) and `delay_ms` (time spent waiting).
    JobStarting,

    /// Work finished. Sets `name` (job) and `result`.
    JobCompleted,

    /// Firing aborted (cancelled wait, error or panic).
    ///
    /// Sets `name` (job), `result` and `reason` when available.
    JobAborted,

    /// Validation gate refused the firing. Sets `name` (job) and `result`.
    JobSkipped,
}

impl EventKind {
    /// Severity of events of this kind.
    pub fn severity(&self) -> Severity {
        match self {
            EventKind::ServiceStarting
            | EventKind::ServiceStopping
            | EventKind::JobStarting
            | EventKind::JobCompleted => Severity::Debug,

            EventKind::ServiceStarted
            | EventKind::ServiceStopped
            | EventKind::ShutdownRequested
            | EventKind::AllStoppedWithin
            | EventKind::JobLoaded
            | EventKind::JobMerged
            | EventKind::JobSkipped => Severity::Information,

            EventKind::SubscriberOverflow
            | EventKind::DispatchFailed
            | EventKind::JobMergeRejected
            | EventKind::JobAborted => Severity::Warning,

            EventKind::SubscriberPanicked | EventKind::ServiceFailed => Severity::Error,

            EventKind::GraceExceeded => Severity::Fatal,
        }
    }

    /// Short stable label (snake_case).
    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::SubscriberPanicked => "subscriber_panicked",
            EventKind::SubscriberOverflow => "subscriber_overflow",
            EventKind::ShutdownRequested => "shutdown_requested",
            EventKind::AllStoppedWithin => "all_stopped_within_grace",
            EventKind::GraceExceeded => "grace_exceeded",
            EventKind::ServiceStarting => "service_starting",
            EventKind::ServiceStarted => "service_started",
            EventKind::ServiceStopping => "service_stopping",
            EventKind::ServiceStopped => "service_stopped",
            EventKind::ServiceFailed => "service_failed",
            EventKind::DispatchFailed => "dispatch_failed",
            EventKind::JobLoaded => "job_loaded",
            EventKind::JobMerged => "job_merged",
            EventKind::JobMergeRejected => "job_merge_rejected",
            EventKind::JobStarting => "job_starting",
            EventKind::JobCompleted => "job_completed",
            EventKind::JobAborted => "job_aborted",
            EventKind::JobSkipped => "job_skipped",
        }
    }
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp
/// - other fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    pub seq: u64,
    pub at: SystemTime,
    pub kind: EventKind,
    /// Service, job, balancer or subscriber name.
    pub name: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Worker index inside a broker pool.
    pub worker: Option<usize>,
    /// Outcome of a job firing.
    pub result: Option<TaskResult>,
    /// Delay in milliseconds (trigger wait).
    pub delay_ms: Option<u32>,
    /// Id shared by the log line and the event of one failure.
    pub correlation: Option<Uuid>,
}

impl Event {
    /// Creates an event of the given kind with the current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            name: None,
            reason: None,
            worker: None,
            result: None,
            delay_ms: None,
            correlation: None,
        }
    }

    #[inline]
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[inline]
    pub fn with_worker(mut self, worker: usize) -> Self {
        self.worker = Some(worker);
        self
    }

    #[inline]
    pub fn with_result(mut self, result: TaskResult) -> Self {
        self.result = Some(result);
        self
    }

    /// Attaches a delay (stored as milliseconds, saturating).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(d.as_millis().min(u128::from(u32::MAX)) as u32);
        self
    }

    #[inline]
    pub fn with_correlation(mut self, id: Uuid) -> Self {
        self.correlation = Some(id);
        self
    }

    /// Severity derived from the kind.
    #[inline]
    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    /// Creates a subscriber overflow event.
    pub(crate) fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_name(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    pub(crate) fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_name(subscriber)
            .with_reason(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::new(EventKind::JobLoaded);
        let b = Event::new(EventKind::JobLoaded);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn failures_outrank_lifecycle_noise() {
        assert!(EventKind::ServiceFailed.severity() > EventKind::ServiceStarted.severity());
        assert_eq!(EventKind::GraceExceeded.severity(), Severity::Fatal);
        assert_eq!(EventKind::JobStarting.severity(), Severity::Debug);
    }

    #[test]
    fn delay_saturates() {
        let ev = Event::new(EventKind::JobStarting).with_delay(Duration::from_secs(u64::MAX));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }
}

//! Runtime events: types and broadcast bus.
//!
//! Every moving part publishes what it does on a shared [`Bus`]: service
//! tasks (lifecycle phases, crashed loops), the balancer (failed dispatches),
//! the scheduler (loaded/merged jobs) and task triggers (job firings).
//!
//! ## Contents
//! - [`EventKind`], [`Event`], [`Severity`] classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `ServiceTask`, `LoadBalancer`, `JobScheduler`, `TaskTrigger`,
//!   `ServiceHost`, `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: `SubscriberSet::listen` fans out to user subscribers;
//!   [`LogWriter`](crate::LogWriter) forwards to `tracing`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind, Severity};

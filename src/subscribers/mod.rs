//! # Event subscribers.
//!
//! [`Subscribe`] is the extension point for reacting to runtime events;
//! [`SubscriberSet`] drives any number of them from one [`Bus`](crate::Bus).
//!
//! ```text
//! ServiceTask / LoadBalancer / TaskTrigger ── publish ──► Bus
//!                                                          │
//!                                              SubscriberSet::listen
//!                                          ┌───────────────┼───────────────┐
//!                                          ▼               ▼               ▼
//!                                      LogWriter        Metrics         Custom
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use taskloom::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct FailureCounter;
//!
//! #[async_trait]
//! impl Subscribe for FailureCounter {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::JobAborted {
//!             // increment a counter
//!         }
//!     }
//! }
//! ```

mod log;
mod subscribe;
mod subscriber_set;

pub use log::LogWriter;
pub use subscribe::Subscribe;
pub use subscriber_set::SubscriberSet;

//! Delay policies.
//!
//! The balancer polls a full worker before handing an item over; these knobs
//! decide how long it waits between polls.
//!
//! ## Contents
//! - [`BackoffPolicy`] how polling delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization applied on top of the computed delay
//!
//! ## Quick wiring
//! ```text
//! Config { dispatch_backoff: BackoffPolicy }
//!      └─► balance::LoadBalancer::try_dispatch uses:
//!           - backoff.next(attempt) between can_receive() polls
//! ```
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → first=10ms, factor=2.0, max=500ms, jitter=None.
//! - `JitterPolicy::None` by default; `Equal` spreads many producers polling one worker.

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;

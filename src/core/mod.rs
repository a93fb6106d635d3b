//! Runtime core: hosting and panic isolation.
//!
//! The public API here is [`ServiceHost`], which runs a set of
//! [`ServiceTask`](crate::ServiceTask)s until shutdown, and
//! [`wait_for_shutdown_signal`].
//!
//! Internal modules:
//! - [`runner`]: polls user futures under `catch_unwind`;
//! - [`host`]: starts services, handles shutdown, enforces the grace period;
//! - [`shutdown`]: cross-platform termination signal handling.

mod host;
mod runner;
mod shutdown;

pub use host::ServiceHost;
pub(crate) use runner::{log_join_failure, panic_message, run_guarded};
pub use shutdown::wait_for_shutdown_signal;

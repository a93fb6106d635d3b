//! Wait primitives shared by the services.
//!
//! - [`PrioritySources`] many prioritized FIFO queues behind one wait with
//!   timeout and cancellation cases
//! - [`Throttle`] minimum spacing between consecutive hand-offs

mod priority;
mod throttle;

pub use priority::{PrioritySources, SourceId, Wake};
pub use throttle::Throttle;

//! Named, cancellable actions.
//!
//! An [`Action`] is what a [`PeriodicService`](crate::PeriodicService) runs on
//! every iteration. Implement the trait for stateful actions, or wrap a
//! closure in [`ActionFn`].

mod action;
mod action_fn;

pub use action::{Action, ActionRef};
pub use action_fn::ActionFn;

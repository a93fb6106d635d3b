//! # Panic-isolated execution of one unit of work.
//!
//! Worker items, service loops, job firings and subscriber callbacks all run
//! user code. [`run_guarded`] polls such a future under `catch_unwind` and
//! turns a panic into its message, so one bad item never tears down the loop
//! that drives it.
//!
//! ## Rules
//! - The future's output is returned unchanged when it completes normally.
//! - A panic becomes `Err(message)`; the caller decides how to record it.
//! - `AssertUnwindSafe` is applied: state shared with the future through a
//!   `Mutex` may be left poisoned or half-updated after a panic.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::task::JoinError;

/// Polls `fut` to completion, catching panics.
pub(crate) async fn run_guarded<F>(fut: F) -> Result<F::Output, String>
where
    F: Future,
{
    AssertUnwindSafe(fut)
        .catch_unwind()
        .await
        .map_err(|payload| panic_message(payload.as_ref()))
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Logs a background task that ended by panicking or being aborted.
///
/// Returns `true` when the task finished normally.
pub(crate) fn log_join_failure(what: &'static str, joined: Result<(), JoinError>) -> bool {
    match joined {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(task = what, error = %err, "background task failed to join");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn normal_output_passes_through() {
        let out = run_guarded(async { 7 }).await;
        assert_eq!(out, Ok(7));
    }

    #[tokio::test]
    async fn panic_becomes_message() {
        let out = run_guarded(async {
            if true {
                panic!("item {} exploded", 3);
            }
        })
        .await;
        assert_eq!(out, Err("item 3 exploded".to_string()));
    }

    #[tokio::test]
    async fn panicked_background_task_is_reported() {
        let crashed = tokio::spawn(async {
            if true {
                panic!("listener gone");
            }
        })
        .await;
        assert!(!log_join_failure("listener", crashed));
        assert!(log_join_failure("listener", tokio::spawn(async {}).await));
    }
}

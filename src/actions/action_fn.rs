//! Closure-backed [`Action`].
//!
//! Every run calls the closure again and awaits the future it returns; state
//! that must survive between runs goes in an `Arc` captured by the closure.
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use tokio_util::sync::CancellationToken;
//! use taskloom::{ActionFn, ActionRef, TaskError};
//!
//! let beats = Arc::new(AtomicU64::new(0));
//! let counter = Arc::clone(&beats);
//! let heartbeat: ActionRef = ActionFn::arc("heartbeat", move |_token: CancellationToken| {
//!     let counter = Arc::clone(&counter);
//!     async move {
//!         counter.fetch_add(1, Ordering::Relaxed);
//!         Ok::<_, TaskError>(())
//!     }
//! });
//! assert_eq!(heartbeat.name(), "heartbeat");
//! ```

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::actions::action::Action;
use crate::error::TaskError;

pub struct ActionFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> ActionFn<F> {
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Same as [`ActionFn::new`], behind an `Arc` ready to coerce into an [`ActionRef`](crate::ActionRef).
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<F> fmt::Debug for ActionFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionFn").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F, Fut> Action for ActionFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, token: CancellationToken) -> Result<(), TaskError> {
        (self.f)(token).await
    }
}

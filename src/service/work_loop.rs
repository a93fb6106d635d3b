//! # The work loop contract of a service.
//!
//! A [`Service`] is what a [`ServiceTask`](crate::ServiceTask) drives: an
//! optional synchronous-looking `prepare` step that may refuse the start, and
//! a long-running `run` that should return once its context is cancelled.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{LifecycleError, TaskError};
use crate::service::context::ServiceContext;

/// Shared handle to a service implementation.
pub type ServiceRef = Arc<dyn Service>;

#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Called during `Starting`, before the loop is launched.
    ///
    /// An error aborts the start and is returned to the caller of `start`.
    async fn prepare(&self, _ctx: &ServiceContext) -> Result<(), LifecycleError> {
        Ok(())
    }

    /// The work loop. Returning (with or without error) ends the run.
    async fn run(&self, ctx: ServiceContext) -> Result<(), TaskError>;
}

/// Closure-backed [`Service`].
///
/// ```rust
/// use taskloom::{ServiceContext, ServiceFn, ServiceRef, TaskError};
///
/// let svc: ServiceRef = ServiceFn::arc(|ctx: ServiceContext| async move {
///     ctx.cancelled().await;
///     Ok::<_, TaskError>(())
/// });
/// # let _ = svc;
/// ```
pub struct ServiceFn<F> {
    f: F,
}

impl<F> ServiceFn<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }

    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> Service for ServiceFn<F>
where
    F: Fn(ServiceContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    async fn run(&self, ctx: ServiceContext) -> Result<(), TaskError> {
        (self.f)(ctx).await
    }
}

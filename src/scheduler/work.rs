//! # Job work definition.
//!
//! [`JobWork`] is what a job runs on each firing. Its [`JobWork::kind`]
//! identifies the definition type: a reload can only replace a job's work
//! with work of the same kind.
//!
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use taskloom::{JobExecutionContext, JobFn, TaskError, TaskResult, WorkRef};
//!
//! let work: WorkRef = JobFn::arc(
//!     "report",
//!     |ctx: JobExecutionContext, _token: CancellationToken| async move {
//!         if ctx.param("target").is_none() {
//!             return Ok::<_, TaskError>(TaskResult::NO_DATA);
//!         }
//!         Ok(TaskResult::SUCCESS)
//!     },
//! );
//! assert_eq!(work.kind(), "report");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::scheduler::context::JobExecutionContext;
use crate::scheduler::result::TaskResult;

/// Shared handle to a work definition.
pub type WorkRef = Arc<dyn JobWork>;

/// Unit of work fired by a job.
#[async_trait]
pub trait JobWork: Send + Sync + 'static {
    /// Identity of the work definition, compared when merging reloads.
    fn kind(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Validation gate checked before every non-forced firing.
    fn can_execute(&self) -> bool {
        true
    }

    async fn run(
        &self,
        ctx: &JobExecutionContext,
        token: CancellationToken,
    ) -> Result<TaskResult, TaskError>;
}

/// Closure-backed [`JobWork`] with an explicit kind.
pub struct JobFn<F> {
    kind: Cow<'static, str>,
    f: F,
}

impl<F> JobFn<F> {
    pub fn new(kind: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            kind: kind.into(),
            f,
        }
    }

    pub fn arc(kind: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(kind, f))
    }
}

#[async_trait]
impl<F, Fut> JobWork for JobFn<F>
where
    F: Fn(JobExecutionContext, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<TaskResult, TaskError>> + Send + 'static,
{
    fn kind(&self) -> &str {
        &self.kind
    }

    async fn run(
        &self,
        ctx: &JobExecutionContext,
        token: CancellationToken,
    ) -> Result<TaskResult, TaskError> {
        (self.f)(ctx.clone(), token).await
    }
}

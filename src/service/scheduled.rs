//! # Scheduled service: a job scheduler hosted as a service.
//!
//! ```text
//! run(ctx)
//!   ├─ reload once          (provider.load() → scheduler.load_jobs)
//!   └─ join:
//!        ├─ scheduler.start(ctx.token)
//!        └─ every reload_interval: reload
//! ```
//!
//! A reload that fails, or a definition the scheduler rejects, is logged and
//! leaves the loaded jobs armed.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::Config;
use crate::core::run_guarded;
use crate::error::TaskError;
use crate::scheduler::{Job, JobScheduler};
use crate::service::context::ServiceContext;
use crate::service::work_loop::Service;

/// Source of job definitions for a [`ScheduledService`].
#[async_trait]
pub trait JobProvider: Send + Sync + 'static {
    async fn load(&self) -> Result<Vec<Job>, TaskError>;
}

/// Closure-backed [`JobProvider`].
pub struct JobProviderFn<F> {
    f: F,
}

impl<F> JobProviderFn<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }

    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> JobProvider for JobProviderFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<Job>, TaskError>> + Send + 'static,
{
    async fn load(&self) -> Result<Vec<Job>, TaskError> {
        (self.f)().await
    }
}

pub struct ScheduledService {
    scheduler: Arc<JobScheduler>,
    provider: Arc<dyn JobProvider>,
    reload: Duration,
}

impl ScheduledService {
    pub fn new(scheduler: Arc<JobScheduler>, provider: Arc<dyn JobProvider>) -> Self {
        Self {
            scheduler,
            provider,
            reload: Config::default().reload_interval,
        }
    }

    pub fn with_reload_interval(mut self, every: Duration) -> Self {
        self.reload = every;
        self
    }

    pub fn scheduler(&self) -> &Arc<JobScheduler> {
        &self.scheduler
    }

    async fn reload(&self, ctx: &ServiceContext) {
        let jobs = match run_guarded(self.provider.load()).await {
            Ok(Ok(jobs)) => jobs,
            Ok(Err(err)) => {
                tracing::warn!(service = %ctx.name(), error = %err, "job reload failed");
                return;
            }
            Err(panic) => {
                tracing::error!(service = %ctx.name(), panic = %panic, "job provider panicked");
                return;
            }
        };
        let count = jobs.len();
        if let Err(err) = self.scheduler.load_jobs(jobs) {
            tracing::debug!(service = %ctx.name(), error = %err, "reload kept some loaded jobs");
        }
        tracing::debug!(service = %ctx.name(), jobs = count, "job definitions reloaded");
    }
}

#[async_trait]
impl Service for ScheduledService {
    async fn run(&self, ctx: ServiceContext) -> Result<(), TaskError> {
        self.reload(&ctx).await;

        let reloads = async {
            loop {
                tokio::select! {
                    _ = ctx.cancelled() => break,
                    _ = tokio::time::sleep(self.reload) => {}
                }
                self.reload(&ctx).await;
            }
        };
        let (started, ()) = tokio::join!(self.scheduler.start(ctx.token().clone()), reloads);
        started.map_err(|err| TaskError::Fatal {
            error: err.to_string(),
        })
    }
}

//! # Periodic service: run one action, pause, repeat.
//!
//! ```text
//! loop
//!   ├─ enabled  → Running, action.run(token)    (Fail/Timeout logged, Fatal ends the run)
//!   ├─ disabled → Idle
//!   └─ wait idle_time (or cancellation)
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::ServiceSettings;
use crate::core::run_guarded;
use crate::error::TaskError;
use crate::service::context::ServiceContext;
use crate::service::work_loop::Service;
use crate::actions::ActionRef;

/// Repeats an [`Action`](crate::Action) every `idle` while enabled.
pub struct PeriodicService {
    action: ActionRef,
    idle: Duration,
    timeout: Option<Duration>,
    enabled: AtomicBool,
}

impl PeriodicService {
    pub fn new(action: ActionRef, idle: Duration) -> Self {
        Self {
            action,
            idle,
            timeout: None,
            enabled: AtomicBool::new(true),
        }
    }

    /// Takes `idle_time` and `enabled` from the settings record.
    pub fn from_settings(action: ActionRef, settings: &ServiceSettings) -> Self {
        let svc = Self::new(action, settings.idle_time());
        svc.set_enabled(settings.enabled);
        svc
    }

    /// Bounds a single run; an overrun is reported as [`TaskError::Timeout`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Takes effect at the next iteration.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }
}

impl PeriodicService {
    async fn run_once(&self, ctx: &ServiceContext) -> Result<(), TaskError> {
        let attempt = self.action.run(ctx.token().clone());
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, attempt)
                .await
                .map_err(|_| TaskError::Timeout { timeout: limit })?,
            None => attempt.await,
        }
    }
}

#[async_trait]
impl Service for PeriodicService {
    async fn run(&self, ctx: ServiceContext) -> Result<(), TaskError> {
        while !ctx.is_cancelled() {
            if self.is_enabled() {
                ctx.set_running();
                match run_guarded(self.run_once(&ctx)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(err @ TaskError::Fatal { .. })) => return Err(err),
                    Ok(Err(err)) => tracing::warn!(
                        service = %ctx.name(),
                        action = %self.action.name(),
                        error = %err,
                        "periodic action failed"
                    ),
                    Err(panic) => tracing::error!(
                        service = %ctx.name(),
                        action = %self.action.name(),
                        panic = %panic,
                        "periodic action panicked"
                    ),
                }
            } else {
                ctx.set_idle();
            }

            tokio::select! {
                _ = ctx.cancelled() => break,
                _ = tokio::time::sleep(self.idle) => {}
            }
        }
        Ok(())
    }
}

//! # ServiceTask: a named state machine around one cancellable work loop.
//!
//! ```text
//! start(cancel)
//!   ├─ check_start                    → LifecycleError (status unchanged)
//!   ├─ cancel already fired?          → Ok(()), nothing happens
//!   ├─ Starting   → ServiceStarting, before_start hooks
//!   ├─ prepare(ctx)                   → Err: Stopped (event, hooks), error returned
//!   ├─ spawn guarded run(ctx)         (work token = cancel.child_token())
//!   ├─ Running    → ServiceStarted, started hooks
//!   ├─ wait: cancel | stop() | ctx.complete() | loop returned
//!   ├─ Stopping   → ServiceStopping, before_stop hooks
//!   ├─ cancel work token, await loop for at most `grace` (then detach)
//!   └─ Stopped    → ServiceStopped, stopped hooks
//! ```
//!
//! ## Rules
//! - `start` resolves only after the task reached `Stopped`.
//! - Errors and panics escaping the loop are logged with a correlation id,
//!   published as `ServiceFailed`, and end the run; they never reach the caller.
//! - Lifecycle violations are returned synchronously and leave the status as it was.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::Config;
use crate::core::run_guarded;
use crate::error::LifecycleError;
use crate::events::{Bus, Event, EventKind};
use crate::service::context::ServiceContext;
use crate::service::hooks::{HookContext, LifecycleHooks, LifecyclePhase};
use crate::service::status::ServiceStatus;
use crate::service::work_loop::ServiceRef;

/// Supervised, restartable service.
pub struct ServiceTask {
    name: Arc<str>,
    service: ServiceRef,
    hooks: LifecycleHooks,
    grace: Duration,
    bus: Bus,
    status: Arc<Mutex<ServiceStatus>>,
    stop: Mutex<Option<CancellationToken>>,
}

impl ServiceTask {
    pub fn new(name: impl Into<Arc<str>>, service: ServiceRef, bus: Bus) -> Self {
        Self {
            name: name.into(),
            service,
            hooks: LifecycleHooks::default(),
            grace: Config::default().grace,
            bus,
            status: Arc::new(Mutex::new(ServiceStatus::NotStarted)),
            stop: Mutex::new(None),
        }
    }

    /// Registers a hook; hooks of one phase run in registration order.
    pub fn with_hook<F, Fut>(mut self, phase: LifecyclePhase, f: F) -> Self
    where
        F: Fn(HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.hooks.push(phase, f);
        self
    }

    /// How long the stop sequence waits for the loop before detaching it.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> ServiceStatus {
        *self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn service(&self) -> &ServiceRef {
        &self.service
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    fn set_status(&self, to: ServiceStatus) {
        *self.status.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }

    async fn enter(&self, status: ServiceStatus, kind: EventKind, phase: LifecyclePhase) {
        self.set_status(status);
        tracing::debug!(service = %self.name, status = %status, "service status changed");
        self.bus.publish(Event::new(kind).with_name(Arc::clone(&self.name)));
        self.hooks
            .fire(HookContext {
                name: Arc::clone(&self.name),
                phase,
                status,
            })
            .await;
    }

    /// Runs the service until `cancel` fires, [`ServiceTask::stop`] is called,
    /// or the loop ends on its own.
    pub async fn start(&self, cancel: CancellationToken) -> Result<(), LifecycleError> {
        let stop = {
            let mut status = self.status.lock().unwrap_or_else(|e| e.into_inner());
            status.check_start(&self.name)?;
            if cancel.is_cancelled() {
                return Ok(());
            }
            *status = ServiceStatus::Starting;
            let stop = CancellationToken::new();
            *self.stop.lock().unwrap_or_else(|e| e.into_inner()) = Some(stop.clone());
            stop
        };
        self.enter(
            ServiceStatus::Starting,
            EventKind::ServiceStarting,
            LifecyclePhase::BeforeStart,
        )
        .await;

        let work = cancel.child_token();
        let ctx = ServiceContext::new(
            Arc::clone(&self.name),
            work.clone(),
            stop.clone(),
            self.bus.clone(),
            Arc::clone(&self.status),
        );
        if let Err(err) = self.service.prepare(&ctx).await {
            tracing::warn!(service = %self.name, error = %err, "service refused to start");
            *self.stop.lock().unwrap_or_else(|e| e.into_inner()) = None;
            self.enter(
                ServiceStatus::Stopped,
                EventKind::ServiceStopped,
                LifecyclePhase::Stopped,
            )
            .await;
            return Err(err);
        }

        let mut handle = tokio::spawn(work_loop(
            Arc::clone(&self.service),
            ctx,
            self.bus.clone(),
        ));

        self.enter(
            ServiceStatus::Running,
            EventKind::ServiceStarted,
            LifecyclePhase::Started,
        )
        .await;

        let mut finished = false;
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = stop.cancelled() => {}
            _ = &mut handle => finished = true,
        }

        self.enter(
            ServiceStatus::Stopping,
            EventKind::ServiceStopping,
            LifecyclePhase::BeforeStop,
        )
        .await;
        work.cancel();
        if !finished && tokio::time::timeout(self.grace, &mut handle).await.is_err() {
            tracing::warn!(
                service = %self.name,
                grace = ?self.grace,
                "work loop did not exit within grace, detaching it"
            );
        }

        *self.stop.lock().unwrap_or_else(|e| e.into_inner()) = None;
        self.enter(
            ServiceStatus::Stopped,
            EventKind::ServiceStopped,
            LifecyclePhase::Stopped,
        )
        .await;
        Ok(())
    }

    /// Requests the stop sequence of the running `start` call.
    ///
    /// Returns once the request is recorded; await `start` to observe `Stopped`.
    pub fn stop(&self) -> Result<(), LifecycleError> {
        {
            let mut status = self.status.lock().unwrap_or_else(|e| e.into_inner());
            status.check_stop(&self.name)?;
            *status = ServiceStatus::Stopping;
        }
        if let Some(stop) = self.stop.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
            stop.cancel();
        }
        Ok(())
    }
}

impl std::fmt::Debug for ServiceTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceTask")
            .field("name", &self.name)
            .field("status", &self.status())
            .field("grace", &self.grace)
            .finish_non_exhaustive()
    }
}

async fn work_loop(service: ServiceRef, ctx: ServiceContext, bus: Bus) {
    let name = ctx.name().to_string();
    let reason = match run_guarded(service.run(ctx)).await {
        Ok(Ok(())) => return,
        Ok(Err(err)) => err.to_string(),
        Err(panic) => format!("panicked: {panic}"),
    };

    let correlation = Uuid::new_v4();
    tracing::error!(
        service = %name,
        correlation_id = %correlation,
        error = %reason,
        "service work loop failed"
    );
    bus.publish(
        Event::new(EventKind::ServiceFailed)
            .with_name(name)
            .with_reason(reason)
            .with_correlation(correlation),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::service::work_loop::ServiceFn;

    fn until_cancelled() -> ServiceRef {
        ServiceFn::arc(|ctx: ServiceContext| async move {
            ctx.cancelled().await;
            Ok::<_, TaskError>(())
        })
    }

    async fn wait_for(task: &ServiceTask, status: ServiceStatus) {
        while task.status() != status {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn cancelled_token_is_a_no_op() {
        let task = ServiceTask::new("svc", until_cancelled(), Bus::new(8));
        let token = CancellationToken::new();
        token.cancel();

        assert_eq!(task.start(token).await, Ok(()));
        assert_eq!(task.status(), ServiceStatus::NotStarted);
    }

    #[tokio::test]
    async fn stop_runs_the_full_sequence() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let task = Arc::new(ServiceTask::new("svc", until_cancelled(), bus));

        let running = {
            let t = Arc::clone(&task);
            tokio::spawn(async move { t.start(CancellationToken::new()).await })
        };
        wait_for(&task, ServiceStatus::Running).await;

        task.stop().unwrap();
        assert_eq!(running.await.unwrap(), Ok(()));
        assert_eq!(task.status(), ServiceStatus::Stopped);

        let kinds: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::ServiceStarting,
                EventKind::ServiceStarted,
                EventKind::ServiceStopping,
                EventKind::ServiceStopped,
            ]
        );
    }

    struct Refusing;

    #[async_trait::async_trait]
    impl crate::service::work_loop::Service for Refusing {
        async fn prepare(&self, ctx: &ServiceContext) -> Result<(), LifecycleError> {
            Err(LifecycleError::PropagationPending {
                name: ctx.name().to_string(),
            })
        }

        async fn run(&self, _ctx: ServiceContext) -> Result<(), TaskError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn refused_start_still_reports_stopped() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let stopped_hook = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stopped_hook);
        let task = ServiceTask::new("svc", Arc::new(Refusing), bus).with_hook(
            LifecyclePhase::Stopped,
            move |_ctx: HookContext| {
                let flag = Arc::clone(&flag);
                async move { flag.store(true, Ordering::SeqCst) }
            },
        );

        let err = task.start(CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.as_label(), "lifecycle_propagation_pending");
        assert_eq!(task.status(), ServiceStatus::Stopped);
        assert!(stopped_hook.load(Ordering::SeqCst));

        let kinds: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![EventKind::ServiceStarting, EventKind::ServiceStopped]
        );
    }

    #[tokio::test]
    async fn failing_loop_is_reported_not_returned() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let svc: ServiceRef = ServiceFn::arc(|_ctx: ServiceContext| async move {
            Err::<(), _>(TaskError::fail("disk gone"))
        });
        let task = ServiceTask::new("svc", svc, bus);

        assert_eq!(task.start(CancellationToken::new()).await, Ok(()));
        assert_eq!(task.status(), ServiceStatus::Stopped);

        let failed = std::iter::from_fn(|| rx.try_recv().ok())
            .find(|e| e.kind == EventKind::ServiceFailed)
            .unwrap();
        assert!(failed.correlation.is_some());
        assert!(failed.reason.as_deref().unwrap().contains("disk gone"));
    }

    #[tokio::test]
    async fn panicking_loop_is_contained() {
        let svc: ServiceRef = ServiceFn::arc(|_ctx: ServiceContext| async move {
            if true {
                panic!("boom");
            }
            Ok::<_, TaskError>(())
        });
        let task = ServiceTask::new("svc", svc, Bus::new(8));
        assert_eq!(task.start(CancellationToken::new()).await, Ok(()));
        assert_eq!(task.status(), ServiceStatus::Stopped);
    }

    #[tokio::test]
    async fn complete_ends_the_run() {
        let svc: ServiceRef = ServiceFn::arc(|ctx: ServiceContext| async move {
            ctx.complete();
            ctx.cancelled().await;
            Ok::<_, TaskError>(())
        });
        let task = ServiceTask::new("svc", svc, Bus::new(8));
        assert_eq!(task.start(CancellationToken::new()).await, Ok(()));
        assert_eq!(task.status(), ServiceStatus::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_loop_is_detached_after_grace() {
        let svc: ServiceRef = ServiceFn::arc(|_ctx: ServiceContext| async move {
            std::future::pending::<()>().await;
            Ok::<_, TaskError>(())
        });
        let task = ServiceTask::new("svc", svc, Bus::new(8)).with_grace(Duration::from_secs(2));
        let token = CancellationToken::new();

        let started = tokio::time::Instant::now();
        let stopper = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            stopper.cancel();
        });
        assert_eq!(task.start(token).await, Ok(()));
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert_eq!(task.status(), ServiceStatus::Stopped);
    }

    #[tokio::test]
    async fn restart_after_stop_is_allowed() {
        let task = Arc::new(ServiceTask::new("svc", until_cancelled(), Bus::new(8)));
        for _ in 0..2 {
            let token = CancellationToken::new();
            let running = {
                let t = Arc::clone(&task);
                let tok = token.clone();
                tokio::spawn(async move { t.start(tok).await })
            };
            wait_for(&task, ServiceStatus::Running).await;
            token.cancel();
            assert_eq!(running.await.unwrap(), Ok(()));
        }
        assert_eq!(task.status(), ServiceStatus::Stopped);
    }
}

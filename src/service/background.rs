//! # Background service: prioritized intake with idle-time production.
//!
//! ```text
//! loop: disabled → Idle, wait idle_time
//!       sources.next(idle_time, token)
//!   ├─ Item      → Running, throttle, handler.consume(item)
//!   ├─ Timeout   → handler.produce(); nothing produced → Idle
//!   │                                 else throttle + consume each item
//!   └─ Cancelled → return (queued items were handed out before this)
//! ```
//!
//! ## Rules
//! - Lower priority numbers are served first; see [`PrioritySources`].
//! - Consecutive consumes are spaced at least `propagation_delay` apart,
//!   except after cancellation, when the remaining items are consumed back to back.
//! - A failing or panicking consume is logged; the loop keeps going.
//! - While disabled nothing is produced or consumed; pushed items stay queued.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::ServiceSettings;
use crate::core::run_guarded;
use crate::error::TaskError;
use crate::service::context::ServiceContext;
use crate::service::work_loop::Service;
use crate::sync::{PrioritySources, SourceId, Throttle, Wake};

/// Callbacks of a [`BackgroundService`].
#[async_trait]
pub trait BackgroundHandler<T: Send + 'static>: Send + Sync + 'static {
    /// Regular production, called when no queue yielded an item within the idle time.
    async fn produce(&self, _token: &CancellationToken) -> Vec<T> {
        Vec::new()
    }

    async fn consume(&self, item: T) -> Result<(), TaskError>;
}

pub struct BackgroundService<T> {
    sources: Arc<PrioritySources<T>>,
    handler: Arc<dyn BackgroundHandler<T>>,
    idle: Duration,
    delay: Duration,
    enabled: AtomicBool,
}

impl<T: Send + 'static> BackgroundService<T> {
    pub fn new(handler: Arc<dyn BackgroundHandler<T>>, idle: Duration) -> Self {
        Self {
            sources: Arc::new(PrioritySources::new()),
            handler,
            idle,
            delay: Duration::ZERO,
            enabled: AtomicBool::new(true),
        }
    }

    /// Takes `idle_time`, `propagation_delay` and `enabled` from the settings record.
    pub fn from_settings(handler: Arc<dyn BackgroundHandler<T>>, settings: &ServiceSettings) -> Self {
        let svc = Self::new(handler, settings.idle_time()).with_delay(settings.propagation_delay());
        svc.set_enabled(settings.enabled);
        svc
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Takes effect at the next wake-up.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Adds a queue; lower numbers are served first.
    pub fn register_source(&self, priority: u32) -> SourceId {
        self.sources.register(priority)
    }

    /// Queues `item` on `source`; `false` if the source is unknown.
    pub fn push(&self, source: SourceId, item: T) -> bool {
        self.sources.push(source, item)
    }

    pub fn sources(&self) -> &Arc<PrioritySources<T>> {
        &self.sources
    }

    async fn consume(&self, ctx: &ServiceContext, throttle: &mut Throttle, item: T) {
        throttle.ready(ctx.token()).await;
        match run_guarded(self.handler.consume(item)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(service = %ctx.name(), error = %err, "background item failed")
            }
            Err(panic) => {
                tracing::error!(service = %ctx.name(), panic = %panic, "background consumer panicked")
            }
        }
    }
}

#[async_trait]
impl<T: Send + 'static> Service for BackgroundService<T> {
    async fn run(&self, ctx: ServiceContext) -> Result<(), TaskError> {
        let mut throttle = Throttle::new(self.delay);
        loop {
            if !self.is_enabled() {
                ctx.set_idle();
                tokio::select! {
                    _ = ctx.cancelled() => break,
                    _ = tokio::time::sleep(self.idle) => continue,
                }
            }
            match self.sources.next(self.idle, ctx.token()).await {
                Wake::Item { item, .. } => {
                    ctx.set_running();
                    self.consume(&ctx, &mut throttle, item).await;
                }
                Wake::Timeout => {
                    let produced = run_guarded(self.handler.produce(ctx.token()))
                        .await
                        .unwrap_or_else(|panic| {
                            tracing::error!(service = %ctx.name(), panic = %panic, "background producer panicked");
                            Vec::new()
                        });
                    if produced.is_empty() {
                        ctx.set_idle();
                        continue;
                    }
                    ctx.set_running();
                    for item in produced {
                        self.consume(&ctx, &mut throttle, item).await;
                    }
                }
                Wake::Cancelled => break,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::events::Bus;
    use crate::service::status::ServiceStatus;
    use crate::service::task::ServiceTask;

    #[derive(Default)]
    struct Recorder {
        consumed: Mutex<Vec<&'static str>>,
        produce: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl BackgroundHandler<&'static str> for Recorder {
        async fn produce(&self, _token: &CancellationToken) -> Vec<&'static str> {
            std::mem::take(&mut *self.produce.lock().unwrap())
        }

        async fn consume(&self, item: &'static str) -> Result<(), TaskError> {
            self.consumed.lock().unwrap().push(item);
            if item == "bad" {
                return Err(TaskError::fail("bad item"));
            }
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn urgent_queue_is_served_first_and_production_fills_idle_time() {
        let handler = Arc::new(Recorder::default());
        handler.produce.lock().unwrap().push("regular");

        let svc = Arc::new(BackgroundService::<&'static str>::new(
            Arc::clone(&handler) as _,
            Duration::from_millis(100),
        ));
        let low = svc.register_source(10);
        let urgent = svc.register_source(1);
        svc.push(low, "low");
        svc.push(low, "bad");
        svc.push(urgent, "urgent");

        let task = Arc::new(ServiceTask::new("bg", Arc::clone(&svc) as _, Bus::new(16)));
        let token = CancellationToken::new();
        let running = {
            let t = Arc::clone(&task);
            let tok = token.clone();
            tokio::spawn(async move { t.start(tok).await })
        };

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(task.status(), ServiceStatus::Idle);
        assert_eq!(
            *handler.consumed.lock().unwrap(),
            vec!["urgent", "low", "bad", "regular"]
        );

        token.cancel();
        running.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn queued_items_are_consumed_on_cancel() {
        let handler = Arc::new(Recorder::default());
        let svc = Arc::new(
            BackgroundService::<&'static str>::new(Arc::clone(&handler) as _, Duration::from_secs(60))
                .with_delay(Duration::from_secs(60)),
        );
        let src = svc.register_source(0);
        let task = ServiceTask::new("bg", Arc::clone(&svc) as _, Bus::new(16));

        let token = CancellationToken::new();
        for item in ["a", "b", "c"] {
            svc.push(src, item);
        }
        let stopper = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            stopper.cancel();
        });
        task.start(token).await.unwrap();

        assert_eq!(*handler.consumed.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_service_leaves_items_queued() {
        let handler = Arc::new(Recorder::default());
        handler.produce.lock().unwrap().push("regular");
        let settings = ServiceSettings {
            enabled: false,
            idle_time_ms: 100,
            propagation_delay_ms: 0,
            ..ServiceSettings::default()
        };
        let svc = Arc::new(BackgroundService::<&'static str>::from_settings(
            Arc::clone(&handler) as _,
            &settings,
        ));
        let src = svc.register_source(0);
        svc.push(src, "queued");

        let task = Arc::new(ServiceTask::new("bg", Arc::clone(&svc) as _, Bus::new(16)));
        let token = CancellationToken::new();
        let running = {
            let t = Arc::clone(&task);
            let tok = token.clone();
            tokio::spawn(async move { t.start(tok).await })
        };

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(task.status(), ServiceStatus::Idle);
        assert!(handler.consumed.lock().unwrap().is_empty());

        svc.set_enabled(true);
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(*handler.consumed.lock().unwrap(), vec!["queued", "regular"]);

        token.cancel();
        running.await.unwrap().unwrap();
    }
}

//! # Lifecycle hooks.
//!
//! Hooks are async callbacks registered per [`LifecyclePhase`]. When a phase
//! is reached, its hooks are awaited one after another in registration order;
//! the state machine moves on only after the last one finished. A panicking
//! hook is logged and skipped.

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::core::run_guarded;
use crate::service::status::ServiceStatus;

/// Point of the lifecycle at which a hook fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    BeforeStart,
    Started,
    BeforeStop,
    Stopped,
}

impl LifecyclePhase {
    pub fn as_label(&self) -> &'static str {
        match self {
            LifecyclePhase::BeforeStart => "before_start",
            LifecyclePhase::Started => "started",
            LifecyclePhase::BeforeStop => "before_stop",
            LifecyclePhase::Stopped => "stopped",
        }
    }
}

/// What a hook is told about the service.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub name: Arc<str>,
    pub phase: LifecyclePhase,
    pub status: ServiceStatus,
}

/// Type-erased lifecycle hook.
pub type LifecycleHook = Arc<dyn Fn(HookContext) -> BoxFuture<'static, ()> + Send + Sync>;

/// Ordered list of `(phase, hook)` registrations.
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    hooks: Vec<(LifecyclePhase, LifecycleHook)>,
}

impl LifecycleHooks {
    pub fn push<F, Fut>(&mut self, phase: LifecyclePhase, f: F)
    where
        F: Fn(HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.hooks.push((phase, Arc::new(move |ctx| f(ctx).boxed())));
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Awaits every hook registered for `ctx.phase`, in order.
    pub(crate) async fn fire(&self, ctx: HookContext) {
        for (phase, hook) in &self.hooks {
            if *phase != ctx.phase {
                continue;
            }
            if let Err(panic) = run_guarded(hook(ctx.clone())).await {
                tracing::error!(
                    service = %ctx.name,
                    phase = ctx.phase.as_label(),
                    panic = %panic,
                    "lifecycle hook panicked"
                );
            }
        }
    }
}

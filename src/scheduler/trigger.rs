//! # Task trigger: one firing of one occurrence.
//!
//! ```text
//! run(token)
//!   ├─► wait until scheduled_for                 (cancel → ABORTED)
//!   ├─► gate: !forced && !work.can_execute()      → VALIDATION_FAILED (work not run)
//!   ├─► before_execution hooks (in order)
//!   ├─► started_on = now
//!   ├─► work.run(ctx, token)                      (Err / panic → ABORTED)
//!   ├─► finished_on = now
//!   └─► execution_completed hooks (in order)
//! ```
//!
//! Every outcome is published on the bus: `JobStarting` before the work,
//! then `JobCompleted`, `JobAborted` or `JobSkipped`.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::core::{panic_message, run_guarded};
use crate::events::{Bus, Event, EventKind};
use crate::scheduler::context::JobExecutionContext;
use crate::scheduler::job::Job;
use crate::scheduler::occurrence::Occurrence;
use crate::scheduler::result::TaskResult;
use crate::scheduler::work::WorkRef;

/// Callback invoked around a firing.
pub type TriggerHook = Arc<dyn Fn(&JobExecutionContext) + Send + Sync>;

/// Ordered `before_execution` / `execution_completed` callbacks.
#[derive(Clone, Default)]
pub struct TriggerHooks {
    before: Vec<TriggerHook>,
    after: Vec<TriggerHook>,
}

impl TriggerHooks {
    pub fn before_execution<F>(&mut self, f: F)
    where
        F: Fn(&JobExecutionContext) + Send + Sync + 'static,
    {
        self.before.push(Arc::new(f));
    }

    pub fn execution_completed<F>(&mut self, f: F)
    where
        F: Fn(&JobExecutionContext) + Send + Sync + 'static,
    {
        self.after.push(Arc::new(f));
    }
}

/// Runs a job's work once for one occurrence.
pub struct TaskTrigger {
    context: JobExecutionContext,
    work: WorkRef,
    hooks: TriggerHooks,
    bus: Bus,
}

impl TaskTrigger {
    pub fn new(job: &Job, occurrence: &Occurrence, bus: Bus) -> Self {
        let schedule_name = occurrence
            .schedules()
            .first()
            .map_or_else(|| job.name().to_string(), |s| s.name().to_string());

        Self {
            context: JobExecutionContext {
                job_id: job.id(),
                job_name: job.name().to_string(),
                schedule_name,
                job_type: job.job_type(),
                scheduled_for: occurrence.start_time(),
                last_executed_on: job.last_execution(),
                started_on: None,
                finished_on: None,
                forced: job.is_forced(),
                result: TaskResult::NOT_EXECUTED,
                params: job.params().clone(),
            },
            work: Arc::clone(occurrence.work()),
            hooks: job.hooks().clone(),
            bus,
        }
    }

    pub fn context(&self) -> &JobExecutionContext {
        &self.context
    }

    /// Waits for the occurrence and runs the work; the outcome is also stored
    /// in the context.
    pub async fn run(&mut self, token: &CancellationToken) -> TaskResult {
        let result = self.execute(token).await;
        self.context.result = result;
        result
    }

    async fn execute(&mut self, token: &CancellationToken) -> TaskResult {
        let delay = (self.context.scheduled_for - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);

        if !delay.is_zero() {
            tokio::select! {
                _ = token.cancelled() => return self.aborted("cancelled while waiting"),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        if token.is_cancelled() {
            return self.aborted("cancelled before execution");
        }

        if !self.context.forced && !self.work.can_execute() {
            self.publish(
                Event::new(EventKind::JobSkipped).with_result(TaskResult::VALIDATION_FAILED),
            );
            return TaskResult::VALIDATION_FAILED;
        }

        self.publish(Event::new(EventKind::JobStarting).with_delay(delay));
        if let Err(msg) = call_hooks(&self.hooks.before, &self.context) {
            return self.aborted(format!("before_execution hook panicked: {msg}"));
        }

        self.context.started_on = Some(Utc::now());
        let outcome = run_guarded(self.work.run(&self.context, token.clone())).await;
        self.context.finished_on = Some(Utc::now());

        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                tracing::warn!(
                    job = %self.context.job_name,
                    error = %err,
                    label = err.as_label(),
                    "job execution failed"
                );
                self.context.result = TaskResult::ABORTED;
                return self.finish_aborted(err.to_string());
            }
            Err(panic) => {
                tracing::error!(job = %self.context.job_name, panic = %panic, "job panicked");
                self.context.result = TaskResult::ABORTED;
                return self.finish_aborted(format!("panic: {panic}"));
            }
        };

        self.context.result = result;
        if let Err(msg) = call_hooks(&self.hooks.after, &self.context) {
            return self.aborted(format!("execution_completed hook panicked: {msg}"));
        }
        self.publish(Event::new(EventKind::JobCompleted).with_result(result));
        result
    }

    /// Aborted after the work ran: completion hooks still observe the firing.
    fn finish_aborted(&self, reason: String) -> TaskResult {
        if let Err(msg) = call_hooks(&self.hooks.after, &self.context) {
            tracing::warn!(job = %self.context.job_name, panic = %msg, "execution_completed hook panicked");
        }
        self.aborted(reason)
    }

    fn aborted(&self, reason: impl Into<Arc<str>>) -> TaskResult {
        self.publish(
            Event::new(EventKind::JobAborted)
                .with_result(TaskResult::ABORTED)
                .with_reason(reason),
        );
        TaskResult::ABORTED
    }

    fn publish(&self, ev: Event) {
        self.bus.publish(ev.with_name(self.context.job_name.as_str()));
    }
}

fn call_hooks(hooks: &[TriggerHook], ctx: &JobExecutionContext) -> Result<(), String> {
    for hook in hooks {
        std::panic::catch_unwind(AssertUnwindSafe(|| hook(ctx)))
            .map_err(|payload| panic_message(payload.as_ref()))?;
    }
    Ok(())
}

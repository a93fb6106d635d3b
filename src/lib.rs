//! # taskloom
//!
//! **taskloom** is an in-process task orchestration library for tokio
//! applications. It bundles three building blocks:
//!
//! - supervised, restartable **service tasks** with lifecycle hooks;
//! - **load-balanced worker pools** (round robin, least loaded, key grouping);
//! - a **cron job scheduler** with mergeable job definitions.
//!
//! ## Architecture
//! ```text
//!            ServiceSettings ──► ServiceRegistry::build ──► ServiceTask ─┐
//!                                                                         ▼
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │ ServiceHost                                                               │
//! │  - one cancellation scope (child token per ServiceTask)                   │
//! │  - OS signals → ShutdownRequested → cancel → grace                        │
//! └──────┬──────────────────────┬─────────────────────┬─────────────────┬─────┘
//!        ▼                      ▼                     ▼                 ▼
//!  PeriodicService       BalancedService       ScheduledService   BackgroundService
//!  (action, idle)        intake → throttle     JobScheduler       PrioritySources
//!                        → LoadBalancingBroker  └─ Job chains      → throttle → consume
//!                           └─ Worker × N           └─ TaskTrigger
//!        │                      │                     │                 │
//!        └──────────── publish(Event) ───► Bus ◄──────┴─────────────────┘
//!                                           │
//!                                     SubscriberSet ──► LogWriter / custom
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types                                        |
//! |-------------------|--------------------------------------------------------------|--------------------------------------------------|
//! | **Services**      | Lifecycle state machine, hooks, service flavours.            | [`ServiceTask`], [`Service`], [`ServiceRegistry`] |
//! | **Balancing**     | Bounded workers and selection strategies.                    | [`Worker`], [`Strategy`], [`LoadBalancingBroker`] |
//! | **Scheduling**    | Cron schedules, jobs, triggers, the scheduler.               | [`Schedule`], [`Job`], [`JobScheduler`]          |
//! | **Events**        | Broadcast runtime events and subscriber fan-out.             | [`Bus`], [`Event`], [`Subscribe`]                |
//! | **Errors**        | One typed error per concern.                                 | [`LifecycleError`], [`DispatchError`], ...       |
//! | **Configuration** | Runtime knobs and per-service settings.                      | [`Config`], [`ServiceSettings`]                  |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use taskloom::{
//!     Config, Job, JobExecutionContext, JobFn, JobProviderFn, JobScheduler, LogWriter,
//!     ScheduledService, ServiceHost, ServiceTask, Subscribe, TaskError, TaskResult,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::default())];
//!     let host = ServiceHost::new(Config::default(), subs);
//!
//!     let scheduler = Arc::new(JobScheduler::new("main", host.bus().clone()));
//!     let provider = JobProviderFn::arc(|| async {
//!         let work = JobFn::arc(
//!             "report",
//!             |_ctx: JobExecutionContext, _token: CancellationToken| async {
//!                 Ok::<_, TaskError>(TaskResult::SUCCESS)
//!             },
//!         );
//!         let job = Job::builder("nightly-report", work)
//!             .cron("0 2 * * *")
//!             .map_err(|e| TaskError::fail(e.to_string()))?
//!             .build();
//!         Ok::<_, TaskError>(vec![job])
//!     });
//!     let svc = ScheduledService::new(scheduler, provider);
//!     let task = Arc::new(ServiceTask::new("jobs", Arc::new(svc), host.bus().clone()));
//!
//!     host.run_until(vec![task], tokio::time::sleep(Duration::from_millis(50)))
//!         .await?;
//!     Ok(())
//! }
//! ```

mod actions;
mod balance;
mod config;
mod core;
mod error;
mod events;
mod policies;
mod scheduler;
mod service;
mod subscribers;
mod sync;

// ---- Public re-exports ----

pub use actions::{Action, ActionFn, ActionRef};
pub use balance::{
    BrokerBuilder, KeyGrouping, LeastLoaded, LoadBalancer, LoadBalancingBroker, Process,
    ProcessFn, ProcessorRef, RoundRobin, Strategy, StrategyKind, Worker, WorkerStats,
    WorkerStatsSnapshot,
};
pub use config::{Config, ServiceSettings};
pub use core::{ServiceHost, wait_for_shutdown_signal};
pub use error::{
    DispatchError, LifecycleError, MergeError, RegistryError, RuntimeError, ScheduleError,
    SchedulerError, TaskError,
};
pub use events::{Bus, Event, EventKind, Severity};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use scheduler::{
    Job, JobBuilder, JobExecutionContext, JobFn, JobId, JobPriority, JobScheduler, JobType,
    JobWork, Occurrence, Schedule, TaskResult, TaskTrigger, TriggerHook, TriggerHooks, WorkRef,
};
pub use service::{
    BackgroundHandler, BackgroundService, BalancedService, HookContext, JobProvider,
    JobProviderFn, LifecycleHook, LifecycleHooks, LifecyclePhase, PeriodicService,
    ScheduledService, Service, ServiceContext, ServiceFn, ServiceRef, ServiceRegistry,
    ServiceStatus, ServiceTask,
};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use sync::{PrioritySources, SourceId, Throttle, Wake};

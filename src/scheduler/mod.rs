//! Cron-driven job scheduling.
//!
//! ## Contents
//! - [`Schedule`] validated cron expression with next-time computation
//! - [`Job`] named work plus schedules; built with [`JobBuilder`]
//! - [`Occurrence`] one computed firing
//! - [`TaskTrigger`] waits for an occurrence and runs the work once
//! - [`JobScheduler`] job registry that keeps every job armed
//!
//! ## Ownership
//! ```text
//! JobScheduler ──owns──► Arc<Job> ──spawns──► re-arm chain ──builds──► TaskTrigger
//!                                                                       └─ JobExecutionContext { job_id, .. }
//! Occurrence / JobExecutionContext refer to their job by JobId only.
//! ```

mod builder;
mod context;
mod field;
mod job;
mod job_scheduler;
mod occurrence;
mod result;
mod schedule;
mod trigger;
mod work;

pub use builder::JobBuilder;
pub use context::JobExecutionContext;
pub use job::{Job, JobId, JobPriority, JobType};
pub use job_scheduler::JobScheduler;
pub use occurrence::Occurrence;
pub use result::TaskResult;
pub use schedule::Schedule;
pub use trigger::{TaskTrigger, TriggerHook, TriggerHooks};
pub use work::{JobFn, JobWork, WorkRef};

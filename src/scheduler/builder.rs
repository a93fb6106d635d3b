//! # Job builder.
//!
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use taskloom::{Job, JobExecutionContext, JobFn, JobPriority, TaskError, TaskResult, WorkRef};
//!
//! # fn main() -> Result<(), taskloom::ScheduleError> {
//! let work: WorkRef = JobFn::arc(
//!     "cleanup",
//!     |_ctx: JobExecutionContext, _token: CancellationToken| async {
//!         Ok::<_, TaskError>(TaskResult::SUCCESS)
//!     },
//! );
//!
//! let job = Job::builder("cleanup", work)
//!     .description("drop expired sessions")
//!     .cron("0 3 * * *")?
//!     .priority(JobPriority::Low)
//!     .param("table", "sessions")
//!     .build();
//!
//! assert_eq!(job.schedules().len(), 1);
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::error::ScheduleError;
use crate::scheduler::context::JobExecutionContext;
use crate::scheduler::job::{Job, JobId, JobPriority, JobState};
use crate::scheduler::schedule::Schedule;
use crate::scheduler::trigger::TriggerHooks;
use crate::scheduler::work::WorkRef;

/// Builder for [`Job`].
pub struct JobBuilder {
    name: String,
    work: WorkRef,
    description: Option<String>,
    priority: JobPriority,
    enabled: bool,
    forced: bool,
    schedules: Vec<Schedule>,
    params: HashMap<String, String>,
    hooks: TriggerHooks,
    last_execution: Option<DateTime<Utc>>,
}

impl JobBuilder {
    pub(crate) fn new(name: impl Into<String>, work: WorkRef) -> Self {
        Self {
            name: name.into(),
            work,
            description: None,
            priority: JobPriority::default(),
            enabled: true,
            forced: false,
            schedules: Vec::new(),
            params: HashMap::new(),
            hooks: TriggerHooks::default(),
            last_execution: None,
        }
    }

    /// Adds a schedule parsed from a cron expression.
    pub fn cron(self, expression: &str) -> Result<Self, ScheduleError> {
        Ok(self.schedule(Schedule::parse(expression)?))
    }

    /// Adds a schedule; duplicates (by value) are ignored.
    pub fn schedule(mut self, schedule: Schedule) -> Self {
        if !self.schedules.contains(&schedule) {
            self.schedules.push(schedule);
        }
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Disabled jobs are kept by the scheduler but never started.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Forced jobs skip the work's validation gate.
    pub fn forced(mut self, forced: bool) -> Self {
        self.forced = forced;
        self
    }

    /// Seeds the last execution, used as the reference for the first occurrence.
    pub fn last_execution(mut self, at: DateTime<Utc>) -> Self {
        self.last_execution = Some(at);
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn before_execution<F>(mut self, f: F) -> Self
    where
        F: Fn(&JobExecutionContext) + Send + Sync + 'static,
    {
        self.hooks.before_execution(f);
        self
    }

    pub fn execution_completed<F>(mut self, f: F) -> Self
    where
        F: Fn(&JobExecutionContext) + Send + Sync + 'static,
    {
        self.hooks.execution_completed(f);
        self
    }

    pub fn build(self) -> Job {
        Job {
            id: JobId::new(),
            name: self.name,
            description: self.description,
            priority: self.priority,
            enabled: self.enabled,
            forced: self.forced,
            schedules: self.schedules,
            work: self.work,
            params: self.params,
            hooks: self.hooks,
            state: Mutex::new(JobState::seeded(self.last_execution)),
        }
    }
}

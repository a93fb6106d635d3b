//! Per-firing execution metadata.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::scheduler::job::{JobId, JobType};
use crate::scheduler::result::TaskResult;

/// Metadata of one firing, built by the trigger and handed to the work and hooks.
///
/// Holds the job's [`JobId`] rather than the job itself; look the job up
/// through [`JobScheduler::job`](crate::JobScheduler::job) when needed.
#[derive(Debug, Clone)]
pub struct JobExecutionContext {
    pub job_id: JobId,
    pub job_name: String,
    /// Name of the first schedule that produced the occurrence, or the job
    /// name for on-demand firings.
    pub schedule_name: String,
    pub job_type: JobType,
    pub scheduled_for: DateTime<Utc>,
    pub last_executed_on: Option<DateTime<Utc>>,
    pub started_on: Option<DateTime<Utc>>,
    pub finished_on: Option<DateTime<Utc>>,
    pub forced: bool,
    pub result: TaskResult,
    pub params: HashMap<String, String>,
}

impl JobExecutionContext {
    /// True once the work function was actually invoked.
    pub fn was_executed(&self) -> bool {
        self.started_on.is_some()
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

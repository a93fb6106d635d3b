//! One computed firing of a job.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::scheduler::job::JobId;
use crate::scheduler::schedule::Schedule;
use crate::scheduler::work::WorkRef;

/// `(job id, contributing schedules, start time)`.
///
/// Two occurrences are equal when they start at the same instant **and**
/// belong to the same work definition; the job name is not compared.
#[derive(Clone)]
pub struct Occurrence {
    job: JobId,
    schedules: Vec<Schedule>,
    start: DateTime<Utc>,
    work: WorkRef,
}

impl Occurrence {
    pub(crate) fn new(
        job: JobId,
        schedules: Vec<Schedule>,
        start: DateTime<Utc>,
        work: WorkRef,
    ) -> Self {
        Self {
            job,
            schedules,
            start,
            work,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job
    }

    /// Schedules that fire at this instant; empty for on-demand jobs.
    pub fn schedules(&self) -> &[Schedule] {
        &self.schedules
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start
    }

    pub(crate) fn work(&self) -> &WorkRef {
        &self.work
    }
}

impl PartialEq for Occurrence {
    fn eq(&self, other: &Self) -> bool {
        self.start == other.start
            && std::ptr::addr_eq(Arc::as_ptr(&self.work), Arc::as_ptr(&other.work))
    }
}

impl Eq for Occurrence {}

impl fmt::Debug for Occurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Occurrence")
            .field("job", &self.job)
            .field("schedules", &self.schedules)
            .field("start", &self.start)
            .field("work", &self.work.kind())
            .finish()
    }
}

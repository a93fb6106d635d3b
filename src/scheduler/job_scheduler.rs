//! # Job scheduler: a named registry of jobs kept armed while running.
//!
//! ```text
//! load_job(job)
//!   ├─ name unknown ─► add; start it if the scheduler runs        → JobLoaded
//!   └─ name known   ─► existing.merge_with(job)
//!                        ├─ Ok(merged) ─► cancel old chain, swap, start merged → JobMerged
//!                        │                 (merged chain awaits the old one first)
//!                        └─ Err        ─► keep existing, return the error   → JobMergeRejected
//!
//! start(token)
//!   ├─► run token = token.child_token()      (AlreadyStarted if one is active)
//!   ├─► job.start(run token) for every job
//!   ├─► every `poll`: reap chains that ended
//!   └─► on cancel: cancel every chain and await it, then clear the run token
//! ```
//!
//! ## Rules
//! - The job name is the identity key for add-vs-replace decisions.
//! - Each job runs under its own child scope: stopping one job leaves the others armed.
//! - `start` returns only after every chain has recorded its last result.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::SchedulerError;
use crate::events::{Bus, Event, EventKind};
use crate::scheduler::job::Job;
use crate::scheduler::occurrence::Occurrence;

/// Named collection of jobs.
pub struct JobScheduler {
    name: Arc<str>,
    jobs: RwLock<Vec<Arc<Job>>>,
    run: Mutex<Option<CancellationToken>>,
    poll: Duration,
    bus: Bus,
}

impl JobScheduler {
    pub fn new(name: impl Into<Arc<str>>, bus: Bus) -> Self {
        Self {
            name: name.into(),
            jobs: RwLock::new(Vec::new()),
            run: Mutex::new(None),
            poll: Config::default().scheduler_poll,
            bus,
        }
    }

    /// Interval between reaps of finished chains.
    pub fn with_poll(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_started(&self) -> bool {
        self.run_token().is_some()
    }

    fn run_token(&self) -> Option<CancellationToken> {
        self.run.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Snapshot of the loaded jobs, in load order.
    pub fn jobs(&self) -> Vec<Arc<Job>> {
        self.jobs.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn job(&self, name: &str) -> Option<Arc<Job>> {
        self.jobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|j| j.name() == name)
            .cloned()
    }

    /// Adds `job`, or merges it into the loaded job of the same name.
    ///
    /// An incompatible redefinition leaves the loaded job untouched and armed.
    pub fn load_job(&self, job: Job) -> Result<Arc<Job>, SchedulerError> {
        let run = self.run_token();
        let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());

        let Some(idx) = jobs.iter().position(|j| j.name() == job.name()) else {
            let job = Arc::new(job);
            if let Some(run) = &run {
                job.start(run, &self.bus);
            }
            jobs.push(Arc::clone(&job));
            tracing::debug!(scheduler = %self.name, job = %job.name(), "job loaded");
            self.bus
                .publish(Event::new(EventKind::JobLoaded).with_name(job.name()));
            return Ok(job);
        };

        let merged = match jobs[idx].merge_with(&job) {
            Ok(merged) => Arc::new(merged),
            Err(err) => {
                tracing::warn!(
                    scheduler = %self.name,
                    job = %job.name(),
                    error = %err,
                    "reload rejected, keeping the loaded job"
                );
                self.bus.publish(
                    Event::new(EventKind::JobMergeRejected)
                        .with_name(job.name())
                        .with_reason(err.to_string()),
                );
                return Err(err.into());
            }
        };

        let replaced = std::mem::replace(&mut jobs[idx], Arc::clone(&merged));
        let previous = replaced.cancel_run().map(|handle| (Arc::clone(&replaced), handle));
        match &run {
            Some(run) => {
                merged.start_after(run, &self.bus, previous);
            }
            None => drop(previous),
        }
        tracing::debug!(scheduler = %self.name, job = %merged.name(), "job merged");
        self.bus
            .publish(Event::new(EventKind::JobMerged).with_name(merged.name()));
        Ok(merged)
    }

    /// Loads every job; returns the first failure after trying them all.
    pub fn load_jobs(&self, jobs: impl IntoIterator<Item = Job>) -> Result<(), SchedulerError> {
        let mut first_err = None;
        for job in jobs {
            if let Err(err) = self.load_job(job) {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Stops and removes the job named `name`.
    pub fn remove_job(&self, name: &str) -> Option<Arc<Job>> {
        let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());
        let idx = jobs.iter().position(|j| j.name() == name)?;
        let job = jobs.remove(idx);
        job.stop();
        Some(job)
    }

    /// Arms every job and keeps them armed until `token` is cancelled or
    /// [`JobScheduler::stop`] is called.
    pub async fn start(&self, token: CancellationToken) -> Result<(), SchedulerError> {
        let run = {
            let mut slot = self.run.lock().unwrap_or_else(|e| e.into_inner());
            if slot.is_some() {
                return Err(SchedulerError::AlreadyStarted {
                    name: self.name.to_string(),
                });
            }
            let run = token.child_token();
            *slot = Some(run.clone());
            run
        };

        for job in self.jobs() {
            job.start(&run, &self.bus);
        }
        tracing::debug!(scheduler = %self.name, jobs = self.jobs().len(), "scheduler started");

        loop {
            tokio::select! {
                _ = run.cancelled() => break,
                _ = tokio::time::sleep(self.poll) => {}
            }
            for job in self.jobs() {
                job.reap();
            }
        }

        let handles: Vec<_> = self.jobs().iter().filter_map(|j| j.cancel_run()).collect();
        for handle in handles {
            if let Err(err) = handle.await {
                tracing::error!(scheduler = %self.name, error = %err, "job chain failed to join");
            }
        }
        *self.run.lock().unwrap_or_else(|e| e.into_inner()) = None;
        tracing::debug!(scheduler = %self.name, "scheduler stopped");
        Ok(())
    }

    /// Cancels every job; the running `start` call drains and returns.
    pub fn stop(&self) {
        if let Some(run) = self.run_token() {
            run.cancel();
        }
    }

    /// Next occurrence of every job, earliest first.
    pub fn next_occurrences(&self) -> Vec<Occurrence> {
        let mut out: Vec<Occurrence> = self
            .jobs()
            .iter()
            .filter_map(|j| j.next_occurrence(None))
            .collect();
        out.sort_by_key(Occurrence::start_time);
        out
    }

    /// Up to `n` upcoming occurrences per job, earliest first.
    pub fn next_n_occurrences(&self, n: usize) -> Vec<Occurrence> {
        let mut out: Vec<Occurrence> = self
            .jobs()
            .iter()
            .flat_map(|j| j.next_occurrences(n))
            .collect();
        out.sort_by_key(Occurrence::start_time);
        out
    }

    /// Every occurrence of every job in `[start, end]`, earliest first.
    pub fn occurrences_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Occurrence> {
        let mut out: Vec<Occurrence> = self
            .jobs()
            .iter()
            .flat_map(|j| j.occurrences_between(start, end))
            .collect();
        out.sort_by_key(Occurrence::start_time);
        out
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::error::{MergeError, TaskError};
    use crate::scheduler::context::JobExecutionContext;
    use crate::scheduler::result::TaskResult;
    use crate::scheduler::work::{JobFn, WorkRef};

    fn work(kind: &'static str) -> WorkRef {
        JobFn::arc(
            kind,
            |_ctx: JobExecutionContext, _token: CancellationToken| async {
                Ok::<_, TaskError>(TaskResult::SUCCESS)
            },
        )
    }

    fn hourly(name: &str, kind: &'static str) -> Job {
        Job::builder(name, work(kind))
            .cron("0 * * * *")
            .unwrap()
            .build()
    }

    #[test]
    fn same_name_is_merged_not_added() {
        let scheduler = JobScheduler::new("main", Bus::new(16));
        let first = scheduler.load_job(hourly("sync", "w")).unwrap();
        let second = scheduler.load_job(hourly("sync", "w")).unwrap();

        assert_eq!(scheduler.jobs().len(), 1);
        assert_eq!(first.id(), second.id());
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn incompatible_reload_keeps_existing_job() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let scheduler = JobScheduler::new("main", bus);
        let loaded = scheduler.load_job(hourly("sync", "etl")).unwrap();

        let err = scheduler.load_job(hourly("sync", "mail")).unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::Merge(MergeError::IncompatibleWork { .. })
        ));
        let kept = scheduler.job("sync").unwrap();
        assert!(Arc::ptr_eq(&loaded, &kept));
        assert_eq!(kept.work().kind(), "etl");

        assert_eq!(rx.try_recv().unwrap().kind, EventKind::JobLoaded);
        assert_eq!(rx.try_recv().unwrap().kind, EventKind::JobMergeRejected);
    }

    #[test]
    fn load_jobs_reports_first_failure() {
        let scheduler = JobScheduler::new("main", Bus::new(16));
        let res = scheduler.load_jobs([
            hourly("a", "w"),
            hourly("a", "other"),
            hourly("b", "w"),
        ]);
        assert!(res.is_err());
        assert_eq!(scheduler.jobs().len(), 2);
    }

    #[test]
    fn occurrences_are_sorted_across_jobs() {
        let scheduler = JobScheduler::new("main", Bus::new(16));
        scheduler
            .load_job(
                Job::builder("half", work("w"))
                    .cron("30 * * * *")
                    .unwrap()
                    .build(),
            )
            .unwrap();
        scheduler.load_job(hourly("top", "w")).unwrap();

        let start = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 11, 0, 0).unwrap();
        let times: Vec<_> = scheduler
            .occurrences_between(start, end)
            .iter()
            .map(|o| o.start_time())
            .collect();
        assert_eq!(
            times,
            vec![
                start,
                Utc.with_ymd_and_hms(2024, 1, 1, 10, 30, 0).unwrap(),
                end
            ]
        );
        assert_eq!(scheduler.next_occurrences().len(), 2);
        assert_eq!(scheduler.next_n_occurrences(2).len(), 4);
    }

    #[test]
    fn remove_job_drops_it() {
        let scheduler = JobScheduler::new("main", Bus::new(16));
        scheduler.load_job(hourly("sync", "w")).unwrap();
        assert!(scheduler.remove_job("sync").is_some());
        assert!(scheduler.job("sync").is_none());
        assert!(scheduler.remove_job("sync").is_none());
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let scheduler = Arc::new(JobScheduler::new("main", Bus::new(16)));
        let token = CancellationToken::new();

        let running = {
            let s = Arc::clone(&scheduler);
            let t = token.clone();
            tokio::spawn(async move { s.start(t).await })
        };
        while !scheduler.is_started() {
            tokio::task::yield_now().await;
        }

        assert_eq!(
            scheduler.start(token.clone()).await,
            Err(SchedulerError::AlreadyStarted {
                name: "main".to_string()
            })
        );

        token.cancel();
        assert_eq!(running.await.unwrap(), Ok(()));
        assert!(!scheduler.is_started());
    }
}

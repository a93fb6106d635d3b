//! # Job: a named, schedulable unit of work.
//!
//! A job owns zero or more [`Schedule`]s and one [`WorkRef`]. With schedules
//! it is [`JobType::Scheduled`] and re-arms itself after every firing; without
//! any it is [`JobType::OnDemand`] and fires once.
//!
//! ## Re-arm chain
//! ```text
//! start(parent)
//!   └─► spawn chain under parent.child_token():
//!         await the replaced job's chain, if any, and adopt its newer execution
//!         occ = next_occurrence(None)
//!         loop:
//!           ├─ scheduled and occ already past → occ = next_occurrence(now)   (missed firing skipped)
//!           ├─ next_execution = occ.start
//!           ├─ TaskTrigger::run(token)  → last_result (+ last_execution if the work ran)
//!           ├─ on-demand / cancelled → stop
//!           └─ occ = next_occurrence(occ.start); None or same start → stop
//! ```
//!
//! ## Rules
//! - At most one chain per job: `start` while a chain is active is a no-op.
//! - A merged job's chain waits for the chain it replaces, so a reload never
//!   runs the same job twice at once.
//! - `stop` cancels the job's own scope only; other jobs are unaffected.
//! - Occurrences are computed strictly after their reference instant; ties
//!   between schedules collapse into one occurrence carrying all of them.
//! - `merge_with` keeps the id and name and requires the same work kind.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::MergeError;
use crate::events::Bus;
use crate::scheduler::builder::JobBuilder;
use crate::scheduler::occurrence::Occurrence;
use crate::scheduler::result::TaskResult;
use crate::scheduler::schedule::Schedule;
use crate::scheduler::trigger::{TaskTrigger, TriggerHooks};
use crate::scheduler::work::WorkRef;

/// Stable job identity, preserved across merges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobType {
    Scheduled,
    OnDemand,
}

/// Relative importance of a job; informational for hosts and providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum JobPriority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

#[derive(Default)]
pub(crate) struct JobState {
    last_execution: Option<DateTime<Utc>>,
    next_execution: Option<DateTime<Utc>>,
    last_result: Option<TaskResult>,
    run: Option<RunHandle>,
}

impl JobState {
    pub(crate) fn seeded(last_execution: Option<DateTime<Utc>>) -> Self {
        Self {
            last_execution,
            ..Self::default()
        }
    }
}

struct RunHandle {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Named schedulable unit of work. Shared as `Arc<Job>`.
pub struct Job {
    pub(crate) id: JobId,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) priority: JobPriority,
    pub(crate) enabled: bool,
    pub(crate) forced: bool,
    pub(crate) schedules: Vec<Schedule>,
    pub(crate) work: WorkRef,
    pub(crate) params: HashMap<String, String>,
    pub(crate) hooks: TriggerHooks,
    pub(crate) state: Mutex<JobState>,
}

impl Job {
    /// Starts building a job named `name` running `work`.
    pub fn builder(name: impl Into<String>, work: WorkRef) -> JobBuilder {
        JobBuilder::new(name, work)
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn priority(&self) -> JobPriority {
        self.priority
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_forced(&self) -> bool {
        self.forced
    }

    pub fn schedules(&self) -> &[Schedule] {
        &self.schedules
    }

    pub fn work(&self) -> &WorkRef {
        &self.work
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub(crate) fn hooks(&self) -> &TriggerHooks {
        &self.hooks
    }

    pub fn job_type(&self) -> JobType {
        if self.schedules.is_empty() {
            JobType::OnDemand
        } else {
            JobType::Scheduled
        }
    }

    pub fn last_execution(&self) -> Option<DateTime<Utc>> {
        self.state().last_execution
    }

    pub fn next_execution(&self) -> Option<DateTime<Utc>> {
        self.state().next_execution
    }

    pub fn last_result(&self) -> Option<TaskResult> {
        self.state().last_result
    }

    /// True while a re-arm chain is active.
    pub fn is_running(&self) -> bool {
        self.state()
            .run
            .as_ref()
            .is_some_and(|run| !run.handle.is_finished())
    }

    fn state(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Next firing strictly after `from`.
    ///
    /// The reference defaults to the last execution, then to now. On-demand
    /// jobs fire at the reference itself.
    pub fn next_occurrence(&self, from: Option<DateTime<Utc>>) -> Option<Occurrence> {
        let reference = from
            .or_else(|| self.last_execution())
            .unwrap_or_else(Utc::now);
        if self.job_type() == JobType::OnDemand {
            let start = from.unwrap_or_else(Utc::now);
            return Some(Occurrence::new(
                self.id,
                Vec::new(),
                start,
                Arc::clone(&self.work),
            ));
        }

        let mut best: Option<(DateTime<Utc>, Vec<Schedule>)> = None;
        for schedule in &self.schedules {
            let Some(at) = schedule.next_after(reference) else {
                continue;
            };
            match &mut best {
                Some((t, tied)) if *t == at => tied.push(schedule.clone()),
                Some((t, _)) if *t < at => {}
                _ => best = Some((at, vec![schedule.clone()])),
            }
        }
        best.map(|(at, schedules)| Occurrence::new(self.id, schedules, at, Arc::clone(&self.work)))
    }

    /// Every occurrence in `[start, end]`; empty for on-demand jobs.
    pub fn occurrences_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Occurrence> {
        let mut out = Vec::new();
        if self.job_type() == JobType::OnDemand {
            return out;
        }
        let mut cursor = start - Duration::seconds(1);
        while let Some(occ) = self.next_occurrence(Some(cursor)) {
            if occ.start_time() > end {
                break;
            }
            cursor = occ.start_time();
            if cursor >= start {
                out.push(occ);
            }
        }
        out
    }

    /// The next `n` occurrences from now.
    pub fn next_occurrences(&self, n: usize) -> Vec<Occurrence> {
        let mut out = Vec::with_capacity(n);
        let mut cursor = Utc::now();
        while out.len() < n {
            let Some(occ) = self.next_occurrence(Some(cursor)) else {
                break;
            };
            if self.job_type() == JobType::OnDemand {
                out.push(occ);
                break;
            }
            cursor = occ.start_time();
            out.push(occ);
        }
        out
    }

    /// Launches the re-arm chain under a child of `parent`.
    ///
    /// Returns `false` for disabled jobs. Calling it while a chain is active
    /// keeps the existing chain.
    pub fn start(self: &Arc<Self>, parent: &CancellationToken, bus: &Bus) -> bool {
        self.start_after(parent, bus, None)
    }

    /// Like [`Job::start`], but the chain first awaits `previous` (the job this
    /// one replaced and its cancelled chain) and picks up its last firing.
    pub(crate) fn start_after(
        self: &Arc<Self>,
        parent: &CancellationToken,
        bus: &Bus,
        previous: Option<(Arc<Job>, JoinHandle<()>)>,
    ) -> bool {
        if !self.enabled {
            return false;
        }
        let mut state = self.state();
        if state
            .run
            .as_ref()
            .is_some_and(|run| !run.handle.is_finished())
        {
            return true;
        }
        let token = parent.child_token();
        let handle = tokio::spawn(Arc::clone(self).run_chain(token.clone(), bus.clone(), previous));
        state.run = Some(RunHandle { token, handle });
        true
    }

    /// Cancels the job's scope and forgets its chain.
    pub fn stop(&self) {
        // The chain is detached; it exits once it observes the cancelled token.
        drop(self.cancel_run());
    }

    /// Cancels the chain and hands back its handle so the caller can await it.
    pub(crate) fn cancel_run(&self) -> Option<JoinHandle<()>> {
        let run = self.state().run.take()?;
        run.token.cancel();
        Some(run.handle)
    }

    /// Drops the handle of a chain that already ended; `true` if one is still active.
    pub(crate) fn reap(&self) -> bool {
        let mut state = self.state();
        match &state.run {
            Some(run) if run.handle.is_finished() => {
                state.run = None;
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    async fn run_chain(
        self: Arc<Self>,
        token: CancellationToken,
        bus: Bus,
        previous: Option<(Arc<Job>, JoinHandle<()>)>,
    ) {
        if let Some((replaced, handle)) = previous {
            if let Err(err) = handle.await {
                tracing::error!(job = %self.name, error = %err, "replaced job chain failed to join");
            }
            self.adopt(&replaced);
        }
        let mut next = self.next_occurrence(None);

        while let Some(mut occ) = next.take() {
            if token.is_cancelled() {
                break;
            }
            if self.job_type() == JobType::Scheduled && occ.start_time() < Utc::now() {
                match self.next_occurrence(Some(Utc::now())) {
                    Some(fresh) => occ = fresh,
                    None => break,
                }
            }
            self.state().next_execution = Some(occ.start_time());

            let mut trigger = TaskTrigger::new(&self, &occ, bus.clone());
            let result = trigger.run(&token).await;
            {
                let mut state = self.state();
                state.last_result = Some(result);
                state.next_execution = None;
                if let Some(started) = trigger.context().started_on {
                    state.last_execution = Some(started);
                }
            }
            tracing::debug!(job = %self.name, result = %result, "job fired");

            if self.job_type() == JobType::OnDemand || token.is_cancelled() {
                break;
            }
            next = self
                .next_occurrence(Some(occ.start_time()))
                .filter(|n| n.start_time() != occ.start_time());
        }
    }

    /// Takes over `replaced`'s outcome when it fired after this job was merged.
    fn adopt(&self, replaced: &Job) {
        let (last_execution, last_result) = {
            let s = replaced.state();
            (s.last_execution, s.last_result)
        };
        let mut state = self.state();
        if last_execution > state.last_execution {
            state.last_execution = last_execution;
            state.last_result = last_result;
        }
    }

    /// Builds the job that replaces `self` when `other` is reloaded under the same name.
    ///
    /// Keeps `self`'s id and name; takes `other`'s work, settings and last
    /// result; keeps the later last execution, `other`'s next execution (or
    /// `self`'s), and the union of both schedule sets.
    pub fn merge_with(&self, other: &Job) -> Result<Job, MergeError> {
        if self.work.kind() != other.work.kind() {
            return Err(MergeError::IncompatibleWork {
                name: self.name.clone(),
                existing: self.work.kind().to_string(),
                incoming: other.work.kind().to_string(),
            });
        }

        let (mine_last, mine_next) = {
            let s = self.state();
            (s.last_execution, s.next_execution)
        };
        let (theirs_last, theirs_next, theirs_result) = {
            let s = other.state();
            (s.last_execution, s.next_execution, s.last_result)
        };

        let mut schedules = self.schedules.clone();
        for schedule in &other.schedules {
            if !schedules.contains(schedule) {
                schedules.push(schedule.clone());
            }
        }

        Ok(Job {
            id: self.id,
            name: self.name.clone(),
            description: other.description.clone(),
            priority: other.priority,
            enabled: other.enabled,
            forced: other.forced,
            schedules,
            work: Arc::clone(&other.work),
            params: other.params.clone(),
            hooks: other.hooks.clone(),
            state: Mutex::new(JobState {
                last_execution: mine_last.max(theirs_last),
                next_execution: theirs_next.or(mine_next),
                last_result: theirs_result,
                run: None,
            }),
        })
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("type", &self.job_type())
            .field("enabled", &self.enabled)
            .field("schedules", &self.schedules)
            .field("work", &self.work.kind())
            .finish_non_exhaustive()
    }
}

//! Error types used across the runtime.
//!
//! One enum per concern:
//!
//! - [`LifecycleError`]: a service task was started or stopped out of turn.
//! - [`DispatchError`]: an item could not be handed to a worker.
//! - [`TaskError`]: a unit of work (service loop, periodic action, job) failed.
//! - [`ScheduleError`]: a cron expression was rejected at construction.
//! - [`MergeError`]: a job redefinition is incompatible with the loaded job.
//! - [`SchedulerError`]: the job scheduler refused an operation.
//! - [`RegistryError`]: a service could not be resolved from its settings.
//! - [`RuntimeError`]: the host failed to shut down cleanly.
//!
//! Every enum exposes `as_label()`, a short stable snake_case label for logs.

use std::time::Duration;

use thiserror::Error;

use crate::service::ServiceStatus;

/// Lifecycle violations raised synchronously by [`ServiceTask`](crate::ServiceTask).
///
/// These are never swallowed: the caller that invoked `start`/`stop` out of turn gets them.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// `start` was called while the task is still starting.
    #[error("service `{name}` is already starting")]
    AlreadyStarting { name: String },

    /// `start` was called while the task is running (or idle).
    #[error("service `{name}` is already running")]
    AlreadyRunning { name: String },

    /// `stop` was called while a stop is already in progress.
    #[error("service `{name}` is already stopping")]
    AlreadyStopping { name: String },

    /// The requested operation is not legal from the current status.
    #[error("cannot {op} service `{name}` while {status}")]
    InvalidState {
        name: String,
        op: &'static str,
        status: ServiceStatus,
    },

    /// A previous run's propagation stage has not completed yet.
    #[error("service `{name}` is still draining its previous run")]
    PropagationPending { name: String },
}

impl LifecycleError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            LifecycleError::AlreadyStarting { .. } => "lifecycle_already_starting",
            LifecycleError::AlreadyRunning { .. } => "lifecycle_already_running",
            LifecycleError::AlreadyStopping { .. } => "lifecycle_already_stopping",
            LifecycleError::InvalidState { .. } => "lifecycle_invalid_state",
            LifecycleError::PropagationPending { .. } => "lifecycle_propagation_pending",
        }
    }
}

/// Reasons a dispatch did not reach a worker.
///
/// The broker logs these and reports `false`; [`LoadBalancer::try_dispatch`](crate::LoadBalancer::try_dispatch)
/// returns them to callers that want the detail.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("no workers available")]
    NoWorkers,

    #[error("routing key could not be extracted from the item")]
    MissingKey,

    #[error("worker {worker} is closed")]
    WorkerClosed { worker: usize },

    #[error("dispatch cancelled while waiting for worker capacity")]
    Cancelled,

    #[error("service is not running")]
    NotRunning,

    #[error("service is disabled")]
    Disabled,
}

impl DispatchError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatchError::NoWorkers => "dispatch_no_workers",
            DispatchError::MissingKey => "dispatch_missing_key",
            DispatchError::WorkerClosed { .. } => "dispatch_worker_closed",
            DispatchError::Cancelled => "dispatch_cancelled",
            DispatchError::NotRunning => "dispatch_not_running",
            DispatchError::Disabled => "dispatch_disabled",
        }
    }
}

/// # Errors produced by units of work.
///
/// Returned by service loops, periodic actions and job work functions.
/// The runtime records them (log, event, job result) and keeps going.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// Execution exceeded its allowed duration.
    #[error("timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// Non-recoverable error.
    #[error("fatal error: {error}")]
    Fatal { error: String },

    /// Execution failed; the next firing may succeed.
    #[error("execution failed: {error}")]
    Fail { error: String },

    /// Work observed cancellation and gave up.
    #[error("context cancelled")]
    Canceled,
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use taskloom::TaskError;
    ///
    /// assert_eq!(TaskError::fail("boom").as_label(), "task_failed");
    /// assert_eq!(TaskError::Canceled.as_label(), "task_canceled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Timeout { .. } => "task_timeout",
            TaskError::Fatal { .. } => "task_fatal",
            TaskError::Fail { .. } => "task_failed",
            TaskError::Canceled => "task_canceled",
        }
    }
}

/// A cron expression failed validation.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// Expression does not have 5, 6 or 7 whitespace-separated fields.
    #[error("expected 5, 6 or 7 fields in `{expression}`, found {found}")]
    FieldCount { expression: String, found: usize },

    /// A single field did not match its pattern or range.
    #[error("invalid {field} field `{value}`")]
    InvalidField { field: &'static str, value: String },
}

impl ScheduleError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ScheduleError::FieldCount { .. } => "schedule_field_count",
            ScheduleError::InvalidField { .. } => "schedule_invalid_field",
        }
    }
}

/// A job redefinition cannot be merged into the loaded job.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    #[error("job `{name}` runs `{existing}` and cannot be replaced by `{incoming}`")]
    IncompatibleWork {
        name: String,
        existing: String,
        incoming: String,
    },
}

impl MergeError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            MergeError::IncompatibleWork { .. } => "merge_incompatible_work",
        }
    }
}

/// Errors returned by [`JobScheduler`](crate::JobScheduler).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// `start` was called while another run is active.
    #[error("scheduler `{name}` is already started")]
    AlreadyStarted { name: String },

    /// A reload could not be merged; the existing job keeps running.
    #[error(transparent)]
    Merge(#[from] MergeError),
}

impl SchedulerError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SchedulerError::AlreadyStarted { .. } => "scheduler_already_started",
            SchedulerError::Merge(e) => e.as_label(),
        }
    }
}

/// Errors returned by [`ServiceRegistry`](crate::ServiceRegistry).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// No factory is registered for the class identifier.
    #[error("no service registered for class `{class}`")]
    UnknownClass { class: String },

    /// The factory rejected the settings.
    #[error("cannot build service `{class}`: {reason}")]
    Construction { class: String, reason: String },
}

impl RegistryError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            RegistryError::UnknownClass { .. } => "registry_unknown_class",
            RegistryError::Construction { .. } => "registry_construction",
        }
    }
}

/// # Errors produced by the service host.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some services were still stopping.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of the services that did not stop in time.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use taskloom::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }
}

//! # Service status and the legal transitions between them.
//!
//! ```text
//!              start()                 loop launched
//! NotStarted ─────────► Starting ───────────────────► Running ◄──► Idle
//!     ▲                                                   │         │
//!     │                                        stop() / cancel / complete
//!  Stopped ◄──────────────────── Stopping ◄──────────────┴─────────┘
//!     │ start()
//!     └──────────► Starting ...
//! ```
//!
//! ## Rules
//! - `start` is legal from `NotStarted` and `Stopped` only.
//! - `stop` is legal from `Running` and `Idle` only.
//! - `Running` ↔ `Idle` is toggled by the work loop and never leaves the
//!   outer running phase.

use std::fmt;

use crate::error::LifecycleError;

/// Lifecycle status of a [`ServiceTask`](crate::ServiceTask).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ServiceStatus {
    #[default]
    NotStarted,
    Starting,
    Running,
    Idle,
    Stopping,
    Stopped,
}

impl ServiceStatus {
    /// Short stable label (snake_case).
    pub fn as_label(&self) -> &'static str {
        match self {
            ServiceStatus::NotStarted => "not_started",
            ServiceStatus::Starting => "starting",
            ServiceStatus::Running => "running",
            ServiceStatus::Idle => "idle",
            ServiceStatus::Stopping => "stopping",
            ServiceStatus::Stopped => "stopped",
        }
    }

    /// True in the outer running phase (`Running` or `Idle`).
    pub fn is_active(&self) -> bool {
        matches!(self, ServiceStatus::Running | ServiceStatus::Idle)
    }

    pub(crate) fn check_start(self, name: &str) -> Result<(), LifecycleError> {
        match self {
            ServiceStatus::NotStarted | ServiceStatus::Stopped => Ok(()),
            ServiceStatus::Starting => Err(LifecycleError::AlreadyStarting {
                name: name.to_string(),
            }),
            ServiceStatus::Running | ServiceStatus::Idle => Err(LifecycleError::AlreadyRunning {
                name: name.to_string(),
            }),
            status => Err(LifecycleError::InvalidState {
                name: name.to_string(),
                op: "start",
                status,
            }),
        }
    }

    pub(crate) fn check_stop(self, name: &str) -> Result<(), LifecycleError> {
        match self {
            ServiceStatus::Running | ServiceStatus::Idle => Ok(()),
            ServiceStatus::Stopping => Err(LifecycleError::AlreadyStopping {
                name: name.to_string(),
            }),
            status => Err(LifecycleError::InvalidState {
                name: name.to_string(),
                op: "stop",
                status,
            }),
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_is_legal_only_from_rest_states() {
        assert!(ServiceStatus::NotStarted.check_start("s").is_ok());
        assert!(ServiceStatus::Stopped.check_start("s").is_ok());
        assert!(matches!(
            ServiceStatus::Starting.check_start("s"),
            Err(LifecycleError::AlreadyStarting { .. })
        ));
        assert!(matches!(
            ServiceStatus::Idle.check_start("s"),
            Err(LifecycleError::AlreadyRunning { .. })
        ));
        assert_eq!(
            ServiceStatus::Stopping.check_start("s"),
            Err(LifecycleError::InvalidState {
                name: "s".to_string(),
                op: "start",
                status: ServiceStatus::Stopping,
            })
        );
    }

    #[test]
    fn stop_is_legal_only_while_active() {
        assert!(ServiceStatus::Running.check_stop("s").is_ok());
        assert!(ServiceStatus::Idle.check_stop("s").is_ok());
        assert!(matches!(
            ServiceStatus::Stopping.check_stop("s"),
            Err(LifecycleError::AlreadyStopping { .. })
        ));
        for status in [
            ServiceStatus::NotStarted,
            ServiceStatus::Starting,
            ServiceStatus::Stopped,
        ] {
            assert!(matches!(
                status.check_stop("s"),
                Err(LifecycleError::InvalidState { op: "stop", .. })
            ));
        }
    }
}

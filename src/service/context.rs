//! Handle given to a running work loop.

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::events::Bus;
use crate::service::status::ServiceStatus;

/// What a work loop sees of its [`ServiceTask`](crate::ServiceTask).
///
/// Cloning is cheap; all clones refer to the same run.
#[derive(Clone)]
pub struct ServiceContext {
    name: Arc<str>,
    token: CancellationToken,
    complete: CancellationToken,
    bus: Bus,
    status: Arc<Mutex<ServiceStatus>>,
}

impl ServiceContext {
    pub(crate) fn new(
        name: Arc<str>,
        token: CancellationToken,
        complete: CancellationToken,
        bus: Bus,
        status: Arc<Mutex<ServiceStatus>>,
    ) -> Self {
        Self {
            name,
            token,
            complete,
            bus,
            status,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cancelled when the service is stopping.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn status(&self) -> ServiceStatus {
        *self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Marks the service busy. Ignored outside the running phase.
    pub fn set_running(&self) {
        self.toggle(ServiceStatus::Running);
    }

    /// Marks the service idle. Ignored outside the running phase.
    pub fn set_idle(&self) {
        self.toggle(ServiceStatus::Idle);
    }

    fn toggle(&self, to: ServiceStatus) {
        let mut status = self.status.lock().unwrap_or_else(|e| e.into_inner());
        if status.is_active() && *status != to {
            *status = to;
            tracing::trace!(service = %self.name, status = %to, "service status toggled");
        }
    }

    /// Asks the owning task to run its stop sequence, as if `stop()` was called.
    pub fn complete(&self) {
        self.complete.cancel();
    }
}

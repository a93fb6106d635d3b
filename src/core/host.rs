//! # ServiceHost: runs service tasks under one scope until shutdown.
//!
//! The host owns the event bus and a [`SubscriberSet`]. It starts every
//! [`ServiceTask`] on a child of its token, waits for a shutdown trigger,
//! then cancels and enforces [`Config::grace`].
//!
//! ```text
//! run(tasks) / run_until(tasks, shutdown)
//!   ├─► SubscriberSet::listen(listener token)        Bus ─► subscribers
//!   ├─► JoinSet: task.start(host_token.child_token()) for each task
//!   ├─► select:
//!   │     ├─ shutdown fired  ─► publish ShutdownRequested
//!   │     │                     host_token.cancel()
//!   │     │                     wait_all_with_grace(cfg.grace):
//!   │     │                        ├─ all joined  → AllStoppedWithin
//!   │     │                        └─ timeout     → GraceExceeded { stuck }
//!   │     └─ every task returned on its own ─► Ok
//!   └─► stop the listener, flush subscriber queues
//! ```
//!
//! ## Rules
//! - A task that refuses to start (lifecycle error) is logged; the others keep running.
//! - `stuck` lists the tasks that had not returned when the grace period ran out.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::core::{log_join_failure, shutdown};
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::service::ServiceTask;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Process-level runner for a set of services.
pub struct ServiceHost {
    cfg: Config,
    bus: Bus,
    subs: Arc<SubscriberSet>,
}

impl ServiceHost {
    /// Creates the host, its bus (sized by `cfg.bus_capacity`) and subscriber workers.
    pub fn new(cfg: Config, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(subscribers, bus.clone()));
        Self { cfg, bus, subs }
    }

    /// Bus that tasks should publish on to reach the host's subscribers.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Runs `tasks` until an OS termination signal arrives or all of them return.
    pub async fn run(self, tasks: Vec<Arc<ServiceTask>>) -> Result<(), RuntimeError> {
        self.run_until(tasks, async {
            match shutdown::wait_for_shutdown_signal().await {
                Ok(signal) => tracing::info!(signal, "termination signal received"),
                Err(err) => {
                    tracing::error!(error = %err, "cannot listen for termination signals");
                    std::future::pending::<()>().await;
                }
            }
        })
        .await
    }

    /// Runs `tasks` until `shutdown` completes or all of them return.
    pub async fn run_until<F>(
        self,
        tasks: Vec<Arc<ServiceTask>>,
        shutdown: F,
    ) -> Result<(), RuntimeError>
    where
        F: Future<Output = ()>,
    {
        let listener_token = CancellationToken::new();
        let listener = self.subs.listen(listener_token.clone());
        tokio::task::yield_now().await;

        let host_token = CancellationToken::new();
        let mut set = JoinSet::new();
        let mut running: HashSet<String> = HashSet::new();
        for task in tasks {
            running.insert(task.name().to_string());
            let token = host_token.child_token();
            set.spawn(async move {
                if let Err(err) = task.start(token).await {
                    tracing::error!(service = %task.name(), error = %err, "service refused to start");
                }
                task.name().to_string()
            });
        }

        let res = self
            .drive_shutdown(&mut set, &mut running, &host_token, shutdown)
            .await;

        listener_token.cancel();
        log_join_failure("event_listener", listener.await);
        match Arc::try_unwrap(self.subs) {
            Ok(subs) => subs.shutdown().await,
            Err(_) => tracing::debug!("subscriber set still shared, skipping flush"),
        }
        res
    }

    async fn drive_shutdown<F>(
        &self,
        set: &mut JoinSet<String>,
        running: &mut HashSet<String>,
        host_token: &CancellationToken,
        shutdown: F,
    ) -> Result<(), RuntimeError>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = shutdown => {
                tracing::info!("shutdown requested");
                self.bus.publish(Event::new(EventKind::ShutdownRequested));
                host_token.cancel();
                self.wait_all_with_grace(set, running).await
            }
            _ = join_all(set, running) => Ok(()),
        }
    }

    async fn wait_all_with_grace(
        &self,
        set: &mut JoinSet<String>,
        running: &mut HashSet<String>,
    ) -> Result<(), RuntimeError> {
        let grace = self.cfg.grace;
        match tokio::time::timeout(grace, join_all(set, running)).await {
            Ok(()) => {
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                let mut stuck: Vec<String> = running.iter().cloned().collect();
                stuck.sort_unstable();
                tracing::error!(?grace, ?stuck, "services did not stop within grace");
                self.bus.publish(
                    Event::new(EventKind::GraceExceeded).with_reason(stuck.join(", ")),
                );
                set.abort_all();
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }
}

async fn join_all(set: &mut JoinSet<String>, running: &mut HashSet<String>) {
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(name) => {
                running.remove(&name);
            }
            Err(err) => tracing::error!(error = %err, "service task failed to join"),
        }
    }
}

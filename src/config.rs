//! # Runtime configuration.
//!
//! Two records live here:
//!
//! - [`Config`]: knobs for the runtime itself (shutdown grace, bus size, worker
//!   capacity, dispatch backoff, scheduler poll interval, job reload interval).
//! - [`ServiceSettings`]: the per-service record an application resolves from
//!   wherever it keeps configuration. The runtime never reads files; it only
//!   consumes the already-deserialized structure.
//!
//! ## Sentinel values
//! - `worker_capacity = 0` → unbounded worker queues
//! - `grace = 0s` → do not wait for work loops to exit on stop

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::policies::BackoffPolicy;

/// Global configuration for the runtime.
///
/// ## Field semantics
/// - `grace`: how long a stopping service (or the host) waits for work loops to exit
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
/// - `worker_capacity`: default bounded capacity of each worker (`0` = unbounded)
/// - `dispatch_backoff`: polling delays while a selected worker is full
/// - `scheduler_poll`: how often a running scheduler reaps finished job chains
/// - `reload_interval`: how often a scheduled service reloads its job definitions
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time to wait for work loops to exit before detaching them.
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    /// Default per-worker queue capacity.
    ///
    /// - `0` = unbounded (no semaphore)
    /// - `n > 0` = `receive` suspends once `n` items are queued or in flight
    pub worker_capacity: usize,

    /// Delays used while polling a full worker during dispatch.
    pub dispatch_backoff: BackoffPolicy,

    /// Poll interval of [`JobScheduler::start`](crate::JobScheduler::start).
    pub scheduler_poll: Duration,

    /// Interval between job reloads in a scheduled service.
    pub reload_interval: Duration,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `grace = 5s`
    /// - `bus_capacity = 1024`
    /// - `worker_capacity = 100`
    /// - `dispatch_backoff`: first 10ms, doubling, capped at 500ms, no jitter
    /// - `scheduler_poll = 250ms`
    /// - `reload_interval = 5min`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(5),
            bus_capacity: 1024,
            worker_capacity: 100,
            dispatch_backoff: BackoffPolicy::default(),
            scheduler_poll: Duration::from_millis(250),
            reload_interval: Duration::from_secs(300),
        }
    }
}

/// Settings record for one service task.
///
/// Keys are camelCase on the wire:
///
/// ```
/// use taskloom::ServiceSettings;
///
/// let raw = r#"{ "name": "ingest", "numberOfWorkers": 4, "classIdentifier": "balanced" }"#;
/// let settings: ServiceSettings = serde_json::from_str(raw).unwrap();
/// assert_eq!(settings.number_of_workers, 4);
/// assert_eq!(settings.idle_time_ms, 1000);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceSettings {
    pub name: String,
    /// Pause between iterations when there is nothing to do.
    pub idle_time_ms: u64,
    pub number_of_workers: usize,
    /// Items buffered ahead of the propagation stage.
    pub worker_batch_size: usize,
    /// Minimum spacing between two propagated items.
    pub propagation_delay_ms: u64,
    pub enabled: bool,
    /// Key resolved by [`ServiceRegistry`](crate::ServiceRegistry).
    pub class_identifier: String,
}

impl ServiceSettings {
    pub fn idle_time(&self) -> Duration {
        Duration::from_millis(self.idle_time_ms)
    }

    pub fn propagation_delay(&self) -> Duration {
        Duration::from_millis(self.propagation_delay_ms)
    }

    /// Batch size clamped to a minimum of 1.
    pub fn batch_size_clamped(&self) -> usize {
        self.worker_batch_size.max(1)
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            idle_time_ms: 1000,
            number_of_workers: 1,
            worker_batch_size: 100,
            propagation_delay_ms: 1000,
            enabled: true,
            class_identifier: "periodic".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_fill_missing_keys_with_defaults() {
        let raw = r#"{ "name": "ingest", "numberOfWorkers": 4, "propagationDelayMs": 0 }"#;
        let settings: ServiceSettings = serde_json::from_str(raw).unwrap();

        assert_eq!(settings.name, "ingest");
        assert_eq!(settings.number_of_workers, 4);
        assert_eq!(settings.propagation_delay(), Duration::ZERO);
        assert_eq!(settings.idle_time(), Duration::from_secs(1));
        assert_eq!(settings.worker_batch_size, 100);
        assert!(settings.enabled);
        assert_eq!(settings.class_identifier, "periodic");
    }

    #[test]
    fn bus_capacity_is_clamped() {
        let cfg = Config {
            bus_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}

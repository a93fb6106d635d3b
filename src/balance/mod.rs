//! Worker pools and load balancing.
//!
//! ## Contents
//! - [`Worker`] bounded FIFO processing unit with [`WorkerStats`]
//! - [`Strategy`] selection policy: [`RoundRobin`], [`LeastLoaded`], [`KeyGrouping`]
//! - [`LoadBalancer`] strategy + pool + polling hand-off
//! - [`LoadBalancingBroker`] owner of the pool, built with [`BrokerBuilder`]
//!
//! ## Wiring
//! ```text
//! LoadBalancingBroker
//!   ├─ token (child of the caller's)
//!   ├─ pool: [Worker 0, Worker 1, ... Worker N-1]   (fixed; each under a child token)
//!   └─ LoadBalancer { strategy, backoff, bus }
//! ```

mod balancer;
mod broker;
mod key_grouping;
mod least_loaded;
mod round_robin;
mod stats;
mod strategy;
mod worker;

pub use balancer::LoadBalancer;
pub use broker::{BrokerBuilder, LoadBalancingBroker};
pub use key_grouping::KeyGrouping;
pub use least_loaded::LeastLoaded;
pub use round_robin::RoundRobin;
pub use stats::{WorkerStats, WorkerStatsSnapshot};
pub use strategy::{Strategy, StrategyKind};
pub use worker::{Process, ProcessFn, ProcessorRef, Worker};
